use axum::response::Json as ResponseJson;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
}

pub async fn health_check() -> ResponseJson<HealthStatus> {
    ResponseJson(HealthStatus { status: "ok" })
}
