//! Manual control over the item sync.

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::{get, post},
};
use deployment::Deployment;
use services::services::item_sync::SyncStatus;
use tracing::info;
use utils::response::ApiResponse;

use crate::{
    DeploymentImpl,
    error::ApiError,
    middleware::{AdminUser, require_auth},
};

pub async fn sync_status(
    State(deployment): State<DeploymentImpl>,
) -> ResponseJson<ApiResponse<SyncStatus>> {
    ResponseJson(ApiResponse::success(deployment.item_sync().status().await))
}

/// Start a sync in the background. 409 while one is already running.
pub async fn run_sync(
    State(deployment): State<DeploymentImpl>,
    AdminUser(admin): AdminUser,
) -> Result<(StatusCode, ResponseJson<ApiResponse<()>>), ApiError> {
    deployment.item_sync().trigger()?;
    info!(user_id = %admin.id, "Item sync triggered manually");
    Ok((StatusCode::ACCEPTED, ResponseJson(ApiResponse::success(()))))
}

pub fn router(deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().nest(
        "/sync",
        Router::new().route("/status", get(sync_status)).route(
            "/run",
            post(run_sync).route_layer(from_fn_with_state(deployment.clone(), require_auth)),
        ),
    )
}
