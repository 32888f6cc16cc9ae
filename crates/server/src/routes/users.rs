use axum::{
    Router, extract::State, middleware::from_fn_with_state, response::Json as ResponseJson,
    routing::get,
};
use db::models::user::UserSummary;
use deployment::Deployment;
use utils::response::ApiResponse;

use crate::{
    DeploymentImpl,
    error::ApiError,
    middleware::{AdminUser, require_auth},
};

pub async fn list_users(
    State(deployment): State<DeploymentImpl>,
    _admin: AdminUser,
) -> Result<ResponseJson<ApiResponse<Vec<UserSummary>>>, ApiError> {
    let users = deployment.auth().list_users().await?;
    Ok(ResponseJson(ApiResponse::success(users)))
}

pub fn router(deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().route(
        "/users",
        get(list_users).route_layer(from_fn_with_state(deployment.clone(), require_auth)),
    )
}
