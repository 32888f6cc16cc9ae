//! Registration, login and token lifecycle.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::user::User;
use deployment::Deployment;
use serde::{Deserialize, Serialize};
use services::services::auth::{
    AccessToken, AuthSession, LoginRequest, PasswordResetTicket, RegisterRequest,
    ResetPasswordRequest, UpdateProfileRequest,
};
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{
    DeploymentImpl,
    error::ApiError,
    middleware::{CurrentUser, require_auth},
};

#[derive(Debug, Serialize, TS)]
pub struct MeResponse {
    pub user: User,
}

#[derive(Debug, Deserialize, TS)]
pub struct RefreshRequest {
    pub token: String,
}

#[derive(Debug, Default, Deserialize, TS)]
pub struct LogoutRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize, TS)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

pub async fn register(
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<AuthSession>>), ApiError> {
    let session = deployment.auth().register(payload).await?;
    Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(session))))
}

pub async fn login(
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<LoginRequest>,
) -> Result<ResponseJson<ApiResponse<AuthSession>>, ApiError> {
    let session = deployment.auth().login(payload).await?;
    Ok(ResponseJson(ApiResponse::success(session)))
}

pub async fn me(CurrentUser(user): CurrentUser) -> ResponseJson<ApiResponse<MeResponse>> {
    ResponseJson(ApiResponse::success(MeResponse { user }))
}

pub async fn update_me(
    State(deployment): State<DeploymentImpl>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<ResponseJson<ApiResponse<MeResponse>>, ApiError> {
    let user = deployment.auth().update_profile(&user, payload).await?;
    Ok(ResponseJson(ApiResponse::success(MeResponse { user })))
}

pub async fn refresh(
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<RefreshRequest>,
) -> Result<ResponseJson<ApiResponse<AccessToken>>, ApiError> {
    let token = deployment.auth().refresh(&payload.token).await?;
    Ok(ResponseJson(ApiResponse::success(token)))
}

pub async fn logout(
    State(deployment): State<DeploymentImpl>,
    CurrentUser(user): CurrentUser,
    payload: Option<Json<LogoutRequest>>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    deployment
        .auth()
        .logout(user.id, payload.refresh_token.as_deref())
        .await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub async fn forgot_password(
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<ResponseJson<ApiResponse<PasswordResetTicket>>, ApiError> {
    let ticket = deployment.auth().forgot_password(&payload.email).await?;
    Ok(ResponseJson(ApiResponse::success(ticket)))
}

pub async fn reset_password(
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    deployment.auth().reset_password(payload).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    let protected = Router::new()
        .route("/me", get(me).patch(update_me))
        .route("/logout", post(logout))
        .route_layer(from_fn_with_state(deployment.clone(), require_auth));

    Router::new().nest(
        "/auth",
        Router::new()
            .route("/register", post(register))
            .route("/login", post(login))
            .route("/refresh", post(refresh))
            .route("/forgot", post(forgot_password))
            .route("/reset", post(reset_password))
            .merge(protected),
    )
}
