use axum::{
    http::StatusCode,
    response::{IntoResponse, Json as ResponseJson, Response},
};
use db::models::item::InvalidSortField;
use services::services::{auth::AuthError, build::BuildError, item_sync::ItemSyncError};
use thiserror::Error;
use tracing::error;
use utils::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    ItemSync(#[from] ItemSyncError),
    #[error(transparent)]
    InvalidSort(#[from] InvalidSortField),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Auth(e) => match e {
                AuthError::Validation(_) => StatusCode::BAD_REQUEST,
                AuthError::AlreadyExists => StatusCode::CONFLICT,
                AuthError::InvalidCredentials | AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
                AuthError::Inactive => StatusCode::FORBIDDEN,
                AuthError::UserNotFound => StatusCode::NOT_FOUND,
                AuthError::Jwt(_) | AuthError::Password(_) | AuthError::Database(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ApiError::Build(e) => match e {
                BuildError::Validation(_) | BuildError::InvalidSort(_) => StatusCode::BAD_REQUEST,
                BuildError::NotFound => StatusCode::NOT_FOUND,
                BuildError::Forbidden => StatusCode::FORBIDDEN,
                BuildError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::ItemSync(ItemSyncError::AlreadyRunning) => StatusCode::CONFLICT,
            ApiError::ItemSync(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::InvalidSort(_) => StatusCode::BAD_REQUEST,
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            error!(error = %self, "Request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, ResponseJson(ApiResponse::<()>::error(&message))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_errors_map_to_status_codes() {
        let cases = [
            (ApiError::from(AuthError::AlreadyExists), StatusCode::CONFLICT),
            (ApiError::from(AuthError::InvalidCredentials), StatusCode::UNAUTHORIZED),
            (ApiError::from(AuthError::Inactive), StatusCode::FORBIDDEN),
            (ApiError::from(BuildError::NotFound), StatusCode::NOT_FOUND),
            (ApiError::from(BuildError::Validation("x".into())), StatusCode::BAD_REQUEST),
            (ApiError::from(ItemSyncError::AlreadyRunning), StatusCode::CONFLICT),
            (ApiError::from(sqlx::Error::RowNotFound), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.status(), status, "{err}");
        }
    }
}
