//! Bearer token authentication.
//!
//! The middleware resolves the token into a [`User`] and stores it in the request
//! extensions; handlers pick it up through the extractors below.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header, request::Parts},
    middleware::Next,
    response::Response,
};
use db::models::user::User;
use deployment::Deployment;

use crate::{DeploymentImpl, error::ApiError};

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

async fn attach_user(
    deployment: &DeploymentImpl,
    token: &str,
    req: &mut Request,
) -> Result<(), ApiError> {
    let user = deployment.auth().authenticate(token).await?;
    req.extensions_mut().insert(user);
    Ok(())
}

/// Reject requests without a valid bearer token.
pub async fn require_auth(
    State(deployment): State<DeploymentImpl>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers())
        .map(str::to_owned)
        .ok_or_else(|| ApiError::Unauthorized("missing bearer token".into()))?;
    attach_user(&deployment, &token, &mut req).await?;
    Ok(next.run(req).await)
}

/// Load the user when a token is sent. A token that is sent but invalid is still rejected.
pub async fn optional_auth(
    State(deployment): State<DeploymentImpl>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(token) = bearer_token(req.headers()).map(str::to_owned) {
        attach_user(&deployment, &token, &mut req).await?;
    }
    Ok(next.run(req).await)
}

/// The authenticated caller.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<User>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| ApiError::Unauthorized("authentication required".into()))
    }
}

/// The caller, when the request carried a token.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

impl MaybeUser {
    pub fn id(&self) -> Option<uuid::Uuid> {
        self.0.as_ref().map(|user| user.id)
    }
}

impl<S: Send + Sync> FromRequestParts<S> for MaybeUser {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(parts.extensions.get::<User>().cloned()))
    }
}

/// An authenticated caller with the admin role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

impl<S: Send + Sync> FromRequestParts<S> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(ApiError::Forbidden("admin role required".into()));
        }
        Ok(AdminUser(user))
    }
}
