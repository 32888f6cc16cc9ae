use axum::{Router, routing::get};

use crate::DeploymentImpl;

pub mod armor;
pub mod artefacts;
pub mod auth;
pub mod builds;
pub mod containers;
pub mod health;
pub mod sync;
pub mod users;

/// All `/api` routes.
pub fn router(deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .merge(auth::router(deployment))
        .merge(users::router(deployment))
        .merge(armor::router(deployment))
        .merge(artefacts::router(deployment))
        .merge(containers::router(deployment))
        .merge(builds::router(deployment))
        .merge(sync::router(deployment))
}

pub fn health_router() -> Router<DeploymentImpl> {
    Router::new().route("/health", get(health::health_check))
}
