use async_trait::async_trait;
use db::DBService;
use services::services::{
    auth::AuthService,
    build::BuildService,
    config::{Config, ConfigError},
    item_source::ItemSourceError,
    item_sync::ItemSyncService,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    ItemSource(#[from] ItemSourceError),
}

/// Everything the HTTP layer needs from a running instance.
#[async_trait]
pub trait Deployment: Clone + Send + Sync + 'static {
    /// Load configuration, open the database and build the services.
    async fn new() -> Result<Self, DeploymentError>;

    fn config(&self) -> &Config;

    fn db(&self) -> &DBService;

    fn auth(&self) -> &AuthService;

    fn builds(&self) -> &BuildService;

    fn item_sync(&self) -> &ItemSyncService;

    /// Start periodic background work, if enabled.
    fn spawn_background_services(&self);
}
