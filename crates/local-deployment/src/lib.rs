use std::sync::Arc;

use async_trait::async_trait;
use db::DBService;
use deployment::{Deployment, DeploymentError};
use services::services::{
    auth::AuthService,
    build::BuildService,
    config::Config,
    item_parser::ItemParser,
    item_source::{GithubItemSource, ItemSource},
    item_sync::ItemSyncService,
};
use tracing::info;
use utils::jwt::JwtService;

#[derive(Clone)]
pub struct LocalDeployment {
    config: Arc<Config>,
    db: DBService,
    auth: AuthService,
    builds: BuildService,
    item_sync: ItemSyncService,
}

impl LocalDeployment {
    /// Wire the services around an already opened database and item source.
    pub fn from_parts(config: Config, db: DBService, source: Arc<dyn ItemSource>) -> Self {
        let jwt = JwtService::new(&config.jwt_secret);
        let parser = ItemParser::new(config.items.lang.clone());

        Self {
            auth: AuthService::new(db.clone(), jwt),
            builds: BuildService::new(db.clone()),
            item_sync: ItemSyncService::new(db.clone(), source, parser),
            config: Arc::new(config),
            db,
        }
    }
}

#[async_trait]
impl Deployment for LocalDeployment {
    async fn new() -> Result<Self, DeploymentError> {
        let config = Config::from_env()?;
        let db = DBService::new(&config.database_url).await?;
        let source = Arc::new(GithubItemSource::new(config.items.clone())?);
        Ok(Self::from_parts(config, db, source))
    }

    fn config(&self) -> &Config {
        &self.config
    }

    fn db(&self) -> &DBService {
        &self.db
    }

    fn auth(&self) -> &AuthService {
        &self.auth
    }

    fn builds(&self) -> &BuildService {
        &self.builds
    }

    fn item_sync(&self) -> &ItemSyncService {
        &self.item_sync
    }

    fn spawn_background_services(&self) {
        if !self.config.sync.enabled {
            info!("Item sync disabled");
            return;
        }
        self.item_sync.clone().spawn(self.config.sync.interval);
    }
}
