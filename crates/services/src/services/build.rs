//! Loadout builds: validation, ownership and visibility rules on top of the build queries.

use db::{
    DBService,
    models::{
        armor::Armor,
        artefact::Artefact,
        build::{Build, BuildDetails, BuildFilter, CreateBuild, NewBuild, UpdateBuild},
        container::Container,
        item::{InvalidSortField, MAX_PAGE_SIZE},
        tag::{Tag, TagUsage, normalize_tag_names},
        user::User,
    },
};
use serde::Serialize;
use thiserror::Error;
use tracing::info;
use ts_rs::TS;
use uuid::Uuid;

pub const DEFAULT_BUILD_NAME: &str = "New build";

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("{0}")]
    Validation(String),
    #[error("build not found")]
    NotFound,
    #[error("only the owner can change this build")]
    Forbidden,
    #[error(transparent)]
    InvalidSort(#[from] InvalidSortField),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct LikeState {
    pub liked: bool,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct FavoriteState {
    pub favorited: bool,
}

#[derive(Debug, Clone)]
pub struct BuildService {
    db: DBService,
}

impl BuildService {
    pub fn new(db: DBService) -> Self {
        Self { db }
    }

    pub async fn list(
        &self,
        filter: &BuildFilter,
        viewer: Option<Uuid>,
    ) -> Result<Vec<BuildDetails>, BuildError> {
        let sort_column = filter.sort_column()?;
        Ok(BuildDetails::list(&self.db.pool, filter, sort_column, viewer).await?)
    }

    pub async fn popular(&self, lang: &str, limit: i64) -> Result<Vec<BuildDetails>, BuildError> {
        Ok(BuildDetails::popular(&self.db.pool, lang, limit.clamp(1, MAX_PAGE_SIZE)).await?)
    }

    pub async fn favorites(&self, user_id: Uuid, lang: &str) -> Result<Vec<BuildDetails>, BuildError> {
        Ok(BuildDetails::favorites(&self.db.pool, user_id, lang).await?)
    }

    pub async fn popular_tags(&self, limit: i64) -> Result<Vec<TagUsage>, BuildError> {
        Ok(Tag::popular(&self.db.pool, limit.clamp(1, MAX_PAGE_SIZE)).await?)
    }

    /// Load a build the viewer may see. Private builds of other users look missing.
    async fn visible(&self, id: Uuid, viewer: Option<Uuid>) -> Result<Build, BuildError> {
        Build::find_by_id(&self.db.pool, id)
            .await?
            .filter(|b| b.is_public || Some(b.user_id) == viewer)
            .ok_or(BuildError::NotFound)
    }

    /// Load a build the user may change.
    async fn owned(&self, id: Uuid, user: &User) -> Result<Build, BuildError> {
        let build = Build::find_by_id(&self.db.pool, id)
            .await?
            .ok_or(BuildError::NotFound)?;
        if build.user_id != user.id && !user.is_admin() {
            return Err(BuildError::Forbidden);
        }
        Ok(build)
    }

    async fn details(&self, id: Uuid, lang: &str) -> Result<BuildDetails, BuildError> {
        BuildDetails::find(&self.db.pool, id, lang)
            .await?
            .ok_or(BuildError::NotFound)
    }

    /// Fetch a build for display, counting the view.
    pub async fn view(
        &self,
        id: Uuid,
        viewer: Option<Uuid>,
        lang: &str,
    ) -> Result<BuildDetails, BuildError> {
        self.visible(id, viewer).await?;
        Build::increment_views(&self.db.pool, id).await?;
        self.details(id, lang).await
    }

    async fn validate_items(
        &self,
        armor_id: &str,
        container_id: &str,
        artefact_ids: &[String],
    ) -> Result<(), BuildError> {
        if Armor::find_by_id(&self.db.pool, armor_id).await?.is_none() {
            return Err(BuildError::Validation(format!("unknown armor '{armor_id}'")));
        }

        let container = Container::find_by_id(&self.db.pool, container_id)
            .await?
            .ok_or_else(|| BuildError::Validation(format!("unknown container '{container_id}'")))?;

        let missing = Artefact::missing_ids(&self.db.pool, artefact_ids).await?;
        if !missing.is_empty() {
            return Err(BuildError::Validation(format!(
                "unknown artefacts: {}",
                missing.join(", ")
            )));
        }

        match container.capacity {
            Some(capacity) if artefact_ids.len() as i64 > capacity => {
                Err(BuildError::Validation(format!(
                    "container '{container_id}' holds {capacity} artefacts, got {}",
                    artefact_ids.len()
                )))
            }
            _ => Ok(()),
        }
    }

    pub async fn create(
        &self,
        user: &User,
        req: CreateBuild,
        lang: &str,
    ) -> Result<BuildDetails, BuildError> {
        self.validate_items(&req.armor_id, &req.container_id, &req.artefact_ids)
            .await?;

        let name = match req.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => DEFAULT_BUILD_NAME.to_string(),
        };

        let new_build = NewBuild {
            armor_id: req.armor_id,
            container_id: req.container_id,
            name,
            description: req.description,
            is_public: req.is_public.unwrap_or(false),
            is_template: req.is_template.unwrap_or(false),
            artefact_ids: req.artefact_ids,
            tags: normalize_tag_names(&req.tags.unwrap_or_default()),
        };

        let mut tx = self.db.pool.begin().await?;
        let build = Build::create(&mut tx, user.id, &new_build).await?;
        tx.commit().await?;

        info!(build_id = %build.id, user_id = %user.id, "Build created");
        self.details(build.id, lang).await
    }

    pub async fn update(
        &self,
        user: &User,
        id: Uuid,
        req: UpdateBuild,
        lang: &str,
    ) -> Result<BuildDetails, BuildError> {
        let existing = self.owned(id, user).await?;

        if req.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(BuildError::Validation("name must not be empty".into()));
        }

        let touches_items =
            req.armor_id.is_some() || req.container_id.is_some() || req.artefact_ids.is_some();
        if touches_items {
            let artefact_ids = match &req.artefact_ids {
                Some(ids) => ids.clone(),
                None => Build::artefact_ids(&self.db.pool, id).await?,
            };
            self.validate_items(
                req.armor_id.as_deref().unwrap_or(&existing.armor_id),
                req.container_id.as_deref().unwrap_or(&existing.container_id),
                &artefact_ids,
            )
            .await?;
        }

        let fields = UpdateBuild {
            name: req.name.as_deref().map(|n| n.trim().to_string()),
            ..req.clone()
        };

        let mut tx = self.db.pool.begin().await?;
        Build::update_fields(&mut tx, id, &fields).await?;
        if let Some(artefact_ids) = &req.artefact_ids {
            Build::set_artefacts(&mut tx, id, artefact_ids).await?;
        }
        if let Some(tags) = &req.tags {
            Tag::set_for_build(&mut tx, id, &normalize_tag_names(tags)).await?;
        }
        tx.commit().await?;

        info!(build_id = %id, user_id = %user.id, "Build updated");
        self.details(id, lang).await
    }

    pub async fn delete(&self, user: &User, id: Uuid) -> Result<(), BuildError> {
        self.owned(id, user).await?;
        if !Build::delete(&self.db.pool, id).await? {
            return Err(BuildError::NotFound);
        }
        info!(build_id = %id, user_id = %user.id, "Build deleted");
        Ok(())
    }

    /// Copy a visible build into a private build owned by `user`.
    pub async fn clone_build(
        &self,
        user: &User,
        id: Uuid,
        lang: &str,
    ) -> Result<BuildDetails, BuildError> {
        let source = self.visible(id, Some(user.id)).await?;
        let artefact_ids = Build::artefact_ids(&self.db.pool, id).await?;
        let tags = Build::tag_names(&self.db.pool, id).await?;

        let copy = NewBuild {
            armor_id: source.armor_id,
            container_id: source.container_id,
            name: format!("Clone of {}", source.name),
            description: source.description,
            is_public: false,
            is_template: false,
            artefact_ids,
            tags,
        };

        let mut tx = self.db.pool.begin().await?;
        let build = Build::create(&mut tx, user.id, &copy).await?;
        tx.commit().await?;

        info!(build_id = %build.id, source_id = %id, user_id = %user.id, "Build cloned");
        self.details(build.id, lang).await
    }

    pub async fn toggle_like(&self, user: &User, id: Uuid) -> Result<LikeState, BuildError> {
        self.visible(id, Some(user.id)).await?;
        let liked = Build::toggle_like(&self.db.pool, id, user.id).await?;
        Ok(LikeState { liked })
    }

    pub async fn toggle_favorite(&self, user: &User, id: Uuid) -> Result<FavoriteState, BuildError> {
        self.visible(id, Some(user.id)).await?;
        let favorited = Build::toggle_favorite(&self.db.pool, id, user.id).await?;
        Ok(FavoriteState { favorited })
    }
}
