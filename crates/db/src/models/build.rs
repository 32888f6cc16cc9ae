use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

use super::{
    artefact::{Artefact, ArtefactEffect},
    item::{
        DEFAULT_LANG, InvalidSortField, SortOrder, clamp_limit, clamp_offset, push_in_list,
        resolve_sort,
    },
    tag::Tag,
};

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Build {
    pub id: Uuid,
    pub user_id: Uuid,
    pub armor_id: String,
    pub container_id: String,
    pub name: String,
    pub description: Option<String>,
    pub is_public: bool,
    pub is_template: bool,
    pub likes_count: i64,
    pub views_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for creating a build.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct CreateBuild {
    pub armor_id: String,
    pub container_id: String,
    pub artefact_ids: Vec<String>,
    pub is_public: Option<bool>,
    pub is_template: Option<bool>,
    pub tags: Option<Vec<String>>,
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Request body for a partial build update. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateBuild {
    pub armor_id: Option<String>,
    pub container_id: Option<String>,
    pub artefact_ids: Option<Vec<String>>,
    pub is_public: Option<bool>,
    pub is_template: Option<bool>,
    pub tags: Option<Vec<String>>,
    pub name: Option<String>,
    pub description: Option<String>,
}

/// A validated build ready to be written.
#[derive(Debug, Clone)]
pub struct NewBuild {
    pub armor_id: String,
    pub container_id: String,
    pub name: String,
    pub description: Option<String>,
    pub is_public: bool,
    pub is_template: bool,
    pub artefact_ids: Vec<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct BuildFilter {
    pub user_id: Option<Uuid>,
    pub is_public: Option<bool>,
    pub is_template: Option<bool>,
    /// Only builds carrying this tag.
    pub tags: Option<String>,
    pub lang: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub sort: Option<String>,
    pub order: Option<SortOrder>,
}

pub const BUILD_SORT_COLUMNS: &[&str] =
    &["created_at", "updated_at", "likes_count", "views_count", "name"];

const BUILD_DEFAULT_LIMIT: i64 = 20;

impl BuildFilter {
    pub fn sort_column(&self) -> Result<&'static str, InvalidSortField> {
        resolve_sort(self.sort.as_deref(), BUILD_SORT_COLUMNS, "created_at")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct BuildAuthor {
    pub id: Uuid,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct BuildItem {
    pub id: String,
    pub name: Option<String>,
    pub icon_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct BuildArtefactSlot {
    pub slot: i64,
    pub id: String,
    pub name: Option<String>,
    pub icon_url: Option<String>,
    pub effects: Vec<ArtefactEffect>,
}

/// A build with its author, items and tags resolved for one language.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct BuildDetails {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_public: bool,
    pub is_template: bool,
    pub likes_count: i64,
    pub views_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub author: BuildAuthor,
    pub armor: BuildItem,
    pub container: BuildItem,
    pub artefacts: Vec<BuildArtefactSlot>,
    pub tags: Vec<String>,
}

#[derive(Debug, FromRow)]
struct BuildRow {
    id: Uuid,
    user_id: Uuid,
    armor_id: String,
    container_id: String,
    name: String,
    description: Option<String>,
    is_public: bool,
    is_template: bool,
    likes_count: i64,
    views_count: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    author_username: String,
    armor_name: Option<String>,
    armor_icon_url: Option<String>,
    container_name: Option<String>,
    container_icon_url: Option<String>,
}

const BUILD_COLUMNS: &str = "id, user_id, armor_id, container_id, name, description, is_public, \
                             is_template, likes_count, views_count, created_at, updated_at";

impl Build {
    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Build>(&format!("SELECT {BUILD_COLUMNS} FROM builds WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Insert the build with its artefact slots and tags on the caller's connection.
    pub async fn create(
        conn: &mut SqliteConnection,
        user_id: Uuid,
        data: &NewBuild,
    ) -> Result<Self, sqlx::Error> {
        let build = sqlx::query_as::<_, Build>(&format!(
            "INSERT INTO builds (id, user_id, armor_id, container_id, name, description, is_public, is_template)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {BUILD_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(&data.armor_id)
        .bind(&data.container_id)
        .bind(&data.name)
        .bind(&data.description)
        .bind(data.is_public)
        .bind(data.is_template)
        .fetch_one(&mut *conn)
        .await?;

        Self::set_artefacts(&mut *conn, build.id, &data.artefact_ids).await?;
        Tag::set_for_build(&mut *conn, build.id, &data.tags).await?;

        Ok(build)
    }

    /// Update scalar fields that are `Some`. Artefacts and tags are handled by the caller.
    pub async fn update_fields(
        conn: &mut SqliteConnection,
        id: Uuid,
        data: &UpdateBuild,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Build>(&format!(
            "UPDATE builds
             SET armor_id = COALESCE($2, armor_id),
                 container_id = COALESCE($3, container_id),
                 name = COALESCE($4, name),
                 description = COALESCE($5, description),
                 is_public = COALESCE($6, is_public),
                 is_template = COALESCE($7, is_template),
                 updated_at = datetime('now', 'subsec')
             WHERE id = $1
             RETURNING {BUILD_COLUMNS}"
        ))
        .bind(id)
        .bind(&data.armor_id)
        .bind(&data.container_id)
        .bind(&data.name)
        .bind(&data.description)
        .bind(data.is_public)
        .bind(data.is_template)
        .fetch_one(&mut *conn)
        .await
    }

    /// Replace the artefact slots; slot numbers follow list order.
    pub async fn set_artefacts(
        conn: &mut SqliteConnection,
        id: Uuid,
        artefact_ids: &[String],
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM build_artefacts WHERE build_id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        for (slot, artefact_id) in artefact_ids.iter().enumerate() {
            sqlx::query("INSERT INTO build_artefacts (build_id, slot, artefact_id) VALUES ($1, $2, $3)")
                .bind(id)
                .bind(slot as i64)
                .bind(artefact_id)
                .execute(&mut *conn)
                .await?;
        }

        Ok(())
    }

    pub async fn artefact_ids(pool: &SqlitePool, id: Uuid) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar("SELECT artefact_id FROM build_artefacts WHERE build_id = $1 ORDER BY slot")
            .bind(id)
            .fetch_all(pool)
            .await
    }

    pub async fn tag_names(pool: &SqlitePool, id: Uuid) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar(
            r#"SELECT t.name FROM build_tags bt
               JOIN tags t ON t.id = bt.tag_id
               WHERE bt.build_id = $1
               ORDER BY t.name"#,
        )
        .bind(id)
        .fetch_all(pool)
        .await
    }

    /// Returns whether a row was deleted.
    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM builds WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn increment_views(pool: &SqlitePool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE builds SET views_count = views_count + 1 WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Toggle the like of `user_id`; the like row and `likes_count` change together.
    /// Returns whether the build is liked afterwards.
    pub async fn toggle_like(
        pool: &SqlitePool,
        build_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let removed = sqlx::query("DELETE FROM build_likes WHERE user_id = $1 AND build_id = $2")
            .bind(user_id)
            .bind(build_id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            > 0;

        let liked = if removed {
            sqlx::query("UPDATE builds SET likes_count = MAX(likes_count - 1, 0) WHERE id = $1")
                .bind(build_id)
                .execute(&mut *tx)
                .await?;
            false
        } else {
            sqlx::query("INSERT INTO build_likes (user_id, build_id) VALUES ($1, $2)")
                .bind(user_id)
                .bind(build_id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("UPDATE builds SET likes_count = likes_count + 1 WHERE id = $1")
                .bind(build_id)
                .execute(&mut *tx)
                .await?;
            true
        };

        tx.commit().await?;
        Ok(liked)
    }

    /// Returns whether the build is a favorite of `user_id` afterwards.
    pub async fn toggle_favorite(
        pool: &SqlitePool,
        build_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let removed =
            sqlx::query("DELETE FROM build_favorites WHERE user_id = $1 AND build_id = $2")
                .bind(user_id)
                .bind(build_id)
                .execute(pool)
                .await?
                .rows_affected()
                > 0;

        if removed {
            return Ok(false);
        }

        sqlx::query("INSERT INTO build_favorites (user_id, build_id) VALUES ($1, $2)")
            .bind(user_id)
            .bind(build_id)
            .execute(pool)
            .await?;
        Ok(true)
    }
}

impl BuildDetails {
    fn select(lang: &str) -> QueryBuilder<'static, Sqlite> {
        let mut builder = QueryBuilder::new(
            "SELECT b.id, b.user_id, b.armor_id, b.container_id, b.name, b.description, \
             b.is_public, b.is_template, b.likes_count, b.views_count, b.created_at, b.updated_at, \
             u.username AS author_username, \
             (SELECT name FROM armor_names WHERE armor_id = b.armor_id AND lang = ",
        );
        builder
            .push_bind(lang.to_string())
            .push(
                ") AS armor_name, a.icon_url AS armor_icon_url, \
                 (SELECT name FROM container_names WHERE container_id = b.container_id AND lang = ",
            )
            .push_bind(lang.to_string())
            .push(
                ") AS container_name, c.icon_url AS container_icon_url \
                 FROM builds b \
                 JOIN users u ON u.id = b.user_id \
                 JOIN armors a ON a.id = b.armor_id \
                 JOIN containers c ON c.id = b.container_id",
            );
        builder
    }

    /// Restrict to builds `viewer` may see: public ones and their own.
    fn push_visibility(builder: &mut QueryBuilder<'static, Sqlite>, viewer: Option<Uuid>) {
        builder.push(" AND (b.is_public = 1");
        if let Some(viewer) = viewer {
            builder.push(" OR b.user_id = ").push_bind(viewer);
        }
        builder.push(")");
    }

    pub async fn find(
        pool: &SqlitePool,
        id: Uuid,
        lang: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut builder = Self::select(lang);
        builder.push(" WHERE b.id = ").push_bind(id);

        let rows: Vec<BuildRow> = builder.build_query_as().fetch_all(pool).await?;
        Ok(Self::hydrate(pool, rows, lang).await?.into_iter().next())
    }

    /// `sort_column` must come from [`BuildFilter::sort_column`].
    pub async fn list(
        pool: &SqlitePool,
        filter: &BuildFilter,
        sort_column: &'static str,
        viewer: Option<Uuid>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let lang = filter.lang.as_deref().unwrap_or(DEFAULT_LANG);
        let order = filter.order.unwrap_or(SortOrder::Desc);

        let mut builder = Self::select(lang);
        builder.push(" WHERE 1 = 1");
        Self::push_visibility(&mut builder, viewer);

        if let Some(user_id) = filter.user_id {
            builder.push(" AND b.user_id = ").push_bind(user_id);
        }
        if let Some(is_public) = filter.is_public {
            builder.push(" AND b.is_public = ").push_bind(is_public);
        }
        if let Some(is_template) = filter.is_template {
            builder.push(" AND b.is_template = ").push_bind(is_template);
        }
        if let Some(tag) = filter.tags.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            builder
                .push(
                    " AND EXISTS (SELECT 1 FROM build_tags bt JOIN tags t ON t.id = bt.tag_id \
                     WHERE bt.build_id = b.id AND t.name = ",
                )
                .push_bind(tag.to_string())
                .push(")");
        }

        builder
            .push(format!(
                " ORDER BY b.{sort_column} {}, b.rowid {} LIMIT ",
                order.as_sql(),
                order.as_sql()
            ))
            .push_bind(clamp_limit(filter.limit, BUILD_DEFAULT_LIMIT))
            .push(" OFFSET ")
            .push_bind(clamp_offset(filter.offset));

        let rows: Vec<BuildRow> = builder.build_query_as().fetch_all(pool).await?;
        Self::hydrate(pool, rows, lang).await
    }

    /// Public builds ordered by views, then likes.
    pub async fn popular(
        pool: &SqlitePool,
        lang: &str,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut builder = Self::select(lang);
        builder
            .push(
                " WHERE b.is_public = 1 \
                 ORDER BY b.views_count DESC, b.likes_count DESC, b.created_at DESC LIMIT ",
            )
            .push_bind(limit);

        let rows: Vec<BuildRow> = builder.build_query_as().fetch_all(pool).await?;
        Self::hydrate(pool, rows, lang).await
    }

    /// Builds favorited by `user_id`, most recently favorited first.
    pub async fn favorites(
        pool: &SqlitePool,
        user_id: Uuid,
        lang: &str,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut builder = Self::select(lang);
        builder
            .push(" JOIN build_favorites f ON f.build_id = b.id AND f.user_id = ")
            .push_bind(user_id)
            .push(" WHERE 1 = 1");
        Self::push_visibility(&mut builder, Some(user_id));
        builder.push(" ORDER BY f.created_at DESC, f.rowid DESC");

        let rows: Vec<BuildRow> = builder.build_query_as().fetch_all(pool).await?;
        Self::hydrate(pool, rows, lang).await
    }

    async fn hydrate(
        pool: &SqlitePool,
        rows: Vec<BuildRow>,
        lang: &str,
    ) -> Result<Vec<Self>, sqlx::Error> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut artefacts = Self::artefact_slots_for(pool, &ids, lang).await?;
        let mut tags = Self::tags_for(pool, &ids).await?;

        Ok(rows
            .into_iter()
            .map(|row| BuildDetails {
                artefacts: artefacts.remove(&row.id).unwrap_or_default(),
                tags: tags.remove(&row.id).unwrap_or_default(),
                id: row.id,
                name: row.name,
                description: row.description,
                is_public: row.is_public,
                is_template: row.is_template,
                likes_count: row.likes_count,
                views_count: row.views_count,
                created_at: row.created_at,
                updated_at: row.updated_at,
                author: BuildAuthor {
                    id: row.user_id,
                    username: row.author_username,
                },
                armor: BuildItem {
                    id: row.armor_id,
                    name: row.armor_name,
                    icon_url: row.armor_icon_url,
                },
                container: BuildItem {
                    id: row.container_id,
                    name: row.container_name,
                    icon_url: row.container_icon_url,
                },
            })
            .collect())
    }

    async fn artefact_slots_for(
        pool: &SqlitePool,
        build_ids: &[Uuid],
        lang: &str,
    ) -> Result<HashMap<Uuid, Vec<BuildArtefactSlot>>, sqlx::Error> {
        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT ba.build_id, ba.slot, ba.artefact_id, an.name, ar.icon_url \
             FROM build_artefacts ba \
             JOIN artefacts ar ON ar.id = ba.artefact_id \
             LEFT JOIN artefact_names an ON an.artefact_id = ba.artefact_id AND an.lang = ",
        );
        builder.push_bind(lang.to_string()).push(" WHERE ba.build_id IN ");
        push_in_list(&mut builder, build_ids);
        builder.push(" ORDER BY ba.slot");

        let rows: Vec<(Uuid, i64, String, Option<String>, Option<String>)> =
            builder.build_query_as().fetch_all(pool).await?;

        let mut artefact_ids: Vec<String> = rows.iter().map(|r| r.2.clone()).collect();
        artefact_ids.sort();
        artefact_ids.dedup();
        let effects = if artefact_ids.is_empty() {
            HashMap::new()
        } else {
            Artefact::effects_for(pool, &artefact_ids).await?
        };

        let mut by_build: HashMap<Uuid, Vec<BuildArtefactSlot>> = HashMap::new();
        for (build_id, slot, artefact_id, name, icon_url) in rows {
            by_build.entry(build_id).or_default().push(BuildArtefactSlot {
                slot,
                effects: effects.get(&artefact_id).cloned().unwrap_or_default(),
                id: artefact_id,
                name,
                icon_url,
            });
        }
        Ok(by_build)
    }

    async fn tags_for(
        pool: &SqlitePool,
        build_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<String>>, sqlx::Error> {
        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT bt.build_id, t.name FROM build_tags bt \
             JOIN tags t ON t.id = bt.tag_id WHERE bt.build_id IN ",
        );
        push_in_list(&mut builder, build_ids);
        builder.push(" ORDER BY t.name");

        let rows: Vec<(Uuid, String)> = builder.build_query_as().fetch_all(pool).await?;
        let mut by_build: HashMap<Uuid, Vec<String>> = HashMap::new();
        for (build_id, name) in rows {
            by_build.entry(build_id).or_default().push(name);
        }
        Ok(by_build)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        DBService,
        models::test_fixtures::{create_user, seed_armor, seed_artefact, seed_container},
    };

    async fn seeded() -> DBService {
        let db = DBService::new_in_memory().await.unwrap();
        seed_armor(&db.pool, "armor1", "Ветеран").await;
        seed_container(&db.pool, "box1", Some(3)).await;
        seed_artefact(&db.pool, "art1", "artefact/gravity").await;
        seed_artefact(&db.pool, "art2", "artefact/thermal").await;
        db
    }

    fn new_build(name: &str, is_public: bool, tags: &[&str]) -> NewBuild {
        NewBuild {
            armor_id: "armor1".into(),
            container_id: "box1".into(),
            name: name.into(),
            description: None,
            is_public,
            is_template: false,
            artefact_ids: vec!["art2".into(), "art1".into()],
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    async fn insert(db: &DBService, user_id: Uuid, data: &NewBuild) -> Build {
        let mut conn = db.pool.acquire().await.unwrap();
        Build::create(&mut conn, user_id, data).await.unwrap()
    }

    #[tokio::test]
    async fn details_resolve_names_slots_and_tags() {
        let db = seeded().await;
        let user = create_user(&db.pool, "alice").await;
        let build = insert(&db, user.id, &new_build("Tank", true, &["pvp", "tank"])).await;

        let details = BuildDetails::find(&db.pool, build.id, "ru").await.unwrap().unwrap();
        assert_eq!(details.author.username, "alice");
        assert_eq!(details.armor.name.as_deref(), Some("Броня armor1"));
        assert_eq!(details.container.name.as_deref(), Some("Контейнер box1"));
        assert_eq!(details.tags, vec!["pvp", "tank"]);

        let slots: Vec<_> = details.artefacts.iter().map(|a| (a.slot, a.id.as_str())).collect();
        assert_eq!(slots, [(0, "art2"), (1, "art1")]);
        assert_eq!(details.artefacts[0].effects.len(), 1);
    }

    #[tokio::test]
    async fn private_builds_are_only_listed_for_their_owner() {
        let db = seeded().await;
        let alice = create_user(&db.pool, "alice").await;
        let bob = create_user(&db.pool, "bob").await;
        insert(&db, alice.id, &new_build("Secret", false, &[])).await;
        insert(&db, alice.id, &new_build("Shared", true, &[])).await;

        let filter = BuildFilter::default();
        let column = filter.sort_column().unwrap();

        let for_bob = BuildDetails::list(&db.pool, &filter, column, Some(bob.id)).await.unwrap();
        assert_eq!(for_bob.len(), 1);
        assert_eq!(for_bob[0].name, "Shared");

        let for_alice = BuildDetails::list(&db.pool, &filter, column, Some(alice.id))
            .await
            .unwrap();
        assert_eq!(for_alice.len(), 2);
        assert_eq!(for_alice[0].name, "Shared", "newest first by default");
    }

    #[tokio::test]
    async fn list_filters_by_tag() {
        let db = seeded().await;
        let user = create_user(&db.pool, "alice").await;
        insert(&db, user.id, &new_build("A", true, &["pvp"])).await;
        insert(&db, user.id, &new_build("B", true, &["pve"])).await;

        let filter = BuildFilter {
            tags: Some("pve".into()),
            ..Default::default()
        };
        let list = BuildDetails::list(&db.pool, &filter, filter.sort_column().unwrap(), None)
            .await
            .unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].name, "B");
    }

    #[tokio::test]
    async fn like_toggle_keeps_counter_in_step() {
        let db = seeded().await;
        let alice = create_user(&db.pool, "alice").await;
        let bob = create_user(&db.pool, "bob").await;
        let build = insert(&db, alice.id, &new_build("Tank", true, &[])).await;

        assert!(Build::toggle_like(&db.pool, build.id, bob.id).await.unwrap());
        assert!(Build::toggle_like(&db.pool, build.id, alice.id).await.unwrap());
        assert!(!Build::toggle_like(&db.pool, build.id, bob.id).await.unwrap());

        let build = Build::find_by_id(&db.pool, build.id).await.unwrap().unwrap();
        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM build_likes WHERE build_id = $1")
            .bind(build.id)
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(build.likes_count, 1);
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn popular_orders_by_views_then_likes() {
        let db = seeded().await;
        let user = create_user(&db.pool, "alice").await;
        let quiet = insert(&db, user.id, &new_build("Quiet", true, &[])).await;
        let viewed = insert(&db, user.id, &new_build("Viewed", true, &[])).await;
        let hidden = insert(&db, user.id, &new_build("Hidden", false, &[])).await;

        Build::increment_views(&db.pool, viewed.id).await.unwrap();
        Build::increment_views(&db.pool, hidden.id).await.unwrap();
        Build::toggle_like(&db.pool, quiet.id, user.id).await.unwrap();

        let popular = BuildDetails::popular(&db.pool, "ru", 10).await.unwrap();
        let names: Vec<_> = popular.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, ["Viewed", "Quiet"]);
    }

    #[tokio::test]
    async fn favorites_toggle_and_list() {
        let db = seeded().await;
        let user = create_user(&db.pool, "alice").await;
        let build = insert(&db, user.id, &new_build("Tank", true, &[])).await;

        assert!(Build::toggle_favorite(&db.pool, build.id, user.id).await.unwrap());
        assert_eq!(BuildDetails::favorites(&db.pool, user.id, "ru").await.unwrap().len(), 1);

        assert!(!Build::toggle_favorite(&db.pool, build.id, user.id).await.unwrap());
        assert!(BuildDetails::favorites(&db.pool, user.id, "ru").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn deleting_a_build_removes_children() {
        let db = seeded().await;
        let user = create_user(&db.pool, "alice").await;
        let build = insert(&db, user.id, &new_build("Tank", true, &["pvp"])).await;

        assert!(Build::delete(&db.pool, build.id).await.unwrap());
        assert!(Build::artefact_ids(&db.pool, build.id).await.unwrap().is_empty());
        assert!(Build::tag_names(&db.pool, build.id).await.unwrap().is_empty());
        assert!(!Build::delete(&db.pool, build.id).await.unwrap());
    }

    #[tokio::test]
    async fn popular_tags_ignore_private_builds() {
        let db = seeded().await;
        let alice = create_user(&db.pool, "alice").await;
        insert(&db, alice.id, &new_build("Plan", false, &["raid-plan"])).await;
        insert(&db, alice.id, &new_build("Tank", true, &["pvp"])).await;
        insert(&db, alice.id, &new_build("Tank 2", true, &["pvp"])).await;
        let unused = insert(&db, alice.id, &new_build("Gone", true, &["stale"])).await;
        Build::delete(&db.pool, unused.id).await.unwrap();

        let tags = Tag::popular(&db.pool, 10).await.unwrap();
        let counts: Vec<_> = tags.iter().map(|t| (t.name.as_str(), t.build_count)).collect();
        assert_eq!(counts, [("pvp", 2)]);
    }
}
