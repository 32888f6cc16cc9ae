use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize, TS)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct TagUsage {
    pub id: Uuid,
    pub name: String,
    pub build_count: i64,
}

/// Trim names, drop empty ones and duplicates, keep first-seen order.
pub fn normalize_tag_names(names: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        let name = name.trim();
        if !name.is_empty() && !normalized.iter().any(|n| n == name) {
            normalized.push(name.to_string());
        }
    }
    normalized
}

impl Tag {
    pub async fn find_or_create(
        conn: &mut SqliteConnection,
        name: &str,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query("INSERT INTO tags (id, name) VALUES ($1, $2) ON CONFLICT(name) DO NOTHING")
            .bind(Uuid::new_v4())
            .bind(name)
            .execute(&mut *conn)
            .await?;

        sqlx::query_as::<_, Tag>("SELECT id, name FROM tags WHERE name = $1")
            .bind(name)
            .fetch_one(&mut *conn)
            .await
    }

    /// Replace the tags of `build_id` with `names` (already normalized).
    pub async fn set_for_build(
        conn: &mut SqliteConnection,
        build_id: Uuid,
        names: &[String],
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM build_tags WHERE build_id = $1")
            .bind(build_id)
            .execute(&mut *conn)
            .await?;

        for name in names {
            let tag = Self::find_or_create(&mut *conn, name).await?;
            sqlx::query("INSERT INTO build_tags (build_id, tag_id) VALUES ($1, $2)")
                .bind(build_id)
                .bind(tag.id)
                .execute(&mut *conn)
                .await?;
        }

        Ok(())
    }

    /// Tags ranked by how many public builds carry them. Private builds are not counted.
    pub async fn popular(pool: &SqlitePool, limit: i64) -> Result<Vec<TagUsage>, sqlx::Error> {
        sqlx::query_as::<_, TagUsage>(
            r#"SELECT t.id, t.name, COUNT(bt.build_id) AS build_count
               FROM tags t
               JOIN build_tags bt ON bt.tag_id = t.id
               JOIN builds b ON b.id = bt.build_id AND b.is_public = 1
               GROUP BY t.id, t.name
               ORDER BY build_count DESC, t.name ASC
               LIMIT $1"#,
        )
        .bind(limit)
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DBService;

    #[test]
    fn normalization_trims_and_dedupes() {
        let names = vec![
            " pvp ".to_string(),
            "pvp".to_string(),
            "".to_string(),
            "   ".to_string(),
            "tank".to_string(),
        ];
        assert_eq!(normalize_tag_names(&names), vec!["pvp", "tank"]);
    }

    #[tokio::test]
    async fn find_or_create_is_idempotent() {
        let db = DBService::new_in_memory().await.unwrap();
        let mut conn = db.pool.acquire().await.unwrap();

        let first = Tag::find_or_create(&mut conn, "pvp").await.unwrap();
        let second = Tag::find_or_create(&mut conn, "pvp").await.unwrap();
        assert_eq!(first, second);
    }
}
