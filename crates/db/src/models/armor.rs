use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use ts_rs::TS;

use super::item::{
    DEFAULT_LANG, ItemName, ItemStat, LocalizedName, clamp_limit, clamp_offset, push_equal_filters,
    push_in_list,
};

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Armor {
    pub id: String,
    pub category: String,
    pub class: Option<String>,
    pub rank: Option<String>,
    pub color: Option<String>,
    pub state: Option<String>,
    pub weight: Option<f64>,
    pub durability: Option<f64>,
    pub price: Option<f64>,
    pub description: Option<String>,
    pub icon_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Everything the item sync writes for one armor.
#[derive(Debug, Clone, Default)]
pub struct UpsertArmor {
    pub id: String,
    pub category: String,
    pub class: Option<String>,
    pub rank: Option<String>,
    pub color: Option<String>,
    pub state: Option<String>,
    pub weight: Option<f64>,
    pub durability: Option<f64>,
    pub price: Option<f64>,
    pub description: Option<String>,
    pub icon_url: Option<String>,
    pub names: Vec<LocalizedName>,
    pub stats: Vec<ItemStat>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct ArmorFilter {
    pub rank: Option<String>,
    pub class: Option<String>,
    pub color: Option<String>,
    pub state: Option<String>,
    pub lang: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ArmorListItem {
    pub id: String,
    pub names: Vec<ItemName>,
    pub class: Option<String>,
    pub rank: Option<String>,
    pub icon_url: Option<String>,
    pub stats: Vec<ItemStat>,
}

const ARMOR_DEFAULT_LIMIT: i64 = 1000;

impl Armor {
    /// Insert or update the armor row and replace its names and stats.
    ///
    /// Runs on the caller's connection so the item sync can wrap it in a transaction.
    pub async fn upsert(conn: &mut SqliteConnection, data: &UpsertArmor) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"INSERT INTO armors (id, category, class, rank, color, state, weight, durability, price, description, icon_url)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
               ON CONFLICT(id) DO UPDATE SET
                   category = excluded.category,
                   class = excluded.class,
                   rank = excluded.rank,
                   color = excluded.color,
                   state = excluded.state,
                   weight = excluded.weight,
                   durability = excluded.durability,
                   price = excluded.price,
                   description = excluded.description,
                   icon_url = excluded.icon_url,
                   updated_at = datetime('now', 'subsec')"#,
        )
        .bind(&data.id)
        .bind(&data.category)
        .bind(&data.class)
        .bind(&data.rank)
        .bind(&data.color)
        .bind(&data.state)
        .bind(data.weight)
        .bind(data.durability)
        .bind(data.price)
        .bind(&data.description)
        .bind(&data.icon_url)
        .execute(&mut *conn)
        .await?;

        sqlx::query("DELETE FROM armor_names WHERE armor_id = $1")
            .bind(&data.id)
            .execute(&mut *conn)
            .await?;
        sqlx::query("DELETE FROM armor_stats WHERE armor_id = $1")
            .bind(&data.id)
            .execute(&mut *conn)
            .await?;

        for name in &data.names {
            sqlx::query("INSERT INTO armor_names (armor_id, lang, name) VALUES ($1, $2, $3)")
                .bind(&data.id)
                .bind(&name.lang)
                .bind(&name.name)
                .execute(&mut *conn)
                .await?;
        }

        for stat in &data.stats {
            sqlx::query("INSERT INTO armor_stats (armor_id, stat_key, value) VALUES ($1, $2, $3)")
                .bind(&data.id)
                .bind(&stat.stat_key)
                .bind(stat.value)
                .execute(&mut *conn)
                .await?;
        }

        Ok(())
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Armor>(
            r#"SELECT id, category, class, rank, color, state, weight, durability, price,
                      description, icon_url, updated_at
               FROM armors
               WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn list(
        pool: &SqlitePool,
        filter: &ArmorFilter,
    ) -> Result<Vec<ArmorListItem>, sqlx::Error> {
        let lang = filter.lang.as_deref().unwrap_or(DEFAULT_LANG);

        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT id, category, class, rank, color, state, weight, durability, price, \
             description, icon_url, updated_at FROM armors WHERE 1 = 1",
        );
        push_equal_filters(
            &mut builder,
            &[
                ("rank", filter.rank.as_deref()),
                ("class", filter.class.as_deref()),
                ("color", filter.color.as_deref()),
                ("state", filter.state.as_deref()),
            ],
        );
        builder
            .push(" ORDER BY rank ASC, id ASC LIMIT ")
            .push_bind(clamp_limit(filter.limit, ARMOR_DEFAULT_LIMIT))
            .push(" OFFSET ")
            .push_bind(clamp_offset(filter.offset));

        let armors: Vec<Armor> = builder.build_query_as().fetch_all(pool).await?;
        if armors.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = armors.iter().map(|a| a.id.clone()).collect();
        let mut names = Self::names_for(pool, &ids, lang).await?;
        let mut stats = Self::stats_for(pool, &ids).await?;

        Ok(armors
            .into_iter()
            .map(|armor| ArmorListItem {
                names: names.remove(&armor.id).unwrap_or_default(),
                stats: stats.remove(&armor.id).unwrap_or_default(),
                id: armor.id,
                class: armor.class,
                rank: armor.rank,
                icon_url: armor.icon_url,
            })
            .collect())
    }

    pub async fn names_for(
        pool: &SqlitePool,
        ids: &[String],
        lang: &str,
    ) -> Result<HashMap<String, Vec<ItemName>>, sqlx::Error> {
        let mut builder =
            QueryBuilder::<Sqlite>::new("SELECT armor_id, name FROM armor_names WHERE lang = ");
        builder.push_bind(lang.to_string()).push(" AND armor_id IN ");
        push_in_list(&mut builder, ids);

        let rows: Vec<(String, String)> = builder.build_query_as().fetch_all(pool).await?;
        let mut by_id: HashMap<String, Vec<ItemName>> = HashMap::new();
        for (armor_id, name) in rows {
            by_id.entry(armor_id).or_default().push(ItemName { name });
        }
        Ok(by_id)
    }

    async fn stats_for(
        pool: &SqlitePool,
        ids: &[String],
    ) -> Result<HashMap<String, Vec<ItemStat>>, sqlx::Error> {
        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT armor_id, stat_key, value FROM armor_stats WHERE armor_id IN ",
        );
        push_in_list(&mut builder, ids);
        builder.push(" ORDER BY stat_key");

        let rows: Vec<(String, String, f64)> = builder.build_query_as().fetch_all(pool).await?;
        let mut by_id: HashMap<String, Vec<ItemStat>> = HashMap::new();
        for (armor_id, stat_key, value) in rows {
            by_id
                .entry(armor_id)
                .or_default()
                .push(ItemStat { stat_key, value });
        }
        Ok(by_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DBService, models::test_fixtures::seed_armor};

    #[tokio::test]
    async fn upsert_replaces_children() {
        let db = DBService::new_in_memory().await.unwrap();
        seed_armor(&db.pool, "a1", "Ветеран").await;

        let mut conn = db.pool.acquire().await.unwrap();
        Armor::upsert(
            &mut conn,
            &UpsertArmor {
                id: "a1".into(),
                category: "armor/combat".into(),
                rank: Some("Мастер".into()),
                names: vec![LocalizedName {
                    lang: "en".into(),
                    name: "Exoskeleton".into(),
                }],
                stats: vec![ItemStat {
                    stat_key: "armor.bullet".into(),
                    value: 42.0,
                }],
                ..Default::default()
            },
        )
        .await
        .unwrap();
        drop(conn);

        let ru = Armor::list(&db.pool, &ArmorFilter::default()).await.unwrap();
        assert_eq!(ru.len(), 1);
        assert_eq!(ru[0].rank.as_deref(), Some("Мастер"));
        assert!(ru[0].names.is_empty(), "ru name from the first sync must be gone");
        assert_eq!(ru[0].stats.len(), 1);
        assert_eq!(ru[0].stats[0].value, 42.0);

        let en = Armor::list(
            &db.pool,
            &ArmorFilter {
                lang: Some("en".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(en[0].names[0].name, "Exoskeleton");
    }

    #[tokio::test]
    async fn list_filters_by_rank() {
        let db = DBService::new_in_memory().await.unwrap();
        seed_armor(&db.pool, "a1", "Ветеран").await;
        seed_armor(&db.pool, "a2", "Новичок").await;

        let veterans = Armor::list(
            &db.pool,
            &ArmorFilter {
                rank: Some("Ветеран".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(veterans.len(), 1);
        assert_eq!(veterans[0].id, "a1");
        assert_eq!(veterans[0].names[0].name, "Броня a1");
    }
}
