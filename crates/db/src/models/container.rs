use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use ts_rs::TS;

use super::item::{
    DEFAULT_LANG, InvalidSortField, ItemName, ItemStat, LocalizedName, SortOrder, clamp_limit,
    clamp_offset, push_equal_filters, push_in_list, resolve_sort,
};

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Container {
    pub id: String,
    pub category: String,
    pub container_class: Option<String>,
    pub rank: Option<String>,
    pub color: Option<String>,
    pub state: Option<String>,
    /// Number of artefact slots.
    pub capacity: Option<i64>,
    pub weight: Option<f64>,
    pub price: Option<f64>,
    pub description: Option<String>,
    pub icon_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct UpsertContainer {
    pub id: String,
    pub category: String,
    pub container_class: Option<String>,
    pub rank: Option<String>,
    pub color: Option<String>,
    pub state: Option<String>,
    pub capacity: Option<i64>,
    pub weight: Option<f64>,
    pub price: Option<f64>,
    pub description: Option<String>,
    pub icon_url: Option<String>,
    pub names: Vec<LocalizedName>,
    pub stats: Vec<ItemStat>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct ContainerFilter {
    pub rank: Option<String>,
    pub container_class: Option<String>,
    pub color: Option<String>,
    pub state: Option<String>,
    pub lang: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub sort: Option<String>,
    pub order: Option<SortOrder>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ContainerListItem {
    pub id: String,
    pub rank: Option<String>,
    pub container_class: Option<String>,
    pub capacity: Option<i64>,
    /// `capacity`, or 0 when the sync could not read it.
    pub slots: i64,
    pub icon_url: Option<String>,
    pub names: Vec<ItemName>,
    pub stats: Vec<ItemStat>,
}

pub const CONTAINER_SORT_COLUMNS: &[&str] = &[
    "id",
    "rank",
    "container_class",
    "capacity",
    "color",
    "state",
    "weight",
    "price",
];

const CONTAINER_DEFAULT_LIMIT: i64 = 20;

const CONTAINER_COLUMNS: &str = "id, category, container_class, rank, color, state, capacity, \
                                 weight, price, description, icon_url, updated_at";

impl ContainerFilter {
    pub fn sort_column(&self) -> Result<&'static str, InvalidSortField> {
        resolve_sort(self.sort.as_deref(), CONTAINER_SORT_COLUMNS, "rank")
    }
}

impl Container {
    pub async fn upsert(
        conn: &mut SqliteConnection,
        data: &UpsertContainer,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"INSERT INTO containers (id, category, container_class, rank, color, state, capacity, weight, price, description, icon_url)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
               ON CONFLICT(id) DO UPDATE SET
                   category = excluded.category,
                   container_class = excluded.container_class,
                   rank = excluded.rank,
                   color = excluded.color,
                   state = excluded.state,
                   capacity = excluded.capacity,
                   weight = excluded.weight,
                   price = excluded.price,
                   description = excluded.description,
                   icon_url = excluded.icon_url,
                   updated_at = datetime('now', 'subsec')"#,
        )
        .bind(&data.id)
        .bind(&data.category)
        .bind(&data.container_class)
        .bind(&data.rank)
        .bind(&data.color)
        .bind(&data.state)
        .bind(data.capacity)
        .bind(data.weight)
        .bind(data.price)
        .bind(&data.description)
        .bind(&data.icon_url)
        .execute(&mut *conn)
        .await?;

        sqlx::query("DELETE FROM container_names WHERE container_id = $1")
            .bind(&data.id)
            .execute(&mut *conn)
            .await?;
        sqlx::query("DELETE FROM container_stats WHERE container_id = $1")
            .bind(&data.id)
            .execute(&mut *conn)
            .await?;

        for name in &data.names {
            sqlx::query(
                "INSERT INTO container_names (container_id, lang, name) VALUES ($1, $2, $3)",
            )
            .bind(&data.id)
            .bind(&name.lang)
            .bind(&name.name)
            .execute(&mut *conn)
            .await?;
        }

        for stat in &data.stats {
            sqlx::query(
                "INSERT INTO container_stats (container_id, stat_key, value) VALUES ($1, $2, $3)",
            )
            .bind(&data.id)
            .bind(&stat.stat_key)
            .bind(stat.value)
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Container>(&format!(
            "SELECT {CONTAINER_COLUMNS} FROM containers WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// `sort_column` must come from [`ContainerFilter::sort_column`].
    pub async fn list(
        pool: &SqlitePool,
        filter: &ContainerFilter,
        sort_column: &'static str,
    ) -> Result<Vec<ContainerListItem>, sqlx::Error> {
        let lang = filter.lang.as_deref().unwrap_or(DEFAULT_LANG);
        let order = filter.order.unwrap_or(SortOrder::Asc);

        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {CONTAINER_COLUMNS} FROM containers WHERE 1 = 1"
        ));
        push_equal_filters(
            &mut builder,
            &[
                ("rank", filter.rank.as_deref()),
                ("container_class", filter.container_class.as_deref()),
                ("color", filter.color.as_deref()),
                ("state", filter.state.as_deref()),
            ],
        );
        builder
            .push(format!(" ORDER BY {sort_column} {}, id ASC LIMIT ", order.as_sql()))
            .push_bind(clamp_limit(filter.limit, CONTAINER_DEFAULT_LIMIT))
            .push(" OFFSET ")
            .push_bind(clamp_offset(filter.offset));

        let containers: Vec<Container> = builder.build_query_as().fetch_all(pool).await?;
        if containers.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = containers.iter().map(|c| c.id.clone()).collect();
        let mut names = Self::names_for(pool, &ids, lang).await?;
        let mut stats = Self::stats_for(pool, &ids).await?;

        Ok(containers
            .into_iter()
            .map(|c| ContainerListItem {
                names: names.remove(&c.id).unwrap_or_default(),
                stats: stats.remove(&c.id).unwrap_or_default(),
                slots: c.capacity.unwrap_or(0),
                id: c.id,
                rank: c.rank,
                container_class: c.container_class,
                capacity: c.capacity,
                icon_url: c.icon_url,
            })
            .collect())
    }

    pub async fn names_for(
        pool: &SqlitePool,
        ids: &[String],
        lang: &str,
    ) -> Result<HashMap<String, Vec<ItemName>>, sqlx::Error> {
        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT container_id, name FROM container_names WHERE lang = ",
        );
        builder.push_bind(lang.to_string()).push(" AND container_id IN ");
        push_in_list(&mut builder, ids);

        let rows: Vec<(String, String)> = builder.build_query_as().fetch_all(pool).await?;
        let mut by_id: HashMap<String, Vec<ItemName>> = HashMap::new();
        for (container_id, name) in rows {
            by_id.entry(container_id).or_default().push(ItemName { name });
        }
        Ok(by_id)
    }

    async fn stats_for(
        pool: &SqlitePool,
        ids: &[String],
    ) -> Result<HashMap<String, Vec<ItemStat>>, sqlx::Error> {
        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT container_id, stat_key, value FROM container_stats WHERE container_id IN ",
        );
        push_in_list(&mut builder, ids);
        builder.push(" ORDER BY stat_key");

        let rows: Vec<(String, String, f64)> = builder.build_query_as().fetch_all(pool).await?;
        let mut by_id: HashMap<String, Vec<ItemStat>> = HashMap::new();
        for (container_id, stat_key, value) in rows {
            by_id
                .entry(container_id)
                .or_default()
                .push(ItemStat { stat_key, value });
        }
        Ok(by_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DBService, models::test_fixtures::seed_container};

    #[tokio::test]
    async fn slots_default_to_zero_without_capacity() {
        let db = DBService::new_in_memory().await.unwrap();
        seed_container(&db.pool, "c1", Some(4)).await;
        seed_container(&db.pool, "c2", None).await;

        let filter = ContainerFilter {
            sort: Some("capacity".into()),
            order: Some(SortOrder::Desc),
            ..Default::default()
        };
        let list = Container::list(&db.pool, &filter, filter.sort_column().unwrap())
            .await
            .unwrap();

        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, "c1");
        assert_eq!(list[0].slots, 4);
        assert_eq!(list[1].slots, 0);
    }

    #[tokio::test]
    async fn default_page_size_is_twenty() {
        let db = DBService::new_in_memory().await.unwrap();
        for i in 0..25 {
            seed_container(&db.pool, &format!("c{i:02}"), Some(2)).await;
        }

        let filter = ContainerFilter::default();
        let list = Container::list(&db.pool, &filter, filter.sort_column().unwrap())
            .await
            .unwrap();
        assert_eq!(list.len(), 20);
    }
}
