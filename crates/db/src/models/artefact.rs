use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use ts_rs::TS;

use super::item::{
    DEFAULT_LANG, InvalidSortField, ItemName, LocalizedName, SortOrder, clamp_limit, clamp_offset,
    push_equal_filters, push_in_list, resolve_sort,
};

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Artefact {
    pub id: String,
    pub category: String,
    pub artefact_class: Option<String>,
    pub rank: Option<String>,
    pub color: Option<String>,
    pub state: Option<String>,
    pub weight: Option<f64>,
    pub price: Option<f64>,
    pub description: Option<String>,
    pub icon_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// One effect of an artefact. Threshold effects apply a fixed value; the
/// others roll between `min_value` and `max_value` with artefact quality.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize, TS)]
pub struct ArtefactEffect {
    pub effect_key: String,
    pub min_value: f64,
    pub max_value: f64,
    pub is_threshold: bool,
}

#[derive(Debug, Clone, Default)]
pub struct UpsertArtefact {
    pub id: String,
    pub category: String,
    pub artefact_class: Option<String>,
    pub rank: Option<String>,
    pub color: Option<String>,
    pub state: Option<String>,
    pub weight: Option<f64>,
    pub price: Option<f64>,
    pub description: Option<String>,
    pub icon_url: Option<String>,
    pub names: Vec<LocalizedName>,
    pub effects: Vec<ArtefactEffect>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct ArtefactFilter {
    pub category: Option<String>,
    pub artefact_class: Option<String>,
    pub color: Option<String>,
    pub state: Option<String>,
    pub lang: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub sort: Option<String>,
    pub order: Option<SortOrder>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ArtefactListItem {
    pub id: String,
    pub category: String,
    pub artefact_class: Option<String>,
    pub rank: Option<String>,
    pub color: Option<String>,
    pub state: Option<String>,
    pub weight: Option<f64>,
    pub price: Option<f64>,
    pub description: Option<String>,
    pub icon_url: Option<String>,
    pub names: Vec<ItemName>,
    pub effects: Vec<ArtefactEffect>,
}

pub const ARTEFACT_SORT_COLUMNS: &[&str] = &[
    "id",
    "category",
    "artefact_class",
    "rank",
    "color",
    "state",
    "weight",
    "price",
];

const ARTEFACT_DEFAULT_LIMIT: i64 = 1000;

const ARTEFACT_COLUMNS: &str = "id, category, artefact_class, rank, color, state, weight, price, \
                                description, icon_url, updated_at";

impl ArtefactFilter {
    pub fn sort_column(&self) -> Result<&'static str, InvalidSortField> {
        resolve_sort(self.sort.as_deref(), ARTEFACT_SORT_COLUMNS, "category")
    }
}

impl Artefact {
    pub async fn upsert(
        conn: &mut SqliteConnection,
        data: &UpsertArtefact,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"INSERT INTO artefacts (id, category, artefact_class, rank, color, state, weight, price, description, icon_url)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
               ON CONFLICT(id) DO UPDATE SET
                   category = excluded.category,
                   artefact_class = excluded.artefact_class,
                   rank = excluded.rank,
                   color = excluded.color,
                   state = excluded.state,
                   weight = excluded.weight,
                   price = excluded.price,
                   description = excluded.description,
                   icon_url = excluded.icon_url,
                   updated_at = datetime('now', 'subsec')"#,
        )
        .bind(&data.id)
        .bind(&data.category)
        .bind(&data.artefact_class)
        .bind(&data.rank)
        .bind(&data.color)
        .bind(&data.state)
        .bind(data.weight)
        .bind(data.price)
        .bind(&data.description)
        .bind(&data.icon_url)
        .execute(&mut *conn)
        .await?;

        sqlx::query("DELETE FROM artefact_names WHERE artefact_id = $1")
            .bind(&data.id)
            .execute(&mut *conn)
            .await?;
        sqlx::query("DELETE FROM artefact_effects WHERE artefact_id = $1")
            .bind(&data.id)
            .execute(&mut *conn)
            .await?;

        for name in &data.names {
            sqlx::query("INSERT INTO artefact_names (artefact_id, lang, name) VALUES ($1, $2, $3)")
                .bind(&data.id)
                .bind(&name.lang)
                .bind(&name.name)
                .execute(&mut *conn)
                .await?;
        }

        for effect in &data.effects {
            sqlx::query(
                r#"INSERT INTO artefact_effects (artefact_id, effect_key, min_value, max_value, is_threshold)
                   VALUES ($1, $2, $3, $4, $5)"#,
            )
            .bind(&data.id)
            .bind(&effect.effect_key)
            .bind(effect.min_value)
            .bind(effect.max_value)
            .bind(effect.is_threshold)
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Artefact>(&format!(
            "SELECT {ARTEFACT_COLUMNS} FROM artefacts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Ids from `ids` that have no artefact row.
    pub async fn missing_ids(pool: &SqlitePool, ids: &[String]) -> Result<Vec<String>, sqlx::Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder = QueryBuilder::<Sqlite>::new("SELECT id FROM artefacts WHERE id IN ");
        push_in_list(&mut builder, ids);
        let found: Vec<String> = builder.build_query_scalar().fetch_all(pool).await?;

        let mut missing: Vec<String> = ids.iter().filter(|id| !found.contains(id)).cloned().collect();
        missing.dedup();
        Ok(missing)
    }

    /// `sort_column` must come from [`ArtefactFilter::sort_column`].
    pub async fn list(
        pool: &SqlitePool,
        filter: &ArtefactFilter,
        sort_column: &'static str,
    ) -> Result<Vec<ArtefactListItem>, sqlx::Error> {
        let lang = filter.lang.as_deref().unwrap_or(DEFAULT_LANG);
        let order = filter.order.unwrap_or(SortOrder::Asc);

        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {ARTEFACT_COLUMNS} FROM artefacts WHERE 1 = 1"
        ));
        push_equal_filters(
            &mut builder,
            &[
                ("category", filter.category.as_deref()),
                ("artefact_class", filter.artefact_class.as_deref()),
                ("color", filter.color.as_deref()),
                ("state", filter.state.as_deref()),
            ],
        );
        builder
            .push(format!(" ORDER BY {sort_column} {}, id ASC LIMIT ", order.as_sql()))
            .push_bind(clamp_limit(filter.limit, ARTEFACT_DEFAULT_LIMIT))
            .push(" OFFSET ")
            .push_bind(clamp_offset(filter.offset));

        let artefacts: Vec<Artefact> = builder.build_query_as().fetch_all(pool).await?;
        if artefacts.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = artefacts.iter().map(|a| a.id.clone()).collect();
        let mut names = Self::names_for(pool, &ids, lang).await?;
        let mut effects = Self::effects_for(pool, &ids).await?;

        Ok(artefacts
            .into_iter()
            .map(|a| ArtefactListItem {
                names: names.remove(&a.id).unwrap_or_default(),
                effects: effects.remove(&a.id).unwrap_or_default(),
                id: a.id,
                category: a.category,
                artefact_class: a.artefact_class,
                rank: a.rank,
                color: a.color,
                state: a.state,
                weight: a.weight,
                price: a.price,
                description: a.description,
                icon_url: a.icon_url,
            })
            .collect())
    }

    pub async fn names_for(
        pool: &SqlitePool,
        ids: &[String],
        lang: &str,
    ) -> Result<HashMap<String, Vec<ItemName>>, sqlx::Error> {
        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT artefact_id, name FROM artefact_names WHERE lang = ",
        );
        builder.push_bind(lang.to_string()).push(" AND artefact_id IN ");
        push_in_list(&mut builder, ids);

        let rows: Vec<(String, String)> = builder.build_query_as().fetch_all(pool).await?;
        let mut by_id: HashMap<String, Vec<ItemName>> = HashMap::new();
        for (artefact_id, name) in rows {
            by_id.entry(artefact_id).or_default().push(ItemName { name });
        }
        Ok(by_id)
    }

    pub async fn effects_for(
        pool: &SqlitePool,
        ids: &[String],
    ) -> Result<HashMap<String, Vec<ArtefactEffect>>, sqlx::Error> {
        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT artefact_id, effect_key, min_value, max_value, is_threshold \
             FROM artefact_effects WHERE artefact_id IN ",
        );
        push_in_list(&mut builder, ids);
        builder.push(" ORDER BY effect_key");

        let rows: Vec<(String, String, f64, f64, bool)> =
            builder.build_query_as().fetch_all(pool).await?;
        let mut by_id: HashMap<String, Vec<ArtefactEffect>> = HashMap::new();
        for (artefact_id, effect_key, min_value, max_value, is_threshold) in rows {
            by_id.entry(artefact_id).or_default().push(ArtefactEffect {
                effect_key,
                min_value,
                max_value,
                is_threshold,
            });
        }
        Ok(by_id)
    }
}
