//! Pieces shared by the three item families (armor, artefacts, containers).

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite};
use thiserror::Error;
use ts_rs::TS;

/// Language used when a request does not name one.
pub const DEFAULT_LANG: &str = "ru";

/// Upper bound applied to every catalog `limit`.
pub const MAX_PAGE_SIZE: i64 = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct LocalizedName {
    pub lang: String,
    pub name: String,
}

/// A name already filtered to the requested language.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize, TS)]
pub struct ItemName {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize, TS)]
pub struct ItemStat {
    pub stat_key: String,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("cannot sort by '{field}', expected one of: {}", allowed.join(", "))]
pub struct InvalidSortField {
    pub field: String,
    pub allowed: &'static [&'static str],
}

/// Map a user supplied sort field onto a known column name.
pub fn resolve_sort(
    requested: Option<&str>,
    allowed: &'static [&'static str],
    default: &'static str,
) -> Result<&'static str, InvalidSortField> {
    match requested.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(default),
        Some(field) => allowed
            .iter()
            .copied()
            .find(|column| *column == field)
            .ok_or_else(|| InvalidSortField {
                field: field.to_string(),
                allowed,
            }),
    }
}

pub fn clamp_limit(limit: Option<i64>, default: i64) -> i64 {
    limit.unwrap_or(default).clamp(1, MAX_PAGE_SIZE)
}

pub fn clamp_offset(offset: Option<i64>) -> i64 {
    offset.unwrap_or(0).max(0)
}

/// Push `AND column = value` for every filter that is set.
pub(crate) fn push_equal_filters<'a>(
    builder: &mut QueryBuilder<'a, Sqlite>,
    filters: &[(&'static str, Option<&'a str>)],
) {
    for (column, value) in filters {
        if let Some(value) = value {
            builder.push(" AND ").push(*column).push(" = ").push_bind(*value);
        }
    }
}

/// Push `(v1, v2, ...)` for an `IN` clause.
pub(crate) fn push_in_list<'a, T>(builder: &mut QueryBuilder<'a, Sqlite>, values: &[T])
where
    T: sqlx::Encode<'a, Sqlite> + sqlx::Type<Sqlite> + Clone + 'a,
{
    builder.push("(");
    let mut separated = builder.separated(", ");
    for value in values {
        separated.push_bind(value.clone());
    }
    separated.push_unseparated(")");
}

#[cfg(test)]
mod tests {
    use super::*;

    const COLUMNS: &[&str] = &["rank", "category"];

    #[test]
    fn missing_sort_uses_default() {
        assert_eq!(resolve_sort(None, COLUMNS, "rank").unwrap(), "rank");
        assert_eq!(resolve_sort(Some("  "), COLUMNS, "rank").unwrap(), "rank");
    }

    #[test]
    fn unknown_sort_field_is_rejected() {
        let err = resolve_sort(Some("rank; DROP TABLE armors"), COLUMNS, "rank").unwrap_err();
        assert_eq!(err.allowed, COLUMNS);
        assert!(err.to_string().contains("rank, category"));
    }

    #[test]
    fn limit_is_clamped() {
        assert_eq!(clamp_limit(None, 20), 20);
        assert_eq!(clamp_limit(Some(0), 20), 1);
        assert_eq!(clamp_limit(Some(50_000), 20), MAX_PAGE_SIZE);
        assert_eq!(clamp_offset(Some(-3)), 0);
    }
}
