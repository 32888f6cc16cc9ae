use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum UserRole {
    #[default]
    User,
    Admin,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    #[serde(skip_serializing, default)]
    #[ts(skip)]
    pub password_hash: String,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// Row returned by the user listing.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: UserRole,
    pub is_active: bool,
}

#[derive(Debug, Clone)]
pub struct CreateUser {
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub role: UserRole,
}

const USER_COLUMNS: &str =
    "id, email, username, password_hash, role, is_active, created_at, updated_at";

impl User {
    pub async fn create(pool: &SqlitePool, data: &CreateUser) -> Result<Self, sqlx::Error> {
        let id = Uuid::new_v4();
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (id, email, username, password_hash, role)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(&data.email)
        .bind(&data.username)
        .bind(&data.password_hash)
        .bind(data.role)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_email(
        pool: &SqlitePool,
        email: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(pool)
            .await
    }

    pub async fn email_or_username_taken(
        pool: &SqlitePool,
        email: &str,
        username: &str,
    ) -> Result<bool, sqlx::Error> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = $1 OR username = $2")
                .bind(email)
                .bind(username)
                .fetch_one(pool)
                .await?;
        Ok(count > 0)
    }

    /// Whether `username` belongs to someone other than `user_id`.
    pub async fn username_taken_by_other(
        pool: &SqlitePool,
        username: &str,
        user_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE username = $1 AND id != $2")
                .bind(username)
                .bind(user_id)
                .fetch_one(pool)
                .await?;
        Ok(count > 0)
    }

    /// Apply the fields that are `Some`; untouched columns keep their value.
    pub async fn update_profile(
        pool: &SqlitePool,
        id: Uuid,
        username: Option<&str>,
        password_hash: Option<&str>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users
             SET username = COALESCE($2, username),
                 password_hash = COALESCE($3, password_hash),
                 updated_at = datetime('now', 'subsec')
             WHERE id = $1
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(username)
        .bind(password_hash)
        .fetch_one(pool)
        .await
    }

    pub async fn set_role(pool: &SqlitePool, id: Uuid, role: UserRole) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET role = $2, updated_at = datetime('now', 'subsec') WHERE id = $1")
            .bind(id)
            .bind(role)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn set_active(pool: &SqlitePool, id: Uuid, active: bool) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE users SET is_active = $2, updated_at = datetime('now', 'subsec') WHERE id = $1",
        )
        .bind(id)
        .bind(active)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn list_summaries(pool: &SqlitePool) -> Result<Vec<UserSummary>, sqlx::Error> {
        sqlx::query_as::<_, UserSummary>(
            "SELECT id, username, email, role, is_active FROM users ORDER BY created_at, rowid",
        )
        .fetch_all(pool)
        .await
    }
}
