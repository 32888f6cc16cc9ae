use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

/// A refresh token that has not been revoked. Revoking deletes the row.
#[derive(Debug, Clone, FromRow)]
pub struct RefreshToken {
    pub id: Uuid,
    pub token: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl RefreshToken {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }

    pub async fn create(
        pool: &SqlitePool,
        user_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, RefreshToken>(
            r#"INSERT INTO refresh_tokens (id, token, user_id, expires_at)
               VALUES ($1, $2, $3, $4)
               RETURNING id, token, user_id, expires_at, created_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(token)
        .bind(user_id)
        .bind(expires_at)
        .fetch_one(pool)
        .await
    }

    pub async fn find(pool: &SqlitePool, token: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, RefreshToken>(
            "SELECT id, token, user_id, expires_at, created_at FROM refresh_tokens WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(pool)
        .await
    }

    /// Returns whether a row was deleted.
    pub async fn delete(pool: &SqlitePool, token: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE token = $1")
            .bind(token)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_all_for_user(pool: &SqlitePool, user_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
