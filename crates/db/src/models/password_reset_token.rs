use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

/// Outstanding password-reset tokens. A token is spent by deleting its row.
pub struct PasswordResetToken;

impl PasswordResetToken {
    pub async fn create(
        pool: &SqlitePool,
        user_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"INSERT INTO password_reset_tokens (id, token, user_id, expires_at)
               VALUES ($1, $2, $3, $4)"#,
        )
        .bind(Uuid::new_v4())
        .bind(token)
        .bind(user_id)
        .bind(expires_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Spend `token` for `user_id`. Returns false when it was never issued or is already used.
    pub async fn consume(pool: &SqlitePool, token: &str, user_id: Uuid) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM password_reset_tokens WHERE token = $1 AND user_id = $2")
                .bind(token)
                .bind(user_id)
                .execute(pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_all_for_user(pool: &SqlitePool, user_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM password_reset_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
