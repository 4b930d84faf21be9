// SQLite implementation of the WarningStore trait

use crate::core::moderation::{ModerationError, Warning, WarningStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;
use sqlx::Row;

pub struct SqliteWarningStore {
    pool: SqlitePool,
}

fn storage(e: sqlx::Error) -> ModerationError {
    ModerationError::StorageError(e.to_string())
}

impl SqliteWarningStore {
    pub async fn new(database: &str) -> anyhow::Result<Self> {
        let pool = crate::infra::sqlite::connect(database).await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS warnings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                guild_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                moderator_id INTEGER NOT NULL,
                reason TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_warnings_guild_user
            ON warnings(guild_id, user_id)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl WarningStore for SqliteWarningStore {
    async fn insert(&self, mut warning: Warning) -> Result<Warning, ModerationError> {
        let result = sqlx::query(
            r#"
            INSERT INTO warnings (guild_id, user_id, moderator_id, reason, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(warning.guild_id as i64)
        .bind(warning.user_id as i64)
        .bind(warning.moderator_id as i64)
        .bind(&warning.reason)
        .bind(warning.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        warning.id = result.last_insert_rowid();
        Ok(warning)
    }

    async fn list(&self, guild_id: u64, user_id: u64) -> Result<Vec<Warning>, ModerationError> {
        let rows = sqlx::query(
            r#"
            SELECT id, moderator_id, reason, created_at FROM warnings
            WHERE guild_id = ? AND user_id = ?
            ORDER BY id DESC
            "#,
        )
        .bind(guild_id as i64)
        .bind(user_id as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let created_at: String = row.get("created_at");
                Warning {
                    id: row.get("id"),
                    guild_id,
                    user_id,
                    moderator_id: row.get::<i64, _>("moderator_id") as u64,
                    reason: row.get("reason"),
                    created_at: DateTime::parse_from_rfc3339(&created_at)
                        .map(|dt| dt.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now()),
                }
            })
            .collect())
    }

    async fn count(&self, guild_id: u64, user_id: u64) -> Result<u32, ModerationError> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM warnings WHERE guild_id = ? AND user_id = ?")
            .bind(guild_id as i64)
            .bind(user_id as i64)
            .fetch_one(&self.pool)
            .await
            .map_err(storage)?;

        Ok(row.get::<i64, _>("total") as u32)
    }

    async fn delete(&self, guild_id: u64, id: i64) -> Result<bool, ModerationError> {
        let result = sqlx::query("DELETE FROM warnings WHERE guild_id = ? AND id = ?")
            .bind(guild_id as i64)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage)?;

        Ok(result.rows_affected() > 0)
    }

    async fn clear(&self, guild_id: u64, user_id: u64) -> Result<u64, ModerationError> {
        let result = sqlx::query("DELETE FROM warnings WHERE guild_id = ? AND user_id = ?")
            .bind(guild_id as i64)
            .bind(user_id as i64)
            .execute(&self.pool)
            .await
            .map_err(storage)?;

        Ok(result.rows_affected())
    }
}
