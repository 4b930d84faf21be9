// SQLite implementation of the PointsStore trait

use crate::core::points::{PointEvent, PointsChange, PointsEntry, PointsError, PointsStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;
use sqlx::Row;

pub struct SqlitePointsStore {
    pool: SqlitePool,
}

fn storage(e: sqlx::Error) -> PointsError {
    PointsError::StorageError(e.to_string())
}

fn parse_time(raw: Option<String>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

impl SqlitePointsStore {
    /// Open (or create) the points database at `database`.
    pub async fn new(database: &str) -> anyhow::Result<Self> {
        let pool = crate::infra::sqlite::connect(database).await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS points (
                user_id INTEGER NOT NULL,
                guild_id INTEGER NOT NULL,
                points INTEGER NOT NULL DEFAULT 0,
                updated_at TEXT,
                PRIMARY KEY (user_id, guild_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS point_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                guild_id INTEGER NOT NULL,
                delta INTEGER NOT NULL,
                reason TEXT NOT NULL,
                actor_id INTEGER,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_point_events_user_guild
            ON point_events(user_id, guild_id, id DESC)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl PointsStore for SqlitePointsStore {
    async fn get_points(&self, user_id: u64, guild_id: u64) -> Result<i64, PointsError> {
        let row = sqlx::query("SELECT points FROM points WHERE user_id = ? AND guild_id = ?")
            .bind(user_id as i64)
            .bind(guild_id as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;

        Ok(row.map(|r| r.get::<i64, _>("points")).unwrap_or(0))
    }

    async fn apply_change(&self, change: PointEvent) -> Result<PointsChange, PointsError> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        // Make sure the row exists so the read below always finds it
        sqlx::query(
            r#"
            INSERT INTO points (user_id, guild_id, points, updated_at)
            VALUES (?, ?, 0, ?)
            ON CONFLICT(user_id, guild_id) DO NOTHING
            "#,
        )
        .bind(change.user_id as i64)
        .bind(change.guild_id as i64)
        .bind(change.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        let current: i64 =
            sqlx::query("SELECT points FROM points WHERE user_id = ? AND guild_id = ?")
                .bind(change.user_id as i64)
                .bind(change.guild_id as i64)
                .fetch_one(&mut *tx)
                .await
                .map_err(storage)?
                .get("points");
        let total = current.saturating_add(change.delta).max(0);
        let applied = total - current;

        if applied != 0 {
            sqlx::query(
                "UPDATE points SET points = ?, updated_at = ? WHERE user_id = ? AND guild_id = ?",
            )
            .bind(total)
            .bind(change.created_at.to_rfc3339())
            .bind(change.user_id as i64)
            .bind(change.guild_id as i64)
            .execute(&mut *tx)
            .await
            .map_err(storage)?;

            sqlx::query(
                r#"
                INSERT INTO point_events (user_id, guild_id, delta, reason, actor_id, created_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(change.user_id as i64)
            .bind(change.guild_id as i64)
            .bind(applied)
            .bind(&change.reason)
            .bind(change.actor_id.map(|id| id as i64))
            .bind(change.created_at.to_rfc3339())
            .execute(&mut *tx)
            .await
            .map_err(storage)?;
        }

        tx.commit().await.map_err(storage)?;
        Ok(PointsChange { applied, total })
    }

    async fn leaderboard(
        &self,
        guild_id: u64,
        limit: usize,
    ) -> Result<Vec<PointsEntry>, PointsError> {
        let rows = sqlx::query(
            "SELECT user_id, points, updated_at FROM points WHERE guild_id = ? ORDER BY points DESC, user_id ASC LIMIT ?",
        )
        .bind(guild_id as i64)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        Ok(rows
            .into_iter()
            .map(|row| PointsEntry {
                user_id: row.get::<i64, _>("user_id") as u64,
                guild_id,
                points: row.get("points"),
                updated_at: parse_time(row.get("updated_at")),
            })
            .collect())
    }

    async fn recent_events(
        &self,
        user_id: u64,
        guild_id: u64,
        limit: usize,
    ) -> Result<Vec<PointEvent>, PointsError> {
        let rows = sqlx::query(
            r#"
            SELECT delta, reason, actor_id, created_at FROM point_events
            WHERE user_id = ? AND guild_id = ?
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(user_id as i64)
        .bind(guild_id as i64)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        Ok(rows
            .into_iter()
            .map(|row| PointEvent {
                user_id,
                guild_id,
                delta: row.get("delta"),
                reason: row.get("reason"),
                actor_id: row.get::<Option<i64>, _>("actor_id").map(|id| id as u64),
                created_at: parse_time(row.get("created_at")).unwrap_or_else(Utc::now),
            })
            .collect())
    }

    async fn reset_guild(&self, guild_id: u64) -> Result<u64, PointsError> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        let result = sqlx::query("DELETE FROM points WHERE guild_id = ?")
            .bind(guild_id as i64)
            .execute(&mut *tx)
            .await
            .map_err(storage)?;
        sqlx::query("DELETE FROM point_events WHERE guild_id = ?")
            .bind(guild_id as i64)
            .execute(&mut *tx)
            .await
            .map_err(storage)?;

        tx.commit().await.map_err(storage)?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::points::PointsService;
    use std::sync::Arc;

    async fn store() -> SqlitePointsStore {
        SqlitePointsStore::new("sqlite::memory:").await.unwrap()
    }

    fn change(user_id: u64, guild_id: u64, delta: i64, actor_id: Option<u64>) -> PointEvent {
        PointEvent {
            user_id,
            guild_id,
            delta,
            reason: "test".into(),
            actor_id,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn totals_accumulate_and_rank() {
        let store = store().await;
        store.apply_change(change(1, 9, 5, None)).await.unwrap();
        store.apply_change(change(2, 9, 8, None)).await.unwrap();
        let result = store.apply_change(change(1, 9, 5, None)).await.unwrap();
        assert_eq!(result, PointsChange { applied: 5, total: 10 });
        store.apply_change(change(3, 7, 100, None)).await.unwrap();

        assert_eq!(store.get_points(1, 9).await.unwrap(), 10);
        assert_eq!(store.get_points(4, 9).await.unwrap(), 0);

        let board = store.leaderboard(9, 10).await.unwrap();
        let ids: Vec<u64> = board.iter().map(|e| e.user_id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert!(board[0].updated_at.is_some());
    }

    #[tokio::test]
    async fn deductions_clamp_and_record_applied_amount() {
        let store = store().await;
        store.apply_change(change(1, 9, 3, None)).await.unwrap();

        let result = store.apply_change(change(1, 9, -10, Some(7))).await.unwrap();
        assert_eq!(result, PointsChange { applied: -3, total: 0 });
        let result = store.apply_change(change(1, 9, -10, Some(7))).await.unwrap();
        assert_eq!(result, PointsChange { applied: 0, total: 0 });

        let events = store.recent_events(1, 9, 10).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].delta, -3);
        assert_eq!(events[0].actor_id, Some(7));
    }

    #[tokio::test]
    async fn events_are_newest_first_and_reset_clears_guild() {
        let store = store().await;
        store.apply_change(change(1, 9, 5, None)).await.unwrap();
        store.apply_change(change(1, 9, -2, Some(7))).await.unwrap();

        let events = store.recent_events(1, 9, 10).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].delta, -2);
        assert_eq!(events[0].actor_id, Some(7));

        assert_eq!(store.reset_guild(9).await.unwrap(), 1);
        assert_eq!(store.get_points(1, 9).await.unwrap(), 0);
        assert!(store.recent_events(1, 9, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrent_awards_on_a_file_database_are_all_counted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("points.db");
        let store = SqlitePointsStore::new(&path.to_string_lossy()).await.unwrap();
        let service = Arc::new(PointsService::new(store));

        let tasks: Vec<_> = (0..50)
            .map(|_| {
                let service = service.clone();
                tokio::spawn(async move { service.award(1, 9, 1, "claim", None).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(service.get(1, 9).await.unwrap(), 50);
        assert_eq!(service.history(1, 9, 100).await.unwrap().len(), 50);
    }
}
