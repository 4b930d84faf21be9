// SQLite implementation of the StreakStore trait. Dates are stored as
// ISO `YYYY-MM-DD` strings in the guild's local calendar.

use crate::core::streak::{StreakError, StreakRecord, StreakStatus, StreakStore};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;

pub struct SqliteStreakStore {
    pool: SqlitePool,
}

fn storage(e: sqlx::Error) -> StreakError {
    StreakError::StorageError(e.to_string())
}

fn parse_date(raw: Option<String>) -> Option<NaiveDate> {
    raw.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok())
}

fn format_date(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.format("%Y-%m-%d").to_string())
}

fn row_to_record(row: &SqliteRow) -> StreakRecord {
    let status: String = row.get("status");
    StreakRecord {
        guild_id: row.get::<i64, _>("guild_id") as u64,
        user_id: row.get::<i64, _>("user_id") as u64,
        current: row.get::<i64, _>("current") as u32,
        longest: row.get::<i64, _>("longest") as u32,
        longest_before_post: row.get::<i64, _>("longest_before_post") as u32,
        last_post_date: parse_date(row.get("last_post_date")),
        status: StreakStatus::parse(&status).unwrap_or(StreakStatus::Active),
        lost_streak: row.get::<i64, _>("lost_streak") as u32,
        expired_on: parse_date(row.get("expired_on")),
        total_posts: row.get::<i64, _>("total_posts") as u64,
        restores_used: row.get::<i64, _>("restores_used") as u32,
        last_restore_month: row.get("last_restore_month"),
    }
}

const SELECT_COLUMNS: &str = "SELECT guild_id, user_id, current, longest, longest_before_post, \
     last_post_date, status, lost_streak, expired_on, total_posts, restores_used, \
     last_restore_month FROM streaks";

impl SqliteStreakStore {
    pub async fn new(database: &str) -> anyhow::Result<Self> {
        let pool = crate::infra::sqlite::connect(database).await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS streaks (
                guild_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                current INTEGER NOT NULL DEFAULT 0,
                longest INTEGER NOT NULL DEFAULT 0,
                longest_before_post INTEGER NOT NULL DEFAULT 0,
                last_post_date TEXT,
                status TEXT NOT NULL DEFAULT 'active',
                lost_streak INTEGER NOT NULL DEFAULT 0,
                expired_on TEXT,
                total_posts INTEGER NOT NULL DEFAULT 0,
                restores_used INTEGER NOT NULL DEFAULT 0,
                last_restore_month TEXT,
                PRIMARY KEY (guild_id, user_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Databases created before `longest_before_post` existed
        let has_column: bool = sqlx::query(
            "SELECT COUNT(*) AS n FROM pragma_table_info('streaks') WHERE name = 'longest_before_post'",
        )
        .fetch_one(&self.pool)
        .await?
        .get::<i64, _>("n")
            > 0;
        if !has_column {
            sqlx::query(
                "ALTER TABLE streaks ADD COLUMN longest_before_post INTEGER NOT NULL DEFAULT 0",
            )
            .execute(&self.pool)
            .await?;
            sqlx::query("UPDATE streaks SET longest_before_post = longest")
                .execute(&self.pool)
                .await?;
            tracing::info!("Added longest_before_post column to streaks");
        }

        Ok(())
    }
}

#[async_trait]
impl StreakStore for SqliteStreakStore {
    async fn get(&self, guild_id: u64, user_id: u64) -> Result<Option<StreakRecord>, StreakError> {
        let row = sqlx::query(&format!(
            "{} WHERE guild_id = ? AND user_id = ?",
            SELECT_COLUMNS
        ))
        .bind(guild_id as i64)
        .bind(user_id as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        Ok(row.as_ref().map(row_to_record))
    }

    async fn save(&self, record: &StreakRecord) -> Result<(), StreakError> {
        sqlx::query(
            r#"
            INSERT INTO streaks (
                guild_id, user_id, current, longest, longest_before_post, last_post_date,
                status, lost_streak, expired_on, total_posts, restores_used, last_restore_month
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(guild_id, user_id) DO UPDATE SET
                current = excluded.current,
                longest = excluded.longest,
                longest_before_post = excluded.longest_before_post,
                last_post_date = excluded.last_post_date,
                status = excluded.status,
                lost_streak = excluded.lost_streak,
                expired_on = excluded.expired_on,
                total_posts = excluded.total_posts,
                restores_used = excluded.restores_used,
                last_restore_month = excluded.last_restore_month
            "#,
        )
        .bind(record.guild_id as i64)
        .bind(record.user_id as i64)
        .bind(record.current as i64)
        .bind(record.longest as i64)
        .bind(record.longest_before_post as i64)
        .bind(format_date(record.last_post_date))
        .bind(record.status.as_str())
        .bind(record.lost_streak as i64)
        .bind(format_date(record.expired_on))
        .bind(record.total_posts as i64)
        .bind(record.restores_used as i64)
        .bind(record.last_restore_month.as_deref())
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        Ok(())
    }

    async fn list_guild(&self, guild_id: u64) -> Result<Vec<StreakRecord>, StreakError> {
        let rows = sqlx::query(&format!("{} WHERE guild_id = ?", SELECT_COLUMNS))
            .bind(guild_id as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;

        Ok(rows.iter().map(row_to_record).collect())
    }

    async fn delete(&self, guild_id: u64, user_id: u64) -> Result<bool, StreakError> {
        let result = sqlx::query("DELETE FROM streaks WHERE guild_id = ? AND user_id = ?")
            .bind(guild_id as i64)
            .bind(user_id as i64)
            .execute(&self.pool)
            .await
            .map_err(storage)?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::streak::StreakService;

    #[tokio::test]
    async fn record_round_trips_all_fields() {
        let store = SqliteStreakStore::new("sqlite::memory:").await.unwrap();
        let record = StreakRecord {
            guild_id: 1,
            user_id: 10,
            current: 0,
            longest: 12,
            longest_before_post: 11,
            last_post_date: NaiveDate::from_ymd_opt(2024, 3, 5),
            status: StreakStatus::PendingRestore,
            lost_streak: 12,
            expired_on: NaiveDate::from_ymd_opt(2024, 3, 7),
            total_posts: 40,
            restores_used: 1,
            last_restore_month: Some("2024-03".into()),
        };
        store.save(&record).await.unwrap();

        assert_eq!(store.get(1, 10).await.unwrap(), Some(record));
        assert!(store.get(1, 11).await.unwrap().is_none());
        assert_eq!(store.list_guild(1).await.unwrap().len(), 1);
        assert!(store.delete(1, 10).await.unwrap());
        assert!(!store.delete(1, 10).await.unwrap());
    }

    #[tokio::test]
    async fn older_databases_gain_the_new_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("streak.db").to_string_lossy().into_owned();

        let pool = crate::infra::sqlite::connect(&path).await.unwrap();
        sqlx::query(
            r#"
            CREATE TABLE streaks (
                guild_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                current INTEGER NOT NULL DEFAULT 0,
                longest INTEGER NOT NULL DEFAULT 0,
                last_post_date TEXT,
                status TEXT NOT NULL DEFAULT 'active',
                lost_streak INTEGER NOT NULL DEFAULT 0,
                expired_on TEXT,
                total_posts INTEGER NOT NULL DEFAULT 0,
                restores_used INTEGER NOT NULL DEFAULT 0,
                last_restore_month TEXT,
                PRIMARY KEY (guild_id, user_id)
            )
            "#,
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query("INSERT INTO streaks (guild_id, user_id, current, longest) VALUES (1, 10, 4, 9)")
            .execute(&pool)
            .await
            .unwrap();
        pool.close().await;

        let store = SqliteStreakStore::new(&path).await.unwrap();
        let record = store.get(1, 10).await.unwrap().unwrap();
        assert_eq!(record.longest, 9);
        assert_eq!(record.longest_before_post, 9);
    }

    #[tokio::test]
    async fn service_state_machine_over_sqlite() {
        let store = SqliteStreakStore::new("sqlite::memory:").await.unwrap();
        let service = StreakService::new(store);
        let day = |d| NaiveDate::from_ymd_opt(2024, 3, d).unwrap();

        for d in 1..=3 {
            service.record_post(1, 10, day(d)).await.unwrap();
        }
        let expired = service.expire_missed(1, day(6)).await.unwrap();
        assert_eq!(expired[0].lost_streak, 3);

        let pending = service
            .request_restore(
                1,
                10,
                day(6),
                crate::core::streak::RestorePolicy {
                    window_days: 3,
                    max_per_month: 2,
                },
            )
            .await
            .unwrap();
        assert_eq!(pending.status, StreakStatus::PendingRestore);

        let restored = service.approve_restore(1, 10, 99, day(6)).await.unwrap();
        assert_eq!(restored.current, 3);
        assert_eq!(service.get(1, 10).await.unwrap(), Some(restored));
    }
}
