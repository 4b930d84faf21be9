// Shared SQLite pool setup for the SQLite-backed stores.

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::path::Path;

/// Open a pool for a database file (created if missing) or, for
/// `sqlite::memory:`, a single-connection in-memory database.
pub async fn connect(database: &str) -> anyhow::Result<SqlitePool> {
    if database.contains(":memory:") {
        // Every connection to :memory: is a separate database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        return Ok(pool);
    }

    let path = database
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:");
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&format!("sqlite://{}?mode=rwc", path))
        .await?;
    Ok(pool)
}
