use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

pub type DbPool = sqlx::SqlitePool;

pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub async fn connect(database_url: &str) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(database_url, DEFAULT_MAX_CONNECTIONS, DEFAULT_TIMEOUT_SECS).await
}

/// Opens a pool with foreign keys enforced (comment and audit rows cascade with
/// their request) and WAL journaling. `timeout_secs` bounds both pool acquisition
/// and how long a writer waits on a locked database.
pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    let timeout = Duration::from_secs(timeout_secs.max(1));
    let options = SqliteConnectOptions::from_str(database_url)?
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(timeout);

    SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(timeout)
        .connect_with(options)
        .await
}

#[cfg(test)]
mod tests {
    use super::{connect, connect_with_settings};

    #[tokio::test]
    async fn pool_enforces_foreign_keys() {
        let pool = connect("sqlite::memory:").await.expect("connect");

        let enabled: i64 =
            sqlx::query_scalar("PRAGMA foreign_keys").fetch_one(&pool).await.expect("pragma");
        assert_eq!(enabled, 1);
    }

    #[tokio::test]
    async fn file_database_uses_wal_journal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("wal.db").display());
        let pool = connect_with_settings(&url, 2, 5).await.expect("connect");

        let mode: String =
            sqlx::query_scalar("PRAGMA journal_mode").fetch_one(&pool).await.expect("pragma");
        assert_eq!(mode.to_ascii_lowercase(), "wal");
        pool.close().await;
    }

    #[tokio::test]
    async fn missing_file_is_not_created_without_rwc_mode() {
        let dir = tempfile::tempdir().expect("tempdir");
        let url = format!("sqlite://{}", dir.path().join("missing.db").display());

        assert!(connect_with_settings(&url, 1, 1).await.is_err());
        assert!(!dir.path().join("missing.db").exists());
    }
}
