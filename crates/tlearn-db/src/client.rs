//! Database handle.

use chrono::{DateTime, Utc};
use tokio_rusqlite::Connection;

use crate::error::DbResult;
use crate::schema::SCHEMA;

/// Cheap-to-clone handle over the async SQLite connection.
///
/// All repositories share one connection; `tokio-rusqlite` serializes access
/// on a dedicated thread.
#[derive(Clone)]
pub struct Db {
    conn: Connection,
}

impl Db {
    /// Open (or create) the database at `path` and apply the schema.
    pub async fn open(path: &str) -> DbResult<Self> {
        let conn = Connection::open(path).await?;
        Self::init(conn).await
    }

    /// Open an in-memory database. Used by tests.
    pub async fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> DbResult<Self> {
        conn.call(|conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    /// Raw connection access for repositories.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

/// Parse timestamps as stored by the repositories (RFC3339) or emitted by
/// SQLite defaults (`YYYY-MM-DD HH:MM:SS`).
pub(crate) fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_in_memory_applies_schema() {
        let db = Db::open_in_memory().await.expect("open");
        let count: i64 = db
            .connection()
            .call(|conn| {
                let count = conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'summaries'",
                    [],
                    |row| row.get(0),
                )?;
                Ok(count)
            })
            .await
            .expect("query");
        assert_eq!(count, 1);
    }

    #[test]
    fn test_parse_datetime_formats() {
        assert!(parse_datetime("2026-01-11T12:34:56+00:00").is_some());
        assert!(parse_datetime("2026-01-11 12:34:56").is_some());
        assert!(parse_datetime("not a date").is_none());
    }
}
