//! libSQL handle for the device-local database

use std::path::Path;

use libsql::{Builder, Connection, Database as LibSqlDatabase};

use super::migrations;
use crate::error::Result;

/// An open, migrated local database.
pub struct Database {
    _db: LibSqlDatabase,
    conn: Connection,
}

impl Database {
    /// Open (or create) the database file at `path`, creating missing
    /// parent directories.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => std::fs::create_dir_all(dir)?,
            _ => {}
        }
        let db = Builder::new_local(path).build().await?;
        Self::prepare(db).await
    }

    pub async fn open_in_memory() -> Result<Self> {
        let db = Builder::new_local(":memory:").build().await?;
        Self::prepare(db).await
    }

    async fn prepare(db: LibSqlDatabase) -> Result<Self> {
        let conn = db.connect()?;
        // WAL is unavailable for in-memory files; ignore the refusal.
        for pragma in ["PRAGMA journal_mode = WAL", "PRAGMA synchronous = NORMAL"] {
            conn.execute(pragma, ()).await.ok();
        }
        migrations::run(&conn).await?;
        Ok(Self { _db: db, conn })
    }

    pub const fn connection(&self) -> &Connection {
        &self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[tokio::test(flavor = "multi_thread")]
    async fn fresh_database_has_no_records() {
        let db = Database::open_in_memory().await.unwrap();
        let mut rows = db
            .connection()
            .query("SELECT COUNT(*) FROM local_records", ())
            .await
            .unwrap();
        let count: i64 = rows.next().await.unwrap().unwrap().get(0).unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn open_creates_missing_directories() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("profiles").join("work").join("roam.db");

        Database::open(&path).await.unwrap();
        assert!(path.exists());
    }
}
