//! Anonymous favorites stored in the local database

use libsql::Connection;

use super::Database;
use crate::error::Result;
use crate::favorites::{dedupe_by_id, LocalFavoriteCache};
use crate::models::FavoriteItem;

/// Record key holding the anonymous favorites list
pub const LOCAL_FAVORITES_KEY: &str = "travel_explorer_favorites";

/// libSQL implementation of `LocalFavoriteCache`
///
/// The whole list lives in one `local_records` row as a JSON array, so every
/// write replaces it atomically.
#[derive(Clone)]
pub struct LibSqlFavoriteCache {
    conn: Connection,
    key: String,
}

impl LibSqlFavoriteCache {
    /// Create a cache over the database's connection
    pub fn from_database(db: &Database) -> Self {
        Self::new(db.connection().clone())
    }

    /// Create a cache with the given connection
    pub fn new(conn: Connection) -> Self {
        Self {
            conn,
            key: LOCAL_FAVORITES_KEY.to_string(),
        }
    }
}

impl LocalFavoriteCache for LibSqlFavoriteCache {
    async fn load(&self) -> Result<Vec<FavoriteItem>> {
        let mut rows = self
            .conn
            .query(
                "SELECT value FROM local_records WHERE key = ?",
                [self.key.as_str()],
            )
            .await?;

        let Some(row) = rows.next().await? else {
            return Ok(Vec::new());
        };
        let value: String = row.get(0)?;
        let items: Vec<FavoriteItem> = serde_json::from_str(&value)?;
        Ok(dedupe_by_id(&items))
    }

    async fn store(&self, items: &[FavoriteItem]) -> Result<()> {
        let items = dedupe_by_id(items);
        if items.is_empty() {
            return self.clear().await;
        }

        let value = serde_json::to_string(&items)?;
        let updated_at = chrono::Utc::now().timestamp_millis();
        self.conn
            .execute(
                "INSERT OR REPLACE INTO local_records (key, value, updated_at) VALUES (?, ?, ?)",
                libsql::params![self.key.as_str(), value, updated_at],
            )
            .await?;
        tracing::debug!("Stored {} local favorites", items.len());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.conn
            .execute(
                "DELETE FROM local_records WHERE key = ?",
                [self.key.as_str()],
            )
            .await?;
        Ok(())
    }
}
