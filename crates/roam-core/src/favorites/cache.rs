//! Device-scoped cache of favorites made while signed out.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::models::FavoriteItem;

/// Storage for the anonymous favorites list.
///
/// Implementations keep one ordered list, unique by id. Storing an empty list
/// removes the record, and a missing record loads as an empty list.
#[allow(async_fn_in_trait)]
pub trait LocalFavoriteCache {
    /// Load the cached favorites in insertion order
    async fn load(&self) -> Result<Vec<FavoriteItem>>;

    /// Replace the cached favorites
    async fn store(&self, items: &[FavoriteItem]) -> Result<()>;

    /// Remove the cached record entirely
    async fn clear(&self) -> Result<()>;
}

/// Drop repeated ids, keeping the first occurrence.
pub(crate) fn dedupe_by_id(items: &[FavoriteItem]) -> Vec<FavoriteItem> {
    let mut seen = HashSet::with_capacity(items.len());
    items
        .iter()
        .filter(|item| seen.insert(item.id.clone()))
        .cloned()
        .collect()
}

/// Deduped items, or no record at all for an empty list.
fn record_for(items: &[FavoriteItem]) -> Option<Vec<FavoriteItem>> {
    Some(dedupe_by_id(items)).filter(|items| !items.is_empty())
}

/// In-process cache, shared between clones.
#[derive(Debug, Clone, Default)]
pub struct MemoryFavoriteCache {
    items: Arc<Mutex<Option<Vec<FavoriteItem>>>>,
}

impl MemoryFavoriteCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache pre-seeded with `items`.
    #[must_use]
    pub fn with_items(items: Vec<FavoriteItem>) -> Self {
        Self {
            items: Arc::new(Mutex::new(record_for(&items))),
        }
    }

    /// Whether a record exists at all (as opposed to an empty list).
    pub fn has_record(&self) -> bool {
        self.items.lock().is_ok_and(|guard| guard.is_some())
    }

    fn poisoned() -> Error {
        Error::Database("memory favorites cache lock poisoned".to_string())
    }
}

impl LocalFavoriteCache for MemoryFavoriteCache {
    async fn load(&self) -> Result<Vec<FavoriteItem>> {
        let guard = self.items.lock().map_err(|_| Self::poisoned())?;
        Ok(guard.clone().unwrap_or_default())
    }

    async fn store(&self, items: &[FavoriteItem]) -> Result<()> {
        let mut guard = self.items.lock().map_err(|_| Self::poisoned())?;
        *guard = record_for(items);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut guard = self.items.lock().map_err(|_| Self::poisoned())?;
        *guard = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DestinationId;
    use pretty_assertions::assert_eq;

    fn item(id: &str) -> FavoriteItem {
        FavoriteItem::new(DestinationId::parse(id).unwrap(), format!("Destination {id}"))
    }

    #[test]
    fn dedupe_keeps_first_occurrence() {
        let mut renamed = item("a");
        renamed.name = "Renamed".to_string();
        let deduped = dedupe_by_id(&[item("a"), item("b"), renamed]);
        assert_eq!(deduped, vec![item("a"), item("b")]);
    }

    #[tokio::test]
    async fn memory_cache_missing_record_is_empty() {
        let cache = MemoryFavoriteCache::new();
        assert!(cache.load().await.unwrap().is_empty());
        assert!(!cache.has_record());
    }

    #[tokio::test]
    async fn memory_cache_empty_list_leaves_no_record() {
        assert!(!MemoryFavoriteCache::with_items(Vec::new()).has_record());

        let cache = MemoryFavoriteCache::with_items(vec![item("a")]);
        cache.store(&[]).await.unwrap();
        assert!(!cache.has_record());
        assert!(cache.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn memory_cache_store_and_clear() {
        let cache = MemoryFavoriteCache::new();
        cache.store(&[item("a"), item("a"), item("b")]).await.unwrap();
        assert_eq!(cache.load().await.unwrap(), vec![item("a"), item("b")]);

        cache.clear().await.unwrap();
        assert!(!cache.has_record());
        assert!(cache.load().await.unwrap().is_empty());
    }
}
