//! In-process remote favorites store.
//!
//! Enforces the same `(user_id, destination_id)` uniqueness constraint as the
//! hosted table and can be told to fail or stall, which is what the
//! reconciler tests lean on.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;

use super::store::{RemoteFavoriteStore, StoreError, StoreResult};
use crate::models::{DestinationId, FavoriteItem, UserId};

/// How the next batch insert should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertFailure {
    /// Fail before applying anything
    Unavailable,
    /// Apply the first `applied` new pairs, then fail
    Partial { applied: usize },
}

/// Handle that keeps the next insert suspended until released.
#[derive(Debug, Clone)]
pub struct InsertHold {
    started: Arc<Notify>,
    release: Arc<Notify>,
}

impl InsertHold {
    /// Wait until an insert has reached the hold point.
    pub async fn wait_started(&self) {
        self.started.notified().await;
    }

    /// Let the held insert proceed.
    pub fn release(&self) {
        self.release.notify_one();
    }
}

#[derive(Debug, Default)]
struct StoreState {
    rows: BTreeSet<(UserId, DestinationId)>,
    catalog: HashMap<DestinationId, FavoriteItem>,
    unavailable: bool,
    catalog_unavailable: bool,
    next_insert_failure: Option<InsertFailure>,
    strict_conflicts: bool,
    hold: Option<InsertHold>,
    insert_calls: usize,
    delete_calls: usize,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryFavoriteStore {
    state: Arc<Mutex<StoreState>>,
}

impl MemoryFavoriteStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        // A panicked test thread must not hide the state from assertions.
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Register catalog entries served by `fetch_items_by_ids`.
    pub fn add_catalog_items(&self, items: impl IntoIterator<Item = FavoriteItem>) {
        let mut state = self.lock();
        for item in items {
            state.catalog.insert(item.id.clone(), item);
        }
    }

    /// Seed a favorite row directly, bypassing failure injection.
    pub fn seed(&self, user_id: &UserId, id: &DestinationId) {
        self.lock().rows.insert((user_id.clone(), id.clone()));
    }

    /// Make every call fail with `Unavailable` until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    /// Make `fetch_items_by_ids` fail while favorite rows stay reachable.
    pub fn set_catalog_unavailable(&self, unavailable: bool) {
        self.lock().catalog_unavailable = unavailable;
    }

    /// Fail the next batch insert.
    pub fn fail_next_insert(&self, failure: InsertFailure) {
        self.lock().next_insert_failure = Some(failure);
    }

    /// Report `Conflict` for inserts of existing pairs instead of ignoring them.
    pub fn set_strict_conflicts(&self, strict: bool) {
        self.lock().strict_conflicts = strict;
    }

    /// Suspend the next insert until the returned hold is released.
    pub fn hold_next_insert(&self) -> InsertHold {
        let hold = InsertHold {
            started: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        };
        self.lock().hold = Some(hold.clone());
        hold
    }

    /// Rows for `user_id`, counting duplicates if any existed.
    pub fn row_count(&self, user_id: &UserId, id: &DestinationId) -> usize {
        self.lock()
            .rows
            .iter()
            .filter(|(user, destination)| user == user_id && destination == id)
            .count()
    }

    /// Favorite ids held for `user_id`, sorted.
    pub fn favorites_of(&self, user_id: &UserId) -> Vec<DestinationId> {
        self.lock()
            .rows
            .iter()
            .filter(|(user, _)| user == user_id)
            .map(|(_, id)| id.clone())
            .collect()
    }

    pub fn insert_calls(&self) -> usize {
        self.lock().insert_calls
    }

    pub fn delete_calls(&self) -> usize {
        self.lock().delete_calls
    }

    fn check_available(state: &StoreState) -> StoreResult<()> {
        if state.unavailable {
            Err(StoreError::Unavailable("memory store offline".to_string()))
        } else {
            Ok(())
        }
    }
}

impl RemoteFavoriteStore for MemoryFavoriteStore {
    async fn list_favorite_ids(&self, user_id: &UserId) -> StoreResult<Vec<DestinationId>> {
        let state = self.lock();
        Self::check_available(&state)?;
        Ok(state
            .rows
            .iter()
            .filter(|(user, _)| user == user_id)
            .map(|(_, id)| id.clone())
            .collect())
    }

    async fn insert_favorites(&self, user_id: &UserId, ids: &[DestinationId]) -> StoreResult<()> {
        let hold = self.lock().hold.take();
        if let Some(hold) = hold {
            hold.started.notify_one();
            hold.release.notified().await;
        }

        let mut state = self.lock();
        state.insert_calls += 1;
        Self::check_available(&state)?;

        let fresh: Vec<DestinationId> = ids
            .iter()
            .filter(|id| !state.rows.contains(&(user_id.clone(), (*id).clone())))
            .cloned()
            .collect();

        if state.strict_conflicts && fresh.len() < ids.len() {
            return Err(StoreError::Conflict);
        }

        match state.next_insert_failure.take() {
            Some(InsertFailure::Unavailable) => {
                Err(StoreError::Unavailable("insert timed out".to_string()))
            }
            Some(InsertFailure::Partial { applied }) => {
                let committed: Vec<DestinationId> = fresh.into_iter().take(applied).collect();
                for id in &committed {
                    state.rows.insert((user_id.clone(), id.clone()));
                }
                Err(StoreError::PartialFailure {
                    committed,
                    message: "batch interrupted".to_string(),
                })
            }
            None => {
                for id in fresh {
                    state.rows.insert((user_id.clone(), id));
                }
                Ok(())
            }
        }
    }

    async fn delete_favorite(&self, user_id: &UserId, id: &DestinationId) -> StoreResult<()> {
        let mut state = self.lock();
        state.delete_calls += 1;
        Self::check_available(&state)?;
        state.rows.remove(&(user_id.clone(), id.clone()));
        Ok(())
    }

    async fn fetch_items_by_ids(&self, ids: &[DestinationId]) -> StoreResult<Vec<FavoriteItem>> {
        let state = self.lock();
        Self::check_available(&state)?;
        if state.catalog_unavailable {
            return Err(StoreError::Unavailable("catalog offline".to_string()));
        }
        Ok(ids
            .iter()
            .filter_map(|id| state.catalog.get(id).cloned())
            .collect())
    }
}
