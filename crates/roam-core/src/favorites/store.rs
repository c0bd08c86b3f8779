//! Contract for the authoritative per-user favorites store.

use thiserror::Error;

use crate::models::{DestinationId, FavoriteItem, UserId};

/// Errors reported by a remote favorites store adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Store unreachable or temporarily failing; safe to retry
    #[error("Favorites store unavailable: {0}")]
    Unavailable(String),

    /// The `(user_id, destination_id)` pair already exists
    #[error("Favorite already exists")]
    Conflict,

    /// A batch insert applied only some rows
    #[error("Favorites insert partially applied ({} committed): {message}", .committed.len())]
    PartialFailure {
        committed: Vec<DestinationId>,
        message: String,
    },

    /// The store refused the request (permissions, malformed input)
    #[error("Favorites store rejected the request: {0}")]
    Rejected(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Remote favorites, keyed by `(user_id, destination_id)`.
///
/// Every mutation is targeted at individual pairs; the store is shared with
/// the user's other devices and must never be overwritten wholesale.
/// Implementations must enforce uniqueness of each pair.
#[allow(async_fn_in_trait)]
pub trait RemoteFavoriteStore {
    /// Destination ids favorited by `user_id`, without duplicates
    async fn list_favorite_ids(&self, user_id: &UserId) -> StoreResult<Vec<DestinationId>>;

    /// Insert pairs in one batch. Pairs that already exist are ignored
    /// rather than failing the batch.
    async fn insert_favorites(&self, user_id: &UserId, ids: &[DestinationId]) -> StoreResult<()>;

    /// Delete one pair. Deleting an absent pair succeeds.
    async fn delete_favorite(&self, user_id: &UserId, id: &DestinationId) -> StoreResult<()>;

    /// Display snapshots for `ids`; ids unknown to the catalog are skipped
    async fn fetch_items_by_ids(&self, ids: &[DestinationId]) -> StoreResult<Vec<FavoriteItem>>;
}
