//! Favorites: local cache, remote store contract, and the reconciler that
//! merges anonymous favorites into an account on sign-in.

mod cache;
mod error;
mod machine;
mod memory;
mod reconciler;
mod store;
mod view;

pub(crate) use cache::dedupe_by_id;
pub use cache::{LocalFavoriteCache, MemoryFavoriteCache};
pub use error::{FavoritesError, FavoritesResult, Precondition};
pub use machine::{transition, Effect, MergeAttempt, Phase, SessionEvent, Step};
pub use memory::{InsertFailure, InsertHold, MemoryFavoriteStore};
pub use reconciler::{FavoritesReconciler, MergeReport};
pub use store::{RemoteFavoriteStore, StoreError, StoreResult};
pub use view::FavoriteView;
