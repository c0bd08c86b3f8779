//! Device-local database for Roam

mod connection;
mod local_cache;
mod migrations;

pub use connection::Database;
pub use local_cache::{LibSqlFavoriteCache, LOCAL_FAVORITES_KEY};
