use std::io;

use roam_core::favorites::{FavoritesError, StoreError};
use roam_core::supabase::CatalogError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] roam_core::Error),
    #[error(transparent)]
    Favorites(#[from] FavoritesError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Destination not found: {0}")]
    DestinationNotFound(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Authentication error: {0}")]
    Auth(String),
    #[error("Not deleting destination {0} without --yes")]
    Unconfirmed(String),
    #[error(
        "Profile '{0}' has no Supabase project. Run `roam config init --supabase-url <URL> --supabase-anon-key <KEY>` or set SUPABASE_URL and SUPABASE_ANON_KEY."
    )]
    NotConfigured(String),
}
