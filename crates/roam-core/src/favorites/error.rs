//! Error surface of the favorites reconciler.

use std::fmt;

use thiserror::Error;

use super::store::StoreError;
use crate::models::DestinationId;

/// Contract violations: the operation is not valid in the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    /// Anonymous favorites are being merged into the account
    MergeInProgress,
    /// The signed-in role may not change favorites
    RoleForbidden,
    /// The operation needs a signed-in identity
    NotAuthenticated,
}

impl fmt::Display for Precondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            Self::MergeInProgress => "favorites merge in progress",
            Self::RoleForbidden => "role is not allowed to change favorites",
            Self::NotAuthenticated => "no signed-in identity",
        };
        f.write_str(message)
    }
}

#[derive(Debug, Error)]
pub enum FavoritesError {
    #[error("Favorites store unavailable: {0}")]
    Unavailable(String),

    #[error("Favorites merge partially applied ({} committed): {message}", .committed.len())]
    PartialFailure {
        committed: Vec<DestinationId>,
        message: String,
    },

    #[error("Favorites store rejected the request: {0}")]
    Rejected(String),

    #[error("Precondition failed: {0}")]
    PreconditionFailed(Precondition),

    #[error("Local favorites cache error: {0}")]
    LocalCache(#[from] crate::Error),
}

impl FavoritesError {
    /// Environment failures a caller may retry; contract errors are not.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Unavailable(_) | Self::PartialFailure { .. } | Self::LocalCache(_)
        )
    }
}

impl From<Precondition> for FavoritesError {
    fn from(value: Precondition) -> Self {
        Self::PreconditionFailed(value)
    }
}

impl From<StoreError> for FavoritesError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Unavailable(message) => Self::Unavailable(message),
            StoreError::PartialFailure { committed, message } => {
                Self::PartialFailure { committed, message }
            }
            StoreError::Rejected(message) => Self::Rejected(message),
            // Inserts absorb conflicts before converting; anywhere else it is unexpected.
            StoreError::Conflict => Self::Rejected("unexpected uniqueness conflict".to_string()),
        }
    }
}

pub type FavoritesResult<T> = Result<T, FavoritesError>;
