//! Errors from roam-core's local storage and input validation

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Storage failure outside libSQL, such as a poisoned in-process cache
    #[error("Local storage error: {0}")]
    Database(String),

    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A stored or received record did not match its JSON shape
    #[error("Malformed record: {0}")]
    Serialization(#[from] serde_json::Error),
}
