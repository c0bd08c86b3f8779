//! roam-core - Core library for Roam
//!
//! This crate contains the shared models, the device-local favorites cache,
//! the remote favorites store contract, and the reconciler that moves
//! anonymous favorites into a user's account when they sign in.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod favorites;
pub mod identity;
pub mod models;
pub mod role_gate;
pub mod supabase;
pub mod util;

pub use error::{Error, Result};
pub use models::{DestinationId, FavoriteItem, Identity, Role, UserId};
