//! Data models for Roam

mod destination;
mod favorite;
mod identity;

pub use destination::{DestinationDraft, DestinationPatch};
pub use favorite::{DestinationId, FavoriteItem};
pub use identity::{Identity, Role, UserId};
