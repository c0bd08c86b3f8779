//! Role-based gates: favorites for regular users, the catalog for admins.

use crate::models::{Identity, Role};

/// Whether `identity` may mutate favorites.
///
/// Administrators are denied, as is any role the client does not recognize.
/// An anonymous session passes: its writes land in the local cache instead.
#[must_use]
pub fn can_mutate_favorites(identity: Option<&Identity>) -> bool {
    identity.map_or(true, |identity| identity.role == Role::User)
}

/// Whether `identity` may manage catalog destinations and read their favorite counts.
///
/// Only a signed-in administrator passes. For users and administrators this
/// is the inverse of [`can_mutate_favorites`].
#[must_use]
pub fn can_manage_catalog(identity: Option<&Identity>) -> bool {
    identity.is_some_and(|identity| identity.role == Role::Admin)
}
