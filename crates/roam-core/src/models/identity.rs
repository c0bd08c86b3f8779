//! Identity model supplied by the external session provider

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Identifier of an authenticated account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput("user id cannot be empty".to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Account role as stored in the backend `users` table.
///
/// Any value other than `user` or `admin` decodes to `Unrecognized`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
    #[serde(other)]
    Unrecognized,
}

impl Role {
    /// Case-insensitive parse; never fails.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "user" => Self::User,
            "admin" => Self::Admin,
            _ => Self::Unrecognized,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
            Self::Unrecognized => "unrecognized",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A signed-in account. An absent identity is modelled as `Option::None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: UserId,
    pub role: Role,
}

impl Identity {
    #[must_use]
    pub const fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }

    /// Same account, regardless of role changes from a token refresh.
    #[must_use]
    pub fn same_account(&self, other: &Self) -> bool {
        self.user_id == other.user_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parse_is_case_insensitive() {
        assert_eq!(Role::parse("ADMIN"), Role::Admin);
        assert_eq!(Role::parse(" user "), Role::User);
        assert_eq!(Role::parse("moderator"), Role::Unrecognized);
        assert_eq!(Role::parse(""), Role::Unrecognized);
    }

    #[test]
    fn role_deserializes_unknown_values() {
        let role: Role = serde_json::from_str("\"superuser\"").unwrap();
        assert_eq!(role, Role::Unrecognized);
        let role: Role = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(role, Role::Admin);
    }

    #[test]
    fn same_account_ignores_role() {
        let user = UserId::parse("u1").unwrap();
        let before = Identity::new(user.clone(), Role::User);
        let after = Identity::new(user, Role::Admin);
        assert!(before.same_account(&after));
        assert_ne!(before, after);
    }
}
