//! Account role lookup in the `users` table.

use reqwest::Method;
use serde::Deserialize;

use super::{eq_filter, RestClient};
use crate::favorites::StoreResult;
use crate::models::{Role, UserId};

#[derive(Debug, Deserialize)]
struct ProfileRow {
    #[serde(default)]
    role: Option<String>,
}

/// Reads the role attached to an account.
#[derive(Debug, Clone)]
pub struct SupabaseProfileClient {
    rest: RestClient,
}

impl SupabaseProfileClient {
    pub const fn new(rest: RestClient) -> Self {
        Self { rest }
    }

    /// Role of `user_id`, read with the user's own token.
    ///
    /// An account without a profile row, or with no role set, is a `user`.
    pub async fn fetch_role(&self, user_id: &UserId, access_token: &str) -> StoreResult<Role> {
        let request = self.rest.request(
            Method::GET,
            &format!("users?select=role&id={}&limit=1", eq_filter(user_id.as_str())),
            Some(access_token),
        );
        let rows: Vec<ProfileRow> = self.rest.fetch_json(request).await?;
        let role = role_from_rows(rows);
        tracing::debug!("Account {} has role {}", user_id, role);
        Ok(role)
    }
}

fn role_from_rows(rows: Vec<ProfileRow>) -> Role {
    rows.into_iter()
        .next()
        .and_then(|row| row.role)
        .map_or(Role::User, |role| Role::parse(&role))
}
