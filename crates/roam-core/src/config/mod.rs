//! Backend configuration for client apps.
//!
//! Provides `BackendConfig`, the Supabase project endpoint and public anon key
//! shared by the auth client and the REST adapters.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::{is_http_url, normalize_text_option};

pub const SUPABASE_URL_ENV: &str = "SUPABASE_URL";
pub const SUPABASE_ANON_KEY_ENV: &str = "SUPABASE_ANON_KEY";

/// Public Supabase project settings.
///
/// The anon key is safe to ship; it only identifies the project. Per-user
/// authority comes from the session's access token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct BackendConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
}

impl BackendConfig {
    /// Validate and normalize a project URL and anon key.
    pub fn new(supabase_url: &str, supabase_anon_key: &str) -> Result<Self> {
        let supabase_url = normalize_required(supabase_url, "supabase_url")?;
        if !is_http_url(&supabase_url) {
            return Err(Error::InvalidInput(
                "supabase_url must include http:// or https://".to_string(),
            ));
        }
        let supabase_anon_key = normalize_required(supabase_anon_key, "supabase_anon_key")?;

        Ok(Self {
            supabase_url: supabase_url.trim_end_matches('/').to_string(),
            supabase_anon_key,
        })
    }

    /// Read `SUPABASE_URL` and `SUPABASE_ANON_KEY` from the environment.
    ///
    /// Returns `None` when neither is set; setting only one is an error.
    pub fn from_env() -> Result<Option<Self>> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`BackendConfig::from_env`] with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Option<Self>> {
        let url = normalize_text_option(lookup(SUPABASE_URL_ENV));
        let key = normalize_text_option(lookup(SUPABASE_ANON_KEY_ENV));
        match (url, key) {
            (None, None) => Ok(None),
            (Some(url), Some(key)) => Self::new(&url, &key).map(Some),
            (Some(_), None) => Err(Error::InvalidInput(format!(
                "{SUPABASE_URL_ENV} is set but {SUPABASE_ANON_KEY_ENV} is missing"
            ))),
            (None, Some(_)) => Err(Error::InvalidInput(format!(
                "{SUPABASE_ANON_KEY_ENV} is set but {SUPABASE_URL_ENV} is missing"
            ))),
        }
    }

    /// GoTrue auth endpoint root
    pub fn auth_url(&self) -> String {
        format!("{}/auth/v1", self.supabase_url)
    }

    /// PostgREST endpoint root
    pub fn rest_url(&self) -> String {
        format!("{}/rest/v1", self.supabase_url)
    }
}

fn normalize_required(raw: &str, field: &str) -> Result<String> {
    normalize_text_option(Some(raw.to_string()))
        .ok_or_else(|| Error::InvalidInput(format!("{field} is required")))
}
