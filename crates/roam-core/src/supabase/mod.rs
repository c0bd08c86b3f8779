//! PostgREST plumbing shared by the Supabase-backed adapters.
//!
//! Requests carry the project's anon key as `apikey` and either the user's
//! access token or the anon key as the bearer token, so row-level security
//! applies as the signed-in user.

mod catalog;
mod favorites;
mod profile;

use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;

use crate::config::BackendConfig;
use crate::favorites::{StoreError, StoreResult};
use crate::models::DestinationId;
use crate::util::compact_text;

pub use catalog::{
    CatalogCaller, CatalogClient, CatalogError, CatalogResult, DestinationQuery, DestinationSort,
};
pub use favorites::SupabaseFavoriteStore;
pub use profile::SupabaseProfileClient;

const REST_HTTP_TIMEOUT_SECS: u64 = 15;
const UNIQUE_VIOLATION: &str = "23505";

/// Low-level PostgREST client bound to one project.
#[derive(Debug, Clone)]
pub struct RestClient {
    rest_url: String,
    anon_key: String,
    client: reqwest::Client,
}

impl RestClient {
    pub fn new(config: &BackendConfig) -> StoreResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REST_HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|error| {
                StoreError::Unavailable(format!("Failed to construct HTTP client: {error}"))
            })?;
        Ok(Self {
            rest_url: config.rest_url(),
            anon_key: config.supabase_anon_key.clone(),
            client,
        })
    }

    /// Build a request for `path_and_query`, relative to `/rest/v1`.
    pub fn request(
        &self,
        method: Method,
        path_and_query: &str,
        access_token: Option<&str>,
    ) -> RequestBuilder {
        self.client
            .request(method, format!("{}/{}", self.rest_url, path_and_query))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token.unwrap_or(&self.anon_key))
            .header("Accept", "application/json")
    }

    /// Send `request`, mapping transport errors and non-success statuses.
    pub async fn send(&self, request: RequestBuilder) -> StoreResult<Response> {
        let response = request
            .send()
            .await
            .map_err(|error| StoreError::Unavailable(format!("Request failed: {error}")))?;
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(classify_failure(status, &body))
    }

    /// Send `request` and decode a JSON body.
    pub async fn fetch_json<T>(&self, request: RequestBuilder) -> StoreResult<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let response = self.send(request).await?;
        response
            .json::<T>()
            .await
            .map_err(|error| StoreError::Rejected(format!("Unexpected response body: {error}")))
    }
}

#[derive(Debug, Deserialize)]
struct PostgrestError {
    code: Option<String>,
    message: Option<String>,
    details: Option<String>,
}

/// Map a failed response onto the store error taxonomy.
pub(crate) fn classify_failure(status: StatusCode, body: &str) -> StoreError {
    let payload = serde_json::from_str::<PostgrestError>(body).ok();

    if status == StatusCode::CONFLICT
        || payload
            .as_ref()
            .and_then(|payload| payload.code.as_deref())
            .is_some_and(|code| code == UNIQUE_VIOLATION)
    {
        return StoreError::Conflict;
    }

    let message = describe_failure(status, body, payload);
    if status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
    {
        StoreError::Unavailable(message)
    } else {
        StoreError::Rejected(message)
    }
}

fn describe_failure(status: StatusCode, body: &str, payload: Option<PostgrestError>) -> String {
    if let Some(payload) = payload {
        if let Some(message) = payload.message {
            return match payload.details {
                Some(details) if !details.trim().is_empty() => {
                    format!("{} ({}): {}", message.trim(), status.as_u16(), details.trim())
                }
                _ => format!("{} ({})", message.trim(), status.as_u16()),
            };
        }
    }

    let body = compact_text(body);
    if body.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("HTTP {}: {body}", status.as_u16())
    }
}

/// `eq.` filter value, URL-encoded.
pub(crate) fn eq_filter(value: &str) -> String {
    format!("eq.{}", urlencoding::encode(value))
}

/// `in.(...)` filter over ids, URL-encoded. Each id is double-quoted so
/// reserved characters inside an id cannot split the list.
pub(crate) fn in_filter(ids: &[DestinationId]) -> String {
    let quoted: Vec<String> = ids
        .iter()
        .map(|id| {
            let escaped = id.as_str().replace('\\', "\\\\").replace('"', "\\\"");
            format!("\"{escaped}\"")
        })
        .collect();
    format!("in.({})", urlencoding::encode(&quoted.join(",")))
}
