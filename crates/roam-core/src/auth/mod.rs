//! Supabase (GoTrue) email/password sessions.
//!
//! The client owns the session lifecycle and persists it through a
//! [`SessionPersistence`] backend supplied by the app. Turning a session into
//! an [`Identity`] also needs the account's role; see
//! [`crate::supabase::SupabaseProfileClient`].

use std::fmt;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::BackendConfig;
use crate::models::{Identity, Role, UserId};
use crate::util::{compact_text, unix_timestamp_now};

/// Sessions this close to expiry are refreshed before use.
const EXPIRY_SKEW_SECONDS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
    pub user: AuthUser,
}

impl AuthSession {
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at <= unix_timestamp_now() + EXPIRY_SKEW_SECONDS
    }

    pub fn user_id(&self) -> AuthResult<UserId> {
        UserId::parse(&self.user.id)
            .map_err(|_| AuthError::Api("Session is missing a user id".to_string()))
    }

    /// Identity of the session's account with the given role.
    pub fn identity(&self, role: Role) -> AuthResult<Identity> {
        Ok(Identity::new(self.user_id()?, role))
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AuthSession")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpOutcome {
    SignedIn(AuthSession),
    /// The project requires email confirmation before the first sign-in
    ConfirmationRequired,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Email and password are required")]
    MissingCredentials,
    #[error("Auth request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Malformed session data: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Sign-in service refused: {0}")]
    Api(String),
    #[error("Session storage unavailable: {0}")]
    SecureStorage(String),
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Where the current session is kept between runs.
pub trait SessionPersistence: Clone + Send + Sync + 'static {
    fn load_session(&self) -> AuthResult<Option<AuthSession>>;
    fn save_session(&self, session: &AuthSession) -> AuthResult<()>;
    fn clear_session(&self) -> AuthResult<()>;
}

#[derive(Clone)]
pub struct SupabaseAuthClient<S: SessionPersistence> {
    auth_url: String,
    anon_key: String,
    client: Client,
    store: S,
}

impl<S: SessionPersistence> SupabaseAuthClient<S> {
    pub fn new(config: &BackendConfig, store: S) -> AuthResult<Self> {
        Ok(Self {
            auth_url: config.auth_url(),
            anon_key: config.supabase_anon_key.clone(),
            client: Client::builder().build()?,
            store,
        })
    }

    /// Load the persisted session, refreshing it when expired.
    ///
    /// A session that cannot be refreshed is cleared and reported as absent.
    pub async fn restore_session(&self) -> AuthResult<Option<AuthSession>> {
        let Some(stored) = self.store.load_session()? else {
            return Ok(None);
        };

        if !stored.is_expired() {
            return Ok(Some(stored));
        }

        match self.refresh_session(&stored.refresh_token).await {
            Ok(refreshed) => Ok(Some(refreshed)),
            Err(error) => {
                tracing::warn!("Stored session could not be renewed, signing out: {}", error);
                self.store.clear_session()?;
                Ok(None)
            }
        }
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> AuthResult<SignUpOutcome> {
        validate_credentials(email, password)?;

        let response = self
            .call(
                self.client
                    .post(format!("{}/signup", self.auth_url))
                    .json(&credentials_payload(email, password)),
            )
            .await?;
        let Some(session) = response.into_session()? else {
            return Ok(SignUpOutcome::ConfirmationRequired);
        };
        self.store.save_session(&session)?;
        tracing::info!("Created account {} with an active session", session.user.id);
        Ok(SignUpOutcome::SignedIn(session))
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> AuthResult<AuthSession> {
        validate_credentials(email, password)?;

        let session = self
            .grant("password", &credentials_payload(email, password))
            .await?;
        tracing::info!("Account {} signed in", session.user.id);
        Ok(session)
    }

    pub async fn refresh_session(&self, refresh_token: &str) -> AuthResult<AuthSession> {
        if refresh_token.trim().is_empty() {
            return Err(AuthError::Api("No refresh token stored".to_string()));
        }
        self.grant(
            "refresh_token",
            &serde_json::json!({ "refresh_token": refresh_token }),
        )
        .await
    }

    /// Revoke `session` server-side and forget it locally.
    ///
    /// The local session is cleared even when revocation fails, so a dead
    /// network never leaves the device signed in.
    pub async fn sign_out(&self, session: &AuthSession) -> AuthResult<()> {
        let revoked = self
            .client
            .post(format!("{}/logout", self.auth_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(&session.access_token)
            .send()
            .await;
        self.store.clear_session()?;

        let response = revoked?;
        match response.status() {
            // An already-expired token has nothing left to revoke.
            status if status.is_success() || status == StatusCode::UNAUTHORIZED => Ok(()),
            status => Err(AuthError::Api(parse_api_error(
                status,
                &response.text().await.unwrap_or_default(),
            ))),
        }
    }

    /// Exchange a grant at `/token` and persist the resulting session.
    async fn grant(&self, grant_type: &str, body: &serde_json::Value) -> AuthResult<AuthSession> {
        let response = self
            .call(
                self.client
                    .post(format!("{}/token", self.auth_url))
                    .query(&[("grant_type", grant_type)])
                    .json(body),
            )
            .await?;
        let session = response.into_session()?.ok_or_else(|| {
            AuthError::Api(format!("No session returned for the {grant_type} grant"))
        })?;
        self.store.save_session(&session)?;
        Ok(session)
    }

    async fn call(&self, request: RequestBuilder) -> AuthResult<SupabaseAuthResponse> {
        let response = request
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.anon_key)
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }
        Err(AuthError::Api(parse_api_error(
            status,
            &response.text().await.unwrap_or_default(),
        )))
    }
}

fn credentials_payload(email: &str, password: &str) -> serde_json::Value {
    serde_json::json!({
        "email": email.trim(),
        "password": password,
    })
}

fn validate_credentials(email: &str, password: &str) -> AuthResult<()> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(AuthError::MissingCredentials);
    }
    Ok(())
}

/// Token endpoints answer flat; `/signup` may nest the session.
#[derive(Debug, Default, Deserialize)]
struct SupabaseAuthResponse {
    #[serde(flatten)]
    tokens: SessionFields,
    session: Option<SessionFields>,
}

#[derive(Debug, Default, Deserialize)]
struct SessionFields {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
    expires_in: Option<i64>,
    user: Option<AuthUser>,
}

impl SessionFields {
    fn or(self, fallback: Self) -> Self {
        Self {
            access_token: self.access_token.or(fallback.access_token),
            refresh_token: self.refresh_token.or(fallback.refresh_token),
            expires_at: self.expires_at.or(fallback.expires_at),
            expires_in: self.expires_in.or(fallback.expires_in),
            user: self.user.or(fallback.user),
        }
    }
}

impl SupabaseAuthResponse {
    fn into_session(self) -> AuthResult<Option<AuthSession>> {
        let fields = self.tokens.or(self.session.unwrap_or_default());
        let expires_at = fields.expires_at.or_else(|| {
            fields
                .expires_in
                .map(|expires_in| unix_timestamp_now().saturating_add(expires_in))
        });

        match (fields.access_token, fields.refresh_token, expires_at, fields.user) {
            (Some(access_token), Some(refresh_token), Some(expires_at), Some(user)) => {
                Ok(Some(AuthSession {
                    access_token,
                    refresh_token,
                    expires_at,
                    user,
                }))
            }
            (None, None, None, Some(_)) => Ok(None),
            _ => Err(AuthError::Api("Incomplete session in auth response".to_string())),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SupabaseErrorResponse {
    error: Option<String>,
    error_description: Option<String>,
    message: Option<String>,
    msg: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    let message = serde_json::from_str::<SupabaseErrorResponse>(body)
        .ok()
        .and_then(|payload| {
            payload
                .message
                .or(payload.msg)
                .or(payload.error_description)
                .or(payload.error)
        })
        .map_or_else(|| compact_text(body), |message| message.trim().to_string());

    let code = status.as_u16();
    if message.is_empty() {
        format!("HTTP {code}")
    } else {
        format!("{message} ({code})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn session(expires_at: i64) -> AuthSession {
        AuthSession {
            access_token: "at-do-not-print".to_string(),
            refresh_token: "rt-do-not-print".to_string(),
            expires_at,
            user: AuthUser {
                id: "user-1".to_string(),
                email: Some("ada@example.com".to_string()),
            },
        }
    }

    #[test]
    fn signup_without_session_means_confirmation_required() {
        let response: SupabaseAuthResponse =
            serde_json::from_str(r#"{"id": "ignored", "user": {"id": "user-1", "email": null}}"#)
                .unwrap();
        assert!(response.into_session().unwrap().is_none());
    }

    #[test]
    fn nested_signup_session_is_used() {
        let response: SupabaseAuthResponse = serde_json::from_str(
            r#"{
                "session": {
                    "access_token": "a",
                    "refresh_token": "r",
                    "expires_at": 1700000000,
                    "user": {"id": "user-1", "email": "ada@example.com"}
                }
            }"#,
        )
        .unwrap();
        let session = response.into_session().unwrap().unwrap();
        assert_eq!(session.expires_at, 1_700_000_000);
        assert_eq!(session.user.id, "user-1");
    }

    #[test]
    fn expires_in_is_converted_to_absolute_time() {
        let response: SupabaseAuthResponse = serde_json::from_str(
            r#"{
                "access_token": "a",
                "refresh_token": "r",
                "expires_in": 3600,
                "user": {"id": "user-1"}
            }"#,
        )
        .unwrap();
        let session = response.into_session().unwrap().unwrap();
        assert!(!session.is_expired());
    }

    #[test]
    fn incomplete_session_is_an_error() {
        let response: SupabaseAuthResponse =
            serde_json::from_str(r#"{"access_token": "a", "user": {"id": "user-1"}}"#).unwrap();
        assert!(response.into_session().is_err());
    }

    #[test]
    fn session_near_expiry_counts_as_expired() {
        assert!(session(unix_timestamp_now() + 10).is_expired());
        assert!(!session(unix_timestamp_now() + 3600).is_expired());
    }

    #[test]
    fn session_identity_carries_role() {
        let identity = session(0).identity(Role::Admin).unwrap();
        assert_eq!(identity.user_id.as_str(), "user-1");
        assert_eq!(identity.role, Role::Admin);
    }

    #[test]
    fn session_debug_redacts_tokens() {
        let rendered = format!("{:?}", session(1_700_000_000));
        assert!(!rendered.contains("at-do-not-print"));
        assert!(!rendered.contains("rt-do-not-print"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn api_error_prefers_message_fields() {
        assert_eq!(
            parse_api_error(
                StatusCode::BAD_REQUEST,
                r#"{"error": "invalid_grant", "error_description": "Invalid login credentials"}"#
            ),
            "Invalid login credentials (400)"
        );
        assert_eq!(parse_api_error(StatusCode::BAD_GATEWAY, ""), "HTTP 502");
    }

    #[test]
    fn blank_credentials_are_rejected() {
        assert!(matches!(
            validate_credentials(" ", "pw"),
            Err(AuthError::MissingCredentials)
        ));
        assert!(validate_credentials("ada@example.com", "pw").is_ok());
    }
}
