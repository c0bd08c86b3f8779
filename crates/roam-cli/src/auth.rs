//! CLI session persistence in the OS keychain.

#[cfg(test)]
use std::collections::HashMap;
#[cfg(test)]
use std::sync::{Mutex, OnceLock};

#[cfg(not(test))]
use keyring::Entry;

use roam_core::auth::{AuthResult, SessionPersistence, SupabaseAuthClient};
pub use roam_core::auth::{AuthError, AuthSession};
use roam_core::config::BackendConfig;

#[cfg(not(test))]
const KEYRING_SERVICE_NAME: &str = "roam-cli";

pub type AuthClient = SupabaseAuthClient<SessionStore>;

/// Keychain entry holding one profile's session as JSON.
#[derive(Clone)]
pub struct SessionStore {
    username: String,
}

impl SessionStore {
    pub fn new(profile_name: &str) -> Self {
        Self {
            username: format!("supabase_session:{profile_name}"),
        }
    }

    #[cfg(not(test))]
    fn entry(&self) -> AuthResult<Entry> {
        Entry::new(KEYRING_SERVICE_NAME, &self.username).map_err(storage_error)
    }

    #[cfg(not(test))]
    fn read_raw(&self) -> AuthResult<Option<String>> {
        match self.entry()?.get_password() {
            Ok(raw) => Ok(Some(raw)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(storage_error(error)),
        }
    }

    #[cfg(not(test))]
    fn write_raw(&self, raw: &str) -> AuthResult<()> {
        self.entry()?.set_password(raw).map_err(storage_error)
    }

    #[cfg(not(test))]
    fn delete_raw(&self) -> AuthResult<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(storage_error(error)),
        }
    }

    // Tests never touch the real keychain.
    #[cfg(test)]
    fn with_test_store<T>(
        &self,
        apply: impl FnOnce(&mut HashMap<String, String>) -> T,
    ) -> AuthResult<T> {
        static STORE: OnceLock<Mutex<HashMap<String, String>>> = OnceLock::new();
        let mut guard = STORE
            .get_or_init(Mutex::default)
            .lock()
            .map_err(storage_error)?;
        Ok(apply(&mut guard))
    }

    #[cfg(test)]
    fn read_raw(&self) -> AuthResult<Option<String>> {
        self.with_test_store(|store| store.get(&self.username).cloned())
    }

    #[cfg(test)]
    fn write_raw(&self, raw: &str) -> AuthResult<()> {
        self.with_test_store(|store| {
            store.insert(self.username.clone(), raw.to_owned());
        })
    }

    #[cfg(test)]
    fn delete_raw(&self) -> AuthResult<()> {
        self.with_test_store(|store| {
            store.remove(&self.username);
        })
    }
}

fn storage_error(error: impl std::fmt::Display) -> AuthError {
    AuthError::SecureStorage(error.to_string())
}

impl SessionPersistence for SessionStore {
    fn load_session(&self) -> AuthResult<Option<AuthSession>> {
        self.read_raw()?
            .map(|raw| serde_json::from_str(&raw))
            .transpose()
            .map_err(AuthError::from)
    }

    fn save_session(&self, session: &AuthSession) -> AuthResult<()> {
        self.write_raw(&serde_json::to_string(session)?)
    }

    fn clear_session(&self) -> AuthResult<()> {
        self.delete_raw()
    }
}

pub fn auth_client(profile_name: &str, backend: &BackendConfig) -> AuthResult<AuthClient> {
    SupabaseAuthClient::new(backend, SessionStore::new(profile_name))
}

pub fn clear_stored_session(profile_name: &str) -> AuthResult<()> {
    SessionStore::new(profile_name).clear_session()
}

#[cfg(test)]
mod tests {
    use roam_core::auth::AuthUser;

    use super::*;

    fn session() -> AuthSession {
        AuthSession {
            access_token: "profile-access".to_string(),
            refresh_token: "profile-refresh".to_string(),
            expires_at: 1_800_000_000,
            user: AuthUser {
                id: "user-1".to_string(),
                email: Some("ada@example.com".to_string()),
            },
        }
    }

    #[test]
    fn sessions_are_scoped_per_profile() {
        let work = SessionStore::new("auth-test-work");
        let home = SessionStore::new("auth-test-home");

        work.save_session(&session()).unwrap();

        assert_eq!(work.load_session().unwrap(), Some(session()));
        assert_eq!(home.load_session().unwrap(), None);

        clear_stored_session("auth-test-work").unwrap();
        assert_eq!(work.load_session().unwrap(), None);
    }

    #[test]
    fn clearing_missing_session_succeeds() {
        assert!(clear_stored_session("auth-test-never-saved").is_ok());
    }
}
