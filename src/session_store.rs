use std::sync::Arc;

use chrono::{DateTime, Utc};
use keyring::Entry;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::plex::AccountSession;

const SERVICE_NAME: &str = "curator";
const SESSION_KEY: &str = "plex_session";

#[derive(Error, Debug)]
pub enum SessionStoreError {
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Persisted session blob for remembered logins.
///
/// Only the account token is required to rebuild a session; the rest is
/// informational.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedSession {
    pub auth_token: String,
    pub username: String,
    pub saved_at: DateTime<Utc>,
}

impl SavedSession {
    pub fn from_account(account: &AccountSession) -> Self {
        SavedSession {
            auth_token: account.auth_token.clone(),
            username: account.username.clone(),
            saved_at: Utc::now(),
        }
    }
}

/// Backing secret storage (allows in-memory storage for tests)
pub trait SecretStore: Send + Sync {
    fn get(&self) -> Result<Option<String>, SessionStoreError>;
    fn set(&self, value: &str) -> Result<(), SessionStoreError>;
    fn delete(&self) -> Result<(), SessionStoreError>;
}

/// Production secret storage in the system keychain
struct KeyringStore {
    entry: Entry,
}

impl SecretStore for KeyringStore {
    fn get(&self) -> Result<Option<String>, SessionStoreError> {
        match self.entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(SessionStoreError::Keyring(e)),
        }
    }

    fn set(&self, value: &str) -> Result<(), SessionStoreError> {
        self.entry.set_password(value)?;
        Ok(())
    }

    fn delete(&self) -> Result<(), SessionStoreError> {
        match self.entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(SessionStoreError::Keyring(e)),
        }
    }
}

/// In-memory secret storage for tests
#[cfg(any(test, feature = "test-utils"))]
#[derive(Default)]
pub struct MemorySecretStore {
    value: std::sync::Mutex<Option<String>>,
}

#[cfg(any(test, feature = "test-utils"))]
impl SecretStore for MemorySecretStore {
    fn get(&self) -> Result<Option<String>, SessionStoreError> {
        Ok(self.value.lock().unwrap().clone())
    }

    fn set(&self, value: &str) -> Result<(), SessionStoreError> {
        *self.value.lock().unwrap() = Some(value.to_string());
        Ok(())
    }

    fn delete(&self) -> Result<(), SessionStoreError> {
        *self.value.lock().unwrap() = None;
        Ok(())
    }
}

/// Saved-session persistence for remembered logins.
///
/// Cloning is cheap (clones Arc); all clones share the same backend.
#[derive(Clone)]
pub struct SessionStore {
    backend: Arc<dyn SecretStore>,
}

impl SessionStore {
    /// Open the store backed by the system keychain.
    pub fn new() -> Result<Self, SessionStoreError> {
        let entry = Entry::new(SERVICE_NAME, SESSION_KEY)?;
        Ok(Self::from_backend(Arc::new(KeyringStore { entry })))
    }

    pub fn from_backend(backend: Arc<dyn SecretStore>) -> Self {
        SessionStore { backend }
    }

    /// Store kept entirely in memory; nothing touches the keychain.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn in_memory() -> Self {
        Self::from_backend(Arc::new(MemorySecretStore::default()))
    }

    /// Load the saved session, if one was persisted. A missing entry is
    /// `None`, not an error.
    pub fn load(&self) -> Result<Option<SavedSession>, SessionStoreError> {
        match self.backend.get()? {
            Some(json) => {
                let saved: SavedSession = serde_json::from_str(&json)?;
                debug!("Loaded saved session for {}", saved.username);
                Ok(Some(saved))
            }
            None => {
                debug!("No saved session found");
                Ok(None)
            }
        }
    }

    pub fn save(&self, session: &SavedSession) -> Result<(), SessionStoreError> {
        let json = serde_json::to_string(session)?;
        self.backend.set(&json)?;
        debug!("Persisted session for {}", session.username);
        Ok(())
    }

    pub fn delete(&self) -> Result<(), SessionStoreError> {
        self.backend.delete()
    }
}
