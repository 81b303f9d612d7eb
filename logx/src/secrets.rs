//! Secret storage for credential owners.
//!
//! The core only ever asks for a username/password pair by owner id and keeps
//! it for the duration of one retrieval. Passwords are wiped when the
//! [`Credentials`] value is dropped.

use parking_lot::Mutex;
use std::collections::HashMap;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Keyring service name under which credentials are stored.
pub const SERVICE_NAME: &str = "logx";

/// Errors returned by a [`SecretStore`].
#[derive(Error, Debug)]
pub enum SecretError {
    #[error("no credentials stored for '{0}'")]
    NotFound(String),
    #[error("stored credentials for '{0}' are malformed")]
    Malformed(String),
    #[error("secret store unavailable: {0}")]
    Backend(String),
}

/// A username/password pair.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Serialised form kept in the keyring.
    fn encode(&self) -> String {
        format!("{}:{}", self.username, self.password)
    }

    /// Split on the first `:`; the password may itself contain colons.
    fn decode(owner_id: &str, secret: &str) -> Result<Self, SecretError> {
        match secret.split_once(':') {
            Some((username, password)) if !username.is_empty() => {
                Ok(Self::new(username, password))
            }
            _ => Err(SecretError::Malformed(owner_id.to_string())),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Maps an opaque owner id to a credential pair.
pub trait SecretStore: Send + Sync {
    fn get(&self, owner_id: &str) -> Result<Credentials, SecretError>;
    fn put(&self, owner_id: &str, credentials: &Credentials) -> Result<(), SecretError>;
    fn delete(&self, owner_id: &str) -> Result<(), SecretError>;
}

/// Secret store backed by the operating system keyring.
#[derive(Debug, Clone)]
pub struct KeyringStore {
    service: String,
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new(SERVICE_NAME)
    }
}

impl KeyringStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, owner_id: &str) -> Result<keyring::Entry, SecretError> {
        keyring::Entry::new(&self.service, owner_id).map_err(|e| SecretError::Backend(e.to_string()))
    }
}

impl SecretStore for KeyringStore {
    fn get(&self, owner_id: &str) -> Result<Credentials, SecretError> {
        let mut secret = match self.entry(owner_id)?.get_password() {
            Ok(secret) => secret,
            Err(keyring::Error::NoEntry) => return Err(SecretError::NotFound(owner_id.to_string())),
            Err(e) => return Err(SecretError::Backend(e.to_string())),
        };
        let credentials = Credentials::decode(owner_id, &secret);
        secret.zeroize();
        credentials
    }

    fn put(&self, owner_id: &str, credentials: &Credentials) -> Result<(), SecretError> {
        let mut secret = credentials.encode();
        let result = self
            .entry(owner_id)?
            .set_password(&secret)
            .map_err(|e| SecretError::Backend(e.to_string()));
        secret.zeroize();
        result
    }

    fn delete(&self, owner_id: &str) -> Result<(), SecretError> {
        match self.entry(owner_id)?.delete_credential() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => Err(SecretError::NotFound(owner_id.to_string())),
            Err(e) => Err(SecretError::Backend(e.to_string())),
        }
    }
}

/// In-process secret store.
#[derive(Default)]
pub struct MemoryStore {
    secrets: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(owner_id: &str, credentials: Credentials) -> Self {
        let store = Self::new();
        store.secrets.lock().insert(owner_id.to_string(), credentials.encode());
        store
    }
}

impl SecretStore for MemoryStore {
    fn get(&self, owner_id: &str) -> Result<Credentials, SecretError> {
        let secrets = self.secrets.lock();
        let secret = secrets
            .get(owner_id)
            .ok_or_else(|| SecretError::NotFound(owner_id.to_string()))?;
        Credentials::decode(owner_id, secret)
    }

    fn put(&self, owner_id: &str, credentials: &Credentials) -> Result<(), SecretError> {
        self.secrets.lock().insert(owner_id.to_string(), credentials.encode());
        Ok(())
    }

    fn delete(&self, owner_id: &str) -> Result<(), SecretError> {
        match self.secrets.lock().remove(owner_id) {
            Some(mut secret) => {
                secret.zeroize();
                Ok(())
            }
            None => Err(SecretError::NotFound(owner_id.to_string())),
        }
    }
}
