//! OS keyring key-value store
//!
//! Each key becomes its own keyring entry under the `cvforge` service name.
//! The keyring has no batch primitive; `set_many` writes entries in the order
//! given, so callers put the value readers gate on (the token) last.

use super::KeyValueStore;
use crate::error::{CvforgeError, Result};

const SERVICE_NAME: &str = "cvforge";

/// [`KeyValueStore`] backed by the platform credential store (Keychain,
/// Secret Service, Windows Credential Manager).
#[derive(Debug, Clone)]
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    /// Creates a store under the default `cvforge` service name.
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    /// Creates a store under a custom service name (isolates test runs).
    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<keyring::Entry> {
        Ok(keyring::Entry::new(&self.service, key).map_err(CvforgeError::Keyring)?)
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl KeyValueStore for KeyringStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(CvforgeError::Keyring(e).into()),
        }
    }

    async fn set_many(&self, entries: &[(&str, &str)]) -> Result<()> {
        for (k, v) in entries {
            self.entry(k)?
                .set_password(v)
                .map_err(CvforgeError::Keyring)?;
        }
        Ok(())
    }

    async fn remove_many(&self, keys: &[&str]) -> Result<()> {
        for k in keys {
            match self.entry(k)?.delete_password() {
                Ok(()) | Err(keyring::Error::NoEntry) => {}
                Err(e) => return Err(CvforgeError::Keyring(e).into()),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_service_name() {
        assert_eq!(KeyringStore::new().service, "cvforge");
    }

    #[tokio::test]
    #[ignore = "requires system keyring"]
    async fn test_keyring_roundtrip() {
        let store = KeyringStore::with_service("cvforge-test");
        store.set_many(&[("authToken", "tok")]).await.expect("set");
        assert_eq!(store.get("authToken").await.expect("get").as_deref(), Some("tok"));
        store.remove_many(&["authToken"]).await.expect("remove");
        assert!(store.get("authToken").await.expect("get").is_none());
        store.remove_many(&["authToken"]).await.expect("idempotent remove");
    }
}
