//! Persistent key-value backends for session state
//!
//! The session token and the handful of identity fields that travel with it
//! are the only durable state this crate owns. They live behind the
//! [`KeyValueStore`] trait so the token store does not care whether they end
//! up in the OS keyring, an embedded sled database, or process memory.
//!
//! - [`secure::KeyringStore`] -- OS native credential store
//! - [`file::SledStore`] -- embedded database under the platform data dir
//! - [`memory::MemoryStore`] -- in-process map, used by tests and `--storage memory`

use std::path::PathBuf;
use std::sync::Arc;

use directories::ProjectDirs;

use crate::config::{StorageBackend, StorageConfig};
use crate::error::{CvforgeError, Result};

pub mod file;
pub mod memory;
pub mod secure;

pub use file::SledStore;
pub use memory::MemoryStore;
pub use secure::KeyringStore;

/// Abstraction over a small persistent string map.
///
/// Implementations must make a completed `set_many` visible to every
/// subsequent `get`, and must apply the batch as a unit where the backend
/// allows it.
#[async_trait::async_trait]
pub trait KeyValueStore: Send + Sync + std::fmt::Debug {
    /// Reads one value. `Ok(None)` means the key is absent.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Writes every pair in `entries`.
    async fn set_many(&self, entries: &[(&str, &str)]) -> Result<()>;

    /// Removes every key in `keys`; absent keys are not an error.
    async fn remove_many(&self, keys: &[&str]) -> Result<()>;
}

/// Opens the backend selected in `config`.
///
/// # Errors
///
/// Returns [`CvforgeError::Storage`] if the file backend cannot determine
/// or open its database directory.
pub fn open_store(config: &StorageConfig) -> Result<Arc<dyn KeyValueStore>> {
    let store: Arc<dyn KeyValueStore> = match config.backend {
        StorageBackend::Keyring => Arc::new(KeyringStore::new()),
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
        StorageBackend::File => {
            let path = match &config.path {
                Some(p) => p.clone(),
                None => default_store_path()?,
            };
            tracing::debug!(path = %path.display(), "Opening session store");
            Arc::new(SledStore::open(path)?)
        }
    };
    Ok(store)
}

/// Default location of the sled session database.
pub fn default_store_path() -> Result<PathBuf> {
    let proj_dirs = ProjectDirs::from("dev", "cvforge", "cvforge")
        .ok_or_else(|| CvforgeError::Storage("Could not determine data directory".into()))?;
    Ok(proj_dirs.data_dir().join("session.db"))
}
