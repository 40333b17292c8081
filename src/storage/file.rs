//! Embedded sled key-value store
//!
//! Values are stored as UTF-8 bytes. Writes go through a [`sled::Batch`]
//! so a multi-key update is applied atomically, then flushed.

use std::path::Path;

use super::KeyValueStore;
use crate::error::{CvforgeError, Result};

/// On-disk [`KeyValueStore`] backed by `sled`.
#[derive(Debug)]
pub struct SledStore {
    db: sled::Db,
}

impl SledStore {
    /// Open or create a store at `path`
    ///
    /// # Errors
    ///
    /// Returns `CvforgeError::Storage` if the database cannot be opened
    ///
    /// # Examples
    ///
    /// ```
    /// use cvforge::storage::SledStore;
    ///
    /// # fn main() -> cvforge::error::Result<()> {
    /// let dir = tempfile::TempDir::new()?;
    /// let store = SledStore::open(dir.path().join("session.db"))?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = sled::open(path)
            .map_err(|e| CvforgeError::Storage(format!("Failed to open database: {}", e)))?;
        Ok(Self { db })
    }
}

#[async_trait::async_trait]
impl KeyValueStore for SledStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .db
            .get(key.as_bytes())
            .map_err(|e| CvforgeError::Storage(format!("Get failed: {}", e)))?;

        match value {
            Some(bytes) => {
                let s = String::from_utf8(bytes.to_vec())
                    .map_err(|e| CvforgeError::Storage(format!("Invalid UTF-8 value: {}", e)))?;
                Ok(Some(s))
            }
            None => Ok(None),
        }
    }

    async fn set_many(&self, entries: &[(&str, &str)]) -> Result<()> {
        let mut batch = sled::Batch::default();
        for (k, v) in entries {
            batch.insert(k.as_bytes(), v.as_bytes());
        }
        self.db
            .apply_batch(batch)
            .map_err(|e| CvforgeError::Storage(format!("Insert failed: {}", e)))?;
        self.db
            .flush()
            .map_err(|e| CvforgeError::Storage(format!("Flush failed: {}", e)))?;
        Ok(())
    }

    async fn remove_many(&self, keys: &[&str]) -> Result<()> {
        let mut batch = sled::Batch::default();
        for k in keys {
            batch.remove(k.as_bytes());
        }
        self.db
            .apply_batch(batch)
            .map_err(|e| CvforgeError::Storage(format!("Remove failed: {}", e)))?;
        self.db
            .flush()
            .map_err(|e| CvforgeError::Storage(format!("Flush failed: {}", e)))?;
        Ok(())
    }
}
