//! JSON-serialized records stored as whole objects.

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::StorageError;
use crate::storage::Storage;

/// A typed value persisted as one JSON object, loaded on first access.
///
/// A record without a key, or whose key does not exist in the store,
/// starts out as `T::default()`. Only modified records are written back.
#[derive(Debug, Clone)]
pub struct LazyRecord<T> {
    key: Option<String>,
    value: Option<T>,
    modified: bool,
}

impl<T> LazyRecord<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    pub fn new(key: Option<String>) -> Self {
        Self {
            key,
            value: None,
            modified: false,
        }
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn is_loaded(&self) -> bool {
        self.value.is_some()
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Fetches and decodes the value unless already loaded.
    pub async fn load(&mut self, storage: &Storage) -> Result<&T, StorageError> {
        if self.value.is_none() {
            let value = self.fetch(storage).await?;
            self.value = Some(value);
        }
        Ok(&*self.value.get_or_insert_with(T::default))
    }

    pub async fn get(&mut self, storage: &Storage) -> Result<&T, StorageError> {
        self.load(storage).await
    }

    /// Mutable access; marks the record modified.
    pub async fn get_mut(&mut self, storage: &Storage) -> Result<&mut T, StorageError> {
        self.load(storage).await?;
        self.modified = true;
        Ok(self.value.get_or_insert_with(T::default))
    }

    /// Replaces the value without loading it.
    pub fn set(&mut self, value: T) {
        self.value = Some(value);
        self.modified = true;
    }

    /// Writes the value under `key` when modified and returns the stored key.
    ///
    /// An unmodified record writes nothing and returns its current key.
    pub async fn save(&mut self, storage: &Storage, key: &str) -> Result<Option<String>, StorageError> {
        if !self.modified {
            return Ok(self.key.clone());
        }
        let value = self.value.get_or_insert_with(T::default);
        let encoded = serde_json::to_vec(value)?;
        let stored = storage.save(key, encoded).await?;
        debug!(key = %stored, "record saved");
        self.key = Some(stored);
        self.modified = false;
        Ok(self.key.clone())
    }

    async fn fetch(&self, storage: &Storage) -> Result<T, StorageError> {
        let Some(key) = self.key.as_deref() else {
            return Ok(T::default());
        };
        if !storage.exists(key).await? {
            return Ok(T::default());
        }
        let body = storage.fetch(key).await?;
        if body.is_empty() {
            return Ok(T::default());
        }
        Ok(serde_json::from_slice(&body)?)
    }
}
