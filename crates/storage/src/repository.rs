use async_trait::async_trait;
use lab_core::model::ProgressSnapshot;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::document;

/// Record name used when no other session key is configured.
pub const DEFAULT_SESSION_KEY: &str = "orbital-lab-storage";

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Durable key-value storage for lesson progress.
///
/// Each session key maps to one flat document; saving overwrites it.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Load the persisted progress for `key`.
    ///
    /// Missing or malformed fields inside a stored document are defaulted;
    /// `Ok(None)` means nothing was ever stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn load_progress(&self, key: &str) -> Result<Option<ProgressSnapshot>, StorageError>;

    /// Persist progress for `key`, replacing any previous document.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the document cannot be encoded or written.
    async fn save_progress(&self, key: &str, snapshot: &ProgressSnapshot)
    -> Result<(), StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
///
/// Documents are kept in their encoded form so loads go through the same
/// tolerant decoding as durable backends.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    documents: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self {
            documents: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Store a raw document as-is, bypassing encoding.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn insert_raw(&self, key: &str, raw: impl Into<String>) -> Result<(), StorageError> {
        let mut guard = self
            .documents
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(key.to_owned(), raw.into());
        Ok(())
    }

    /// The raw stored document for `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn raw(&self, key: &str) -> Result<Option<String>, StorageError> {
        let guard = self
            .documents
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(key).cloned())
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn load_progress(&self, key: &str) -> Result<Option<ProgressSnapshot>, StorageError> {
        Ok(self.raw(key)?.as_deref().map(document::decode))
    }

    async fn save_progress(
        &self,
        key: &str,
        snapshot: &ProgressSnapshot,
    ) -> Result<(), StorageError> {
        let encoded = document::encode(snapshot)?;
        self.insert_raw(key, encoded)
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub progress: Arc<dyn ProgressRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let progress: Arc<dyn ProgressRepository> = Arc::new(InMemoryRepository::new());
        Self { progress }
    }
}
