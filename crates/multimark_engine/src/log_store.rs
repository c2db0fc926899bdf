//! Audit log of committed searches, kept as a bounded FIFO list under a single
//! storage key.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use engine_logging::{engine_debug, LogContext};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::persist::{DocumentDir, PersistError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchLogEntry {
    pub timestamp: String,
    pub query: String,
    pub match_count: usize,
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to read `{key}`: {source}")]
    Read { key: String, source: io::Error },
    #[error(transparent)]
    Write(PersistError),
    #[error("`{key}` does not hold a valid log: {source}")]
    Corrupt {
        key: String,
        source: serde_json::Error,
    },
}

/// Key/value storage holding one JSON document per key.
pub trait StorageArea: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;
    fn set(&self, key: &str, value: Value) -> Result<(), StorageError>;
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, Value>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageArea for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.to_string(), value);
        Ok(())
    }
}

/// Stores each key as its own JSON document in a [`DocumentDir`].
#[derive(Debug, Clone)]
pub struct FileStorage {
    docs: DocumentDir,
}

impl FileStorage {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            docs: DocumentDir::new(dir),
        }
    }
}

impl StorageArea for FileStorage {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let text = self.docs.read(key).map_err(|source| StorageError::Read {
            key: key.to_string(),
            source,
        })?;
        let Some(text) = text else {
            return Ok(None);
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|source| StorageError::Corrupt {
                key: key.to_string(),
                source,
            })
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        self.docs
            .write(key, &value.to_string())
            .map(|_| ())
            .map_err(StorageError::Write)
    }
}

#[derive(Debug, Clone)]
pub struct LogStoreSettings {
    pub capacity: usize,
    pub key: String,
}

impl Default for LogStoreSettings {
    fn default() -> Self {
        Self {
            capacity: 1000,
            key: "searchLogs".to_string(),
        }
    }
}

#[derive(Clone)]
pub struct LogStore {
    storage: Arc<dyn StorageArea>,
    settings: LogStoreSettings,
}

impl LogStore {
    pub fn new(storage: Arc<dyn StorageArea>, settings: LogStoreSettings) -> Self {
        Self { storage, settings }
    }

    pub fn settings(&self) -> &LogStoreSettings {
        &self.settings
    }

    /// Appends `entry`, evicting the oldest entries past the capacity.
    pub fn append(&self, entry: SearchLogEntry) -> Result<(), StorageError> {
        let mut entries = self.entries()?;
        entries.push(entry);
        if entries.len() > self.settings.capacity {
            let excess = entries.len() - self.settings.capacity;
            entries.drain(..excess);
        }
        engine_debug!(
            ctx: LogContext::Background,
            "search log now holds {} entries",
            entries.len()
        );
        self.write(&entries)
    }

    /// Stored entries, oldest first. A missing key reads as an empty log.
    pub fn entries(&self) -> Result<Vec<SearchLogEntry>, StorageError> {
        let key = &self.settings.key;
        match self.storage.get(key)? {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(value) => serde_json::from_value(value).map_err(|source| StorageError::Corrupt {
                key: key.clone(),
                source,
            }),
        }
    }

    pub fn reset(&self) -> Result<(), StorageError> {
        self.write(&[])
    }

    fn write(&self, entries: &[SearchLogEntry]) -> Result<(), StorageError> {
        let key = &self.settings.key;
        let value = serde_json::to_value(entries).map_err(|source| StorageError::Corrupt {
            key: key.clone(),
            source,
        })?;
        self.storage.set(key, value)
    }
}

impl std::fmt::Debug for LogStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogStore")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
