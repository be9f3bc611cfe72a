//! Durable key/value storage for session credentials.
//!
//! Mirrors browser `localStorage` semantics: plain string values, no expiry,
//! no encryption. Values survive restarts until explicitly cleared.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

/// Storage file name inside the data directory
const STORAGE_FILE: &str = "storage.json";

/// Keys persisted by the session layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    Token,
    RefreshToken,
    Username,
    IsAdmin,
    /// Hand-off slot for a token delivered by the OAuth redirect.
    /// Only lives between the callback and login completion.
    OAuthHandoff,
}

impl StorageKey {
    /// Keys that make up a logged-in session (cleared on logout).
    pub const SESSION: [StorageKey; 4] = [
        StorageKey::Token,
        StorageKey::RefreshToken,
        StorageKey::Username,
        StorageKey::IsAdmin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKey::Token => "token",
            StorageKey::RefreshToken => "refreshToken",
            StorageKey::Username => "username",
            StorageKey::IsAdmin => "isAdmin",
            StorageKey::OAuthHandoff => "yandex_token",
        }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to write storage file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize storage: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Persistent string storage keyed by [`StorageKey`].
pub trait TokenStore {
    fn get(&self, key: StorageKey) -> Option<String>;

    fn set(&mut self, key: StorageKey, value: &str) -> Result<(), StoreError>;

    fn clear(&mut self, key: StorageKey) -> Result<(), StoreError>;
}

/// In-process store, used by tests and as a fallback when no data
/// directory is available.
#[derive(Debug, Default, Clone)]
pub struct MemoryTokenStore {
    values: BTreeMap<String, String>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, key: StorageKey) -> Option<String> {
        self.values.get(key.as_str()).cloned()
    }

    fn set(&mut self, key: StorageKey, value: &str) -> Result<(), StoreError> {
        self.values.insert(key.as_str().to_string(), value.to_string());
        Ok(())
    }

    fn clear(&mut self, key: StorageKey) -> Result<(), StoreError> {
        self.values.remove(key.as_str());
        Ok(())
    }
}

/// Store backed by a JSON file. Every mutation is written through
/// immediately; reads are served from memory.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl FileTokenStore {
    /// Open the store in `dir`, loading any existing values.
    /// A missing or unreadable file opens as an empty store.
    pub fn open(dir: impl AsRef<Path>) -> Self {
        let path = dir.as_ref().join(STORAGE_FILE);
        let values = Self::read_values(&path);
        debug!(path = %path.display(), keys = values.len(), "Opened token store");
        Self { path, values }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_values(path: &Path) -> BTreeMap<String, String> {
        if !path.exists() {
            return BTreeMap::new();
        }
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read storage file");
                return BTreeMap::new();
            }
        };
        match serde_json::from_str(&contents) {
            Ok(values) => values,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring corrupt storage file");
                BTreeMap::new()
            }
        }
    }

    /// Write `values` to disk and adopt them. On failure the in-memory
    /// view keeps matching the file.
    fn commit(&mut self, values: BTreeMap<String, String>) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let contents = serde_json::to_string_pretty(&values)?;
        std::fs::write(&self.path, contents).map_err(io_err)?;
        self.values = values;
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self, key: StorageKey) -> Option<String> {
        self.values.get(key.as_str()).cloned()
    }

    fn set(&mut self, key: StorageKey, value: &str) -> Result<(), StoreError> {
        let mut values = self.values.clone();
        values.insert(key.as_str().to_string(), value.to_string());
        self.commit(values)
    }

    fn clear(&mut self, key: StorageKey) -> Result<(), StoreError> {
        if !self.values.contains_key(key.as_str()) {
            return Ok(());
        }
        let mut values = self.values.clone();
        values.remove(key.as_str());
        self.commit(values)
    }
}

// ============================================================================
// Tests
// ============================================================================
