//! Bearer token storage.
//!
//! The request interceptor reads the token on every request, so swapping or
//! clearing it takes effect immediately for all outgoing calls.

use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use thiserror::Error;
use tracing::{debug, warn};

/// Key under which the token is kept, mirroring the browser's local storage entry.
pub const TOKEN_KEY: &str = "token";

/// Errors raised when persisting a token.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Token storage I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Token storage is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("Token storage lock poisoned")]
    Poisoned,
}

/// Source of the bearer token attached to outgoing requests.
pub trait TokenStore: Send + Sync {
    /// Current token, if one is stored.
    fn token(&self) -> Option<String>;

    fn set_token(&self, token: &str) -> Result<(), StorageError>;

    fn clear_token(&self) -> Result<(), StorageError>;
}

/// In-process token store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: RwLock<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn token(&self) -> Option<String> {
        self.token.read().ok().and_then(|guard| guard.clone())
    }

    fn set_token(&self, token: &str) -> Result<(), StorageError> {
        let mut guard = self.token.write().map_err(|_| StorageError::Poisoned)?;
        *guard = Some(token.to_string());
        Ok(())
    }

    fn clear_token(&self) -> Result<(), StorageError> {
        let mut guard = self.token.write().map_err(|_| StorageError::Poisoned)?;
        *guard = None;
        Ok(())
    }
}

/// Token store backed by a JSON object on disk (`{"token": "..."}`).
///
/// The file is a flat key/value map so other entries written next to the
/// token are preserved when the token changes.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<Map<String, Value>, StorageError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(Map::new()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Map::new()),
            Err(source) => Err(StorageError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn write_map(&self, map: &Map<String, Value>) -> Result<(), StorageError> {
        let contents = serde_json::to_string_pretty(map)?;
        std::fs::write(&self.path, contents).map_err(|source| StorageError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

impl TokenStore for FileTokenStore {
    fn token(&self) -> Option<String> {
        match self.read_map() {
            Ok(map) => map
                .get(TOKEN_KEY)
                .and_then(Value::as_str)
                .map(str::to_string),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring unreadable token storage");
                None
            }
        }
    }

    fn set_token(&self, token: &str) -> Result<(), StorageError> {
        let mut map = self.read_map()?;
        map.insert(TOKEN_KEY.to_string(), Value::String(token.to_string()));
        self.write_map(&map)?;
        debug!(path = %self.path.display(), "Token stored");
        Ok(())
    }

    fn clear_token(&self) -> Result<(), StorageError> {
        let mut map = self.read_map()?;
        if map.remove(TOKEN_KEY).is_some() {
            self.write_map(&map)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_set_and_clear() {
        let store = MemoryTokenStore::new();
        assert_eq!(store.token(), None);

        store.set_token("abc").unwrap();
        assert_eq!(store.token().as_deref(), Some("abc"));

        store.clear_token().unwrap();
        assert_eq!(store.token(), None);
    }

    #[test]
    fn test_file_store_missing_file_has_no_token() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("storage.json"));
        assert_eq!(store.token(), None);
    }

    #[test]
    fn test_file_store_persists_and_keeps_other_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        std::fs::write(&path, r#"{"theme": "dark"}"#).unwrap();

        let store = FileTokenStore::new(&path);
        store.set_token("secret").unwrap();

        let reopened = FileTokenStore::new(&path);
        assert_eq!(reopened.token().as_deref(), Some("secret"));

        let raw: Map<String, Value> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw.get("theme").and_then(Value::as_str), Some("dark"));

        reopened.clear_token().unwrap();
        assert_eq!(store.token(), None);
    }

    #[test]
    fn test_file_store_corrupt_file_reads_as_no_token() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        std::fs::write(&path, "not json").unwrap();

        let store = FileTokenStore::new(&path);
        assert_eq!(store.token(), None);
        assert!(matches!(store.set_token("x"), Err(StorageError::Corrupt(_))));
    }
}
