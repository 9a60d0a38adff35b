//! # File Storage
//!
//! Where uploaded images and history snapshots live.
//!
//! ## Keys
//! ```text
//! save("products/", "Mouse.PNG", bytes)  →  "products/6f1c...e2.png"
//!        │                                        │
//!        │ logical prefix                         │ stable reference stored
//!        │ (products/ categories/ company/        │ in the database; read()
//!        │  history/)                             │ and url() accept it
//! ```
//! Callers never assume a filesystem layout beyond the prefix. Stored
//! names are random, so two uploads called `logo.png` never collide.

use async_trait::async_trait;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Logical prefixes used by the back-office.
pub mod prefix {
    pub const PRODUCTS: &str = "products/";
    pub const CATEGORIES: &str = "categories/";
    pub const COMPANY: &str = "company/";
    pub const HISTORY: &str = "history/";
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid file key: {0}")]
    InvalidKey(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Media storage port.
#[async_trait]
pub trait FileStorage: Send + Sync + std::fmt::Debug {
    /// Stores `bytes` under `prefix` and returns the new key. The
    /// extension of `file_name` is kept, lower-cased.
    async fn save(&self, prefix: &str, file_name: &str, bytes: &[u8]) -> StorageResult<String>;

    async fn read(&self, key: &str) -> StorageResult<Vec<u8>>;

    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Public URL of a key, as embedded in history details.
    fn url(&self, key: &str) -> String;
}

/// Builds a fresh key: `prefix` + random name + original extension.
fn new_key(prefix: &str, file_name: &str) -> String {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| "bin".to_string());

    let prefix = if prefix.is_empty() || prefix.ends_with('/') {
        prefix.to_string()
    } else {
        format!("{prefix}/")
    };

    format!("{}{}.{}", prefix, Uuid::new_v4().simple(), ext)
}

/// Rejects keys that could escape the media root.
fn check_key(key: &str) -> StorageResult<()> {
    let path = Path::new(key);
    let escapes = key.is_empty()
        || path
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));

    if escapes {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

fn join_url(base_url: &str, key: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), key)
}

// =============================================================================
// Local Filesystem
// =============================================================================

/// Files under a media root directory.
#[derive(Debug, Clone)]
pub struct LocalFileStorage {
    root: PathBuf,
    base_url: String,
}

impl LocalFileStorage {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        LocalFileStorage {
            root: root.into(),
            base_url: base_url.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, key: &str) -> StorageResult<PathBuf> {
        check_key(key)?;
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn save(&self, prefix: &str, file_name: &str, bytes: &[u8]) -> StorageResult<String> {
        let key = new_key(prefix, file_name);
        let path = self.path_of(&key)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;

        debug!(key = %key, len = bytes.len(), "Stored file");
        Ok(key)
    }

    async fn read(&self, key: &str) -> StorageResult<Vec<u8>> {
        let path = self.path_of(key)?;
        tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => StorageError::NotFound(key.to_string()),
            _ => StorageError::Io(e),
        })
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.path_of(key)?;
        tokio::fs::remove_file(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => StorageError::NotFound(key.to_string()),
            _ => StorageError::Io(e),
        })
    }

    fn url(&self, key: &str) -> String {
        join_url(&self.base_url, key)
    }
}

// =============================================================================
// In Memory
// =============================================================================

/// Files kept in a map; for tests and throwaway setups.
#[derive(Debug, Default)]
pub struct MemoryFileStorage {
    files: RwLock<HashMap<String, Vec<u8>>>,
    base_url: String,
}

impl MemoryFileStorage {
    pub fn new(base_url: impl Into<String>) -> Self {
        MemoryFileStorage {
            files: RwLock::new(HashMap::new()),
            base_url: base_url.into(),
        }
    }

    /// Number of stored files.
    pub async fn len(&self) -> usize {
        self.files.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.files.read().await.is_empty()
    }

    /// Stored keys under `prefix`, sorted.
    pub async fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .files
            .read()
            .await
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl FileStorage for MemoryFileStorage {
    async fn save(&self, prefix: &str, file_name: &str, bytes: &[u8]) -> StorageResult<String> {
        let key = new_key(prefix, file_name);
        check_key(&key)?;
        self.files.write().await.insert(key.clone(), bytes.to_vec());
        Ok(key)
    }

    async fn read(&self, key: &str) -> StorageResult<Vec<u8>> {
        self.files
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.files
            .write()
            .await
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    fn url(&self, key: &str) -> String {
        join_url(&self.base_url, key)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
