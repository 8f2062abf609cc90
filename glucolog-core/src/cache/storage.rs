//! On-disk cache generations.
//!
//! ```text
//! <CACHE_DIR>/
//!   glucose-logger-v1.2/
//!     <base64url(sha256(url))>.json
//!   glucose-logger-v1.1/
//!     ...
//! ```
//!
//! Each entry is written to a unique temp file and renamed into place, so
//! concurrent writers for the same key never interleave and the last rename
//! wins.

use std::io;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use uuid::Uuid;

use super::error::CacheError;
use super::fetcher::FetchResponse;

#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    url: String,
    response: FetchResponse,
}

/// The set of named cache generations under one root directory.
#[derive(Debug, Clone)]
pub struct CacheStorage {
    root: PathBuf,
}

impl CacheStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Names of every existing generation, sorted.
    pub async fn keys(&self) -> Result<Vec<String>, CacheError> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CacheError::Io(self.root.clone(), e)),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CacheError::Io(self.root.clone(), e))?
        {
            let is_dir = entry
                .file_type()
                .await
                .map_err(|e| CacheError::Io(entry.path(), e))?
                .is_dir();
            if let (true, Some(name)) = (is_dir, entry.file_name().to_str()) {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    pub async fn has(&self, name: &str) -> bool {
        validate_name(name).is_ok() && fs::metadata(self.root.join(name)).await.is_ok()
    }

    /// Opens the generation `name`, creating it if needed.
    pub async fn open(&self, name: &str) -> Result<Cache, CacheError> {
        validate_name(name)?;
        let dir = self.root.join(name);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| CacheError::Io(dir.clone(), e))?;

        Ok(Cache {
            name: name.to_string(),
            dir,
        })
    }

    /// Deletes the generation `name`. Returns false if it did not exist.
    pub async fn delete(&self, name: &str) -> Result<bool, CacheError> {
        validate_name(name)?;
        let dir = self.root.join(name);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CacheError::Io(dir, e)),
        }
    }
}

/// One cache generation: request URL -> stored response.
#[derive(Debug, Clone)]
pub struct Cache {
    name: String,
    dir: PathBuf,
}

impl Cache {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stored response for `url`. Unreadable entries count as misses.
    pub async fn get(&self, url: &str) -> Result<Option<FetchResponse>, CacheError> {
        let path = self.entry_path(url);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::Io(path, e)),
        };

        match serde_json::from_slice::<StoredEntry>(&bytes) {
            Ok(entry) if entry.url == url => Ok(Some(entry.response)),
            Ok(_) => Ok(None),
            Err(e) => {
                tracing::warn!("Ignoring corrupt cache entry {}: {}", path.display(), e);
                Ok(None)
            }
        }
    }

    pub async fn put(&self, url: &str, response: &FetchResponse) -> Result<(), CacheError> {
        let entry = StoredEntry {
            url: url.to_string(),
            response: response.clone(),
        };
        let bytes = serde_json::to_vec(&entry)?;

        let path = self.entry_path(url);
        let temp_path = self.dir.join(format!("{}.tmp", Uuid::new_v4()));

        fs::write(&temp_path, bytes)
            .await
            .map_err(|e| CacheError::Io(temp_path.clone(), e))?;
        if let Err(e) = fs::rename(&temp_path, &path).await {
            if let Err(cleanup) = fs::remove_file(&temp_path).await {
                tracing::warn!("Failed to remove {}: {}", temp_path.display(), cleanup);
            }
            return Err(CacheError::Io(path, e));
        }

        Ok(())
    }

    /// URLs of every stored entry, sorted.
    pub async fn urls(&self) -> Result<Vec<String>, CacheError> {
        let mut entries = fs::read_dir(&self.dir)
            .await
            .map_err(|e| CacheError::Io(self.dir.clone(), e))?;

        let mut urls = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CacheError::Io(self.dir.clone(), e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Ok(bytes) = fs::read(&path).await else {
                continue;
            };
            if let Ok(stored) = serde_json::from_slice::<StoredEntry>(&bytes) {
                urls.push(stored.url);
            }
        }
        urls.sort();
        Ok(urls)
    }

    fn entry_path(&self, url: &str) -> PathBuf {
        let digest = Sha256::digest(url.as_bytes());
        self.dir
            .join(format!("{}.json", URL_SAFE_NO_PAD.encode(digest)))
    }
}

/// Rejects generation names that would escape the cache root.
fn validate_name(name: &str) -> Result<(), CacheError> {
    if name.is_empty()
        || name.contains('/')
        || name.contains('\\')
        || name.contains("..")
        || name.starts_with('.')
    {
        return Err(CacheError::InvalidName(name.to_string()));
    }
    Ok(())
}
