use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// A request that could not produce a response.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Invalid URL '{0}'")]
    InvalidUrl(String),

    #[error("Invalid HTTP method '{0}'")]
    InvalidMethod(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Errors from the versioned cache storage.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Invalid cache name: {0}")]
    InvalidName(String),

    #[error("Invalid manifest entry '{0}': {1}")]
    InvalidManifestEntry(String, String),

    #[error("I/O error for {}: {}", .0.display(), .1)]
    Io(PathBuf, #[source] io::Error),

    #[error("Failed to serialize cache entry: {0}")]
    Serialize(#[from] serde_json::Error),
}
