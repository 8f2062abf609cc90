//! Offline asset cache.
//!
//! A versioned cache of the application's assets, pre-fetched on install,
//! pruned of stale generations on activation, and consulted cache-first for
//! every intercepted request. Bump the manifest version on every asset
//! change; there is no content-hash invalidation.

mod error;
mod fetcher;
mod manifest;
mod registration;
mod storage;
mod worker;

pub use error::{CacheError, FetchError};
pub use fetcher::{
    CacheMode, FetchRequest, FetchResponse, Fetcher, HttpFetcher, MemoryFetcher, ResponseKind,
};
pub use manifest::{
    CacheManifest, DEFAULT_ASSETS, DEFAULT_CACHE_VERSION, DEFAULT_EXCLUDED_SCHEMES,
    DEFAULT_OPAQUE_ORIGINS,
};
pub use registration::{Registration, UpdateReport};
pub use storage::{Cache, CacheStorage};
pub use worker::{
    ActivateReport, CacheWorker, FetchOutcome, FetchSource, InstallReport, SkippedAsset,
    WorkerState,
};
