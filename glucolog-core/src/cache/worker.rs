//! The offline cache worker.
//!
//! Lifecycle: `Parsed -> Installing -> Installed -> Activating -> Activated`.
//! A worker replaced by a newer version becomes `Redundant`.
//!
//! - Install pre-fetches the manifest into the worker's cache generation.
//!   Individual failures are logged and skipped.
//! - Activate deletes every other generation and takes control of clients.
//! - While activated, GET requests are answered cache-first; misses go to
//!   the network and usable responses are stored on the way back.

use std::fmt;
use std::sync::{PoisonError, RwLock};

use futures::future::join_all;

use super::error::{CacheError, FetchError};
use super::fetcher::{FetchRequest, FetchResponse, Fetcher, ResponseKind};
use super::manifest::{CacheManifest, DEFAULT_EXCLUDED_SCHEMES};
use super::storage::{Cache, CacheStorage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Parsed,
    Installing,
    /// Installed and waiting to activate.
    Installed,
    Activating,
    Activated,
    Redundant,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerState::Parsed => write!(f, "parsed"),
            WorkerState::Installing => write!(f, "installing"),
            WorkerState::Installed => write!(f, "installed"),
            WorkerState::Activating => write!(f, "activating"),
            WorkerState::Activated => write!(f, "activated"),
            WorkerState::Redundant => write!(f, "redundant"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedAsset {
    pub url: String,
    pub reason: String,
}

/// What an install pass managed to cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub cached: Vec<String>,
    /// Opaque responses, stored without knowing whether they succeeded.
    pub opaque: Vec<String>,
    pub skipped: Vec<SkippedAsset>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivateReport {
    /// Stale generations removed.
    pub deleted: Vec<String>,
}

/// Where an intercepted response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchSource {
    Cache,
    Network,
    /// Not intercepted: excluded scheme, non-GET, or worker not in control.
    Bypass,
}

impl fmt::Display for FetchSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchSource::Cache => write!(f, "hit"),
            FetchSource::Network => write!(f, "miss"),
            FetchSource::Bypass => write!(f, "bypass"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    pub response: FetchResponse,
    pub source: FetchSource,
    /// Whether a copy of a network response was written to the cache.
    pub stored: bool,
}

enum Precached {
    Cached,
    Opaque,
    Skipped(String),
}

pub struct CacheWorker<F> {
    manifest: CacheManifest,
    storage: CacheStorage,
    fetcher: F,
    excluded_schemes: Vec<String>,
    state: RwLock<WorkerState>,
}

impl<F: Fetcher> CacheWorker<F> {
    pub fn new(manifest: CacheManifest, storage: CacheStorage, fetcher: F) -> Self {
        Self {
            manifest,
            storage,
            fetcher,
            excluded_schemes: DEFAULT_EXCLUDED_SCHEMES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            state: RwLock::new(WorkerState::Parsed),
        }
    }

    pub fn with_excluded_schemes(mut self, schemes: Vec<String>) -> Self {
        self.excluded_schemes = schemes;
        self
    }

    /// Version tag, which is also the name of this worker's cache.
    pub fn version(&self) -> &str {
        &self.manifest.version
    }

    pub fn manifest(&self) -> &CacheManifest {
        &self.manifest
    }

    pub fn storage(&self) -> &CacheStorage {
        &self.storage
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn state(&self) -> WorkerState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_state(&self, state: WorkerState) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Whether the worker controls clients and intercepts their requests.
    pub fn is_controlling(&self) -> bool {
        self.state() == WorkerState::Activated
    }

    /// Pre-fetches every manifest URL into this version's cache.
    ///
    /// All fetches run concurrently and each one is allowed to fail; the
    /// install completes once every attempt has resolved.
    pub async fn install(&self) -> Result<InstallReport, CacheError> {
        self.set_state(WorkerState::Installing);

        let cache = match self.storage.open(self.version()).await {
            Ok(cache) => cache,
            Err(e) => {
                tracing::error!("Failed to open cache {}: {}", self.version(), e);
                self.set_state(WorkerState::Redundant);
                return Err(e);
            }
        };
        tracing::info!(
            "Opened cache {} and caching {} file(s)",
            self.version(),
            self.manifest.urls.len()
        );

        let cache = &cache;
        let attempts = self
            .manifest
            .urls
            .iter()
            .map(|url| async move { (url, self.precache(cache, url).await) });

        let mut report = InstallReport::default();
        for (url, outcome) in join_all(attempts).await {
            match outcome {
                Precached::Cached => report.cached.push(url.clone()),
                Precached::Opaque => report.opaque.push(url.clone()),
                Precached::Skipped(reason) => report.skipped.push(SkippedAsset {
                    url: url.clone(),
                    reason,
                }),
            }
        }

        self.set_state(WorkerState::Installed);
        tracing::info!(
            "Installed {}: {} cached, {} opaque, {} skipped",
            self.version(),
            report.cached.len(),
            report.opaque.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    async fn precache(&self, cache: &Cache, url: &str) -> Precached {
        let response = match self.fetcher.fetch(&FetchRequest::reload(url)).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Error fetching and caching {}: {}", url, e);
                return Precached::Skipped(e.to_string());
            }
        };

        let outcome = if response.is_ok() {
            Precached::Cached
        } else if response.is_opaque() {
            Precached::Opaque
        } else {
            tracing::warn!("Failed to fetch {} for caching: {}", url, response.status);
            return Precached::Skipped(format!("HTTP status {}", response.status));
        };

        match cache.put(url, &response).await {
            Ok(()) => outcome,
            Err(e) => {
                tracing::warn!("Failed to store {}: {}", url, e);
                Precached::Skipped(e.to_string())
            }
        }
    }

    /// Deletes every cache generation except this version's, then takes
    /// control of clients.
    ///
    /// If pruning fails the worker returns to the state it was in before.
    pub async fn activate(&self) -> Result<ActivateReport, CacheError> {
        let previous = self.state();
        self.set_state(WorkerState::Activating);

        match self.prune_stale().await {
            Ok(report) => {
                self.set_state(WorkerState::Activated);
                tracing::info!("Activated {}; controlling clients", self.version());
                Ok(report)
            }
            Err(e) => {
                tracing::error!("Failed to activate {}: {}", self.version(), e);
                self.set_state(previous);
                Err(e)
            }
        }
    }

    async fn prune_stale(&self) -> Result<ActivateReport, CacheError> {
        let mut report = ActivateReport::default();
        for name in self.storage.keys().await? {
            if name == self.version() {
                continue;
            }
            tracing::info!("Deleting old cache: {}", name);
            if self.storage.delete(&name).await? {
                report.deleted.push(name);
            }
        }
        Ok(report)
    }

    /// Whether `request` goes through the cache at all.
    pub fn intercepts(&self, request: &FetchRequest) -> bool {
        let excluded = request
            .scheme()
            .is_some_and(|scheme| self.excluded_schemes.iter().any(|s| s == scheme));
        self.is_controlling() && request.is_get() && !excluded
    }

    /// Answers `request` cache-first.
    ///
    /// A network failure on a miss is returned to the caller; there is no
    /// fallback response.
    pub async fn handle_fetch(&self, request: &FetchRequest) -> Result<FetchOutcome, FetchError> {
        if !self.intercepts(request) {
            let response = self.fetcher.fetch(request).await?;
            return Ok(FetchOutcome {
                response,
                source: FetchSource::Bypass,
                stored: false,
            });
        }

        let cache = match self.storage.open(self.version()).await {
            Ok(cache) => Some(cache),
            Err(e) => {
                tracing::warn!("Cache {} unavailable: {}", self.version(), e);
                None
            }
        };

        if let Some(cache) = &cache {
            match cache.get(&request.url).await {
                Ok(Some(response)) => {
                    tracing::debug!("Cache hit: {}", request.url);
                    return Ok(FetchOutcome {
                        response,
                        source: FetchSource::Cache,
                        stored: false,
                    });
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("Cache lookup failed for {}: {}", request.url, e),
            }
        }

        tracing::debug!("Cache miss: {}", request.url);
        let response = match self.fetcher.fetch(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Fetch failed for {}: {}", request.url, e);
                return Err(e);
            }
        };

        let mut stored = false;
        if is_cacheable(&response) {
            if let Some(cache) = &cache {
                match cache.put(&request.url, &response).await {
                    Ok(()) => stored = true,
                    Err(e) => tracing::warn!("Failed to cache {}: {}", request.url, e),
                }
            }
        }

        Ok(FetchOutcome {
            response,
            source: FetchSource::Network,
            stored,
        })
    }
}

/// A 200 with a readable status, or an opaque response taken on trust.
fn is_cacheable(response: &FetchResponse) -> bool {
    match response.kind {
        ResponseKind::Basic | ResponseKind::Cors => response.status == 200,
        ResponseKind::Opaque => true,
    }
}
