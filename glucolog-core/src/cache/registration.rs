use std::sync::Arc;

use super::error::CacheError;
use super::fetcher::Fetcher;
use super::worker::{ActivateReport, CacheWorker, InstallReport, WorkerState};

/// Result of replacing the active worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateReport {
    pub version: String,
    pub install: InstallReport,
    pub activate: ActivateReport,
    /// Version tag of the worker that was superseded, if any.
    pub replaced: Option<String>,
}

/// Tracks the worker currently in control.
///
/// A new worker never waits for clients of the old one to go away: once it
/// has installed it activates immediately and the old worker turns
/// redundant.
pub struct Registration<F> {
    active: Option<Arc<CacheWorker<F>>>,
}

impl<F: Fetcher> Registration<F> {
    pub fn new() -> Self {
        Self { active: None }
    }

    pub fn active(&self) -> Option<Arc<CacheWorker<F>>> {
        self.active.clone()
    }

    /// Installs and activates `worker`, superseding the active one.
    ///
    /// If install fails the previous worker stays in control.
    pub async fn update(&mut self, worker: CacheWorker<F>) -> Result<UpdateReport, CacheError> {
        let install = worker.install().await?;

        if self.active.is_some() {
            tracing::info!("Skipping wait; {} takes over immediately", worker.version());
        }
        let activate = worker.activate().await?;

        let version = worker.version().to_string();
        let replaced = self.active.replace(Arc::new(worker)).map(|previous| {
            previous.set_state(WorkerState::Redundant);
            previous.version().to_string()
        });

        Ok(UpdateReport {
            version,
            install,
            activate,
            replaced,
        })
    }
}

impl<F: Fetcher> Default for Registration<F> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::fetcher::{FetchRequest, FetchResponse, MemoryFetcher, ResponseKind};
    use crate::cache::manifest::CacheManifest;
    use crate::cache::storage::CacheStorage;
    use crate::cache::worker::FetchSource;
    use tempfile::TempDir;

    const INDEX: &str = "http://app.test/index.html";

    fn worker(version: &str, body: &str, temp: &TempDir) -> CacheWorker<MemoryFetcher> {
        let fetcher = MemoryFetcher::new();
        fetcher.respond(INDEX, FetchResponse::new(200, ResponseKind::Basic, body));
        CacheWorker::new(
            CacheManifest::new(version, vec![INDEX.to_string()]),
            CacheStorage::new(temp.path()),
            fetcher,
        )
    }

    #[tokio::test]
    async fn test_first_update_activates() {
        let temp = TempDir::new().unwrap();
        let mut registration = Registration::new();

        let report = registration.update(worker("v1", "one", &temp)).await.unwrap();

        assert_eq!(report.version, "v1");
        assert!(report.replaced.is_none());
        assert!(registration.active().unwrap().is_controlling());
    }

    #[tokio::test]
    async fn test_new_version_supersedes_old() {
        let temp = TempDir::new().unwrap();
        let mut registration = Registration::new();
        registration.update(worker("v1", "one", &temp)).await.unwrap();
        let old = registration.active().unwrap();

        let report = registration.update(worker("v2", "two", &temp)).await.unwrap();

        assert_eq!(report.replaced.as_deref(), Some("v1"));
        assert_eq!(report.activate.deleted, vec!["v1"]);
        assert_eq!(old.state(), WorkerState::Redundant);

        let active = registration.active().unwrap();
        let outcome = active.handle_fetch(&FetchRequest::get(INDEX)).await.unwrap();
        assert_eq!(outcome.source, FetchSource::Cache);
        assert_eq!(outcome.response.body, b"two");

        // The retired worker no longer intercepts.
        let stale = old.handle_fetch(&FetchRequest::get(INDEX)).await.unwrap();
        assert_eq!(stale.source, FetchSource::Bypass);
    }
}
