use clap::{Args, Subcommand};
use glucolog_core::cache::{
    CacheStorage, CacheWorker, FetchRequest, HttpFetcher, Registration, UpdateReport,
};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::Config;
use crate::proxy;

#[derive(Args)]
pub struct CacheCommand {
    #[command(subcommand)]
    pub command: CacheSubcommand,
}

#[derive(Subcommand)]
pub enum CacheSubcommand {
    /// Install the configured asset version and drop stale caches
    Update,

    /// Show cache generations and their entries
    Status,

    /// Fetch a URL through the offline cache
    Fetch {
        /// Absolute URL or path relative to the origin
        url: String,
    },

    /// Serve the application through a local caching proxy
    Serve {
        /// Port to listen on (overrides config)
        #[arg(long, short)]
        port: Option<u16>,
    },
}

impl CacheCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(async {
            match &self.command {
                CacheSubcommand::Update => update(config).await,
                CacheSubcommand::Status => status(config).await,
                CacheSubcommand::Fetch { url } => fetch(config, url).await,
                CacheSubcommand::Serve { port } => {
                    serve(config, port.unwrap_or(config.cache.port)).await
                }
            }
        })
    }
}

fn build_worker(config: &Config) -> Result<CacheWorker<HttpFetcher>, Box<dyn std::error::Error>> {
    let origin = config.cache.origin_url()?;
    let manifest = config.cache.manifest().resolve(&origin)?;
    let fetcher =
        HttpFetcher::new(origin).with_no_cors_origins(config.cache.opaque_origins.clone());

    Ok(CacheWorker::new(
        manifest,
        CacheStorage::new(config.cache.dir.value.clone()),
        fetcher,
    )
    .with_excluded_schemes(config.cache.excluded_schemes.clone()))
}

async fn update(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let mut registration = Registration::new();
    let report = registration.update(build_worker(config)?).await?;
    print_update_report(&report);
    Ok(())
}

async fn status(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let storage = CacheStorage::new(config.cache.dir.value.clone());
    let names = storage.keys().await?;

    println!("Cache directory: {}", storage.root().display());
    if names.is_empty() {
        println!("No caches installed.");
        return Ok(());
    }

    for name in names {
        let cache = storage.open(&name).await?;
        let urls = cache.urls().await?;
        let marker = if name == config.cache.version {
            " (current)"
        } else {
            " (stale)"
        };
        println!("{}{}: {} entr(ies)", name, marker, urls.len());
        for url in urls {
            println!("  {}", url);
        }
    }
    Ok(())
}

async fn fetch(config: &Config, url: &str) -> Result<(), Box<dyn std::error::Error>> {
    let worker = build_worker(config)?;
    if !worker.storage().has(worker.version()).await {
        return Err(format!(
            "Cache {} is not installed. Run 'glucolog cache update' first.",
            worker.version()
        )
        .into());
    }
    worker.activate().await?;

    let url = config.cache.origin_url()?.join(url)?;
    let outcome = worker.handle_fetch(&FetchRequest::get(url.as_str())).await?;

    println!("URL: {}", url);
    println!("Source: {}", outcome.source);
    println!("Status: {}", outcome.response.status);
    println!("Type: {:?}", outcome.response.kind);
    println!("Bytes: {}", outcome.response.body.len());
    if outcome.stored {
        println!("Stored in {}", worker.version());
    }
    Ok(())
}

async fn serve(config: &Config, port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let origin = config.cache.origin_url()?;
    let mut registration = Registration::new();
    let report = registration.update(build_worker(config)?).await?;
    print_update_report(&report);

    let worker = registration
        .active()
        .ok_or("No active cache worker after update")?;
    let app = proxy::router(Arc::clone(&worker), origin.clone());

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    tracing::info!("Serving {} through {} on http://{}", origin, worker.version(), addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn print_update_report(report: &UpdateReport) {
    println!("Installed {}", report.version);
    println!("  cached: {}", report.install.cached.len());
    println!("  opaque: {}", report.install.opaque.len());
    if !report.install.skipped.is_empty() {
        println!("  skipped: {}", report.install.skipped.len());
        for skipped in &report.install.skipped {
            println!("    {} ({})", skipped.url, skipped.reason);
        }
    }
    for name in &report.activate.deleted {
        println!("Deleted old cache: {}", name);
    }
}
