//! LinkVault Daemon - Background sync and offline proxy
//!
//! This binary runs next to the LinkVault web application and handles:
//! - Deferred delivery of metadata requests (retry queue + sync scheduler)
//! - Offline caching of the application shell and static assets
//! - A local HTTP proxy routing requests between caches and the origin
//! - Graceful shutdown on SIGTERM/SIGINT
//!
//! # Architecture
//!
//! Every component is constructed once here and shared through `Arc`s. The
//! scheduler, cache maintenance and proxy connections run on one
//! `TaskTracker`; a `CancellationToken` triggered by SIGTERM or SIGINT stops
//! them, and the daemon waits for the tracker before closing the database.

mod server;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use linkvault_cache::{DatabasePool, SqliteCacheStorage, SqliteDataSink, SqliteRequestQueue};
use linkvault_core::config::Config;
use linkvault_offline::{BuildManifest, CacheTierManager, NetworkRouter};
use linkvault_sync::backoff::BackoffPolicy;
use linkvault_sync::client::HttpFetcher;
use linkvault_sync::engine::SyncEngine;
use linkvault_sync::scheduler::SyncScheduler;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::server::ProxyServer;

#[derive(Debug, Parser)]
#[command(name = "linkvaultd", version, about = "LinkVault background sync daemon")]
struct Args {
    /// Path to the configuration file (defaults to the user config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

// ============================================================================
// DaemonService
// ============================================================================

/// Wired components of a running daemon
struct DaemonService {
    config: Config,
    db_pool: DatabasePool,
    tiers: Arc<CacheTierManager>,
    router: Arc<NetworkRouter>,
    scheduler: SyncScheduler,
    tracker: TaskTracker,
    shutdown: CancellationToken,
}

impl DaemonService {
    /// Opens the database and builds every component from `config`
    async fn new(config: Config, shutdown: CancellationToken) -> Result<Self> {
        let db_path = &config.database.path;
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let db_pool = DatabasePool::new(db_path)
            .await
            .context("Failed to open database")?;
        info!(path = %db_path.display(), "Database opened");

        let queue = Arc::new(
            SqliteRequestQueue::new(db_pool.pool().clone()).with_retention(config.sync.retention()),
        );
        let sink = Arc::new(SqliteDataSink::new(db_pool.pool().clone()));
        let storage = Arc::new(SqliteCacheStorage::new(db_pool.pool().clone()));
        let fetcher = Arc::new(
            HttpFetcher::new(&config.origin.base_url, config.sync.request_timeout())
                .context("Failed to create origin client")?,
        );

        let engine = Arc::new(
            SyncEngine::new(queue, fetcher.clone(), sink)
                .with_backoff(BackoffPolicy::from_config(&config.sync))
                .with_request_timeout(config.sync.request_timeout())
                .with_max_consecutive_failures(config.sync.max_consecutive_failures)
                .with_metadata_path(config.sync.metadata_path.clone())
                .with_shutdown(shutdown.clone()),
        );

        let manifest = match BuildManifest::load(&config.cache.manifest) {
            Ok(manifest) => manifest,
            Err(e) => {
                warn!(error = %e, "No usable build manifest, precaching disabled");
                BuildManifest::new(None, Vec::new())
            }
        };

        let tracker = TaskTracker::new();
        let tiers = Arc::new(
            CacheTierManager::new(storage, fetcher.clone(), manifest)
                .with_config(&config.cache)
                .with_tracker(tracker.clone()),
        );

        let (scheduler, trigger) =
            SyncScheduler::new(Arc::clone(&engine), config.sync.poll_interval(), shutdown.clone());

        let router = Arc::new(
            NetworkRouter::new(Arc::clone(&tiers), engine, fetcher)
                .with_config(&config.cache)
                .with_trigger(trigger),
        );

        Ok(Self {
            config,
            db_pool,
            tiers,
            router,
            scheduler,
            tracker,
            shutdown,
        })
    }

    /// Installs and activates the caches, then serves until shutdown
    async fn run(self) -> Result<()> {
        match self.tiers.install().await {
            Ok(()) => {
                if let Err(e) = self.tiers.activate().await {
                    warn!(error = %e, "Cache activation failed");
                }
            }
            Err(e) => warn!(error = %e, "Cache install failed, serving without precache"),
        }

        self.tracker.spawn(self.scheduler.run());

        let server = ProxyServer::bind(self.router, &self.config.server.listen).await?;
        let result = server.run(self.shutdown.clone(), self.tracker.clone()).await;

        // The proxy only returns early on error; stop the rest as well.
        self.shutdown.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        self.db_pool.close().await;

        result
    }
}

// ============================================================================
// Graceful shutdown signal handler
// ============================================================================

/// Waits for SIGTERM or SIGINT and triggers the cancellation token
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}

// ============================================================================
// Main entry point
// ============================================================================

fn load_config(args: &Args) -> Result<Config> {
    let config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load_or_default(&Config::default_path()),
    };

    let errors = config.validate();
    if !errors.is_empty() {
        let details: Vec<String> = errors.iter().map(ToString::to_string).collect();
        anyhow::bail!("Invalid configuration: {}", details.join("; "));
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .init();

    info!(
        origin = %config.origin.base_url,
        listen = %config.server.listen,
        "LinkVault daemon starting (linkvaultd)"
    );

    let shutdown_token = CancellationToken::new();

    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    let service = DaemonService::new(config, shutdown_token).await?;
    let result = service.run().await;

    match &result {
        Ok(()) => info!("LinkVault daemon shut down gracefully"),
        Err(e) => error!(error = %e, "LinkVault daemon exiting with error"),
    }

    result
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::time::Duration;

    use linkvault_core::config::ConfigBuilder;

    use super::*;

    #[test]
    fn test_args_config_flag() {
        let args = Args::parse_from(["linkvaultd", "--config", "/tmp/linkvault.yaml"]);
        assert_eq!(args.config, Some(PathBuf::from("/tmp/linkvault.yaml")));

        let args = Args::parse_from(["linkvaultd"]);
        assert!(args.config.is_none());
    }

    #[test]
    fn test_load_config_rejects_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "sync:\n  poll_interval: 0").unwrap();

        let args = Args {
            config: Some(file.path().to_path_buf()),
        };
        let err = load_config(&args).unwrap_err();
        assert!(err.to_string().contains("sync.poll_interval"));
    }

    #[tokio::test]
    async fn test_service_runs_without_manifest_and_stops_on_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigBuilder::new()
            .database_path(dir.path().join("data").join("linkvault.db"))
            .cache_manifest(dir.path().join("missing-manifest.json"))
            .cache_essential_routes(Vec::new())
            .origin_base_url("http://127.0.0.1:9")
            .server_listen("127.0.0.1:0")
            .build();

        let shutdown = CancellationToken::new();
        let service = DaemonService::new(config, shutdown.clone()).await.unwrap();
        let handle = tokio::spawn(service.run());

        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown.cancel();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("daemon did not stop")
            .unwrap()
            .unwrap();
        assert!(dir.path().join("data").join("linkvault.db").exists());
    }
}
