//! Port Oracle Feed - Entry Point
//!
//! Runs the oracle feed service and its admin server until SIGINT.
//!
//! Wiring sequence:
//! 1. Load config.toml (or `PORT_EXCHANGE_CONFIG`) + validate
//! 2. Init tracing (JSON structured logging)
//! 3. Load the feeder identity from `FEEDER_ADDRESS`
//! 4. Create the oracle store, restoring the last snapshot if any
//! 5. Create the performance source (simulated or HTTP)
//! 6. Create the local oracle writer and Prometheus metrics
//! 7. Start the feed scheduler (first cycle immediately)
//! 8. Spawn the admin server on `api.bind_address`
//! 9. Wait for SIGINT → stop scheduler → stop admin server → exit

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::{broadcast, RwLock};
use tracing::{error, info, warn};

use port_exchange::adapters::api::{self, AdminState};
use port_exchange::adapters::metrics::FeedMetrics;
use port_exchange::adapters::persistence::SnapshotStore;
use port_exchange::adapters::sources::{HttpPerformanceSource, HttpSourceConfig, SimulatedSource};
use port_exchange::adapters::store::{FeederIdentity, LocalOracleWriter};
use port_exchange::config::{self, AppConfig, SourceKind};
use port_exchange::ports::performance_source::PerformanceSource;
use port_exchange::usecases::feed_service::{FeedScheduler, OracleFeedService};
use port_exchange::usecases::oracle_store::OracleStore;

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load configuration ───────────────────────────────
    let config_path = config::loader::config_path();
    let config = config::loader::load_config(&config_path)
        .context("Failed to load configuration")?;

    // ── 2. Initialize structured JSON logging ───────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    tracing_subscriber::EnvFilter::new(&config.service.log_level)
                }),
        )
        .json()
        .init();

    info!(
        name = %config.service.name,
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path,
        ports = config.feed.ports.len(),
        interval_secs = config.feed.interval_seconds,
        "Starting port oracle feed"
    );

    // ── 3. Feeder identity (process-scoped, never rotated) ──
    let owner = config.owner_address()?;
    let identity = Arc::new(
        FeederIdentity::from_env(owner).context("Failed to load feeder identity")?,
    );
    let owner = owner.unwrap_or_else(|| identity.address());
    if identity.address() != owner {
        warn!(
            feeder = %identity.address(),
            %owner,
            "Feeder identity is not the oracle owner; every write will be rejected"
        );
    }

    // ── 4. Oracle store + snapshot restore ──────────────────
    let store = Arc::new(RwLock::new(OracleStore::new(owner)));
    let snapshots = match &config.oracle.data_dir {
        Some(dir) => {
            let snapshots = Arc::new(SnapshotStore::new(dir).await?);
            if let Some(snapshot) = snapshots.load().await? {
                store.write().await.restore(snapshot)?;
            }
            Some(snapshots)
        }
        None => None,
    };

    // ── 5. Performance source ───────────────────────────────
    let source = build_source(&config)?;

    // ── 6. Writer + metrics ─────────────────────────────────
    let mut writer = LocalOracleWriter::new(Arc::clone(&store), Arc::clone(&identity));
    if let Some(snapshots) = snapshots {
        writer = writer.with_snapshots(snapshots);
    }
    let metrics = if config.api.metrics_enabled {
        Some(Arc::new(FeedMetrics::new().context("Failed to register metrics")?))
    } else {
        None
    };

    let mut service = OracleFeedService::new(
        source,
        Arc::new(writer),
        config.port_codes()?,
        config.feed.trigger_policy,
    );
    if let Some(metrics) = &metrics {
        service = service.with_observer(Arc::clone(metrics) as _);
    }
    let service = Arc::new(service);

    // ── 7. Feed scheduler ───────────────────────────────────
    let mut scheduler = FeedScheduler::new(
        Arc::clone(&service),
        Duration::from_secs(config.feed.interval_seconds),
    );
    scheduler.start();

    // ── 8. Admin server ─────────────────────────────────────
    let (shutdown_tx, _shutdown_rx) = broadcast::channel::<()>(1);
    let admin_state = AdminState {
        service: Arc::clone(&service),
        store: Arc::clone(&store),
        metrics,
    };
    let admin_shutdown = shutdown_tx.subscribe();
    let bind_address = config.api.bind_address.clone();
    let admin_handle = tokio::spawn(async move {
        if let Err(e) = api::serve(admin_state, bind_address, admin_shutdown).await {
            error!(error = %e, "Admin server failed");
        }
    });

    info!("All tasks spawned - feed is running");

    // ── 9. Wait for SIGINT ──────────────────────────────────
    signal::ctrl_c()
        .await
        .context("Failed to listen for SIGINT")?;
    info!("SIGINT received, initiating graceful shutdown");

    // Current port submission finishes; remaining ports are skipped.
    scheduler.stop().await;

    let _ = shutdown_tx.send(());
    let _ = tokio::time::timeout(Duration::from_secs(5), admin_handle).await;

    info!("Shutdown complete");
    Ok(())
}

/// Build the configured performance source.
fn build_source(config: &AppConfig) -> Result<Arc<dyn PerformanceSource>> {
    match config.source.kind {
        SourceKind::Simulated => {
            let bases = config.base_performances()?;
            let source = match config.source.seed {
                Some(seed) => SimulatedSource::with_seed(bases, seed),
                None => SimulatedSource::new(bases),
            };
            Ok(Arc::new(source))
        }
        SourceKind::Http => {
            let url = config
                .source
                .url
                .clone()
                .context("source.url is required for the http source")?;
            let source = HttpPerformanceSource::new(HttpSourceConfig {
                base_url: url,
                timeout: Duration::from_millis(config.source.timeout_ms),
                max_requests_per_second: config.source.max_requests_per_second,
            })?;
            Ok(Arc::new(source))
        }
    }
}
