//! Rollcall server: geofenced group attendance.
//!
//! Wires the store adapter, session registry, caches, and sync worker
//! together, then serves until a shutdown signal arrives.

use std::sync::Arc;

use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, fmt};

use rollcall_cache::CacheSet;
use rollcall_core::config::AppConfig;
use rollcall_core::error::AppError;
use rollcall_service::{ServiceContext, Services};
use rollcall_session::{SessionRegistry, SessionRuntime, SystemClock};
use rollcall_worker::{SyncExecutor, SyncQueue, SyncRunner};

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration for the environment named by `ROLLCALL_ENV`.
fn load_configuration() -> Result<AppConfig, AppError> {
    let env = std::env::var("ROLLCALL_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load(&env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt().pretty().with_env_filter(filter).with_target(true).init();
        }
    }
}

async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting Rollcall v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Audit directory ──────────────────────────────────
    tokio::fs::create_dir_all(&config.audit.directory)
        .await
        .map_err(|e| {
            AppError::internal(format!(
                "Failed to create audit directory '{}': {e}",
                config.audit.directory
            ))
        })?;

    // ── Step 2: Attendance store ─────────────────────────────────
    let store = rollcall_store::build_store(&config.store)?;

    // ── Step 3: Session registry ─────────────────────────────────
    let runtime = Arc::new(SessionRuntime::from_config(
        &config.session,
        &config.audit,
        Arc::new(SystemClock),
    ));
    let registry = Arc::new(SessionRegistry::new(runtime));
    tracing::info!(
        window_seconds = config.session.window_duration_seconds,
        membership_failure_policy = ?config.session.membership_failure_policy,
        "Session registry ready"
    );

    // ── Step 4: Caches ───────────────────────────────────────────
    let caches = CacheSet::new(&config.cache);

    // ── Step 5: Shutdown channel ─────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Step 6: Sync worker ──────────────────────────────────────
    let (queue, worker_handle) = if config.worker.enabled {
        let (queue, receiver) = SyncQueue::channel(config.worker.queue_capacity);
        let runner = SyncRunner::new(SyncExecutor::new(store.clone()), receiver, &config.worker);
        let cancel = shutdown_rx.clone();
        let handle = tokio::spawn(async move {
            runner.run(cancel).await;
        });
        tracing::info!(capacity = config.worker.queue_capacity, "Sync worker started");
        (queue, Some(handle))
    } else {
        tracing::warn!("Sync worker disabled; state will not be persisted");
        (SyncQueue::disabled(), None)
    };

    // ── Step 7: Services ─────────────────────────────────────────
    let context = Arc::new(ServiceContext::new(
        store,
        registry.clone(),
        caches,
        queue,
        config.session.membership_failure_policy,
    ));
    // Handed to the request layer; held for the life of the process.
    let _services = Services::new(context);
    tracing::info!("Rollcall ready");

    // ── Step 8: Graceful shutdown ────────────────────────────────
    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown...");
    let _ = shutdown_tx.send(true);

    registry.close_all().await;

    if let Some(handle) = worker_handle {
        let grace = std::time::Duration::from_secs(config.worker.shutdown_drain_seconds + 1);
        let _ = tokio::time::timeout(grace, handle).await;
    }

    tracing::info!("Rollcall shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
