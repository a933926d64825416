//! # WooSync Worker
//!
//! Long-running process: HTTP hook surface, job queues and scheduler.
//!
//! ## Startup
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  tracing ─► config ─► SQLite (migrations, patches) ─► cache            │
//! │     ─► WooCommerce client factory ─► queues + dispatcher ─► scheduler  │
//! │     ─► axum on server.listen_addr                                       │
//! │                                                                         │
//! │  Ctrl+C / SIGTERM ─► stop HTTP ─► stop scheduler ─► drain workers      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use woosync_db::{Database, DbConfig};
use woosync_sync::{
    Cache, HttpApiFactory, JobDispatcher, MemoryCache, RedisCache, Scheduler, SyncContext, TokioJobQueue,
    WorkerConfig,
};
use woosync_worker::{app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,woosync=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting WooSync worker...");

    let config_path = std::env::var_os("WOOSYNC_CONFIG").map(PathBuf::from);
    let config = WorkerConfig::load(config_path).context("Failed to load configuration")?;
    info!(
        listen = %config.server.listen_addr,
        database = %config.database.path.display(),
        test_mode = config.test_mode,
        "Configuration loaded"
    );

    if let Some(parent) = config.database.path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let db = Database::new(
        DbConfig::new(&config.database.path).max_connections(config.database.max_connections),
    )
    .await
    .context("Failed to open database")?;
    info!("Database ready");

    let cache: Arc<dyn Cache> = match &config.cache.redis_url {
        Some(url) => match RedisCache::open(url) {
            Ok(cache) => {
                info!("Using Redis cache");
                Arc::new(cache)
            }
            Err(e) => {
                warn!(error = %e, "Redis unavailable, falling back to in-memory cache");
                Arc::new(MemoryCache::new())
            }
        },
        None => Arc::new(MemoryCache::new()),
    };

    let api = HttpApiFactory::new(config.http.clone(), db.clone()).context("Failed to build HTTP client")?;

    let (queue, workers) = TokioJobQueue::new(&config.queue);
    let listen_addr = config.server.listen_addr.clone();
    let ctx = SyncContext::new(db.clone(), Arc::new(queue), cache, Arc::new(api), config);

    let queue_handle = workers.start(Arc::new(JobDispatcher::new(ctx.clone())));

    let (scheduler, scheduler_handle) = Scheduler::new(ctx.clone());
    let scheduler_task = tokio::spawn(scheduler.run());

    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", listen_addr))?;
    info!(addr = %listen_addr, "Listening");

    axum::serve(listener, app(AppState { ctx }))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    if let Err(e) = scheduler_handle.shutdown().await {
        warn!(error = %e, "Scheduler shutdown");
    }
    let _ = scheduler_task.await;
    queue_handle.shutdown().await;
    db.close().await;

    info!("Shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
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
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
