//! Queue worker: drains queued test runs, expires stale ones and purges
//! old queue items until SIGINT/SIGTERM.

mod config;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use rftm_core::runner::SimulatedRunner;
use rftm_core::types::Caller;
use rftm_db::PgStore;
use rftm_execution::{Orchestrator, QueueDrainer};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "rftm_worker=debug,rftm_execution=debug".into());
    let registry = tracing_subscriber::registry().with(filter);
    if std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")) {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    let config = WorkerConfig::from_env().context("Invalid worker configuration")?;
    tracing::info!(
        poll_interval_secs = config.poll_interval_secs,
        batch_size = config.batch_size,
        run_timeout_secs = config.run_timeout_secs,
        "Worker starting",
    );

    let pool = rftm_db::create_lazy_pool(&config.database_url, config.db_max_connections)
        .context("Invalid DATABASE_URL")?;
    let store = Arc::new(PgStore::new(pool.clone()));
    let migrations = tokio::spawn({
        let store = Arc::clone(&store);
        async move { store.migrate_until_ready().await }
    });

    let orchestrator = Arc::new(
        Orchestrator::new(
            store,
            rftm_storage::build_artifact_store(&config.storage),
            Arc::new(SimulatedRunner::passing()),
        )
        .with_runner_timeout(Duration::from_secs(config.run_timeout_secs)),
    );
    let drainer = QueueDrainer::new(orchestrator, config.drainer(), Caller::system());

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_cancel.cancel();
    });

    drainer.run(cancel).await;

    migrations.abort();
    pool.close().await;
    tracing::info!("Worker stopped");
    Ok(())
}

/// Resolve on SIGINT, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT, stopping worker"),
        () = terminate => tracing::info!("Received SIGTERM, stopping worker"),
    }
}
