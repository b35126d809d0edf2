//! Background drainer for the execution queue.
//!
//! Every `poll_interval` it expires stale running runs, claims up to
//! `batch_size` queue items through [`Orchestrator::process_next`], and
//! purges removed items older than `queue_retention`. Runs until the
//! cancellation token fires.

use std::sync::Arc;
use std::time::Duration;

use rftm_core::error::CoreError;
use rftm_core::types::Caller;
use tokio_util::sync::CancellationToken;

use crate::orchestrator::Orchestrator;

#[derive(Debug, Clone)]
pub struct DrainerConfig {
    pub poll_interval: Duration,
    /// Most queue items processed per tick.
    pub batch_size: usize,
    /// Runs `running` longer than this are failed with reason `timeout`.
    pub run_timeout: Duration,
    /// How long removed queue items are kept.
    pub queue_retention: Duration,
}

impl Default for DrainerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            batch_size: 10,
            run_timeout: Duration::from_secs(3600),
            queue_retention: Duration::from_secs(24 * 3600),
        }
    }
}

/// Counters for one drain tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub processed: usize,
    pub expired: usize,
    pub purged: u64,
}

pub struct QueueDrainer {
    orchestrator: Arc<Orchestrator>,
    config: DrainerConfig,
    caller: Caller,
}

impl QueueDrainer {
    pub fn new(orchestrator: Arc<Orchestrator>, config: DrainerConfig, caller: Caller) -> Self {
        Self {
            orchestrator,
            config,
            caller,
        }
    }

    /// Run the drain loop until `cancel` is triggered.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            batch_size = self.config.batch_size,
            run_timeout_secs = self.config.run_timeout.as_secs(),
            "Queue drainer started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Queue drainer shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    match self.tick().await {
                        Ok(report) if report != DrainReport::default() => {
                            tracing::info!(
                                processed = report.processed,
                                expired = report.expired,
                                purged = report.purged,
                                "Drain tick",
                            );
                        }
                        Ok(_) => tracing::debug!("Drain tick: nothing to do"),
                        Err(e) if e.is_retryable() => {
                            tracing::warn!(error = %e, "Drain tick failed, retrying next tick");
                        }
                        Err(e) => tracing::error!(error = %e, "Drain tick failed"),
                    }
                }
            }
        }
    }

    /// One pass: expire, drain a batch, purge.
    pub async fn tick(&self) -> Result<DrainReport, CoreError> {
        let mut report = DrainReport {
            expired: self
                .orchestrator
                .history()
                .expire_stale(self.config.run_timeout)
                .await?
                .len(),
            ..DrainReport::default()
        };

        while report.processed < self.config.batch_size {
            match self.orchestrator.process_next(&self.caller).await? {
                Some(result) => {
                    tracing::debug!(
                        run_id = result.run_id,
                        case_id = result.case_id,
                        status = %result.status,
                        "Processed queued run",
                    );
                    report.processed += 1;
                }
                None => break,
            }
        }

        let retention = chrono::Duration::from_std(self.config.queue_retention)
            .map_err(|e| CoreError::Validation(format!("Queue retention out of range: {e}")))?;
        report.purged = self.orchestrator.queue().purge_removed(retention).await?;

        Ok(report)
    }
}
