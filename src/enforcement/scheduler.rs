//! Sweep Scheduler
//!
//! Runs the deadline and review sweeps on an interval. Both sweeps are
//! idempotent, so overlapping runs (this loop plus an operator-triggered
//! manual pass) are harmless.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;

use super::deadlines::DeadlineSweeper;
use super::review::ReviewSweeper;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub sweep_interval: Duration,
    /// Cap per review pass; the rest surfaces next interval
    pub review_batch: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(15 * 60),
            review_batch: 200,
        }
    }
}

/// Spawn the sweep loop. Runs until the handle is aborted.
pub fn start_sweep_loop(
    deadlines: Arc<DeadlineSweeper>,
    review: Arc<ReviewSweeper>,
    config: SchedulerConfig,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        log::info!("Enforcement sweep loop started (every {:?})", config.sweep_interval);
        loop {
            let now = Utc::now();

            match deadlines.sweep(now) {
                Ok(report) if !report.resolved.is_empty() => {
                    log::info!(
                        "Deadline sweep resolved {} action(s), created {} draft(s)",
                        report.resolved.len(),
                        report.drafts_created.len()
                    );
                }
                Ok(_) => {}
                Err(e) => log::error!("Deadline sweep failed: {}", e),
            }

            match review.sweep(now, config.review_batch) {
                Ok(candidates) if !candidates.is_empty() => {
                    log::info!("Review sweep flagged {} candidate(s)", candidates.len());
                }
                Ok(_) => {}
                Err(e) => log::error!("Review sweep failed: {}", e),
            }

            tokio::time::sleep(config.sweep_interval).await;
        }
    })
}
