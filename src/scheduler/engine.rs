use crate::scheduler::{CycleSummary, Scheduler};
use chrono::Utc;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, info};

/// Main scheduler execution loop.
/// Polls for due actions every `poll_interval` until no action is left, the
/// `shutdown` future completes, or a fatal error occurs.
pub async fn run_scheduler_loop<F>(
    mut scheduler: Scheduler,
    poll_interval: Duration,
    shutdown: F,
) -> anyhow::Result<CycleSummary>
where
    F: Future<Output = ()>,
{
    info!(actions = scheduler.len(), "Scheduler engine started");

    let mut totals = CycleSummary::default();
    // tokio panics on a zero period.
    let mut interval = tokio::time::interval(poll_interval.max(Duration::from_millis(1)));
    tokio::pin!(shutdown);

    while !scheduler.is_empty() {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested, stopping scheduler");
                return Ok(totals);
            }
            _ = interval.tick() => {}
        }

        match scheduler.run_due(Utc::now()).await {
            Ok(summary) => {
                if summary.executed > 0 {
                    debug!(
                        executed = summary.executed,
                        failed = summary.failed,
                        next_due = ?scheduler.next_due(),
                        "Cycle complete"
                    );
                }
                totals += summary;
            }
            Err(e) => {
                error!(error = %e, "Fatal error, stopping scheduler");
                return Err(e.into());
            }
        }
    }

    info!(
        executed = totals.executed,
        succeeded = totals.succeeded,
        failed = totals.failed,
        "No actions left to schedule"
    );
    Ok(totals)
}
