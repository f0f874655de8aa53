//! opcreader -- scheduled polling of OPC UA server nodes.
//!
//! This crate provides the action model (read, history read, diagnostic
//! read), the session boundary actions run against, CSV persistence of the
//! observed values, and the scheduler that drives due actions.

pub mod action;
pub mod config;
pub mod record;
pub mod scheduler;
pub mod session;

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::warn;

use crate::action::Action;
use crate::config::AppConfig;
use crate::scheduler::{CycleSummary, Scheduler};

/// Poll every configured action until none is left or Ctrl-C is received.
pub async fn run(config: &AppConfig) -> Result<CycleSummary> {
    let scheduler = Scheduler::from_config(config)?;
    if scheduler.is_empty() {
        warn!("No actions configured");
    }

    let poll_interval = Duration::from_millis(config.scheduler.poll_interval_ms);
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Cannot listen for Ctrl-C, running until done");
            std::future::pending::<()>().await;
        }
    };
    scheduler::run_scheduler_loop(scheduler, poll_interval, shutdown).await
}

/// Execute `action` once against the session configured for its endpoint and
/// report the result. Returns whether the action reported success.
pub async fn run_once(config: &AppConfig, action: &mut Action) -> Result<bool> {
    let endpoint = config
        .endpoint(action.endpoint())
        .with_context(|| format!("endpoint {} is not configured", action.endpoint()))?;
    let session = endpoint
        .build_session()
        .with_context(|| format!("failed to set up session for {}", endpoint.url))?;
    let sink = config.csv.open_sink().with_context(|| {
        format!("failed to open CSV output {}", config.csv.path.display())
    })?;

    let outcome = action.execute(&session, sink.as_deref()).await;
    let succeeded = action.report_result(&outcome);
    match outcome {
        Err(e) if e.is_fatal() => Err(e.into()),
        _ => Ok(succeeded),
    }
}
