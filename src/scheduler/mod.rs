//! Owns the actions and the session per endpoint, and drives due actions
//! through execute and report.

pub mod engine;

use std::ops::AddAssign;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use crate::action::{Action, ActionError};
use crate::config::AppConfig;
use crate::record::RecordSink;
use crate::session::Session;

pub use self::engine::run_scheduler_loop;

/// Counts of one or more scheduling cycles.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleSummary {
    pub executed: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// One-shot actions removed after running.
    pub retired: usize,
}

impl AddAssign for CycleSummary {
    fn add_assign(&mut self, rhs: Self) {
        self.executed += rhs.executed;
        self.succeeded += rhs.succeeded;
        self.failed += rhs.failed;
        self.retired += rhs.retired;
    }
}

struct EndpointGroup {
    session: Arc<dyn Session>,
    actions: Vec<Action>,
}

pub struct Scheduler {
    groups: Vec<EndpointGroup>,
    sink: Option<Arc<dyn RecordSink>>,
    max_in_flight_per_session: usize,
}

impl Scheduler {
    /// `sink` is `None` when persistence is disabled.
    pub fn new(sink: Option<Arc<dyn RecordSink>>, max_in_flight_per_session: usize) -> Self {
        Self {
            groups: Vec::new(),
            sink,
            max_in_flight_per_session: max_in_flight_per_session.max(1),
        }
    }

    /// Build sessions, actions and the CSV sink from configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let sink = config.csv.open_sink().with_context(|| {
            format!("failed to open CSV output {}", config.csv.path.display())
        })?;

        let mut scheduler = Self::new(sink, config.scheduler.max_in_flight_per_session);
        for endpoint in &config.endpoints {
            let session = endpoint
                .build_session()
                .with_context(|| format!("failed to set up session for {}", endpoint.url))?;
            scheduler.add_endpoint(Arc::new(session), endpoint.actions());
        }
        Ok(scheduler)
    }

    pub fn add_endpoint(&mut self, session: Arc<dyn Session>, actions: Vec<Action>) {
        info!(
            endpoint = %session.endpoint_url(),
            actions = actions.len(),
            "Endpoint added to scheduler"
        );
        self.groups.push(EndpointGroup { session, actions });
    }

    pub fn len(&self) -> usize {
        self.groups.iter().map(|g| g.actions.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn actions(&self) -> impl Iterator<Item = &Action> {
        self.groups.iter().flat_map(|g| g.actions.iter())
    }

    /// Earliest next execution over all actions.
    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.actions().map(Action::next_execution).min()
    }

    /// Run every action due at `now`, then reschedule them to `now + interval`
    /// and retire the one-shots.
    ///
    /// Cycle failures are reported by the actions themselves and counted.
    /// A fatal error (persistence) is returned and nothing is rescheduled.
    pub async fn run_due(&mut self, now: DateTime<Utc>) -> Result<CycleSummary, ActionError> {
        let sink = self.sink.as_deref();
        let limits: Vec<Semaphore> = self
            .groups
            .iter()
            .map(|_| Semaphore::new(self.max_in_flight_per_session))
            .collect();

        let cycles = self
            .groups
            .iter_mut()
            .zip(&limits)
            .flat_map(|(group, limit)| {
                let EndpointGroup { session, actions } = group;
                let session: &dyn Session = &**session;
                actions
                    .iter_mut()
                    .filter(move |a| a.is_due(now))
                    .map(move |action| run_cycle(action, session, sink, limit))
            });
        let outcomes = join_all(cycles).await;

        let mut summary = CycleSummary {
            executed: outcomes.len(),
            ..CycleSummary::default()
        };
        for outcome in outcomes {
            if outcome? {
                summary.succeeded += 1;
            } else {
                summary.failed += 1;
            }
        }

        for group in &mut self.groups {
            group.actions.retain_mut(|action| {
                if !action.is_due(now) || action.reschedule(now) {
                    return true;
                }
                debug!(action_id = action.id(), "One-shot action retired");
                summary.retired += 1;
                false
            });
        }

        if summary.executed > 0 {
            debug!(?summary, "Scheduling cycle finished");
        }
        Ok(summary)
    }
}

async fn run_cycle(
    action: &mut Action,
    session: &dyn Session,
    sink: Option<&dyn RecordSink>,
    limit: &Semaphore,
) -> Result<bool, ActionError> {
    // The semaphore is never closed, so acquire only fails if it were.
    let _permit = limit.acquire().await.ok();
    let outcome = action.execute(session, sink).await;
    let succeeded = action.report_result(&outcome);
    match outcome {
        Err(e) if e.is_fatal() => Err(e),
        _ => Ok(succeeded),
    }
}
