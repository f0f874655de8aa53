//! Actions: the unit of work executed against a session on every due cycle.
//!
//! An action resolves its symbolic node id once per session, runs its
//! variant-specific read, optionally hands the observed points to a
//! [`RecordSink`], and reports the outcome through `tracing`.

pub mod diagnostic;
pub mod history;
pub mod read;

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::record::{RecordSink, SinkError};
use crate::session::{
    DataValue, NodeId, ReadRawModifiedDetails, Session, SessionError, SessionId, StatusCode,
};

pub use self::diagnostic::{ObservedValue, RepresentationError, TestState, UNREPRESENTABLE_VALUE};
pub use self::history::HistoryReadState;
pub use self::read::ReadState;

static NEXT_ACTION_ID: AtomicU32 = AtomicU32::new(0);

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("cannot resolve node id '{node_id}'")]
    Resolution {
        node_id: String,
        #[source]
        source: SessionError,
    },

    #[error("read failed")]
    Execution(#[from] SessionError),

    #[error("history read returned {status}")]
    HistoryStatus { status: StatusCode },

    #[error("no value has been observed")]
    NoValue,

    #[error("persisting result failed")]
    Persistence(#[from] SinkError),
}

impl ActionError {
    /// Fatal errors stop the scheduler; everything else only fails the cycle.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ActionError::Persistence(_))
    }
}

/// A node id resolved under a specific session.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedNode {
    pub session: SessionId,
    pub node_id: NodeId,
}

/// Variant-specific state.
#[derive(Debug, Clone)]
pub enum ActionKind {
    Read(ReadState),
    HistoryRead(HistoryReadState),
    Test(TestState),
}

impl ActionKind {
    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::Read(_) => "ReadAction",
            ActionKind::HistoryRead(_) => "HistoryReadAction",
            ActionKind::Test(_) => "TestAction",
        }
    }
}

/// What the variant executors need to know about the action running them.
pub(crate) struct Cycle<'a> {
    pub description: &'a str,
    pub tag: &'a str,
    pub node: &'a NodeId,
}

#[derive(Debug, Clone)]
pub struct Action {
    id: u32,
    endpoint: Url,
    node_id: String,
    resolved: Option<ResolvedNode>,
    /// Recurrence in seconds; 0 runs once.
    interval: u32,
    next_execution: DateTime<Utc>,
    kind: ActionKind,
}

impl Action {
    fn new(endpoint: Url, node_id: impl Into<String>, interval: u32, kind: ActionKind) -> Self {
        Self {
            id: NEXT_ACTION_ID.fetch_add(1, Ordering::Relaxed),
            endpoint,
            node_id: node_id.into(),
            resolved: None,
            interval,
            next_execution: Utc::now(),
            kind,
        }
    }

    pub fn read(endpoint: Url, node_id: impl Into<String>, interval: u32) -> Self {
        Self::new(endpoint, node_id, interval, ActionKind::Read(ReadState::default()))
    }

    pub fn history_read(
        endpoint: Url,
        node_id: impl Into<String>,
        interval: u32,
        details: ReadRawModifiedDetails,
    ) -> Self {
        Self::new(
            endpoint,
            node_id,
            interval,
            ActionKind::HistoryRead(HistoryReadState::new(details)),
        )
    }

    pub fn test(endpoint: Url, node_id: impl Into<String>, interval: u32) -> Self {
        Self::new(endpoint, node_id, interval, ActionKind::Test(TestState::default()))
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn interval(&self) -> u32 {
        self.interval
    }

    pub fn next_execution(&self) -> DateTime<Utc> {
        self.next_execution
    }

    pub fn kind(&self) -> &ActionKind {
        &self.kind
    }

    pub fn resolved(&self) -> Option<&ResolvedNode> {
        self.resolved.as_ref()
    }

    /// Most recent observation of a read or history-read action.
    pub fn last_value(&self) -> Option<&DataValue> {
        match &self.kind {
            ActionKind::Read(state) => state.last_value.as_ref(),
            ActionKind::HistoryRead(state) => state.read.last_value.as_ref(),
            ActionKind::Test(_) => None,
        }
    }

    /// Last diagnostic value of a test action.
    pub fn observed_value(&self) -> Option<&ObservedValue> {
        match &self.kind {
            ActionKind::Test(state) => state.observed.as_ref(),
            _ => None,
        }
    }

    pub fn describe(&self) -> String {
        format!(
            "ActionId: {:03} ActionType: '{}', Endpoint: '{}' Node '{}'",
            self.id,
            self.kind.name(),
            self.endpoint,
            self.node_id
        )
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.next_execution
    }

    /// Advance the next execution to `now + interval`. Returns false for
    /// one-shot actions, which are not rescheduled.
    pub fn reschedule(&mut self, now: DateTime<Utc>) -> bool {
        if self.interval == 0 {
            return false;
        }
        let next = now + chrono::Duration::seconds(i64::from(self.interval));
        self.next_execution = next.max(self.next_execution);
        true
    }

    /// Resolve the symbolic node id unless a resolution for this session is
    /// already cached. A cached id from another session is discarded.
    pub async fn resolve(&mut self, session: &dyn Session) -> Result<NodeId, ActionError> {
        let current = session.session_id();
        if let Some(cached) = self.resolved.as_ref().filter(|r| r.session == current) {
            return Ok(cached.node_id.clone());
        }

        self.resolved = None;
        let node_id = session
            .resolve_node_id(&self.node_id)
            .await
            .map_err(|source| ActionError::Resolution {
                node_id: self.node_id.clone(),
                source,
            })?;
        debug!(action_id = self.id, session = %current, node_id = %node_id, "Node id resolved");
        self.resolved = Some(ResolvedNode {
            session: current,
            node_id: node_id.clone(),
        });
        Ok(node_id)
    }

    /// Run one cycle of this action. `sink` is `None` when persistence is
    /// disabled.
    pub async fn execute(
        &mut self,
        session: &dyn Session,
        sink: Option<&dyn RecordSink>,
    ) -> Result<(), ActionError> {
        let description = self.describe();
        info!("Start action {} on '{}'", description, session.endpoint_url());

        let node = self.resolve(session).await?;
        debug!(node_id = %node, "NodeId to query");

        let cycle = Cycle {
            description: &description,
            tag: &self.node_id,
            node: &node,
        };
        match &mut self.kind {
            ActionKind::Read(state) => read::execute(state, &cycle, session, sink).await,
            ActionKind::HistoryRead(state) => history::execute(state, &cycle, session, sink).await,
            ActionKind::Test(state) => diagnostic::execute(state, &cycle, session).await,
        }
    }

    /// Log the outcome of the last cycle. Returns whether it was reported as
    /// a success; a read that never observed a value always reports failure.
    pub fn report_result(&self, outcome: &Result<(), ActionError>) -> bool {
        let observed_nothing = match &self.kind {
            ActionKind::Read(state) => state.last_value.is_none(),
            ActionKind::HistoryRead(state) => state.read.last_value.is_none(),
            ActionKind::Test(_) => false,
        };

        match outcome {
            Ok(()) if observed_nothing => {
                self.report_failure(&ActionError::NoValue);
                false
            }
            Ok(()) => {
                self.report_success();
                true
            }
            Err(e) => {
                self.report_failure(e);
                false
            }
        }
    }

    pub fn report_success(&self) {
        info!("Action ({}) completed successfully", self);
        match &self.kind {
            ActionKind::Read(state) => read::report_success(state, self),
            ActionKind::HistoryRead(state) => read::report_success(&state.read, self),
            ActionKind::Test(state) => diagnostic::report_success(state, self),
        }
    }

    pub fn report_failure(&self, error: &ActionError) {
        warn!("Action ({}) execution with error", self);
        warn!("Result ({}): {}", self, error);
        if let Some(cause) = std::error::Error::source(error) {
            warn!("Details ({}): {}", self, cause);
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}
