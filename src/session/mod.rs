//! Boundary to the session layer: node id resolution, value reads and
//! history reads against one connected server.

pub mod memory;
pub mod node_id;
pub mod status;
pub mod value;

use std::fmt;

use thiserror::Error;
use url::Url;

pub use self::node_id::{ExpandedNodeId, Identifier, NamespaceRef, NodeId, NodeIdParseError};
pub use self::status::StatusCode;
pub use self::value::{DataValue, HistoryReadResult, NodeInfo, ReadRawModifiedDetails, Variant};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid node id: {0}")]
    InvalidNodeId(#[from] NodeIdParseError),

    #[error("namespace '{0}' is not known to the server")]
    UnknownNamespace(String),

    #[error("node {0} does not exist")]
    UnknownNode(String),

    #[error("transport error: {0}")]
    Transport(String),
}

/// Identity of one live session. Resolved node ids are only valid for the
/// session id they were resolved under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Operations the actions need from a connected session.
///
/// Implementations must tolerate concurrent calls through `&self`; callers
/// that need serialized access limit in-flight calls themselves.
#[async_trait::async_trait]
pub trait Session: Send + Sync {
    fn endpoint_url(&self) -> &Url;

    fn session_id(&self) -> SessionId;

    /// Translate a symbolic node id into this session's node id.
    async fn resolve_node_id(&self, symbolic: &str) -> Result<NodeId, SessionError>;

    async fn read_node(&self, node: &NodeId) -> Result<NodeInfo, SessionError>;

    async fn read_value(&self, node: &NodeId) -> Result<DataValue, SessionError>;

    async fn read_history(
        &self,
        node: &NodeId,
        details: &ReadRawModifiedDetails,
    ) -> Result<HistoryReadResult, SessionError>;
}
