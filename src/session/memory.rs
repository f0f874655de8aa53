//! In-process address space implementing [`Session`].
//!
//! Backs endpoints declared with simulated nodes in the configuration and
//! serves as the server double in tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;

use chrono::Utc;
use url::Url;

use super::{
    DataValue, ExpandedNodeId, HistoryReadResult, NamespaceRef, NodeId, NodeInfo,
    ReadRawModifiedDetails, Session, SessionError, SessionId, StatusCode,
};

/// Namespace 0 of every server.
pub const OPC_UA_NAMESPACE: &str = "http://opcfoundation.org/UA/";

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// A node in the simulated address space.
#[derive(Debug, Clone)]
pub struct MemoryNode {
    pub node_id: NodeId,
    pub browse_name: String,
    pub display_name: String,
    pub description: String,
    pub value: DataValue,
    pub history: Vec<DataValue>,
    /// Overall status returned by history reads instead of `Good`.
    pub history_status: Option<StatusCode>,
}

impl MemoryNode {
    pub fn new(node_id: NodeId, browse_name: impl Into<String>, value: DataValue) -> Self {
        let browse_name = browse_name.into();
        Self {
            node_id,
            display_name: browse_name.clone(),
            browse_name,
            description: String::new(),
            value,
            history: Vec::new(),
            history_status: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_history(mut self, history: Vec<DataValue>) -> Self {
        self.history = history;
        self
    }

    pub fn with_history_status(mut self, status: StatusCode) -> Self {
        self.history_status = Some(status);
        self
    }
}

pub struct MemorySession {
    id: SessionId,
    endpoint: Url,
    namespaces: Vec<String>,
    nodes: RwLock<HashMap<NodeId, MemoryNode>>,
    offline: AtomicBool,
}

impl MemorySession {
    /// `namespaces` become indexes 1.. of the namespace table.
    pub fn new(endpoint: Url, namespaces: Vec<String>) -> Self {
        let mut table = Vec::with_capacity(namespaces.len() + 1);
        table.push(OPC_UA_NAMESPACE.to_string());
        table.extend(namespaces.into_iter().filter(|ns| ns != OPC_UA_NAMESPACE));
        Self {
            id: SessionId(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed)),
            endpoint,
            namespaces: table,
            nodes: RwLock::new(HashMap::new()),
            offline: AtomicBool::new(false),
        }
    }

    pub fn with_node(self, node: MemoryNode) -> Self {
        self.insert_node(node);
        self
    }

    pub fn insert_node(&self, node: MemoryNode) {
        let mut nodes = self.nodes.write().unwrap_or_else(|e| e.into_inner());
        nodes.insert(node.node_id.clone(), node);
    }

    /// Replace the current value of a node. Returns false if the node is unknown.
    pub fn set_value(&self, node: &NodeId, value: DataValue) -> bool {
        let mut nodes = self.nodes.write().unwrap_or_else(|e| e.into_inner());
        match nodes.get_mut(node) {
            Some(n) => {
                n.value = value;
                true
            }
            None => false,
        }
    }

    /// While offline every read fails with a transport error. Resolution
    /// still works since it only consults the namespace table.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn namespace_index(&self, uri: &str) -> Option<u16> {
        self.namespaces
            .iter()
            .position(|ns| ns == uri)
            .and_then(|i| u16::try_from(i).ok())
    }

    fn check_online(&self) -> Result<(), SessionError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(SessionError::Transport(format!(
                "connection to {} lost",
                self.endpoint
            )));
        }
        Ok(())
    }

    fn with_node_ref<T>(
        &self,
        node: &NodeId,
        f: impl FnOnce(&MemoryNode) -> T,
    ) -> Result<T, SessionError> {
        let nodes = self.nodes.read().unwrap_or_else(|e| e.into_inner());
        nodes
            .get(node)
            .map(f)
            .ok_or_else(|| SessionError::UnknownNode(node.to_string()))
    }
}

#[async_trait::async_trait]
impl Session for MemorySession {
    fn endpoint_url(&self) -> &Url {
        &self.endpoint
    }

    fn session_id(&self) -> SessionId {
        self.id
    }

    async fn resolve_node_id(&self, symbolic: &str) -> Result<NodeId, SessionError> {
        let expanded: ExpandedNodeId = symbolic.parse()?;
        let namespace = match expanded.namespace {
            NamespaceRef::Index(i) if usize::from(i) < self.namespaces.len() => i,
            NamespaceRef::Index(i) => {
                return Err(SessionError::UnknownNamespace(format!("ns={}", i)))
            }
            NamespaceRef::Uri(uri) => self
                .namespace_index(&uri)
                .ok_or(SessionError::UnknownNamespace(uri))?,
        };
        let node_id = NodeId::new(namespace, expanded.identifier);
        self.with_node_ref(&node_id, |_| ())?;
        Ok(node_id)
    }

    async fn read_node(&self, node: &NodeId) -> Result<NodeInfo, SessionError> {
        self.check_online()?;
        self.with_node_ref(node, |n| NodeInfo {
            node_id: n.node_id.clone(),
            browse_name: n.browse_name.clone(),
            display_name: n.display_name.clone(),
            description: n.description.clone(),
        })
    }

    async fn read_value(&self, node: &NodeId) -> Result<DataValue, SessionError> {
        self.check_online()?;
        let mut value = self.with_node_ref(node, |n| n.value.clone())?;
        if value.server_timestamp.is_none() {
            value.server_timestamp = Some(Utc::now());
        }
        Ok(value)
    }

    async fn read_history(
        &self,
        node: &NodeId,
        details: &ReadRawModifiedDetails,
    ) -> Result<HistoryReadResult, SessionError> {
        self.check_online()?;
        self.with_node_ref(node, |n| {
            if let Some(status) = n.history_status.filter(|s| s.is_bad()) {
                return HistoryReadResult {
                    status,
                    values: Vec::new(),
                };
            }

            let reverse = details.end_time < details.start_time;
            let (lo, hi) = if reverse {
                (details.end_time, details.start_time)
            } else {
                (details.start_time, details.end_time)
            };

            let in_range = |dv: &&DataValue| dv.timestamp().is_some_and(|t| t >= lo && t <= hi);
            let mut values: Vec<DataValue> = if reverse {
                n.history.iter().rev().filter(in_range).cloned().collect()
            } else {
                n.history.iter().filter(in_range).cloned().collect()
            };
            if details.num_values_per_node > 0 {
                values.truncate(details.num_values_per_node as usize);
            }

            HistoryReadResult {
                status: n.history_status.unwrap_or(StatusCode::GOOD),
                values,
            }
        })
    }
}
