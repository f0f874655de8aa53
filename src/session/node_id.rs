//! Node identifiers: the symbolic form found in configuration and the
//! resolved, session-scoped form used on the wire.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeIdParseError {
    #[error("node id is empty")]
    Empty,

    #[error("invalid namespace index '{0}'")]
    BadNamespaceIndex(String),

    #[error("namespace prefix without identifier in '{0}'")]
    MissingIdentifier(String),

    #[error("unknown identifier type '{0}' (expected i=, s= or g=)")]
    UnknownIdentifierType(String),

    #[error("invalid numeric identifier '{0}'")]
    BadNumeric(String),

    #[error("invalid guid identifier '{0}'")]
    BadGuid(String),
}

/// Identifier part of a node id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identifier {
    Numeric(u32),
    String(String),
    Guid(uuid::Uuid),
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Numeric(v) => write!(f, "i={}", v),
            Identifier::String(v) => write!(f, "s={}", v),
            Identifier::Guid(v) => write!(f, "g={}", v),
        }
    }
}

impl FromStr for Identifier {
    type Err = NodeIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, payload) = s
            .split_once('=')
            .ok_or_else(|| NodeIdParseError::UnknownIdentifierType(s.to_string()))?;
        match kind {
            "i" => payload
                .parse::<u32>()
                .map(Identifier::Numeric)
                .map_err(|_| NodeIdParseError::BadNumeric(payload.to_string())),
            "s" => Ok(Identifier::String(payload.to_string())),
            "g" => uuid::Uuid::parse_str(payload)
                .map(Identifier::Guid)
                .map_err(|_| NodeIdParseError::BadGuid(payload.to_string())),
            other => Err(NodeIdParseError::UnknownIdentifierType(other.to_string())),
        }
    }
}

/// A node id resolved against a live session's namespace table.
///
/// Only meaningful for the session that produced it: namespace indexes are
/// assigned per server and may change across reconnects.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeId {
    pub namespace: u16,
    pub identifier: Identifier,
}

impl NodeId {
    pub fn new(namespace: u16, identifier: Identifier) -> Self {
        Self { namespace, identifier }
    }

    pub fn numeric(namespace: u16, value: u32) -> Self {
        Self::new(namespace, Identifier::Numeric(value))
    }

    pub fn string(namespace: u16, value: impl Into<String>) -> Self {
        Self::new(namespace, Identifier::String(value.into()))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace == 0 {
            write!(f, "{}", self.identifier)
        } else {
            write!(f, "ns={};{}", self.namespace, self.identifier)
        }
    }
}

/// How a symbolic node id names its namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamespaceRef {
    Index(u16),
    Uri(String),
}

/// A node id as written by a caller: `ns=2;s=Temperature`,
/// `nsu=urn:plant;i=1001` or `i=85`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandedNodeId {
    pub namespace: NamespaceRef,
    pub identifier: Identifier,
}

impl FromStr for ExpandedNodeId {
    type Err = NodeIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(NodeIdParseError::Empty);
        }

        let (namespace, rest) = if let Some(rest) = s.strip_prefix("nsu=") {
            // A ';' inside the URI is percent-escaped, so the first one ends it.
            let (uri, id) = rest
                .split_once(';')
                .ok_or_else(|| NodeIdParseError::MissingIdentifier(s.to_string()))?;
            (NamespaceRef::Uri(uri.to_string()), id)
        } else if let Some(rest) = s.strip_prefix("ns=") {
            let (index, id) = rest
                .split_once(';')
                .ok_or_else(|| NodeIdParseError::MissingIdentifier(s.to_string()))?;
            let index = index
                .parse::<u16>()
                .map_err(|_| NodeIdParseError::BadNamespaceIndex(index.to_string()))?;
            (NamespaceRef::Index(index), id)
        } else {
            (NamespaceRef::Index(0), s)
        };

        Ok(Self {
            namespace,
            identifier: rest.parse()?,
        })
    }
}
