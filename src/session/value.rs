//! Values, data values and the history-read request/response shapes.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{NodeId, StatusCode};

/// Value carried by a node attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum Variant {
    Empty,
    Boolean(bool),
    Int64(i64),
    UInt64(u64),
    Double(f64),
    String(String),
    DateTime(DateTime<Utc>),
    ByteString(Vec<u8>),
    Array(Vec<Variant>),
    /// Structured value whose encoding this client does not know.
    ExtensionObject { type_id: NodeId, body: Vec<u8> },
}

impl Variant {
    pub fn is_scalar(&self) -> bool {
        !matches!(self, Variant::Array(_) | Variant::ExtensionObject { .. })
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Variant::Empty => "Null",
            Variant::Boolean(_) => "Boolean",
            Variant::Int64(_) => "Int64",
            Variant::UInt64(_) => "UInt64",
            Variant::Double(_) => "Double",
            Variant::String(_) => "String",
            Variant::DateTime(_) => "DateTime",
            Variant::ByteString(_) => "ByteString",
            Variant::Array(_) => "Array",
            Variant::ExtensionObject { .. } => "ExtensionObject",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Empty => f.write_str("null"),
            Variant::Boolean(v) => write!(f, "{}", v),
            Variant::Int64(v) => write!(f, "{}", v),
            Variant::UInt64(v) => write!(f, "{}", v),
            Variant::Double(v) => write!(f, "{}", v),
            Variant::String(v) => f.write_str(v),
            Variant::DateTime(v) => f.write_str(&v.to_rfc3339()),
            Variant::ByteString(bytes) => {
                f.write_str("0x")?;
                for b in bytes {
                    write!(f, "{:02x}", b)?;
                }
                Ok(())
            }
            Variant::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Variant::ExtensionObject { type_id, body } => {
                write!(f, "ExtensionObject({}, {} bytes)", type_id, body.len())
            }
        }
    }
}

impl From<f64> for Variant {
    fn from(v: f64) -> Self {
        Variant::Double(v)
    }
}

impl From<i64> for Variant {
    fn from(v: i64) -> Self {
        Variant::Int64(v)
    }
}

impl From<bool> for Variant {
    fn from(v: bool) -> Self {
        Variant::Boolean(v)
    }
}

impl From<&str> for Variant {
    fn from(v: &str) -> Self {
        Variant::String(v.to_string())
    }
}

/// One observation of a node value.
#[derive(Debug, Clone, PartialEq)]
pub struct DataValue {
    pub value: Variant,
    pub status: StatusCode,
    pub source_timestamp: Option<DateTime<Utc>>,
    pub server_timestamp: Option<DateTime<Utc>>,
}

impl DataValue {
    pub fn new(value: impl Into<Variant>, status: StatusCode) -> Self {
        Self {
            value: value.into(),
            status,
            source_timestamp: None,
            server_timestamp: None,
        }
    }

    pub fn with_source_timestamp(mut self, ts: DateTime<Utc>) -> Self {
        self.source_timestamp = Some(ts);
        self
    }

    pub fn with_server_timestamp(mut self, ts: DateTime<Utc>) -> Self {
        self.server_timestamp = Some(ts);
        self
    }

    /// Timestamp of the observation: server time if stamped, else source time.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.server_timestamp.or(self.source_timestamp)
    }
}

impl fmt::Display for DataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.value, self.status)?;
        if let Some(ts) = self.timestamp() {
            write!(f, " @ {}", ts.to_rfc3339())?;
        }
        Ok(())
    }
}

/// Descriptive attributes of a node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeInfo {
    pub node_id: NodeId,
    pub browse_name: String,
    pub display_name: String,
    pub description: String,
}

/// Raw/modified history query for one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadRawModifiedDetails {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub is_read_modified: bool,
    /// 0 means no limit.
    #[serde(default)]
    pub num_values_per_node: u32,
    #[serde(default)]
    pub return_bounds: bool,
}

/// Result of a history read: an overall status and the points in server order.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryReadResult {
    pub status: StatusCode,
    pub values: Vec<DataValue>,
}
