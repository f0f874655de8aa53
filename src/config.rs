//! TOML configuration for opcreader.
//!
//! Declares the endpoints to poll, the actions per endpoint, the CSV sink and
//! the scheduler/logging settings. Endpoints may carry a simulated address
//! space (`[[endpoints.nodes]]`) served by [`MemorySession`].

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::action::Action;
use crate::record::{CsvSink, RecordSink, SinkError};
use crate::session::memory::{MemoryNode, MemorySession};
use crate::session::{
    DataValue, ExpandedNodeId, NamespaceRef, NodeId, NodeIdParseError, ReadRawModifiedDetails,
    StatusCode, Variant,
};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "OPCREADER_CONFIG";

const SYSTEM_CONFIG_PATH: &str = "/etc/opcreader/opcreader.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("endpoint '{0}' is not an absolute server URL")]
    InvalidEndpoint(String),

    #[error("endpoint '{0}' is configured more than once")]
    DuplicateEndpoint(String),

    #[error("invalid setting: {0}")]
    InvalidSetting(String),

    #[error("simulated node '{id}' on {endpoint}: {source}")]
    InvalidNode {
        endpoint: String,
        id: String,
        #[source]
        source: NodeIdParseError,
    },

    #[error("simulated node '{id}' on {endpoint} uses unknown namespace '{uri}'")]
    UnknownNamespace {
        endpoint: String,
        id: String,
        uri: String,
    },
}

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub csv: CsvConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub endpoints: Vec<EndpointConfig>,
}

impl AppConfig {
    /// Load and validate configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("invalid config file: {}", path.display()))?;
        info!(path = %path.display(), endpoints = config.endpoints.len(), "loaded configuration");
        Ok(config)
    }

    /// Try, in order: the file named by `OPCREADER_CONFIG`, the system
    /// config file, compiled-in defaults.
    pub fn load_or_default() -> Self {
        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            let path = Path::new(&env_path);
            match Self::load(path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "OPCREADER_CONFIG set but file could not be loaded, trying fallback"
                    );
                }
            }
        }

        let system_path = Path::new(SYSTEM_CONFIG_PATH);
        if system_path.exists() {
            match Self::load(system_path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %system_path.display(),
                        error = %e,
                        "system config file exists but could not be loaded, using defaults"
                    );
                }
            }
        }

        debug!("no config file found, using compiled-in defaults");
        Self::default()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scheduler.max_in_flight_per_session == 0 {
            return Err(ConfigError::InvalidSetting(
                "scheduler.max_in_flight_per_session must be at least 1".to_string(),
            ));
        }
        if self.scheduler.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidSetting(
                "scheduler.poll_interval_ms must be at least 1".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for endpoint in &self.endpoints {
            if endpoint.url.cannot_be_a_base() || endpoint.url.host_str().is_none() {
                return Err(ConfigError::InvalidEndpoint(endpoint.url.to_string()));
            }
            if !seen.insert(endpoint.url.as_str()) {
                return Err(ConfigError::DuplicateEndpoint(endpoint.url.to_string()));
            }
            endpoint.build_session()?;
        }
        Ok(())
    }

    pub fn endpoint(&self, url: &Url) -> Option<&EndpointConfig> {
        self.endpoints.iter().find(|e| &e.url == url)
    }
}

// ---------------------------------------------------------------------------
// Ambient sections
// ---------------------------------------------------------------------------

/// CSV persistence of result records.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvConfig {
    /// Whether read and history-read actions emit records at all.
    pub enabled: bool,
    pub path: PathBuf,
}

impl Default for CsvConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: PathBuf::from("opcreader.csv"),
        }
    }
}

impl CsvConfig {
    /// The sink actions write to, or `None` when persistence is disabled.
    pub fn open_sink(&self) -> Result<Option<Arc<dyn RecordSink>>, SinkError> {
        if !self.enabled {
            return Ok(None);
        }
        let sink = CsvSink::open(&self.path)?;
        info!(path = %sink.path().display(), "CSV persistence enabled");
        Ok(Some(Arc::new(sink)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// How often due actions are looked for.
    pub poll_interval_ms: u64,
    /// Concurrent calls allowed on one session; 1 serializes them.
    pub max_in_flight_per_session: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            max_in_flight_per_session: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum tracing level (`trace`, `debug`, `info`, `warn`, `error`).
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Endpoints and actions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub url: Url,
    /// Server namespace table from index 1 on.
    #[serde(default)]
    pub namespaces: Vec<String>,
    #[serde(default)]
    pub read: Vec<ReadActionModel>,
    #[serde(default)]
    pub history_read: Vec<HistoryReadActionModel>,
    #[serde(default)]
    pub test: Vec<TestActionModel>,
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadActionModel {
    pub id: String,
    #[serde(default)]
    pub interval: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryReadActionModel {
    pub id: String,
    #[serde(flatten)]
    pub details: ReadRawModifiedDetails,
    #[serde(default)]
    pub interval: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestActionModel {
    pub id: String,
    #[serde(default)]
    pub interval: u32,
}

/// A node of the simulated address space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub id: String,
    #[serde(default)]
    pub browse_name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: String,
    pub value: toml::Value,
    #[serde(default)]
    pub status: StatusCode,
    #[serde(default)]
    pub history: Vec<HistoryPointConfig>,
    #[serde(default)]
    pub history_status: Option<StatusCode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryPointConfig {
    pub value: toml::Value,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub status: StatusCode,
}

impl EndpointConfig {
    /// Actions declared for this endpoint: reads, then history reads, then tests.
    pub fn actions(&self) -> Vec<Action> {
        let reads = self
            .read
            .iter()
            .map(|m| Action::read(self.url.clone(), m.id.clone(), m.interval));
        let history = self.history_read.iter().map(|m| {
            Action::history_read(self.url.clone(), m.id.clone(), m.interval, m.details.clone())
        });
        let tests = self
            .test
            .iter()
            .map(|m| Action::test(self.url.clone(), m.id.clone(), m.interval));
        reads.chain(history).chain(tests).collect()
    }

    /// Build the in-process session serving this endpoint's simulated nodes.
    pub fn build_session(&self) -> Result<MemorySession, ConfigError> {
        let session = MemorySession::new(self.url.clone(), self.namespaces.clone());
        for node in &self.nodes {
            let node_id = self.node_id_of(node, &session)?;
            let browse_name = node
                .browse_name
                .clone()
                .unwrap_or_else(|| node_id.identifier.to_string());

            let mut memory_node = MemoryNode::new(
                node_id,
                browse_name,
                DataValue::new(variant_from_toml(&node.value), node.status),
            )
            .with_description(node.description.clone())
            .with_history(
                node.history
                    .iter()
                    .map(|p| {
                        DataValue::new(variant_from_toml(&p.value), p.status)
                            .with_source_timestamp(p.timestamp)
                    })
                    .collect(),
            );
            if let Some(display_name) = &node.display_name {
                memory_node.display_name = display_name.clone();
            }
            if let Some(status) = node.history_status {
                memory_node = memory_node.with_history_status(status);
            }
            session.insert_node(memory_node);
        }
        Ok(session)
    }

    /// Namespace URIs map through the session's own table, so a node is
    /// stored under the index resolution will produce.
    fn node_id_of(
        &self,
        node: &NodeConfig,
        session: &MemorySession,
    ) -> Result<NodeId, ConfigError> {
        let expanded: ExpandedNodeId =
            node.id.parse().map_err(|source| ConfigError::InvalidNode {
                endpoint: self.url.to_string(),
                id: node.id.clone(),
                source,
            })?;
        let namespace = match expanded.namespace {
            NamespaceRef::Index(i) => i,
            NamespaceRef::Uri(uri) => session
                .namespace_index(&uri)
                .ok_or_else(|| ConfigError::UnknownNamespace {
                    endpoint: self.url.to_string(),
                    id: node.id.clone(),
                    uri: uri.clone(),
                })?,
        };
        Ok(NodeId::new(namespace, expanded.identifier))
    }
}

/// Map a TOML value onto a variant. Tables have no known encoding and become
/// opaque extension objects.
pub fn variant_from_toml(value: &toml::Value) -> Variant {
    match value {
        toml::Value::String(s) => Variant::String(s.clone()),
        toml::Value::Integer(i) => Variant::Int64(*i),
        toml::Value::Float(f) => Variant::Double(*f),
        toml::Value::Boolean(b) => Variant::Boolean(*b),
        toml::Value::Datetime(dt) => match dt.to_string().parse::<DateTime<Utc>>() {
            Ok(ts) => Variant::DateTime(ts),
            Err(_) => Variant::String(dt.to_string()),
        },
        toml::Value::Array(items) => Variant::Array(items.iter().map(variant_from_toml).collect()),
        toml::Value::Table(_) => Variant::ExtensionObject {
            type_id: NodeId::numeric(0, 0),
            body: value.to_string().into_bytes(),
        },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionKind;
    use crate::session::Session;

    const EXAMPLE: &str = r#"
[csv]
enabled = true
path = "/var/lib/opcreader/values.csv"

[scheduler]
poll_interval_ms = 250
max_in_flight_per_session = 1

[logging]
level = "debug"
json = true

[[endpoints]]
url = "opc.tcp://plc01:4840/"
namespaces = ["urn:plant"]

[[endpoints.read]]
id = "ns=1;s=Temperature"
interval = 10

[[endpoints.history_read]]
id = "nsu=urn:plant;s=Temperature"
start_time = "2024-05-01T00:00:00Z"
end_time = "2024-05-02T00:00:00Z"
num_values_per_node = 100

[[endpoints.test]]
id = "i=2258"
interval = 60

[[endpoints.nodes]]
id = "nsu=urn:plant;s=Temperature"
display_name = "Boiler temperature"
value = 21.5

[[endpoints.nodes.history]]
value = 20.0
timestamp = "2024-05-01T06:00:00Z"

[[endpoints.nodes.history]]
value = 20.5
timestamp = "2024-05-01T07:00:00Z"
status = "Uncertain"

[[endpoints.nodes]]
id = "i=2258"
value = { year = 2024 }
"#;

    #[test]
    fn test_defaults_are_sane() {
        let cfg = AppConfig::default();
        assert!(!cfg.csv.enabled);
        assert_eq!(cfg.csv.path, PathBuf::from("opcreader.csv"));
        assert_eq!(cfg.scheduler.poll_interval_ms, 1000);
        assert_eq!(cfg.scheduler.max_in_flight_per_session, 4);
        assert_eq!(cfg.logging.level, "info");
        assert!(!cfg.logging.json);
        assert!(cfg.endpoints.is_empty());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_parse_example_toml() {
        let cfg: AppConfig = toml::from_str(EXAMPLE).unwrap();
        cfg.validate().unwrap();

        assert!(cfg.csv.enabled);
        assert_eq!(cfg.scheduler.max_in_flight_per_session, 1);
        assert_eq!(cfg.logging.level, "debug");
        assert_eq!(cfg.endpoints.len(), 1);

        let ep = &cfg.endpoints[0];
        assert_eq!(ep.read[0].interval, 10);
        assert_eq!(ep.history_read[0].details.num_values_per_node, 100);
        assert!(!ep.history_read[0].details.return_bounds);
        assert_eq!(ep.history_read[0].interval, 0);
        assert_eq!(ep.nodes[0].history[1].status, StatusCode::UNCERTAIN);

        let actions = ep.actions();
        assert_eq!(actions.len(), 3);
        assert!(matches!(actions[0].kind(), ActionKind::Read(_)));
        assert!(matches!(actions[1].kind(), ActionKind::HistoryRead(_)));
        assert!(matches!(actions[2].kind(), ActionKind::Test(_)));
    }

    #[tokio::test]
    async fn test_build_session_from_nodes() {
        let cfg: AppConfig = toml::from_str(EXAMPLE).unwrap();
        let session = cfg.endpoints[0].build_session().unwrap();

        let node = session.resolve_node_id("ns=1;s=Temperature").await.unwrap();
        let info = session.read_node(&node).await.unwrap();
        assert_eq!(info.display_name, "Boiler temperature");
        assert_eq!(info.browse_name, "s=Temperature");

        let value = session.read_value(&node).await.unwrap();
        assert_eq!(value.value, Variant::Double(21.5));

        let clock = session.resolve_node_id("i=2258").await.unwrap();
        let value = session.read_value(&clock).await.unwrap();
        assert!(matches!(value.value, Variant::ExtensionObject { .. }));
    }

    #[tokio::test]
    async fn test_standard_namespace_in_table_keeps_indexes_aligned() {
        let toml_str = r#"
[[endpoints]]
url = "opc.tcp://plc01:4840/"
namespaces = ["http://opcfoundation.org/UA/", "urn:plant"]

[[endpoints.nodes]]
id = "nsu=urn:plant;s=Temperature"
value = 21.5
"#;
        let cfg: AppConfig = toml::from_str(toml_str).unwrap();
        cfg.validate().unwrap();

        let session = cfg.endpoints[0].build_session().unwrap();
        let by_uri = session
            .resolve_node_id("nsu=urn:plant;s=Temperature")
            .await
            .unwrap();
        let by_index = session.resolve_node_id("ns=1;s=Temperature").await.unwrap();
        assert_eq!(by_uri, by_index);
        assert_eq!(session.read_value(&by_uri).await.unwrap().value, Variant::Double(21.5));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let cfg: AppConfig = toml::from_str("[csv]\nenabled = true\n").unwrap();
        assert!(cfg.csv.enabled);
        assert_eq!(cfg.csv.path, PathBuf::from("opcreader.csv"));
        assert_eq!(cfg.scheduler.poll_interval_ms, 1000);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn test_validate_rejects_duplicates_and_zero_limits() {
        let dup = r#"
[[endpoints]]
url = "opc.tcp://plc01:4840/"
[[endpoints]]
url = "opc.tcp://plc01:4840/"
"#;
        let cfg: AppConfig = toml::from_str(dup).unwrap();
        assert!(matches!(cfg.validate(), Err(ConfigError::DuplicateEndpoint(_))));

        let mut cfg = AppConfig::default();
        cfg.scheduler.max_in_flight_per_session = 0;
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidSetting(_))));
    }

    #[test]
    fn test_validate_rejects_bad_endpoints_and_nodes() {
        let cfg: AppConfig =
            toml::from_str("[[endpoints]]\nurl = \"mailto:ops@example.com\"\n").unwrap();
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidEndpoint(_))));

        let bad_node = r#"
[[endpoints]]
url = "opc.tcp://plc01:4840/"
[[endpoints.nodes]]
id = "nsu=urn:missing;i=1"
value = 1
"#;
        let cfg: AppConfig = toml::from_str(bad_node).unwrap();
        assert!(matches!(cfg.validate(), Err(ConfigError::UnknownNamespace { .. })));
    }

    #[test]
    fn test_relative_url_is_a_parse_error() {
        let result: Result<AppConfig, _> = toml::from_str("[[endpoints]]\nurl = \"plc01/data\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("opcreader.toml");
        std::fs::write(&path, EXAMPLE).unwrap();

        let cfg = AppConfig::load(&path).unwrap();
        assert_eq!(cfg.endpoints[0].url.as_str(), "opc.tcp://plc01:4840/");
    }

    #[test]
    fn test_load_missing_file_errors() {
        let result = AppConfig::load(Path::new("/nonexistent/path/opcreader.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_open_sink_respects_flag() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut csv = CsvConfig {
            enabled: false,
            path: dir.path().join("values.csv"),
        };
        assert!(csv.open_sink().unwrap().is_none());
        assert!(!csv.path.exists());

        csv.enabled = true;
        assert!(csv.open_sink().unwrap().is_some());
        assert!(csv.path.exists());
    }

    #[test]
    fn test_serialization_roundtrip() {
        let cfg = AppConfig::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let roundtripped: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(cfg.csv.path, roundtripped.csv.path);
        assert_eq!(
            cfg.scheduler.max_in_flight_per_session,
            roundtripped.scheduler.max_in_flight_per_session
        );
    }
}
