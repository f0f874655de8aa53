use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use url::Url;

use opcreader::action::Action;
use opcreader::config::{AppConfig, LoggingConfig};
use opcreader::session::ReadRawModifiedDetails;

#[derive(Parser)]
#[command(
    name = "opcreader",
    about = "Scheduled OPC UA node polling with CSV persistence",
    version,
    long_about = None
)]
struct Cli {
    /// Configuration file (default: $OPCREADER_CONFIG, then /etc/opcreader/opcreader.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll all configured actions until done or interrupted
    Run,

    /// Read the current value of a node once
    Read {
        /// Endpoint URL of the server
        #[arg(long)]
        endpoint: Url,

        /// Node id, e.g. ns=2;s=Temperature
        #[arg(long)]
        node: String,
    },

    /// Read the raw history of a node over a time range
    HistoryRead {
        #[arg(long)]
        endpoint: Url,

        #[arg(long)]
        node: String,

        /// Start of the range (RFC 3339)
        #[arg(long)]
        start: DateTime<Utc>,

        /// End of the range (RFC 3339); before start reads backwards
        #[arg(long)]
        end: DateTime<Utc>,

        /// Maximum values to return, 0 for no limit
        #[arg(long, default_value = "0")]
        max_values: u32,

        /// Read modified values instead of raw ones
        #[arg(long)]
        read_modified: bool,

        /// Include bounding values
        #[arg(long)]
        return_bounds: bool,
    },

    /// Diagnostic read: show the value without persisting it
    Test {
        #[arg(long)]
        endpoint: Url,

        #[arg(long)]
        node: String,
    },

    /// List the configured actions
    List {
        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::load_or_default(),
    };
    init_tracing(&config.logging);

    match cli.command {
        Commands::Run => {
            tracing::info!(endpoints = config.endpoints.len(), "Starting opcreader");
            let totals = opcreader::run(&config).await?;
            tracing::info!(
                executed = totals.executed,
                succeeded = totals.succeeded,
                failed = totals.failed,
                "opcreader stopped"
            );
        }
        Commands::Read { endpoint, node } => {
            let mut action = Action::read(endpoint, node, 0);
            run_one_shot(&config, &mut action).await?;
            if let Some(dv) = action.last_value() {
                println!("{}", dv);
            }
        }
        Commands::HistoryRead {
            endpoint,
            node,
            start,
            end,
            max_values,
            read_modified,
            return_bounds,
        } => {
            let details = ReadRawModifiedDetails {
                start_time: start,
                end_time: end,
                is_read_modified: read_modified,
                num_values_per_node: max_values,
                return_bounds,
            };
            let mut action = Action::history_read(endpoint, node, 0, details);
            run_one_shot(&config, &mut action).await?;
            if let Some(dv) = action.last_value() {
                println!("last: {}", dv);
            }
        }
        Commands::Test { endpoint, node } => {
            let mut action = Action::test(endpoint, node, 0);
            run_one_shot(&config, &mut action).await?;
            if let Some(value) = action.observed_value() {
                println!("{}", value);
            }
        }
        Commands::List { json } => {
            let actions: Vec<Action> = config.endpoints.iter().flat_map(|e| e.actions()).collect();
            if json {
                let entries: Vec<serde_json::Value> = actions
                    .iter()
                    .map(|a| {
                        serde_json::json!({
                            "id": a.id(),
                            "type": a.kind().name(),
                            "endpoint": a.endpoint().as_str(),
                            "node": a.node_id(),
                            "interval": a.interval(),
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else if actions.is_empty() {
                println!("No actions configured.");
            } else {
                println!(
                    "{:<5} | {:<17} | {:<8} | {:<30} | Node",
                    "Id", "Type", "Interval", "Endpoint"
                );
                println!("{:-<5}-|-{:-<17}-|-{:-<8}-|-{:-<30}-|-{:-<20}", "", "", "", "", "");
                for a in &actions {
                    let interval = match a.interval() {
                        0 => "once".to_string(),
                        secs => format!("{}s", secs),
                    };
                    println!(
                        "{:03}   | {:<17} | {:<8} | {:<30} | {}",
                        a.id(),
                        a.kind().name(),
                        interval,
                        a.endpoint(),
                        a.node_id()
                    );
                }
            }
        }
    }

    Ok(())
}

async fn run_one_shot(config: &AppConfig, action: &mut Action) -> Result<()> {
    if !opcreader::run_once(config, action).await? {
        anyhow::bail!("action failed: {}", action);
    }
    Ok(())
}
