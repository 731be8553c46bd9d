//! # CLI Interface
//!
//! Defines the command-line argument structure for `hub-node` using
//! `clap` derive. Supports three subcommands: `run`, `status`, and
//! `version`. Every `run` flag can also be set through a `HUB_*`
//! environment variable.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use hub_protocol::config::{HASHES_PER_FETCH, MAX_VALUES_RETURNED_PER_CALL, SYNC_THRESHOLD_SECS};
use hub_protocol::storage::StoreConfig;
use hub_protocol::sync::SyncConfig;
use hub_protocol::HubConfig;

use crate::logging::LogFormat;

/// Social-graph Hub node.
///
/// Stores user messages in CRDT sets, serves the Merkle-trie sync
/// protocol over HTTP, and periodically reconciles with its peers.
#[derive(Parser, Debug)]
#[command(
    name = "hub-node",
    about = "Social-graph Hub node",
    version,
    propagate_version = true
)]
pub struct HubNodeCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the Hub.
    Run(RunArgs),
    /// Query the status of a running Hub via its HTTP endpoint.
    Status(StatusArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Directory holding the message database. Created on first run.
    #[arg(long, short = 'd', env = "HUB_DATA_DIR", default_value = ".hub")]
    pub data_dir: PathBuf,

    /// Port for the HTTP API and the sync endpoint.
    #[arg(long, env = "HUB_HTTP_PORT", default_value_t = 2283)]
    pub http_port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "HUB_METRICS_PORT", default_value_t = 2284)]
    pub metrics_port: u16,

    /// Peers to sync from, as `host:port` of their HTTP API.
    #[arg(long = "peer", env = "HUB_PEERS", value_delimiter = ',')]
    pub peers: Vec<String>,

    /// Seconds between sync rounds.
    #[arg(long, env = "HUB_SYNC_INTERVAL_SECS", default_value_t = 30)]
    pub sync_interval_secs: u64,

    /// Granularity, in seconds, of the snapshot timestamp.
    #[arg(long, env = "HUB_SYNC_THRESHOLD_SECS", default_value_t = SYNC_THRESHOLD_SECS)]
    pub sync_threshold_secs: u32,

    /// Subtree size fetched in one request during sync, at most 1000.
    #[arg(
        long,
        env = "HUB_HASHES_PER_FETCH",
        default_value_t = HASHES_PER_FETCH,
        value_parser = parse_hashes_per_fetch
    )]
    pub hashes_per_fetch: usize,

    /// Per-request timeout for peer calls, in seconds.
    #[arg(long, env = "HUB_REQUEST_TIMEOUT_SECS", default_value_t = 10)]
    pub request_timeout_secs: u64,

    /// Log output format: `pretty` or `json`.
    #[arg(long, env = "HUB_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,
}

impl RunArgs {
    pub fn log_format(&self) -> LogFormat {
        LogFormat::from_str_lossy(&self.log_format)
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("db")
    }

    pub fn hub_config(&self) -> HubConfig {
        HubConfig {
            db_path: Some(self.db_path()),
            store: StoreConfig::default(),
            sync: SyncConfig {
                sync_threshold_secs: self.sync_threshold_secs,
                hashes_per_fetch: self.hashes_per_fetch,
                request_timeout: Duration::from_secs(self.request_timeout_secs),
                ..SyncConfig::default()
            },
        }
    }
}

/// Peers cap every list reply at `MAX_VALUES_RETURNED_PER_CALL`.
fn parse_hashes_per_fetch(s: &str) -> Result<usize, String> {
    let n: usize = s.parse().map_err(|e| format!("{}", e))?;
    if n == 0 || n > MAX_VALUES_RETURNED_PER_CALL {
        return Err(format!(
            "must be between 1 and {}",
            MAX_VALUES_RETURNED_PER_CALL
        ));
    }
    Ok(n)
}

/// Arguments for the `status` subcommand.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// HTTP endpoint of the running Hub.
    #[arg(long, env = "HUB_URL", default_value = "http://127.0.0.1:2283")]
    pub url: String,
}
