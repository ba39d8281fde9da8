//! CLI argument parsing for bach-exec

use clap::Parser;
use std::path::PathBuf;

/// Execute a synthetic transaction batch in parallel
#[derive(Parser, Debug, Clone)]
#[command(name = "bach-exec")]
#[command(about = "Execute a synthetic transaction batch in parallel")]
#[command(version)]
pub struct Cli {
    /// Number of transactions in the batch
    #[arg(long, default_value = "1000")]
    pub transactions: usize,

    /// Number of distinct accounts sending and receiving transfers
    #[arg(long, default_value = "256")]
    pub accounts: usize,

    /// Fraction of transactions that also write one shared hot slot (0.0 - 1.0)
    #[arg(long, default_value = "0.0", value_parser = parse_ratio)]
    pub hot_ratio: f64,

    /// Fraction of transactions the simulated VM rejects (0.0 - 1.0)
    #[arg(long, default_value = "0.0", value_parser = parse_ratio)]
    pub fail_ratio: f64,

    /// Workload RNG seed
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Simulated execution time per transaction in milliseconds
    #[arg(long, default_value = "0")]
    pub exec_delay_ms: u64,

    /// Chain ID
    #[arg(long, default_value = "1337")]
    pub chain_id: u64,

    /// Execution config file (JSON, optional)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the config's batch deadline
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Override the config's parallel group limit (0 = unbounded)
    #[arg(long)]
    pub max_parallel_groups: Option<usize>,

    /// Print every result as JSON after the summary
    #[arg(long)]
    pub json: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

fn parse_ratio(s: &str) -> Result<f64, String> {
    let ratio: f64 = s.parse().map_err(|e| format!("{e}"))?;
    if (0.0..=1.0).contains(&ratio) {
        Ok(ratio)
    } else {
        Err(format!("{s} is not a ratio between 0.0 and 1.0"))
    }
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
