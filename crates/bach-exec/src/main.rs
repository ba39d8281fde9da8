//! bach-exec binary
//!
//! Generates a synthetic batch, runs it through the parallel executor and
//! prints what happened.

mod cli;
mod vm;
mod workload;

use anyhow::Result;
use bach_core::{BatchError, BatchReport, CollectingSink, ExecutionConfig, ParallelExecutor};
use bach_primitives::H256;
use bach_scheduler::CombinedAccess;
use bach_types::{ChainContext, TxStatus};
use cli::Cli;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use vm::SimulatedVm;
use workload::WorkloadParams;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let config = build_config(&cli)?;
    tracing::info!(?config, "Execution config");

    let transactions = workload::generate(&WorkloadParams {
        transactions: cli.transactions,
        accounts: cli.accounts,
        hot_ratio: cli.hot_ratio,
        fail_ratio: cli.fail_ratio,
        seed: cli.seed,
    });

    let vm = SimulatedVm::new(Duration::from_millis(cli.exec_delay_ms));
    let executor = ParallelExecutor::new(vm, CombinedAccess, config);
    let context = ChainContext::new(cli.chain_id, 1, H256::ZERO, H256::ZERO);
    let sink = Arc::new(CollectingSink::new());

    let mut handle = executor.spawn_batch(context, transactions, sink.clone())?;
    handle.start()?;
    let report = match handle.wait().await {
        Ok(report) => report,
        Err(BatchError::Forwarding { failed, report }) => {
            tracing::error!("{} results were not forwarded", failed.len());
            *report
        }
        Err(e) => return Err(e.into()),
    };

    print_summary(&report, sink.len());
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report.results)?);
    }

    Ok(())
}

/// Config file (if any) with CLI overrides applied
fn build_config(cli: &Cli) -> Result<ExecutionConfig> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ExecutionConfig::default(),
    };
    if let Some(timeout_ms) = cli.timeout_ms {
        config.batch_timeout_ms = Some(timeout_ms);
    }
    if let Some(limit) = cli.max_parallel_groups {
        config.max_parallel_groups = limit;
    }
    Ok(config)
}

/// Load execution configuration from file
fn load_config(path: &Path) -> Result<ExecutionConfig> {
    tracing::info!("Loading execution config from {:?}", path);
    let content = std::fs::read_to_string(path)?;
    let config = ExecutionConfig::from_json(&content)?;
    Ok(config)
}

fn print_summary(report: &BatchReport, forwarded: usize) {
    let stats = &report.stats;
    println!(
        "Executed {} transactions in {} groups (largest {}, parallelism {:.2}) in {:?}",
        report.len(),
        stats.groups,
        stats.largest_group,
        stats.parallelism(),
        report.elapsed
    );
    for status in [
        TxStatus::Success,
        TxStatus::Failed,
        TxStatus::Exception,
        TxStatus::WorkerFault,
        TxStatus::TimedOut,
        TxStatus::Aborted,
    ] {
        let count = report.count(status);
        if count > 0 {
            println!("  {:<13} {}", status.to_string(), count);
        }
    }
    println!("  forwarded     {}", forwarded);
    if !report.faulted_groups.is_empty() {
        println!("  faulted groups: {:?}", report.faulted_groups);
    }
    if report.timed_out {
        println!("  batch deadline exceeded");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bach_scheduler::ConflictPolicy;
    use clap::Parser;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config() {
        let mut file = NamedTempFile::new().unwrap();
        let config_json = r#"{
            "batch_timeout_ms": 2000,
            "max_parallel_groups": 16,
            "conflict_policy": "writes_only"
        }"#;
        file.write_all(config_json.as_bytes()).unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.batch_timeout_ms, Some(2000));
        assert_eq!(config.max_parallel_groups, 16);
        assert_eq!(config.conflict_policy, ConflictPolicy::WritesOnly);
    }

    #[test]
    fn test_load_config_rejects_bad_json() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_cli_overrides_config() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(br#"{ "batch_timeout_ms": 10, "max_parallel_groups": 2 }"#)
            .unwrap();
        let path = file.path().to_string_lossy().to_string();

        let cli = Cli::parse_from([
            "bach-exec",
            "--config",
            path.as_str(),
            "--timeout-ms",
            "99",
        ]);
        let config = build_config(&cli).unwrap();
        assert_eq!(config.batch_timeout_ms, Some(99));
        assert_eq!(config.max_parallel_groups, 2);
    }

    #[tokio::test]
    async fn test_workload_runs_to_completion() {
        let txs = workload::generate(&WorkloadParams {
            transactions: 200,
            accounts: 32,
            hot_ratio: 0.1,
            fail_ratio: 0.2,
            seed: 9,
        });
        let executor = ParallelExecutor::new(
            SimulatedVm::new(Duration::ZERO),
            CombinedAccess,
            ExecutionConfig::default(),
        );
        let sink = Arc::new(CollectingSink::new());

        let report = executor
            .execute(ChainContext::genesis(1), txs, sink.clone())
            .await
            .unwrap();

        assert_eq!(report.len(), 200);
        assert_eq!(sink.len(), 200);
        assert_eq!(
            report.count(TxStatus::Success) + report.count(TxStatus::Failed),
            200
        );
    }
}
