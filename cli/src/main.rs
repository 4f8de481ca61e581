use std::fs;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use logkv_kernel::config::KvConfig;
use logkv_kernel::handle;
use logkv_kernel::log::CacheStats;
use logkv_kernel::KvAdapter;

mod workload;

use workload::{run, Operation, OperationReport};

/// LogKV workload driver
#[derive(Parser, Debug)]
#[command(name = "logkv")]
#[command(about = "Replay a key-value workload against an append-only log", long_about = None)]
struct Cli {
    /// Path to config JSON
    #[arg(long)]
    config: Option<String>,

    /// Path to workload JSON
    #[arg(long)]
    workload: String,
}

/// Wrapper for JSON output
#[derive(Debug, Serialize)]
struct CliOutput {
    operations: Vec<OperationReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cache: Option<CacheStats>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // ----------------------------
    // Load config
    // ----------------------------
    let config = match cli.config {
        Some(path) => KvConfig::from_json_file(&path)
            .with_context(|| format!("loading config {path}"))?,
        None => KvConfig::default_config(),
    };
    tracing::info!(?config, "starting workload driver");

    // ----------------------------
    // Load workload
    // ----------------------------
    let data = fs::read_to_string(&cli.workload)
        .with_context(|| format!("reading workload {}", cli.workload))?;
    let operations: Vec<Operation> =
        serde_json::from_str(&data).context("parsing workload")?;

    // ----------------------------
    // Open log and replay
    // ----------------------------
    handle::install_global(config.log)?;
    let mut adapter = KvAdapter::open(config.adapter)?;

    let output = CliOutput {
        operations: run(&mut adapter, operations),
        cache: adapter.log().cache_stats(),
    };

    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
