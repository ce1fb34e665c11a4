//! Papergrab CLI
//!
//! Loads a records file, waits for the page agent to connect to the local
//! bridge, then runs the search-and-fetch workflow and prints the report.
//!
//! Usage:
//!   papergrab run --records records.json
//!   papergrab run --records records.json --max-attempts 60 --json
//!   papergrab check --records records.json

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::{info, warn};

use papergrab::bridge::{BridgeEngine, PortalBridge};
use papergrab::{
    AutomationMessage, Dispatcher, Page, PortalSelectors, RecordList, Runner, RunnerConfig,
    WaitConfig,
};

#[derive(Parser)]
#[command(name = "papergrab")]
#[command(about = "Drives a publications portal's search UI and fetches result artifacts")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the search-and-fetch workflow over a records file
    Run(RunArgs),
    /// Validate a records file without touching any page
    Check(CheckArgs),
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Path to the JSON records file
    #[clap(long, short = 'r')]
    records: PathBuf,

    /// Address the page agent connects to
    #[clap(long, default_value = "127.0.0.1:17475", env = "PAPERGRAB_BRIDGE_ADDR")]
    addr: String,

    /// Optional JSON file overriding the portal selectors
    #[clap(long)]
    selectors: Option<PathBuf>,

    /// Delay between polls while waiting for page elements, in milliseconds
    #[clap(long, default_value_t = 1000)]
    poll_interval_ms: u64,

    /// Maximum polls before a wait gives up
    #[clap(long, default_value_t = 30)]
    max_attempts: u32,

    /// How long to wait for the page agent to connect, in seconds
    #[clap(long, default_value_t = 120)]
    ready_timeout_secs: u64,

    /// Print the run report as JSON
    #[clap(long)]
    json: bool,
}

#[derive(Parser, Debug)]
struct CheckArgs {
    /// Path to the JSON records file
    #[clap(long, short = 'r')]
    records: PathBuf,
}

fn load_records(path: &Path) -> Result<RecordList> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read records file {}", path.display()))?;
    let records: RecordList = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse records file {}", path.display()))?;
    Ok(records)
}

fn load_selectors(path: &Path) -> Result<PortalSelectors> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read selectors file {}", path.display()))?;
    let selectors: PortalSelectors = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse selectors file {}", path.display()))?;
    Ok(selectors)
}

async fn run(args: RunArgs) -> Result<()> {
    let records = load_records(&args.records)?;
    let selectors = match &args.selectors {
        Some(path) => load_selectors(path)?,
        None => PortalSelectors::default(),
    };

    let bridge = PortalBridge::bind(&args.addr).await?;
    let page = Page::new(Arc::new(BridgeEngine::new(bridge)));

    let config = RunnerConfig {
        wait: WaitConfig {
            poll_interval: Duration::from_millis(args.poll_interval_ms),
            max_attempts: args.max_attempts,
        },
        selectors,
    };
    let runner = Runner::new(page.clone(), config)?;

    // ctrl-c stops the batch at the next poll tick or loop head
    let abort = runner.abort_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after the current step");
            abort.abort();
        }
    });

    let (tx, mut rx) = mpsc::channel(1);
    let dispatcher = Dispatcher::new(records, tx)?;

    info!(addr = %args.addr, "waiting for the page agent to connect");
    dispatcher
        .trigger(&page, Duration::from_secs(args.ready_timeout_secs))
        .await?;

    let Some(AutomationMessage::StartAutomation { payload }) = rx.recv().await else {
        anyhow::bail!("dispatch channel closed before delivering the run");
    };
    let report = runner.run(payload).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for r in &report.results {
            println!("{:<16} {:<60} {:?}", r.code, r.title, r.outcome);
        }
        println!(
            "fetched {}, partial {}, skipped {}",
            report.fetched(),
            report.partial(),
            report.skipped()
        );
    }
    Ok(())
}

fn check(args: CheckArgs) -> Result<()> {
    let records = load_records(&args.records)?;
    anyhow::ensure!(!records.is_empty(), "record list is empty");
    for record in &records {
        anyhow::ensure!(
            !record.titles.is_empty(),
            "record {} has no titles",
            record.code
        );
    }
    let titles: usize = records.iter().map(|r| r.titles.len()).sum();
    println!("{} records, {} titles", records.len(), titles);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => run(args).await,
        Commands::Check(args) => check(args),
    }
}
