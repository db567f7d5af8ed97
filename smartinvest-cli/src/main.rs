//! SmartInvest CLI: warehouse loading commands.
//!
//! Commands:
//! - `load-market`: load the market hand-off directory into the warehouse
//! - `load-macro`: load the macro hand-off directory into the warehouse
//! - `load`: market then macro, in one process
//! - `init-schema`: create the warehouse namespace and tables if absent
//! - `check`: verify the warehouse connection

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use smartinvest_core::domain::Domain;
use smartinvest_loader::{
    open_store, run_domain, LoadProgress, LoaderConfig, NoProgress, RunReport, StdoutProgress,
    WarehouseStore,
};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "smartinvest",
    about = "SmartInvest warehouse loader: market and macro batches into a star schema"
)]
struct Cli {
    /// Loader config (TOML). Built-in defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print run reports as JSON on stdout instead of progress lines.
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    /// Create the warehouse schema before loading, if absent.
    #[arg(long, global = true, default_value_t = false)]
    create_schema: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load market price batches.
    LoadMarket,
    /// Load macroeconomic series batches.
    LoadMacro,
    /// Load market then macro batches.
    Load,
    /// Create the warehouse namespace and tables if absent.
    InitSchema,
    /// Check warehouse connectivity.
    Check,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = match &cli.config {
        Some(path) => LoaderConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => LoaderConfig::default(),
    };

    match cli.command {
        Commands::LoadMarket => run_load(&config, &[Domain::Market], cli.json, cli.create_schema),
        Commands::LoadMacro => run_load(&config, &[Domain::Macro], cli.json, cli.create_schema),
        Commands::Load => run_load(
            &config,
            &[Domain::Market, Domain::Macro],
            cli.json,
            cli.create_schema,
        ),
        Commands::InitSchema => run_init_schema(&config),
        Commands::Check => run_check(&config),
    }
}

/// Logs go to stderr so `--json` output on stdout stays machine-readable.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn connect(config: &LoaderConfig) -> Result<Box<dyn WarehouseStore>> {
    let mut store = open_store(config)?;
    store.ping().context("warehouse connectivity check failed")?;
    info!(backend = store.backend(), "warehouse reachable");
    Ok(store)
}

fn run_load(config: &LoaderConfig, domains: &[Domain], json: bool, create_schema: bool) -> Result<()> {
    // Configuration problems surface before any batch is attempted.
    for &domain in domains {
        config.require_source_dir(domain)?;
    }
    config.require_persistent_backend()?;
    let mut store = connect(config)?;
    if create_schema {
        store.ensure_schema()?;
    }

    let progress: Box<dyn LoadProgress> = if json {
        Box::new(NoProgress)
    } else {
        Box::new(StdoutProgress)
    };

    let mut reports: Vec<RunReport> = Vec::with_capacity(domains.len());
    for &domain in domains {
        let report = run_domain(store.as_mut(), config, domain, progress.as_ref())?;
        let aborted = report.aborted;
        reports.push(report);
        if aborted {
            break;
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    }

    if let Some(report) = reports.iter().find(|r| r.aborted) {
        bail!(
            "{} load aborted after a failed batch ({} loaded, {} skipped)",
            report.domain,
            report.loaded(),
            report.skipped()
        );
    }
    Ok(())
}

fn run_init_schema(config: &LoaderConfig) -> Result<()> {
    let mut store = connect(config)?;
    store.ensure_schema().context("creating warehouse schema")?;
    println!("Warehouse schema ready ({}, namespace {})", store.backend(), config.namespace);
    Ok(())
}

fn run_check(config: &LoaderConfig) -> Result<()> {
    let store = connect(config)?;
    println!("Connection OK ({})", store.backend());
    Ok(())
}
