//! Sentinel CLI: dataset maintenance commands.
//!
//! Commands:
//! - `harvest` runs one incremental batch (prices, financials, disclosures)
//! - `sync-master` reconciles the entity master against an exchange listing
//! - `sync-index` records index membership changes from a constituent file
//! - `sync-disclosures` runs the weekly disclosure extraction
//! - `status` reports registry, membership and checkpoint state
//! - `config` prints the effective configuration

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use sentinel_core::data::{CircuitBreaker, Credential, ExtractDirSource, YahooProvider};
use sentinel_core::store::DataLayout;
use sentinel_runner::{
    collect_status, load_constituents, load_listing, sync_index, sync_master, Clock,
    DisclosureSync, DisclosureSyncOutcome, FixedClock, RunCoordinator, SentinelConfig, Sources,
    SystemClock,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(
    name = "sentinel",
    about = "Sentinel: incremental maintenance of a long-lived equity dataset"
)]
struct Cli {
    /// Path to the TOML config file. A missing file means all defaults.
    #[arg(long, global = true, default_value = "sentinel.toml")]
    config: PathBuf,

    /// Override `data_dir` from the config file.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Update the least recently refreshed entities.
    Harvest {
        /// Batch size. Defaults to `harvest.max_entities_per_run`.
        #[arg(long)]
        limit: Option<usize>,

        /// Treat this date (YYYY-MM-DD) as today.
        #[arg(long)]
        today: Option<String>,
    },
    /// Reconcile the entity master against an exchange listing CSV.
    SyncMaster {
        /// Listing file (English or exchange headers).
        listing: PathBuf,
    },
    /// Record index membership changes from a constituent CSV.
    SyncIndex {
        /// Constituent file.
        constituents: PathBuf,

        /// Index name. Defaults to `index.default_name`.
        #[arg(long)]
        index: Option<String>,
    },
    /// Extract qualitative disclosures for every active entity (weekly).
    SyncDisclosures {
        /// Run even if the last run was less than the configured interval ago.
        #[arg(long, default_value_t = false)]
        force: bool,

        /// Only process the first N active entities.
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Report registry, membership and checkpoint state.
    Status,
    /// Print the effective configuration as TOML.
    Config,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = SentinelConfig::from_file_or_default(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    match cli.command {
        Commands::Harvest { limit, today } => run_harvest(config, limit, today.as_deref()),
        Commands::SyncMaster { listing } => run_sync_master(&config, listing),
        Commands::SyncIndex {
            constituents,
            index,
        } => run_sync_index(&config, constituents, index),
        Commands::SyncDisclosures { force, limit } => run_sync_disclosures(&config, force, limit),
        Commands::Status => run_status(&config),
        Commands::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

fn clock(today: Option<&str>) -> Result<Box<dyn Clock>> {
    Ok(match today {
        Some(s) => Box::new(FixedClock(
            NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("invalid date '{s}'"))?,
        )),
        None => Box::new(SystemClock),
    })
}

fn run_harvest(mut config: SentinelConfig, limit: Option<usize>, today: Option<&str>) -> Result<()> {
    if let Some(limit) = limit {
        config.harvest.max_entities_per_run = limit;
    }
    config.validate()?;
    let today = clock(today)?.today();

    let circuit_breaker = Arc::new(CircuitBreaker::default_provider());
    let yahoo = YahooProvider::new(circuit_breaker)?;
    let extracts = ExtractDirSource::new(&config.disclosures.extract_dir);
    let credential = Credential::from_env(&config.credentials.disclosure_api_key_env);
    if credential.is_none() {
        info!(
            var = %config.credentials.disclosure_api_key_env,
            "no disclosure credential; qualitative updates will be skipped"
        );
    }

    let sources = Sources {
        prices: &yahoo,
        actions: &yahoo,
        financials: Some(&yahoo),
        disclosures: Some(&extracts),
    };
    let summary = RunCoordinator::new(&config, sources)
        .with_credential(credential)
        .harvest(today)?;

    println!("{summary}");
    if summary.aborted {
        std::process::exit(1);
    }
    Ok(())
}

fn run_sync_master(config: &SentinelConfig, listing: PathBuf) -> Result<()> {
    let today = SystemClock.today();
    let listed = load_listing(&listing)?;
    let report = sync_master(&DataLayout::new(&config.data_dir), &listed, today)?;

    println!("Listing rows:  {}", report.listed);
    println!("Total:         {}", report.total);
    println!("Active:        {}", report.active);
    println!("Newly listed:  {}", report.newly_listed.len());
    println!("Deactivated:   {}", report.deactivated.len());
    for code in &report.deactivated {
        println!("  - {code}");
    }
    Ok(())
}

fn run_sync_index(config: &SentinelConfig, constituents: PathBuf, index: Option<String>) -> Result<()> {
    let today = SystemClock.today();
    let index = index.unwrap_or_else(|| config.index.default_name.clone());
    let observed = load_constituents(&constituents)?;
    let report = sync_index(&DataLayout::new(&config.data_dir), &observed, &index, today)?;

    println!("{}: {} constituents observed", report.index_name, report.observed);
    if report.joined.is_empty() && report.left.is_empty() {
        println!("No membership changes.");
    }
    for code in &report.joined {
        println!("  + {code}");
    }
    for code in &report.left {
        println!("  - {code}");
    }
    Ok(())
}

fn run_sync_disclosures(config: &SentinelConfig, force: bool, limit: Option<usize>) -> Result<()> {
    config.validate()?;
    let today = SystemClock.today();
    let extracts = ExtractDirSource::new(&config.disclosures.extract_dir);
    let credential = Credential::from_env(&config.credentials.disclosure_api_key_env);

    let outcome = DisclosureSync::new(config, &extracts, credential).run(today, force, limit)?;
    match outcome {
        DisclosureSyncOutcome::NoCredential => println!(
            "Skipped: set {} to enable disclosure extraction.",
            config.credentials.disclosure_api_key_env
        ),
        DisclosureSyncOutcome::NotDue { last_run, next_due } => {
            println!("Skipped: last run {last_run}, next due {next_due} (use --force to run now).")
        }
        DisclosureSyncOutcome::Completed { summary, .. } => println!("{summary}"),
    }
    Ok(())
}

fn run_status(config: &SentinelConfig) -> Result<()> {
    let report = collect_status(&DataLayout::new(&config.data_dir))?;
    println!("Data directory:  {}", config.data_dir.display());
    print!("{report}");
    Ok(())
}
