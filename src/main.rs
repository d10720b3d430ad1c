use std::fs;
use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Parser;
use color_eyre::eyre::{eyre, Result, WrapErr};
use env_logger::Env;
use log::info;

use nromerge::archive::{self, Fetcher};
use nromerge::merge;
use nromerge::output;
use nromerge::settings::Settings;

/// Merge the five RIRs' daily delegation statistics into one aggregated view
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Date of the statistics to merge (YYYY-MM-DD or YYYYMMDD)
    date: String,

    /// Output directory for the consolidated statistics and audit report
    #[arg(short, long, default_value = "nrostats_output")]
    output: PathBuf,

    /// Path to an optional YAML settings file
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Number of parallel workers (0 = auto-detect)
    #[arg(short = 'j', long, default_value = "0")]
    threads: usize,

    /// Serve snapshots from the cache only, without touching the network
    #[arg(long)]
    offline: bool,
}

fn parse_date(input: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(input, "%Y%m%d"))
        .map_err(|_| eyre!("'{input}' is not a date in YYYY-MM-DD or YYYYMMDD form"))
}

fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Parse command-line arguments
    let args = Args::parse();

    // Initialize logging with the requested filter level
    env_logger::Builder::from_env(Env::default().default_filter_or(&args.log_level)).init();

    // Set thread pool size
    if args.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(args.threads)
            .build_global()
            .wrap_err("Failed to configure thread pool")?;
    }

    let date = parse_date(&args.date)?;

    let mut settings = match &args.settings {
        Some(path) => Settings::load(path)
            .wrap_err_with(|| format!("Failed to load settings from '{}'", path.display()))?,
        None => Settings::default(),
    };
    if args.offline {
        settings.offline = true;
    }

    info!("Merging NRO statistics for {date}");
    info!("Statistics mirror: {}", settings.mirror_url);
    info!("Output directory: {:?}", args.output);

    fs::create_dir_all(&args.output)
        .wrap_err_with(|| format!("Failed to create output directory '{}'", args.output.display()))?;

    let fetcher = Fetcher::new(&settings).wrap_err("Failed to set up the snapshot fetcher")?;

    // Locate and parse each registry's nearest snapshot
    let (streams, notes) = archive::collect_streams(&fetcher, &settings, date);

    // Aggregate both address families
    let mut outcome = merge::merge(streams);
    outcome.audit.snapshots = notes;

    output::write_outputs(&outcome, &args.output, date)?;
    outcome.audit.log_summary();

    info!("Merge completed successfully");
    Ok(())
}
