//! Command-line interface for the Tafel pipeline.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::processors::ingest::{ingest_folder, MeasurementResult, TimeWindow};
use crate::processors::timestamp::{normalize_directory, TAG_FORMAT};
use crate::AnalysisConfig;

/// Accepted spellings for `--start` / `--end`.
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", TAG_FORMAT];

#[derive(Parser)]
#[command(name = "tafel-pipeline")]
#[command(about = "Overpotential and Tafel slope from TRScan/EIS exports", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Prefix untagged CSV files with their modification-time tag
    Normalize {
        /// Directory containing measurement CSV files
        directory: PathBuf,
        /// Preview renames without touching files
        #[arg(long)]
        dry_run: bool,
    },

    /// Extract operating points and compute the Tafel slope
    Analyze {
        /// Directory containing measurement CSV files
        directory: PathBuf,
        /// Window start (inclusive), e.g. "2024-03-01 08:00:00"
        #[arg(long, value_parser = parse_datetime)]
        start: NaiveDateTime,
        /// Window end (exclusive)
        #[arg(long, value_parser = parse_datetime)]
        end: NaiveDateTime,
        /// Directory for vac.csv, jr.csv, overpotential.csv and summary.yaml
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        /// Exit successfully even if files are missing or the slope is undefined
        #[arg(long)]
        allow_incomplete: bool,
    },
}

fn parse_datetime(value: &str) -> std::result::Result<NaiveDateTime, String> {
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .ok_or_else(|| {
            format!(
                "invalid time {:?}; expected YYYY-MM-DD HH:MM:SS or YYYY_MM_DD_HH_MM_SS",
                value
            )
        })
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<62} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 39 {
            let head: String = value.chars().take(36).collect();
            format!("{}...", head)
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<39} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    // Load config
    let config = match &cli.config {
        Some(path) => match AnalysisConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                warn!("Failed to load config from {}: {}, using defaults", path.display(), e);
                AnalysisConfig::default()
            }
        },
        None => AnalysisConfig::default(),
    };

    let outcome = match cli.command {
        Commands::Normalize { directory, dry_run } => cmd_normalize(&directory, dry_run),
        Commands::Analyze {
            directory,
            start,
            end,
            output_dir,
            allow_incomplete,
        } => cmd_analyze(&directory, start, end, output_dir, allow_incomplete, &config),
    };

    if let Err(e) = outcome {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn cmd_normalize(directory: &Path, dry_run: bool) -> Result<()> {
    let start = Instant::now();

    if dry_run {
        println!("DRY RUN: No files will be renamed");
    }

    let spinner = create_spinner("Tagging CSV files...");
    let report = normalize_directory(directory, dry_run);
    spinner.finish_and_clear();
    let report = report.with_context(|| format!("Failed to normalize {}", directory.display()))?;

    for renamed in &report.renamed {
        let verb = if dry_run { "Would rename" } else { "Renamed" };
        println!(
            "{}: {} -> {}",
            verb,
            renamed.from.display(),
            renamed.to.display()
        );
    }
    for failure in &report.failed {
        eprintln!("Failed to tag {}: {}", failure.path.display(), failure.reason);
    }

    print_summary(
        "Normalize Complete",
        &[
            ("Directory", directory.display().to_string()),
            ("Renamed", report.renamed.len().to_string()),
            ("Already tagged", report.already_tagged.to_string()),
            ("Failed", report.failed.len().to_string()),
            ("Dry run", dry_run.to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );

    Ok(())
}

fn cmd_analyze(
    directory: &Path,
    start: NaiveDateTime,
    end: NaiveDateTime,
    output_dir: Option<PathBuf>,
    allow_incomplete: bool,
    config: &AnalysisConfig,
) -> Result<()> {
    use crate::core::writers;

    let timer = Instant::now();
    let window = TimeWindow::new(start, end)?;

    println!("Analyzing measurements...");
    println!("Directory: {}", directory.display());
    println!("Window: [{}, {})", start, end);

    let spinner = create_spinner("Reading TRScan and EIS files...");
    let result = ingest_folder(directory, &window, config);
    spinner.finish_and_clear();
    let result = result.with_context(|| format!("Failed to ingest {}", directory.display()))?;

    print_tables(&result);

    let written = match output_dir {
        Some(dir) => writers::write_measurement(&dir, &result)
            .with_context(|| format!("Failed to write results to {}", dir.display()))?,
        None => Vec::new(),
    };

    let slope = result
        .tafel_slope()
        .map(|s| format!("{:.6}", s))
        .unwrap_or_else(|| "undefined".to_string());

    print_summary(
        "Analysis Complete",
        &[
            ("Directory", directory.display().to_string()),
            ("Operating points", result.vac.len().to_string()),
            ("Resistance points", result.jr.len().to_string()),
            ("Joined currents", result.joined.len().to_string()),
            ("Tafel slope", slope),
            ("Missing files", result.missing.len().to_string()),
            ("Diagnostics", result.diagnostics.len().to_string()),
            ("Renamed files", result.renamed.len().to_string()),
            ("Files written", written.len().to_string()),
            ("Duration", format!("{:.2?}", timer.elapsed())),
        ],
    );

    for diagnostic in &result.diagnostics {
        match diagnostic.path() {
            Some(path) => warn!("{}: {:?}", path.display(), diagnostic),
            None => warn!("{:?}", diagnostic),
        }
    }

    if allow_incomplete {
        Ok(())
    } else {
        result.into_complete().map(|_| ()).map_err(Into::into)
    }
}

fn print_tables(result: &MeasurementResult) {
    println!();
    println!("{:>12} {:>14} {:>14} {:>14}", "current", "potential", "resistance", "overpotential");
    for row in &result.joined {
        println!(
            "{:>12} {:>14.6} {:>14.6} {:>14.6}",
            row.current, row.potential, row.resistance, row.overpotential
        );
    }
}
