//! camscan - Scan a camera's filesystem for the files you care about.
//!
//! Usage:
//!   camscan scan <DIR>...    Find matching files on one or more cards
//!   camscan tree <DIR>...    List every file on one or more cards
//!   camscan --help           Show help
//!
//! Each directory is treated as one storage device of a local camera, so a
//! mounted memory card scans the same way a tethered camera does.

mod local;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, eyre};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use camscan_core::{ErrorPolicy, ScanConfig, ScanReport};
use camscan_scan::{FileScanner, Predicate, predicate};

use crate::local::LocalCamera;

#[derive(Parser)]
#[command(
    name = "camscan",
    version,
    about = "Scan a camera's filesystem for the files you care about",
    long_about = "camscan walks every storage device of a camera and collects the files \
                  that match your filters.\n\n\
                  Directories given on the command line stand in for the camera's \
                  storage devices. Set RUST_LOG=camscan_scan=debug to trace listings."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Find files matching the given filters
    Scan {
        /// Directories to treat as storage devices
        #[arg(required = true)]
        dirs: Vec<PathBuf>,

        /// Match files with this extension (repeatable, case-insensitive)
        #[arg(short, long = "ext")]
        ext: Vec<String>,

        /// Match names against this glob pattern (repeatable)
        #[arg(short, long)]
        pattern: Vec<String>,

        /// Match still images and items without loaded metadata
        #[arg(short, long)]
        images: bool,

        /// Include folders that match the filters
        #[arg(long)]
        include_folders: bool,

        #[command(flatten)]
        options: ScanOptions,
    },

    /// List every file
    Tree {
        /// Directories to treat as storage devices
        #[arg(required = true)]
        dirs: Vec<PathBuf>,

        #[command(flatten)]
        options: ScanOptions,
    },
}

/// Options shared by every scanning command.
#[derive(Args)]
struct ScanOptions {
    /// Stop at the first unreadable folder instead of skipping it
    #[arg(long)]
    fail_fast: bool,

    /// Maximum folder depth to descend into
    #[arg(short = 'd', long)]
    max_depth: Option<u32>,

    /// Stop after this many matches
    #[arg(short = 'n', long)]
    max_results: Option<usize>,

    /// Number of folder listings in flight (0 = unbounded)
    #[arg(short = 'j', long)]
    concurrency: Option<usize>,

    /// Load scan settings from a TOML file; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Scan {
            dirs,
            ext,
            pattern,
            images,
            include_folders,
            options,
        } => {
            let predicate = build_predicate(&ext, &pattern, images)?;
            let mut config = build_config(&options)?;
            if include_folders {
                config.include_matching_folders = true;
            }
            run_scan(&dirs, predicate, config, options.format).await?;
        }
        Command::Tree { dirs, options } => {
            let config = build_config(&options)?;
            run_scan(&dirs, None, config, options.format).await?;
        }
    }

    Ok(())
}

/// Combine the filter flags into one predicate.
///
/// Items matching any filter are kept. No filters means no predicate, so the
/// scanner falls back to "every file".
fn build_predicate(ext: &[String], pattern: &[String], images: bool) -> Result<Option<Predicate>> {
    let mut filters = Vec::new();
    if !ext.is_empty() {
        filters.push(predicate::extension(ext));
    }
    if !pattern.is_empty() {
        filters.push(predicate::glob(pattern).context("Invalid glob pattern")?);
    }
    if images {
        filters.push(predicate::images_or_unloaded());
    }

    Ok(match filters.len() {
        0 => None,
        1 => filters.pop(),
        _ => Some(predicate::any_of(filters)),
    })
}

/// Build the scan configuration from an optional file and the flags.
fn build_config(options: &ScanOptions) -> Result<ScanConfig> {
    let mut config = match &options.config {
        Some(path) => load_config(path)?,
        None => ScanConfig::new(),
    };

    if options.fail_fast {
        config.error_policy = ErrorPolicy::FailFast;
    }
    if options.max_depth.is_some() {
        config.max_depth = options.max_depth;
    }
    if options.max_results.is_some() {
        config.max_results = options.max_results;
    }
    if let Some(concurrency) = options.concurrency {
        config.max_concurrent_listings = concurrency;
    }

    config.validate().map_err(|e| eyre!("Invalid scan settings: {e}"))?;
    Ok(config)
}

fn load_config(path: &Path) -> Result<ScanConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Scan the directories and print the report.
async fn run_scan(
    dirs: &[PathBuf],
    predicate: Option<Predicate>,
    config: ScanConfig,
    format: OutputFormat,
) -> Result<()> {
    let camera = Arc::new(LocalCamera::new(dirs.iter().cloned()));
    let scanner = FileScanner::with_config(config);

    eprintln!("Scanning {} storage device(s)...", dirs.len());

    let (tx, rx) = tokio::sync::oneshot::channel();
    let handle = scanner.scan(Arc::clone(&camera), predicate, move |result| {
        let _ = tx.send(result);
    });

    let mut progress_rx = handle.subscribe();
    tokio::spawn(async move {
        while let Ok(progress) = progress_rx.recv().await {
            debug!(
                phase = ?progress.phase,
                listed = progress.folders_listed,
                pending = progress.folders_pending,
                matched = progress.items_matched,
                "Scan progress"
            );
            if progress.is_finished() {
                break;
            }
        }
    });

    let report = rx
        .await
        .context("Scan ended without a result")?
        .context("Scan failed")?;

    match format {
        OutputFormat::Text => print_report(&report, &camera),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    Ok(())
}

fn print_report(report: &ScanReport, camera: &LocalCamera) {
    println!();
    println!("{}", "─".repeat(70));
    println!(
        " {} match(es), {}",
        report.len(),
        format_size(report.stats.matched_size)
    );
    println!(
        " {} folders listed, {} files seen",
        report.stats.folders_listed, report.stats.files_seen
    );
    println!(" Scanned in {:.2}s", report.scan_duration.as_secs_f64());
    println!("{}", "─".repeat(70));
    println!();

    for item in &report.items {
        let label = camera.label(item.path.storage).unwrap_or("?");
        let location = format!("{label}:{}", item.path.path);
        let size = item.size.map(format_size).unwrap_or_default();
        let date = item
            .date_created
            .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        println!(" {:<50} {:>10}  {}", truncate(&location, 50), size, date);
    }

    if report.truncated {
        println!();
        println!(" Stopped early after reaching the result limit");
    }

    if report.has_warnings() {
        println!();
        println!(" {} warning(s) during scan", report.warnings.len());
        for warning in &report.warnings {
            println!("   {}: {}", warning.path, warning.message);
        }
    }
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

/// Truncate a string to max length.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len - 1).collect();
        format!("{kept}…")
    }
}
