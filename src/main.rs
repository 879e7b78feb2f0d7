//! Folder Backup Tool
//!
//! Archives folders with an external tar, either one folder at a time or
//! driven by a backup list.

// folderbackup/src/main.rs
mod backup;
mod config;
mod errors;
mod utils;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use config::{AppConfig, CliOverrides, DEFAULT_CONFIG_FILE, load_backup_config};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use backup::batch::BatchReport;

#[derive(Parser, Debug)]
#[command(name = "folderbackup", version, about = "Back up folders into tar archives", long_about = None)]
struct Args {
    /// Folder to back up
    #[arg(short, long, value_name = "DIR", env = "FOLDERBACKUP_INPUT")]
    input: Option<String>,

    /// Folder the archive is written to
    #[arg(short, long, value_name = "DIR", env = "FOLDERBACKUP_OUTPUT")]
    output: Option<String>,

    /// Output format: tar, tar.gz, tar.bz2, tar.xz or tar.lz
    #[arg(short, long, env = "FOLDERBACKUP_FORMAT")]
    format: Option<String>,

    /// Back up every folder of a backup list (defaults to backup_list_path from config)
    #[arg(short = 'l', long, value_name = "FILE", num_args = 0..=1)]
    use_list: Option<Option<PathBuf>>,

    /// Always write a fresh, uniquely named archive instead of updating today's
    #[arg(short = 'n', long)]
    no_update: bool,

    /// Create missing destination folders without asking
    #[arg(short = 'y', long)]
    yes: bool,

    /// Exit with an error status when any archive fails
    #[arg(long)]
    strict: bool,

    /// Path to config.json
    #[arg(short, long, value_name = "FILE", env = "FOLDERBACKUP_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Main entry point for the backup tool
#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let args = Args::parse();

    if let Err(e) = utils::logger::init(&args.log_level) {
        eprintln!("Warning: logging could not be initialised: {}", e);
    }

    match run_app(args).await {
        Ok(true) => {
            println!("✅ Operation completed successfully.");
            ExitCode::SUCCESS
        }
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("❌ Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns `Ok(false)` only for a failed run in `--strict` mode.
async fn run_app(args: Args) -> Result<bool> {
    // Taken once so every archive of this run shares the same date stamp.
    let today = Local::now().date_naive();

    let explicit_config = args.config.is_some();
    let config_path = args.config.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let app_config = AppConfig::load_or_default(&config_path, explicit_config)
        .context(format!("Failed to load application configuration from {}", config_path.display()))?;

    let cli = CliOverrides {
        input: args.input,
        output: args.output,
        format: args.format,
        use_list: args.use_list,
        no_update: args.no_update,
        assume_yes: args.yes,
    };
    let backup_config = load_backup_config(&app_config, &cli, today)
        .context("Invalid backup options")?;

    let result = if backup_config.create_missing_destinations {
        let mut always = |_: &Path| true;
        backup::run_backup_flow(&app_config, &backup_config, &mut always).await
    } else {
        backup::run_backup_flow(&app_config, &backup_config, &mut prompt_create_destination).await
    };
    let report = result.context("Backup process failed")?;

    print_summary(&report, &app_config.log_file);

    if report.is_success() {
        Ok(true)
    } else if args.strict {
        Ok(false)
    } else {
        println!("⚠️  Some archives failed; the run itself finished. Use --strict to treat this as an error.");
        Ok(true)
    }
}

fn print_summary(report: &BatchReport, log_file: &Path) {
    println!(
        "\n📦 {} of {} archive(s) written. Archiver output: {}",
        report.succeeded.len(),
        report.attempted(),
        log_file.display()
    );
    for path in &report.succeeded {
        println!("   ✓ {}", path.display());
    }
    for failed in &report.failed {
        eprintln!(
            "   ✗ {} -> {}: {}",
            failed.source.display(),
            failed.destination.display(),
            failed.error
        );
    }
}

/// Asks on the terminal whether a missing destination folder may be created.
fn prompt_create_destination(dir: &Path) -> bool {
    print!("Destination {} does not exist. Create it? [y/N]: ", dir.display());
    if std::io::stdout().flush().is_err() {
        return false;
    }

    let mut input = String::new();
    match std::io::stdin().lock().read_line(&mut input) {
        Ok(_) => matches!(input.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
        Err(e) => {
            tracing::warn!("Failed to read answer: {}", e);
            false
        }
    }
}
