// folderbackup/src/config/mod.rs
use anyhow::{Context, Result};
use chrono::NaiveDate;
use chrono::format::{Item, StrftimeItems};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::backup::naming::{ArchiveFormat, normalize_folder};
use crate::utils::run_log::{DEFAULT_LOG_KEEP_LINES, DEFAULT_LOG_MAX_BYTES};

pub const DEFAULT_CONFIG_FILE: &str = "config.json";
const DEFAULT_ARCHIVER: &str = "tar";
const DEFAULT_BACKUP_LIST: &str = "backup_list.txt";
const DEFAULT_LOG_FILE: &str = "backup.log";
const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

// Structs for deserializing config.json
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawJsonConfig {
    pub archiver_program: Option<PathBuf>,
    pub default_format: Option<String>,
    pub backup_list_path: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
    pub log_max_bytes: Option<u64>,
    pub log_keep_lines: Option<usize>,
    pub date_format: Option<String>,
    pub create_missing_destinations: Option<bool>,
}

// Application's internal configuration structs
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub archiver_program: PathBuf,
    pub default_format: ArchiveFormat,
    pub backup_list_path: PathBuf,
    pub log_file: PathBuf,
    pub log_max_bytes: u64,
    pub log_keep_lines: usize,
    pub date_format: String,
    pub create_missing_destinations: bool,
}

/// What a single run should back up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupMode {
    Folder { source: PathBuf, destination: PathBuf },
    List(PathBuf),
}

#[derive(Debug, Clone)]
pub struct BackupConfig {
    pub mode: BackupMode,
    pub format: ArchiveFormat,
    pub update_in_place: bool,
    pub create_missing_destinations: bool,
    /// Date stamp for every archive of this run.
    pub today: NaiveDate,
}

/// Command-line values that take precedence over config.json.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub input: Option<String>,
    pub output: Option<String>,
    pub format: Option<String>,
    /// `Some(None)` means "use the list from config".
    pub use_list: Option<Option<PathBuf>>,
    pub no_update: bool,
    pub assume_yes: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            archiver_program: PathBuf::from(DEFAULT_ARCHIVER),
            default_format: ArchiveFormat::default(),
            backup_list_path: PathBuf::from(DEFAULT_BACKUP_LIST),
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
            log_max_bytes: DEFAULT_LOG_MAX_BYTES,
            log_keep_lines: DEFAULT_LOG_KEEP_LINES,
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            create_missing_destinations: false,
        }
    }
}

impl AppConfig {
    pub fn load_from_json(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file at {}", config_path.display()))?;
        let raw_json_config: RawJsonConfig = serde_json::from_str(&config_content)
            .with_context(|| {
                format!(
                    "Failed to parse JSON from config file at {}",
                    config_path.display()
                )
            })?;
        Self::from_raw(raw_json_config)
    }

    /// Loads `config_path` if it exists, otherwise returns the defaults.
    /// An explicitly requested file must exist.
    pub fn load_or_default(config_path: &Path, explicit: bool) -> Result<Self> {
        if !explicit && !config_path.exists() {
            println!("ℹ️  No {} found, using defaults.", config_path.display());
            return Ok(Self::default());
        }
        Self::load_from_json(config_path)
    }

    pub fn from_raw(raw: RawJsonConfig) -> Result<Self> {
        let defaults = Self::default();

        let date_format = raw.date_format.unwrap_or(defaults.date_format);
        validate_date_format(&date_format)?;

        let log_keep_lines = raw.log_keep_lines.unwrap_or(defaults.log_keep_lines);
        if log_keep_lines == 0 {
            anyhow::bail!("log_keep_lines must be greater than zero in config.json.");
        }

        let archiver_program = raw
            .archiver_program
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(defaults.archiver_program);

        Ok(AppConfig {
            archiver_program,
            default_format: raw
                .default_format
                .as_deref()
                .map(ArchiveFormat::from_user_str)
                .unwrap_or(defaults.default_format),
            backup_list_path: raw.backup_list_path.unwrap_or(defaults.backup_list_path),
            log_file: raw.log_file.unwrap_or(defaults.log_file),
            log_max_bytes: raw.log_max_bytes.unwrap_or(defaults.log_max_bytes),
            log_keep_lines,
            date_format,
            create_missing_destinations: raw
                .create_missing_destinations
                .unwrap_or(defaults.create_missing_destinations),
        })
    }
}

/// The date stamp ends up in a filename, so it must be a valid chrono format
/// that produces no path separators.
fn validate_date_format(date_format: &str) -> Result<()> {
    if date_format.trim().is_empty() {
        anyhow::bail!("date_format cannot be empty in config.json.");
    }
    if StrftimeItems::new(date_format).any(|item| matches!(item, Item::Error)) {
        anyhow::bail!("date_format '{}' is not a valid chrono format string.", date_format);
    }
    if date_format.contains(['/', '\\']) {
        anyhow::bail!("date_format '{}' must not contain path separators.", date_format);
    }
    Ok(())
}

/// Combines config.json values with command-line overrides.
pub fn load_backup_config(
    app_config: &AppConfig,
    cli: &CliOverrides,
    today: NaiveDate,
) -> Result<BackupConfig> {
    let mode = match (&cli.use_list, &cli.input, &cli.output) {
        (Some(list), _, _) => {
            if cli.input.is_some() || cli.output.is_some() {
                println!("Warning: --input/--output are ignored when a backup list is used.");
            }
            BackupMode::List(list.clone().unwrap_or_else(|| app_config.backup_list_path.clone()))
        }
        (None, Some(input), Some(output)) => {
            let source = normalize_folder(input);
            let destination = normalize_folder(output);
            if source.as_os_str().is_empty() || destination.as_os_str().is_empty() {
                anyhow::bail!("Input and output folders cannot be empty.");
            }
            BackupMode::Folder { source, destination }
        }
        (None, _, _) => {
            anyhow::bail!("Either --use-list or both --input and --output must be given.")
        }
    };

    Ok(BackupConfig {
        mode,
        format: cli
            .format
            .as_deref()
            .map(ArchiveFormat::from_user_str)
            .unwrap_or(app_config.default_format),
        update_in_place: !cli.no_update,
        create_missing_destinations: cli.assume_yes || app_config.create_missing_destinations,
        today,
    })
}
