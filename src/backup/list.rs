// folderbackup/src/backup/list.rs
use std::fs;
use std::path::{Path, PathBuf};

use crate::backup::naming::normalize_folder;
use crate::errors::{BackupError, Result};

pub const FROM_MARKER: &str = "[Backup From]";
pub const TO_MARKER: &str = "[Backup To]";

/// Parsed backup list: every source is backed up into every destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupList {
    pub sources: Vec<String>,
    pub destinations: Vec<String>,
}

impl BackupList {
    /// Parses the text of a backup list.
    ///
    /// Blank lines and lines starting with `#` are ignored. Folders listed
    /// between `[Backup From]` and `[Backup To]` are sources, folders after
    /// `[Backup To]` are destinations. Lines are compared and kept trimmed.
    pub fn parse(raw_text: &str) -> Result<Self> {
        let lines: Vec<&str> = raw_text
            .trim_start_matches('\u{feff}')
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .collect();

        let from = lines
            .iter()
            .position(|line| *line == FROM_MARKER)
            .ok_or(BackupError::MissingFromSection)?;
        let to = lines
            .iter()
            .position(|line| *line == TO_MARKER)
            .ok_or(BackupError::MissingToSection)?;

        // A [Backup To] placed before [Backup From] leaves no sources.
        let sources: Vec<String> = if from < to {
            lines[from + 1..to].iter().map(|s| s.to_string()).collect()
        } else {
            Vec::new()
        };
        if sources.is_empty() {
            return Err(BackupError::EmptyFromList);
        }

        let destinations: Vec<String> = lines[to + 1..].iter().map(|s| s.to_string()).collect();
        if destinations.is_empty() {
            return Err(BackupError::EmptyToList);
        }

        Ok(BackupList { sources, destinations })
    }

    /// Reads and parses a backup list file. Invalid UTF-8 is replaced rather
    /// than rejected.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        Self::parse(&String::from_utf8_lossy(&bytes))
    }

    /// All (source, destination) pairs in source-major order.
    pub fn pairs(&self) -> Vec<(PathBuf, PathBuf)> {
        self.sources
            .iter()
            .flat_map(|source| {
                self.destinations
                    .iter()
                    .map(move |dest| (normalize_folder(source), normalize_folder(dest)))
            })
            .collect()
    }
}
