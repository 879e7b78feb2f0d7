// folderbackup/src/errors.rs
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Source folder does not exist or is not a directory: {}", .0.display())]
    InvalidSource(PathBuf),

    #[error("Backup list has no [Backup From] section")]
    MissingFromSection,

    #[error("Backup list has no [Backup To] section")]
    MissingToSection,

    #[error("Backup list [Backup From] section is empty")]
    EmptyFromList,

    #[error("Backup list [Backup To] section is empty")]
    EmptyToList,

    // Raised before anything is created; the UI layer decides whether to go ahead.
    #[error("Destination folder does not exist: {}", .0.display())]
    NeedsDestinationConfirmation(PathBuf),

    #[error(
        "Destination {} is inside the source folder {}",
        .destination.display(),
        .folder.display()
    )]
    DestinationInsideSource { folder: PathBuf, destination: PathBuf },

    #[error("Archiver exited with {status} while writing {}", .output.display())]
    ArchiveProcessFailed { output: PathBuf, status: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BackupError {
    /// True for errors caused by a malformed backup list.
    pub fn is_list_error(&self) -> bool {
        matches!(
            self,
            BackupError::MissingFromSection
                | BackupError::MissingToSection
                | BackupError::EmptyFromList
                | BackupError::EmptyToList
        )
    }
}

pub type Result<T> = std::result::Result<T, BackupError>;
