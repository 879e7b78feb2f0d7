// folderbackup/src/backup/naming.rs
use chrono::NaiveDate;
use std::path::{Path, PathBuf};

use crate::errors::{BackupError, Result};

/// Output formats understood by the archiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArchiveFormat {
    Tar,
    #[default]
    TarGz,
    TarBz2,
    TarXz,
    TarLz,
}

impl ArchiveFormat {
    // Longest suffixes first so "x.tar.gz" never matches plain "tar".
    const ALL: [ArchiveFormat; 5] = [
        ArchiveFormat::TarGz,
        ArchiveFormat::TarBz2,
        ArchiveFormat::TarXz,
        ArchiveFormat::TarLz,
        ArchiveFormat::Tar,
    ];

    /// Picks a format from a user-supplied string such as `"tar.xz"`,
    /// `".TAR.BZ2"` or `"mydata.tar.lz"`.
    ///
    /// Matching is by case-insensitive suffix. Anything unrecognized, and an
    /// empty string, falls back to `.tar.gz`.
    pub fn from_user_str(raw: &str) -> Self {
        let lowered = raw.trim().to_ascii_lowercase();
        let bare = lowered.trim_start_matches('.');

        Self::ALL
            .into_iter()
            .find(|format| {
                let ext = &format.extension()[1..];
                bare == ext || bare.ends_with(&format!(".{}", ext))
            })
            .unwrap_or_default()
    }

    pub fn extension(self) -> &'static str {
        match self {
            ArchiveFormat::Tar => ".tar",
            ArchiveFormat::TarGz => ".tar.gz",
            ArchiveFormat::TarBz2 => ".tar.bz2",
            ArchiveFormat::TarXz => ".tar.xz",
            ArchiveFormat::TarLz => ".tar.lz",
        }
    }

    /// The tar option selecting this format's compressor, if any.
    pub fn compression_flag(self) -> Option<&'static str> {
        match self {
            ArchiveFormat::Tar => None,
            ArchiveFormat::TarGz => Some("-z"),
            ArchiveFormat::TarBz2 => Some("-j"),
            ArchiveFormat::TarXz => Some("-J"),
            ArchiveFormat::TarLz => Some("--lzma"),
        }
    }
}

/// Cleans up a folder path typed by a user or read from a backup list:
/// surrounding whitespace and quotes are dropped, as are trailing separators
/// (a bare root is kept as is).
pub fn normalize_folder(raw: &str) -> PathBuf {
    let trimmed = raw.trim();
    let unquoted = trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(trimmed)
        .trim();

    let without_trailing = unquoted.trim_end_matches(['/', '\\']);
    if without_trailing.is_empty() || without_trailing.ends_with(':') {
        // "/" or "C:\" style roots
        return PathBuf::from(unquoted);
    }
    PathBuf::from(without_trailing)
}

/// Base name used inside archive filenames. Spaces become underscores.
fn sanitized_base_name(source: &Path) -> String {
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "root".to_string());
    name.replace(' ', "_")
}

/// Derives the archive path for backing up `source` into `destination_dir`.
///
/// The name is `<base>_<date><ext>`. Unless `update_in_place` is set, a
/// ` (N)` suffix is added with the smallest N that does not already exist on
/// disk. The probe is not atomic: two writers racing on the same destination
/// may pick the same name.
///
/// # Arguments
/// * `source` - Folder being backed up; must be an existing directory.
/// * `destination_dir` - Folder the archive goes into.
/// * `format` - Decides the extension.
/// * `update_in_place` - Reuse the plain name so the archiver updates it.
/// * `today` - Date stamp captured once at startup.
/// * `date_format` - chrono format string for the date stamp.
pub fn resolve_output_name(
    source: &Path,
    destination_dir: &Path,
    format: ArchiveFormat,
    update_in_place: bool,
    today: NaiveDate,
    date_format: &str,
) -> Result<PathBuf> {
    if !source.is_dir() {
        return Err(BackupError::InvalidSource(source.to_path_buf()));
    }

    let stem = format!(
        "{}_{}",
        sanitized_base_name(source),
        today.format(date_format)
    );
    let ext = format.extension();
    let plain = destination_dir.join(format!("{}{}", stem, ext));

    if update_in_place {
        return Ok(plain);
    }

    let mut candidate = plain;
    let mut n: u32 = 0;
    while candidate.exists() {
        n += 1;
        tracing::debug!("{} exists, trying suffix ({})", candidate.display(), n);
        candidate = destination_dir.join(format!("{} ({}){}", stem, n, ext));
    }
    Ok(candidate)
}
