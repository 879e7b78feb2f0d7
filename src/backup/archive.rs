// folderbackup/src/backup/archive.rs
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::Builder as TempFileBuilder;
use tokio::process::Command;

use crate::backup::naming::ArchiveFormat;
use crate::errors::{BackupError, Result};
use crate::utils::run_log::RunLog;

/// Tar extract option that leaves a file alone when the copy already on disk
/// is newer than the one in the archive.
pub const KEEP_NEWER_FLAG: &str = "--keep-newer-files";

/// One folder to archive into one destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupTarget {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub format: ArchiveFormat,
    pub update_in_place: bool,
}

/// What the archiver did for one target.
#[derive(Debug, Clone)]
pub struct ArchiveOutcome {
    pub output: PathBuf,
    /// `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
    pub log_lines: Vec<String>,
}

impl ArchiveOutcome {
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn status_description(&self) -> String {
        match self.exit_code {
            Some(code) => format!("exit code {}", code),
            None => "termination by signal".to_string(),
        }
    }
}

/// How an archive gets written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchivePlan {
    /// Write a new archive at the output path.
    Create,
    /// Append changed files to an existing plain `.tar` (`tar -u`).
    Update,
    /// Compressed archives cannot be appended to: unpack the previous archive,
    /// lay the source over it keeping newer copies, and compress it again.
    Rebuild,
}

impl ArchivePlan {
    pub fn for_target(target: &BackupTarget, output: &Path) -> Self {
        if !target.update_in_place || !output.exists() {
            ArchivePlan::Create
        } else if target.format.compression_flag().is_none() {
            ArchivePlan::Update
        } else {
            ArchivePlan::Rebuild
        }
    }
}

/// Produces or updates an archive file for a target.
///
/// A non-zero archiver exit is reported through [`ArchiveOutcome`], not as an
/// error; `Err` is reserved for failures to run the archiver at all.
#[allow(async_fn_in_trait)]
pub trait Archiver {
    async fn archive(&self, target: &BackupTarget, output: &Path) -> Result<ArchiveOutcome>;
}

/// Runs an external `tar` with discrete argument vectors and appends its
/// output to the run log.
#[derive(Debug, Clone)]
pub struct ExternalArchiver {
    program: PathBuf,
    log: RunLog,
}

/// Builds the argument vector for a single-pass run:
/// `-c -v [compression] -f <output> -C <source> .` for [`ArchivePlan::Create`],
/// `-u -v -f <output> -C <source> .` for [`ArchivePlan::Update`].
pub fn build_args(target: &BackupTarget, output: &Path, plan: ArchivePlan) -> Vec<OsString> {
    let mut args: Vec<OsString> = match plan {
        ArchivePlan::Update => vec!["-u".into(), "-v".into()],
        ArchivePlan::Create | ArchivePlan::Rebuild => vec!["-c".into(), "-v".into()],
    };
    if plan != ArchivePlan::Update {
        if let Some(flag) = target.format.compression_flag() {
            args.push(flag.into());
        }
    }
    args.push("-f".into());
    args.push(output.as_os_str().to_owned());
    args.push("-C".into());
    args.push(target.source.as_os_str().to_owned());
    // everything below the source folder, recursively
    args.push(".".into());
    args
}

/// Scratch locations for [`ArchivePlan::Rebuild`].
#[derive(Debug, Clone)]
pub struct RebuildPaths {
    pub staging: PathBuf,
    pub source_tar: PathBuf,
    pub partial: PathBuf,
}

impl RebuildPaths {
    pub fn under(work_dir: &Path) -> Self {
        Self {
            staging: work_dir.join("staging"),
            source_tar: work_dir.join("source.tar"),
            partial: work_dir.join("archive.partial"),
        }
    }
}

/// The tar runs of a rebuild, in order:
/// 1. unpack the previous archive into the staging folder,
/// 2. pack the source into a plain tar,
/// 3. unpack that over the staging folder, keeping newer staged copies,
/// 4. compress the staging folder into the partial archive.
///
/// The caller renames the partial archive over the output afterwards.
pub fn rebuild_steps(target: &BackupTarget, output: &Path, paths: &RebuildPaths) -> Vec<Vec<OsString>> {
    let mut unpack_previous: Vec<OsString> = vec!["-x".into()];
    let mut pack_staging: Vec<OsString> = vec!["-c".into(), "-v".into()];
    if let Some(flag) = target.format.compression_flag() {
        unpack_previous.push(flag.into());
        pack_staging.push(flag.into());
    }
    unpack_previous.extend([
        "-f".into(),
        output.as_os_str().to_owned(),
        "-C".into(),
        paths.staging.as_os_str().to_owned(),
    ]);
    pack_staging.extend([
        "-f".into(),
        paths.partial.as_os_str().to_owned(),
        "-C".into(),
        paths.staging.as_os_str().to_owned(),
        ".".into(),
    ]);

    let pack_source: Vec<OsString> = vec![
        "-c".into(),
        "-f".into(),
        paths.source_tar.as_os_str().to_owned(),
        "-C".into(),
        target.source.as_os_str().to_owned(),
        ".".into(),
    ];
    let overlay_source: Vec<OsString> = vec![
        "-x".into(),
        KEEP_NEWER_FLAG.into(),
        "-f".into(),
        paths.source_tar.as_os_str().to_owned(),
        "-C".into(),
        paths.staging.as_os_str().to_owned(),
    ];

    vec![unpack_previous, pack_source, overlay_source, pack_staging]
}

impl ExternalArchiver {
    pub fn new(program: PathBuf, log: RunLog) -> Self {
        Self { program, log }
    }

    async fn run(&self, args: &[OsString]) -> Result<(Option<i32>, Vec<String>)> {
        tracing::debug!("Running {} {:?}", self.program.display(), args);

        let result = Command::new(&self.program).args(args).output().await?;

        let mut lines: Vec<String> = String::from_utf8_lossy(&result.stdout)
            .lines()
            .map(str::to_string)
            .collect();
        lines.extend(String::from_utf8_lossy(&result.stderr).lines().map(str::to_string));
        Ok((result.status.code(), lines))
    }

    async fn rebuild(&self, target: &BackupTarget, output: &Path) -> Result<(Option<i32>, Vec<String>)> {
        // Same folder as the output so the final rename stays on one filesystem.
        let parent = output.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
        let work_dir = TempFileBuilder::new().prefix(".folderbackup-").tempdir_in(parent)?;
        let paths = RebuildPaths::under(work_dir.path());
        fs::create_dir(&paths.staging)?;

        let mut lines = Vec::new();
        for args in rebuild_steps(target, output, &paths) {
            let (exit_code, step_lines) = self.run(&args).await?;
            lines.extend(step_lines);
            if exit_code != Some(0) {
                return Ok((exit_code, lines));
            }
        }

        fs::rename(&paths.partial, output)?;
        Ok((Some(0), lines))
    }
}

impl Archiver for ExternalArchiver {
    async fn archive(&self, target: &BackupTarget, output: &Path) -> Result<ArchiveOutcome> {
        let plan = ArchivePlan::for_target(target, output);
        let (exit_code, log_lines) = match plan {
            ArchivePlan::Create | ArchivePlan::Update => self.run(&build_args(target, output, plan)).await?,
            ArchivePlan::Rebuild => self.rebuild(target, output).await?,
        };

        let outcome = ArchiveOutcome {
            output: output.to_path_buf(),
            exit_code,
            log_lines,
        };

        let header = format!(
            "{} -> {} [{:?}] ({})",
            target.source.display(),
            output.display(),
            plan,
            outcome.status_description()
        );
        self.log.append(&header, &outcome.log_lines)?;

        if !outcome.succeeded() {
            tracing::warn!(
                "Archiver finished with {} for {}; see {}",
                outcome.status_description(),
                target.source.display(),
                self.log.path().display()
            );
        }
        Ok(outcome)
    }
}

/// Makes sure the destination folder exists.
///
/// Without `create_confirmed` a missing folder yields
/// [`BackupError::NeedsDestinationConfirmation`] and nothing is touched.
pub fn ensure_destination(dir: &Path, create_confirmed: bool) -> Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    if dir.exists() {
        return Err(BackupError::Io(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("Destination exists but is not a directory: {}", dir.display()),
        )));
    }
    if !create_confirmed {
        return Err(BackupError::NeedsDestinationConfirmation(dir.to_path_buf()));
    }

    fs::create_dir_all(dir)?;
    println!("📂 Created destination folder: {}", dir.display());
    Ok(())
}

/// Rejects a destination that is the source folder or lies inside it; tar
/// would otherwise read the archive it is writing.
pub fn check_destination_outside_source(source: &Path, destination: &Path) -> Result<()> {
    let source_abs = fs::canonicalize(source)?;
    let destination_abs = fs::canonicalize(destination)?;
    if destination_abs.starts_with(&source_abs) {
        return Err(BackupError::DestinationInsideSource {
            folder: source.to_path_buf(),
            destination: destination.to_path_buf(),
        });
    }
    Ok(())
}
