// folderbackup/src/backup/batch.rs
use chrono::NaiveDate;
use std::path::{Path, PathBuf};

use crate::backup::archive::{
    ArchiveOutcome, Archiver, BackupTarget, check_destination_outside_source, ensure_destination,
};
use crate::backup::list::BackupList;
use crate::backup::naming::{ArchiveFormat, resolve_output_name};
use crate::errors::{BackupError, Result};

/// Decides whether a missing destination folder may be created.
pub trait DestinationConfirm {
    fn confirm_create(&mut self, dir: &Path) -> bool;
}

impl<F> DestinationConfirm for F
where
    F: FnMut(&Path) -> bool,
{
    fn confirm_create(&mut self, dir: &Path) -> bool {
        self(dir)
    }
}

/// Backs up one folder: resolve the archive name, make sure the destination
/// exists (asking `confirm` if it does not) and is not inside the source,
/// then run the archiver.
///
/// The returned outcome may still describe a failed archiver run.
pub async fn backup_folder<A, C>(
    target: &BackupTarget,
    archiver: &A,
    confirm: &mut C,
    today: NaiveDate,
    date_format: &str,
) -> Result<ArchiveOutcome>
where
    A: Archiver,
    C: DestinationConfirm + ?Sized,
{
    let output = resolve_output_name(
        &target.source,
        &target.destination,
        target.format,
        target.update_in_place,
        today,
        date_format,
    )?;

    match ensure_destination(&target.destination, false) {
        Err(BackupError::NeedsDestinationConfirmation(dir)) => {
            if !confirm.confirm_create(&dir) {
                return Err(BackupError::NeedsDestinationConfirmation(dir));
            }
            ensure_destination(&dir, true)?;
        }
        other => other?,
    }
    check_destination_outside_source(&target.source, &target.destination)?;

    println!(
        "🗜 Archiving {} to {}",
        target.source.display(),
        output.display()
    );
    archiver.archive(target, &output).await
}

/// A source/destination pair that did not produce an archive.
#[derive(Debug)]
pub struct FailedPair {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub error: BackupError,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub succeeded: Vec<PathBuf>,
    pub failed: Vec<FailedPair>,
}

impl BatchReport {
    /// Files the result of one pair. An archiver run that exited non-zero
    /// counts as a failure.
    pub fn record(&mut self, source: PathBuf, destination: PathBuf, result: Result<ArchiveOutcome>) {
        let error = match result {
            Ok(outcome) if outcome.succeeded() => {
                println!("✓ {}", outcome.output.display());
                self.succeeded.push(outcome.output);
                return;
            }
            Ok(outcome) => BackupError::ArchiveProcessFailed {
                status: outcome.status_description(),
                output: outcome.output,
            },
            Err(e) => e,
        };

        eprintln!(
            "⚠️  Backup of {} to {} failed: {}",
            source.display(),
            destination.display(),
            error
        );
        self.failed.push(FailedPair {
            source,
            destination,
            error,
        });
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn attempted(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

/// Runs a parsed backup list.
pub struct BatchRunner<'a, A, C: ?Sized> {
    archiver: &'a A,
    confirm: &'a mut C,
    today: NaiveDate,
    date_format: &'a str,
}

impl<'a, A, C> BatchRunner<'a, A, C>
where
    A: Archiver,
    C: DestinationConfirm + ?Sized,
{
    pub fn new(archiver: &'a A, confirm: &'a mut C, today: NaiveDate, date_format: &'a str) -> Self {
        Self {
            archiver,
            confirm,
            today,
            date_format,
        }
    }

    /// Archives every source into every destination (a full cross product,
    /// so 2 sources and 3 destinations make 6 archives), one at a time.
    ///
    /// A failing pair is recorded and the batch moves on.
    pub async fn run_batch(
        &mut self,
        list: &BackupList,
        format: ArchiveFormat,
        update_in_place: bool,
    ) -> BatchReport {
        let mut report = BatchReport::default();

        for (source, destination) in list.pairs() {
            let target = BackupTarget {
                source: source.clone(),
                destination: destination.clone(),
                format,
                update_in_place,
            };

            let result = backup_folder(&target, self.archiver, &mut *self.confirm, self.today, self.date_format).await;
            report.record(source, destination, result);
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::fs;
    use tempfile::tempdir;

    const DATE_FORMAT: &str = "%Y-%m-%d";

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    /// Records every call; exits with `exit_code` for each one.
    struct RecordingArchiver {
        calls: RefCell<Vec<(PathBuf, PathBuf)>>,
        exit_code: i32,
    }

    impl RecordingArchiver {
        fn new(exit_code: i32) -> Self {
            Self {
                calls: RefCell::new(Vec::new()),
                exit_code,
            }
        }
    }

    impl Archiver for RecordingArchiver {
        async fn archive(&self, target: &BackupTarget, output: &Path) -> Result<ArchiveOutcome> {
            self.calls.borrow_mut().push((target.source.clone(), output.to_path_buf()));
            Ok(ArchiveOutcome {
                output: output.to_path_buf(),
                exit_code: Some(self.exit_code),
                log_lines: Vec::new(),
            })
        }
    }

    fn list_of(sources: &[&PathBuf], destinations: &[&PathBuf]) -> BackupList {
        BackupList {
            sources: sources.iter().map(|p| p.display().to_string()).collect(),
            destinations: destinations.iter().map(|p| p.display().to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_cross_join_runs_every_pair() -> anyhow::Result<()> {
        let root = tempdir()?;
        let (a, b) = (root.path().join("a"), root.path().join("b"));
        let (x, y) = (root.path().join("x"), root.path().join("y"));
        for dir in [&a, &b, &x, &y] {
            fs::create_dir(dir)?;
        }

        let archiver = RecordingArchiver::new(0);
        let mut confirm = |_: &Path| false;
        let mut runner = BatchRunner::new(&archiver, &mut confirm, day(), DATE_FORMAT);
        let report = runner.run_batch(&list_of(&[&a, &b], &[&x, &y]), ArchiveFormat::TarGz, true).await;

        assert!(report.is_success());
        assert_eq!(report.attempted(), 4);
        let calls = archiver.calls.borrow();
        assert_eq!(
            *calls,
            vec![
                (a.clone(), x.join("a_2026-10-18.tar.gz")),
                (a.clone(), y.join("a_2026-10-18.tar.gz")),
                (b.clone(), x.join("b_2026-10-18.tar.gz")),
                (b.clone(), y.join("b_2026-10-18.tar.gz")),
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_single_source_two_destinations() -> anyhow::Result<()> {
        let root = tempdir()?;
        let src = root.path().join("A");
        let (d1, d2) = (root.path().join("B"), root.path().join("C"));
        for dir in [&src, &d1, &d2] {
            fs::create_dir(dir)?;
        }
        let text = format!("[Backup From]\n{}\n[Backup To]\n{}\n{}", src.display(), d1.display(), d2.display());
        let list = BackupList::parse(&text)?;

        let archiver = RecordingArchiver::new(0);
        let mut confirm = |_: &Path| false;
        let report = BatchRunner::new(&archiver, &mut confirm, day(), DATE_FORMAT)
            .run_batch(&list, ArchiveFormat::Tar, false)
            .await;

        assert_eq!(report.succeeded.len(), 2);
        assert!(archiver.calls.borrow().iter().all(|(s, _)| *s == src));
        Ok(())
    }

    #[tokio::test]
    async fn test_failures_are_recorded_and_batch_continues() -> anyhow::Result<()> {
        let root = tempdir()?;
        let good = root.path().join("good");
        let missing = root.path().join("missing");
        let dest = root.path().join("dest");
        fs::create_dir(&good)?;
        fs::create_dir(&dest)?;

        let archiver = RecordingArchiver::new(0);
        let mut confirm = |_: &Path| false;
        let report = BatchRunner::new(&archiver, &mut confirm, day(), DATE_FORMAT)
            .run_batch(&list_of(&[&missing, &good], &[&dest]), ArchiveFormat::TarGz, false)
            .await;

        assert!(!report.is_success());
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].source, missing);
        assert!(matches!(report.failed[0].error, BackupError::InvalidSource(_)));
        assert_eq!(report.succeeded, vec![dest.join("good_2026-10-18.tar.gz")]);
        Ok(())
    }

    #[tokio::test]
    async fn test_declined_destination_is_recorded() -> anyhow::Result<()> {
        let root = tempdir()?;
        let src = root.path().join("docs");
        let dest = root.path().join("usb");
        fs::create_dir(&src)?;

        let archiver = RecordingArchiver::new(0);
        let mut asked = Vec::new();
        let mut confirm = |dir: &Path| {
            asked.push(dir.to_path_buf());
            false
        };
        let report = BatchRunner::new(&archiver, &mut confirm, day(), DATE_FORMAT)
            .run_batch(&list_of(&[&src], &[&dest]), ArchiveFormat::TarGz, false)
            .await;

        assert!(matches!(report.failed[0].error, BackupError::NeedsDestinationConfirmation(_)));
        assert!(archiver.calls.borrow().is_empty());
        assert!(!dest.exists());
        assert_eq!(asked, vec![dest]);
        Ok(())
    }

    #[tokio::test]
    async fn test_confirmed_destination_is_created() -> anyhow::Result<()> {
        let root = tempdir()?;
        let src = root.path().join("docs");
        let dest = root.path().join("usb").join("backups");
        fs::create_dir(&src)?;

        let archiver = RecordingArchiver::new(0);
        let mut confirm = |_: &Path| true;
        let report = BatchRunner::new(&archiver, &mut confirm, day(), DATE_FORMAT)
            .run_batch(&list_of(&[&src], &[&dest]), ArchiveFormat::TarXz, false)
            .await;

        assert!(report.is_success());
        assert!(dest.is_dir());
        assert_eq!(report.succeeded, vec![dest.join("docs_2026-10-18.tar.xz")]);
        Ok(())
    }

    #[tokio::test]
    async fn test_destination_inside_source_is_not_archived() -> anyhow::Result<()> {
        let root = tempdir()?;
        let src = root.path().join("docs");
        let nested = src.join("backups");
        let outside = root.path().join("usb");
        fs::create_dir(&src)?;
        fs::create_dir(&outside)?;

        let archiver = RecordingArchiver::new(0);
        let mut confirm = |_: &Path| true;
        let report = BatchRunner::new(&archiver, &mut confirm, day(), DATE_FORMAT)
            .run_batch(&list_of(&[&src], &[&nested, &src, &outside]), ArchiveFormat::TarGz, true)
            .await;

        assert_eq!(report.failed.len(), 2);
        assert!(
            report
                .failed
                .iter()
                .all(|f| matches!(f.error, BackupError::DestinationInsideSource { .. }))
        );
        assert_eq!(*archiver.calls.borrow(), vec![(src.clone(), outside.join("docs_2026-10-18.tar.gz"))]);
        Ok(())
    }

    #[tokio::test]
    async fn test_archiver_exit_code_is_reported() -> anyhow::Result<()> {
        let root = tempdir()?;
        let src = root.path().join("docs");
        let dest = root.path().join("out");
        fs::create_dir(&src)?;
        fs::create_dir(&dest)?;

        let archiver = RecordingArchiver::new(2);
        let mut confirm = |_: &Path| true;
        let report = BatchRunner::new(&archiver, &mut confirm, day(), DATE_FORMAT)
            .run_batch(&list_of(&[&src, &src], &[&dest]), ArchiveFormat::TarGz, false)
            .await;

        // both pairs still attempted
        assert_eq!(archiver.calls.borrow().len(), 2);
        assert_eq!(report.failed.len(), 2);
        match &report.failed[0].error {
            BackupError::ArchiveProcessFailed { status, .. } => assert_eq!(status, "exit code 2"),
            other => panic!("unexpected error: {:?}", other),
        }
        Ok(())
    }
}
