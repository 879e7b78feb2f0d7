// folderbackup/src/backup/mod.rs
pub(crate) mod archive;
pub(crate) mod batch;
pub(crate) mod list;
pub(crate) mod naming;

use anyhow::{Context, Result};

use crate::config::{AppConfig, BackupConfig, BackupMode};
use crate::utils::find_archiver_executable;
use crate::utils::run_log::RunLog;
use archive::{BackupTarget, ExternalArchiver};
use batch::{BatchReport, BatchRunner, DestinationConfirm, backup_folder};
use list::BackupList;

/// Public entry point for the backup process.
///
/// Setup problems (no archiver, unreadable or malformed list) are returned as
/// errors. Failures of individual archives are collected in the report.
pub async fn run_backup_flow<C>(
    app_config: &AppConfig,
    backup_config: &BackupConfig,
    confirm: &mut C,
) -> Result<BatchReport>
where
    C: DestinationConfirm + ?Sized,
{
    let run_log = RunLog::new(
        &app_config.log_file,
        app_config.log_max_bytes,
        app_config.log_keep_lines,
    );
    if let Err(e) = run_log.rotate_if_needed() {
        tracing::warn!("Could not rotate run log {}: {}", run_log.path().display(), e);
    }

    let archiver_path = find_archiver_executable(&app_config.archiver_program)?;
    tracing::debug!("Using archiver at {}", archiver_path.display());
    let archiver = ExternalArchiver::new(archiver_path, run_log);

    let report = match &backup_config.mode {
        BackupMode::Folder { source, destination } => {
            println!("🚀 Backing up {} to {}", source.display(), destination.display());
            let target = BackupTarget {
                source: source.clone(),
                destination: destination.clone(),
                format: backup_config.format,
                update_in_place: backup_config.update_in_place,
            };
            let result = backup_folder(
                &target,
                &archiver,
                confirm,
                backup_config.today,
                &app_config.date_format,
            )
            .await;

            let mut report = BatchReport::default();
            report.record(target.source, target.destination, result);
            report
        }
        BackupMode::List(list_path) => {
            println!("📋 Reading backup list {}", list_path.display());
            let list = match BackupList::load(list_path) {
                Ok(list) => list,
                Err(e) if e.is_list_error() => {
                    anyhow::bail!("Backup list {} is malformed: {}", list_path.display(), e)
                }
                Err(e) => {
                    return Err(e).with_context(|| {
                        format!("Failed to read backup list {}", list_path.display())
                    });
                }
            };
            println!(
                "🚀 {} source(s) x {} destination(s) = {} archive(s)",
                list.sources.len(),
                list.destinations.len(),
                list.sources.len() * list.destinations.len()
            );

            let mut runner = BatchRunner::new(
                &archiver,
                confirm,
                backup_config.today,
                &app_config.date_format,
            );
            runner
                .run_batch(&list, backup_config.format, backup_config.update_in_place)
                .await
        }
    };

    Ok(report)
}
