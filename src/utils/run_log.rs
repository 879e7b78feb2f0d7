// folderbackup/src/utils/run_log.rs
use chrono::Local;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub const DEFAULT_LOG_MAX_BYTES: u64 = 25 * 1024 * 1024;
pub const DEFAULT_LOG_KEEP_LINES: usize = 50_000;

/// Append-only text log that receives archiver output.
///
/// Other tools may write to the same file, so it is only ever appended to,
/// except by [`RunLog::rotate_if_needed`].
#[derive(Debug, Clone)]
pub struct RunLog {
    path: PathBuf,
    max_bytes: u64,
    keep_lines: usize,
}

impl RunLog {
    pub fn new(path: impl Into<PathBuf>, max_bytes: u64, keep_lines: usize) -> Self {
        Self {
            path: path.into(),
            max_bytes,
            keep_lines,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends a timestamped header followed by `lines`.
    pub fn append(&self, header: &str, lines: &[String]) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        writeln!(file, "[{}] {}", Local::now().format("%Y-%m-%d %H:%M:%S"), header)?;
        for line in lines {
            writeln!(file, "{}", line)?;
        }
        file.flush()
    }

    /// Truncates the log to its most recent `keep_lines` lines once it grows
    /// past `max_bytes`. Returns whether the file was rewritten.
    pub fn rotate_if_needed(&self) -> io::Result<bool> {
        let size = match fs::metadata(&self.path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e),
        };
        if size <= self.max_bytes {
            return Ok(false);
        }

        let bytes = fs::read(&self.path)?;
        let content = String::from_utf8_lossy(&bytes);
        let lines: Vec<&str> = content.lines().collect();
        let start = lines.len().saturating_sub(self.keep_lines);

        let mut kept = lines[start..].join("\n");
        kept.push('\n');
        fs::write(&self.path, kept)?;

        tracing::info!(
            "Rotated run log {} ({} bytes, kept {} of {} lines)",
            self.path.display(),
            size,
            lines.len() - start,
            lines.len()
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_append_creates_and_appends() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let log = RunLog::new(dir.path().join("logs").join("backup.log"), DEFAULT_LOG_MAX_BYTES, DEFAULT_LOG_KEEP_LINES);

        log.append("first run", &["a/".to_string(), "a/file.txt".to_string()])?;
        log.append("second run", &[])?;

        let content = fs::read_to_string(log.path())?;
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].ends_with("first run"));
        assert_eq!(lines[1], "a/");
        assert_eq!(lines[2], "a/file.txt");
        assert!(lines[3].ends_with("second run"));
        Ok(())
    }

    #[test]
    fn test_rotate_missing_file_is_noop() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let log = RunLog::new(dir.path().join("backup.log"), 10, 2);
        assert!(!log.rotate_if_needed()?);
        assert!(!log.path().exists());
        Ok(())
    }

    #[test]
    fn test_rotate_small_file_is_untouched() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("backup.log");
        fs::write(&path, "one\ntwo\n")?;
        let log = RunLog::new(&path, 1024, 1);
        assert!(!log.rotate_if_needed()?);
        assert_eq!(fs::read_to_string(&path)?, "one\ntwo\n");
        Ok(())
    }

    #[test]
    fn test_rotate_keeps_most_recent_lines() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("backup.log");
        let content: String = (1..=100).map(|i| format!("line {}\n", i)).collect();
        fs::write(&path, &content)?;

        let log = RunLog::new(&path, 100, 3);
        assert!(log.rotate_if_needed()?);
        assert_eq!(fs::read_to_string(&path)?, "line 98\nline 99\nline 100\n");
        Ok(())
    }
}
