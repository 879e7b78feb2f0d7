pub mod logger;
pub mod run_log;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use which::which;

/// Finds the archiver executable. A configured path is used as given;
/// a bare program name is looked up in the system PATH.
pub fn find_archiver_executable(program: &Path) -> Result<PathBuf> {
    if program.components().count() > 1 {
        if !program.is_file() {
            anyhow::bail!("Configured archiver not found: {}", program.display());
        }
        return Ok(program.to_path_buf());
    }
    which(program).with_context(|| {
        format!(
            "{} executable not found in PATH. Please install it or set archiver_program in config.json.",
            program.display()
        )
    })
}
