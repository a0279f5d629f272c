//! Log-file helpers: default path, parent-dir creation and size-based
//! rotation.
//!
//! The `tracing-subscriber` setup lives in the binary, which is the only
//! crate depending on it.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Rotate once the log grows past this many bytes (10 MB).
pub const DEFAULT_MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Rotated files kept next to the live one.
pub const DEFAULT_MAX_LOG_FILES: u32 = 5;

const LOG_FILE_NAME: &str = "migdb.log";

/// Default log file: `<platform data dir>/migdb/migdb.log`, or under the
/// temp dir when no data dir is known.
pub fn default_log_file_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("migdb"))
        .unwrap_or_else(|| std::env::temp_dir().join("migdb"))
        .join(LOG_FILE_NAME)
}

/// Create the parent directory of a log file if needed.
pub fn ensure_log_dir(log_path: &Path) -> io::Result<()> {
    if let Some(parent) = log_path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Rotate when the current file reaches `max_size` bytes.
///
/// ```text
///   migdb.log   -> migdb.log.1
///   migdb.log.1 -> migdb.log.2
///   migdb.log.<max_files> is deleted
/// ```
pub fn rotate_log_files(log_path: &Path, max_size: u64, max_files: u32) -> io::Result<()> {
    if !log_path.exists() {
        return Ok(());
    }
    if fs::metadata(log_path)?.len() < max_size {
        return Ok(());
    }

    let oldest = rotated_path(log_path, max_files);
    if oldest.exists() {
        fs::remove_file(&oldest)?;
    }

    for i in (1..max_files).rev() {
        let from = rotated_path(log_path, i);
        if from.exists() {
            fs::rename(&from, rotated_path(log_path, i + 1))?;
        }
    }

    fs::rename(log_path, rotated_path(log_path, 1))?;
    Ok(())
}

fn rotated_path(base: &Path, index: u32) -> PathBuf {
    let name = base.file_name().unwrap_or_default().to_string_lossy();
    let parent = base.parent().unwrap_or_else(|| Path::new("."));
    parent.join(format!("{}.{}", name, index))
}
