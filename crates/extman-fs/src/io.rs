//! Atomic I/O operations with file locking

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use fs2::FileExt;
use tracing::{debug, warn};

use crate::{Error, Result};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Retry policy for copies from repositories that may sit on slow or shared
/// storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RobustnessConfig {
    /// Delay before the first retry.
    pub initial_interval: Duration,
    /// Give up once this much time has passed since the first attempt.
    pub max_elapsed: Duration,
}

impl Default for RobustnessConfig {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(50),
            max_elapsed: Duration::from_secs(2),
        }
    }
}

/// Write content atomically to a file with locking.
///
/// Uses write-to-temp-then-rename strategy to prevent partial writes.
/// Acquires an advisory lock to prevent concurrent access.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }

    // Temp file in the same directory so the rename stays on one filesystem
    let temp_name = format!(
        ".{}.{}.{}.tmp",
        path.file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default(),
        std::process::id(),
        TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    );
    let temp_path = path.with_file_name(&temp_name);

    let mut temp_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&temp_path)
        .map_err(|e| Error::io(&temp_path, e))?;

    temp_file
        .lock_exclusive()
        .map_err(|_| Error::LockFailed {
            path: path.to_path_buf(),
        })?;

    temp_file
        .write_all(content)
        .map_err(|e| Error::io(&temp_path, e))?;

    temp_file.sync_all().map_err(|e| Error::io(&temp_path, e))?;

    FileExt::unlock(&temp_file).map_err(|_| Error::LockFailed {
        path: path.to_path_buf(),
    })?;

    fs::rename(&temp_path, path).map_err(|e| Error::io(path, e))?;

    Ok(())
}

/// Read text content from a file.
pub fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| Error::io(path, e))
}

/// Write text content to a file atomically.
pub fn write_text(path: &Path, content: &str) -> Result<()> {
    write_atomic(path, content.as_bytes())
}

/// Remove a file. A file that is already gone is not an error.
pub fn remove_file(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io(path, e)),
    }
}

/// Copy `from` to `to` atomically, retrying transient failures.
///
/// A missing source is permanent and fails immediately. Other I/O errors are
/// retried with exponential backoff until `config.max_elapsed` runs out.
pub fn copy_with_retry(from: &Path, to: &Path, config: RobustnessConfig) -> Result<u64> {
    let policy = ExponentialBackoffBuilder::new()
        .with_initial_interval(config.initial_interval)
        .with_max_elapsed_time(Some(config.max_elapsed))
        .build();

    let mut attempt = 0u32;
    let op = || -> std::result::Result<u64, backoff::Error<Error>> {
        attempt += 1;
        let bytes = fs::read(from).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                backoff::Error::permanent(Error::io(from, e))
            } else {
                warn!(path = %from.display(), attempt, error = %e, "Copy failed, retrying");
                backoff::Error::transient(Error::io(from, e))
            }
        })?;
        write_atomic(to, &bytes).map_err(backoff::Error::transient)?;
        Ok(bytes.len() as u64)
    };

    let copied = backoff::retry(policy, op).map_err(|e| match e {
        backoff::Error::Permanent(err) => err,
        backoff::Error::Transient { err, .. } => err,
    })?;
    debug!(from = %from.display(), to = %to.display(), bytes = copied, "Copied file");
    Ok(copied)
}

/// Canonicalize an existing path without Windows verbatim prefixes.
pub fn canonicalize(path: &Path) -> Result<PathBuf> {
    dunce::canonicalize(path).map_err(|e| Error::io(path, e))
}
