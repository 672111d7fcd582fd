//! Cross-process directory locks.

use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::debug;

use crate::{Error, Result};

/// Name of the lock file placed in a locked directory.
pub const LOCK_FILE: &str = ".lock";

/// An exclusive advisory lock on `<dir>/.lock`, released on drop.
///
/// Two handles in the same process conflict as well, so callers that share a
/// directory across threads must serialize on their own lock first.
#[derive(Debug)]
pub struct DirectoryLock {
    file: File,
    path: PathBuf,
}

impl DirectoryLock {
    /// Block until the lock is held.
    pub fn acquire(dir: &Path) -> Result<Self> {
        let (file, path) = Self::open(dir)?;
        file.lock_exclusive()
            .map_err(|_| Error::LockFailed { path: path.clone() })?;
        debug!(path = %path.display(), "Acquired directory lock");
        Ok(Self { file, path })
    }

    /// Take the lock if it is free. `Ok(None)` means another holder has it.
    pub fn try_acquire(dir: &Path) -> Result<Option<Self>> {
        let (file, path) = Self::open(dir)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self { file, path })),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() || e.kind() == ErrorKind::WouldBlock => {
                Ok(None)
            }
            Err(_) => Err(Error::LockFailed { path }),
        }
    }

    fn open(dir: &Path) -> Result<(File, PathBuf)> {
        fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
        let path = dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| Error::io(&path, e))?;
        Ok((file, path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DirectoryLock {
    fn drop(&mut self) {
        if FileExt::unlock(&self.file).is_ok() {
            debug!(path = %self.path.display(), "Released directory lock");
        }
    }
}
