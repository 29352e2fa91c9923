//! Usage: Single-instance guard backed by a non-blocking exclusive advisory file lock.
//!
//! The lock file is created empty and never written; only the lock state matters. It is left on
//! disk after release. Dropping an [`InstanceLock`] without calling [`InstanceLock::release`]
//! closes the descriptor, which the OS treats as an unlock.

use crate::error::{AppletError, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct InstanceLock {
    path: PathBuf,
    file: File,
}

fn is_contended(err: &std::io::Error) -> bool {
    let contended = fs2::lock_contended_error();
    err.kind() == contended.kind()
        || (err.raw_os_error().is_some() && err.raw_os_error() == contended.raw_os_error())
}

impl InstanceLock {
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| AppletError::LockIo {
                path: path.to_path_buf(),
                source,
            })?;
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|source| AppletError::LockIo {
                path: path.to_path_buf(),
                source,
            })?;

        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "instance lock acquired");
                Ok(Self {
                    path: path.to_path_buf(),
                    file,
                })
            }
            Err(err) if is_contended(&err) => Err(AppletError::AlreadyRunning {
                path: path.to_path_buf(),
            }),
            Err(source) => Err(AppletError::LockIo {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Unlocks and closes the lock file. Consumes the guard so it cannot run twice.
    pub fn release(self) {
        if let Err(err) = FileExt::unlock(&self.file) {
            // Closing the descriptor below still drops the lock.
            tracing::warn!(path = %self.path.display(), "instance unlock failed: {}", err);
        }
        tracing::debug!(path = %self.path.display(), "instance lock released");
        drop(self.file);
    }
}
