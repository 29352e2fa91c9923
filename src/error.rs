//! Usage: Applet error type shared by the instance guard, settings and supervisor.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppletError {
    /// Another process holds the instance lock.
    #[error("INSTANCE_ALREADY_RUNNING: another instance holds {}", path.display())]
    AlreadyRunning { path: PathBuf },

    /// The lock file could not be opened or locked for a reason other than contention.
    #[error("INSTANCE_LOCK_IO: {}: {source}", path.display())]
    LockIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CONFIG_INVALID: {0}")]
    ConfigInvalid(String),

    #[error("SETTINGS: {0}")]
    Settings(String),

    #[error("SERVER_SPAWN: failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl AppletError {
    /// Process exit status used when this error aborts startup.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppletError::AlreadyRunning { .. } | AppletError::LockIo { .. } => 1,
            AppletError::ConfigInvalid(_) | AppletError::Settings(_) => 2,
            AppletError::Spawn { .. } => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, AppletError>;
