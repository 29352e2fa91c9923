//! Usage: Startup sequence (instance lock first, then settings validation).

use crate::app_paths::AppPaths;
use crate::error::AppletError;
use crate::instance_lock::InstanceLock;
use crate::settings::{self, AppletConfig, AppletSettings};

/// Everything a running applet needs once startup succeeded.
#[derive(Debug)]
pub struct Bootstrap {
    pub lock: InstanceLock,
    pub config: AppletConfig,
}

/// Loads and validates settings under an already held instance lock.
///
/// The caller acquires the lock itself so that nothing (logging included) touches the
/// filesystem before it is held. On a configuration failure the lock is released before returning, so the caller only has to
/// report the error and exit with [`AppletError::exit_code`].
pub fn configure(lock: InstanceLock, paths: &AppPaths) -> Result<Bootstrap, AppletError> {
    match load_config(paths) {
        Ok(config) => Ok(Bootstrap { lock, config }),
        Err(err) => {
            lock.release();
            Err(err)
        }
    }
}

/// Text shown to the user when startup fails and the process is about to exit.
pub fn failure_message(err: &AppletError, paths: &AppPaths) -> String {
    format!(
        "Server applet could not start.\n\n{err}\n\nLogs: {}",
        paths.log_dir().display()
    )
}

fn load_config(paths: &AppPaths) -> Result<AppletConfig, AppletError> {
    let mut settings = settings::read(&paths.settings_path())?;
    settings::apply_env_overrides(&mut settings);
    validate(&settings, paths)
}

fn validate(settings: &AppletSettings, paths: &AppPaths) -> Result<AppletConfig, AppletError> {
    settings.validate().map_err(|err| match err {
        AppletError::ConfigInvalid(msg) => AppletError::ConfigInvalid(format!(
            "{msg}; edit {} and set server_dir",
            paths.settings_path().display()
        )),
        other => other,
    })
}
