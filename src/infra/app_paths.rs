//! Usage: Resolve per-user app directory, settings/log locations and the instance lock path.

use std::path::{Path, PathBuf};

pub const APP_ID: &str = "my-vis-server-applet";
pub const APP_DOTDIR_NAME: &str = ".server-applet";
const APP_DOTDIR_NAME_ENV: &str = "SERVER_APPLET_DOTDIR_NAME";

fn is_safe_dotdir_name(name: &str) -> bool {
    if name.is_empty() || name == "." || name == ".." {
        return false;
    }
    if !name.starts_with('.') {
        return false;
    }
    if name.contains('/') || name.contains('\\') {
        return false;
    }
    name.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_')
}

fn dotdir_name() -> String {
    std::env::var(APP_DOTDIR_NAME_ENV)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| is_safe_dotdir_name(v))
        .unwrap_or_else(|| APP_DOTDIR_NAME.to_string())
}

/// Filesystem locations used by one applet process.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub app_dir: PathBuf,
    pub lock_path: PathBuf,
}

impl AppPaths {
    /// Default layout: `~/.server-applet` for data, `<temp>/my-vis-server-applet.lock` for the lock.
    pub fn resolve() -> Result<Self, String> {
        let home_dir = dirs::home_dir().ok_or_else(|| "failed to resolve home dir".to_string())?;
        Ok(Self {
            app_dir: home_dir.join(dotdir_name()),
            lock_path: default_lock_path(),
        })
    }

    pub fn under(root: &Path) -> Self {
        Self {
            app_dir: root.join(APP_DOTDIR_NAME),
            lock_path: root.join(format!("{APP_ID}.lock")),
        }
    }

    pub fn settings_path(&self) -> PathBuf {
        self.app_dir.join("settings.json")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.app_dir.join("logs")
    }
}

pub fn default_lock_path() -> PathBuf {
    std::env::temp_dir().join(format!("{APP_ID}.lock"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_dotdir_name_rules() {
        assert!(is_safe_dotdir_name(".server-applet"));
        assert!(is_safe_dotdir_name(".applet_dev.2"));
        assert!(!is_safe_dotdir_name("server-applet"));
        assert!(!is_safe_dotdir_name(".."));
        assert!(!is_safe_dotdir_name(".a/b"));
        assert!(!is_safe_dotdir_name(".a b"));
    }

    #[test]
    fn lock_path_is_named_after_app_id() {
        let path = default_lock_path();
        assert_eq!(
            path.file_name().and_then(|v| v.to_str()),
            Some("my-vis-server-applet.lock")
        );
    }

    #[test]
    fn under_keeps_everything_inside_root() {
        let root = Path::new("/scratch");
        let paths = AppPaths::under(root);
        assert!(paths.settings_path().starts_with(root));
        assert!(paths.log_dir().starts_with(root));
        assert!(paths.lock_path.starts_with(root));
    }
}
