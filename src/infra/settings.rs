//! Usage: Persisted applet settings (schema + read/write helpers + startup validation).

use crate::error::{AppletError, Result};
use crate::shared::fs::{read_optional_file, require_dir, require_file, write_file_atomic};
use crate::supervisor::{ServerLaunch, SERVER_PORT};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const SCHEMA_VERSION: u32 = 1;
pub const PORT_PLACEHOLDER: &str = "{port}";
const DEFAULT_SERVER_PROGRAM: &str = "python3";
const DEFAULT_STOP_TIMEOUT_MS: u64 = 5_000;
const MIN_STOP_TIMEOUT_MS: u64 = 100;
const MAX_STOP_TIMEOUT_MS: u64 = 60_000;
const SERVER_DIR_ENV: &str = "SERVER_APPLET_SERVER_DIR";

fn default_server_args() -> Vec<String> {
    ["-m", "http.server", PORT_PLACEHOLDER, "--bind", "127.0.0.1"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppletSettings {
    pub schema_version: u32,
    // Static root served by the child process.
    pub server_dir: String,
    pub server_program: String,
    // `{port}` is substituted with the fixed server port.
    pub server_args: Vec<String>,
    // Optional PNG overrides for the two tray states; empty means built-in icons.
    pub icon_connected: String,
    pub icon_disconnected: String,
    pub stop_timeout_ms: u64,
}

impl Default for AppletSettings {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            server_dir: String::new(),
            server_program: DEFAULT_SERVER_PROGRAM.to_string(),
            server_args: default_server_args(),
            icon_connected: String::new(),
            icon_disconnected: String::new(),
            stop_timeout_ms: DEFAULT_STOP_TIMEOUT_MS,
        }
    }
}

/// Icon overrides that passed validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrayIconPaths {
    pub connected: Option<PathBuf>,
    pub disconnected: Option<PathBuf>,
}

/// Settings after startup validation; everything the applet needs to run.
#[derive(Debug, Clone)]
pub struct AppletConfig {
    pub launch: ServerLaunch,
    pub icons: TrayIconPaths,
}

fn sanitize_stop_timeout(settings: &mut AppletSettings) -> bool {
    let clamped = settings
        .stop_timeout_ms
        .clamp(MIN_STOP_TIMEOUT_MS, MAX_STOP_TIMEOUT_MS);
    if clamped != settings.stop_timeout_ms {
        settings.stop_timeout_ms = clamped;
        return true;
    }
    false
}

fn sanitize_server_program(settings: &mut AppletSettings) -> bool {
    let trimmed = settings.server_program.trim();
    if trimmed.is_empty() {
        settings.server_program = DEFAULT_SERVER_PROGRAM.to_string();
        return true;
    }
    if trimmed.len() != settings.server_program.len() {
        settings.server_program = trimmed.to_string();
        return true;
    }
    false
}

fn migrate_schema_version(settings: &mut AppletSettings) -> bool {
    if settings.schema_version != SCHEMA_VERSION {
        settings.schema_version = SCHEMA_VERSION;
        return true;
    }
    false
}

fn parse_settings_json(content: &[u8]) -> Result<AppletSettings> {
    serde_json::from_slice(content)
        .map_err(|e| AppletError::Settings(format!("failed to parse settings.json: {e}")))
}

pub fn read(path: &Path) -> Result<AppletSettings> {
    let Some(content) = read_optional_file(path).map_err(AppletError::Settings)? else {
        let settings = AppletSettings::default();
        // Best-effort: create default settings.json on first read to make the config discoverable/editable.
        if let Err(err) = write(path, &settings) {
            tracing::warn!("failed to write default settings: {}", err);
        }
        return Ok(settings);
    };

    let mut settings = parse_settings_json(&content)?;

    let mut repaired = false;
    repaired |= migrate_schema_version(&mut settings);
    repaired |= sanitize_server_program(&mut settings);
    repaired |= sanitize_stop_timeout(&mut settings);
    if repaired {
        // Best-effort: persist repaired values while keeping read semantics.
        if let Err(err) = write(path, &settings) {
            tracing::warn!("failed to persist repaired settings: {}", err);
        }
    }

    Ok(settings)
}

pub fn write(path: &Path, settings: &AppletSettings) -> Result<AppletSettings> {
    if settings.stop_timeout_ms < MIN_STOP_TIMEOUT_MS || settings.stop_timeout_ms > MAX_STOP_TIMEOUT_MS
    {
        return Err(AppletError::Settings(format!(
            "stop_timeout_ms must be between {MIN_STOP_TIMEOUT_MS} and {MAX_STOP_TIMEOUT_MS}"
        )));
    }

    let content = serde_json::to_vec_pretty(settings)
        .map_err(|e| AppletError::Settings(format!("failed to serialize settings: {e}")))?;
    write_file_atomic(path, &content).map_err(AppletError::Settings)?;

    Ok(settings.clone())
}

/// Applies `SERVER_APPLET_SERVER_DIR` on top of the persisted value.
pub fn apply_env_overrides(settings: &mut AppletSettings) {
    apply_server_dir_override(settings, std::env::var(SERVER_DIR_ENV).ok());
}

fn apply_server_dir_override(settings: &mut AppletSettings, value: Option<String>) {
    let Some(value) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) else {
        return;
    };
    tracing::info!(server_dir = %value, "server_dir overridden by {}", SERVER_DIR_ENV);
    settings.server_dir = value;
}

fn optional_icon(raw: &str, what: &str) -> Result<Option<PathBuf>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let path = PathBuf::from(raw);
    require_file(&path, what).map_err(AppletError::ConfigInvalid)?;
    Ok(Some(path))
}

impl AppletSettings {
    /// Checks the working directory and assets once, before any supervisor exists.
    pub fn validate(&self) -> Result<AppletConfig> {
        let working_dir = PathBuf::from(self.server_dir.trim());
        require_dir(&working_dir, "server_dir").map_err(AppletError::ConfigInvalid)?;

        let program = self.server_program.trim();
        if program.is_empty() {
            return Err(AppletError::ConfigInvalid(
                "server_program is not configured".to_string(),
            ));
        }

        let icons = TrayIconPaths {
            connected: optional_icon(&self.icon_connected, "icon_connected")?,
            disconnected: optional_icon(&self.icon_disconnected, "icon_disconnected")?,
        };

        let port = SERVER_PORT.to_string();
        let args = self
            .server_args
            .iter()
            .map(|arg| arg.replace(PORT_PLACEHOLDER, &port))
            .collect();

        Ok(AppletConfig {
            launch: ServerLaunch {
                program: program.to_string(),
                args,
                working_dir,
                port: SERVER_PORT,
                stop_timeout: Duration::from_millis(
                    self.stop_timeout_ms
                        .clamp(MIN_STOP_TIMEOUT_MS, MAX_STOP_TIMEOUT_MS),
                ),
            },
            icons,
        })
    }
}
