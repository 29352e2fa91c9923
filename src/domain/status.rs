//! Usage: Server status snapshot pushed to the UI after every supervisor operation.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrayIconState {
    Connected,
    Disconnected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerStatus {
    pub running: bool,
    pub pid: Option<u32>,
    pub port: u16,
    pub base_url: String,
}

impl ServerStatus {
    pub fn start_enabled(&self) -> bool {
        !self.running
    }

    pub fn stop_enabled(&self) -> bool {
        self.running
    }

    pub fn open_browser_enabled(&self) -> bool {
        self.running
    }

    pub fn icon(&self) -> TrayIconState {
        if self.running {
            TrayIconState::Connected
        } else {
            TrayIconState::Disconnected
        }
    }

    pub fn tooltip(&self) -> &'static str {
        if self.running {
            "Server running"
        } else {
            "Server stopped"
        }
    }
}

/// Receives the derived status; implemented by the tray (or by tests).
///
/// Called while the owner of the controller is locked. Implementations must hand the update off
/// rather than wait on a thread that may need that same lock.
pub trait StatusSink: Send {
    fn reflect(&self, status: &ServerStatus);
}
