//! Usage: Owns the lifecycle of the single static-server child process.
//!
//! Two states: `Stopped` (no handle) and `Running` (handle present). `start` and `stop` are
//! idempotent with respect to that state; spawn failures leave the supervisor stopped and are
//! never fatal. A child that died on its own is reaped either by `refresh` or by the next `stop`.

use super::status::ServerStatus;
use crate::error::AppletError;
use crate::infra::process;
pub use crate::infra::process::StopOutcome;
use std::path::PathBuf;
use std::process::Child;
use std::time::Duration;

pub const SERVER_PORT: u16 = 8000;
pub const SERVER_HOST: &str = "127.0.0.1";

/// Validated launch parameters for the static server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerLaunch {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    pub port: u16,
    pub stop_timeout: Duration,
}

impl ServerLaunch {
    pub fn base_url(&self) -> String {
        format!("http://{SERVER_HOST}:{}/", self.port)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Started { pid: u32 },
    AlreadyRunning { pid: u32 },
    SpawnFailed,
    Stopped(StopOutcome),
    AlreadyStopped,
}

#[derive(Debug)]
pub struct ServerSupervisor {
    launch: ServerLaunch,
    child: Option<Child>,
}

impl ServerSupervisor {
    pub fn new(launch: ServerLaunch) -> Self {
        Self {
            launch,
            child: None,
        }
    }

    pub fn launch(&self) -> &ServerLaunch {
        &self.launch
    }

    pub fn is_running(&self) -> bool {
        self.child.is_some()
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    pub fn status(&self) -> ServerStatus {
        ServerStatus {
            running: self.is_running(),
            pid: self.pid(),
            port: self.launch.port,
            base_url: self.launch.base_url(),
        }
    }

    pub fn start(&mut self) -> Transition {
        if let Some(pid) = self.pid() {
            tracing::debug!(pid, "start ignored: server already running");
            return Transition::AlreadyRunning { pid };
        }

        tracing::info!(
            program = %self.launch.program,
            dir = %self.launch.working_dir.display(),
            port = self.launch.port,
            "starting static server"
        );

        match process::spawn_detached_stdio(
            &self.launch.program,
            &self.launch.args,
            &self.launch.working_dir,
        ) {
            Ok(child) => {
                let pid = child.id();
                tracing::info!(pid, url = %self.launch.base_url(), "static server started");
                self.child = Some(child);
                Transition::Started { pid }
            }
            Err(source) => {
                let err = AppletError::Spawn {
                    program: self.launch.program.clone(),
                    source,
                };
                tracing::error!("{}", err);
                Transition::SpawnFailed
            }
        }
    }

    pub fn stop(&mut self) -> Transition {
        let Some(mut child) = self.child.take() else {
            tracing::debug!("stop ignored: server not running");
            return Transition::AlreadyStopped;
        };

        tracing::info!(pid = child.id(), "stopping static server");
        let outcome = process::terminate_and_reap(&mut child, self.launch.stop_timeout);
        Transition::Stopped(outcome)
    }

    /// Reaps a child that exited on its own. Returns `true` when that flipped the state.
    pub fn refresh(&mut self) -> bool {
        let Some(child) = self.child.as_mut() else {
            return false;
        };

        match child.try_wait() {
            Ok(Some(status)) => {
                tracing::warn!(pid = child.id(), %status, "static server exited unexpectedly");
                self.child = None;
                true
            }
            Ok(None) => false,
            Err(err) => {
                tracing::warn!(pid = child.id(), "failed to poll static server: {}", err);
                false
            }
        }
    }
}

impl Drop for ServerSupervisor {
    fn drop(&mut self) {
        if self.child.is_some() {
            self.stop();
        }
    }
}
