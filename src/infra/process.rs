//! Usage: Child process plumbing (detached-stdio spawn, graceful terminate, bounded reap).

use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(25);

#[cfg(windows)]
fn hide_window_cmd(program: &str) -> Command {
    let mut cmd = Command::new(program);
    use std::os::windows::process::CommandExt;
    const CREATE_NO_WINDOW: u32 = 0x08000000;
    cmd.creation_flags(CREATE_NO_WINDOW);
    cmd
}

#[cfg(not(windows))]
fn hide_window_cmd(program: &str) -> Command {
    Command::new(program)
}

/// Spawns `program` in `cwd` with all standard streams discarded.
pub(crate) fn spawn_detached_stdio(
    program: &str,
    args: &[String],
    cwd: &Path,
) -> std::io::Result<Child> {
    let mut cmd = hide_window_cmd(program);
    cmd.args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    cmd.spawn()
}

/// How a child ended up being stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The child had already exited before any signal was sent.
    AlreadyExited,
    /// The child exited after the graceful signal.
    Terminated,
    /// The child ignored the graceful signal past the timeout and was killed.
    Killed,
}

#[cfg(unix)]
fn send_graceful_signal(child: &mut Child) -> std::io::Result<()> {
    let pid = libc::pid_t::try_from(child.id())
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "pid out of range"))?;
    // SAFETY: plain kill(2) on a pid we spawned and have not reaped yet.
    let result = unsafe { libc::kill(pid, libc::SIGTERM) };
    if result == 0 {
        return Ok(());
    }
    let err = std::io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        return Ok(());
    }
    Err(err)
}

#[cfg(not(unix))]
fn send_graceful_signal(child: &mut Child) -> std::io::Result<()> {
    child.kill()
}

fn wait_with_deadline(child: &mut Child, timeout: Duration) -> std::io::Result<Option<ExitStatus>> {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if start.elapsed() >= timeout {
            return Ok(None);
        }
        std::thread::sleep(WAIT_POLL_INTERVAL);
    }
}

/// Sends the graceful signal, waits up to `timeout`, then kills. Always reaps the child.
pub(crate) fn terminate_and_reap(child: &mut Child, timeout: Duration) -> StopOutcome {
    let pid = child.id();

    match child.try_wait() {
        Ok(Some(status)) => {
            tracing::info!(pid, %status, "server process had already exited");
            return StopOutcome::AlreadyExited;
        }
        Ok(None) => {}
        Err(err) => tracing::warn!(pid, "failed to poll server process: {}", err),
    }

    if let Err(err) = send_graceful_signal(child) {
        tracing::warn!(pid, "failed to signal server process: {}", err);
    }

    match wait_with_deadline(child, timeout) {
        Ok(Some(status)) => {
            tracing::info!(pid, %status, "server process exited");
            return StopOutcome::Terminated;
        }
        Ok(None) => {
            tracing::warn!(
                pid,
                "server process did not exit within {}ms; killing",
                timeout.as_millis()
            );
        }
        Err(err) => tracing::warn!(pid, "failed to wait for server process: {}", err),
    }

    if let Err(err) = child.kill() {
        tracing::warn!(pid, "failed to kill server process: {}", err);
    }
    match child.wait() {
        Ok(status) => tracing::info!(pid, %status, "server process killed"),
        Err(err) => tracing::error!(pid, "failed to reap server process: {}", err),
    }
    StopOutcome::Killed
}
