//! Usage: Top-level controller driven by UI events (start/stop/open/quit).

use crate::instance_lock::InstanceLock;
use crate::status::{ServerStatus, StatusSink};
use crate::supervisor::{ServerLaunch, ServerSupervisor, Transition};

pub struct AppletController {
    supervisor: ServerSupervisor,
    sink: Box<dyn StatusSink>,
}

impl AppletController {
    pub fn new(launch: ServerLaunch, sink: Box<dyn StatusSink>) -> Self {
        let controller = Self {
            supervisor: ServerSupervisor::new(launch),
            sink,
        };
        controller.reflect();
        controller
    }

    fn reflect(&self) {
        self.sink.reflect(&self.supervisor.status());
    }

    pub fn status(&self) -> ServerStatus {
        self.supervisor.status()
    }

    pub fn is_running(&self) -> bool {
        self.supervisor.is_running()
    }

    pub fn start(&mut self) -> Transition {
        let transition = self.supervisor.start();
        self.reflect();
        transition
    }

    pub fn stop(&mut self) -> Transition {
        let transition = self.supervisor.stop();
        self.reflect();
        transition
    }

    /// Liveness poll; reflects only when the child went away on its own.
    pub fn refresh(&mut self) -> bool {
        let changed = self.supervisor.refresh();
        if changed {
            self.reflect();
        }
        changed
    }

    /// URL for the "open browser" action; `None` while the server is stopped.
    pub fn browser_url(&self) -> Option<String> {
        self.is_running().then(|| self.supervisor.launch().base_url())
    }
}

/// A running applet: the controller plus the instance lock it was started under.
pub struct Applet {
    controller: AppletController,
    lock: InstanceLock,
}

impl Applet {
    pub fn new(controller: AppletController, lock: InstanceLock) -> Self {
        Self { controller, lock }
    }

    pub fn controller(&self) -> &AppletController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut AppletController {
        &mut self.controller
    }

    /// Quit path: stop the child first, then release the lock.
    pub fn shutdown(self) {
        let Applet {
            mut controller,
            lock,
        } = self;
        tracing::info!("shutting down");
        controller.stop();
        drop(controller);
        lock.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::TrayIconState;
    use crate::supervisor::SERVER_PORT;
    use std::sync::{mpsc, Arc, Mutex};
    use std::time::{Duration, Instant};

    #[derive(Clone, Default)]
    struct RecordingSink(Arc<Mutex<Vec<ServerStatus>>>);

    impl RecordingSink {
        fn seen(&self) -> Vec<ServerStatus> {
            self.0.lock().expect("lock").clone()
        }
    }

    impl StatusSink for RecordingSink {
        fn reflect(&self, status: &ServerStatus) {
            self.0.lock().expect("lock").push(status.clone());
        }
    }

    /// Queues statuses for a separate UI thread without waiting for it to apply them.
    struct HandOffSink(mpsc::Sender<ServerStatus>);

    impl StatusSink for HandOffSink {
        fn reflect(&self, status: &ServerStatus) {
            let _ = self.0.send(status.clone());
        }
    }

    fn launch(dir: &std::path::Path, program: &str, args: &[&str]) -> ServerLaunch {
        ServerLaunch {
            program: program.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            working_dir: dir.to_path_buf(),
            port: SERVER_PORT,
            stop_timeout: Duration::from_secs(2),
        }
    }

    #[test]
    fn construction_reflects_initial_stopped_state() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sink = RecordingSink::default();
        let controller =
            AppletController::new(launch(dir.path(), "sleep", &["30"]), Box::new(sink.clone()));

        let seen = sink.seen();
        assert_eq!(seen.len(), 1);
        assert!(!seen[0].running);
        assert!(controller.browser_url().is_none());
    }

    #[test]
    fn failed_start_reflects_disconnected_state() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sink = RecordingSink::default();
        let mut controller = AppletController::new(
            launch(dir.path(), "server-applet-no-such-binary", &[]),
            Box::new(sink.clone()),
        );

        assert_eq!(controller.start(), Transition::SpawnFailed);
        let last = sink.seen().pop().expect("reflected");
        assert_eq!(last.icon(), TrayIconState::Disconnected);
        assert!(last.start_enabled());
    }

    #[cfg(unix)]
    #[test]
    fn normal_lifecycle_then_quit_releases_lock() {
        let root = tempfile::tempdir().expect("tempdir");
        let lock_path = root.path().join("applet.lock");
        let lock = InstanceLock::acquire(&lock_path).expect("acquire");

        let sink = RecordingSink::default();
        let controller =
            AppletController::new(launch(root.path(), "sleep", &["30"]), Box::new(sink.clone()));
        let mut applet = Applet::new(controller, lock);

        assert!(matches!(
            applet.controller_mut().start(),
            Transition::Started { .. }
        ));
        assert!(applet.controller().is_running());
        let running = sink.seen().pop().expect("reflected");
        assert!(running.open_browser_enabled());
        assert_eq!(running.icon(), TrayIconState::Connected);
        assert_eq!(
            applet.controller().browser_url().as_deref(),
            Some("http://127.0.0.1:8000/")
        );

        assert!(matches!(applet.controller_mut().stop(), Transition::Stopped(_)));
        assert!(!applet.controller().is_running());
        assert!(!sink.seen().pop().expect("reflected").open_browser_enabled());

        applet.shutdown();
        InstanceLock::acquire(&lock_path)
            .expect("lock free after quit")
            .release();
    }

    #[cfg(unix)]
    #[test]
    fn quit_while_running_stops_child_before_releasing_lock() {
        let root = tempfile::tempdir().expect("tempdir");
        let lock_path = root.path().join("applet.lock");
        let lock = InstanceLock::acquire(&lock_path).expect("acquire");

        let sink = RecordingSink::default();
        let mut controller =
            AppletController::new(launch(root.path(), "sleep", &["30"]), Box::new(sink.clone()));
        controller.start();
        let pid = controller.status().pid.expect("pid");

        Applet::new(controller, lock).shutdown();

        assert!(!sink.seen().pop().expect("reflected").running);
        let alive = unsafe { libc::kill(pid as libc::pid_t, 0) } == 0;
        assert!(!alive, "child {pid} still present after quit");
        InstanceLock::acquire(&lock_path)
            .expect("lock free after quit")
            .release();
    }

    #[cfg(unix)]
    #[test]
    fn refresh_reflects_unexpected_exit() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sink = RecordingSink::default();
        let mut controller = AppletController::new(
            launch(dir.path(), "sh", &["-c", "exit 0"]),
            Box::new(sink.clone()),
        );
        controller.start();
        let reflected_before = sink.seen().len();

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while !controller.refresh() {
            assert!(std::time::Instant::now() < deadline, "child never exited");
            std::thread::sleep(Duration::from_millis(20));
        }

        let seen = sink.seen();
        assert_eq!(seen.len(), reflected_before + 1);
        assert!(!seen[seen.len() - 1].running);
        assert!(controller.browser_url().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn refresh_under_lock_completes_while_ui_thread_waits_for_that_lock() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (status_tx, status_rx) = mpsc::channel::<ServerStatus>();
        let controller = AppletController::new(
            launch(dir.path(), "sh", &["-c", "sleep 0.2"]),
            Box::new(HandOffSink(status_tx)),
        );
        let shared = Arc::new(Mutex::new(controller));

        // Applying a status needs the controller lock, like a tray menu handler does.
        let ui_shared = Arc::downgrade(&shared);
        let (applied_tx, applied_rx) = mpsc::channel();
        let ui = std::thread::spawn(move || {
            for status in status_rx {
                if let Some(controller) = ui_shared.upgrade() {
                    let _guard = controller.lock().expect("lock");
                }
                if applied_tx.send(status.running).is_err() {
                    break;
                }
            }
        });

        {
            let mut guard = shared.lock().expect("lock");
            assert!(matches!(guard.start(), Transition::Started { .. }));
            let deadline = Instant::now() + Duration::from_secs(5);
            while !guard.refresh() {
                assert!(Instant::now() < deadline, "child never exited");
                std::thread::sleep(Duration::from_millis(20));
            }
            assert!(!guard.is_running());
        }

        let applied: Vec<bool> = (0..3)
            .map(|_| {
                applied_rx
                    .recv_timeout(Duration::from_secs(5))
                    .expect("status applied by ui thread")
            })
            .collect();
        assert_eq!(applied, vec![false, true, false]);

        drop(shared);
        ui.join().expect("ui thread");
    }
}
