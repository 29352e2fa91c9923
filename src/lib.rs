mod app;
mod domain;
pub mod error;
mod infra;
mod shared;

pub use app::{controller, logging, startup};
pub use domain::{status, supervisor};
pub use infra::{app_paths, instance_lock, settings};

#[cfg(feature = "tray")]
pub fn run() -> i32 {
    use app::controller::{Applet, AppletController};
    use app::resident::{self, AppletState};
    use shared::mutex_ext::MutexExt;
    use tauri::Manager;

    let paths = match app_paths::AppPaths::resolve() {
        Ok(paths) => paths,
        Err(err) => {
            eprintln!("{err}");
            return 1;
        }
    };

    // Nothing else may touch the filesystem before this succeeds.
    let lock = match instance_lock::InstanceLock::acquire(&paths.lock_path) {
        Ok(lock) => lock,
        Err(err) => {
            eprintln!("{err}");
            return err.exit_code();
        }
    };

    let mut log_guard = app::logging::init(&paths.log_dir());
    tracing::info!(lock = %lock.path().display(), "instance lock acquired");

    let startup::Bootstrap { lock, config } = match startup::configure(lock, &paths) {
        Ok(boot) => boot,
        Err(err) => {
            tracing::error!("configuration error: {}", err);
            app::error_dialog::show_fatal(&startup::failure_message(&err, &paths));
            return err.exit_code();
        }
    };

    let app = tauri::Builder::default()
        .manage(AppletState::default())
        .plugin(tauri_plugin_opener::init())
        .setup(move |app| {
            let sink = resident::setup_tray(app.handle(), &config.icons)?;
            let controller = AppletController::new(config.launch, Box::new(sink));
            app.state::<AppletState>()
                .0
                .lock_or_recover()
                .replace(Applet::new(controller, lock));

            resident::spawn_liveness_poller(app.handle().clone());
            tracing::info!("tray ready");
            Ok(())
        })
        .build(tauri::generate_context!());

    let app = match app {
        Ok(app) => app,
        Err(err) => {
            tracing::error!("failed to build tauri application: {}", err);
            return 1;
        }
    };

    app.run(move |app_handle, event| match event {
        // Tray-resident: only an explicit quit (code = Some) ends the process.
        tauri::RunEvent::ExitRequested { code: None, api, .. } => api.prevent_exit(),
        tauri::RunEvent::Exit => {
            resident::shutdown(app_handle);
            drop(log_guard.take());
        }
        _ => {}
    });

    0
}
