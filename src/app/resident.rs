//! Usage: Desktop resident mode (tray icon, menu actions, liveness polling).

use super::controller::Applet;
use crate::settings::TrayIconPaths;
use crate::shared::mutex_ext::MutexExt;
use crate::status::{ServerStatus, StatusSink, TrayIconState};
use crate::supervisor::SERVER_PORT;
use std::sync::Mutex;
use std::time::Duration;
use tauri::image::Image;
use tauri::menu::{Menu, MenuItem, PredefinedMenuItem};
use tauri::tray::{TrayIcon, TrayIconBuilder};
use tauri::{AppHandle, Manager, Wry};
use tauri_plugin_opener::OpenerExt;

const TRAY_ID: &str = "server-tray";
const TRAY_MENU_START_ID: &str = "server.start";
const TRAY_MENU_STOP_ID: &str = "server.stop";
const TRAY_MENU_OPEN_ID: &str = "server.open";
const TRAY_MENU_QUIT_ID: &str = "app.quit";
const LIVENESS_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Tauri-managed slot for the running applet; emptied on exit.
#[derive(Default)]
pub struct AppletState(pub Mutex<Option<Applet>>);

/// Tray widgets updated on every status change; cheap to clone into a main-thread task.
#[derive(Clone)]
struct TrayHandles {
    tray: TrayIcon<Wry>,
    start_item: MenuItem<Wry>,
    stop_item: MenuItem<Wry>,
    open_item: MenuItem<Wry>,
    icon_connected: Image<'static>,
    icon_disconnected: Image<'static>,
}

impl TrayHandles {
    fn apply(&self, status: &ServerStatus) {
        let items = [
            (&self.start_item, status.start_enabled()),
            (&self.stop_item, status.stop_enabled()),
            (&self.open_item, status.open_browser_enabled()),
        ];
        for (item, enabled) in items {
            if let Err(err) = item.set_enabled(enabled) {
                tracing::warn!("failed to update tray menu item {:?}: {}", item.id(), err);
            }
        }

        let icon = match status.icon() {
            TrayIconState::Connected => self.icon_connected.clone(),
            TrayIconState::Disconnected => self.icon_disconnected.clone(),
        };
        if let Err(err) = self.tray.set_icon(Some(icon)) {
            tracing::warn!("failed to update tray icon: {}", err);
        }
        if let Err(err) = self.tray.set_tooltip(Some(status.tooltip())) {
            tracing::warn!("failed to update tray tooltip: {}", err);
        }
    }
}

/// Mirrors `ServerStatus` onto the tray menu and icon.
///
/// `reflect` runs with `AppletState` locked, possibly on the liveness thread, while a menu
/// handler on the main thread may be waiting for that lock. Off-thread widget setters block on
/// the event loop, so updates are queued onto the main thread and never awaited.
pub struct TraySink {
    app: AppHandle,
    handles: TrayHandles,
}

impl StatusSink for TraySink {
    fn reflect(&self, status: &ServerStatus) {
        let handles = self.handles.clone();
        let status = status.clone();
        if let Err(err) = self.app.run_on_main_thread(move || handles.apply(&status)) {
            tracing::warn!("failed to schedule tray update: {}", err);
        }
    }
}

fn load_icon(
    custom: Option<&std::path::Path>,
    builtin: &'static [u8],
) -> Result<Image<'static>, String> {
    match custom {
        Some(path) => Image::from_path(path)
            .map_err(|e| format!("failed to load tray icon {}: {e}", path.display())),
        None => Image::from_bytes(builtin).map_err(|e| format!("failed to load tray icon: {e}")),
    }
}

fn with_applet<T>(app: &AppHandle, f: impl FnOnce(&mut Applet) -> T) -> Option<T> {
    let state = app.state::<AppletState>();
    let mut guard = state.0.lock_or_recover();
    guard.as_mut().map(f)
}

fn open_browser(app: &AppHandle) {
    let Some(url) = with_applet(app, |applet| applet.controller().browser_url()).flatten() else {
        return;
    };
    tracing::info!(url = %url, "opening browser");
    if let Err(err) = app.opener().open_url(url, None::<&str>) {
        tracing::error!("failed to open browser: {}", err);
    }
}

fn on_menu_event(app: &AppHandle, id: &str) {
    match id {
        TRAY_MENU_START_ID => {
            with_applet(app, |applet| applet.controller_mut().start());
        }
        TRAY_MENU_STOP_ID => {
            with_applet(app, |applet| applet.controller_mut().stop());
        }
        TRAY_MENU_OPEN_ID => open_browser(app),
        TRAY_MENU_QUIT_ID => {
            tracing::info!("quit requested from tray");
            app.exit(0);
        }
        _ => {}
    }
}

pub fn setup_tray(app: &AppHandle, icons: &TrayIconPaths) -> Result<TraySink, String> {
    let start_item = MenuItem::with_id(
        app,
        TRAY_MENU_START_ID,
        format!("Start server (port {SERVER_PORT})"),
        true,
        None::<&str>,
    )
    .map_err(|e| format!("failed to create tray start menu item: {e}"))?;
    let stop_item = MenuItem::with_id(app, TRAY_MENU_STOP_ID, "Stop server", false, None::<&str>)
        .map_err(|e| format!("failed to create tray stop menu item: {e}"))?;
    let open_item = MenuItem::with_id(
        app,
        TRAY_MENU_OPEN_ID,
        format!("Open http://127.0.0.1:{SERVER_PORT}"),
        false,
        None::<&str>,
    )
    .map_err(|e| format!("failed to create tray open menu item: {e}"))?;
    let quit_item = MenuItem::with_id(app, TRAY_MENU_QUIT_ID, "Quit", true, None::<&str>)
        .map_err(|e| format!("failed to create tray quit menu item: {e}"))?;
    let separator = PredefinedMenuItem::separator(app)
        .map_err(|e| format!("failed to create tray menu separator: {e}"))?;

    let menu = Menu::with_items(
        app,
        &[&start_item, &stop_item, &open_item, &separator, &quit_item],
    )
    .map_err(|e| format!("failed to create tray menu: {e}"))?;

    let icon_connected = load_icon(
        icons.connected.as_deref(),
        include_bytes!("../../icons/tray-connected.png"),
    )?;
    let icon_disconnected = load_icon(
        icons.disconnected.as_deref(),
        include_bytes!("../../icons/tray-disconnected.png"),
    )?;

    let tray = TrayIconBuilder::with_id(TRAY_ID)
        .icon(icon_disconnected.clone())
        .tooltip("Server stopped")
        .menu(&menu)
        .show_menu_on_left_click(true)
        .on_menu_event(|app, event| on_menu_event(app, event.id.as_ref()))
        .build(app)
        .map_err(|e| format!("failed to build tray icon: {e}"))?;

    Ok(TraySink {
        app: app.clone(),
        handles: TrayHandles {
            tray,
            start_item,
            stop_item,
            open_item,
            icon_connected,
            icon_disconnected,
        },
    })
}

/// Picks up a server that died on its own so the menu does not go stale.
pub fn spawn_liveness_poller(app: AppHandle) {
    std::thread::spawn(move || loop {
        std::thread::sleep(LIVENESS_POLL_INTERVAL);
        with_applet(&app, |applet| applet.controller_mut().refresh());
    });
}

/// Exit hook: stop the server and release the instance lock exactly once.
pub fn shutdown(app: &AppHandle) {
    let applet = app.state::<AppletState>().0.lock_or_recover().take();
    if let Some(applet) = applet {
        applet.shutdown();
    }
}
