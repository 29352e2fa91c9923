//! Usage: Blocking error dialog for startup failures that end the process.

/// Shows `message` in a modal error box and returns once the user dismisses it.
pub fn show_fatal(message: &str) {
    let _ = rfd::MessageDialog::new()
        .set_level(rfd::MessageLevel::Error)
        .set_title("Server applet")
        .set_description(message)
        .set_buttons(rfd::MessageButtons::Ok)
        .show();
}
