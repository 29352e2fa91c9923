//! Usage: Application layer (startup sequence, controller, logging, tray lifecycle).

pub mod controller;
#[cfg(feature = "tray")]
pub mod error_dialog;
pub mod logging;
#[cfg(feature = "tray")]
pub mod resident;
pub mod startup;
