//! Usage: Domain layer (server supervisor state machine and the status it reflects to the UI).

pub mod status;
pub mod supervisor;
