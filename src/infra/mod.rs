//! Usage: Infrastructure adapters (paths, persisted settings, instance lock, child processes).

pub mod app_paths;
pub mod instance_lock;
pub mod process;
pub mod settings;
