//! Platform abstraction layer
//!
//! Handles browser/native differences for:
//! - Storage (LocalStorage on web, a JSON file on native)
//! - Logger setup

pub mod storage;

pub use storage::{FileStore, KeyValueStore, MemoryStore, StoredValue};

#[cfg(target_arch = "wasm32")]
pub use storage::LocalStorage;

/// Install the logger for the current platform
#[cfg(target_arch = "wasm32")]
pub fn init_logging() {
    console_error_panic_hook::set_once();
    if console_log::init_with_level(log::Level::Info).is_err() {
        log::warn!("Logger already initialized");
    }
}

/// Install the logger for the current platform (`RUST_LOG` controls the level)
#[cfg(not(target_arch = "wasm32"))]
pub fn init_logging() {
    if env_logger::try_init().is_err() {
        log::warn!("Logger already initialized");
    }
}
