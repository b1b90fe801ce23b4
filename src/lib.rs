//! Persisted Binding - typed values bound to a key-value store
//!
//! Core modules:
//! - `persistence`: Bindings, codecs and change subscriptions
//! - `platform`: Stores (memory, file, browser LocalStorage) and logger setup
//! - `error`: Failure types surfaced by writes

pub mod error;
pub mod persistence;
pub mod platform;

pub use error::PersistError;
pub use persistence::{Binding, JsonCodec, PersistedBinding, RawCodec, Signal, Subscription};
pub use platform::{KeyValueStore, MemoryStore, StoredValue};

/// Defaults shared by the library and the demo binary
pub mod consts {
    /// Store file used by the native demo when no path is configured
    pub const DEFAULT_STORE_FILE: &str = "persisted_binding_store.json";
    /// Environment variable overriding the demo store path
    pub const STORE_PATH_ENV: &str = "PERSISTED_BINDING_STORE";

    /// Keys written by the demo
    pub const LAUNCH_COUNT_KEY: &str = "launch_count";
    pub const PREFERENCES_KEY: &str = "preferences";
}
