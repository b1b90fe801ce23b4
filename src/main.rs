//! Persisted Binding demo
//!
//! Binds a launch counter and a preferences record to a store, bumps the
//! counter and prints what was loaded. Native runs use a JSON file, web
//! runs use LocalStorage.

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use persisted_binding::consts::*;
use persisted_binding::platform::{KeyValueStore, init_logging};
use persisted_binding::{PersistedBinding, Signal};

/// Example preferences record, stored as JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Preferences {
    theme: String,
    font_size: u32,
    notifications: bool,
    /// Master volume (0.0 - 1.0)
    volume: f32,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            theme: "light".to_string(),
            font_size: 14,
            notifications: true,
            volume: 0.8,
        }
    }
}

fn run(store: Rc<dyn KeyValueStore>) {
    let launches = PersistedBinding::raw(LAUNCH_COUNT_KEY, 0i64, store.clone());
    let prefs = PersistedBinding::json(PREFERENCES_KEY, Preferences::default(), store);

    let _watch = launches.subscribe(|n| log::info!("launch_count -> {}", n));
    launches.update(|n| *n += 1);
    if let Some(e) = launches.last_error() {
        log::error!("Launch count not saved: {}", e);
    }

    println!("Launch #{}", launches.read());
    println!("Preferences: {:?}", prefs.read());

    // Hand the accessor to "UI" code; toggling goes straight to the store
    let accessor = prefs.binding();
    accessor.update(|p| p.notifications = !p.notifications);
    println!("Notifications now {}", prefs.with(|p| p.notifications));
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    use persisted_binding::platform::FileStore;

    init_logging();

    let path = std::env::var(STORE_PATH_ENV).unwrap_or_else(|_| DEFAULT_STORE_FILE.to_string());
    log::info!("Persisted Binding demo (native), store at {}", path);

    match FileStore::open(&path) {
        Ok(store) => run(Rc::new(store)),
        Err(e) => {
            log::error!("Could not open store: {}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    use persisted_binding::platform::LocalStorage;

    init_logging();
    log::info!("Persisted Binding demo (web)");

    match LocalStorage::open() {
        Some(store) => run(Rc::new(store)),
        None => log::error!("LocalStorage unavailable"),
    }
}
