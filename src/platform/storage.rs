//! Key-value stores that bindings persist into
//!
//! Stores hold either native scalars or opaque bytes per key. They are
//! shared between bindings through `Rc`, so every method takes `&self`.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::PersistError;

/// A single stored entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum StoredValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Opaque encoded payload (JSON bytes for codec-based bindings)
    Bytes(Vec<u8>),
}

impl StoredValue {
    /// Short name of the stored kind, for diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            StoredValue::Bool(_) => "bool",
            StoredValue::Int(_) => "int",
            StoredValue::Float(_) => "float",
            StoredValue::Text(_) => "text",
            StoredValue::Bytes(_) => "bytes",
        }
    }
}

/// Storage capability injected into bindings
pub trait KeyValueStore {
    /// Read the entry for `key`, `None` if absent or unreadable
    fn get(&self, key: &str) -> Option<StoredValue>;

    /// Write `value` under `key`, replacing any previous entry
    fn set(&self, key: &str, value: StoredValue) -> Result<(), PersistError>;

    /// Remove the entry for `key` (no-op if absent)
    fn remove(&self, key: &str) -> Result<(), PersistError>;
}

/// In-process store, lost when dropped
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RefCell<HashMap<String, StoredValue>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.borrow().contains_key(key)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<StoredValue> {
        self.entries.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: StoredValue) -> Result<(), PersistError> {
        self.entries.borrow_mut().insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), PersistError> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

/// Store backed by a single JSON file on disk
///
/// The whole map is rewritten on every change: written to a sibling
/// `.tmp` file first, then renamed over the real one.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: RefCell<BTreeMap<String, StoredValue>>,
}

impl FileStore {
    /// Open the store at `path`, starting empty if the file is missing
    /// or isn't a store document
    ///
    /// Entries that don't parse are dropped one by one; the rest load.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read(&path) {
            Ok(bytes) => Self::parse(&path, &bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::info!("No store at {}, starting empty", path.display());
                BTreeMap::new()
            }
            Err(e) => return Err(PersistError::store(&path.display().to_string(), e)),
        };

        Ok(Self {
            path,
            entries: RefCell::new(entries),
        })
    }

    fn parse(path: &Path, bytes: &[u8]) -> BTreeMap<String, StoredValue> {
        let raw: BTreeMap<String, serde_json::Value> = match serde_json::from_slice(bytes) {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!("Store {} is corrupt ({}), starting empty", path.display(), e);
                return BTreeMap::new();
            }
        };

        let mut entries = BTreeMap::new();
        for (key, value) in raw {
            match serde_json::from_value::<StoredValue>(value) {
                Ok(stored) => {
                    entries.insert(key, stored);
                }
                Err(e) => log::warn!("Dropping unreadable entry '{}' ({})", key, e),
            }
        }
        log::info!("Opened store {} ({} entries)", path.display(), entries.len());
        entries
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, key: &str) -> Result<(), PersistError> {
        let json = serde_json::to_vec_pretty(&*self.entries.borrow())
            .map_err(|e| PersistError::store(key, e))?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, json).map_err(|e| PersistError::store(key, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| PersistError::store(key, e))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<StoredValue> {
        self.entries.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: StoredValue) -> Result<(), PersistError> {
        self.entries.borrow_mut().insert(key.to_string(), value);
        self.flush(key)
    }

    fn remove(&self, key: &str) -> Result<(), PersistError> {
        let removed = self.entries.borrow_mut().remove(key);
        match removed {
            Some(_) => self.flush(key),
            None => Ok(()),
        }
    }
}

/// Browser `window.localStorage`
///
/// Entries are kept as JSON-encoded [`StoredValue`]s. A raw string that
/// isn't one (written by some other script) reads back as `Text`.
#[cfg(target_arch = "wasm32")]
pub struct LocalStorage {
    storage: web_sys::Storage,
}

#[cfg(target_arch = "wasm32")]
impl LocalStorage {
    /// Grab the page's local storage, if the browser exposes one
    pub fn open() -> Option<Self> {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten()?;
        Some(Self { storage })
    }
}

#[cfg(target_arch = "wasm32")]
impl KeyValueStore for LocalStorage {
    fn get(&self, key: &str) -> Option<StoredValue> {
        let raw = self.storage.get_item(key).ok().flatten()?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(_) => Some(StoredValue::Text(raw)),
        }
    }

    fn set(&self, key: &str, value: StoredValue) -> Result<(), PersistError> {
        let json = serde_json::to_string(&value).map_err(|e| PersistError::store(key, e))?;
        self.storage
            .set_item(key, &json)
            .map_err(|e| PersistError::store(key, format!("{:?}", e)))
    }

    fn remove(&self, key: &str) -> Result<(), PersistError> {
        self.storage
            .remove_item(key)
            .map_err(|e| PersistError::store(key, format!("{:?}", e)))
    }
}
