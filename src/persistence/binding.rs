//! A typed value bound to one key of a store
//!
//! A [`PersistedBinding`] loads its key once at construction, answers reads
//! from an in-memory copy, and writes through to the store on every change.
//! A missing or unreadable entry is replaced by the encoded default, so a
//! corrupt store heals itself the next time the binding is created.
//!
//! [`Binding`] is the accessor pair handed to UI code. It shares the cached
//! value with the binding it came from, so writes through either are seen
//! by both.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::codec::{Codec, JsonCodec, RawCodec, RawScalar};
use super::reactive::{Signal, Subscribers, Subscription};
use crate::error::PersistError;
use crate::platform::KeyValueStore;

/// What a [`Binding`] proxies to
trait Source<T> {
    fn read(&self) -> T;
    fn write(&self, value: T) -> Result<(), PersistError>;
    fn subscribers(&self) -> &Rc<RefCell<Subscribers<T>>>;
}

struct Inner<T, C> {
    key: String,
    default: T,
    store: Rc<dyn KeyValueStore>,
    codec: C,
    value: RefCell<T>,
    last_error: RefCell<Option<PersistError>>,
    subscribers: Rc<RefCell<Subscribers<T>>>,
}

impl<T: Clone + 'static, C: Codec<T>> Inner<T, C> {
    /// Stored value if it decodes, otherwise the default (written back)
    fn load(&self) -> T {
        match self.store.get(&self.key) {
            Some(stored) => match self.codec.decode(&stored) {
                Ok(value) => {
                    log::debug!("Loaded '{}' from store", self.key);
                    return value;
                }
                Err(e) => {
                    log::warn!(
                        "Stored value for '{}' is unreadable ({}), resetting to default",
                        self.key,
                        e
                    );
                }
            },
            None => log::info!("No stored value for '{}', using default", self.key),
        }

        match self.codec.encode(&self.default) {
            Ok(stored) => {
                if let Err(e) = self.store.set(&self.key, stored) {
                    log::warn!("Could not persist default: {}", e);
                }
            }
            Err(e) => log::warn!("Could not encode default for '{}': {}", self.key, e),
        }
        self.default.clone()
    }

    fn record(&self, result: &Result<(), PersistError>) {
        match result {
            Ok(()) => *self.last_error.borrow_mut() = None,
            Err(e) => {
                log::warn!("{}", e);
                *self.last_error.borrow_mut() = Some(e.clone());
            }
        }
    }
}

impl<T: Clone + 'static, C: Codec<T>> Source<T> for Inner<T, C> {
    fn read(&self) -> T {
        self.value.borrow().clone()
    }

    fn write(&self, value: T) -> Result<(), PersistError> {
        // Encode failures leave both cache and store untouched
        let stored = match self.codec.encode(&value) {
            Ok(stored) => stored,
            Err(e) => {
                let result = Err(PersistError::encode(&self.key, e));
                self.record(&result);
                return result;
            }
        };

        *self.value.borrow_mut() = value;
        let result = self.store.set(&self.key, stored);
        if result.is_ok() {
            log::debug!("Persisted '{}'", self.key);
        }
        self.record(&result);

        let current = self.read();
        Subscribers::notify(&self.subscribers, &current);
        result
    }

    fn subscribers(&self) -> &Rc<RefCell<Subscribers<T>>> {
        &self.subscribers
    }
}

/// A typed value persisted under `key`, JSON-encoded unless another codec is given
pub struct PersistedBinding<T, C = JsonCodec> {
    inner: Rc<Inner<T, C>>,
}

impl<T: Clone + 'static, C: Codec<T> + 'static> PersistedBinding<T, C> {
    /// Bind `key` in `store`, loading the current entry
    ///
    /// Never fails: an absent or undecodable entry is replaced by
    /// `default` both in memory and in the store.
    pub fn new(key: impl Into<String>, default: T, store: Rc<dyn KeyValueStore>, codec: C) -> Self {
        let key = key.into();
        debug_assert!(!key.is_empty(), "binding key must not be empty");
        if key.is_empty() {
            log::warn!("Binding created with an empty key");
        }

        let inner = Inner {
            key,
            value: RefCell::new(default.clone()),
            default,
            store,
            codec,
            last_error: RefCell::new(None),
            subscribers: Rc::new(RefCell::new(Subscribers::default())),
        };
        let loaded = inner.load();
        *inner.value.borrow_mut() = loaded;

        Self {
            inner: Rc::new(inner),
        }
    }

    /// Cached value; never touches the store
    pub fn read(&self) -> T {
        self.inner.read()
    }

    /// Run `f` on a snapshot of the cached value
    ///
    /// `f` may write to this binding; it keeps seeing the old value.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let snapshot = self.read();
        f(&snapshot)
    }

    /// Cache `value` and persist it before returning
    ///
    /// On an encode error nothing changes. On a store error the cache
    /// still holds `value`. Either way the error is logged, remembered in
    /// [`last_error`](Self::last_error) and returned; callers that don't
    /// care can drop it.
    pub fn write(&self, value: T) -> Result<(), PersistError> {
        self.inner.write(value)
    }

    /// Write the default value back
    pub fn reset(&self) -> Result<(), PersistError> {
        self.inner.write(self.inner.default.clone())
    }

    /// Accessor pair for UI code, sharing this binding's cache
    pub fn binding(&self) -> Binding<T> {
        Binding {
            source: self.inner.clone(),
        }
    }

    /// Run `f` with the new value after every write that changed the cache
    pub fn subscribe(&self, f: impl Fn(&T) + 'static) -> Subscription {
        Subscribers::subscribe(&self.inner.subscribers, f)
    }

    pub fn key(&self) -> &str {
        &self.inner.key
    }

    pub fn default_value(&self) -> &T {
        &self.inner.default
    }

    /// Error from the most recent write, `None` if it succeeded
    pub fn last_error(&self) -> Option<PersistError> {
        self.inner.last_error.borrow().clone()
    }
}

impl<T> PersistedBinding<T, JsonCodec>
where
    T: Serialize + DeserializeOwned + Clone + 'static,
{
    /// Bind a value stored as JSON bytes
    pub fn json(key: impl Into<String>, default: T, store: Rc<dyn KeyValueStore>) -> Self {
        Self::new(key, default, store, JsonCodec)
    }
}

impl<T: RawScalar + Clone + 'static> PersistedBinding<T, RawCodec> {
    /// Bind a value stored as a native scalar
    pub fn raw(key: impl Into<String>, default: T, store: Rc<dyn KeyValueStore>) -> Self {
        Self::new(key, default, store, RawCodec)
    }
}

impl<T: Clone + 'static, C: Codec<T> + 'static> Signal<T> for PersistedBinding<T, C> {
    fn get(&self) -> T {
        self.read()
    }

    fn set(&self, value: T) {
        // Already logged and recorded
        let _ = self.write(value);
    }
}

impl<T: fmt::Debug, C> fmt::Debug for PersistedBinding<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistedBinding")
            .field("key", &self.inner.key)
            .field("value", &*self.inner.value.borrow())
            .field("default", &self.inner.default)
            .finish()
    }
}

/// Get/set accessor pair over a [`PersistedBinding`]'s cached value
pub struct Binding<T> {
    source: Rc<dyn Source<T>>,
}

impl<T> Clone for Binding<T> {
    fn clone(&self) -> Self {
        Self {
            source: Rc::clone(&self.source),
        }
    }
}

impl<T: 'static> Binding<T> {
    /// Write and report the outcome, unlike [`Signal::set`]
    pub fn try_set(&self, value: T) -> Result<(), PersistError> {
        self.source.write(value)
    }

    pub fn subscribe(&self, f: impl Fn(&T) + 'static) -> Subscription {
        Subscribers::subscribe(self.source.subscribers(), f)
    }
}

impl<T: 'static> Signal<T> for Binding<T> {
    fn get(&self) -> T {
        self.source.read()
    }

    fn set(&self, value: T) {
        let _ = self.source.write(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{FileStore, MemoryStore, StoredValue};
    use proptest::prelude::*;
    use std::cell::Cell;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn json_bytes<T: Serialize>(value: &T) -> StoredValue {
        StoredValue::Bytes(serde_json::to_vec(value).unwrap())
    }

    /// Store whose writes always fail
    #[derive(Default)]
    struct ReadOnlyStore {
        inner: MemoryStore,
    }

    impl KeyValueStore for ReadOnlyStore {
        fn get(&self, key: &str) -> Option<StoredValue> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, _value: StoredValue) -> Result<(), PersistError> {
            Err(PersistError::store(key, "read-only"))
        }

        fn remove(&self, key: &str) -> Result<(), PersistError> {
            Err(PersistError::store(key, "read-only"))
        }
    }

    #[test]
    fn test_counter_scenario() {
        let store = Rc::new(MemoryStore::new());

        let count = PersistedBinding::json("count", 0i64, store.clone());
        assert_eq!(count.read(), 0);
        assert_eq!(store.get("count"), Some(json_bytes(&0)));

        count.write(5).unwrap();
        assert_eq!(count.read(), 5);
        assert_eq!(store.get("count"), Some(json_bytes(&5)));

        let again = PersistedBinding::json("count", 0i64, store.clone());
        assert_eq!(again.read(), 5);
    }

    #[test]
    fn test_corrupt_entry_is_repaired() {
        let store = Rc::new(MemoryStore::new());
        store
            .set("name", StoredValue::Bytes(b"{\"broken\":".to_vec()))
            .unwrap();

        let name = PersistedBinding::json("name", "guest".to_string(), store.clone());
        assert_eq!(name.read(), "guest");
        assert_eq!(store.get("name"), Some(json_bytes(&"guest")));
    }

    #[test]
    fn test_wrong_type_entry_is_repaired() {
        let store = Rc::new(MemoryStore::new());
        store.set("name", json_bytes(&42)).unwrap();

        let name = PersistedBinding::json("name", "guest".to_string(), store.clone());
        assert_eq!(name.read(), "guest");
        assert_eq!(store.get("name"), Some(json_bytes(&"guest")));
    }

    #[test]
    fn test_read_does_not_touch_store() {
        let store = Rc::new(MemoryStore::new());
        let flag = PersistedBinding::json("flag", false, store.clone());

        // External change after construction is not picked up
        store.set("flag", json_bytes(&true)).unwrap();
        assert!(!flag.read());

        // Until the next construction
        assert!(PersistedBinding::json("flag", false, store.clone()).read());
    }

    #[test]
    fn test_raw_mode_roundtrip_and_repair() {
        let store = Rc::new(MemoryStore::new());

        let volume = PersistedBinding::raw("volume", 0.8f64, store.clone());
        assert_eq!(store.get("volume"), Some(StoredValue::Float(0.8)));

        volume.write(0.25).unwrap();
        assert_eq!(store.get("volume"), Some(StoredValue::Float(0.25)));
        assert_eq!(PersistedBinding::raw("volume", 0.8f64, store.clone()).read(), 0.25);

        // A different native kind counts as absent and is repaired
        store.set("volume", StoredValue::Text("loud".into())).unwrap();
        let volume = PersistedBinding::raw("volume", 0.8f64, store.clone());
        assert_eq!(volume.read(), 0.8);
        assert_eq!(store.get("volume"), Some(StoredValue::Float(0.8)));
    }

    #[test]
    fn test_encode_failure_keeps_cache_and_store() {
        let store = Rc::new(MemoryStore::new());
        let table = PersistedBinding::json("table", HashMap::<(u8, u8), u8>::new(), store.clone());
        let before = store.get("table");
        assert_eq!(before, Some(StoredValue::Bytes(b"{}".to_vec())));

        let mut bad = HashMap::new();
        bad.insert((1, 2), 3);
        let result = table.write(bad);

        assert!(matches!(result, Err(PersistError::Encode { ref key, .. }) if key == "table"));
        assert!(table.read().is_empty());
        assert_eq!(store.get("table"), before);
        assert!(table.last_error().is_some());

        table.write(HashMap::new()).unwrap();
        assert_eq!(table.last_error(), None);
    }

    #[test]
    fn test_store_failure_still_updates_cache() {
        let store = Rc::new(ReadOnlyStore::default());
        let level = PersistedBinding::raw("level", 1u32, store.clone());
        assert_eq!(level.read(), 1);

        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        let _sub = level.subscribe(move |v| s.borrow_mut().push(*v));

        let result = level.write(4);
        assert!(matches!(result, Err(PersistError::Store { .. })));
        assert_eq!(level.read(), 4);
        // Cache changed, so subscribers hear about it
        assert_eq!(*seen.borrow(), vec![4]);
        assert_eq!(
            level.last_error(),
            Some(PersistError::store("level", "read-only"))
        );
    }

    #[test]
    fn test_non_finite_float_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");

        {
            let store = Rc::new(FileStore::open(&path).unwrap());
            let name = PersistedBinding::json("name", "guest".to_string(), store.clone());
            name.write("alice".into()).unwrap();

            let volume = PersistedBinding::raw("volume", 0.8f64, store.clone());
            let result = volume.write(f64::NAN);
            assert!(matches!(result, Err(PersistError::Encode { .. })));
            assert_eq!(volume.read(), 0.8);

            let gain = PersistedBinding::json("gain", 1.0f64, store.clone());
            assert!(gain.write(f64::INFINITY).is_err());
            assert_eq!(gain.read(), 1.0);
        }

        let store = Rc::new(FileStore::open(&path).unwrap());
        assert_eq!(
            PersistedBinding::json("name", "guest".to_string(), store.clone()).read(),
            "alice"
        );
        assert_eq!(PersistedBinding::raw("volume", 0.5f64, store.clone()).read(), 0.8);
        assert_eq!(PersistedBinding::json("gain", 0.0f64, store.clone()).read(), 1.0);
    }

    #[test]
    fn test_file_store_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");

        {
            let store = Rc::new(FileStore::open(&path).unwrap());
            let count = PersistedBinding::json("count", 0i64, store.clone());
            assert_eq!(count.read(), 0);
            count.write(5).unwrap();
        }

        let store = Rc::new(FileStore::open(&path).unwrap());
        let count = PersistedBinding::json("count", 0i64, store);
        assert_eq!(count.read(), 5);
    }

    #[test]
    fn test_json_text_entry_is_loaded() {
        let store = Rc::new(MemoryStore::new());
        store
            .set("prefs", StoredValue::Text(r#"{"theme":"dark","size":16}"#.into()))
            .unwrap();

        let prefs = PersistedBinding::json(
            "prefs",
            serde_json::json!({"theme": "light", "size": 14}),
            store.clone(),
        );
        assert_eq!(prefs.read()["theme"], "dark");
        assert_eq!(prefs.read()["size"], 16);
        // Loaded fine, so nothing was rewritten
        assert!(matches!(store.get("prefs"), Some(StoredValue::Text(_))));
    }

    #[test]
    fn test_with_allows_write_inside() {
        let store = Rc::new(MemoryStore::new());
        let count = PersistedBinding::raw("count", 1i64, store);

        let seen = count.with(|n| {
            count.write(n + 1).unwrap();
            *n
        });
        assert_eq!(seen, 1);
        assert_eq!(count.read(), 2);
    }

    #[test]
    fn test_accessor_shares_cache() {
        let store = Rc::new(MemoryStore::new());
        let theme = PersistedBinding::json("theme", "light".to_string(), store.clone());
        let accessor = theme.binding();

        theme.write("dark".into()).unwrap();
        assert_eq!(accessor.get(), "dark");

        accessor.set("solarized".into());
        assert_eq!(theme.read(), "solarized");
        assert_eq!(store.get("theme"), Some(json_bytes(&"solarized")));

        // Clones point at the same cache
        let copy = accessor.clone();
        copy.update(|s| s.push('!'));
        assert_eq!(theme.read(), "solarized!");
    }

    #[test]
    fn test_subscribers_see_writes_from_both_paths() {
        let store = Rc::new(MemoryStore::new());
        let count = PersistedBinding::raw("count", 0i64, store.clone());
        let accessor = count.binding();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        let sub = accessor.subscribe(move |v| s.borrow_mut().push(*v));

        count.write(1).unwrap();
        accessor.set(2);
        assert_eq!(*seen.borrow(), vec![1, 2]);

        drop(sub);
        count.write(3).unwrap();
        assert_eq!(*seen.borrow(), vec![1, 2]);
    }

    #[test]
    fn test_failed_encode_does_not_notify() {
        let store = Rc::new(MemoryStore::new());
        let table = PersistedBinding::json("table", HashMap::<(u8, u8), u8>::new(), store);
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        let _sub = table.subscribe(move |_| h.set(h.get() + 1));

        let mut bad = HashMap::new();
        bad.insert((0, 0), 0);
        assert!(table.write(bad).is_err());
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn test_reset_restores_default() {
        let store = Rc::new(MemoryStore::new());
        let name = PersistedBinding::json("name", "guest".to_string(), store.clone());
        name.write("alice".into()).unwrap();

        name.reset().unwrap();
        assert_eq!(name.read(), "guest");
        assert_eq!(name.default_value(), "guest");
        assert_eq!(name.key(), "name");
        assert_eq!(store.get("name"), Some(json_bytes(&"guest")));
    }

    #[test]
    fn test_with_reads_current_value() {
        let store = Rc::new(MemoryStore::new());
        let tags = PersistedBinding::json("tags", vec!["a".to_string()], store);
        assert_eq!(tags.with(|t| t.len()), 1);
    }

    proptest! {
        #[test]
        fn prop_write_then_read(v in any::<i64>(), s in ".*") {
            let store = Rc::new(MemoryStore::new());

            let n = PersistedBinding::json("n", 0i64, store.clone());
            n.write(v).unwrap();
            prop_assert_eq!(n.read(), v);

            let text = PersistedBinding::raw("text", String::new(), store.clone());
            text.write(s.clone()).unwrap();
            prop_assert_eq!(text.read(), s);
        }

        #[test]
        fn prop_persists_across_instances(v in any::<(u32, bool, String)>()) {
            let store = Rc::new(MemoryStore::new());
            let first = PersistedBinding::json("tuple", (0u32, false, String::new()), store.clone());
            first.write(v.clone()).unwrap();
            drop(first);

            let second = PersistedBinding::json("tuple", (0u32, false, String::new()), store.clone());
            prop_assert_eq!(second.read(), v);
        }

        #[test]
        fn prop_repeated_write_is_idempotent(v in any::<i32>()) {
            let store = Rc::new(MemoryStore::new());
            let n = PersistedBinding::raw("n", 0i32, store.clone());

            n.write(v).unwrap();
            let stored_once = store.get("n");
            let read_once = n.read();

            n.write(v).unwrap();
            prop_assert_eq!(store.get("n"), stored_once);
            prop_assert_eq!(n.read(), read_once);
        }
    }
}
