//! Reactive glue for UI layers
//!
//! [`Signal`] is the get/set surface a host UI framework adapts to.
//! Change callbacks live in a [`Subscribers`] list shared through
//! `Rc<RefCell<..>>`; each registration hands back a [`Subscription`] that
//! unregisters on drop. Callbacks run in registration order.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// A value that can be read and written by a UI layer
pub trait Signal<T> {
    /// Current value
    fn get(&self) -> T;

    /// Replace the value
    fn set(&self, value: T);

    /// Modify the value in place through a closure
    fn update(&self, f: impl FnOnce(&mut T)) {
        let mut value = self.get();
        f(&mut value);
        self.set(value);
    }
}

type Callback<T> = Rc<dyn Fn(&T)>;

/// Ordered list of change callbacks
pub struct Subscribers<T> {
    next_id: u64,
    callbacks: Vec<(u64, Callback<T>)>,
}

impl<T> Default for Subscribers<T> {
    fn default() -> Self {
        Self {
            next_id: 0,
            callbacks: Vec::new(),
        }
    }
}

impl<T: 'static> Subscribers<T> {
    /// Register `f` on a shared list
    pub fn subscribe(list: &Rc<RefCell<Self>>, f: impl Fn(&T) + 'static) -> Subscription {
        let id = {
            let mut subs = list.borrow_mut();
            let id = subs.next_id;
            subs.next_id += 1;
            subs.callbacks.push((id, Rc::new(f)));
            id
        };

        let weak: Weak<RefCell<Self>> = Rc::downgrade(list);
        Subscription {
            unsubscribe: Some(Box::new(move || {
                if let Some(list) = weak.upgrade() {
                    list.borrow_mut().callbacks.retain(|(cid, _)| *cid != id);
                }
            })),
        }
    }

    /// Call every callback with `value`
    ///
    /// The list is snapshotted first, so callbacks may subscribe,
    /// unsubscribe or write to the binding that triggered them.
    pub fn notify(list: &Rc<RefCell<Self>>, value: &T) {
        let snapshot: Vec<Callback<T>> = list
            .borrow()
            .callbacks
            .iter()
            .map(|(_, f)| Rc::clone(f))
            .collect();
        for f in snapshot {
            f(value);
        }
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}

/// Keeps a change callback registered until dropped
#[must_use = "dropping a Subscription unregisters its callback"]
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce()>>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}
