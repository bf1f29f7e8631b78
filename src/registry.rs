//! Which engine's body is running on the current thread.
//!
//! One slot per concrete engine type, keyed by `TypeId`. An entry is a `Weak` back-reference,
//! recorded when a body starts a run segment and removed when it suspends or exits. The slots are
//! thread-local: every body runs on a worker thread of its own, so the body asking is always the
//! one recorded, and a driver thread never finds an entry of its own.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

thread_local! {
    static ACTIVE: RefCell<HashMap<TypeId, Box<dyn Any>>> = RefCell::new(HashMap::new());
}

/// Record `engine` as running on this thread.
///
/// # Panics
///
/// Panics if an engine of the same type is already recorded.
pub fn enter<T: 'static>(engine: Weak<T>) {
    ACTIVE.with(|active| {
        let previous = active
            .borrow_mut()
            .insert(TypeId::of::<T>(), Box::new(engine));
        assert!(previous.is_none(), "a body is already active on this thread");
    })
}

/// Clear this thread's entry for `T`.
///
/// # Panics
///
/// Panics if there is no entry to clear.
pub fn leave<T: 'static>() {
    ACTIVE.with(|active| {
        let previous = active.borrow_mut().remove(&TypeId::of::<T>());
        assert!(previous.is_some(), "no body is active on this thread");
    })
}

/// The engine of type `T` whose body is running on this thread, if it is still alive.
pub fn active<T: 'static>() -> Option<Arc<T>> {
    ACTIVE.with(|active| {
        active
            .borrow()
            .get(&TypeId::of::<T>())
            .and_then(|entry| entry.downcast_ref::<Weak<T>>())
            .and_then(Weak::upgrade)
    })
}
