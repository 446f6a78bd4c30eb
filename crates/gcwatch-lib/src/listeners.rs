//! Listener registry with fault-isolated fan-out
//!
//! A listener that returns an error or panics is logged and skipped; the
//! remaining listeners still receive the event and the publisher never sees
//! the failure.

use std::fmt::Debug;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::warn;

/// A shared event callback
///
/// Identity is the identity of the `Arc`: clones of one listener compare
/// equal for removal, separately created listeners never do.
pub type Listener<E> = Arc<dyn Fn(&E) -> anyhow::Result<()> + Send + Sync>;

/// Wrap a closure into a [`Listener`]
pub fn listener<E, F>(f: F) -> Listener<E>
where
    F: Fn(&E) -> anyhow::Result<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

fn same_listener<E>(a: &Listener<E>, b: &Listener<E>) -> bool {
    // Compare data pointers only; vtable pointers may differ across codegen units
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

/// Ordered set of listeners, duplicates allowed
pub struct EventListeners<E> {
    listeners: RwLock<Vec<Listener<E>>>,
}

impl<E: Debug> EventListeners<E> {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Register a listener at the end of the delivery order
    pub fn add_listener(&self, listener: Listener<E>) {
        self.write().push(listener);
    }

    /// Remove the first registration of `listener`
    ///
    /// Returns `false` if it was not registered.
    pub fn remove_listener(&self, listener: &Listener<E>) -> bool {
        let mut listeners = self.write();
        match listeners.iter().position(|l| same_listener(l, listener)) {
            Some(index) => {
                listeners.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn remove_all_listeners(&self) {
        self.write().clear();
    }

    /// Copy of the current registrations, in delivery order
    pub fn listeners(&self) -> Vec<Listener<E>> {
        self.read().clone()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Deliver `event` to every listener in registration order
    ///
    /// Returns the number of listeners that failed. The registry lock is
    /// released before any listener runs, so listeners may add or remove
    /// registrations.
    pub fn notify_listeners(&self, event: &E) -> usize {
        let listeners = self.listeners();
        let mut failures = 0;

        for (index, listener) in listeners.iter().enumerate() {
            match panic::catch_unwind(AssertUnwindSafe(|| listener(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    failures += 1;
                    warn!(
                        listener = index,
                        error = %e,
                        payload = ?event,
                        "Listener failed to process event"
                    );
                }
                Err(payload) => {
                    failures += 1;
                    warn!(
                        listener = index,
                        panic = %panic_message(payload.as_ref()),
                        payload = ?event,
                        "Listener panicked while processing event"
                    );
                }
            }
        }

        failures
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Listener<E>>> {
        self.listeners.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Listener<E>>> {
        self.listeners.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<E: Debug> Default for EventListeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
