//! GC event producers
//!
//! An [`EventSource`] delivers one [`GcEvent`] per finished garbage
//! collection to its listeners. Two producers are provided:
//! - [`PushEventSource`] for embedders that already observe collections
//! - [`StreamEventSource`] reading newline-delimited JSON notifications

mod notification;
mod stream;

pub use notification::{
    parse_notification, GcAction, GcNotification, MemoryPool, RawUsage, SupportedGc,
};
pub use stream::StreamEventSource;

use crate::error::SourceError;
use crate::listeners::{EventListeners, Listener};
use crate::models::{GcEvent, Sample};
use crate::observability::MonitorMetrics;
use std::sync::atomic::{AtomicBool, Ordering};

/// A timestamped GC event, as delivered to listeners
pub type GcSample = Sample<GcEvent>;

/// Trait for GC event producers
pub trait EventSource: Send + Sync {
    /// Begin delivering events to listeners
    fn start(&self) -> Result<(), SourceError>;

    /// Stop delivering events. Events observed while stopped are dropped.
    fn stop(&self);

    fn add_listener(&self, listener: Listener<GcSample>);

    /// Remove the first registration of `listener`, reporting whether one existed
    fn remove_listener(&self, listener: &Listener<GcSample>) -> bool;
}

/// In-process producer: events are handed over with [`PushEventSource::publish`]
pub struct PushEventSource {
    listeners: EventListeners<GcSample>,
    running: AtomicBool,
    metrics: MonitorMetrics,
}

impl PushEventSource {
    pub fn new() -> Self {
        Self {
            listeners: EventListeners::new(),
            running: AtomicBool::new(false),
            metrics: MonitorMetrics::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Deliver an event to every listener
    ///
    /// Returns `false` without delivering anything while the source is stopped.
    pub fn publish(&self, event: GcSample) -> bool {
        if !self.is_running() {
            return false;
        }

        let failures = self.listeners.notify_listeners(&event);
        if failures > 0 {
            self.metrics.add_listener_failures(failures);
        }
        true
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl Default for PushEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSource for PushEventSource {
    fn start(&self) -> Result<(), SourceError> {
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn add_listener(&self, listener: Listener<GcSample>) {
        self.listeners.add_listener(listener);
    }

    fn remove_listener(&self, listener: &Listener<GcSample>) -> bool {
        self.listeners.remove_listener(listener)
    }
}
