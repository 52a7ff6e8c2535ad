// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Listener registration list.
//!
//! - [`ListenerId`] - Identifier handed back by registration
//! - [`ListenerRegistry`] - Ordered, append-only list read by the dispatcher

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use super::Listener;

/// Identifier of a registered listener.
///
/// IDs are assigned in registration order and are unique within a bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    #[must_use]
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Listener({})", self.0)
    }
}

/// One registered listener and its failure counter.
pub(crate) struct Registration {
    id: ListenerId,
    listener: Arc<dyn Listener>,
    failures: AtomicU64,
}

impl Registration {
    pub(crate) fn id(&self) -> ListenerId {
        self.id
    }

    pub(crate) fn listener(&self) -> &dyn Listener {
        self.listener.as_ref()
    }

    pub(crate) fn name(&self) -> &str {
        self.listener.name()
    }

    pub(crate) fn record_failure(&self) -> u64 {
        self.failures.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

/// Immutable view of the registration list at one point in time.
pub(crate) type Snapshot = Arc<Vec<Arc<Registration>>>;

/// Per-listener failure count, as reported by
/// [`ListenerBus::listener_failures`](crate::ListenerBus::listener_failures).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerFailureCount {
    /// The listener.
    pub id: ListenerId,
    /// The listener's [`name`](Listener::name).
    pub name: String,
    /// Number of events this listener failed to handle.
    pub failures: u64,
}

/// Ordered registration list shared by producers and the dispatcher.
///
/// Registration replaces the list with an extended copy; readers take a
/// cheap [`Snapshot`] and iterate it without holding the lock, so a slow
/// listener never blocks `add_listener`. There is no removal.
pub(crate) struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: RwLock<Snapshot>,
}

impl ListenerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            listeners: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// Appends a listener; it sees every event dispatched after this returns.
    pub(crate) fn register(&self, listener: Arc<dyn Listener>) -> ListenerId {
        let id = ListenerId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let registration = Arc::new(Registration {
            id,
            listener,
            failures: AtomicU64::new(0),
        });

        let mut guard = self.listeners.write();
        let mut next = Vec::with_capacity(guard.len() + 1);
        next.extend(guard.iter().cloned());
        next.push(registration);
        *guard = Arc::new(next);
        id
    }

    /// Returns the current registration list.
    pub(crate) fn snapshot(&self) -> Snapshot {
        Arc::clone(&self.listeners.read())
    }

    /// Number of registered listeners.
    pub(crate) fn len(&self) -> usize {
        self.listeners.read().len()
    }

    /// Failure counters in registration order.
    pub(crate) fn failure_counts(&self) -> Vec<ListenerFailureCount> {
        self.snapshot()
            .iter()
            .map(|r| ListenerFailureCount {
                id: r.id(),
                name: r.name().to_string(),
                failures: r.failures(),
            })
            .collect()
    }
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listener_count", &self.len())
            .finish()
    }
}
