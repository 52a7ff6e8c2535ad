// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The listener bus facade.

use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;

use crate::config::BusConfig;
use crate::error::{Error, Result};
use crate::event::ListenerEvent;
use crate::listener::{Listener, ListenerFailureCount, ListenerId};

use super::dispatcher::{self, Shared};
use super::queue::{EventQueue, Rejected};
use super::state::StateCell;
use super::{BusId, BusMetrics, BusState};

/// Asynchronous fan-out of scheduler events to registered listeners.
///
/// Producers [`post`](Self::post) events without waiting; a single dedicated
/// dispatcher thread delivers them, one at a time and in posting order, to
/// every registered [`Listener`]. Every listener sees the same sequence.
///
/// `ListenerBus` is a cheap handle: clones share the same queue, listeners
/// and dispatcher.
///
/// # Lifecycle
///
/// ```text
/// Init --start()--> Running --stop()--> Stopped
/// ```
///
/// - In `Init`, posted events are buffered and delivered after `start`.
/// - `stop` delivers everything posted before it, then joins the dispatcher.
/// - In `Stopped`, posts are silently discarded.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::time::Duration;
///
/// use listener_bus::event::{JobEnd, JobId, JobOutcome, ListenerEvent};
/// use listener_bus::listener::{Listener, ListenerResult};
/// use listener_bus::ListenerBus;
///
/// #[derive(Default)]
/// struct FinishedJobs(AtomicUsize);
///
/// impl Listener for FinishedJobs {
///     fn on_job_end(&self, _event: &JobEnd) -> ListenerResult {
///         self.0.fetch_add(1, Ordering::SeqCst);
///         Ok(())
///     }
/// }
///
/// let bus = ListenerBus::new();
/// let finished = Arc::new(FinishedJobs::default());
/// bus.add_listener(finished.clone()).unwrap();
///
/// bus.post(ListenerEvent::job_end(JobId::new(0), JobOutcome::Succeeded));
/// bus.start().unwrap();
///
/// assert!(bus.wait_until_empty(Duration::from_secs(5)));
/// assert_eq!(finished.0.load(Ordering::SeqCst), 1);
///
/// bus.stop().unwrap();
/// ```
#[derive(Clone)]
pub struct ListenerBus {
    inner: Arc<Inner>,
}

struct Inner {
    config: BusConfig,
    state: StateCell,
    /// Serializes `start`/`stop` and owns the dispatcher handle.
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    shared: Arc<Shared>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        // A running dispatcher holds only `Shared`; closing the queue lets it
        // drain and exit on its own.
        if self.state.load() == BusState::Running && self.shared.queue.close() {
            tracing::debug!(
                bus = %self.shared.bus_id,
                "Last handle dropped while running, dispatcher will drain and exit"
            );
        }
    }
}

impl ListenerBus {
    /// Creates a bus with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(BusConfig::default())
    }

    /// Creates a bus with the given configuration.
    #[must_use]
    pub fn with_config(config: BusConfig) -> Self {
        let id = BusId::new();
        let queue = EventQueue::new(config.capacity);
        Self {
            inner: Arc::new(Inner {
                config,
                state: StateCell::new(BusState::Init),
                dispatcher: Mutex::new(None),
                shared: Arc::new(Shared::new(id, queue)),
            }),
        }
    }

    /// Returns this bus's identifier.
    #[must_use]
    pub fn id(&self) -> BusId {
        self.inner.shared.bus_id
    }

    /// Returns the configuration the bus was created with.
    #[must_use]
    pub fn config(&self) -> &BusConfig {
        &self.inner.config
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> BusState {
        self.inner.state.load()
    }

    /// Creates a handle that does not keep the bus alive.
    #[must_use]
    pub fn downgrade(&self) -> WeakListenerBus {
        WeakListenerBus {
            inner: Arc::downgrade(&self.inner),
        }
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Registers a listener.
    ///
    /// The listener receives every event not yet dispatched when this returns,
    /// after all previously registered listeners. Events already delivered
    /// are not replayed. Legal in `Init` and `Running`, including from inside
    /// another listener's callback.
    ///
    /// The bus owns its listeners, so a listener that stores a `ListenerBus`
    /// clone keeps the bus alive and dropping every other handle never shuts
    /// it down. Such a listener should hold a [`WeakListenerBus`] from
    /// [`downgrade`](Self::downgrade) instead.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BusStopped`] once the bus has been stopped.
    pub fn add_listener(&self, listener: Arc<dyn Listener>) -> Result<ListenerId> {
        if self.state() == BusState::Stopped {
            return Err(Error::BusStopped {
                operation: "add_listener",
            });
        }

        let name = listener.name().to_string();
        let id = self.inner.shared.registry.register(listener);
        tracing::debug!(bus = %self.id(), listener = %name, listener_id = %id, "Listener registered");
        Ok(id)
    }

    /// Returns the number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.shared.registry.len()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Starts the dispatcher thread; buffered events start flowing.
    ///
    /// # Errors
    ///
    /// - [`Error::IllegalLifecycleTransition`] if the bus is not in `Init`
    /// - [`Error::DispatcherSpawn`] if the OS refuses the thread or the
    ///   configured thread name contains a NUL byte; the bus stays in `Init`
    pub fn start(&self) -> Result<()> {
        // From a listener the bus is necessarily running; locking here could
        // deadlock against a concurrent `stop` joining this very thread.
        if self.inner.shared.on_dispatcher_thread() {
            return Err(Error::IllegalLifecycleTransition {
                operation: "start",
                state: self.state(),
            });
        }

        let mut slot = self.inner.dispatcher.lock();
        let state = self.state();
        if state != BusState::Init {
            return Err(Error::IllegalLifecycleTransition {
                operation: "start",
                state,
            });
        }

        let handle = dispatcher::spawn(
            Arc::clone(&self.inner.shared),
            &self.inner.config.thread_name,
        )
        .map_err(Error::DispatcherSpawn)?;
        *slot = Some(handle);
        self.inner.state.store(BusState::Running);

        tracing::debug!(
            bus = %self.id(),
            buffered = self.inner.shared.queue.pending(),
            listeners = self.listener_count(),
            "Listener bus started"
        );
        Ok(())
    }

    /// Stops the bus.
    ///
    /// Every event posted before this call is delivered to every listener
    /// first, then the dispatcher thread is joined. Blocks for as long as a
    /// listener callback blocks. Posts after `stop` returns are discarded.
    ///
    /// # Errors
    ///
    /// - [`Error::IllegalLifecycleTransition`] if the bus is not `Running`
    ///   (never started, or already stopped)
    /// - [`Error::StopFromDispatcher`] if called from a listener callback
    pub fn stop(&self) -> Result<()> {
        if self.inner.shared.on_dispatcher_thread() {
            tracing::warn!(bus = %self.id(), "stop called from a listener callback, ignoring");
            return Err(Error::StopFromDispatcher);
        }

        let mut slot = self.inner.dispatcher.lock();
        let state = self.state();
        if state != BusState::Running {
            return Err(Error::IllegalLifecycleTransition {
                operation: "stop",
                state,
            });
        }

        self.inner.shared.queue.close();
        if let Some(handle) = slot.take()
            && handle.join().is_err()
        {
            tracing::error!(bus = %self.id(), "Dispatcher thread panicked");
        }
        self.inner.state.store(BusState::Stopped);

        tracing::debug!(
            bus = %self.id(),
            processed = self.inner.shared.queue.counters().processed,
            "Listener bus stopped"
        );
        Ok(())
    }

    /// Async variant of [`stop`](Self::stop), run on tokio's blocking pool.
    ///
    /// # Errors
    ///
    /// As [`stop`](Self::stop), plus [`Error::BlockingTask`] if the blocking
    /// task could not complete.
    pub async fn stop_async(&self) -> Result<()> {
        let bus = self.clone();
        tokio::task::spawn_blocking(move || bus.stop()).await?
    }

    /// Returns `true` while the dispatcher thread is alive.
    #[must_use]
    pub fn is_dispatcher_alive(&self) -> bool {
        if self.inner.shared.on_dispatcher_thread() {
            return true;
        }
        self.inner
            .dispatcher
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    // =========================================================================
    // Posting
    // =========================================================================

    /// Posts an event for asynchronous delivery.
    ///
    /// Never fails and never panics. In `Init` the event is buffered, in
    /// `Running` it is delivered promptly, in `Stopped` it is discarded.
    ///
    /// With a bounded [`DropNewest`](crate::config::OverflowPolicy::DropNewest)
    /// queue a post into a full queue is dropped and counted in
    /// [`BusMetrics::dropped`]. With
    /// [`Block`](crate::config::OverflowPolicy::Block) the caller waits for
    /// room, except on the dispatcher thread where it drops instead.
    pub fn post(&self, event: ListenerEvent) {
        // Discarded posts are already logged or silent by contract.
        let _ = self.enqueue(event);
    }

    /// Like [`post`](Self::post), but reports why an event was not accepted.
    ///
    /// # Errors
    ///
    /// - [`Error::QueueOverflow`] if a bounded queue was full and the event
    ///   was dropped
    /// - [`Error::BusStopped`] if the bus has been stopped
    pub fn try_post(&self, event: ListenerEvent) -> Result<()> {
        match self.enqueue(event) {
            Ok(()) => Ok(()),
            Err(Rejected::Closed) => Err(Error::BusStopped { operation: "post" }),
            Err(Rejected::Full { .. }) => Err(Error::QueueOverflow {
                capacity: self.inner.config.capacity.limit().unwrap_or_default(),
            }),
        }
    }

    fn enqueue(&self, event: ListenerEvent) -> std::result::Result<(), Rejected> {
        if !self.state().accepts_events() {
            return Err(Rejected::Closed);
        }

        let may_block = !self.inner.shared.on_dispatcher_thread();
        let result = self.inner.shared.queue.append(event, may_block);
        if let Err(Rejected::Full { dropped }) = result {
            if dropped == 1 {
                tracing::warn!(
                    bus = %self.id(),
                    capacity = ?self.inner.config.capacity.limit(),
                    "Event queue full, dropping events"
                );
            } else {
                tracing::trace!(bus = %self.id(), dropped, "Event dropped");
            }
        }
        result
    }

    // =========================================================================
    // Draining
    // =========================================================================

    /// Waits until every event posted before this call has been delivered to
    /// every listener.
    ///
    /// Returns `true` once drained, or `false` if `timeout` elapses first. A
    /// bus that was never started only drains if nothing was posted. Called
    /// from a listener callback it returns `false` immediately, since the
    /// dispatcher cannot drain while it waits.
    pub fn wait_until_empty(&self, timeout: Duration) -> bool {
        if self.inner.shared.on_dispatcher_thread() {
            tracing::warn!(
                bus = %self.id(),
                "wait_until_empty called from a listener callback, returning immediately"
            );
            return false;
        }

        let drained = self.inner.shared.queue.wait_drained(timeout);
        if !drained {
            tracing::debug!(
                bus = %self.id(),
                ?timeout,
                unprocessed = self.inner.shared.queue.unprocessed(),
                "Timed out waiting for listener bus to drain"
            );
        }
        drained
    }

    /// Async variant of [`wait_until_empty`](Self::wait_until_empty), run on
    /// tokio's blocking pool.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BlockingTask`] if the blocking task could not complete.
    pub async fn wait_until_empty_async(&self, timeout: Duration) -> Result<bool> {
        let bus = self.clone();
        Ok(tokio::task::spawn_blocking(move || bus.wait_until_empty(timeout)).await?)
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Returns a snapshot of the bus counters.
    #[must_use]
    pub fn metrics(&self) -> BusMetrics {
        BusMetrics::new(
            self.inner.shared.queue.counters(),
            self.inner.shared.listener_failures(),
        )
    }

    /// Returns per-listener failure counts, in registration order.
    #[must_use]
    pub fn listener_failures(&self) -> Vec<ListenerFailureCount> {
        self.inner.shared.registry.failure_counts()
    }
}

impl Default for ListenerBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ListenerBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerBus")
            .field("id", &self.id())
            .field("state", &self.state())
            .field("listener_count", &self.listener_count())
            .field("pending", &self.inner.shared.queue.pending())
            .finish_non_exhaustive()
    }
}

/// Non-owning handle to a [`ListenerBus`], created by
/// [`ListenerBus::downgrade`].
///
/// Meant for listeners that call back into the bus they are registered on.
#[derive(Clone)]
pub struct WeakListenerBus {
    inner: Weak<Inner>,
}

impl WeakListenerBus {
    /// Returns the bus, or `None` once every [`ListenerBus`] handle is gone.
    #[must_use]
    pub fn upgrade(&self) -> Option<ListenerBus> {
        self.inner.upgrade().map(|inner| ListenerBus { inner })
    }
}

impl std::fmt::Debug for WeakListenerBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakListenerBus")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}
