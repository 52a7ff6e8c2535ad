// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The dispatcher: the single consumer of the event queue.

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle, ThreadId};

use crate::event::ListenerEvent;
use crate::listener::{ListenerRegistry, invoke};

use super::BusId;
use super::queue::{EventQueue, QueueItem};

/// State shared between the bus handles and the dispatcher thread.
///
/// Kept separate from the bus internals so the dispatcher never owns the
/// bus, and dropping the last bus handle can still close the queue.
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) bus_id: BusId,
    pub(crate) queue: EventQueue,
    pub(crate) registry: ListenerRegistry,
    listener_failures: AtomicU64,
    dispatcher_thread: OnceLock<ThreadId>,
}

impl Shared {
    pub(crate) fn new(bus_id: BusId, queue: EventQueue) -> Self {
        Self {
            bus_id,
            queue,
            registry: ListenerRegistry::new(),
            listener_failures: AtomicU64::new(0),
            dispatcher_thread: OnceLock::new(),
        }
    }

    /// Returns `true` when called from the dispatcher thread, i.e. from
    /// inside a listener callback.
    pub(crate) fn on_dispatcher_thread(&self) -> bool {
        self.dispatcher_thread.get() == Some(&thread::current().id())
    }

    pub(crate) fn listener_failures(&self) -> u64 {
        self.listener_failures.load(Ordering::Relaxed)
    }
}

/// Spawns the dispatcher thread.
///
/// The thread runs until it takes the terminal marker from the queue. A name
/// containing a NUL byte is rejected with `InvalidInput`.
pub(crate) fn spawn(shared: Arc<Shared>, thread_name: &str) -> io::Result<JoinHandle<()>> {
    if thread_name.contains('\0') {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "dispatcher thread name contains a NUL byte",
        ));
    }
    thread::Builder::new()
        .name(thread_name.to_string())
        .spawn(move || run(&shared))
}

fn run(shared: &Shared) {
    // Set before the first event so a listener calling back into the bus is
    // always recognized.
    let _ = shared.dispatcher_thread.set(thread::current().id());
    tracing::debug!(bus = %shared.bus_id, "Dispatcher started");

    let mut delivered: u64 = 0;
    loop {
        match shared.queue.take_blocking() {
            QueueItem::Stop => break,
            QueueItem::Event(event) => {
                dispatch(shared, &event);
                shared.queue.mark_processed();
                delivered += 1;
            }
        }
    }

    tracing::debug!(bus = %shared.bus_id, delivered, "Dispatcher drained, exiting");
}

/// Delivers one event to every registered listener, in registration order.
fn dispatch(shared: &Shared, event: &ListenerEvent) {
    let kind = event.kind();
    let listeners = shared.registry.snapshot();
    tracing::trace!(
        bus = %shared.bus_id,
        event = kind.as_label(),
        listeners = listeners.len(),
        "Dispatching event"
    );

    for registration in &*listeners {
        if let Err(failure) = invoke(registration.listener(), event) {
            let failures = registration.record_failure();
            shared.listener_failures.fetch_add(1, Ordering::Relaxed);
            tracing::error!(
                bus = %shared.bus_id,
                listener = registration.name(),
                listener_id = %registration.id(),
                event = kind.as_label(),
                kind = failure.as_label(),
                failures,
                error = %failure,
                "Listener failed to handle event"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;
    use crate::config::QueueCapacity;
    use crate::error::ListenerError;
    use crate::event::{JobEnd, JobId, JobOutcome, JobStart};
    use crate::listener::{Listener, ListenerResult};

    struct Recorder(mpsc::Sender<&'static str>, &'static str);

    impl Listener for Recorder {
        fn on_job_start(&self, _event: &JobStart) -> ListenerResult {
            self.0.send(self.1).map_err(|e| ListenerError::with_source("closed", e))
        }
    }

    struct Failing;

    impl Listener for Failing {
        fn on_job_end(&self, _event: &JobEnd) -> ListenerResult {
            Err(ListenerError::new("always fails"))
        }
    }

    fn shared() -> Arc<Shared> {
        Arc::new(Shared::new(BusId::new(), EventQueue::new(QueueCapacity::Unbounded)))
    }

    #[test]
    fn delivers_in_registration_order_and_exits_on_marker() {
        let shared = shared();
        let (tx, rx) = mpsc::channel();
        shared.registry.register(Arc::new(Recorder(tx.clone(), "first")));
        shared.registry.register(Arc::new(Recorder(tx, "second")));

        shared
            .queue
            .append(ListenerEvent::job_start(JobId::new(0), vec![]), true)
            .unwrap();
        shared.queue.close();

        let handle = spawn(Arc::clone(&shared), "dispatcher-test").unwrap();
        handle.join().unwrap();

        let seen: Vec<_> = rx.try_iter().collect();
        assert_eq!(seen, ["first", "second"]);
        assert_eq!(shared.queue.unprocessed(), 0);
    }

    #[test]
    fn failures_are_counted_and_do_not_stop_the_loop() {
        let shared = shared();
        shared.registry.register(Arc::new(Failing));

        for id in 0..3 {
            shared
                .queue
                .append(ListenerEvent::job_end(JobId::new(id), JobOutcome::Succeeded), true)
                .unwrap();
        }
        shared.queue.close();

        spawn(Arc::clone(&shared), "dispatcher-test")
            .unwrap()
            .join()
            .unwrap();

        assert_eq!(shared.listener_failures(), 3);
        assert_eq!(shared.registry.failure_counts()[0].failures, 3);
        assert_eq!(shared.queue.counters().processed, 3);
    }

    #[test]
    fn thread_is_named_and_recognized() {
        let shared = shared();
        assert!(!shared.on_dispatcher_thread());

        let handle = spawn(Arc::clone(&shared), "named-dispatcher").unwrap();
        assert_eq!(handle.thread().name(), Some("named-dispatcher"));

        shared.queue.close();
        handle.join().unwrap();
        assert!(!shared.on_dispatcher_thread());
    }

    #[test]
    fn nul_in_thread_name_is_an_error() {
        let err = spawn(shared(), "bus\0x").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
