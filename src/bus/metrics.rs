// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bus counters.

use serde::Serialize;

use super::queue::QueueCounters;

/// Snapshot of a bus's counters, as returned by
/// [`ListenerBus::metrics`](crate::ListenerBus::metrics).
///
/// Counters are monotonic over the bus's lifetime. Posts discarded because
/// the bus was stopped are not counted anywhere.
///
/// # Examples
///
/// ```
/// use listener_bus::ListenerBus;
/// use listener_bus::event::ListenerEvent;
///
/// let bus = ListenerBus::new();
/// bus.post(ListenerEvent::application_end());
///
/// let metrics = bus.metrics();
/// assert_eq!(metrics.accepted, 1);
/// assert_eq!(metrics.pending, 1);
/// assert_eq!(metrics.processed, 0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct BusMetrics {
    /// Events accepted into the queue.
    pub accepted: u64,
    /// Events delivered to every listener.
    pub processed: u64,
    /// Events dropped by a full bounded queue.
    pub dropped: u64,
    /// Events waiting in the queue.
    pub pending: usize,
    /// Listener callbacks that returned an error or panicked.
    pub listener_failures: u64,
}

impl BusMetrics {
    pub(crate) fn new(queue: QueueCounters, listener_failures: u64) -> Self {
        Self {
            accepted: queue.accepted,
            processed: queue.processed,
            dropped: queue.dropped,
            pending: queue.pending,
            listener_failures,
        }
    }

    /// Events accepted but not yet delivered to every listener.
    #[must_use]
    pub fn in_flight(&self) -> u64 {
        self.accepted - self.processed
    }
}
