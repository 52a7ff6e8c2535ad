// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pending-event queue between producers and the dispatcher.
//!
//! Many producers append, exactly one consumer takes. Besides the FIFO
//! itself the queue keeps the counters that drain detection relies on:
//! `accepted` is bumped on append, `processed` by the dispatcher once an
//! event has been handed to every listener. Both live under the same lock
//! as the items, so "everything accepted before now has been processed" is
//! a single comparison.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::config::{OverflowPolicy, QueueCapacity};
use crate::event::ListenerEvent;

/// One entry of the queue.
#[derive(Debug)]
pub(crate) enum QueueItem {
    /// An event to dispatch.
    Event(ListenerEvent),
    /// Terminal marker: the dispatcher exits when it takes this.
    Stop,
}

/// Why an append was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Rejected {
    /// The terminal marker has been enqueued.
    Closed,
    /// Bounded queue full; `dropped` is the drop count including this one.
    Full { dropped: u64 },
}

/// Point-in-time queue counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct QueueCounters {
    pub(crate) accepted: u64,
    pub(crate) processed: u64,
    pub(crate) dropped: u64,
    pub(crate) pending: usize,
}

#[derive(Debug, Default)]
struct QueueState {
    items: VecDeque<QueueItem>,
    closed: bool,
    marker_queued: bool,
    accepted: u64,
    processed: u64,
    dropped: u64,
}

impl QueueState {
    fn pending(&self) -> usize {
        self.items.len() - usize::from(self.marker_queued)
    }
}

/// Multi-producer, single-consumer FIFO with drain tracking.
#[derive(Debug)]
pub(crate) struct EventQueue {
    capacity: QueueCapacity,
    state: Mutex<QueueState>,
    not_empty: Condvar,
    not_full: Condvar,
    drained: Condvar,
}

impl EventQueue {
    pub(crate) fn new(capacity: QueueCapacity) -> Self {
        Self {
            capacity,
            state: Mutex::new(QueueState::default()),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            drained: Condvar::new(),
        }
    }

    /// Appends `event` at the tail.
    ///
    /// Never waits on an unbounded queue. On a bounded queue with
    /// [`OverflowPolicy::Block`] it waits for room when `may_block` is set;
    /// otherwise a full queue drops the event.
    pub(crate) fn append(&self, event: ListenerEvent, may_block: bool) -> Result<(), Rejected> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(Rejected::Closed);
        }

        if let Some(limit) = self.capacity.limit() {
            let block = may_block && self.capacity.overflow() == Some(OverflowPolicy::Block);
            if block {
                while !state.closed && state.pending() >= limit {
                    self.not_full.wait(&mut state);
                }
                if state.closed {
                    return Err(Rejected::Closed);
                }
            } else if state.pending() >= limit {
                state.dropped += 1;
                return Err(Rejected::Full {
                    dropped: state.dropped,
                });
            }
        }

        state.items.push_back(QueueItem::Event(event));
        state.accepted += 1;
        self.not_empty.notify_one();
        Ok(())
    }

    /// Removes the head item, waiting while the queue is empty.
    pub(crate) fn take_blocking(&self) -> QueueItem {
        let mut state = self.state.lock();
        loop {
            if let Some(item) = state.items.pop_front() {
                if matches!(item, QueueItem::Stop) {
                    state.marker_queued = false;
                } else {
                    self.not_full.notify_one();
                }
                return item;
            }
            self.not_empty.wait(&mut state);
        }
    }

    /// Records that one taken event has been delivered to every listener.
    pub(crate) fn mark_processed(&self) {
        let mut state = self.state.lock();
        state.processed += 1;
        self.drained.notify_all();
    }

    /// Enqueues the terminal marker and refuses any further append.
    ///
    /// The marker bypasses the capacity bound. Returns `false` if the queue
    /// was already closed.
    pub(crate) fn close(&self) -> bool {
        let mut state = self.state.lock();
        if state.closed {
            return false;
        }
        state.closed = true;
        state.marker_queued = true;
        state.items.push_back(QueueItem::Stop);
        self.not_empty.notify_one();
        self.not_full.notify_all();
        true
    }

    /// Waits until every event accepted before this call has been processed.
    ///
    /// Returns `false` if `timeout` elapses first. The queue lock is released
    /// while waiting.
    pub(crate) fn wait_drained(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.state.lock();
        let target = state.accepted;

        while state.processed < target {
            match deadline {
                Some(deadline) => {
                    if self.drained.wait_until(&mut state, deadline).timed_out() {
                        return state.processed >= target;
                    }
                }
                None => self.drained.wait(&mut state),
            }
        }
        true
    }

    /// Events appended but not yet taken by the dispatcher.
    pub(crate) fn pending(&self) -> usize {
        self.state.lock().pending()
    }

    /// Events accepted but not yet fully dispatched.
    pub(crate) fn unprocessed(&self) -> u64 {
        let state = self.state.lock();
        state.accepted - state.processed
    }

    pub(crate) fn counters(&self) -> QueueCounters {
        let state = self.state.lock();
        QueueCounters {
            accepted: state.accepted,
            processed: state.processed,
            dropped: state.dropped,
            pending: state.pending(),
        }
    }
}
