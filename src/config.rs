// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Listener bus configuration.

use serde::Deserialize;

/// Default name of the dispatcher thread.
pub const DEFAULT_THREAD_NAME: &str = "listener-bus";

/// Configuration for a [`ListenerBus`](crate::ListenerBus).
///
/// The defaults give an unbounded queue, so `post` never waits and never
/// drops. A bounded queue is opt-in.
///
/// # Examples
///
/// ```
/// use listener_bus::config::{BusConfig, OverflowPolicy, QueueCapacity};
///
/// // Defaults: unbounded queue, "listener-bus" dispatcher thread
/// let config = BusConfig::default();
/// assert_eq!(config.capacity, QueueCapacity::Unbounded);
///
/// // Bounded queue that drops new events when full
/// let config = BusConfig::new()
///     .with_bounded_queue(10_000, OverflowPolicy::DropNewest)
///     .with_thread_name("app-listener-bus");
/// assert_eq!(config.capacity.limit(), Some(10_000));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Queue capacity and overflow behavior.
    pub capacity: QueueCapacity,
    /// Name given to the dispatcher thread.
    pub thread_name: String,
}

impl BusConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bounds the queue to `capacity` events (clamped to at least 1).
    #[must_use]
    pub fn with_bounded_queue(mut self, capacity: usize, overflow: OverflowPolicy) -> Self {
        self.capacity = QueueCapacity::Bounded {
            capacity: capacity.max(1),
            overflow,
        };
        self
    }

    /// Removes any queue bound.
    #[must_use]
    pub fn with_unbounded_queue(mut self) -> Self {
        self.capacity = QueueCapacity::Unbounded;
        self
    }

    /// Sets the dispatcher thread name.
    #[must_use]
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            capacity: QueueCapacity::Unbounded,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }
}

/// Capacity of the pending-event queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueueCapacity {
    /// No limit; producers never wait and nothing is dropped.
    #[default]
    Unbounded,
    /// At most `capacity` events may be pending.
    Bounded {
        /// Maximum number of pending events.
        capacity: usize,
        /// What happens to a post that finds the queue full.
        overflow: OverflowPolicy,
    },
}

impl QueueCapacity {
    /// Returns the bound, or `None` when unbounded.
    ///
    /// A configured bound of 0 is reported (and enforced) as 1.
    #[must_use]
    pub fn limit(&self) -> Option<usize> {
        match self {
            Self::Unbounded => None,
            Self::Bounded { capacity, .. } => Some((*capacity).max(1)),
        }
    }

    /// Returns the overflow policy, or `None` when unbounded.
    #[must_use]
    pub fn overflow(&self) -> Option<OverflowPolicy> {
        match self {
            Self::Unbounded => None,
            Self::Bounded { overflow, .. } => Some(*overflow),
        }
    }
}

/// Behavior of a bounded queue when a producer posts into a full queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Discard the new event and count it as dropped.
    #[default]
    DropNewest,
    /// Make the producer wait until the dispatcher frees a slot.
    Block,
}
