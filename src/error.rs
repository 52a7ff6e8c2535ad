// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the listener bus.
//!
//! Two families live here:
//!
//! - [`Error`] is returned synchronously to whoever called a bus operation
//!   (lifecycle violations, overflow on [`try_post`](crate::ListenerBus::try_post)).
//! - [`ListenerError`] and [`ListenerFailure`] describe a listener callback
//!   that failed. They are logged and counted by the dispatcher and are never
//!   returned to a producer.

use std::fmt;

use thiserror::Error;

use crate::bus::BusState;

/// The main error type for this library.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    /// A lifecycle operation was called in a state that does not allow it.
    #[error("cannot {operation} listener bus in state {state}")]
    IllegalLifecycleTransition {
        /// The operation that was attempted (`start` or `stop`).
        operation: &'static str,
        /// The state the bus was in.
        state: BusState,
    },

    /// The bus has been stopped and no longer accepts the operation.
    #[error("listener bus is stopped; {operation} rejected")]
    BusStopped {
        /// The operation that was attempted.
        operation: &'static str,
    },

    /// A bounded queue was full and the event was dropped.
    #[error("event queue is full (capacity {capacity}); event dropped")]
    QueueOverflow {
        /// Configured queue capacity.
        capacity: usize,
    },

    /// `stop` was called from a listener running on the dispatcher thread.
    #[error("stop called from the dispatcher thread would never return")]
    StopFromDispatcher,

    /// The dispatcher thread could not be spawned.
    #[error("failed to spawn dispatcher thread: {0}")]
    DispatcherSpawn(#[source] std::io::Error),

    /// A blocking bus operation run on the tokio blocking pool did not complete.
    #[error("blocking bus operation failed: {0}")]
    BlockingTask(#[from] tokio::task::JoinError),
}

impl Error {
    /// Returns a short stable label (`snake_case`) for use in logs/metrics.
    ///
    /// # Examples
    ///
    /// ```
    /// use listener_bus::Error;
    ///
    /// let err = Error::QueueOverflow { capacity: 16 };
    /// assert_eq!(err.as_label(), "queue_overflow");
    /// ```
    #[must_use]
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::IllegalLifecycleTransition { .. } => "illegal_lifecycle_transition",
            Self::BusStopped { .. } => "bus_stopped",
            Self::QueueOverflow { .. } => "queue_overflow",
            Self::StopFromDispatcher => "stop_from_dispatcher",
            Self::DispatcherSpawn(_) => "dispatcher_spawn",
            Self::BlockingTask(_) => "blocking_task",
        }
    }

    /// Returns `true` for [`Error::IllegalLifecycleTransition`].
    #[must_use]
    pub fn is_illegal_transition(&self) -> bool {
        matches!(self, Self::IllegalLifecycleTransition { .. })
    }
}

/// Error returned by a [`Listener`](crate::listener::Listener) callback.
///
/// # Examples
///
/// ```
/// use listener_bus::ListenerError;
///
/// let io = std::io::Error::other("disk full");
/// let err = ListenerError::with_source("cannot append to event log", io);
/// assert_eq!(err.to_string(), "cannot append to event log");
/// assert!(std::error::Error::source(&err).is_some());
/// ```
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ListenerError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl ListenerError {
    /// Creates an error with a message only.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an error wrapping an underlying cause.
    #[must_use]
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Returns the error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<std::io::Error> for ListenerError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source("i/o error in listener", err)
    }
}

impl From<serde_json::Error> for ListenerError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source("failed to serialize event", err)
    }
}

/// How a single listener invocation failed.
///
/// Captured by the dispatcher per listener and per event.
#[derive(Debug)]
pub enum ListenerFailure {
    /// The callback returned an error.
    Returned(ListenerError),
    /// The callback panicked; holds the panic message when it was a string.
    Panicked(String),
}

impl ListenerFailure {
    /// Returns a short stable label (`snake_case`) for use in logs/metrics.
    #[must_use]
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::Returned(_) => "listener_error",
            Self::Panicked(_) => "listener_panic",
        }
    }
}

impl fmt::Display for ListenerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Returned(err) => write!(f, "returned error: {err}"),
            Self::Panicked(info) => write!(f, "panicked: {info}"),
        }
    }
}

impl std::error::Error for ListenerFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Returned(err) => Some(err),
            Self::Panicked(_) => None,
        }
    }
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;
