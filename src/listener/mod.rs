// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Listeners: the observers the bus fans events out to.
//!
//! # Overview
//!
//! - [`Listener`] - The capability trait, one no-op-by-default method per event kind
//! - [`ListenerId`] - Identifier returned by [`ListenerBus::add_listener`](crate::ListenerBus::add_listener)
//! - Built-in listeners:
//!   - [`LogListener`] - structured `tracing` output
//!   - [`EventLogListener`] - JSON-lines event log over any `io::Write`
//!   - [`StatsListener`] - per-stage task metric summaries
//!   - [`ProgressListener`] - job/stage/task progress for status displays
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use listener_bus::ListenerBus;
//! use listener_bus::event::{JobId, ListenerEvent};
//! use listener_bus::listener::ProgressListener;
//!
//! let bus = ListenerBus::new();
//! let progress = Arc::new(ProgressListener::new());
//! bus.add_listener(progress.clone()).unwrap();
//!
//! bus.start().unwrap();
//! bus.post(ListenerEvent::job_start(JobId::new(0), vec![]));
//! assert!(bus.wait_until_empty(Duration::from_secs(5)));
//! assert_eq!(progress.snapshot().active_jobs, [JobId::new(0)]);
//!
//! bus.stop().unwrap();
//! ```

mod capability;
mod event_log;
mod invoke;
mod log;
mod progress;
mod registry;
mod stats;

pub use capability::{Listener, ListenerResult};
pub use event_log::EventLogListener;
pub use log::LogListener;
pub use progress::{ProgressListener, ProgressSnapshot};
pub use registry::{ListenerFailureCount, ListenerId};
pub use stats::{DEFAULT_RETAINED_STAGES, Distribution, StageSummary, StatsListener};

pub(crate) use invoke::invoke;
pub(crate) use registry::ListenerRegistry;
