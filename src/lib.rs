// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Listener Bus - asynchronous delivery of scheduler events to listeners.
//!
//! A job scheduler posts lifecycle events (job start/end, stage
//! submitted/completed, task start/result/end) without waiting; the bus
//! delivers them on a dedicated thread to every registered listener, in
//! posting order, and isolates listeners that fail.
//!
//! # Features
//!
//! - **Non-blocking posts**: producers never wait under the default unbounded queue
//! - **Ordered fan-out**: every listener sees the same event sequence
//! - **Fault isolation**: a listener that errors or panics is logged and counted
//! - **Clean shutdown**: `stop` drains everything posted before it
//! - **Built-in listeners**: tracing log, JSON-lines event log, stage stats, progress
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use listener_bus::event::{JobId, JobOutcome, ListenerEvent, StageId, StageInfo};
//! use listener_bus::listener::{LogListener, ProgressListener};
//! use listener_bus::ListenerBus;
//!
//! let bus = ListenerBus::new();
//! let progress = Arc::new(ProgressListener::new());
//! bus.add_listener(Arc::new(LogListener::new()))?;
//! bus.add_listener(progress.clone())?;
//!
//! // Events posted before start are buffered
//! bus.post(ListenerEvent::job_start(JobId::new(0), vec![StageId::new(0)]));
//! bus.start()?;
//!
//! let stage = StageInfo::new(StageId::new(0), 0, "count", 4);
//! bus.post(ListenerEvent::stage_submitted(stage.clone()));
//! bus.post(ListenerEvent::stage_completed(stage));
//! bus.post(ListenerEvent::job_end(JobId::new(0), JobOutcome::Succeeded));
//!
//! assert!(bus.wait_until_empty(Duration::from_secs(5)));
//! assert_eq!(progress.snapshot().succeeded_jobs, 1);
//!
//! bus.stop()?;
//! # Ok::<(), listener_bus::Error>(())
//! ```
//!
//! ## Async owners
//!
//! The blocking operations have `tokio` variants that run on the blocking pool:
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use listener_bus::ListenerBus;
//!
//! #[tokio::main]
//! async fn main() -> listener_bus::Result<()> {
//!     let bus = ListenerBus::new();
//!     bus.start()?;
//!
//!     let drained = bus.wait_until_empty_async(Duration::from_secs(1)).await?;
//!     assert!(drained);
//!
//!     bus.stop_async().await
//! }
//! ```

pub mod bus;
pub mod config;
pub mod error;
pub mod event;
pub mod listener;

pub use bus::{BusId, BusMetrics, BusState, ListenerBus, WeakListenerBus};
pub use config::{BusConfig, OverflowPolicy, QueueCapacity};
pub use error::{Error, ListenerError, ListenerFailure, Result};
pub use event::{EventKind, JobId, JobOutcome, ListenerEvent, StageId, TaskEndReason, TaskId};
pub use listener::{Listener, ListenerId, ListenerResult};
