// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Scheduler lifecycle events.
//!
//! This module defines the immutable values the scheduler posts to the
//! [`ListenerBus`](crate::ListenerBus): the [`ListenerEvent`] enum, its
//! payload structs, and the identifiers and records they carry.
//!
//! # Examples
//!
//! ```
//! use listener_bus::event::{JobId, JobOutcome, ListenerEvent, StageId};
//!
//! let started = ListenerEvent::job_start(JobId::new(0), vec![StageId::new(0), StageId::new(1)]);
//! let ended = ListenerEvent::job_end(JobId::new(0), JobOutcome::Succeeded);
//!
//! assert!(started.is_job_event());
//! assert!(ended.is_job_event());
//! ```

mod ids;
mod info;
mod listener_event;

pub use ids::{JobId, StageId, TaskId};
pub use info::{JobOutcome, StageInfo, TaskEndReason, TaskInfo, TaskMetrics};
pub use listener_event::{
    ApplicationEnd, ApplicationStart, EventKind, ExecutorAdded, ExecutorRemoved, JobEnd, JobStart,
    ListenerEvent, StageCompleted, StageSubmitted, TaskEnd, TaskGettingResult, TaskStart,
};
