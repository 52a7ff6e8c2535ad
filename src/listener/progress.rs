// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Job/stage/task progress aggregate for status displays.

use std::collections::BTreeSet;

use parking_lot::RwLock;

use crate::event::{JobEnd, JobId, JobStart, StageCompleted, StageId, StageSubmitted, TaskEnd, TaskStart};

use super::{Listener, ListenerResult};

/// Point-in-time view of scheduler progress.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    /// Jobs started but not yet ended, in id order.
    pub active_jobs: Vec<JobId>,
    /// Jobs that ended successfully.
    pub succeeded_jobs: u64,
    /// Jobs that ended with a failure.
    pub failed_jobs: u64,
    /// Stages submitted but not yet completed, in id order.
    pub active_stages: Vec<StageId>,
    /// Stages completed without failure.
    pub completed_stages: u64,
    /// Stages completed with a failure reason.
    pub failed_stages: u64,
    /// Tasks started and not yet ended.
    pub running_tasks: u64,
    /// Tasks that ended successfully.
    pub succeeded_tasks: u64,
    /// Tasks that ended any other way.
    pub failed_tasks: u64,
}

/// UI-style aggregator of scheduler progress.
///
/// Written from the dispatcher thread, read from anywhere via
/// [`snapshot`](ProgressListener::snapshot).
///
/// # Examples
///
/// ```
/// use listener_bus::event::{JobId, JobOutcome, ListenerEvent};
/// use listener_bus::listener::{Listener, ProgressListener};
///
/// let progress = ProgressListener::new();
/// progress.on_event(&ListenerEvent::job_start(JobId::new(3), vec![])).unwrap();
/// assert_eq!(progress.snapshot().active_jobs, [JobId::new(3)]);
///
/// progress.on_event(&ListenerEvent::job_end(JobId::new(3), JobOutcome::Succeeded)).unwrap();
/// let snapshot = progress.snapshot();
/// assert!(snapshot.active_jobs.is_empty());
/// assert_eq!(snapshot.succeeded_jobs, 1);
/// ```
#[derive(Debug, Default)]
pub struct ProgressListener {
    state: RwLock<ProgressState>,
}

#[derive(Debug, Default)]
struct ProgressState {
    active_jobs: BTreeSet<JobId>,
    active_stages: BTreeSet<StageId>,
    succeeded_jobs: u64,
    failed_jobs: u64,
    completed_stages: u64,
    failed_stages: u64,
    running_tasks: u64,
    succeeded_tasks: u64,
    failed_tasks: u64,
}

impl ProgressListener {
    /// Creates an empty aggregate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current progress.
    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        let state = self.state.read();
        ProgressSnapshot {
            active_jobs: state.active_jobs.iter().copied().collect(),
            succeeded_jobs: state.succeeded_jobs,
            failed_jobs: state.failed_jobs,
            active_stages: state.active_stages.iter().copied().collect(),
            completed_stages: state.completed_stages,
            failed_stages: state.failed_stages,
            running_tasks: state.running_tasks,
            succeeded_tasks: state.succeeded_tasks,
            failed_tasks: state.failed_tasks,
        }
    }
}

impl Listener for ProgressListener {
    fn name(&self) -> &str {
        "ProgressListener"
    }

    fn on_job_start(&self, event: &JobStart) -> ListenerResult {
        self.state.write().active_jobs.insert(event.job_id);
        Ok(())
    }

    fn on_job_end(&self, event: &JobEnd) -> ListenerResult {
        let mut state = self.state.write();
        state.active_jobs.remove(&event.job_id);
        if event.outcome.is_success() {
            state.succeeded_jobs += 1;
        } else {
            state.failed_jobs += 1;
        }
        Ok(())
    }

    fn on_stage_submitted(&self, event: &StageSubmitted) -> ListenerResult {
        self.state
            .write()
            .active_stages
            .insert(event.stage_info.stage_id);
        Ok(())
    }

    fn on_stage_completed(&self, event: &StageCompleted) -> ListenerResult {
        let mut state = self.state.write();
        state.active_stages.remove(&event.stage_info.stage_id);
        if event.stage_info.is_failed() {
            state.failed_stages += 1;
        } else {
            state.completed_stages += 1;
        }
        Ok(())
    }

    fn on_task_start(&self, _event: &TaskStart) -> ListenerResult {
        self.state.write().running_tasks += 1;
        Ok(())
    }

    fn on_task_end(&self, event: &TaskEnd) -> ListenerResult {
        let mut state = self.state.write();
        // A task end can arrive for a task whose start was posted before
        // this listener registered.
        state.running_tasks = state.running_tasks.saturating_sub(1);
        if event.reason.is_success() {
            state.succeeded_tasks += 1;
        } else {
            state.failed_tasks += 1;
        }
        Ok(())
    }
}
