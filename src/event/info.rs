// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Payload records carried by listener events.
//!
//! These are read-only snapshots taken by the scheduler at the moment an
//! event is posted. The bus never inspects them; only listeners do.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{StageId, TaskId};

/// Snapshot of a stage attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageInfo {
    /// Stage identifier.
    pub stage_id: StageId,
    /// Attempt number of this stage (0-based).
    pub attempt: u32,
    /// Human-readable stage name (usually the call site).
    pub name: String,
    /// Number of tasks in the stage.
    pub num_tasks: u32,
    /// When the stage was submitted, if it has been.
    pub submission_time: Option<DateTime<Utc>>,
    /// When the stage completed, if it has.
    pub completion_time: Option<DateTime<Utc>>,
    /// Failure reason when the stage failed.
    pub failure_reason: Option<String>,
}

impl StageInfo {
    /// Creates a stage snapshot with no timestamps set.
    #[must_use]
    pub fn new(stage_id: StageId, attempt: u32, name: impl Into<String>, num_tasks: u32) -> Self {
        Self {
            stage_id,
            attempt,
            name: name.into(),
            num_tasks,
            submission_time: None,
            completion_time: None,
            failure_reason: None,
        }
    }

    /// Sets the submission timestamp.
    #[must_use]
    pub fn submitted_at(mut self, at: DateTime<Utc>) -> Self {
        self.submission_time = Some(at);
        self
    }

    /// Sets the completion timestamp.
    #[must_use]
    pub fn completed_at(mut self, at: DateTime<Utc>) -> Self {
        self.completion_time = Some(at);
        self
    }

    /// Marks the stage as failed.
    #[must_use]
    pub fn failed(mut self, reason: impl Into<String>) -> Self {
        self.failure_reason = Some(reason.into());
        self
    }

    /// Returns `true` if the stage carries a failure reason.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.failure_reason.is_some()
    }

    /// Wall-clock duration between submission and completion, when both are known.
    #[must_use]
    pub fn duration(&self) -> Option<Duration> {
        let (start, end) = (self.submission_time?, self.completion_time?);
        (end - start).to_std().ok()
    }
}

/// Snapshot of a task attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskInfo {
    /// Task identifier.
    pub task_id: TaskId,
    /// Index of the task within its stage.
    pub index: u32,
    /// Attempt number of this task (0-based).
    pub attempt: u32,
    /// Stage the task belongs to.
    pub stage_id: StageId,
    /// Executor running the task.
    pub executor_id: String,
    /// Host of the executor.
    pub host: String,
    /// When the task was launched.
    pub launch_time: DateTime<Utc>,
    /// When the driver started fetching the task result, if it did.
    pub getting_result_time: Option<DateTime<Utc>>,
    /// When the task finished, if it did.
    pub finish_time: Option<DateTime<Utc>>,
}

impl TaskInfo {
    /// Creates a task snapshot launched at `launch_time`.
    #[must_use]
    pub fn new(
        task_id: TaskId,
        index: u32,
        stage_id: StageId,
        executor_id: impl Into<String>,
        host: impl Into<String>,
        launch_time: DateTime<Utc>,
    ) -> Self {
        Self {
            task_id,
            index,
            attempt: 0,
            stage_id,
            executor_id: executor_id.into(),
            host: host.into(),
            launch_time,
            getting_result_time: None,
            finish_time: None,
        }
    }

    /// Sets the attempt number.
    #[must_use]
    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }

    /// Marks the moment result fetching started.
    #[must_use]
    pub fn getting_result_at(mut self, at: DateTime<Utc>) -> Self {
        self.getting_result_time = Some(at);
        self
    }

    /// Marks the task finished.
    #[must_use]
    pub fn finished_at(mut self, at: DateTime<Utc>) -> Self {
        self.finish_time = Some(at);
        self
    }

    /// Returns `true` once the driver started fetching this task's result.
    #[must_use]
    pub fn is_getting_result(&self) -> bool {
        self.getting_result_time.is_some()
    }

    /// Time between launch and finish, when finished.
    #[must_use]
    pub fn duration(&self) -> Option<Duration> {
        self.finish_time
            .and_then(|end| (end - self.launch_time).to_std().ok())
    }
}

/// Metrics reported by an executor when a task ends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskMetrics {
    /// Time spent running the task body on the executor.
    pub executor_run_time: Duration,
    /// Time spent in garbage collection / allocator pauses.
    pub gc_time: Duration,
    /// Serialized size of the task result in bytes.
    pub result_size: u64,
    /// Bytes read from input sources.
    pub bytes_read: u64,
    /// Records read from input sources.
    pub records_read: u64,
    /// Bytes written to output sinks.
    pub bytes_written: u64,
    /// Records written to output sinks.
    pub records_written: u64,
    /// Shuffle bytes fetched from other executors.
    pub shuffle_read_bytes: u64,
    /// Shuffle bytes written for downstream stages.
    pub shuffle_write_bytes: u64,
}

/// Final outcome of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum JobOutcome {
    /// All stages of the job completed.
    Succeeded,
    /// The job was aborted.
    Failed {
        /// Why the job failed.
        reason: String,
    },
}

impl JobOutcome {
    /// Returns `true` for [`JobOutcome::Succeeded`].
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

/// Why a task attempt ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskEndReason {
    /// The task completed and its result was accepted.
    Success,
    /// The task body returned an error or panicked.
    Failed {
        /// Error description reported by the executor.
        message: String,
    },
    /// The task was killed (speculation, job cancellation, executor loss).
    Killed {
        /// Why the task was killed.
        message: String,
    },
    /// The task could not fetch shuffle data produced by a previous stage.
    FetchFailed {
        /// Stage whose output could not be fetched.
        shuffle_stage: StageId,
        /// Host that failed to serve the shuffle block.
        host: String,
    },
}

impl TaskEndReason {
    /// Returns `true` for [`TaskEndReason::Success`].
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}
