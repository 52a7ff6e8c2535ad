// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Listener event types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{JobId, JobOutcome, StageId, StageInfo, TaskEndReason, TaskInfo, TaskMetrics};

/// A stage was submitted to the task scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSubmitted {
    /// The submitted stage.
    pub stage_info: StageInfo,
}

/// A stage finished, successfully or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageCompleted {
    /// The completed stage; `failure_reason` is set when it failed.
    pub stage_info: StageInfo,
}

/// A task attempt was launched on an executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStart {
    /// Stage attempt the task belongs to.
    pub stage_attempt: u32,
    /// The launched task.
    pub task_info: TaskInfo,
}

/// The driver started fetching a task's result from the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskGettingResult {
    /// The task whose result is being fetched.
    pub task_info: TaskInfo,
}

/// A task attempt ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEnd {
    /// Stage attempt the task belongs to.
    pub stage_attempt: u32,
    /// Kind of task (`result` or `shuffle_map`).
    pub task_type: String,
    /// Why the task ended.
    pub reason: TaskEndReason,
    /// The finished task.
    pub task_info: TaskInfo,
    /// Executor metrics; absent when the executor was lost before reporting.
    pub task_metrics: Option<TaskMetrics>,
}

/// A job was submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStart {
    /// Job identifier.
    pub job_id: JobId,
    /// Submission time.
    pub time: DateTime<Utc>,
    /// Stages the job is made of.
    pub stage_ids: Vec<StageId>,
}

/// A job finished.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEnd {
    /// Job identifier.
    pub job_id: JobId,
    /// Completion time.
    pub time: DateTime<Utc>,
    /// How the job ended.
    pub outcome: JobOutcome,
}

/// The application owning the scheduler started.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationStart {
    /// Application name.
    pub app_name: String,
    /// Identifier assigned by the cluster manager, if any.
    pub app_id: Option<String>,
    /// Start time.
    pub time: DateTime<Utc>,
    /// User that submitted the application.
    pub user: String,
}

/// The application is shutting down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationEnd {
    /// End time.
    pub time: DateTime<Utc>,
}

/// An executor registered with the driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorAdded {
    /// Executor identifier.
    pub executor_id: String,
    /// Executor host.
    pub host: String,
    /// Number of task slots offered.
    pub cores: u32,
    /// Registration time.
    pub time: DateTime<Utc>,
}

/// An executor was lost or decommissioned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorRemoved {
    /// Executor identifier.
    pub executor_id: String,
    /// Why it was removed.
    pub reason: String,
    /// Removal time.
    pub time: DateTime<Utc>,
}

/// Lifecycle events posted by the scheduler to the listener bus.
///
/// Each variant wraps a payload struct of the same name so that
/// [`Listener`](crate::listener::Listener) can expose one method per kind.
///
/// # Examples
///
/// ```
/// use listener_bus::event::{EventKind, JobId, JobOutcome, ListenerEvent};
///
/// let event = ListenerEvent::job_end(JobId::new(1), JobOutcome::Succeeded);
/// assert_eq!(event.kind(), EventKind::JobEnd);
/// assert!(event.is_job_event());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ListenerEvent {
    /// See [`StageSubmitted`].
    StageSubmitted(StageSubmitted),
    /// See [`StageCompleted`].
    StageCompleted(StageCompleted),
    /// See [`TaskStart`].
    TaskStart(TaskStart),
    /// See [`TaskGettingResult`].
    TaskGettingResult(TaskGettingResult),
    /// See [`TaskEnd`].
    TaskEnd(TaskEnd),
    /// See [`JobStart`].
    JobStart(JobStart),
    /// See [`JobEnd`].
    JobEnd(JobEnd),
    /// See [`ApplicationStart`].
    ApplicationStart(ApplicationStart),
    /// See [`ApplicationEnd`].
    ApplicationEnd(ApplicationEnd),
    /// See [`ExecutorAdded`].
    ExecutorAdded(ExecutorAdded),
    /// See [`ExecutorRemoved`].
    ExecutorRemoved(ExecutorRemoved),
}

impl ListenerEvent {
    /// Returns the classification of this event.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::StageSubmitted(_) => EventKind::StageSubmitted,
            Self::StageCompleted(_) => EventKind::StageCompleted,
            Self::TaskStart(_) => EventKind::TaskStart,
            Self::TaskGettingResult(_) => EventKind::TaskGettingResult,
            Self::TaskEnd(_) => EventKind::TaskEnd,
            Self::JobStart(_) => EventKind::JobStart,
            Self::JobEnd(_) => EventKind::JobEnd,
            Self::ApplicationStart(_) => EventKind::ApplicationStart,
            Self::ApplicationEnd(_) => EventKind::ApplicationEnd,
            Self::ExecutorAdded(_) => EventKind::ExecutorAdded,
            Self::ExecutorRemoved(_) => EventKind::ExecutorRemoved,
        }
    }

    /// Returns `true` for job start/end events.
    #[must_use]
    pub fn is_job_event(&self) -> bool {
        matches!(self, Self::JobStart(_) | Self::JobEnd(_))
    }

    /// Returns `true` for stage submitted/completed events.
    #[must_use]
    pub fn is_stage_event(&self) -> bool {
        matches!(self, Self::StageSubmitted(_) | Self::StageCompleted(_))
    }

    /// Returns `true` for task start/getting-result/end events.
    #[must_use]
    pub fn is_task_event(&self) -> bool {
        matches!(
            self,
            Self::TaskStart(_) | Self::TaskGettingResult(_) | Self::TaskEnd(_)
        )
    }

    /// Creates a job start event stamped with the current time.
    #[must_use]
    pub fn job_start(job_id: JobId, stage_ids: Vec<StageId>) -> Self {
        Self::JobStart(JobStart {
            job_id,
            time: Utc::now(),
            stage_ids,
        })
    }

    /// Creates a job end event stamped with the current time.
    #[must_use]
    pub fn job_end(job_id: JobId, outcome: JobOutcome) -> Self {
        Self::JobEnd(JobEnd {
            job_id,
            time: Utc::now(),
            outcome,
        })
    }

    /// Creates a stage submitted event.
    #[must_use]
    pub fn stage_submitted(stage_info: StageInfo) -> Self {
        Self::StageSubmitted(StageSubmitted { stage_info })
    }

    /// Creates a stage completed event.
    #[must_use]
    pub fn stage_completed(stage_info: StageInfo) -> Self {
        Self::StageCompleted(StageCompleted { stage_info })
    }

    /// Creates a task start event.
    #[must_use]
    pub fn task_start(stage_attempt: u32, task_info: TaskInfo) -> Self {
        Self::TaskStart(TaskStart {
            stage_attempt,
            task_info,
        })
    }

    /// Creates a task getting-result event.
    #[must_use]
    pub fn task_getting_result(task_info: TaskInfo) -> Self {
        Self::TaskGettingResult(TaskGettingResult { task_info })
    }

    /// Creates a task end event for a result task.
    #[must_use]
    pub fn task_end(
        stage_attempt: u32,
        reason: TaskEndReason,
        task_info: TaskInfo,
        task_metrics: Option<TaskMetrics>,
    ) -> Self {
        Self::TaskEnd(TaskEnd {
            stage_attempt,
            task_type: "result".to_string(),
            reason,
            task_info,
            task_metrics,
        })
    }

    /// Creates an application end event stamped with the current time.
    #[must_use]
    pub fn application_end() -> Self {
        Self::ApplicationEnd(ApplicationEnd { time: Utc::now() })
    }
}

/// Classification of [`ListenerEvent`]s, used for logging and counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// [`ListenerEvent::StageSubmitted`]
    StageSubmitted,
    /// [`ListenerEvent::StageCompleted`]
    StageCompleted,
    /// [`ListenerEvent::TaskStart`]
    TaskStart,
    /// [`ListenerEvent::TaskGettingResult`]
    TaskGettingResult,
    /// [`ListenerEvent::TaskEnd`]
    TaskEnd,
    /// [`ListenerEvent::JobStart`]
    JobStart,
    /// [`ListenerEvent::JobEnd`]
    JobEnd,
    /// [`ListenerEvent::ApplicationStart`]
    ApplicationStart,
    /// [`ListenerEvent::ApplicationEnd`]
    ApplicationEnd,
    /// [`ListenerEvent::ExecutorAdded`]
    ExecutorAdded,
    /// [`ListenerEvent::ExecutorRemoved`]
    ExecutorRemoved,
}

impl EventKind {
    /// Returns a short stable label (`snake_case`) for use in logs/metrics.
    #[must_use]
    pub fn as_label(self) -> &'static str {
        match self {
            Self::StageSubmitted => "stage_submitted",
            Self::StageCompleted => "stage_completed",
            Self::TaskStart => "task_start",
            Self::TaskGettingResult => "task_getting_result",
            Self::TaskEnd => "task_end",
            Self::JobStart => "job_start",
            Self::JobEnd => "job_end",
            Self::ApplicationStart => "application_start",
            Self::ApplicationEnd => "application_end",
            Self::ExecutorAdded => "executor_added",
            Self::ExecutorRemoved => "executor_removed",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}
