// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `LogListener`: one structured `tracing` record per event.
//!
//! Job, stage, application and executor events are emitted at `INFO`; the
//! far more frequent task events at `DEBUG`. The library never installs a
//! subscriber, so nothing is printed unless the host application does.

use crate::event::{
    ApplicationEnd, ApplicationStart, ExecutorAdded, ExecutorRemoved, JobEnd, JobOutcome,
    JobStart, StageCompleted, StageSubmitted, TaskEnd, TaskGettingResult, TaskStart,
};

use super::{Listener, ListenerResult};

/// Event writer listener.
#[derive(Debug, Default)]
pub struct LogListener;

impl LogListener {
    /// Construct a new [`LogListener`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Listener for LogListener {
    fn name(&self) -> &str {
        "LogListener"
    }

    fn on_stage_submitted(&self, e: &StageSubmitted) -> ListenerResult {
        tracing::info!(
            stage = %e.stage_info.stage_id,
            attempt = e.stage_info.attempt,
            tasks = e.stage_info.num_tasks,
            name = %e.stage_info.name,
            "Stage submitted"
        );
        Ok(())
    }

    fn on_stage_completed(&self, e: &StageCompleted) -> ListenerResult {
        let info = &e.stage_info;
        match &info.failure_reason {
            Some(reason) => tracing::info!(
                stage = %info.stage_id,
                attempt = info.attempt,
                reason = %reason,
                "Stage failed"
            ),
            None => tracing::info!(
                stage = %info.stage_id,
                attempt = info.attempt,
                duration = ?info.duration(),
                "Stage completed"
            ),
        }
        Ok(())
    }

    fn on_task_start(&self, e: &TaskStart) -> ListenerResult {
        tracing::debug!(
            task = %e.task_info.task_id,
            stage = %e.task_info.stage_id,
            executor = %e.task_info.executor_id,
            host = %e.task_info.host,
            "Task started"
        );
        Ok(())
    }

    fn on_task_getting_result(&self, e: &TaskGettingResult) -> ListenerResult {
        tracing::debug!(task = %e.task_info.task_id, "Fetching task result");
        Ok(())
    }

    fn on_task_end(&self, e: &TaskEnd) -> ListenerResult {
        tracing::debug!(
            task = %e.task_info.task_id,
            stage = %e.task_info.stage_id,
            reason = ?e.reason,
            duration = ?e.task_info.duration(),
            "Task ended"
        );
        Ok(())
    }

    fn on_job_start(&self, e: &JobStart) -> ListenerResult {
        tracing::info!(job = %e.job_id, stages = e.stage_ids.len(), "Job started");
        Ok(())
    }

    fn on_job_end(&self, e: &JobEnd) -> ListenerResult {
        match &e.outcome {
            JobOutcome::Succeeded => tracing::info!(job = %e.job_id, "Job succeeded"),
            JobOutcome::Failed { reason } => {
                tracing::info!(job = %e.job_id, reason = %reason, "Job failed");
            }
        }
        Ok(())
    }

    fn on_application_start(&self, e: &ApplicationStart) -> ListenerResult {
        tracing::info!(
            app = %e.app_name,
            app_id = ?e.app_id,
            user = %e.user,
            "Application started"
        );
        Ok(())
    }

    fn on_application_end(&self, e: &ApplicationEnd) -> ListenerResult {
        tracing::info!(at = %e.time, "Application ended");
        Ok(())
    }

    fn on_executor_added(&self, e: &ExecutorAdded) -> ListenerResult {
        tracing::info!(
            executor = %e.executor_id,
            host = %e.host,
            cores = e.cores,
            "Executor added"
        );
        Ok(())
    }

    fn on_executor_removed(&self, e: &ExecutorRemoved) -> ListenerResult {
        tracing::info!(executor = %e.executor_id, reason = %e.reason, "Executor removed");
        Ok(())
    }
}
