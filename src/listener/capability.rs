// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The listener capability.

use crate::error::ListenerError;
use crate::event::{
    ApplicationEnd, ApplicationStart, ExecutorAdded, ExecutorRemoved, JobEnd, JobStart,
    ListenerEvent, StageCompleted, StageSubmitted, TaskEnd, TaskGettingResult, TaskStart,
};

/// Result of a listener callback.
pub type ListenerResult = std::result::Result<(), ListenerError>;

/// Observer of scheduler lifecycle events.
///
/// Every method has a no-op default, so an implementation only overrides
/// the kinds it cares about. Events are delivered by the bus's single
/// dispatcher thread, one at a time, in post order.
///
/// [`on_event`](Listener::on_event) is the entry point the dispatcher calls.
/// Its default routes to the per-kind method; override it instead when a
/// listener treats every kind the same way (an event-log writer, say).
///
/// # Failure
///
/// Returning `Err` or panicking is reported and counted by the dispatcher,
/// which then moves on to the next listener and the next event. Blocking is
/// allowed but delays [`stop`](crate::ListenerBus::stop) and
/// [`wait_until_empty`](crate::ListenerBus::wait_until_empty).
///
/// # Examples
///
/// ```
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// use listener_bus::event::JobEnd;
/// use listener_bus::listener::{Listener, ListenerResult};
///
/// #[derive(Default)]
/// struct JobCounter(AtomicUsize);
///
/// impl Listener for JobCounter {
///     fn on_job_end(&self, _event: &JobEnd) -> ListenerResult {
///         self.0.fetch_add(1, Ordering::Relaxed);
///         Ok(())
///     }
/// }
/// ```
pub trait Listener: Send + Sync + 'static {
    /// Human-readable name (for logs and failure counters).
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Handles any event; the default routes to the per-kind methods.
    ///
    /// # Errors
    ///
    /// Returns whatever the per-kind method returned.
    fn on_event(&self, event: &ListenerEvent) -> ListenerResult {
        match event {
            ListenerEvent::StageSubmitted(e) => self.on_stage_submitted(e),
            ListenerEvent::StageCompleted(e) => self.on_stage_completed(e),
            ListenerEvent::TaskStart(e) => self.on_task_start(e),
            ListenerEvent::TaskGettingResult(e) => self.on_task_getting_result(e),
            ListenerEvent::TaskEnd(e) => self.on_task_end(e),
            ListenerEvent::JobStart(e) => self.on_job_start(e),
            ListenerEvent::JobEnd(e) => self.on_job_end(e),
            ListenerEvent::ApplicationStart(e) => self.on_application_start(e),
            ListenerEvent::ApplicationEnd(e) => self.on_application_end(e),
            ListenerEvent::ExecutorAdded(e) => self.on_executor_added(e),
            ListenerEvent::ExecutorRemoved(e) => self.on_executor_removed(e),
        }
    }

    /// Called when a stage is submitted.
    ///
    /// # Errors
    ///
    /// Implementation-defined; the default never fails.
    fn on_stage_submitted(&self, _event: &StageSubmitted) -> ListenerResult {
        Ok(())
    }

    /// Called when a stage completes, successfully or not.
    ///
    /// # Errors
    ///
    /// Implementation-defined; the default never fails.
    fn on_stage_completed(&self, _event: &StageCompleted) -> ListenerResult {
        Ok(())
    }

    /// Called when a task starts.
    ///
    /// # Errors
    ///
    /// Implementation-defined; the default never fails.
    fn on_task_start(&self, _event: &TaskStart) -> ListenerResult {
        Ok(())
    }

    /// Called when the driver begins fetching a task result.
    ///
    /// # Errors
    ///
    /// Implementation-defined; the default never fails.
    fn on_task_getting_result(&self, _event: &TaskGettingResult) -> ListenerResult {
        Ok(())
    }

    /// Called when a task ends.
    ///
    /// # Errors
    ///
    /// Implementation-defined; the default never fails.
    fn on_task_end(&self, _event: &TaskEnd) -> ListenerResult {
        Ok(())
    }

    /// Called when a job starts.
    ///
    /// # Errors
    ///
    /// Implementation-defined; the default never fails.
    fn on_job_start(&self, _event: &JobStart) -> ListenerResult {
        Ok(())
    }

    /// Called when a job ends.
    ///
    /// # Errors
    ///
    /// Implementation-defined; the default never fails.
    fn on_job_end(&self, _event: &JobEnd) -> ListenerResult {
        Ok(())
    }

    /// Called when the application starts.
    ///
    /// # Errors
    ///
    /// Implementation-defined; the default never fails.
    fn on_application_start(&self, _event: &ApplicationStart) -> ListenerResult {
        Ok(())
    }

    /// Called when the application ends.
    ///
    /// # Errors
    ///
    /// Implementation-defined; the default never fails.
    fn on_application_end(&self, _event: &ApplicationEnd) -> ListenerResult {
        Ok(())
    }

    /// Called when an executor registers.
    ///
    /// # Errors
    ///
    /// Implementation-defined; the default never fails.
    fn on_executor_added(&self, _event: &ExecutorAdded) -> ListenerResult {
        Ok(())
    }

    /// Called when an executor is removed.
    ///
    /// # Errors
    ///
    /// Implementation-defined; the default never fails.
    fn on_executor_removed(&self, _event: &ExecutorRemoved) -> ListenerResult {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::Utc;

    use super::*;
    use crate::event::{JobId, JobOutcome, StageId, StageInfo, TaskId, TaskInfo};

    #[derive(Default)]
    struct StageOnly {
        stages: AtomicUsize,
    }

    impl Listener for StageOnly {
        fn on_stage_completed(&self, _event: &StageCompleted) -> ListenerResult {
            self.stages.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Silent;
    impl Listener for Silent {}

    #[test]
    fn default_routing_reaches_overridden_method() {
        let listener = StageOnly::default();
        let stage = StageInfo::new(StageId::new(0), 0, "count", 1);

        listener
            .on_event(&ListenerEvent::stage_completed(stage))
            .unwrap();

        assert_eq!(listener.stages.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unhandled_kinds_are_ignored() {
        let listener = StageOnly::default();
        let task = TaskInfo::new(TaskId::new(0), 0, StageId::new(0), "e", "h", Utc::now());

        listener
            .on_event(&ListenerEvent::job_end(JobId::new(0), JobOutcome::Succeeded))
            .unwrap();
        listener
            .on_event(&ListenerEvent::task_getting_result(task))
            .unwrap();
        listener.on_event(&ListenerEvent::application_end()).unwrap();

        assert_eq!(listener.stages.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn default_name_is_type_name() {
        assert!(Silent.name().ends_with("Silent"));
    }
}
