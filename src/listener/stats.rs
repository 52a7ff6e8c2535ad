// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-stage task metric summaries.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use parking_lot::Mutex;

use crate::event::{StageCompleted, StageId, TaskEnd, TaskMetrics};

use super::{Listener, ListenerResult};

/// Default number of stage summaries kept by [`StatsListener`].
pub const DEFAULT_RETAINED_STAGES: usize = 100;

/// Min / median / max of a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Distribution {
    /// Smallest value.
    pub min: Duration,
    /// Median (upper median for even sample sizes).
    pub median: Duration,
    /// Largest value.
    pub max: Duration,
}

impl Distribution {
    /// Computes the distribution of `values`, or `None` when empty.
    #[must_use]
    pub fn of(values: &mut [Duration]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        values.sort_unstable();
        Some(Self {
            min: values[0],
            median: values[values.len() / 2],
            max: values[values.len() - 1],
        })
    }
}

/// Summary of the tasks that ran in one completed stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSummary {
    /// The stage.
    pub stage_id: StageId,
    /// Stage attempt.
    pub attempt: u32,
    /// Tasks that reported metrics.
    pub tasks: usize,
    /// Executor run time across tasks; `None` when no task reported metrics.
    pub run_time: Option<Distribution>,
    /// Sum of task result sizes, in bytes.
    pub total_result_size: u64,
    /// Sum of input bytes read.
    pub total_bytes_read: u64,
    /// Sum of output bytes written.
    pub total_bytes_written: u64,
    /// `true` when the stage completed with a failure reason.
    pub failed: bool,
}

type StageKey = (StageId, u32);

#[derive(Default)]
struct StatsState {
    pending: HashMap<StageKey, Vec<TaskMetrics>>,
    /// Keys of `pending`, oldest first.
    pending_order: VecDeque<StageKey>,
    summaries: VecDeque<StageSummary>,
}

impl StatsState {
    fn is_summarized(&self, key: StageKey) -> bool {
        self.summaries.iter().any(|s| (s.stage_id, s.attempt) == key)
    }

    fn discard_pending(&mut self, discard: impl Fn(&StageKey) -> bool) {
        self.pending.retain(|key, _| !discard(key));
        self.pending_order.retain(|key| !discard(key));
    }
}

/// Metrics-reporting listener.
///
/// Collects [`TaskMetrics`] from every `TaskEnd`, and when the owning stage
/// completes folds them into a [`StageSummary`] that is logged at `INFO` and
/// kept in a bounded history.
///
/// Metrics waiting for their stage are bounded too: at most `retained` stage
/// attempts are tracked, and the oldest is discarded when a new one arrives.
/// Metrics for an attempt that was already summarized are ignored.
pub struct StatsListener {
    retained: usize,
    state: Mutex<StatsState>,
}

impl StatsListener {
    /// Creates a listener keeping the last [`DEFAULT_RETAINED_STAGES`] summaries.
    #[must_use]
    pub fn new() -> Self {
        Self::with_retained_stages(DEFAULT_RETAINED_STAGES)
    }

    /// Creates a listener keeping the last `retained` summaries (at least 1),
    /// and collecting metrics for at most `retained` incomplete stage attempts.
    #[must_use]
    pub fn with_retained_stages(retained: usize) -> Self {
        Self {
            retained: retained.max(1),
            state: Mutex::new(StatsState::default()),
        }
    }

    /// Summaries of completed stages, oldest first.
    #[must_use]
    pub fn summaries(&self) -> Vec<StageSummary> {
        self.state.lock().summaries.iter().cloned().collect()
    }

    /// Most recent summary for `stage_id`, if that stage completed.
    #[must_use]
    pub fn summary(&self, stage_id: StageId) -> Option<StageSummary> {
        self.state
            .lock()
            .summaries
            .iter()
            .rev()
            .find(|s| s.stage_id == stage_id)
            .cloned()
    }

    fn summarize(
        stage_id: StageId,
        attempt: u32,
        metrics: &[TaskMetrics],
        failed: bool,
    ) -> StageSummary {
        let mut run_times: Vec<Duration> = metrics.iter().map(|m| m.executor_run_time).collect();
        StageSummary {
            stage_id,
            attempt,
            tasks: metrics.len(),
            run_time: Distribution::of(&mut run_times),
            total_result_size: metrics.iter().map(|m| m.result_size).sum(),
            total_bytes_read: metrics.iter().map(|m| m.bytes_read).sum(),
            total_bytes_written: metrics.iter().map(|m| m.bytes_written).sum(),
            failed,
        }
    }
}

impl Default for StatsListener {
    fn default() -> Self {
        Self::new()
    }
}

impl Listener for StatsListener {
    fn name(&self) -> &str {
        "StatsListener"
    }

    fn on_task_end(&self, event: &TaskEnd) -> ListenerResult {
        let Some(metrics) = &event.task_metrics else {
            return Ok(());
        };
        let key = (event.task_info.stage_id, event.stage_attempt);
        let mut state = self.state.lock();
        if state.is_summarized(key) {
            tracing::debug!(
                stage = %key.0,
                attempt = key.1,
                "Ignoring task metrics for a completed stage"
            );
            return Ok(());
        }

        if !state.pending.contains_key(&key) {
            if state.pending_order.len() == self.retained
                && let Some(oldest) = state.pending_order.pop_front()
            {
                state.pending.remove(&oldest);
                tracing::debug!(
                    stage = %oldest.0,
                    attempt = oldest.1,
                    "Discarding metrics of a stage that never completed"
                );
            }
            state.pending_order.push_back(key);
        }
        state.pending.entry(key).or_default().push(metrics.clone());
        Ok(())
    }

    fn on_stage_completed(&self, event: &StageCompleted) -> ListenerResult {
        let info = &event.stage_info;
        let mut state = self.state.lock();
        let key = (info.stage_id, info.attempt);
        let metrics = state.pending.remove(&key).unwrap_or_default();
        // Earlier attempts of this stage will never complete.
        state.discard_pending(|k| k.0 == info.stage_id && k.1 <= info.attempt);
        let summary = Self::summarize(info.stage_id, info.attempt, &metrics, info.is_failed());

        tracing::info!(
            stage = %summary.stage_id,
            attempt = summary.attempt,
            tasks = summary.tasks,
            run_time = ?summary.run_time,
            result_bytes = summary.total_result_size,
            read_bytes = summary.total_bytes_read,
            written_bytes = summary.total_bytes_written,
            failed = summary.failed,
            "Stage task summary"
        );

        if state.summaries.len() == self.retained {
            state.summaries.pop_front();
        }
        state.summaries.push_back(summary);
        Ok(())
    }
}

impl std::fmt::Debug for StatsListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("StatsListener")
            .field("retained", &self.retained)
            .field("pending_stages", &state.pending.len())
            .field("summaries", &state.summaries.len())
            .finish()
    }
}
