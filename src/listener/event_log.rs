// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! JSON-lines event log.
//!
//! [`EventLogListener`] writes each event as one JSON object per line to any
//! [`Write`] sink, for history servers and offline analysis tools. It is an
//! observer only: the bus never reads the log back.
//!
//! ## Example output
//! ```text
//! {"event":"job_start","job_id":0,"time":"2026-01-01T10:00:00Z","stage_ids":[0]}
//! {"event":"job_end","job_id":0,"time":"2026-01-01T10:00:02Z","outcome":{"result":"succeeded"}}
//! ```

use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::event::ListenerEvent;

use super::{Listener, ListenerResult};

/// Listener that appends every event to a JSON-lines sink.
///
/// Writes go through the sink as-is; wrap files in a
/// [`BufWriter`](std::io::BufWriter). The sink is flushed after `JobEnd`
/// and `ApplicationEnd`, so a completed job is always fully on disk.
///
/// # Examples
///
/// ```
/// use listener_bus::event::{JobId, JobOutcome, ListenerEvent};
/// use listener_bus::listener::{EventLogListener, Listener};
///
/// let log = EventLogListener::new(Vec::new());
/// log.on_event(&ListenerEvent::job_end(JobId::new(1), JobOutcome::Succeeded)).unwrap();
///
/// let bytes = log.into_inner();
/// assert!(String::from_utf8(bytes).unwrap().starts_with(r#"{"event":"job_end""#));
/// ```
pub struct EventLogListener<W> {
    sink: Mutex<W>,
    written: AtomicU64,
}

impl<W: Write + Send + 'static> EventLogListener<W> {
    /// Creates a listener writing to `sink`.
    #[must_use]
    pub fn new(sink: W) -> Self {
        Self {
            sink: Mutex::new(sink),
            written: AtomicU64::new(0),
        }
    }

    /// Number of events successfully written.
    #[must_use]
    pub fn events_written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    /// Flushes the sink.
    ///
    /// # Errors
    ///
    /// Returns the sink's I/O error.
    pub fn flush(&self) -> std::io::Result<()> {
        self.sink.lock().flush()
    }

    /// Consumes the listener and returns the sink.
    #[must_use]
    pub fn into_inner(self) -> W {
        self.sink.into_inner()
    }
}

impl<W: Write + Send + 'static> Listener for EventLogListener<W> {
    fn name(&self) -> &str {
        "EventLogListener"
    }

    fn on_event(&self, event: &ListenerEvent) -> ListenerResult {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');

        let mut sink = self.sink.lock();
        sink.write_all(&line)?;
        if matches!(
            event,
            ListenerEvent::JobEnd(_) | ListenerEvent::ApplicationEnd(_)
        ) {
            sink.flush()?;
        }
        self.written.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

impl<W> std::fmt::Debug for EventLogListener<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLogListener")
            .field("events_written", &self.written.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
