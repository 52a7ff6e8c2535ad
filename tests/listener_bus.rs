// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests for the listener bus lifecycle, ordering and isolation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use listener_bus::config::{BusConfig, OverflowPolicy};
use listener_bus::event::{
    EventKind, JobEnd, JobId, JobOutcome, JobStart, ListenerEvent, StageCompleted, StageId,
    StageInfo, StageSubmitted, TaskEnd, TaskEndReason, TaskGettingResult, TaskId, TaskInfo,
    TaskStart,
};
use listener_bus::listener::{EventLogListener, Listener, ListenerResult};
use listener_bus::{BusState, Error, ListenerBus, ListenerError, WeakListenerBus};
use parking_lot::Mutex;

const WAIT: Duration = Duration::from_secs(10);
const BLOCKING_JOB: JobId = JobId::new(u64::MAX);

// ============================================================================
// Test listeners
// ============================================================================

/// Counts every event it receives.
#[derive(Default)]
struct Counter(AtomicUsize);

impl Counter {
    fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl Listener for Counter {
    fn on_event(&self, _event: &ListenerEvent) -> ListenerResult {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Records the job id of every `JobStart`.
#[derive(Default)]
struct JobRecorder(Mutex<Vec<u64>>);

impl JobRecorder {
    fn jobs(&self) -> Vec<u64> {
        self.0.lock().clone()
    }
}

impl Listener for JobRecorder {
    fn on_job_start(&self, event: &JobStart) -> ListenerResult {
        self.0.lock().push(event.job_id.value());
        Ok(())
    }
}

/// Blocks inside the callback for [`BLOCKING_JOB`] until released.
struct Gate {
    entered: Mutex<mpsc::Sender<()>>,
    release: Mutex<mpsc::Receiver<()>>,
}

struct GateHandle {
    entered: mpsc::Receiver<()>,
    release: mpsc::Sender<()>,
}

impl GateHandle {
    fn wait_entered(&self) {
        self.entered.recv_timeout(WAIT).unwrap();
    }

    fn open(&self) {
        self.release.send(()).unwrap();
    }
}

fn gate() -> (Arc<Gate>, GateHandle) {
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let gate = Arc::new(Gate {
        entered: Mutex::new(entered_tx),
        release: Mutex::new(release_rx),
    });
    (
        gate,
        GateHandle {
            entered: entered_rx,
            release: release_tx,
        },
    )
}

impl Listener for Gate {
    fn on_job_start(&self, event: &JobStart) -> ListenerResult {
        if event.job_id == BLOCKING_JOB {
            let _ = self.entered.lock().send(());
            let _ = self.release.lock().recv();
        }
        Ok(())
    }
}

/// Fails on every event by returning an error.
struct Failing;

impl Listener for Failing {
    fn on_event(&self, event: &ListenerEvent) -> ListenerResult {
        Err(ListenerError::new(format!("cannot handle {}", event.kind())))
    }
}

/// Fails on every event by panicking.
struct Panicking;

impl Listener for Panicking {
    fn on_event(&self, _event: &ListenerEvent) -> ListenerResult {
        panic!("listener bug");
    }
}

fn job(id: u64) -> ListenerEvent {
    ListenerEvent::job_start(JobId::new(id), vec![])
}

fn blocking_job() -> ListenerEvent {
    ListenerEvent::job_start(BLOCKING_JOB, vec![])
}

// ============================================================================
// Delivery
// ============================================================================

mod delivery {
    use super::*;

    #[test]
    fn every_listener_sees_every_event_in_post_order() {
        let bus = ListenerBus::new();
        let recorders: Vec<_> = (0..3).map(|_| Arc::new(JobRecorder::default())).collect();
        for recorder in &recorders {
            bus.add_listener(recorder.clone()).unwrap();
        }
        bus.start().unwrap();

        for id in 0..500 {
            bus.post(job(id));
        }
        assert!(bus.wait_until_empty(WAIT));

        let expected: Vec<u64> = (0..500).collect();
        for recorder in &recorders {
            assert_eq!(recorder.jobs(), expected);
        }
        bus.stop().unwrap();
    }

    #[test]
    fn events_posted_before_start_are_buffered() {
        let bus = ListenerBus::new();
        let recorder = Arc::new(JobRecorder::default());
        bus.add_listener(recorder.clone()).unwrap();

        bus.post(job(1));
        bus.post(job(2));
        assert!(recorder.jobs().is_empty());
        assert!(!bus.wait_until_empty(Duration::from_millis(20)));

        bus.start().unwrap();
        assert!(bus.wait_until_empty(WAIT));
        assert_eq!(recorder.jobs(), [1, 2]);
        bus.stop().unwrap();
    }

    #[test]
    fn per_kind_methods_receive_matching_events() {
        #[derive(Default)]
        struct Kinds(Mutex<Vec<EventKind>>);

        impl Kinds {
            fn push(&self, kind: EventKind) -> ListenerResult {
                self.0.lock().push(kind);
                Ok(())
            }
        }

        impl Listener for Kinds {
            fn on_job_start(&self, _e: &JobStart) -> ListenerResult {
                self.push(EventKind::JobStart)
            }
            fn on_job_end(&self, _e: &JobEnd) -> ListenerResult {
                self.push(EventKind::JobEnd)
            }
            fn on_stage_submitted(&self, _e: &StageSubmitted) -> ListenerResult {
                self.push(EventKind::StageSubmitted)
            }
            fn on_stage_completed(&self, _e: &StageCompleted) -> ListenerResult {
                self.push(EventKind::StageCompleted)
            }
            fn on_task_start(&self, _e: &TaskStart) -> ListenerResult {
                self.push(EventKind::TaskStart)
            }
            fn on_task_getting_result(&self, _e: &TaskGettingResult) -> ListenerResult {
                self.push(EventKind::TaskGettingResult)
            }
            fn on_task_end(&self, _e: &TaskEnd) -> ListenerResult {
                self.push(EventKind::TaskEnd)
            }
        }

        let bus = ListenerBus::new();
        let kinds = Arc::new(Kinds::default());
        bus.add_listener(kinds.clone()).unwrap();
        bus.start().unwrap();

        let stage = StageInfo::new(StageId::new(0), 0, "reduce", 1);
        let task = TaskInfo::new(TaskId::new(0), 0, StageId::new(0), "exec-1", "node-a", Utc::now());
        let events = [
            ListenerEvent::job_start(JobId::new(0), vec![StageId::new(0)]),
            ListenerEvent::stage_submitted(stage.clone()),
            ListenerEvent::task_start(0, task.clone()),
            ListenerEvent::task_getting_result(task.clone()),
            ListenerEvent::task_end(0, TaskEndReason::Success, task, None),
            ListenerEvent::stage_completed(stage),
            ListenerEvent::job_end(JobId::new(0), JobOutcome::Succeeded),
            // not handled by this listener, silently ignored
            ListenerEvent::application_end(),
        ];
        let expected: Vec<_> = events.iter().take(7).map(ListenerEvent::kind).collect();
        for event in events {
            bus.post(event);
        }

        bus.stop().unwrap();
        assert_eq!(*kinds.0.lock(), expected);
    }

    #[test]
    fn concurrent_producers_keep_their_own_order() {
        const PRODUCERS: u64 = 8;
        const PER_PRODUCER: u64 = 1_000;

        let bus = ListenerBus::new();
        let recorder = Arc::new(JobRecorder::default());
        bus.add_listener(recorder.clone()).unwrap();
        bus.start().unwrap();

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|producer| {
                let bus = bus.clone();
                thread::spawn(move || {
                    for seq in 0..PER_PRODUCER {
                        bus.post(job(producer * PER_PRODUCER + seq));
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }
        bus.stop().unwrap();

        let jobs = recorder.jobs();
        assert_eq!(jobs.len() as u64, PRODUCERS * PER_PRODUCER);
        for producer in 0..PRODUCERS {
            let own: Vec<u64> = jobs
                .iter()
                .copied()
                .filter(|id| id / PER_PRODUCER == producer)
                .collect();
            let expected: Vec<u64> =
                (0..PER_PRODUCER).map(|seq| producer * PER_PRODUCER + seq).collect();
            assert_eq!(own, expected);
        }
    }

    #[test]
    fn listener_added_while_running_sees_later_events_only() {
        let bus = ListenerBus::new();
        let early = Arc::new(JobRecorder::default());
        bus.add_listener(early.clone()).unwrap();
        bus.start().unwrap();

        bus.post(job(1));
        assert!(bus.wait_until_empty(WAIT));

        let late = Arc::new(JobRecorder::default());
        bus.add_listener(late.clone()).unwrap();
        bus.post(job(2));
        bus.stop().unwrap();

        assert_eq!(early.jobs(), [1, 2]);
        assert_eq!(late.jobs(), [2]);
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

mod lifecycle {
    use super::*;

    #[test]
    fn double_start_is_illegal() {
        let bus = ListenerBus::new();
        bus.start().unwrap();

        let err = bus.start().unwrap_err();
        assert!(matches!(
            err,
            Error::IllegalLifecycleTransition {
                operation: "start",
                state: BusState::Running,
            }
        ));
        assert_eq!(bus.state(), BusState::Running);
        bus.stop().unwrap();
    }

    #[test]
    fn stop_before_start_is_illegal() {
        let bus = ListenerBus::new();
        let err = bus.stop().unwrap_err();
        assert!(matches!(
            err,
            Error::IllegalLifecycleTransition {
                operation: "stop",
                state: BusState::Init,
            }
        ));
        assert_eq!(bus.state(), BusState::Init);
    }

    #[test]
    fn second_stop_is_illegal() {
        let bus = ListenerBus::new();
        bus.start().unwrap();
        bus.stop().unwrap();

        let err = bus.stop().unwrap_err();
        assert!(err.is_illegal_transition());
        assert_eq!(err.to_string(), "cannot stop listener bus in state stopped");
    }

    #[test]
    fn start_after_stop_is_illegal() {
        let bus = ListenerBus::new();
        bus.start().unwrap();
        bus.stop().unwrap();
        assert!(bus.start().unwrap_err().is_illegal_transition());
    }

    #[test]
    fn stop_delivers_everything_posted_before_it() {
        let bus = ListenerBus::new();
        let counter = Arc::new(Counter::default());
        bus.add_listener(counter.clone()).unwrap();
        bus.start().unwrap();

        for id in 0..200 {
            bus.post(job(id));
        }
        bus.stop().unwrap();

        assert_eq!(counter.count(), 200);
        assert!(!bus.is_dispatcher_alive());
    }

    #[test]
    fn posts_after_stop_are_discarded() {
        let bus = ListenerBus::new();
        let counter = Arc::new(Counter::default());
        bus.add_listener(counter.clone()).unwrap();
        bus.start().unwrap();
        bus.post(job(1));
        bus.stop().unwrap();

        bus.post(job(2));
        bus.post(job(3));

        assert_eq!(counter.count(), 1);
        assert_eq!(bus.metrics().accepted, 1);
        assert!(bus.wait_until_empty(Duration::ZERO));
    }

    #[test]
    fn stop_waits_for_blocked_listener() {
        let bus = ListenerBus::new();
        let (listener, gate) = gate();
        bus.add_listener(listener).unwrap();
        bus.start().unwrap();

        bus.post(blocking_job());
        gate.wait_entered();

        let stopper = {
            let bus = bus.clone();
            thread::spawn(move || bus.stop())
        };
        thread::sleep(Duration::from_millis(100));
        assert!(!stopper.is_finished());
        assert_eq!(bus.state(), BusState::Running);

        gate.open();
        stopper.join().unwrap().unwrap();
        assert_eq!(bus.state(), BusState::Stopped);
    }

    #[test]
    fn wait_until_empty_times_out_on_stuck_listener() {
        let bus = ListenerBus::new();
        let (listener, gate) = gate();
        bus.add_listener(listener).unwrap();
        bus.start().unwrap();

        bus.post(blocking_job());
        gate.wait_entered();

        let started = Instant::now();
        assert!(!bus.wait_until_empty(Duration::from_millis(50)));
        assert!(started.elapsed() >= Duration::from_millis(50));

        gate.open();
        assert!(bus.wait_until_empty(WAIT));
        bus.stop().unwrap();
    }

    #[test]
    fn end_to_end_counter_scenario() {
        let bus = ListenerBus::new();
        let counter = Arc::new(Counter::default());
        bus.add_listener(counter.clone()).unwrap();

        for id in 0..5 {
            bus.post(job(id));
        }
        assert_eq!(counter.count(), 0);

        bus.start().unwrap();
        assert!(bus.wait_until_empty(WAIT));
        assert_eq!(counter.count(), 5);

        bus.stop().unwrap();
        for id in 5..10 {
            bus.post(job(id));
        }
        assert_eq!(counter.count(), 5);
    }

    #[test]
    fn dispatcher_thread_dies_with_stop_not_before() {
        let bus = ListenerBus::new();
        assert!(!bus.is_dispatcher_alive());
        bus.start().unwrap();
        assert!(bus.is_dispatcher_alive());
        bus.stop().unwrap();
        assert!(!bus.is_dispatcher_alive());
    }
}

// ============================================================================
// Fault isolation
// ============================================================================

mod isolation {
    use super::*;

    #[test]
    fn failing_listener_does_not_affect_others() {
        let bus = ListenerBus::new();
        let before = Arc::new(Counter::default());
        let after = Arc::new(Counter::default());
        bus.add_listener(before.clone()).unwrap();
        let failing = bus.add_listener(Arc::new(Failing)).unwrap();
        bus.add_listener(after.clone()).unwrap();
        bus.start().unwrap();

        for id in 0..10 {
            bus.post(job(id));
        }
        bus.stop().unwrap();

        assert_eq!(before.count(), 10);
        assert_eq!(after.count(), 10);
        assert_eq!(bus.metrics().listener_failures, 10);

        let failures = bus.listener_failures();
        let entry = failures.iter().find(|f| f.id == failing).unwrap();
        assert_eq!(entry.failures, 10);
        assert_eq!(failures.iter().map(|f| f.failures).sum::<u64>(), 10);
    }

    #[test]
    fn panicking_listener_is_isolated() {
        let bus = ListenerBus::new();
        let counter = Arc::new(Counter::default());
        bus.add_listener(Arc::new(Panicking)).unwrap();
        bus.add_listener(counter.clone()).unwrap();
        bus.start().unwrap();

        for id in 0..3 {
            bus.post(job(id));
        }
        assert!(bus.wait_until_empty(WAIT));
        assert!(bus.is_dispatcher_alive());

        bus.stop().unwrap();
        assert_eq!(counter.count(), 3);
        assert_eq!(bus.metrics().listener_failures, 3);
    }

    #[test]
    fn listener_calling_back_into_the_bus() {
        /// Tries every blocking operation from inside a callback.
        struct Reentrant {
            bus: ListenerBus,
            outcomes: Mutex<Vec<String>>,
            late: Arc<Counter>,
        }

        impl Listener for Reentrant {
            fn on_job_end(&self, _event: &JobEnd) -> ListenerResult {
                let mut outcomes = self.outcomes.lock();
                outcomes.push(match self.bus.stop() {
                    Ok(()) => "stopped".to_string(),
                    Err(e) => e.as_label().to_string(),
                });
                outcomes.push(match self.bus.start() {
                    Ok(()) => "started".to_string(),
                    Err(e) => e.as_label().to_string(),
                });
                outcomes.push(self.bus.wait_until_empty(WAIT).to_string());
                self.bus.add_listener(self.late.clone()).unwrap();
                self.bus.post(job(7));
                Ok(())
            }
        }

        let bus = ListenerBus::new();
        let late = Arc::new(Counter::default());
        let reentrant = Arc::new(Reentrant {
            bus: bus.clone(),
            outcomes: Mutex::new(Vec::new()),
            late: late.clone(),
        });
        bus.add_listener(reentrant.clone()).unwrap();
        bus.start().unwrap();

        bus.post(ListenerEvent::job_end(JobId::new(0), JobOutcome::Succeeded));
        assert!(bus.wait_until_empty(WAIT));
        // the event posted from the callback is accepted after the first drain
        assert!(bus.wait_until_empty(WAIT));
        bus.stop().unwrap();

        assert_eq!(
            *reentrant.outcomes.lock(),
            ["stop_from_dispatcher", "illegal_lifecycle_transition", "false"]
        );
        assert_eq!(late.count(), 1);
    }
}

// ============================================================================
// Bounded queue
// ============================================================================

mod bounded {
    use super::*;

    #[test]
    fn drop_newest_counts_dropped_events() {
        let bus = ListenerBus::with_config(
            BusConfig::new().with_bounded_queue(2, OverflowPolicy::DropNewest),
        );
        let (listener, gate) = gate();
        let recorder = Arc::new(JobRecorder::default());
        bus.add_listener(listener).unwrap();
        bus.add_listener(recorder.clone()).unwrap();
        bus.start().unwrap();

        bus.post(blocking_job());
        gate.wait_entered();

        bus.post(job(1));
        bus.post(job(2));
        bus.post(job(3));
        assert!(matches!(
            bus.try_post(job(4)),
            Err(Error::QueueOverflow { capacity: 2 })
        ));

        let metrics = bus.metrics();
        assert_eq!(metrics.dropped, 2);
        assert_eq!(metrics.pending, 2);

        gate.open();
        bus.stop().unwrap();
        assert_eq!(recorder.jobs(), [BLOCKING_JOB.value(), 1, 2]);
        assert_eq!(bus.metrics().processed, 3);
    }

    #[test]
    fn block_policy_makes_producer_wait() {
        let bus =
            ListenerBus::with_config(BusConfig::new().with_bounded_queue(1, OverflowPolicy::Block));
        let (listener, gate) = gate();
        let recorder = Arc::new(JobRecorder::default());
        bus.add_listener(listener).unwrap();
        bus.add_listener(recorder.clone()).unwrap();
        bus.start().unwrap();

        bus.post(blocking_job());
        gate.wait_entered();
        bus.post(job(1));

        let producer = {
            let bus = bus.clone();
            thread::spawn(move || bus.post(job(2)))
        };
        thread::sleep(Duration::from_millis(100));
        assert!(!producer.is_finished());

        gate.open();
        producer.join().unwrap();
        bus.stop().unwrap();

        assert_eq!(recorder.jobs(), [BLOCKING_JOB.value(), 1, 2]);
        assert_eq!(bus.metrics().dropped, 0);
    }

    /// Posts jobs `1..=count` from its `JobEnd` callback.
    struct Flooding {
        bus: WeakListenerBus,
        count: u64,
    }

    impl Listener for Flooding {
        fn on_job_end(&self, _event: &JobEnd) -> ListenerResult {
            if let Some(bus) = self.bus.upgrade() {
                for id in 1..=self.count {
                    bus.post(job(id));
                }
            }
            Ok(())
        }
    }

    fn flooded_bus(count: u64) -> (ListenerBus, Arc<JobRecorder>) {
        let bus =
            ListenerBus::with_config(BusConfig::new().with_bounded_queue(1, OverflowPolicy::Block));
        let recorder = Arc::new(JobRecorder::default());
        bus.add_listener(Arc::new(Flooding {
            bus: bus.downgrade(),
            count,
        }))
        .unwrap();
        bus.add_listener(recorder.clone()).unwrap();
        bus.start().unwrap();
        (bus, recorder)
    }

    #[test]
    fn block_policy_drops_posts_from_the_dispatcher() {
        let (bus, recorder) = flooded_bus(3);

        bus.post(ListenerEvent::job_end(JobId::new(0), JobOutcome::Succeeded));
        assert!(bus.wait_until_empty(WAIT));

        // The first repost fills the queue, the rest cannot wait for room.
        let metrics = bus.metrics();
        assert_eq!(metrics.accepted, 2);
        assert_eq!(metrics.dropped, 2);

        bus.stop().unwrap();
        assert_eq!(recorder.jobs(), [1]);
        assert_eq!(bus.metrics().processed, 2);
    }

    #[test]
    fn stop_returns_while_a_listener_floods_a_full_queue() {
        let (bus, recorder) = flooded_bus(50);

        bus.post(ListenerEvent::job_end(JobId::new(0), JobOutcome::Succeeded));
        let stopper = {
            let bus = bus.clone();
            thread::spawn(move || bus.stop())
        };

        let deadline = Instant::now() + WAIT;
        while !stopper.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(stopper.is_finished());
        stopper.join().unwrap().unwrap();

        assert_eq!(bus.state(), BusState::Stopped);
        assert!(!bus.is_dispatcher_alive());
        assert!(recorder.jobs().len() <= 1);
        let metrics = bus.metrics();
        assert_eq!(metrics.pending, 0);
        assert_eq!(metrics.processed, metrics.accepted);
    }
}

// ============================================================================
// Built-in listeners on a live bus
// ============================================================================

mod builtin {
    use super::*;

    #[test]
    fn event_log_records_the_dispatched_sequence() {
        let bus = ListenerBus::new();
        let log = Arc::new(EventLogListener::new(Vec::new()));
        bus.add_listener(log.clone()).unwrap();
        bus.start().unwrap();

        bus.post(job(0));
        bus.post(ListenerEvent::stage_submitted(StageInfo::new(
            StageId::new(0),
            0,
            "scan",
            8,
        )));
        bus.post(ListenerEvent::job_end(JobId::new(0), JobOutcome::Succeeded));
        bus.stop().unwrap();
        assert_eq!(log.events_written(), 3);

        // Dropping the last handle releases the registered listeners.
        drop(bus);
        let bytes = Arc::try_unwrap(log).unwrap().into_inner();
        let kinds: Vec<EventKind> = String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str::<ListenerEvent>(line).unwrap().kind())
            .collect();
        assert_eq!(
            kinds,
            [EventKind::JobStart, EventKind::StageSubmitted, EventKind::JobEnd]
        );
    }
}

// ============================================================================
// Async wrappers
// ============================================================================

mod async_api {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn wait_and_stop_from_tokio() {
        let bus = ListenerBus::new();
        let counter = Arc::new(Counter::default());
        bus.add_listener(counter.clone()).unwrap();
        bus.start().unwrap();

        for id in 0..20 {
            bus.post(job(id));
        }
        assert!(bus.wait_until_empty_async(WAIT).await.unwrap());
        assert_eq!(counter.count(), 20);

        bus.stop_async().await.unwrap();
        assert_eq!(bus.state(), BusState::Stopped);

        let err = bus.stop_async().await.unwrap_err();
        assert!(err.is_illegal_transition());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn async_wait_times_out_on_stuck_listener() {
        let bus = ListenerBus::new();
        let (listener, gate) = gate();
        bus.add_listener(listener).unwrap();
        bus.start().unwrap();

        bus.post(blocking_job());
        gate.wait_entered();
        assert!(
            !bus.wait_until_empty_async(Duration::from_millis(30))
                .await
                .unwrap()
        );

        gate.open();
        bus.stop_async().await.unwrap();
    }
}
