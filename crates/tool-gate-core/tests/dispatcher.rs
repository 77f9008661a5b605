// crates/tool-gate-core/tests/dispatcher.rs
// ============================================================================
// Module: Audit Dispatcher Tests
// Description: Background writes, retries, overflow, and shutdown draining.
// Purpose: Ensure queued audit entries are delivered without blocking callers.
// ============================================================================

//! ## Overview
//! Exercises [`AuditDispatcher`] with flaky, failing, and gated storage
//! doubles.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::sync::Arc;
use std::sync::Condvar;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use tool_gate_core::AggregateRow;
use tool_gate_core::AuditAggregation;
use tool_gate_core::AuditDecision;
use tool_gate_core::AuditDispatcher;
use tool_gate_core::AuditDispatcherConfig;
use tool_gate_core::AuditDraft;
use tool_gate_core::AuditEntry;
use tool_gate_core::AuditError;
use tool_gate_core::AuditFilter;
use tool_gate_core::AuditStorage;
use tool_gate_core::AuditTrail;
use tool_gate_core::AuditTrailConfig;
use tool_gate_core::GateLog;
use tool_gate_core::GateLogEvent;
use tool_gate_core::InMemoryAuditStorage;
use tool_gate_core::NoopGateLog;
use tool_gate_core::StorageError;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

#[derive(Default)]
struct RecordingLog {
    events: Mutex<Vec<&'static str>>,
}

impl RecordingLog {
    fn count(&self, name: &str) -> usize {
        self.events.lock().unwrap().iter().filter(|event| **event == name).count()
    }
}

impl GateLog for RecordingLog {
    fn emit(&self, event: &GateLogEvent) {
        self.events.lock().unwrap().push(event.event);
    }
}

/// Fails the first `failures` inserts, then delegates.
struct FlakyStorage {
    inner: InMemoryAuditStorage,
    failures: usize,
    attempts: AtomicUsize,
}

impl AuditStorage for FlakyStorage {
    fn insert(&self, collection: &str, entry: &AuditEntry) -> Result<(), StorageError> {
        if self.attempts.fetch_add(1, Ordering::SeqCst) < self.failures {
            return Err(StorageError::Io("transient".to_string()));
        }
        self.inner.insert(collection, entry)
    }

    fn find(
        &self,
        collection: &str,
        filter: &AuditFilter,
    ) -> Result<Vec<AuditEntry>, StorageError> {
        self.inner.find(collection, filter)
    }

    fn aggregate(
        &self,
        collection: &str,
        pipeline: &AuditAggregation,
    ) -> Result<Vec<AggregateRow>, StorageError> {
        self.inner.aggregate(collection, pipeline)
    }
}

/// Blocks inserts issued by the dispatcher worker until opened.
#[derive(Default)]
struct GatedStorage {
    inner: InMemoryAuditStorage,
    open: Mutex<bool>,
    changed: Condvar,
}

impl GatedStorage {
    fn open(&self) {
        *self.open.lock().unwrap() = true;
        self.changed.notify_all();
    }
}

impl AuditStorage for GatedStorage {
    fn insert(&self, collection: &str, entry: &AuditEntry) -> Result<(), StorageError> {
        if thread::current().name() == Some("tool-gate-audit") {
            let mut open = self.open.lock().unwrap();
            while !*open {
                open = self.changed.wait(open).unwrap();
            }
        }
        self.inner.insert(collection, entry)
    }

    fn find(
        &self,
        collection: &str,
        filter: &AuditFilter,
    ) -> Result<Vec<AuditEntry>, StorageError> {
        self.inner.find(collection, filter)
    }

    fn aggregate(
        &self,
        collection: &str,
        pipeline: &AuditAggregation,
    ) -> Result<Vec<AggregateRow>, StorageError> {
        self.inner.aggregate(collection, pipeline)
    }
}

/// Rejects every insert as an invalid record.
#[derive(Default)]
struct RejectingStorage {
    inner: InMemoryAuditStorage,
    attempts: AtomicUsize,
}

impl AuditStorage for RejectingStorage {
    fn insert(&self, _collection: &str, _entry: &AuditEntry) -> Result<(), StorageError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(StorageError::Invalid("entry_json exceeds size limit".to_string()))
    }

    fn find(
        &self,
        collection: &str,
        filter: &AuditFilter,
    ) -> Result<Vec<AuditEntry>, StorageError> {
        self.inner.find(collection, filter)
    }

    fn aggregate(
        &self,
        collection: &str,
        pipeline: &AuditAggregation,
    ) -> Result<Vec<AggregateRow>, StorageError> {
        self.inner.aggregate(collection, pipeline)
    }
}

/// Sleeps before every insert.
struct SlowStorage {
    inner: InMemoryAuditStorage,
    delay: Duration,
}

impl AuditStorage for SlowStorage {
    fn insert(&self, collection: &str, entry: &AuditEntry) -> Result<(), StorageError> {
        thread::sleep(self.delay);
        self.inner.insert(collection, entry)
    }

    fn find(
        &self,
        collection: &str,
        filter: &AuditFilter,
    ) -> Result<Vec<AuditEntry>, StorageError> {
        self.inner.find(collection, filter)
    }

    fn aggregate(
        &self,
        collection: &str,
        pipeline: &AuditAggregation,
    ) -> Result<Vec<AggregateRow>, StorageError> {
        self.inner.aggregate(collection, pipeline)
    }
}

fn quick_retries(max_write_attempts: u32) -> AuditDispatcherConfig {
    AuditDispatcherConfig {
        max_write_attempts,
        retry_backoff: Duration::from_millis(1),
        ..AuditDispatcherConfig::default()
    }
}

fn draft(index: usize) -> AuditDraft {
    AuditDraft::new("svc", AuditDecision::Allow).with_reason(format!("call {index}"))
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn flush_waits_for_queued_entries() {
    let trail = Arc::new(AuditTrail::new(
        Arc::new(InMemoryAuditStorage::new()),
        AuditTrailConfig::default(),
    ));
    let dispatcher =
        AuditDispatcher::spawn(trail, AuditDispatcherConfig::default(), Arc::new(NoopGateLog))
            .unwrap();
    let ids: Vec<_> = (0 .. 20).map(|index| dispatcher.submit(draft(index)).unwrap()).collect();
    dispatcher.flush().unwrap();

    let entries = dispatcher.trail().query(&AuditFilter::all()).unwrap();
    let stored: Vec<_> = entries.iter().map(|entry| entry.audit_id.clone()).collect();
    assert_eq!(stored, ids);
    let stats = dispatcher.stats();
    assert_eq!(stats.enqueued, 20);
    assert_eq!(stats.written, 20);
    assert_eq!(stats.failed, 0);
}

#[test]
fn transient_failures_are_retried() {
    let storage = Arc::new(FlakyStorage {
        inner: InMemoryAuditStorage::new(),
        failures: 2,
        attempts: AtomicUsize::new(0),
    });
    let log = Arc::new(RecordingLog::default());
    let trail = Arc::new(AuditTrail::new(storage, AuditTrailConfig::default()));
    let dispatcher = AuditDispatcher::spawn(trail, quick_retries(3), log.clone()).unwrap();
    dispatcher.submit(draft(0)).unwrap();
    dispatcher.flush().unwrap();

    assert_eq!(dispatcher.trail().query(&AuditFilter::all()).unwrap().len(), 1);
    assert_eq!(dispatcher.stats().written, 1);
    assert_eq!(log.count("audit_write_retry"), 2);
    assert_eq!(log.count("audit_write_failed"), 0);
}

#[test]
fn exhausted_retries_are_counted_and_logged() {
    let storage = Arc::new(FlakyStorage {
        inner: InMemoryAuditStorage::new(),
        failures: usize::MAX,
        attempts: AtomicUsize::new(0),
    });
    let log = Arc::new(RecordingLog::default());
    let trail = Arc::new(AuditTrail::new(storage, AuditTrailConfig::default()));
    let dispatcher = AuditDispatcher::spawn(trail, quick_retries(2), log.clone()).unwrap();
    assert!(dispatcher.submit(draft(0)).is_some());
    dispatcher.flush().unwrap();

    let stats = dispatcher.stats();
    assert_eq!(stats.written, 0);
    assert_eq!(stats.failed, 1);
    assert_eq!(log.count("audit_write_retry"), 1);
    assert_eq!(log.count("audit_write_failed"), 1);
}

#[test]
fn permanent_failures_are_not_retried() {
    let storage = Arc::new(RejectingStorage::default());
    let log = Arc::new(RecordingLog::default());
    let trail = Arc::new(AuditTrail::new(storage.clone(), AuditTrailConfig::default()));
    let dispatcher = AuditDispatcher::spawn(trail, quick_retries(5), log.clone()).unwrap();
    assert!(dispatcher.submit(draft(0)).is_some());
    dispatcher.flush().unwrap();

    assert_eq!(storage.attempts.load(Ordering::SeqCst), 1);
    assert_eq!(dispatcher.stats().failed, 1);
    assert_eq!(log.count("audit_write_retry"), 0);
    assert_eq!(log.count("audit_write_failed"), 1);
}

#[test]
fn full_queue_parks_entries_for_the_worker() {
    let storage = Arc::new(GatedStorage::default());
    let log = Arc::new(RecordingLog::default());
    let trail = Arc::new(AuditTrail::new(storage.clone(), AuditTrailConfig::default()));
    let config = AuditDispatcherConfig {
        queue_capacity: 1,
        ..AuditDispatcherConfig::default()
    };
    let dispatcher = AuditDispatcher::spawn(trail, config, log.clone()).unwrap();
    let ids: Vec<_> = (0 .. 4).map(|index| dispatcher.submit(draft(index)).unwrap()).collect();
    assert!(dispatcher.trail().query(&AuditFilter::all()).unwrap().is_empty());
    storage.open();
    dispatcher.flush().unwrap();

    let stats = dispatcher.stats();
    assert!(stats.overflowed >= 1);
    assert_eq!(stats.enqueued + stats.overflowed, 4);
    assert_eq!(stats.written, 4);
    assert_eq!(stats.dropped, 0);
    let mut stored: Vec<_> = dispatcher
        .trail()
        .query(&AuditFilter::all())
        .unwrap()
        .into_iter()
        .map(|entry| entry.audit_id)
        .collect();
    stored.sort();
    assert_eq!(stored, ids);
    assert!(log.count("audit_queue_full") >= 1);
}

#[test]
fn submit_does_not_wait_for_slow_storage() {
    let delay = Duration::from_millis(300);
    let storage = Arc::new(SlowStorage {
        inner: InMemoryAuditStorage::new(),
        delay,
    });
    let trail = Arc::new(AuditTrail::new(storage, AuditTrailConfig::default()));
    let config = AuditDispatcherConfig {
        queue_capacity: 1,
        ..AuditDispatcherConfig::default()
    };
    let dispatcher = AuditDispatcher::spawn(trail, config, Arc::new(NoopGateLog)).unwrap();
    for index in 0 .. 4 {
        let started = Instant::now();
        assert!(dispatcher.submit(draft(index)).is_some());
        assert!(started.elapsed() < delay / 3, "submit {index} waited on storage");
    }
    dispatcher.flush().unwrap();
    assert_eq!(dispatcher.stats().written, 4);
}

#[test]
fn full_overflow_buffer_drops_and_logs() {
    let storage = Arc::new(GatedStorage::default());
    let log = Arc::new(RecordingLog::default());
    let trail = Arc::new(AuditTrail::new(storage.clone(), AuditTrailConfig::default()));
    let config = AuditDispatcherConfig {
        queue_capacity: 1,
        overflow_capacity: 1,
        ..AuditDispatcherConfig::default()
    };
    let dispatcher = AuditDispatcher::spawn(trail, config, log.clone()).unwrap();
    let accepted = (0 .. 6).filter(|index| dispatcher.submit(draft(*index)).is_some()).count();
    storage.open();
    dispatcher.flush().unwrap();

    let stats = dispatcher.stats();
    assert!(stats.dropped >= 1);
    assert_eq!(stats.enqueued + stats.overflowed + stats.dropped, 6);
    assert_eq!(u64::try_from(accepted).unwrap(), stats.written);
    assert_eq!(log.count("audit_entry_dropped"), usize::try_from(stats.dropped).unwrap());
}

#[test]
fn shutdown_drains_queue_and_refuses_later_submissions() {
    let log = Arc::new(RecordingLog::default());
    let trail = Arc::new(AuditTrail::new(
        Arc::new(InMemoryAuditStorage::new()),
        AuditTrailConfig::default(),
    ));
    let dispatcher =
        AuditDispatcher::spawn(trail, AuditDispatcherConfig::default(), log.clone()).unwrap();
    for index in 0 .. 5 {
        dispatcher.submit(draft(index)).unwrap();
    }
    dispatcher.shutdown();
    assert_eq!(dispatcher.trail().query(&AuditFilter::all()).unwrap().len(), 5);
    assert_eq!(log.count("audit_dispatcher_stopped"), 1);

    assert!(dispatcher.submit(draft(5)).is_none());
    assert_eq!(dispatcher.stats().dropped, 1);
    assert_eq!(log.count("audit_entry_dropped"), 1);
    assert_eq!(dispatcher.trail().query(&AuditFilter::all()).unwrap().len(), 5);
    assert!(matches!(dispatcher.flush(), Err(AuditError::Dispatcher(_))));
    dispatcher.shutdown();
}

#[test]
fn zero_capacity_is_rejected() {
    let trail = Arc::new(AuditTrail::new(
        Arc::new(InMemoryAuditStorage::new()),
        AuditTrailConfig::default(),
    ));
    let config = AuditDispatcherConfig {
        queue_capacity: 0,
        ..AuditDispatcherConfig::default()
    };
    let result = AuditDispatcher::spawn(trail, config, Arc::new(NoopGateLog));
    assert!(matches!(result, Err(AuditError::Dispatcher(_))));
}
