// crates/tool-gate-core/src/runtime/dispatcher.rs
// ============================================================================
// Module: Tool Gate Audit Dispatcher
// Description: Bounded queue and background writer for audit entries.
// Purpose: Keep audit persistence off the decision path without losing entries.
// Dependencies: crate::core, crate::runtime::{audit, log}, tokio
// ============================================================================

//! ## Overview
//! [`AuditDispatcher::submit`] prepares the sanitized entry on the caller's
//! thread (so the audit id is known immediately) and hands it to a dedicated
//! worker thread. Submission never touches storage: the entry goes onto the
//! bounded queue with a non-blocking `try_send`, or, when the queue is full,
//! into a bounded overflow buffer that the worker drains after every queued
//! command. The worker persists each entry, retrying transient failures with
//! exponential backoff up to the configured attempt budget. Permanent
//! failures such as invalid records are not retried.
//!
//! An entry is counted as dropped only when both the queue and the overflow
//! buffer are full, or when it is submitted after shutdown. Storage inserts
//! are idempotent per audit id, so a retried write never duplicates an entry.
//!
//! Flush and shutdown block the calling thread and must not be called from
//! inside an async runtime.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::any::Any;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::RwLock;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::oneshot;

use crate::core::AuditDraft;
use crate::core::AuditEntry;
use crate::core::AuditId;
use crate::runtime::audit::AuditError;
use crate::runtime::audit::AuditTrail;
use crate::runtime::log::GateLog;
use crate::runtime::log::GateLogEvent;
use crate::runtime::log::GateLogLevel;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;
/// Default overflow buffer capacity.
pub const DEFAULT_OVERFLOW_CAPACITY: usize = 8192;
/// Default write attempts per entry.
pub const DEFAULT_MAX_WRITE_ATTEMPTS: u32 = 3;
/// Default initial retry backoff.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(50);
/// Cap on backoff doublings.
const MAX_BACKOFF_SHIFT: u32 = 10;
/// Worker thread name.
const WORKER_THREAD_NAME: &str = "tool-gate-audit";

// ============================================================================
// SECTION: Types
// ============================================================================

/// Dispatcher configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditDispatcherConfig {
    /// Maximum queued entries before the overflow buffer takes over.
    pub queue_capacity: usize,
    /// Maximum entries held in the overflow buffer.
    pub overflow_capacity: usize,
    /// Write attempts per entry on the worker.
    pub max_write_attempts: u32,
    /// Backoff before the first retry; doubles per retry.
    pub retry_backoff: Duration,
}

impl Default for AuditDispatcherConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            overflow_capacity: DEFAULT_OVERFLOW_CAPACITY,
            max_write_attempts: DEFAULT_MAX_WRITE_ATTEMPTS,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

/// Point-in-time dispatcher counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuditDispatcherStats {
    /// Entries accepted onto the queue.
    pub enqueued: u64,
    /// Entries parked in the overflow buffer because the queue was full.
    pub overflowed: u64,
    /// Entries persisted by the worker.
    pub written: u64,
    /// Entries whose write failed permanently or exhausted its attempts.
    pub failed: u64,
    /// Entries refused at submission.
    pub dropped: u64,
}

/// Shared atomic counters.
#[derive(Debug, Default)]
struct Counters {
    /// See [`AuditDispatcherStats::enqueued`].
    enqueued: AtomicU64,
    /// See [`AuditDispatcherStats::overflowed`].
    overflowed: AtomicU64,
    /// See [`AuditDispatcherStats::written`].
    written: AtomicU64,
    /// See [`AuditDispatcherStats::failed`].
    failed: AtomicU64,
    /// See [`AuditDispatcherStats::dropped`].
    dropped: AtomicU64,
}

/// Entries the queue could not accept, drained by the worker.
#[derive(Debug)]
struct Overflow {
    /// Parked entries in submission order.
    entries: Mutex<VecDeque<Box<AuditEntry>>>,
    /// Maximum parked entries.
    capacity: usize,
}

impl Overflow {
    /// Parks an entry; returns it back when the buffer is full.
    fn push(&self, entry: Box<AuditEntry>) -> Result<(), Box<AuditEntry>> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.len() >= self.capacity {
            return Err(entry);
        }
        entries.push_back(entry);
        Ok(())
    }

    /// Takes the oldest parked entry.
    fn pop(&self) -> Option<Box<AuditEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).pop_front()
    }
}

/// Work item for the dispatcher thread.
enum Command {
    /// Persist one prepared entry.
    Write(Box<AuditEntry>),
    /// Drain the overflow buffer.
    Wake,
    /// Acknowledge once every earlier command has been handled.
    Flush(oneshot::Sender<()>),
}

// ============================================================================
// SECTION: Dispatcher
// ============================================================================

/// Background audit writer.
///
/// # Invariants
/// - `submit` never waits on the queue or on storage.
/// - Every accepted entry is either persisted or counted as `failed`;
///   every refused entry is counted as `dropped`.
pub struct AuditDispatcher {
    /// Trail used to prepare entries.
    trail: Arc<AuditTrail>,
    /// Queue sender; `None` after shutdown.
    sender: RwLock<Option<mpsc::Sender<Command>>>,
    /// Overflow buffer shared with the worker.
    overflow: Arc<Overflow>,
    /// Worker handle; `None` after shutdown.
    worker: Mutex<Option<JoinHandle<()>>>,
    /// Shared counters.
    counters: Arc<Counters>,
    /// Operational log.
    log: Arc<dyn GateLog>,
}

impl AuditDispatcher {
    /// Starts the worker thread.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Dispatcher`] when the configuration is invalid or
    /// the worker thread cannot be spawned.
    pub fn spawn(
        trail: Arc<AuditTrail>,
        config: AuditDispatcherConfig,
        log: Arc<dyn GateLog>,
    ) -> Result<Self, AuditError> {
        if config.queue_capacity == 0 {
            return Err(AuditError::Dispatcher(
                "queue_capacity must be greater than zero".to_string(),
            ));
        }
        if config.max_write_attempts == 0 {
            return Err(AuditError::Dispatcher(
                "max_write_attempts must be greater than zero".to_string(),
            ));
        }
        let (sender, receiver) = mpsc::channel(config.queue_capacity);
        let counters = Arc::new(Counters::default());
        let overflow = Arc::new(Overflow {
            entries: Mutex::new(VecDeque::new()),
            capacity: config.overflow_capacity,
        });
        let worker = Worker {
            trail: Arc::clone(&trail),
            config,
            overflow: Arc::clone(&overflow),
            counters: Arc::clone(&counters),
            log: Arc::clone(&log),
        };
        let handle = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || worker.run(receiver))
            .map_err(|err| AuditError::Dispatcher(format!("failed to spawn worker: {err}")))?;
        Ok(Self {
            trail,
            sender: RwLock::new(Some(sender)),
            overflow,
            worker: Mutex::new(Some(handle)),
            counters,
            log,
        })
    }

    /// Returns the trail behind the dispatcher.
    #[must_use]
    pub const fn trail(&self) -> &Arc<AuditTrail> {
        &self.trail
    }

    /// Prepares and hands off an entry, returning its audit id.
    ///
    /// Returns `None` when the entry was dropped because the queue and the
    /// overflow buffer were both full or the dispatcher was shut down.
    pub fn submit(&self, draft: AuditDraft) -> Option<AuditId> {
        let entry = Box::new(self.trail.prepare(draft));
        let audit_id = entry.audit_id.clone();
        // The read guard is held until the entry is parked so that shutdown
        // cannot close the queue between the overflow push and the wake.
        let guard = self.sender.read().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = guard.as_ref() else {
            self.drop_entry(&audit_id, "audit dispatcher is shut down");
            return None;
        };
        let entry = match sender.try_send(Command::Write(entry)) {
            Ok(()) => {
                self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
                return Some(audit_id);
            }
            Err(TrySendError::Full(Command::Write(entry))) => entry,
            Err(TrySendError::Closed(_) | TrySendError::Full(_)) => {
                self.drop_entry(&audit_id, "audit worker stopped");
                return None;
            }
        };
        if self.overflow.push(entry).is_err() {
            self.drop_entry(&audit_id, "audit queue and overflow buffer are full");
            return None;
        }
        self.counters.overflowed.fetch_add(1, Ordering::Relaxed);
        // A full queue already guarantees a wake-up after the next command.
        let _ = sender.try_send(Command::Wake);
        self.log.emit(
            &GateLogEvent::new(
                "audit_queue_full",
                GateLogLevel::Warn,
                "audit queue full; entry parked in overflow buffer",
            )
            .with_field("audit_id", audit_id.as_str()),
        );
        Some(audit_id)
    }

    /// Waits until every entry submitted before this call has been handled.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Dispatcher`] when the worker has stopped.
    pub fn flush(&self) -> Result<(), AuditError> {
        let sender = {
            let guard = self.sender.read().unwrap_or_else(PoisonError::into_inner);
            guard.clone()
        };
        let Some(sender) = sender else {
            return Err(AuditError::Dispatcher("dispatcher is shut down".to_string()));
        };
        let (ack, done) = oneshot::channel();
        sender
            .blocking_send(Command::Flush(ack))
            .map_err(|_| AuditError::Dispatcher("worker stopped".to_string()))?;
        done.blocking_recv().map_err(|_| AuditError::Dispatcher("worker stopped".to_string()))
    }

    /// Returns the current counters.
    #[must_use]
    pub fn stats(&self) -> AuditDispatcherStats {
        AuditDispatcherStats {
            enqueued: self.counters.enqueued.load(Ordering::Relaxed),
            overflowed: self.counters.overflowed.load(Ordering::Relaxed),
            written: self.counters.written.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
        }
    }

    /// Closes the queue, drains pending and parked entries, and joins the
    /// worker.
    ///
    /// Later submissions are dropped. Calling this more than once is a no-op.
    pub fn shutdown(&self) {
        let sender = self.sender.write().unwrap_or_else(PoisonError::into_inner).take();
        drop(sender);
        let handle = self.worker.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = handle
            && let Err(payload) = handle.join()
        {
            self.log.emit(
                &GateLogEvent::new(
                    "audit_dispatcher_stopped",
                    GateLogLevel::Error,
                    "audit worker panicked",
                )
                .with_field("detail", panic_detail(payload.as_ref())),
            );
        }
    }

    /// Counts and logs an entry refused at submission.
    fn drop_entry(&self, audit_id: &AuditId, message: &str) {
        self.counters.dropped.fetch_add(1, Ordering::Relaxed);
        self.log.emit(
            &GateLogEvent::new("audit_entry_dropped", GateLogLevel::Error, message)
                .with_field("audit_id", audit_id.as_str()),
        );
    }
}

impl Drop for AuditDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ============================================================================
// SECTION: Worker
// ============================================================================

/// State owned by the worker thread.
struct Worker {
    /// Trail used to persist entries.
    trail: Arc<AuditTrail>,
    /// Retry policy.
    config: AuditDispatcherConfig,
    /// Overflow buffer shared with the dispatcher.
    overflow: Arc<Overflow>,
    /// Shared counters.
    counters: Arc<Counters>,
    /// Operational log.
    log: Arc<dyn GateLog>,
}

impl Worker {
    /// Drains the queue until every sender is gone, then empties the
    /// overflow buffer.
    fn run(self, mut receiver: mpsc::Receiver<Command>) {
        while let Some(command) = receiver.blocking_recv() {
            match command {
                Command::Write(entry) => {
                    self.write_with_retry(&entry);
                    self.drain_overflow();
                }
                Command::Wake => self.drain_overflow(),
                Command::Flush(ack) => {
                    self.drain_overflow();
                    let _ = ack.send(());
                }
            }
        }
        self.drain_overflow();
        self.log.emit(
            &GateLogEvent::new(
                "audit_dispatcher_stopped",
                GateLogLevel::Info,
                "audit queue drained; worker stopped",
            )
            .with_field("written", self.counters.written.load(Ordering::Relaxed))
            .with_field("failed", self.counters.failed.load(Ordering::Relaxed)),
        );
    }

    /// Persists every parked entry in submission order.
    fn drain_overflow(&self) {
        while let Some(entry) = self.overflow.pop() {
            self.write_with_retry(&entry);
        }
    }

    /// Persists one entry, backing off between attempts of transient failures.
    fn write_with_retry(&self, entry: &AuditEntry) {
        let mut attempt = 1;
        loop {
            let err = match self.trail.persist(entry) {
                Ok(()) => {
                    self.counters.written.fetch_add(1, Ordering::Relaxed);
                    return;
                }
                Err(err) => err,
            };
            if !err.is_transient() || attempt >= self.config.max_write_attempts {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                self.log.emit(
                    &GateLogEvent::new(
                        "audit_write_failed",
                        GateLogLevel::Error,
                        "audit write failed after final attempt",
                    )
                    .with_field("audit_id", entry.audit_id.as_str())
                    .with_field("attempts", attempt)
                    .with_field("transient", err.is_transient())
                    .with_field("error", err.to_string()),
                );
                return;
            }
            let backoff = self
                .config
                .retry_backoff
                .saturating_mul(1 << (attempt - 1).min(MAX_BACKOFF_SHIFT));
            let backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX);
            self.log.emit(
                &GateLogEvent::new("audit_write_retry", GateLogLevel::Warn, "retrying audit write")
                    .with_field("audit_id", entry.audit_id.as_str())
                    .with_field("attempt", attempt)
                    .with_field("backoff_ms", backoff_ms)
                    .with_field("error", err.to_string()),
            );
            thread::sleep(backoff);
            attempt += 1;
        }
    }
}

/// Renders a panic payload for logs and reasons.
pub(crate) fn panic_detail(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|detail| (*detail).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "panicked".to_string())
}
