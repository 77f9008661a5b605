// crates/tool-gate-core/src/runtime/log.rs
// ============================================================================
// Module: Tool Gate Operational Log
// Description: Structured JSON-line events for pipeline diagnostics.
// Purpose: Emit operational events without hard logging dependencies.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! The gate log reports what the pipeline did (decisions, retrieval failures,
//! validator failures, audit write retries) as JSON lines. It is separate from
//! the audit trail: the audit trail is the durable record of decisions, while
//! the gate log is an operator-facing stream. Events never carry raw tool
//! input.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Severity of a gate log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateLogLevel {
    /// Routine event.
    Info,
    /// Degraded but handled condition.
    Warn,
    /// Failure that lost work or blocked a call.
    Error,
}

/// Gate log event payload.
#[derive(Debug, Clone, Serialize)]
pub struct GateLogEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Severity.
    pub level: GateLogLevel,
    /// Human-readable message.
    pub message: String,
    /// Structured fields.
    pub fields: Map<String, Value>,
}

impl GateLogEvent {
    /// Creates a new event with a consistent timestamp.
    #[must_use]
    pub fn new(event: &'static str, level: GateLogLevel, message: impl Into<String>) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        Self {
            event,
            timestamp_ms,
            level,
            message: message.into(),
            fields: Map::new(),
        }
    }

    /// Adds a structured field.
    #[must_use]
    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Sink for gate log events.
pub trait GateLog: Send + Sync {
    /// Emits one event. Sinks swallow their own I/O failures.
    fn emit(&self, event: &GateLogEvent);
}

/// Gate log that writes JSON lines to stderr.
pub struct StderrGateLog;

impl GateLog for StderrGateLog {
    fn emit(&self, event: &GateLogEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Gate log that appends JSON lines to a file.
pub struct FileGateLog {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileGateLog {
    /// Opens the log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl GateLog for FileGateLog {
    fn emit(&self, event: &GateLogEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// No-op gate log.
pub struct NoopGateLog;

impl GateLog for NoopGateLog {
    fn emit(&self, _event: &GateLogEvent) {}
}
