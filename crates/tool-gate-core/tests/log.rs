// crates/tool-gate-core/tests/log.rs
// ============================================================================
// Module: Gate Log Tests
// Description: JSON-line output of the file gate log.
// ============================================================================
//! ## Overview
//! Ensures file log events are appended as parseable JSON lines.

#![allow(clippy::unwrap_used, reason = "Tests use unwrap on deterministic fixtures.")]

use serde_json::Value;
use tempfile::TempDir;
use tool_gate_core::FileGateLog;
use tool_gate_core::GateLog;
use tool_gate_core::GateLogEvent;
use tool_gate_core::GateLogLevel;

#[test]
fn file_log_appends_json_lines() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("gate.log");
    let log = FileGateLog::new(&path).unwrap();
    log.emit(
        &GateLogEvent::new("rule_retrieval_failed", GateLogLevel::Error, "store down")
            .with_field("tool", "write_file"),
    );
    log.emit(&GateLogEvent::new("decision_evaluated", GateLogLevel::Info, "tool call ALLOW"));
    drop(log);

    let reopened = FileGateLog::new(&path).unwrap();
    reopened.emit(&GateLogEvent::new("audit_queue_full", GateLogLevel::Warn, "inline"));

    let contents = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<Value> =
        contents.lines().map(|line| serde_json::from_str(line).unwrap()).collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0]["event"], "rule_retrieval_failed");
    assert_eq!(lines[0]["level"], "error");
    assert_eq!(lines[0]["fields"]["tool"], "write_file");
    assert_eq!(lines[2]["level"], "warn");
}
