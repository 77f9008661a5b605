//! Config loading and component wiring tests for tool-gate-config.
// crates/tool-gate-config/tests/config_load.rs
// =============================================================================
// Module: Config Load and Wiring Tests
// Description: File loading limits and engine assembly from config.
// Purpose: Ensure config files load strictly and wire working components.
// =============================================================================

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde_json::Map;
use serde_json::Value;
use tempfile::TempDir;
use tool_gate_config::ConfigError;
use tool_gate_config::GateConfig;
use tool_gate_config::MAX_CONFIG_FILE_SIZE;
use tool_gate_core::AuditDecision;
use tool_gate_core::AuditFilter;
use tool_gate_core::InMemoryRuleStore;
use tool_gate_core::InvocationContext;
use tool_gate_core::PersistenceLevel;
use tool_gate_core::Quadrant;
use tool_gate_core::Rule;
use tool_gate_core::RuleId;
use tool_gate_core::TargetPrefixPredicate;
use tool_gate_core::ToolInput;
use tool_gate_core::VerificationRequirement;
use tool_gate_core::standard_validators;

mod common;

use common::TestResult;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn write_config(dir: &TempDir, contents: &[u8]) -> Result<std::path::PathBuf, String> {
    let path = dir.path().join("tool-gate.toml");
    fs::write(&path, contents).map_err(|err| err.to_string())?;
    Ok(path)
}

fn load(path: &Path) -> Result<GateConfig, String> {
    GateConfig::load(Some(path)).map_err(|err| err.to_string())
}

fn toml_string(path: &Path) -> String {
    toml::Value::String(path.display().to_string()).to_string()
}

fn never(_input: &ToolInput, _rule: &Rule) -> bool {
    false
}

fn path_input(path: &str) -> ToolInput {
    let mut input = Map::new();
    input.insert("file_path".to_string(), Value::String(path.to_string()));
    input
}

fn etc_boundary() -> Rule {
    Rule {
        id: RuleId::new("no-etc"),
        text: "never write under /etc".to_string(),
        quadrant: Quadrant::boundary(),
        persistence: PersistenceLevel::High,
        verification_required: VerificationRequirement::None,
        active: true,
        temporal_scope: None,
        tools: Vec::new(),
        targets: vec!["/etc/".to_string()],
    }
}

// ============================================================================
// SECTION: Loading
// ============================================================================

#[test]
fn load_reads_explicit_path() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let path = write_config(
        &dir,
        br#"
        [engine]
        service = "FileGate"

        [pressure.thresholds]
        elevated = 30.0
        high = 60.0
        critical = 80.0
        "#,
    )?;
    let config = load(&path)?;
    if config.engine.service != "FileGate" {
        return Err("engine.service not loaded".to_string());
    }
    if (config.pressure_config().thresholds.critical - 80.0).abs() > f64::EPSILON {
        return Err("pressure thresholds not loaded".to_string());
    }
    Ok(())
}

#[test]
fn missing_file_is_an_io_error() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    match GateConfig::load(Some(&dir.path().join("absent.toml"))) {
        Err(ConfigError::Io(_)) => Ok(()),
        Err(other) => Err(format!("unexpected error: {other}")),
        Ok(_) => Err("missing file should not load".to_string()),
    }
}

#[test]
fn oversized_file_is_rejected() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let mut contents = b"# padding\n".to_vec();
    contents.resize(MAX_CONFIG_FILE_SIZE + 1, b' ');
    let path = write_config(&dir, &contents)?;
    match GateConfig::load(Some(&path)) {
        Err(ConfigError::Invalid(message)) if message.contains("size limit") => Ok(()),
        Err(other) => Err(format!("unexpected error: {other}")),
        Ok(_) => Err("oversized file should not load".to_string()),
    }
}

#[test]
fn non_utf8_file_is_rejected() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let path = write_config(&dir, &[0xff, 0xfe, 0x00])?;
    match GateConfig::load(Some(&path)) {
        Err(ConfigError::Invalid(message)) if message.contains("utf-8") => Ok(()),
        Err(other) => Err(format!("unexpected error: {other}")),
        Ok(_) => Err("non-utf8 file should not load".to_string()),
    }
}

#[test]
fn malformed_toml_is_a_parse_error() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let path = write_config(&dir, b"[engine\nservice = ")?;
    match GateConfig::load(Some(&path)) {
        Err(ConfigError::Parse(_)) => Ok(()),
        Err(other) => Err(format!("unexpected error: {other}")),
        Ok(_) => Err("malformed file should not load".to_string()),
    }
}

#[test]
fn invalid_values_fail_at_load() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let path = write_config(&dir, b"[audit]\nmax_write_attempts = 0\n")?;
    common::assert_invalid(GateConfig::load(Some(&path)).map(|_| ()), "max_write_attempts")
}

// ============================================================================
// SECTION: Wiring
// ============================================================================

#[test]
fn build_engine_wires_sqlite_storage_and_file_log() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let db_path = dir.path().join("audit.db");
    let log_path = dir.path().join("gate.log");
    let contents = format!(
        "[engine]\nservice = \"WiredGate\"\n\n[storage]\ntype = \"sqlite\"\npath = {db}\n\n\
         [logging]\nsink = \"file\"\npath = {log}\n",
        db = toml_string(&db_path),
        log = toml_string(&log_path),
    );
    let path = write_config(&dir, contents.as_bytes())?;
    let config = load(&path)?;

    let rules = Arc::new(InMemoryRuleStore::with_rules(vec![etc_boundary()]));
    let validators =
        standard_validators(Arc::new(TargetPrefixPredicate::default()), Arc::new(never));
    let engine = config.build_engine(rules, validators).map_err(|err| err.to_string())?;

    let allowed =
        engine.evaluate("write_file", path_input("/tmp/notes.txt"), InvocationContext::default());
    let blocked =
        engine.evaluate("write_file", path_input("/etc/passwd"), InvocationContext::default());
    if !allowed.allowed || blocked.allowed {
        return Err("unexpected decisions".to_string());
    }
    if blocked.rule_violated.as_ref().map(RuleId::as_str) != Some("no-etc") {
        return Err("blocked decision should name the rule".to_string());
    }

    engine.audit().flush().map_err(|err| err.to_string())?;
    let entries =
        engine.audit().trail().query(&AuditFilter::all()).map_err(|err| err.to_string())?;
    let decisions: Vec<AuditDecision> = entries.iter().map(|entry| entry.decision).collect();
    if decisions != vec![AuditDecision::Allow, AuditDecision::Block] {
        return Err("audit trail should hold ALLOW then BLOCK".to_string());
    }
    if entries.iter().any(|entry| entry.service.as_str() != "WiredGate") {
        return Err("audit entries should carry the configured service".to_string());
    }
    engine.audit().shutdown();

    if !db_path.exists() {
        return Err("sqlite database should exist".to_string());
    }
    let log = fs::read_to_string(&log_path).map_err(|err| err.to_string())?;
    if !log.lines().any(|line| line.contains("decision_evaluated")) {
        return Err("file log should record evaluated decisions".to_string());
    }
    Ok(())
}

#[test]
fn storage_open_reports_startup_failures() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let blocker = dir.path().join("blocker");
    fs::write(&blocker, b"not a directory").map_err(|err| err.to_string())?;
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.storage = toml::from_str(&format!(
        "type = \"sqlite\"\npath = {}\n",
        toml_string(&blocker.join("audit.db"))
    ))
    .map_err(|err| err.to_string())?;
    match config.storage.open() {
        Err(ConfigError::Startup(_)) => Ok(()),
        Err(other) => Err(format!("unexpected error: {other}")),
        Ok(_) => Err("storage under a file should not open".to_string()),
    }
}
