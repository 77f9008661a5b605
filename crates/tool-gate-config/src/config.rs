// crates/tool-gate-config/src/config.rs
// ============================================================================
// Module: Tool Gate Configuration
// Description: Configuration loading, validation, and wiring for Tool Gate.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: tool-gate-core, tool-gate-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Every section has defaults, so an empty file is a valid configuration.
//! Invalid values fail closed at load time rather than at first use.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tool_gate_core::AuditDispatcher;
use tool_gate_core::AuditDispatcherConfig;
use tool_gate_core::AuditStorage;
use tool_gate_core::AuditTrail;
use tool_gate_core::AuditTrailConfig;
use tool_gate_core::CheckpointPlan;
use tool_gate_core::DecisionEngine;
use tool_gate_core::EngineConfig;
use tool_gate_core::FileGateLog;
use tool_gate_core::GateLog;
use tool_gate_core::InMemoryAuditStorage;
use tool_gate_core::NoopGateLog;
use tool_gate_core::PressureConfig;
use tool_gate_core::PressureThresholds;
use tool_gate_core::PressureTracker;
use tool_gate_core::PressureWeights;
use tool_gate_core::RuleStore;
use tool_gate_core::ServiceName;
use tool_gate_core::StderrGateLog;
use tool_gate_core::Validator;
use tool_gate_core::runtime::DEFAULT_AUDIT_COLLECTION;
use tool_gate_core::runtime::DEFAULT_MAX_COLLECTION_ITEMS;
use tool_gate_core::runtime::DEFAULT_MAX_ENTRY_BYTES;
use tool_gate_core::runtime::DEFAULT_MAX_STRING_CHARS;
use tool_gate_core::runtime::TRUNCATION_MARKER;
use tool_gate_core::runtime::dispatcher::DEFAULT_MAX_WRITE_ATTEMPTS;
use tool_gate_core::runtime::dispatcher::DEFAULT_OVERFLOW_CAPACITY;
use tool_gate_core::runtime::dispatcher::DEFAULT_QUEUE_CAPACITY;
use tool_gate_core::runtime::dispatcher::DEFAULT_RETRY_BACKOFF;
use tool_gate_core::runtime::engine::DEFAULT_RULE_QUERY_TIMEOUT;
use tool_gate_core::runtime::engine::DEFAULT_SERVICE_NAME;
use tool_gate_store_sqlite::MAX_ENTRY_BYTES;
use tool_gate_store_sqlite::SqliteAuditStorage;
use tool_gate_store_sqlite::SqliteStoreConfig;
use tool_gate_store_sqlite::SqliteStoreMode;
use tool_gate_store_sqlite::SqliteSyncMode;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "tool-gate.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "TOOL_GATE_CONFIG";
/// Maximum configuration file size in bytes.
pub const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Upper bound for the audit queue capacity.
pub const MAX_QUEUE_CAPACITY: usize = 65_536;
/// Upper bound for write attempts per audit entry.
pub const MAX_WRITE_ATTEMPTS: u32 = 10;
/// Upper bound for the audit overflow buffer.
pub const MAX_OVERFLOW_CAPACITY: usize = 1_048_576;
/// Smallest accepted audit entry budget in bytes.
pub const MIN_ENTRY_BYTES: usize = 4 * 1024;
/// Default busy timeout for `SQLite` audit storage (ms).
const DEFAULT_STORE_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Default checkpoint intervals.
const DEFAULT_CHECKPOINT_INTERVALS: [f64; 3] = [0.25, 0.5, 0.75];

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Tool Gate configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GateConfig {
    /// Decision engine settings.
    #[serde(default)]
    pub engine: EngineSection,
    /// Pressure scoring settings.
    #[serde(default)]
    pub pressure: PressureSection,
    /// Audit trail and dispatcher settings.
    #[serde(default)]
    pub audit: AuditSection,
    /// Audit storage backend.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Operational log sink.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl GateConfig {
    /// Loads configuration from disk using the default resolution rules:
    /// explicit path, then [`CONFIG_ENV_VAR`], then `tool-gate.toml`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// Parses and validates configuration bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the payload is oversized, not UTF-8,
    /// unparsable, or invalid.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine.validate()?;
        self.pressure.validate()?;
        self.audit.validate()?;
        self.storage.validate()?;
        self.logging.validate()
    }

    /// Returns the decision engine configuration.
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        self.engine.to_engine_config()
    }

    /// Returns the pressure tracker configuration.
    #[must_use]
    pub const fn pressure_config(&self) -> PressureConfig {
        self.pressure.to_pressure_config()
    }

    /// Returns the checkpoint plan, if one is configured.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the checkpoint section is invalid.
    pub fn checkpoint_plan(&self) -> Result<Option<CheckpointPlan>, ConfigError> {
        self.pressure.checkpoint_plan()
    }

    /// Returns the audit trail configuration.
    #[must_use]
    pub fn audit_trail_config(&self) -> AuditTrailConfig {
        self.audit.to_trail_config()
    }

    /// Returns the audit dispatcher configuration.
    #[must_use]
    pub const fn dispatcher_config(&self) -> AuditDispatcherConfig {
        self.audit.to_dispatcher_config()
    }

    /// Opens storage and log sinks and assembles a decision engine around the
    /// caller's rule store and validators.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a sink cannot be opened or a component
    /// rejects its configuration.
    pub fn build_engine(
        &self,
        rules: Arc<dyn RuleStore>,
        validators: Vec<Box<dyn Validator>>,
    ) -> Result<DecisionEngine, ConfigError> {
        self.validate()?;
        let log = self.logging.open()?;
        let storage = self.storage.open()?;
        let trail = Arc::new(AuditTrail::new(storage, self.audit_trail_config()));
        let dispatcher =
            AuditDispatcher::spawn(trail, self.dispatcher_config(), Arc::clone(&log))
                .map_err(|err| ConfigError::Startup(err.to_string()))?;
        let tracker = PressureTracker::with_log(self.pressure_config(), Arc::clone(&log))
            .map_err(|err| ConfigError::Invalid(err.to_string()))?;
        Ok(DecisionEngine::new(
            self.engine_config(),
            rules,
            Arc::new(tracker),
            Arc::new(dispatcher),
            validators,
        )
        .with_log(log))
    }
}

// ============================================================================
// SECTION: Engine
// ============================================================================

/// Decision engine settings.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSection {
    /// Service name recorded on engine audit entries.
    #[serde(default = "default_service")]
    pub service: String,
    /// Rule query deadline in milliseconds; must be positive.
    #[serde(default = "default_rule_query_timeout_ms")]
    pub rule_query_timeout_ms: u64,
    /// Feed context token counters into the pressure tracker.
    #[serde(default = "default_true")]
    pub observe_context: bool,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            service: default_service(),
            rule_query_timeout_ms: default_rule_query_timeout_ms(),
            observe_context: true,
        }
    }
}

impl EngineSection {
    /// Validates engine settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.service.trim().is_empty() {
            return Err(ConfigError::Invalid("engine.service must be non-empty".to_string()));
        }
        if self.rule_query_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "engine.rule_query_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Converts to the core engine configuration.
    fn to_engine_config(&self) -> EngineConfig {
        EngineConfig {
            service: ServiceName::new(self.service.trim()),
            rule_query_timeout: Duration::from_millis(self.rule_query_timeout_ms),
            observe_context: self.observe_context,
        }
    }
}

// ============================================================================
// SECTION: Pressure
// ============================================================================

/// Pressure scoring settings.
#[derive(Debug, Clone, Deserialize)]
pub struct PressureSection {
    /// Weight of the token usage ratio.
    #[serde(default = "default_token_weight")]
    pub token_weight: f64,
    /// Weight of the message count component.
    #[serde(default = "default_message_weight")]
    pub message_weight: f64,
    /// Weight of the open task component.
    #[serde(default = "default_task_weight")]
    pub task_weight: f64,
    /// Message count at which the message component saturates.
    #[serde(default = "default_message_capacity")]
    pub message_capacity: u64,
    /// Open task count at which the task component saturates.
    #[serde(default = "default_task_capacity")]
    pub task_capacity: u64,
    /// Level thresholds.
    #[serde(default)]
    pub thresholds: ThresholdsSection,
    /// Optional token checkpoint plan.
    #[serde(default)]
    pub checkpoints: Option<CheckpointSection>,
}

impl Default for PressureSection {
    fn default() -> Self {
        Self {
            token_weight: default_token_weight(),
            message_weight: default_message_weight(),
            task_weight: default_task_weight(),
            message_capacity: default_message_capacity(),
            task_capacity: default_task_capacity(),
            thresholds: ThresholdsSection::default(),
            checkpoints: None,
        }
    }
}

impl PressureSection {
    /// Validates weights, thresholds, and checkpoints.
    fn validate(&self) -> Result<(), ConfigError> {
        self.to_pressure_config()
            .validate()
            .map_err(|err| ConfigError::Invalid(err.to_string()))?;
        self.checkpoint_plan()?;
        Ok(())
    }

    /// Converts to the core pressure configuration.
    const fn to_pressure_config(&self) -> PressureConfig {
        PressureConfig {
            weights: PressureWeights {
                token_weight: self.token_weight,
                message_weight: self.message_weight,
                task_weight: self.task_weight,
                message_capacity: self.message_capacity,
                task_capacity: self.task_capacity,
            },
            thresholds: PressureThresholds {
                elevated: self.thresholds.elevated,
                high: self.thresholds.high,
                critical: self.thresholds.critical,
            },
        }
    }

    /// Builds the checkpoint plan when configured.
    fn checkpoint_plan(&self) -> Result<Option<CheckpointPlan>, ConfigError> {
        self.checkpoints
            .as_ref()
            .map(|section| {
                CheckpointPlan::from_budget(section.token_budget, &section.intervals)
                    .map_err(|err| ConfigError::Invalid(err.to_string()))
            })
            .transpose()
    }
}

/// Pressure level thresholds.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ThresholdsSection {
    /// Lower bound of `ELEVATED`.
    #[serde(default = "default_elevated")]
    pub elevated: f64,
    /// Lower bound of `HIGH`.
    #[serde(default = "default_high")]
    pub high: f64,
    /// Lower bound of `CRITICAL`.
    #[serde(default = "default_critical")]
    pub critical: f64,
}

impl Default for ThresholdsSection {
    fn default() -> Self {
        Self {
            elevated: default_elevated(),
            high: default_high(),
            critical: default_critical(),
        }
    }
}

/// Token checkpoint settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckpointSection {
    /// Session token budget.
    pub token_budget: u64,
    /// Fractions of the budget at which checkpoints fall.
    #[serde(default = "default_checkpoint_intervals")]
    pub intervals: Vec<f64>,
}

// ============================================================================
// SECTION: Audit
// ============================================================================

/// Audit trail and dispatcher settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AuditSection {
    /// Storage collection receiving entries.
    #[serde(default = "default_collection")]
    pub collection: String,
    /// Dispatcher queue capacity.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Entries parked for the worker when the queue is full.
    #[serde(default = "default_overflow_capacity")]
    pub overflow_capacity: usize,
    /// Write attempts per queued entry.
    #[serde(default = "default_max_write_attempts")]
    pub max_write_attempts: u32,
    /// Initial retry backoff in milliseconds.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// Keys removed from audited context in addition to the built-in set.
    #[serde(default)]
    pub sensitive_keys: Vec<String>,
    /// Maximum characters of any audited string, marker included.
    #[serde(default = "default_max_string_chars")]
    pub max_string_chars: usize,
    /// Items kept from any audited array or object.
    #[serde(default = "default_max_collection_items")]
    pub max_collection_items: usize,
    /// Serialized entry budget in bytes before the context is summarized.
    #[serde(default = "default_max_entry_bytes")]
    pub max_entry_bytes: usize,
}

impl Default for AuditSection {
    fn default() -> Self {
        Self {
            collection: default_collection(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            overflow_capacity: DEFAULT_OVERFLOW_CAPACITY,
            max_write_attempts: DEFAULT_MAX_WRITE_ATTEMPTS,
            retry_backoff_ms: default_retry_backoff_ms(),
            sensitive_keys: Vec::new(),
            max_string_chars: DEFAULT_MAX_STRING_CHARS,
            max_collection_items: DEFAULT_MAX_COLLECTION_ITEMS,
            max_entry_bytes: DEFAULT_MAX_ENTRY_BYTES,
        }
    }
}

impl AuditSection {
    /// Validates audit settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.collection.trim().is_empty() {
            return Err(ConfigError::Invalid("audit.collection must be non-empty".to_string()));
        }
        if !(1 ..= MAX_QUEUE_CAPACITY).contains(&self.queue_capacity) {
            return Err(ConfigError::Invalid(format!(
                "audit.queue_capacity must be between 1 and {MAX_QUEUE_CAPACITY}"
            )));
        }
        if self.overflow_capacity > MAX_OVERFLOW_CAPACITY {
            return Err(ConfigError::Invalid(format!(
                "audit.overflow_capacity must be at most {MAX_OVERFLOW_CAPACITY}"
            )));
        }
        if !(1 ..= MAX_WRITE_ATTEMPTS).contains(&self.max_write_attempts) {
            return Err(ConfigError::Invalid(format!(
                "audit.max_write_attempts must be between 1 and {MAX_WRITE_ATTEMPTS}"
            )));
        }
        let min_chars = TRUNCATION_MARKER.chars().count() + 1;
        if self.max_string_chars < min_chars {
            return Err(ConfigError::Invalid(format!(
                "audit.max_string_chars must be at least {min_chars}"
            )));
        }
        if self.max_collection_items == 0 {
            return Err(ConfigError::Invalid(
                "audit.max_collection_items must be greater than zero".to_string(),
            ));
        }
        if !(MIN_ENTRY_BYTES ..= MAX_ENTRY_BYTES).contains(&self.max_entry_bytes) {
            return Err(ConfigError::Invalid(format!(
                "audit.max_entry_bytes must be between {MIN_ENTRY_BYTES} and {MAX_ENTRY_BYTES}"
            )));
        }
        if self.sensitive_keys.iter().any(|key| key.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "audit.sensitive_keys entries must be non-empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Converts to the core trail configuration.
    fn to_trail_config(&self) -> AuditTrailConfig {
        AuditTrailConfig {
            collection: self.collection.trim().to_string(),
            sensitive_keys: self.sensitive_keys.clone(),
            max_string_chars: self.max_string_chars,
            max_collection_items: self.max_collection_items,
            max_entry_bytes: self.max_entry_bytes,
        }
    }

    /// Converts to the core dispatcher configuration.
    const fn to_dispatcher_config(&self) -> AuditDispatcherConfig {
        AuditDispatcherConfig {
            queue_capacity: self.queue_capacity,
            overflow_capacity: self.overflow_capacity,
            max_write_attempts: self.max_write_attempts,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }
}

// ============================================================================
// SECTION: Storage
// ============================================================================

/// Audit storage backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuditStorageType {
    /// Use the in-memory storage.
    #[default]
    Memory,
    /// Use `SQLite`-backed durable storage.
    Sqlite,
}

/// Audit storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Storage backend type.
    #[serde(rename = "type", default)]
    pub storage_type: AuditStorageType,
    /// `SQLite` database path when using the sqlite backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_store_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_type: AuditStorageType::default(),
            path: None,
            busy_timeout_ms: default_store_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

impl StorageConfig {
    /// Validates storage configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match self.storage_type {
            AuditStorageType::Memory => {
                if self.path.is_some() {
                    return Err(ConfigError::Invalid(
                        "memory storage must not set path".to_string(),
                    ));
                }
                Ok(())
            }
            AuditStorageType::Sqlite => {
                let config = self.sqlite_config().ok_or_else(|| {
                    ConfigError::Invalid("sqlite storage requires path".to_string())
                })?;
                config.validate().map_err(|err| ConfigError::Invalid(err.to_string()))
            }
        }
    }

    /// Returns the `SQLite` store configuration when a path is set.
    #[must_use]
    pub fn sqlite_config(&self) -> Option<SqliteStoreConfig> {
        self.path.as_ref().map(|path| SqliteStoreConfig {
            path: path.clone(),
            busy_timeout_ms: self.busy_timeout_ms,
            journal_mode: self.journal_mode,
            sync_mode: self.sync_mode,
        })
    }

    /// Opens the configured audit storage.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the configuration is invalid or the
    /// database cannot be opened.
    pub fn open(&self) -> Result<Arc<dyn AuditStorage>, ConfigError> {
        self.validate()?;
        match self.storage_type {
            AuditStorageType::Memory => Ok(Arc::new(InMemoryAuditStorage::new())),
            AuditStorageType::Sqlite => {
                let config = self.sqlite_config().ok_or_else(|| {
                    ConfigError::Invalid("sqlite storage requires path".to_string())
                })?;
                let storage = SqliteAuditStorage::open(config)
                    .map_err(|err| ConfigError::Startup(err.to_string()))?;
                Ok(Arc::new(storage))
            }
        }
    }
}

// ============================================================================
// SECTION: Logging
// ============================================================================

/// Operational log sink type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogSink {
    /// JSON lines on stderr.
    #[default]
    Stderr,
    /// JSON lines appended to a file.
    File,
    /// Discard all events.
    None,
}

/// Operational log configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// Sink type.
    #[serde(default)]
    pub sink: LogSink,
    /// Log file path for the file sink.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl LoggingConfig {
    /// Validates logging configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.sink, &self.path) {
            (LogSink::File, None) => {
                Err(ConfigError::Invalid("logging.sink=file requires path".to_string()))
            }
            (LogSink::File, Some(path)) => validate_path(path),
            (LogSink::Stderr | LogSink::None, Some(_)) => Err(ConfigError::Invalid(
                "logging.path is only valid with logging.sink=file".to_string(),
            )),
            (LogSink::Stderr | LogSink::None, None) => Ok(()),
        }
    }

    /// Opens the configured log sink.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the configuration is invalid or the log
    /// file cannot be opened.
    pub fn open(&self) -> Result<Arc<dyn GateLog>, ConfigError> {
        self.validate()?;
        match (self.sink, &self.path) {
            (LogSink::File, Some(path)) => {
                let log = FileGateLog::new(path).map_err(|err| ConfigError::Io(err.to_string()))?;
                Ok(Arc::new(log))
            }
            (LogSink::None, _) => Ok(Arc::new(NoopGateLog)),
            (LogSink::Stderr | LogSink::File, _) => Ok(Arc::new(StderrGateLog)),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration or opening a sink.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
    /// A configured component failed to start.
    #[error("config startup error: {0}")]
    Startup(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from the caller or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates a path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.trim().is_empty() {
        return Err(ConfigError::Invalid("path must be non-empty".to_string()));
    }
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("path component too long".to_string()));
        }
    }
    Ok(())
}

/// Default engine service name.
fn default_service() -> String {
    DEFAULT_SERVICE_NAME.to_string()
}

/// Default rule query deadline in milliseconds.
fn default_rule_query_timeout_ms() -> u64 {
    u64::try_from(DEFAULT_RULE_QUERY_TIMEOUT.as_millis()).unwrap_or(u64::MAX)
}

/// Serde helper for `true` defaults.
const fn default_true() -> bool {
    true
}

/// Default token weight.
fn default_token_weight() -> f64 {
    PressureWeights::default().token_weight
}

/// Default message weight.
fn default_message_weight() -> f64 {
    PressureWeights::default().message_weight
}

/// Default task weight.
fn default_task_weight() -> f64 {
    PressureWeights::default().task_weight
}

/// Default message capacity.
fn default_message_capacity() -> u64 {
    PressureWeights::default().message_capacity
}

/// Default task capacity.
fn default_task_capacity() -> u64 {
    PressureWeights::default().task_capacity
}

/// Default elevated threshold.
fn default_elevated() -> f64 {
    PressureThresholds::default().elevated
}

/// Default high threshold.
fn default_high() -> f64 {
    PressureThresholds::default().high
}

/// Default critical threshold.
fn default_critical() -> f64 {
    PressureThresholds::default().critical
}

/// Default checkpoint intervals.
fn default_checkpoint_intervals() -> Vec<f64> {
    DEFAULT_CHECKPOINT_INTERVALS.to_vec()
}

/// Default audit collection.
fn default_collection() -> String {
    DEFAULT_AUDIT_COLLECTION.to_string()
}

/// Default queue capacity.
const fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

/// Default overflow buffer capacity.
const fn default_overflow_capacity() -> usize {
    DEFAULT_OVERFLOW_CAPACITY
}

/// Default write attempts.
const fn default_max_write_attempts() -> u32 {
    DEFAULT_MAX_WRITE_ATTEMPTS
}

/// Default retry backoff in milliseconds.
fn default_retry_backoff_ms() -> u64 {
    u64::try_from(DEFAULT_RETRY_BACKOFF.as_millis()).unwrap_or(u64::MAX)
}

/// Default maximum audited string length.
const fn default_max_string_chars() -> usize {
    DEFAULT_MAX_STRING_CHARS
}

/// Default items kept per audited collection.
const fn default_max_collection_items() -> usize {
    DEFAULT_MAX_COLLECTION_ITEMS
}

/// Default serialized audit entry budget.
const fn default_max_entry_bytes() -> usize {
    DEFAULT_MAX_ENTRY_BYTES
}

/// Default `SQLite` busy timeout.
const fn default_store_busy_timeout_ms() -> u64 {
    DEFAULT_STORE_BUSY_TIMEOUT_MS
}
