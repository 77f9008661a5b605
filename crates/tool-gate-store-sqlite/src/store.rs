// crates/tool-gate-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Audit Storage
// Description: Durable AuditStorage backed by SQLite WAL.
// Purpose: Append audit entries and answer filtered and grouped queries.
// Dependencies: tool-gate-core, rusqlite, serde, serde_json, thiserror, time
// ============================================================================

//! ## Overview
//! This module implements a durable [`AuditStorage`] using `SQLite`. Every
//! insert runs in its own transaction and is idempotent per
//! `(collection, audit_id)`. Queries filter on indexed columns and decode the
//! stored JSON payload, failing closed when the payload disagrees with the
//! indexed values.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Duration;

use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use rusqlite::params_from_iter;
use rusqlite::types::Value as SqlValue;
use serde::Deserialize;
use thiserror::Error;
use time::OffsetDateTime;
use tool_gate_core::AggregateRow;
use tool_gate_core::AuditAggregation;
use tool_gate_core::AuditEntry;
use tool_gate_core::AuditFilter;
use tool_gate_core::AuditStorage;
use tool_gate_core::StorageError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum serialized audit entry size accepted by the store.
pub const MAX_ENTRY_BYTES: usize = 256 * 1024;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` audit storage.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `busy_timeout_ms` is interpreted as milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl SqliteStoreConfig {
    /// Builds a config for `path` with default pragmas.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }

    /// Validates path safety limits without touching the filesystem layout.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Invalid`] when the path is empty, too long,
    /// or names an existing directory.
    pub fn validate(&self) -> Result<(), SqliteStoreError> {
        validate_store_path(&self.path)
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
///
/// # Invariants
/// - Error messages avoid embedding raw audit payloads.
#[derive(Debug, Error, Clone)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Stored payload does not match its indexed columns or fails to decode.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store data or configuration.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
    /// Entry payload exceeded the size limit.
    #[error("sqlite store payload too large: {actual_bytes} bytes (max {max_bytes})")]
    TooLarge {
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual payload size in bytes.
        actual_bytes: usize,
    },
}

impl From<SqliteStoreError> for StorageError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) => Self::Store(message),
            SqliteStoreError::Corrupt(message) => Self::Corrupt(message),
            SqliteStoreError::VersionMismatch(message) => Self::VersionMismatch(message),
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
            SqliteStoreError::TooLarge {
                max_bytes,
                actual_bytes,
            } => Self::Invalid(format!(
                "entry_json exceeds size limit: {actual_bytes} bytes (max {max_bytes})"
            )),
        }
    }
}

/// Maps a rusqlite error into a store error.
#[allow(clippy::needless_pass_by_value, reason = "Used directly as a map_err adapter.")]
fn db_error(err: rusqlite::Error) -> SqliteStoreError {
    SqliteStoreError::Db(err.to_string())
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// SQLite-backed audit storage.
///
/// # Invariants
/// - Natural order is insertion order (`seq` ascending).
/// - `(collection, audit_id)` is unique; repeated inserts are no-ops.
pub struct SqliteAuditStorage {
    /// Store configuration.
    config: SqliteStoreConfig,
    /// Shared connection; `SQLite` serializes writers anyway.
    connection: Mutex<Connection>,
}

impl SqliteAuditStorage {
    /// Opens (creating if needed) an SQLite-backed audit store.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the path is unsafe, the database
    /// cannot be opened, or its schema version is unsupported.
    pub fn open(config: SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(&config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            config,
            connection: Mutex::new(connection),
        })
    }

    /// Returns the store configuration.
    #[must_use]
    pub const fn config(&self) -> &SqliteStoreConfig {
        &self.config
    }

    /// Verifies the store can execute a simple SQL statement.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] if the mutex is poisoned or the query fails.
    pub fn readiness(&self) -> Result<(), SqliteStoreError> {
        let guard = self.lock()?;
        guard.query_row("SELECT 1", [], |_| Ok(())).map_err(db_error)
    }

    /// Acquires the connection.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection
            .lock()
            .map_err(|_| SqliteStoreError::Io("sqlite connection mutex poisoned".to_string()))
    }

    /// Appends one entry inside a transaction.
    fn insert_entry(&self, collection: &str, entry: &AuditEntry) -> Result<(), SqliteStoreError> {
        let entry_json = serde_json::to_string(entry)
            .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
        if entry_json.len() > MAX_ENTRY_BYTES {
            return Err(SqliteStoreError::TooLarge {
                max_bytes: MAX_ENTRY_BYTES,
                actual_bytes: entry_json.len(),
            });
        }
        let timestamp_ns = timestamp_key(entry.timestamp)?;
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(db_error)?;
        tx.execute(
            "INSERT INTO audit_entries (collection, audit_id, service, decision, timestamp_ns, \
             entry_json) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (collection, audit_id) DO NOTHING",
            params![
                collection,
                entry.audit_id.as_str(),
                entry.service.as_str(),
                entry.decision.as_str(),
                timestamp_ns,
                entry_json,
            ],
        )
        .map_err(db_error)?;
        tx.commit().map_err(db_error)
    }

    /// Returns matching entries in `seq` order.
    fn find_entries(
        &self,
        collection: &str,
        filter: &AuditFilter,
    ) -> Result<Vec<AuditEntry>, SqliteStoreError> {
        let mut sql = String::from(
            "SELECT audit_id, service, decision, entry_json FROM audit_entries WHERE collection \
             = ?1",
        );
        let mut values = vec![SqlValue::Text(collection.to_string())];
        if let Some(service) = &filter.service {
            values.push(SqlValue::Text(service.as_str().to_string()));
            sql.push_str(&format!(" AND service = ?{}", values.len()));
        }
        if let Some(decision) = filter.decision {
            values.push(SqlValue::Text(decision.as_str().to_string()));
            sql.push_str(&format!(" AND decision = ?{}", values.len()));
        }
        if let Some(start) = filter.start {
            values.push(SqlValue::Integer(bound_key(start)));
            sql.push_str(&format!(" AND timestamp_ns >= ?{}", values.len()));
        }
        if let Some(end) = filter.end {
            values.push(SqlValue::Integer(bound_key(end)));
            sql.push_str(&format!(" AND timestamp_ns <= ?{}", values.len()));
        }
        sql.push_str(" ORDER BY seq ASC");

        let guard = self.lock()?;
        let mut stmt = guard.prepare(&sql).map_err(db_error)?;
        let rows = stmt
            .query_map(params_from_iter(values), |row| {
                Ok(StoredRow {
                    audit_id: row.get(0)?,
                    service: row.get(1)?,
                    decision: row.get(2)?,
                    entry_json: row.get(3)?,
                })
            })
            .map_err(db_error)?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row.map_err(db_error)?.decode()?);
        }
        Ok(entries)
    }

    /// Groups a collection by service.
    fn service_totals(&self, collection: &str) -> Result<Vec<AggregateRow>, SqliteStoreError> {
        let guard = self.lock()?;
        let mut stmt = guard
            .prepare(
                "SELECT service, COUNT(1) AS total, SUM(CASE WHEN decision = 'BLOCK' THEN 1 ELSE \
                 0 END) AS blocks FROM audit_entries WHERE collection = ?1 GROUP BY service \
                 ORDER BY total DESC, service ASC",
            )
            .map_err(db_error)?;
        let rows = stmt
            .query_map(params![collection], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?, row.get::<_, i64>(2)?))
            })
            .map_err(db_error)?;
        let mut totals = Vec::new();
        for row in rows {
            let (key, total, blocks) = row.map_err(db_error)?;
            totals.push(AggregateRow {
                key,
                total: count_from_sql(total)?,
                blocks: count_from_sql(blocks)?,
            });
        }
        Ok(totals)
    }
}

impl AuditStorage for SqliteAuditStorage {
    fn insert(&self, collection: &str, entry: &AuditEntry) -> Result<(), StorageError> {
        self.insert_entry(collection, entry).map_err(StorageError::from)
    }

    fn find(
        &self,
        collection: &str,
        filter: &AuditFilter,
    ) -> Result<Vec<AuditEntry>, StorageError> {
        self.find_entries(collection, filter).map_err(StorageError::from)
    }

    fn aggregate(
        &self,
        collection: &str,
        pipeline: &AuditAggregation,
    ) -> Result<Vec<AggregateRow>, StorageError> {
        match pipeline {
            AuditAggregation::ServiceTotals => {
                self.service_totals(collection).map_err(StorageError::from)
            }
        }
    }
}

// ============================================================================
// SECTION: Rows
// ============================================================================

/// Raw row read back from `audit_entries`.
struct StoredRow {
    /// Indexed audit id.
    audit_id: String,
    /// Indexed service name.
    service: String,
    /// Indexed decision label.
    decision: String,
    /// Serialized entry.
    entry_json: String,
}

impl StoredRow {
    /// Decodes the payload and checks it against the indexed columns.
    fn decode(self) -> Result<AuditEntry, SqliteStoreError> {
        let entry: AuditEntry = serde_json::from_str(&self.entry_json)
            .map_err(|err| SqliteStoreError::Corrupt(format!("entry_json: {err}")))?;
        if entry.audit_id.as_str() != self.audit_id
            || entry.service.as_str() != self.service
            || entry.decision.as_str() != self.decision
        {
            return Err(SqliteStoreError::Corrupt(format!(
                "entry {} does not match its indexed columns",
                self.audit_id
            )));
        }
        Ok(entry)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    if path.as_os_str().is_empty() {
        return Err(SqliteStoreError::Invalid("store path must not be empty".to_string()));
    }
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection with the configured pragmas.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags).map_err(db_error)?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteStoreConfig,
) -> Result<(), SqliteStoreError> {
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(db_error)?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(db_error)?;
    connection.busy_timeout(Duration::from_millis(config.busy_timeout_ms)).map_err(db_error)?;
    Ok(())
}

/// Initializes the `SQLite` schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(db_error)?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(db_error)?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(db_error)?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(db_error)?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS audit_entries (
                    seq INTEGER PRIMARY KEY AUTOINCREMENT,
                    collection TEXT NOT NULL,
                    audit_id TEXT NOT NULL,
                    service TEXT NOT NULL,
                    decision TEXT NOT NULL,
                    timestamp_ns INTEGER NOT NULL,
                    entry_json TEXT NOT NULL,
                    UNIQUE (collection, audit_id)
                );
                CREATE INDEX IF NOT EXISTS idx_audit_entries_service
                    ON audit_entries (collection, service);
                CREATE INDEX IF NOT EXISTS idx_audit_entries_decision
                    ON audit_entries (collection, decision);
                CREATE INDEX IF NOT EXISTS idx_audit_entries_timestamp
                    ON audit_entries (collection, timestamp_ns);",
            )
            .map_err(db_error)?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(db_error)?;
    Ok(())
}

/// Converts an entry timestamp into its indexed nanosecond key.
fn timestamp_key(timestamp: OffsetDateTime) -> Result<i64, SqliteStoreError> {
    i64::try_from(timestamp.unix_timestamp_nanos())
        .map_err(|_| SqliteStoreError::Invalid("timestamp outside storable range".to_string()))
}

/// Converts a filter bound into a nanosecond key, saturating out-of-range bounds.
fn bound_key(bound: OffsetDateTime) -> i64 {
    let nanos = bound.unix_timestamp_nanos();
    i64::try_from(nanos).unwrap_or(if nanos < 0 { i64::MIN } else { i64::MAX })
}

/// Converts a SQL count into `u64`.
fn count_from_sql(value: i64) -> Result<u64, SqliteStoreError> {
    u64::try_from(value).map_err(|_| SqliteStoreError::Corrupt("negative aggregate count".into()))
}
