// crates/tool-gate-core/src/runtime/audit.rs
// ============================================================================
// Module: Tool Gate Audit Trail
// Description: Sanitized, append-only decision records with query support.
// Purpose: Turn drafts into immutable entries and answer filtered queries.
// Dependencies: crate::core, crate::interfaces, rand, serde_json, thiserror, time
// ============================================================================

//! ## Overview
//! [`AuditTrail`] owns entry construction. A draft is stamped with an
//! [`AuditId`], its context, metadata, and reason are run through the
//! [`ContextSanitizer`], and the resulting [`AuditEntry`] is handed to the
//! [`AuditStorage`] collaborator as one atomic insert. Queries and aggregates
//! are answered by storage; contradictory time ranges short-circuit to empty
//! results.
//!
//! Security posture: context is untrusted input. Credential-like keys are
//! removed at every depth before anything is persisted.
//!
//! Entries are bounded. Strings are truncated, arrays and objects keep at
//! most `max_collection_items` members, and an entry whose serialized form
//! still exceeds `max_entry_bytes` has its context and metadata replaced by a
//! truncation summary so every decision remains storable.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use rand::RngCore;
use rand::rngs::OsRng;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;

use crate::core::AuditAggregation;
use crate::core::AuditDecision;
use crate::core::AuditDraft;
use crate::core::AuditEntry;
use crate::core::AuditFilter;
use crate::core::AuditId;
use crate::core::BlockRate;
use crate::core::ServiceName;
use crate::core::ServiceStats;
use crate::interfaces::AuditStorage;
use crate::interfaces::StorageError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Keys always stripped from audited context and metadata.
pub const DEFAULT_SENSITIVE_KEYS: [&str; 3] = ["credentials", "apiKeys", "passwords"];
/// Maximum characters of any audited string, marker included.
pub const DEFAULT_MAX_STRING_CHARS: usize = 200;
/// Marker appended to truncated strings.
pub const TRUNCATION_MARKER: &str = "...";
/// Maximum members kept per audited array or object.
pub const DEFAULT_MAX_COLLECTION_ITEMS: usize = 100;
/// Maximum serialized size of one audit entry in bytes.
pub const DEFAULT_MAX_ENTRY_BYTES: usize = 64 * 1024;
/// Default storage collection for audit entries.
pub const DEFAULT_AUDIT_COLLECTION: &str = "auditLogs";
/// Prefix of every audit id.
const AUDIT_ID_PREFIX: &str = "audit_";
/// Width of the base36 millisecond prefix.
const AUDIT_ID_TIME_WIDTH: usize = 9;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Audit trail errors.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Storage collaborator failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// Background dispatcher is unavailable or misconfigured.
    #[error("audit dispatcher error: {0}")]
    Dispatcher(String),
}

impl AuditError {
    /// Returns true when a failed write is worth retrying.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Storage(err) => err.is_transient(),
            Self::Dispatcher(_) => false,
        }
    }
}

// ============================================================================
// SECTION: Sanitization
// ============================================================================

/// Audit trail configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditTrailConfig {
    /// Storage collection receiving entries.
    pub collection: String,
    /// Extra keys stripped in addition to [`DEFAULT_SENSITIVE_KEYS`].
    pub sensitive_keys: Vec<String>,
    /// Maximum characters of any audited string.
    pub max_string_chars: usize,
    /// Maximum members kept per audited array or object.
    pub max_collection_items: usize,
    /// Serialized size above which context and metadata are summarized.
    pub max_entry_bytes: usize,
}

impl Default for AuditTrailConfig {
    fn default() -> Self {
        Self {
            collection: DEFAULT_AUDIT_COLLECTION.to_string(),
            sensitive_keys: Vec::new(),
            max_string_chars: DEFAULT_MAX_STRING_CHARS,
            max_collection_items: DEFAULT_MAX_COLLECTION_ITEMS,
            max_entry_bytes: DEFAULT_MAX_ENTRY_BYTES,
        }
    }
}

/// Recursive key denylist and string truncation.
///
/// # Invariants
/// - Key matching is case-insensitive.
/// - Output strings never exceed `max_chars` characters, marker included.
/// - Arrays and objects keep at most `max_items` members plus one marker.
#[derive(Debug, Clone)]
pub struct ContextSanitizer {
    /// Lowercased denylisted keys.
    denylist: BTreeSet<String>,
    /// Maximum characters per string.
    max_chars: usize,
    /// Maximum members per array or object.
    max_items: usize,
}

impl Default for ContextSanitizer {
    fn default() -> Self {
        Self::new(std::iter::empty::<String>(), DEFAULT_MAX_STRING_CHARS)
    }
}

impl ContextSanitizer {
    /// Creates a sanitizer with the default keys plus `extra_keys`.
    #[must_use]
    pub fn new<I, S>(extra_keys: I, max_chars: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut denylist: BTreeSet<String> =
            DEFAULT_SENSITIVE_KEYS.iter().map(|key| key.to_ascii_lowercase()).collect();
        denylist.extend(extra_keys.into_iter().map(|key| key.as_ref().to_ascii_lowercase()));
        Self {
            denylist,
            max_chars,
            max_items: DEFAULT_MAX_COLLECTION_ITEMS,
        }
    }

    /// Sets the member limit for arrays and objects.
    #[must_use]
    pub const fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items;
        self
    }

    /// Returns true when the key must be stripped.
    #[must_use]
    pub fn is_sensitive(&self, key: &str) -> bool {
        self.denylist.contains(&key.to_ascii_lowercase())
    }

    /// Sanitizes a mapping at every depth.
    ///
    /// Members beyond the item limit are replaced by a single
    /// [`TRUNCATION_MARKER`] key holding the omitted count.
    #[must_use]
    pub fn sanitize_map(&self, map: &Map<String, Value>) -> Map<String, Value> {
        let mut kept = map.iter().filter(|(key, _)| !self.is_sensitive(key));
        let mut sanitized: Map<String, Value> = kept
            .by_ref()
            .take(self.max_items)
            .map(|(key, value)| (key.clone(), self.sanitize_value(value)))
            .collect();
        let omitted = kept.count();
        if omitted > 0 {
            sanitized.insert(TRUNCATION_MARKER.to_string(), Value::from(omitted));
        }
        sanitized
    }

    /// Sanitizes one value at every depth.
    #[must_use]
    pub fn sanitize_value(&self, value: &Value) -> Value {
        match value {
            Value::Object(map) => Value::Object(self.sanitize_map(map)),
            Value::Array(items) => {
                let mut kept: Vec<Value> = items
                    .iter()
                    .take(self.max_items)
                    .map(|item| self.sanitize_value(item))
                    .collect();
                let omitted = items.len().saturating_sub(self.max_items);
                if omitted > 0 {
                    kept.push(Value::String(
                        self.truncate(&format!("{TRUNCATION_MARKER}{omitted} more")),
                    ));
                }
                Value::Array(kept)
            }
            Value::String(text) => Value::String(self.truncate(text)),
            other => other.clone(),
        }
    }

    /// Truncates a string to the character limit.
    ///
    /// Limits too small to hold the marker cut the string without one.
    #[must_use]
    pub fn truncate(&self, text: &str) -> String {
        if text.chars().count() <= self.max_chars {
            return text.to_string();
        }
        let marker_chars = TRUNCATION_MARKER.chars().count();
        if self.max_chars <= marker_chars {
            return text.chars().take(self.max_chars).collect();
        }
        let keep = self.max_chars - marker_chars;
        let mut truncated: String = text.chars().take(keep).collect();
        truncated.push_str(TRUNCATION_MARKER);
        truncated
    }
}

// ============================================================================
// SECTION: Audit Ids
// ============================================================================

/// Issues unique, time-sortable audit ids.
///
/// Format: `audit_` + base36 unix milliseconds (9 chars, zero padded) +
/// boot-random 8 hex chars + 10 hex chars of a process counter.
#[derive(Debug)]
struct AuditIdGenerator {
    /// Boot-scoped random component.
    boot_id: u32,
    /// Monotonic counter for ids issued in this process.
    counter: AtomicU64,
}

impl AuditIdGenerator {
    /// Creates a generator with a fresh boot id.
    fn new() -> Self {
        Self {
            boot_id: OsRng.next_u32(),
            counter: AtomicU64::new(0),
        }
    }

    /// Issues an id for an entry stamped at `timestamp`.
    fn issue(&self, timestamp: OffsetDateTime) -> AuditId {
        let seq = self.counter.fetch_add(1, Ordering::Relaxed);
        let millis = u64::try_from(timestamp.unix_timestamp_nanos() / 1_000_000).unwrap_or(0);
        AuditId::new(format!(
            "{AUDIT_ID_PREFIX}{:0>width$}{:08x}{:010x}",
            to_base36(millis),
            self.boot_id,
            seq & 0xFF_FFFF_FFFF,
            width = AUDIT_ID_TIME_WIDTH,
        ))
    }
}

/// Renders a value in lowercase base36.
fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        let index = usize::try_from(value % 36).unwrap_or(0);
        digits.push(char::from(DIGITS[index]));
        value /= 36;
    }
    digits.iter().rev().collect()
}

// ============================================================================
// SECTION: Audit Trail
// ============================================================================

/// Durable, queryable log of decisions.
pub struct AuditTrail {
    /// Storage collaborator.
    storage: Arc<dyn AuditStorage>,
    /// Trail configuration.
    config: AuditTrailConfig,
    /// Sanitizer derived from the configuration.
    sanitizer: ContextSanitizer,
    /// Audit id source.
    ids: AuditIdGenerator,
}

impl AuditTrail {
    /// Creates a trail over a storage collaborator.
    #[must_use]
    pub fn new(storage: Arc<dyn AuditStorage>, config: AuditTrailConfig) -> Self {
        let sanitizer = ContextSanitizer::new(&config.sensitive_keys, config.max_string_chars)
            .with_max_items(config.max_collection_items);
        Self {
            storage,
            config,
            sanitizer,
            ids: AuditIdGenerator::new(),
        }
    }

    /// Returns the trail configuration.
    #[must_use]
    pub const fn config(&self) -> &AuditTrailConfig {
        &self.config
    }

    /// Returns the sanitizer applied to every entry.
    #[must_use]
    pub const fn sanitizer(&self) -> &ContextSanitizer {
        &self.sanitizer
    }

    /// Builds the immutable, sanitized entry for a draft.
    #[must_use]
    pub fn prepare(&self, draft: AuditDraft) -> AuditEntry {
        let timestamp = draft.timestamp.unwrap_or_else(OffsetDateTime::now_utc);
        let mut entry = AuditEntry {
            audit_id: self.ids.issue(timestamp),
            timestamp,
            service: draft.service,
            decision: draft.decision,
            rule_id: draft.rule_id,
            context: draft.context.as_ref().map(|context| self.sanitizer.sanitize_map(context)),
            reason: draft.reason.as_deref().map(|reason| self.sanitizer.truncate(reason)),
            metadata: self.sanitizer.sanitize_map(&draft.metadata),
        };
        self.fit_entry_budget(&mut entry);
        entry
    }

    /// Summarizes context, then metadata, until the entry fits the byte budget.
    fn fit_entry_budget(&self, entry: &mut AuditEntry) {
        let Some(original_bytes) = self.oversized(entry) else {
            return;
        };
        let mut summary = Map::new();
        let tool = entry.context.as_ref().and_then(|context| context.get("tool"));
        if let Some(tool) = tool.filter(|tool| tool.is_string()) {
            summary.insert("tool".to_string(), tool.clone());
        }
        summary.insert("truncated".to_string(), Value::Bool(true));
        summary.insert("original_bytes".to_string(), Value::from(original_bytes));
        entry.context = Some(summary);
        if self.oversized(entry).is_some() {
            let mut metadata = Map::new();
            metadata.insert("truncated".to_string(), Value::Bool(true));
            entry.metadata = metadata;
        }
    }

    /// Returns the serialized size when it exceeds the byte budget.
    fn oversized(&self, entry: &AuditEntry) -> Option<usize> {
        serde_json::to_vec(entry)
            .ok()
            .map(|bytes| bytes.len())
            .filter(|len| *len > self.config.max_entry_bytes)
    }

    /// Persists a prepared entry. Re-inserting the same id is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Storage`] when the insert fails.
    pub fn persist(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        self.storage.insert(&self.config.collection, entry)?;
        Ok(())
    }

    /// Sanitizes, stamps, and persists a draft on the caller's thread.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Storage`] when the insert fails; nothing is
    /// visible to queries in that case.
    pub fn record(&self, draft: AuditDraft) -> Result<AuditId, AuditError> {
        let entry = self.prepare(draft);
        self.persist(&entry)?;
        Ok(entry.audit_id)
    }

    /// Returns entries matching the filter in storage order.
    ///
    /// A filter whose start is after its end yields no entries.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Storage`] when the query fails.
    pub fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>, AuditError> {
        if filter.is_contradictory() {
            return Ok(Vec::new());
        }
        Ok(self.storage.find(&self.config.collection, filter)?)
    }

    /// Returns per-service totals sorted by total descending, then service.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Storage`] when the aggregation fails.
    pub fn service_stats(&self) -> Result<Vec<ServiceStats>, AuditError> {
        let rows =
            self.storage.aggregate(&self.config.collection, &AuditAggregation::ServiceTotals)?;
        let mut stats: Vec<ServiceStats> = rows
            .into_iter()
            .map(|row| ServiceStats {
                service: ServiceName::new(row.key),
                total: row.total,
                blocks: row.blocks,
            })
            .collect();
        stats.sort_by(|left, right| {
            right.total.cmp(&left.total).then_with(|| left.service.cmp(&right.service))
        });
        Ok(stats)
    }

    /// Returns the block rate over an inclusive window; open bounds are
    /// unconstrained.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Storage`] when the query fails.
    pub fn block_rate(
        &self,
        start: Option<OffsetDateTime>,
        end: Option<OffsetDateTime>,
    ) -> Result<BlockRate, AuditError> {
        let entries = self.query(&AuditFilter::all().between(start, end))?;
        let total = u64::try_from(entries.len()).unwrap_or(u64::MAX);
        let blocks = entries.iter().filter(|entry| entry.decision == AuditDecision::Block).count();
        Ok(BlockRate::from_counts(total, u64::try_from(blocks).unwrap_or(u64::MAX)))
    }
}

