// crates/tool-gate-core/src/core/audit.rs
// ============================================================================
// Module: Tool Gate Audit Records
// Description: Audit entries, drafts, filters, and aggregate rows.
// Purpose: Define the persisted projection of a decision and its query model.
// Dependencies: serde, serde_json, time
// ============================================================================

//! ## Overview
//! An [`AuditEntry`] is the immutable, sanitized projection of exactly one
//! decision. Its serialized form is the cross-language shape
//! `{audit_id, timestamp, service, decision, rule_id, context, reason, metadata}`
//! with an RFC 3339 timestamp. Entries are built only by the audit trail from
//! an [`AuditDraft`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use time::OffsetDateTime;

use crate::core::identifiers::AuditId;
use crate::core::identifiers::RuleId;
use crate::core::identifiers::ServiceName;

// ============================================================================
// SECTION: Decision Kind
// ============================================================================

/// Audited decision kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditDecision {
    /// Call allowed.
    Allow,
    /// Call blocked.
    Block,
    /// Call allowed with an advisory.
    Warn,
}

impl AuditDecision {
    /// Returns the persisted label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "ALLOW",
            Self::Block => "BLOCK",
            Self::Warn => "WARN",
        }
    }

    /// Parses a persisted label.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "ALLOW" => Some(Self::Allow),
            "BLOCK" => Some(Self::Block),
            "WARN" => Some(Self::Warn),
            _ => None,
        }
    }
}

impl fmt::Display for AuditDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Entries
// ============================================================================

/// Unsanitized input to the audit trail.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditDraft {
    /// Service that made the decision.
    pub service: ServiceName,
    /// Decision kind.
    pub decision: AuditDecision,
    /// Triggering rule.
    pub rule_id: Option<RuleId>,
    /// Raw call context; sanitized before persistence.
    pub context: Option<Map<String, Value>>,
    /// Decision reason.
    pub reason: Option<String>,
    /// Free-form metadata.
    pub metadata: Map<String, Value>,
    /// Decision time; the trail stamps the current time when absent.
    pub timestamp: Option<OffsetDateTime>,
}

impl AuditDraft {
    /// Creates a draft with empty context and metadata.
    #[must_use]
    pub fn new(service: impl Into<ServiceName>, decision: AuditDecision) -> Self {
        Self {
            service: service.into(),
            decision,
            rule_id: None,
            context: None,
            reason: None,
            metadata: Map::new(),
            timestamp: None,
        }
    }

    /// Sets the triggering rule.
    #[must_use]
    pub fn with_rule(mut self, rule_id: impl Into<RuleId>) -> Self {
        self.rule_id = Some(rule_id.into());
        self
    }

    /// Sets the raw context.
    #[must_use]
    pub fn with_context(mut self, context: Map<String, Value>) -> Self {
        self.context = Some(context);
        self
    }

    /// Sets the reason.
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Sets the metadata mapping.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Sets an explicit decision time.
    #[must_use]
    pub const fn at(mut self, timestamp: OffsetDateTime) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Immutable, sanitized audit record.
///
/// # Invariants
/// - `context` and `metadata` contain no sensitive keys.
/// - No string value in `context`, `metadata`, or `reason` exceeds the trail's
///   character limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Unique, time-sortable identifier.
    pub audit_id: AuditId,
    /// Decision time.
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// Service that made the decision.
    pub service: ServiceName,
    /// Decision kind.
    pub decision: AuditDecision,
    /// Triggering rule.
    pub rule_id: Option<RuleId>,
    /// Sanitized context.
    pub context: Option<Map<String, Value>>,
    /// Decision reason.
    pub reason: Option<String>,
    /// Free-form metadata.
    pub metadata: Map<String, Value>,
}

// ============================================================================
// SECTION: Queries
// ============================================================================

/// Audit query filter. Unset fields are unconstrained.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuditFilter {
    /// Exact service match.
    pub service: Option<ServiceName>,
    /// Exact decision match.
    pub decision: Option<AuditDecision>,
    /// Inclusive lower time bound.
    pub start: Option<OffsetDateTime>,
    /// Inclusive upper time bound.
    pub end: Option<OffsetDateTime>,
}

impl AuditFilter {
    /// Filter matching every entry.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Restricts to one service.
    #[must_use]
    pub fn service(mut self, service: impl Into<ServiceName>) -> Self {
        self.service = Some(service.into());
        self
    }

    /// Restricts to one decision kind.
    #[must_use]
    pub const fn decision(mut self, decision: AuditDecision) -> Self {
        self.decision = Some(decision);
        self
    }

    /// Restricts to an inclusive time range; either bound may be open.
    #[must_use]
    pub const fn between(
        mut self,
        start: Option<OffsetDateTime>,
        end: Option<OffsetDateTime>,
    ) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    /// Returns true when the time range can match nothing (`start > end`).
    #[must_use]
    pub fn is_contradictory(&self) -> bool {
        matches!((self.start, self.end), (Some(start), Some(end)) if start > end)
    }

    /// Returns true when the entry satisfies the filter.
    #[must_use]
    pub fn matches(&self, entry: &AuditEntry) -> bool {
        self.service.as_ref().is_none_or(|service| &entry.service == service)
            && self.decision.is_none_or(|decision| entry.decision == decision)
            && self.start.is_none_or(|start| entry.timestamp >= start)
            && self.end.is_none_or(|end| entry.timestamp <= end)
    }
}

/// Aggregations the audit storage must support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAggregation {
    /// Group by service; count totals and `BLOCK` entries; sort by total
    /// descending, then by service ascending.
    ServiceTotals,
}

/// One grouped row returned by storage aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateRow {
    /// Group key.
    pub key: String,
    /// Entries in the group.
    pub total: u64,
    /// `BLOCK` entries in the group.
    pub blocks: u64,
}

/// Per-service decision totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStats {
    /// Service name.
    pub service: ServiceName,
    /// Entries recorded for the service.
    pub total: u64,
    /// `BLOCK` entries recorded for the service.
    pub blocks: u64,
}

/// Block rate over a time window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlockRate {
    /// Entries in the window.
    pub total: u64,
    /// `BLOCK` entries in the window.
    pub blocks: u64,
    /// `blocks / total * 100`, or 0 when the window is empty.
    pub rate: f64,
}

impl BlockRate {
    /// Computes the rate from counts.
    #[must_use]
    #[allow(clippy::cast_precision_loss, reason = "Audit counts stay far below 2^52.")]
    pub fn from_counts(total: u64, blocks: u64) -> Self {
        let rate = if total > 0 { (blocks as f64 / total as f64) * 100.0 } else { 0.0 };
        Self {
            total,
            blocks,
            rate,
        }
    }
}
