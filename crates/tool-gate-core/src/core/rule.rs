// crates/tool-gate-core/src/core/rule.rs
// ============================================================================
// Module: Tool Gate Rules
// Description: Governance rule records and rule retrieval criteria.
// Purpose: Model rules already materialized by an external rule store.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! A [`Rule`] is a structured governance constraint owned by the rule store.
//! The core never authors rules; it only consumes them through a
//! [`RuleQuery`] built per decision. Rules are immutable once retrieved.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::core::identifiers::RuleId;
use crate::core::identifiers::ToolName;
use crate::core::request::InvocationContext;

// ============================================================================
// SECTION: Rule Metadata
// ============================================================================

/// How durable or important a rule is considered.
///
/// # Invariants
/// - Ordering is `Low < Medium < High`; persistence floors compare with `>=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PersistenceLevel {
    /// Low persistence.
    Low,
    /// Medium persistence.
    Medium,
    /// High persistence.
    High,
}

/// Verification demanded before an action touching the rule proceeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationRequirement {
    /// No verification required.
    None,
    /// Verification recommended.
    Recommended,
    /// Verification mandatory; checked by the cross-reference validator.
    Mandatory,
}

/// Categorical rule tag (for example the boundary-class `VALUES` quadrant).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quadrant(String);

impl Quadrant {
    /// Quadrant label used for boundary-class rules.
    pub const BOUNDARY: &'static str = "VALUES";

    /// Creates a new quadrant tag.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// Returns the boundary-class quadrant.
    #[must_use]
    pub fn boundary() -> Self {
        Self::new(Self::BOUNDARY)
    }

    /// Returns the tag as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Quadrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for Quadrant {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Optional validity window for a rule. Both bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TemporalScope {
    /// Earliest instant the rule applies.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub not_before: Option<OffsetDateTime>,
    /// Latest instant the rule applies.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub not_after: Option<OffsetDateTime>,
}

impl TemporalScope {
    /// Returns true when `at` falls inside the window.
    #[must_use]
    pub fn contains(&self, at: OffsetDateTime) -> bool {
        self.not_before.is_none_or(|start| at >= start)
            && self.not_after.is_none_or(|end| at <= end)
    }
}

// ============================================================================
// SECTION: Rule
// ============================================================================

/// Governance rule as materialized by the rule store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Unique rule identifier.
    pub id: RuleId,
    /// Display text; quoted in boundary block reasons.
    pub text: String,
    /// Categorical tag.
    pub quadrant: Quadrant,
    /// Persistence level.
    pub persistence: PersistenceLevel,
    /// Verification requirement.
    pub verification_required: VerificationRequirement,
    /// Whether the rule is currently in force.
    pub active: bool,
    /// Optional validity window.
    #[serde(default)]
    pub temporal_scope: Option<TemporalScope>,
    /// Tools the rule applies to; empty means every tool.
    #[serde(default)]
    pub tools: Vec<ToolName>,
    /// Targets declared by the rule (paths, resources) for boundary checks.
    #[serde(default)]
    pub targets: Vec<String>,
}

impl Rule {
    /// Returns true when the rule applies to the named tool.
    #[must_use]
    pub fn applies_to_tool(&self, tool: &ToolName) -> bool {
        self.tools.is_empty() || self.tools.contains(tool)
    }

    /// Returns true when the rule's validity window contains `at`.
    #[must_use]
    pub fn is_in_force_at(&self, at: OffsetDateTime) -> bool {
        self.temporal_scope.is_none_or(|scope| scope.contains(at))
    }
}

// ============================================================================
// SECTION: Rule Query
// ============================================================================

/// Criteria sent to the rule store for a single decision.
///
/// # Invariants
/// - Built fresh per decision; the engine always asks for active rules at the
///   `High` persistence floor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleQuery {
    /// Tool under evaluation.
    pub tool: ToolName,
    /// Minimum persistence level.
    pub persistence: PersistenceLevel,
    /// Required activity flag.
    pub active: bool,
    /// Invocation context of the request.
    pub context: InvocationContext,
    /// Instant used for temporal scope checks.
    #[serde(with = "time::serde::rfc3339")]
    pub evaluated_at: OffsetDateTime,
}

impl RuleQuery {
    /// Builds the engine's standard query for a tool call.
    #[must_use]
    pub const fn for_tool(
        tool: ToolName,
        context: InvocationContext,
        evaluated_at: OffsetDateTime,
    ) -> Self {
        Self {
            tool,
            persistence: PersistenceLevel::High,
            active: true,
            context,
            evaluated_at,
        }
    }

    /// Returns true when the rule satisfies every criterion.
    #[must_use]
    pub fn matches(&self, rule: &Rule) -> bool {
        rule.active == self.active
            && rule.persistence >= self.persistence
            && rule.applies_to_tool(&self.tool)
            && rule.is_in_force_at(self.evaluated_at)
    }
}
