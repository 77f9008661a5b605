// crates/tool-gate-core/src/core/decision.rs
// ============================================================================
// Module: Tool Gate Decisions
// Description: Validator results and final allow/block decisions.
// Purpose: Carry the single blocking reason from the pipeline to the caller.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! Each validator returns a fresh [`ValidationResult`]. The engine folds the
//! first blocking result into a [`Decision`]; the caller receives the
//! [`DecisionResponse`] projection `{allowed, reason, rule_violated}`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::core::identifiers::RuleId;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Rule id reported when critical context pressure blocks a call.
pub const PRESSURE_CRITICAL_RULE_ID: &str = "PRESSURE_CRITICAL";
/// Rule id reported when rule retrieval fails and the call is blocked.
pub const RULE_RETRIEVAL_FAILED_RULE_ID: &str = "RULE_RETRIEVAL_FAILED";
/// Rule id reported when a validator fails instead of returning a result.
pub const VALIDATOR_FAILED_RULE_ID: &str = "VALIDATOR_FAILED";

// ============================================================================
// SECTION: Validation Result
// ============================================================================

/// Outcome of one validator invocation.
///
/// # Invariants
/// - `reason` is always present when `blocked` is true.
/// - A non-blocking result with a reason is an advisory (audited as `WARN`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Whether the call must be blocked.
    pub blocked: bool,
    /// Block reason, or advisory text for a passing result.
    pub reason: Option<String>,
    /// Rule that triggered the result.
    pub rule_id: Option<RuleId>,
}

impl ValidationResult {
    /// Passing result without remarks.
    #[must_use]
    pub const fn pass() -> Self {
        Self {
            blocked: false,
            reason: None,
            rule_id: None,
        }
    }

    /// Blocking result.
    #[must_use]
    pub fn block(reason: impl Into<String>, rule_id: Option<RuleId>) -> Self {
        Self {
            blocked: true,
            reason: Some(reason.into()),
            rule_id,
        }
    }

    /// Passing result that carries an advisory.
    #[must_use]
    pub fn advisory(reason: impl Into<String>, rule_id: Option<RuleId>) -> Self {
        Self {
            blocked: false,
            reason: Some(reason.into()),
            rule_id,
        }
    }

    /// Returns true for a passing result with an advisory.
    #[must_use]
    pub const fn is_advisory(&self) -> bool {
        !self.blocked && self.reason.is_some()
    }
}

// ============================================================================
// SECTION: Decision
// ============================================================================

/// Final gate decision for one tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// Whether the tool call may proceed.
    pub allowed: bool,
    /// Block reason; `None` when allowed.
    pub reason: Option<String>,
    /// Rule that caused the block.
    pub rule_violated: Option<RuleId>,
    /// Decision time.
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl Decision {
    /// Allowing decision.
    #[must_use]
    pub const fn allow(timestamp: OffsetDateTime) -> Self {
        Self {
            allowed: true,
            reason: None,
            rule_violated: None,
            timestamp,
        }
    }

    /// Blocking decision carrying the validator's reason and rule id.
    #[must_use]
    pub fn blocked_by(result: ValidationResult, timestamp: OffsetDateTime) -> Self {
        Self {
            allowed: false,
            reason: result.reason,
            rule_violated: result.rule_id,
            timestamp,
        }
    }

    /// Returns the caller-facing response shape.
    #[must_use]
    pub fn response(&self) -> DecisionResponse {
        DecisionResponse {
            allowed: self.allowed,
            reason: self.reason.clone(),
            rule_violated: self.rule_violated.clone(),
        }
    }
}

/// Response shape returned to the agent host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionResponse {
    /// Whether the tool call may proceed.
    pub allowed: bool,
    /// Block reason.
    pub reason: Option<String>,
    /// Violated rule id.
    pub rule_violated: Option<RuleId>,
}
