// crates/tool-gate-core/src/runtime/validators.rs
// ============================================================================
// Module: Tool Gate Validators
// Description: Boundary, cross-reference, and context-pressure validators.
// Purpose: Inspect a proposed tool call and report pass, advisory, or block.
// Dependencies: crate::core, crate::interfaces, serde_json, thiserror
// ============================================================================

//! ## Overview
//! A [`Validator`] inspects one request against the matched rules and the
//! current pressure snapshot. Validators hold no mutable state. Within a
//! validator, rules are checked in the order the rule store returned them and
//! the first hit wins; across validators, the engine's declared order decides
//! which single block is reported.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::core::PRESSURE_CRITICAL_RULE_ID;
use crate::core::PressureLevel;
use crate::core::PressureSnapshot;
use crate::core::Quadrant;
use crate::core::Rule;
use crate::core::RuleId;
use crate::core::ToolCallRequest;
use crate::core::ToolInput;
use crate::core::ValidationResult;
use crate::core::VerificationRequirement;
use crate::interfaces::BoundaryPredicate;
use crate::interfaces::ConflictPredicate;

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Validator failure (distinct from a block).
#[derive(Debug, Error)]
pub enum ValidatorError {
    /// Validator could not produce a result.
    #[error("{0}")]
    Failed(String),
}

/// One stage of the decision pipeline.
pub trait Validator: Send + Sync {
    /// Stable validator name used in failure reasons and logs.
    fn name(&self) -> &'static str;

    /// Validates a request.
    ///
    /// # Errors
    ///
    /// Returns [`ValidatorError`] when the validator cannot decide; the engine
    /// treats this as a block.
    fn validate(
        &self,
        request: &ToolCallRequest,
        rules: &[Rule],
        pressure: &PressureSnapshot,
    ) -> Result<ValidationResult, ValidatorError>;
}

/// Returns the standard pipeline: boundary, cross-reference, pressure.
#[must_use]
pub fn standard_validators(
    boundary: Arc<dyn BoundaryPredicate>,
    conflict: Arc<dyn ConflictPredicate>,
) -> Vec<Box<dyn Validator>> {
    vec![
        Box::new(BoundaryValidator::new(boundary)),
        Box::new(CrossReferenceValidator::new(conflict)),
        Box::new(PressureValidator),
    ]
}

// ============================================================================
// SECTION: Boundary Validator
// ============================================================================

/// Blocks calls that cross a boundary declared by a boundary-class rule.
pub struct BoundaryValidator {
    /// Quadrant that marks boundary-class rules.
    quadrant: Quadrant,
    /// Deployment-supplied crossing predicate.
    predicate: Arc<dyn BoundaryPredicate>,
}

impl BoundaryValidator {
    /// Creates a validator over the `VALUES` quadrant.
    #[must_use]
    pub fn new(predicate: Arc<dyn BoundaryPredicate>) -> Self {
        Self::for_quadrant(Quadrant::boundary(), predicate)
    }

    /// Creates a validator over a custom boundary quadrant.
    #[must_use]
    pub const fn for_quadrant(quadrant: Quadrant, predicate: Arc<dyn BoundaryPredicate>) -> Self {
        Self {
            quadrant,
            predicate,
        }
    }
}

impl Validator for BoundaryValidator {
    fn name(&self) -> &'static str {
        "boundary"
    }

    fn validate(
        &self,
        request: &ToolCallRequest,
        rules: &[Rule],
        _pressure: &PressureSnapshot,
    ) -> Result<ValidationResult, ValidatorError> {
        let crossed = rules
            .iter()
            .filter(|rule| rule.quadrant == self.quadrant)
            .find(|rule| self.predicate.crosses_boundary(&request.input, rule));
        Ok(crossed.map_or_else(ValidationResult::pass, |rule| {
            ValidationResult::block(
                format!("Action violates boundary: {}", rule.text),
                Some(rule.id.clone()),
            )
        }))
    }
}

// ============================================================================
// SECTION: Cross-Reference Validator
// ============================================================================

/// Blocks calls that conflict with a rule requiring mandatory verification.
pub struct CrossReferenceValidator {
    /// Deployment-supplied conflict predicate.
    predicate: Arc<dyn ConflictPredicate>,
}

impl CrossReferenceValidator {
    /// Creates the validator.
    #[must_use]
    pub fn new(predicate: Arc<dyn ConflictPredicate>) -> Self {
        Self {
            predicate,
        }
    }
}

impl Validator for CrossReferenceValidator {
    fn name(&self) -> &'static str {
        "cross_reference"
    }

    fn validate(
        &self,
        request: &ToolCallRequest,
        rules: &[Rule],
        _pressure: &PressureSnapshot,
    ) -> Result<ValidationResult, ValidatorError> {
        let conflict = rules
            .iter()
            .filter(|rule| rule.verification_required == VerificationRequirement::Mandatory)
            .find(|rule| self.predicate.conflicts_with(&request.input, rule));
        Ok(conflict.map_or_else(ValidationResult::pass, |rule| {
            ValidationResult::block(
                format!("Action conflicts with mandatory rule: {}", rule.id),
                Some(rule.id.clone()),
            )
        }))
    }
}

// ============================================================================
// SECTION: Pressure Validator
// ============================================================================

/// Defers calls while context pressure is critical.
///
/// # Invariants
/// - The context's `user_override` flag is the only way past a critical
///   level; the pass is returned as an advisory so it is audited as `WARN`.
pub struct PressureValidator;

impl Validator for PressureValidator {
    fn name(&self) -> &'static str {
        "pressure"
    }

    fn validate(
        &self,
        request: &ToolCallRequest,
        _rules: &[Rule],
        pressure: &PressureSnapshot,
    ) -> Result<ValidationResult, ValidatorError> {
        if pressure.level != PressureLevel::Critical {
            return Ok(ValidationResult::pass());
        }
        let rule_id = Some(RuleId::new(PRESSURE_CRITICAL_RULE_ID));
        if request.context.user_override {
            return Ok(ValidationResult::advisory(
                "Context pressure CRITICAL - proceeding under user override",
                rule_id,
            ));
        }
        Ok(ValidationResult::block("Context pressure CRITICAL - action deferred", rule_id))
    }
}

// ============================================================================
// SECTION: Reference Predicates
// ============================================================================

/// Boundary predicate comparing path-like input fields to rule targets.
///
/// A call crosses a rule's boundary when any of the inspected input fields is
/// a string starting with one of the rule's `targets`. Rules without targets
/// never match.
pub struct TargetPrefixPredicate {
    /// Input keys inspected for targets.
    fields: Vec<String>,
}

impl Default for TargetPrefixPredicate {
    fn default() -> Self {
        Self::new(["file", "file_path", "path", "target"])
    }
}

impl TargetPrefixPredicate {
    /// Creates a predicate inspecting the given input keys.
    #[must_use]
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }
}

impl BoundaryPredicate for TargetPrefixPredicate {
    fn crosses_boundary(&self, input: &ToolInput, rule: &Rule) -> bool {
        self.fields
            .iter()
            .filter_map(|field| input.get(field).and_then(Value::as_str))
            .any(|value| rule.targets.iter().any(|target| value.starts_with(target.as_str())))
    }
}
