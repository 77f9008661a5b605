// crates/tool-gate-core/src/lib.rs
// ============================================================================
// Module: Tool Gate Core Library
// Description: Public API surface for the Tool Gate core.
// Purpose: Expose the data model, collaborator interfaces, and runtime pipeline.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Tool Gate intercepts proposed agent tool invocations before execution and
//! returns an allow/block decision with a justification. Decisions combine
//! rules retrieved from an external [`RuleStore`], an ordered set of
//! [`Validator`]s, and a running context-pressure score. Every decision is
//! projected into an append-only audit trail that supports filtered queries
//! and aggregate reporting.
//!
//! The pipeline fails closed: rule retrieval failures and validator failures
//! block the call. Audit failures never reach the caller.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use interfaces::AuditStorage;
pub use interfaces::BoundaryPredicate;
pub use interfaces::ConflictPredicate;
pub use interfaces::RuleStore;
pub use interfaces::RuleStoreError;
pub use interfaces::StorageError;
pub use runtime::AuditDispatcher;
pub use runtime::AuditDispatcherConfig;
pub use runtime::AuditDispatcherStats;
pub use runtime::AuditError;
pub use runtime::AuditTrail;
pub use runtime::AuditTrailConfig;
pub use runtime::BoundaryValidator;
pub use runtime::Checkpoint;
pub use runtime::CheckpointPlan;
pub use runtime::ContextSanitizer;
pub use runtime::CrossReferenceValidator;
pub use runtime::DecisionEngine;
pub use runtime::EngineConfig;
pub use runtime::FileGateLog;
pub use runtime::GateLog;
pub use runtime::GateLogEvent;
pub use runtime::GateLogLevel;
pub use runtime::InMemoryAuditStorage;
pub use runtime::InMemoryRuleStore;
pub use runtime::NoopGateLog;
pub use runtime::PressureConfig;
pub use runtime::PressureConfigError;
pub use runtime::PressureThresholds;
pub use runtime::PressureTracker;
pub use runtime::PressureValidator;
pub use runtime::PressureWeights;
pub use runtime::StderrGateLog;
pub use runtime::TargetPrefixPredicate;
pub use runtime::Validator;
pub use runtime::ValidatorError;
pub use runtime::standard_validators;
