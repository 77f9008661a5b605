// crates/tool-gate-core/src/runtime/mod.rs
// ============================================================================
// Module: Tool Gate Runtime
// Description: Decision engine, validators, pressure tracker, and audit trail.
// Purpose: Execute the gate pipeline against injected collaborators.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! Runtime modules implement the decision pipeline. Every collaborator is
//! injected at construction; there are no process-wide singletons.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod audit;
pub mod dispatcher;
pub mod engine;
pub mod log;
pub mod pressure;
pub mod store;
pub mod validators;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::AuditError;
pub use audit::AuditTrail;
pub use audit::AuditTrailConfig;
pub use audit::ContextSanitizer;
pub use audit::DEFAULT_AUDIT_COLLECTION;
pub use audit::DEFAULT_MAX_COLLECTION_ITEMS;
pub use audit::DEFAULT_MAX_ENTRY_BYTES;
pub use audit::DEFAULT_MAX_STRING_CHARS;
pub use audit::DEFAULT_SENSITIVE_KEYS;
pub use audit::TRUNCATION_MARKER;
pub use dispatcher::AuditDispatcher;
pub use dispatcher::AuditDispatcherConfig;
pub use dispatcher::AuditDispatcherStats;
pub use engine::DecisionEngine;
pub use engine::EngineConfig;
pub use log::FileGateLog;
pub use log::GateLog;
pub use log::GateLogEvent;
pub use log::GateLogLevel;
pub use log::NoopGateLog;
pub use log::StderrGateLog;
pub use pressure::Checkpoint;
pub use pressure::CheckpointPlan;
pub use pressure::PressureConfig;
pub use pressure::PressureConfigError;
pub use pressure::PressureThresholds;
pub use pressure::PressureTracker;
pub use pressure::PressureWeights;
pub use store::InMemoryAuditStorage;
pub use store::InMemoryRuleStore;
pub use validators::BoundaryValidator;
pub use validators::CrossReferenceValidator;
pub use validators::PressureValidator;
pub use validators::TargetPrefixPredicate;
pub use validators::Validator;
pub use validators::ValidatorError;
pub use validators::standard_validators;
