// crates/tool-gate-core/src/core/mod.rs
// ============================================================================
// Module: Tool Gate Core Types
// Description: Data model for rules, requests, pressure, decisions, and audits.
// Purpose: Provide serializable records shared by every pipeline stage.
// Dependencies: serde, serde_json, time
// ============================================================================

//! ## Overview
//! Core types are plain records. They carry no behavior that depends on
//! runtime state; the runtime module owns evaluation, tracking, and storage.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod decision;
pub mod identifiers;
pub mod pressure;
pub mod request;
pub mod rule;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::AggregateRow;
pub use audit::AuditAggregation;
pub use audit::AuditDecision;
pub use audit::AuditDraft;
pub use audit::AuditEntry;
pub use audit::AuditFilter;
pub use audit::BlockRate;
pub use audit::ServiceStats;
pub use decision::Decision;
pub use decision::DecisionResponse;
pub use decision::PRESSURE_CRITICAL_RULE_ID;
pub use decision::RULE_RETRIEVAL_FAILED_RULE_ID;
pub use decision::VALIDATOR_FAILED_RULE_ID;
pub use decision::ValidationResult;
pub use identifiers::AuditId;
pub use identifiers::RuleId;
pub use identifiers::ServiceName;
pub use identifiers::ToolName;
pub use pressure::PressureInputs;
pub use pressure::PressureLevel;
pub use pressure::PressureSnapshot;
pub use request::InvocationContext;
pub use request::TokenUsage;
pub use request::ToolCallRequest;
pub use request::ToolInput;
pub use rule::PersistenceLevel;
pub use rule::Quadrant;
pub use rule::Rule;
pub use rule::RuleQuery;
pub use rule::TemporalScope;
pub use rule::VerificationRequirement;
