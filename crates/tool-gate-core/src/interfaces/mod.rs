// crates/tool-gate-core/src/interfaces/mod.rs
// ============================================================================
// Module: Tool Gate Interfaces
// Description: Contracts for the rule store, predicates, and audit storage.
// Purpose: Define the external collaborator surfaces used by the pipeline.
// Dependencies: crate::core, thiserror
// ============================================================================

//! ## Overview
//! Interfaces describe how Tool Gate consumes external systems without
//! embedding their technology. Rule stores must be idempotent and free of
//! side effects. Predicates must be pure. Audit storage exposes exactly three
//! operations (`insert`, `find`, `aggregate`) and is otherwise opaque.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::AggregateRow;
use crate::core::AuditAggregation;
use crate::core::AuditEntry;
use crate::core::AuditFilter;
use crate::core::Rule;
use crate::core::RuleQuery;
use crate::core::ToolInput;

// ============================================================================
// SECTION: Rule Store
// ============================================================================

/// Rule retrieval errors.
#[derive(Debug, Error)]
pub enum RuleStoreError {
    /// Rule store cannot be reached.
    #[error("rule store unavailable: {0}")]
    Unavailable(String),
    /// Rule store rejected or failed the query.
    #[error("rule store query failed: {0}")]
    Query(String),
    /// Rule store did not answer within the deadline.
    #[error("rule store query timed out after {0} ms")]
    Timeout(u64),
}

/// Source of governance rules.
pub trait RuleStore: Send + Sync {
    /// Returns the rules matching the criteria, in store order.
    ///
    /// # Errors
    ///
    /// Returns [`RuleStoreError`] when the store cannot answer.
    fn query(&self, criteria: &RuleQuery) -> Result<Vec<Rule>, RuleStoreError>;
}

// ============================================================================
// SECTION: Predicates
// ============================================================================

/// Decides whether a tool input crosses the boundary a rule declares.
pub trait BoundaryPredicate: Send + Sync {
    /// Returns true when the input crosses the rule's boundary.
    fn crosses_boundary(&self, input: &ToolInput, rule: &Rule) -> bool;
}

impl<F> BoundaryPredicate for F
where
    F: Fn(&ToolInput, &Rule) -> bool + Send + Sync,
{
    fn crosses_boundary(&self, input: &ToolInput, rule: &Rule) -> bool {
        self(input, rule)
    }
}

/// Decides whether a tool input conflicts with a mandatory rule.
pub trait ConflictPredicate: Send + Sync {
    /// Returns true when the input conflicts with the rule.
    fn conflicts_with(&self, input: &ToolInput, rule: &Rule) -> bool;
}

impl<F> ConflictPredicate for F
where
    F: Fn(&ToolInput, &Rule) -> bool + Send + Sync,
{
    fn conflicts_with(&self, input: &ToolInput, rule: &Rule) -> bool {
        self(input, rule)
    }
}

// ============================================================================
// SECTION: Audit Storage
// ============================================================================

/// Audit storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Storage I/O error.
    #[error("audit storage io error: {0}")]
    Io(String),
    /// Stored data is corrupted or fails integrity checks.
    #[error("audit storage corruption: {0}")]
    Corrupt(String),
    /// Stored data version is incompatible.
    #[error("audit storage version mismatch: {0}")]
    VersionMismatch(String),
    /// Record or query is invalid.
    #[error("audit storage invalid data: {0}")]
    Invalid(String),
    /// Storage backend reported an error.
    #[error("audit storage error: {0}")]
    Store(String),
}

impl StorageError {
    /// Returns true when retrying the same operation may succeed.
    ///
    /// Invalid records, corruption, and version mismatches fail identically
    /// on every attempt.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Store(_))
    }
}

/// Backing store for audit entries.
///
/// # Invariants
/// - `insert` is atomic per entry and idempotent per `audit_id`.
/// - `find` returns entries in the store's natural order, stable across
///   repeated identical queries against unchanged data.
pub trait AuditStorage: Send + Sync {
    /// Inserts one entry into a collection.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the entry cannot be persisted.
    fn insert(&self, collection: &str, entry: &AuditEntry) -> Result<(), StorageError>;

    /// Returns the entries of a collection matching the filter.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the query fails.
    fn find(&self, collection: &str, filter: &AuditFilter)
    -> Result<Vec<AuditEntry>, StorageError>;

    /// Runs an aggregation over a collection.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the aggregation fails.
    fn aggregate(
        &self,
        collection: &str,
        pipeline: &AuditAggregation,
    ) -> Result<Vec<AggregateRow>, StorageError>;
}
