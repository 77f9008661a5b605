// crates/tool-gate-core/src/runtime/store.rs
// ============================================================================
// Module: Tool Gate In-Memory Stores
// Description: In-memory rule store and audit storage for tests and demos.
// Purpose: Provide deterministic collaborators without external dependencies.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! In-memory implementations of [`RuleStore`] and [`AuditStorage`]. Rules are
//! returned in insertion order; audit entries are kept per collection in
//! insertion order, which is the storage's natural order. Neither is intended
//! for production use.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

use crate::core::AggregateRow;
use crate::core::AuditAggregation;
use crate::core::AuditDecision;
use crate::core::AuditEntry;
use crate::core::AuditFilter;
use crate::core::Rule;
use crate::core::RuleQuery;
use crate::interfaces::AuditStorage;
use crate::interfaces::RuleStore;
use crate::interfaces::RuleStoreError;
use crate::interfaces::StorageError;

// ============================================================================
// SECTION: Rule Store
// ============================================================================

/// In-memory rule store.
#[derive(Debug, Default, Clone)]
pub struct InMemoryRuleStore {
    /// Rules in insertion order.
    rules: Arc<Mutex<Vec<Rule>>>,
}

impl InMemoryRuleStore {
    /// Creates an empty rule store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with rules.
    #[must_use]
    pub fn with_rules(rules: Vec<Rule>) -> Self {
        Self {
            rules: Arc::new(Mutex::new(rules)),
        }
    }

    /// Adds a rule, replacing any rule with the same id in place.
    ///
    /// # Errors
    ///
    /// Returns [`RuleStoreError::Unavailable`] when the store lock is poisoned.
    pub fn insert(&self, rule: Rule) -> Result<(), RuleStoreError> {
        let mut guard = self
            .rules
            .lock()
            .map_err(|_| RuleStoreError::Unavailable("rule store mutex poisoned".to_string()))?;
        if let Some(existing) = guard.iter_mut().find(|existing| existing.id == rule.id) {
            *existing = rule;
        } else {
            guard.push(rule);
        }
        drop(guard);
        Ok(())
    }
}

impl RuleStore for InMemoryRuleStore {
    fn query(&self, criteria: &RuleQuery) -> Result<Vec<Rule>, RuleStoreError> {
        let guard = self
            .rules
            .lock()
            .map_err(|_| RuleStoreError::Unavailable("rule store mutex poisoned".to_string()))?;
        Ok(guard.iter().filter(|rule| criteria.matches(rule)).cloned().collect())
    }
}

// ============================================================================
// SECTION: Audit Storage
// ============================================================================

/// In-memory audit storage keyed by collection.
#[derive(Debug, Default, Clone)]
pub struct InMemoryAuditStorage {
    /// Entries per collection in insertion order.
    collections: Arc<Mutex<BTreeMap<String, Vec<AuditEntry>>>>,
}

impl InMemoryAuditStorage {
    /// Creates empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuditStorage for InMemoryAuditStorage {
    fn insert(&self, collection: &str, entry: &AuditEntry) -> Result<(), StorageError> {
        let mut guard = self
            .collections
            .lock()
            .map_err(|_| StorageError::Store("audit storage mutex poisoned".to_string()))?;
        let entries = guard.entry(collection.to_string()).or_default();
        if !entries.iter().any(|existing| existing.audit_id == entry.audit_id) {
            entries.push(entry.clone());
        }
        drop(guard);
        Ok(())
    }

    fn find(
        &self,
        collection: &str,
        filter: &AuditFilter,
    ) -> Result<Vec<AuditEntry>, StorageError> {
        let guard = self
            .collections
            .lock()
            .map_err(|_| StorageError::Store("audit storage mutex poisoned".to_string()))?;
        Ok(guard
            .get(collection)
            .map(|entries| entries.iter().filter(|entry| filter.matches(entry)).cloned().collect())
            .unwrap_or_default())
    }

    fn aggregate(
        &self,
        collection: &str,
        pipeline: &AuditAggregation,
    ) -> Result<Vec<AggregateRow>, StorageError> {
        let guard = self
            .collections
            .lock()
            .map_err(|_| StorageError::Store("audit storage mutex poisoned".to_string()))?;
        match pipeline {
            AuditAggregation::ServiceTotals => {
                let mut groups: BTreeMap<String, (u64, u64)> = BTreeMap::new();
                for entry in guard.get(collection).into_iter().flatten() {
                    let counts = groups.entry(entry.service.as_str().to_string()).or_default();
                    counts.0 += 1;
                    if entry.decision == AuditDecision::Block {
                        counts.1 += 1;
                    }
                }
                drop(guard);
                let mut rows: Vec<AggregateRow> = groups
                    .into_iter()
                    .map(|(key, (total, blocks))| AggregateRow {
                        key,
                        total,
                        blocks,
                    })
                    .collect();
                rows.sort_by(|left, right| {
                    right.total.cmp(&left.total).then_with(|| left.key.cmp(&right.key))
                });
                Ok(rows)
            }
        }
    }
}
