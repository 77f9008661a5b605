// crates/tool-gate-store-sqlite/src/lib.rs
// ============================================================================
// Module: SQLite Audit Storage
// Description: Durable AuditStorage backend using SQLite WAL.
// Purpose: Persist Tool Gate audit entries across process restarts.
// Dependencies: tool-gate-core, rusqlite
// ============================================================================

//! ## Overview
//! This crate provides a SQLite-backed [`AuditStorage`] implementation. Entries
//! are appended to a single table keyed by an autoincrement sequence, which
//! defines the natural order returned by `find`. Database contents are
//! untrusted: decoded entries are checked against their indexed columns.
//!
//! [`AuditStorage`]: tool_gate_core::AuditStorage

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::MAX_ENTRY_BYTES;
pub use store::SqliteAuditStorage;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
