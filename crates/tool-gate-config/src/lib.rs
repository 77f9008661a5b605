// crates/tool-gate-config/src/lib.rs
// ============================================================================
// Module: Tool Gate Config Library
// Description: Configuration model, validation, and component wiring.
// Purpose: Single source of truth for tool-gate.toml semantics.
// Dependencies: tool-gate-core, tool-gate-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `tool-gate-config` defines the configuration model for Tool Gate. Loading
//! is strict and fails closed; a validated [`GateConfig`] converts into the
//! core runtime configurations and opens the configured audit storage and
//! log sink.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
