// crates/tool-gate-core/src/core/pressure.rs
// ============================================================================
// Module: Tool Gate Pressure Model
// Description: Context-pressure levels, inputs, and snapshots.
// Purpose: Define the values published by the pressure tracker.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Context pressure is a 0-100 score describing how close a session is to
//! exhausting its token budget and attention. The tracker publishes one
//! [`PressureSnapshot`] at a time; readers always see a complete snapshot.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Pressure level derived from the score.
///
/// # Invariants
/// - Ordering matches score ordering: `Normal < Elevated < High < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PressureLevel {
    /// Below the elevated threshold.
    Normal,
    /// At or above the elevated threshold.
    Elevated,
    /// At or above the high threshold.
    High,
    /// At or above the critical threshold.
    Critical,
}

impl PressureLevel {
    /// Returns a stable label for the level.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::Elevated => "ELEVATED",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for PressureLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs of a single pressure observation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PressureInputs {
    /// Tokens used divided by token budget.
    pub token_usage_ratio: f64,
    /// Messages exchanged in the session.
    pub message_count: u64,
    /// Open tasks in the session.
    pub open_tasks: u64,
}

/// Fully computed pressure state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PressureSnapshot {
    /// Score in `[0, 100]`.
    pub score: f64,
    /// Level derived from `score`.
    pub level: PressureLevel,
    /// Inputs the score was computed from.
    pub inputs: PressureInputs,
    /// Number of observations applied before this snapshot was published.
    pub generation: u64,
}

impl PressureSnapshot {
    /// Snapshot published before any observation.
    #[must_use]
    pub const fn initial() -> Self {
        Self {
            score: 0.0,
            level: PressureLevel::Normal,
            inputs: PressureInputs {
                token_usage_ratio: 0.0,
                message_count: 0,
                open_tasks: 0,
            },
            generation: 0,
        }
    }
}

impl Default for PressureSnapshot {
    fn default() -> Self {
        Self::initial()
    }
}
