// crates/tool-gate-core/src/runtime/pressure.rs
// ============================================================================
// Module: Tool Gate Pressure Tracker
// Description: Weighted context-pressure scoring and level thresholds.
// Purpose: Publish complete pressure snapshots to concurrent readers.
// Dependencies: crate::core, crate::runtime::log, thiserror
// ============================================================================

//! ## Overview
//! [`PressureTracker`] is a live state machine over [`PressureSnapshot`]. Each
//! [`PressureTracker::observe`] call recomputes the score from token usage,
//! message count, and open tasks, derives the level from the configured
//! thresholds, and replaces the published snapshot in one pointer swap.
//! Readers clone the current `Arc` and never see a torn score/level pair.
//! Concurrent observations serialize on the swap; the last applied wins.
//!
//! [`CheckpointPlan`] derives token checkpoints from a session budget.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;

use thiserror::Error;

use crate::core::PressureInputs;
use crate::core::PressureLevel;
use crate::core::PressureSnapshot;
use crate::runtime::log::GateLog;
use crate::runtime::log::GateLogEvent;
use crate::runtime::log::GateLogLevel;
use crate::runtime::log::NoopGateLog;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Upper bound of the pressure score.
pub const MAX_PRESSURE_SCORE: f64 = 100.0;
/// Default elevated threshold.
pub const DEFAULT_ELEVATED_THRESHOLD: f64 = 40.0;
/// Default high threshold.
pub const DEFAULT_HIGH_THRESHOLD: f64 = 70.0;
/// Default critical threshold.
pub const DEFAULT_CRITICAL_THRESHOLD: f64 = 90.0;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Pressure configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PressureConfigError {
    /// Configuration is internally inconsistent.
    #[error("invalid pressure config: {0}")]
    Invalid(String),
}

/// Lower bounds (inclusive) of each non-normal level.
///
/// # Invariants
/// - `0 < elevated < high < critical <= 100` once validated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PressureThresholds {
    /// Lower bound of `Elevated`.
    pub elevated: f64,
    /// Lower bound of `High`.
    pub high: f64,
    /// Lower bound of `Critical`.
    pub critical: f64,
}

impl Default for PressureThresholds {
    fn default() -> Self {
        Self {
            elevated: DEFAULT_ELEVATED_THRESHOLD,
            high: DEFAULT_HIGH_THRESHOLD,
            critical: DEFAULT_CRITICAL_THRESHOLD,
        }
    }
}

impl PressureThresholds {
    /// Validates ordering and range.
    ///
    /// # Errors
    ///
    /// Returns [`PressureConfigError`] when thresholds overlap, are not
    /// ascending, or fall outside `(0, 100]`.
    pub fn validate(&self) -> Result<(), PressureConfigError> {
        let values = [self.elevated, self.high, self.critical];
        if values.iter().any(|value| !value.is_finite()) {
            return Err(PressureConfigError::Invalid("thresholds must be finite".to_string()));
        }
        if self.elevated <= 0.0 || self.critical > MAX_PRESSURE_SCORE {
            return Err(PressureConfigError::Invalid(
                "thresholds must fall within (0, 100]".to_string(),
            ));
        }
        if !(self.elevated < self.high && self.high < self.critical) {
            return Err(PressureConfigError::Invalid(
                "thresholds must be strictly ascending: elevated < high < critical".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the level for a score.
    #[must_use]
    pub fn level_for(&self, score: f64) -> PressureLevel {
        if score >= self.critical {
            PressureLevel::Critical
        } else if score >= self.high {
            PressureLevel::High
        } else if score >= self.elevated {
            PressureLevel::Elevated
        } else {
            PressureLevel::Normal
        }
    }
}

/// Weights and normalization capacities of the score function.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PressureWeights {
    /// Weight of the token usage ratio.
    pub token_weight: f64,
    /// Weight of the message count component.
    pub message_weight: f64,
    /// Weight of the open task component.
    pub task_weight: f64,
    /// Message count at which the message component saturates.
    pub message_capacity: u64,
    /// Open task count at which the task component saturates.
    pub task_capacity: u64,
}

impl Default for PressureWeights {
    fn default() -> Self {
        Self {
            token_weight: 0.5,
            message_weight: 0.3,
            task_weight: 0.2,
            message_capacity: 200,
            task_capacity: 20,
        }
    }
}

impl PressureWeights {
    /// Validates weights and capacities.
    ///
    /// # Errors
    ///
    /// Returns [`PressureConfigError`] when a weight is negative or not finite,
    /// all weights are zero, or a capacity is zero.
    pub fn validate(&self) -> Result<(), PressureConfigError> {
        let weights = [self.token_weight, self.message_weight, self.task_weight];
        if weights.iter().any(|weight| !weight.is_finite() || *weight < 0.0) {
            return Err(PressureConfigError::Invalid(
                "weights must be finite and non-negative".to_string(),
            ));
        }
        if weights.iter().sum::<f64>() <= 0.0 {
            return Err(PressureConfigError::Invalid(
                "at least one weight must be positive".to_string(),
            ));
        }
        if self.message_capacity == 0 || self.task_capacity == 0 {
            return Err(PressureConfigError::Invalid(
                "message_capacity and task_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Computes the score for the inputs.
    ///
    /// Each component is normalized to `[0, 1]` and the weighted mean is
    /// scaled to `[0, 100]`. A non-finite token ratio counts as exhausted.
    #[must_use]
    pub fn score(&self, inputs: &PressureInputs) -> f64 {
        let tokens = if inputs.token_usage_ratio.is_finite() {
            inputs.token_usage_ratio.clamp(0.0, 1.0)
        } else {
            1.0
        };
        let messages = saturating_ratio(inputs.message_count, self.message_capacity);
        let tasks = saturating_ratio(inputs.open_tasks, self.task_capacity);
        let total_weight = self.token_weight + self.message_weight + self.task_weight;
        if total_weight <= 0.0 {
            return MAX_PRESSURE_SCORE;
        }
        let weighted = self.token_weight * tokens
            + self.message_weight * messages
            + self.task_weight * tasks;
        (weighted / total_weight * MAX_PRESSURE_SCORE).clamp(0.0, MAX_PRESSURE_SCORE)
    }
}

/// Complete tracker configuration.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PressureConfig {
    /// Score weights.
    pub weights: PressureWeights,
    /// Level thresholds.
    pub thresholds: PressureThresholds,
}

impl PressureConfig {
    /// Validates weights and thresholds.
    ///
    /// # Errors
    ///
    /// Returns [`PressureConfigError`] when either part is invalid.
    pub fn validate(&self) -> Result<(), PressureConfigError> {
        self.weights.validate()?;
        self.thresholds.validate()
    }
}

// ============================================================================
// SECTION: Tracker
// ============================================================================

/// Session-scoped context-pressure tracker.
pub struct PressureTracker {
    /// Validated configuration.
    config: PressureConfig,
    /// Published snapshot; replaced wholesale on every observation.
    snapshot: RwLock<Arc<PressureSnapshot>>,
    /// Operational log for level transitions.
    log: Arc<dyn GateLog>,
}

impl PressureTracker {
    /// Creates a tracker publishing the initial snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`PressureConfigError`] when the configuration is invalid.
    pub fn new(config: PressureConfig) -> Result<Self, PressureConfigError> {
        Self::with_log(config, Arc::new(NoopGateLog))
    }

    /// Creates a tracker that reports level transitions to `log`.
    ///
    /// # Errors
    ///
    /// Returns [`PressureConfigError`] when the configuration is invalid.
    pub fn with_log(
        config: PressureConfig,
        log: Arc<dyn GateLog>,
    ) -> Result<Self, PressureConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            snapshot: RwLock::new(Arc::new(PressureSnapshot::initial())),
            log,
        })
    }

    /// Returns the tracker configuration.
    #[must_use]
    pub const fn config(&self) -> &PressureConfig {
        &self.config
    }

    /// Returns the latest fully computed snapshot.
    #[must_use]
    pub fn current(&self) -> Arc<PressureSnapshot> {
        let guard = self.snapshot.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Recomputes the score from a new observation and publishes it.
    #[must_use = "the applied snapshot reports the new level"]
    pub fn observe(
        &self,
        token_usage_ratio: f64,
        message_count: u64,
        open_tasks: u64,
    ) -> Arc<PressureSnapshot> {
        self.observe_inputs(PressureInputs {
            token_usage_ratio,
            message_count,
            open_tasks,
        })
    }

    /// Recomputes the score from prepared inputs and publishes it.
    #[must_use = "the applied snapshot reports the new level"]
    pub fn observe_inputs(&self, inputs: PressureInputs) -> Arc<PressureSnapshot> {
        let score = self.config.weights.score(&inputs);
        let level = self.config.thresholds.level_for(score);
        let (previous_level, applied) = {
            let mut guard = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
            let previous_level = guard.level;
            let applied = Arc::new(PressureSnapshot {
                score,
                level,
                inputs,
                generation: guard.generation.saturating_add(1),
            });
            *guard = Arc::clone(&applied);
            drop(guard);
            (previous_level, applied)
        };
        if previous_level != level {
            let severity =
                if level >= PressureLevel::High { GateLogLevel::Warn } else { GateLogLevel::Info };
            self.log.emit(
                &GateLogEvent::new(
                    "pressure_level_changed",
                    severity,
                    format!("context pressure {previous_level} -> {level}"),
                )
                .with_field("from", previous_level.as_str())
                .with_field("to", level.as_str())
                .with_field("score", score),
            );
        }
        applied
    }
}

/// Returns `count / capacity` clamped to `[0, 1]`.
#[allow(clippy::cast_precision_loss, reason = "Counts stay far below 2^52.")]
fn saturating_ratio(count: u64, capacity: u64) -> f64 {
    if capacity == 0 {
        return 1.0;
    }
    (count as f64 / capacity as f64).min(1.0)
}

// ============================================================================
// SECTION: Checkpoints
// ============================================================================

/// Token checkpoint within a session budget.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Checkpoint {
    /// Budget percentage of the checkpoint.
    pub percentage: f64,
    /// Token count at which the checkpoint is reached.
    pub tokens: u64,
}

/// Checkpoints derived from a token budget and fractional intervals.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointPlan {
    /// Session token budget.
    token_budget: u64,
    /// Checkpoints in ascending token order.
    checkpoints: Vec<Checkpoint>,
}

impl CheckpointPlan {
    /// Builds the plan; each checkpoint sits at `floor(budget * interval)`.
    ///
    /// # Errors
    ///
    /// Returns [`PressureConfigError`] when the budget is zero or intervals are
    /// not strictly ascending within `(0, 1)`.
    pub fn from_budget(token_budget: u64, intervals: &[f64]) -> Result<Self, PressureConfigError> {
        if token_budget == 0 {
            return Err(PressureConfigError::Invalid(
                "checkpoint token_budget must be greater than zero".to_string(),
            ));
        }
        let mut previous = 0.0;
        let mut checkpoints = Vec::with_capacity(intervals.len());
        for interval in intervals {
            if !interval.is_finite() || *interval <= previous || *interval >= 1.0 {
                return Err(PressureConfigError::Invalid(
                    "checkpoint intervals must be strictly ascending within (0, 1)".to_string(),
                ));
            }
            previous = *interval;
            checkpoints.push(Checkpoint {
                percentage: interval * 100.0,
                tokens: budget_fraction(token_budget, *interval),
            });
        }
        Ok(Self {
            token_budget,
            checkpoints,
        })
    }

    /// Returns the token budget.
    #[must_use]
    pub const fn token_budget(&self) -> u64 {
        self.token_budget
    }

    /// Returns all checkpoints.
    #[must_use]
    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.checkpoints
    }

    /// Returns the first checkpoint strictly above `tokens_used`.
    #[must_use]
    pub fn next_after(&self, tokens_used: u64) -> Option<&Checkpoint> {
        self.checkpoints.iter().find(|checkpoint| checkpoint.tokens > tokens_used)
    }
}

/// Returns `floor(budget * fraction)` for a fraction in `(0, 1)`.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "Fraction is validated within (0, 1), so the product fits in u64."
)]
fn budget_fraction(budget: u64, fraction: f64) -> u64 {
    (budget as f64 * fraction).floor() as u64
}
