// crates/tool-gate-core/tests/pressure.rs
// ============================================================================
// Module: Pressure Tracker Tests
// Description: Level thresholds, score monotonicity, and atomic publication.
// Purpose: Ensure snapshots are consistent under concurrent observation.
// ============================================================================

//! ## Overview
//! Validates threshold boundaries, configuration validation, the monotonic
//! score property, concurrent observation, and checkpoint planning.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    clippy::float_cmp,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::sync::Arc;
use std::sync::Mutex;
use std::thread;

use proptest::prelude::*;
use tool_gate_core::CheckpointPlan;
use tool_gate_core::GateLog;
use tool_gate_core::GateLogEvent;
use tool_gate_core::PressureConfig;
use tool_gate_core::PressureConfigError;
use tool_gate_core::PressureInputs;
use tool_gate_core::PressureLevel;
use tool_gate_core::PressureThresholds;
use tool_gate_core::PressureTracker;
use tool_gate_core::PressureWeights;

#[derive(Default)]
struct RecordingLog {
    events: Mutex<Vec<GateLogEvent>>,
}

impl GateLog for RecordingLog {
    fn emit(&self, event: &GateLogEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

fn tracker() -> PressureTracker {
    PressureTracker::new(PressureConfig::default()).unwrap()
}

// ============================================================================
// SECTION: Levels
// ============================================================================

#[test]
fn initial_snapshot_is_normal() {
    let snapshot = tracker().current();
    assert_eq!(snapshot.level, PressureLevel::Normal);
    assert_eq!(snapshot.score, 0.0);
    assert_eq!(snapshot.generation, 0);
}

#[test]
fn threshold_lower_bounds_are_inclusive() {
    let thresholds = PressureThresholds::default();
    assert_eq!(thresholds.level_for(39.99), PressureLevel::Normal);
    assert_eq!(thresholds.level_for(40.0), PressureLevel::Elevated);
    assert_eq!(thresholds.level_for(69.99), PressureLevel::Elevated);
    assert_eq!(thresholds.level_for(70.0), PressureLevel::High);
    assert_eq!(thresholds.level_for(89.99), PressureLevel::High);
    assert_eq!(thresholds.level_for(90.0), PressureLevel::Critical);
    assert_eq!(thresholds.level_for(100.0), PressureLevel::Critical);
}

#[test]
fn saturated_inputs_reach_critical() {
    let tracker = tracker();
    let snapshot = tracker.observe(0.9, 200, 20);
    assert!(snapshot.score >= 90.0);
    assert_eq!(snapshot.level, PressureLevel::Critical);
    assert_eq!(tracker.current().as_ref(), snapshot.as_ref());
}

#[test]
fn score_uses_configured_weights() {
    let config = PressureConfig {
        weights: PressureWeights {
            token_weight: 1.0,
            message_weight: 0.0,
            task_weight: 0.0,
            ..PressureWeights::default()
        },
        ..PressureConfig::default()
    };
    let tracker = PressureTracker::new(config).unwrap();
    let snapshot = tracker.observe(0.5, 10_000, 10_000);
    assert!((snapshot.score - 50.0).abs() < 1e-9);
    assert_eq!(snapshot.level, PressureLevel::Elevated);
}

#[test]
fn non_finite_token_ratio_counts_as_exhausted() {
    let weights = PressureWeights::default();
    let inputs = PressureInputs {
        token_usage_ratio: f64::NAN,
        message_count: 0,
        open_tasks: 0,
    };
    assert!((weights.score(&inputs) - 50.0).abs() < 1e-9);
}

#[test]
fn level_changes_are_logged_once_per_transition() {
    let log = Arc::new(RecordingLog::default());
    let tracker = PressureTracker::with_log(PressureConfig::default(), log.clone()).unwrap();
    let _ = tracker.observe(0.1, 1, 0);
    let _ = tracker.observe(1.0, 200, 20);
    let _ = tracker.observe(1.0, 200, 20);
    let events = log.events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event, "pressure_level_changed");
    assert_eq!(events[0].fields["to"], "CRITICAL");
}

// ============================================================================
// SECTION: Configuration
// ============================================================================

#[test]
fn overlapping_thresholds_are_rejected() {
    let config = PressureConfig {
        thresholds: PressureThresholds {
            elevated: 50.0,
            high: 50.0,
            critical: 90.0,
        },
        ..PressureConfig::default()
    };
    assert!(matches!(PressureTracker::new(config), Err(PressureConfigError::Invalid(_))));
}

#[test]
fn critical_above_range_is_rejected() {
    let thresholds = PressureThresholds {
        elevated: 40.0,
        high: 70.0,
        critical: 120.0,
    };
    assert!(thresholds.validate().is_err());
}

#[test]
fn all_zero_weights_are_rejected() {
    let weights = PressureWeights {
        token_weight: 0.0,
        message_weight: 0.0,
        task_weight: 0.0,
        ..PressureWeights::default()
    };
    assert!(weights.validate().is_err());
}

#[test]
fn zero_capacity_is_rejected() {
    let weights = PressureWeights {
        message_capacity: 0,
        ..PressureWeights::default()
    };
    assert!(weights.validate().is_err());
}

// ============================================================================
// SECTION: Concurrency
// ============================================================================

#[test]
fn concurrent_observations_publish_consistent_snapshots() {
    let tracker = Arc::new(tracker());
    let thresholds = tracker.config().thresholds;
    thread::scope(|scope| {
        for worker in 0 .. 4_u64 {
            let tracker = Arc::clone(&tracker);
            scope.spawn(move || {
                for step in 0 .. 250_u64 {
                    let percent = u32::try_from((worker * 250 + step) % 100).unwrap();
                    let ratio = f64::from(percent) / 100.0;
                    let _ = tracker.observe(ratio, step, worker);
                }
            });
        }
        for _ in 0 .. 4 {
            let tracker = Arc::clone(&tracker);
            scope.spawn(move || {
                for _ in 0 .. 500 {
                    let snapshot = tracker.current();
                    assert_eq!(thresholds.level_for(snapshot.score), snapshot.level);
                }
            });
        }
    });
    assert_eq!(tracker.current().generation, 1_000);
}

// ============================================================================
// SECTION: Checkpoints
// ============================================================================

#[test]
fn checkpoints_follow_budget_intervals() {
    let plan = CheckpointPlan::from_budget(200_000, &[0.25, 0.5, 0.75]).unwrap();
    let tokens: Vec<u64> = plan.checkpoints().iter().map(|checkpoint| checkpoint.tokens).collect();
    assert_eq!(tokens, vec![50_000, 100_000, 150_000]);
    assert_eq!(plan.next_after(0).unwrap().tokens, 50_000);
    assert_eq!(plan.next_after(50_000).unwrap().tokens, 100_000);
    assert!(plan.next_after(150_000).is_none());
    assert_eq!(plan.token_budget(), 200_000);
}

#[test]
fn checkpoint_intervals_must_ascend_within_unit_range() {
    assert!(CheckpointPlan::from_budget(1_000, &[0.5, 0.25]).is_err());
    assert!(CheckpointPlan::from_budget(1_000, &[0.5, 1.0]).is_err());
    assert!(CheckpointPlan::from_budget(0, &[0.5]).is_err());
}

// ============================================================================
// SECTION: Properties
// ============================================================================

proptest! {
    #[test]
    fn score_is_monotonic_in_each_input(
        ratio in 0.0_f64 .. 1.0,
        messages in 0_u64 .. 400,
        tasks in 0_u64 .. 40,
        bump in 1_u64 .. 50,
    ) {
        let weights = PressureWeights::default();
        let base = PressureInputs {
            token_usage_ratio: ratio,
            message_count: messages,
            open_tasks: tasks,
        };
        let score = weights.score(&base);
        prop_assert!((0.0 ..= 100.0).contains(&score));

        let more_tokens = PressureInputs { token_usage_ratio: (ratio + 0.1).min(1.0), ..base };
        let more_messages = PressureInputs { message_count: messages + bump, ..base };
        let more_tasks = PressureInputs { open_tasks: tasks + bump, ..base };
        prop_assert!(weights.score(&more_tokens) >= score);
        prop_assert!(weights.score(&more_messages) >= score);
        prop_assert!(weights.score(&more_tasks) >= score);
    }

    #[test]
    fn level_is_monotonic_in_score(a in 0.0_f64 .. 100.0, b in 0.0_f64 .. 100.0) {
        let thresholds = PressureThresholds::default();
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(thresholds.level_for(low) <= thresholds.level_for(high));
    }
}
