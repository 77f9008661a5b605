// crates/tool-gate-core/src/core/request.rs
// ============================================================================
// Module: Tool Gate Requests
// Description: Proposed tool invocations and their invocation context.
// Purpose: Give validators typed projections of the fields they read.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! A [`ToolCallRequest`] is transient and scoped to one decision. The tool
//! input is an opaque key-value mapping. The invocation context exposes the
//! fields the pipeline reads (token counters, message and task counts, the
//! user override flag) as typed projections and keeps everything else in an
//! opaque residual mapping.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::core::identifiers::ToolName;
use crate::core::pressure::PressureInputs;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Opaque structured tool input.
pub type ToolInput = Map<String, Value>;

/// Token usage counters reported by the agent host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens consumed so far.
    pub used: u64,
    /// Total token budget for the session.
    pub budget: u64,
}

impl TokenUsage {
    /// Returns the used/budget ratio. A zero budget counts as exhausted.
    #[must_use]
    #[allow(clippy::cast_precision_loss, reason = "Token counts stay far below 2^52.")]
    pub fn ratio(&self) -> f64 {
        if self.budget == 0 {
            return 1.0;
        }
        self.used as f64 / self.budget as f64
    }
}

/// Invocation context attached to a tool call.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InvocationContext {
    /// Token usage counters, when the host reports them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
    /// Messages exchanged so far in the session.
    #[serde(default)]
    pub message_count: u64,
    /// Open task count.
    #[serde(default)]
    pub open_tasks: u64,
    /// User override flag; the only escape hatch for critical pressure.
    #[serde(default)]
    pub user_override: bool,
    /// Fields the pipeline does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl InvocationContext {
    /// Returns pressure inputs when the context carries token counters.
    #[must_use]
    pub fn pressure_inputs(&self) -> Option<PressureInputs> {
        self.token_usage.map(|usage| PressureInputs {
            token_usage_ratio: usage.ratio(),
            message_count: self.message_count,
            open_tasks: self.open_tasks,
        })
    }
}

/// Proposed tool invocation awaiting a decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Tool name.
    pub tool: ToolName,
    /// Structured tool input.
    #[serde(default)]
    pub input: ToolInput,
    /// Invocation context.
    #[serde(default)]
    pub context: InvocationContext,
}

impl ToolCallRequest {
    /// Creates a request from its parts.
    #[must_use]
    pub fn new(tool: impl Into<ToolName>, input: ToolInput, context: InvocationContext) -> Self {
        Self {
            tool: tool.into(),
            input,
            context,
        }
    }
}
