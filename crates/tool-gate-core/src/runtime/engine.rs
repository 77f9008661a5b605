// crates/tool-gate-core/src/runtime/engine.rs
// ============================================================================
// Module: Tool Gate Decision Engine
// Description: Rule retrieval, ordered validation, and decision auditing.
// Purpose: Produce one fail-closed allow/block decision per tool call.
// Dependencies: crate::core, crate::interfaces, crate::runtime, time
// ============================================================================

//! ## Overview
//! [`DecisionEngine::evaluate`] runs the gate pipeline for one tool call:
//!
//! 1. Optionally feed the context's counters into the pressure tracker.
//! 2. Query the rule store for active rules at the `High` persistence floor,
//!    bounded by the configured timeout. Returned rules are re-checked
//!    against the query, so a store that ignores its criteria cannot feed
//!    inactive or out-of-scope rules to the validators.
//! 3. Run validators in declared order; the first block short-circuits.
//! 4. Submit the audit entry to the dispatcher and return the decision.
//!
//! The engine holds no mutable state. Rule store failures, timeouts, panics,
//! and validator failures all block the call with a distinguishable reason.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::panic::AssertUnwindSafe;
use std::panic::catch_unwind;
use std::sync::Arc;
use std::sync::mpsc;
use std::sync::mpsc::RecvTimeoutError;
use std::thread;
use std::time::Duration;

use serde_json::Map;
use serde_json::Value;
use time::OffsetDateTime;

use crate::core::AuditDecision;
use crate::core::AuditDraft;
use crate::core::Decision;
use crate::core::InvocationContext;
use crate::core::PressureSnapshot;
use crate::core::RULE_RETRIEVAL_FAILED_RULE_ID;
use crate::core::Rule;
use crate::core::RuleId;
use crate::core::RuleQuery;
use crate::core::ServiceName;
use crate::core::ToolCallRequest;
use crate::core::ToolInput;
use crate::core::ToolName;
use crate::core::VALIDATOR_FAILED_RULE_ID;
use crate::core::ValidationResult;
use crate::interfaces::RuleStore;
use crate::interfaces::RuleStoreError;
use crate::runtime::dispatcher::AuditDispatcher;
use crate::runtime::dispatcher::panic_detail;
use crate::runtime::log::GateLog;
use crate::runtime::log::GateLogEvent;
use crate::runtime::log::GateLogLevel;
use crate::runtime::log::NoopGateLog;
use crate::runtime::pressure::PressureTracker;
use crate::runtime::validators::Validator;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default audit service name for engine decisions.
pub const DEFAULT_SERVICE_NAME: &str = "ToolGate";
/// Default rule query timeout.
pub const DEFAULT_RULE_QUERY_TIMEOUT: Duration = Duration::from_secs(2);

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Decision engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Service name recorded on audit entries.
    pub service: ServiceName,
    /// Deadline for one rule store query.
    pub rule_query_timeout: Duration,
    /// Feed context token counters into the pressure tracker before
    /// validating.
    pub observe_context: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            service: ServiceName::new(DEFAULT_SERVICE_NAME),
            rule_query_timeout: DEFAULT_RULE_QUERY_TIMEOUT,
            observe_context: true,
        }
    }
}

// ============================================================================
// SECTION: Engine
// ============================================================================

/// Outcome of the validation stage.
struct Outcome {
    /// Blocking result, first advisory, or a plain pass.
    result: ValidationResult,
    /// Rules returned by the store.
    rules_matched: usize,
    /// Validators that ran before the pipeline stopped.
    validators_run: usize,
}

/// Governance gate for agent tool calls.
///
/// # Invariants
/// - Validators run in the order given at construction.
/// - Every evaluation submits exactly one audit draft.
pub struct DecisionEngine {
    /// Engine configuration.
    config: EngineConfig,
    /// Rule store collaborator.
    rules: Arc<dyn RuleStore>,
    /// Shared pressure tracker.
    pressure: Arc<PressureTracker>,
    /// Background audit writer.
    audit: Arc<AuditDispatcher>,
    /// Validators in pipeline order.
    validators: Vec<Box<dyn Validator>>,
    /// Operational log.
    log: Arc<dyn GateLog>,
}

impl DecisionEngine {
    /// Creates an engine from explicit collaborators.
    #[must_use]
    pub fn new(
        config: EngineConfig,
        rules: Arc<dyn RuleStore>,
        pressure: Arc<PressureTracker>,
        audit: Arc<AuditDispatcher>,
        validators: Vec<Box<dyn Validator>>,
    ) -> Self {
        Self {
            config,
            rules,
            pressure,
            audit,
            validators,
            log: Arc::new(NoopGateLog),
        }
    }

    /// Replaces the operational log.
    #[must_use]
    pub fn with_log(mut self, log: Arc<dyn GateLog>) -> Self {
        self.log = log;
        self
    }

    /// Returns the engine configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the pressure tracker.
    #[must_use]
    pub const fn pressure(&self) -> &Arc<PressureTracker> {
        &self.pressure
    }

    /// Returns the audit dispatcher.
    #[must_use]
    pub const fn audit(&self) -> &Arc<AuditDispatcher> {
        &self.audit
    }

    /// Evaluates a proposed tool call.
    #[must_use]
    pub fn evaluate(
        &self,
        tool: impl Into<ToolName>,
        input: ToolInput,
        context: InvocationContext,
    ) -> Decision {
        self.evaluate_request(&ToolCallRequest::new(tool, input, context))
    }

    /// Evaluates a prepared request.
    #[must_use]
    pub fn evaluate_request(&self, request: &ToolCallRequest) -> Decision {
        let evaluated_at = OffsetDateTime::now_utc();
        if self.config.observe_context
            && let Some(inputs) = request.context.pressure_inputs()
        {
            let _ = self.pressure.observe_inputs(inputs);
        }
        let pressure = self.pressure.current();

        let query =
            RuleQuery::for_tool(request.tool.clone(), request.context.clone(), evaluated_at);
        let outcome = match self.fetch_rules(&query) {
            Ok(rules) => {
                let rules = self.candidate_rules(&query, rules);
                self.run_validators(request, &rules, &pressure)
            }
            Err(err) => {
                self.log.emit(
                    &GateLogEvent::new(
                        "rule_retrieval_failed",
                        GateLogLevel::Error,
                        "rule retrieval failed; blocking call",
                    )
                    .with_field("tool", request.tool.as_str())
                    .with_field("error", err.to_string()),
                );
                Outcome {
                    result: ValidationResult::block(
                        format!("Rule retrieval failed: {err}"),
                        Some(RuleId::new(RULE_RETRIEVAL_FAILED_RULE_ID)),
                    ),
                    rules_matched: 0,
                    validators_run: 0,
                }
            }
        };

        let audit_decision = if outcome.result.blocked {
            AuditDecision::Block
        } else if outcome.result.is_advisory() {
            AuditDecision::Warn
        } else {
            AuditDecision::Allow
        };
        let draft = self.audit_draft(request, &outcome, &pressure, audit_decision, evaluated_at);
        let audit_id = self.audit.submit(draft);

        let mut event = GateLogEvent::new(
            "decision_evaluated",
            GateLogLevel::Info,
            format!("tool call {audit_decision}"),
        )
        .with_field("tool", request.tool.as_str())
        .with_field("decision", audit_decision.as_str())
        .with_field("pressure_level", pressure.level.as_str());
        if let Some(rule_id) = &outcome.result.rule_id {
            event = event.with_field("rule_id", rule_id.as_str());
        }
        if let Some(reason) = &outcome.result.reason {
            event = event.with_field("reason", reason.as_str());
        }
        if let Some(audit_id) = &audit_id {
            event = event.with_field("audit_id", audit_id.as_str());
        }
        self.log.emit(&event);

        if outcome.result.blocked {
            Decision::blocked_by(outcome.result, evaluated_at)
        } else {
            Decision::allow(evaluated_at)
        }
    }

    /// Queries the rule store, bounded by the configured timeout.
    fn fetch_rules(&self, query: &RuleQuery) -> Result<Vec<Rule>, RuleStoreError> {
        let timeout = self.config.rule_query_timeout;
        let query = query.clone();
        let store = Arc::clone(&self.rules);
        let (sender, receiver) = mpsc::sync_channel(1);
        thread::Builder::new()
            .name("tool-gate-rule-query".to_string())
            .spawn(move || {
                let _ = sender.send(guarded_query(store.as_ref(), &query));
            })
            .map_err(|err| RuleStoreError::Unavailable(format!("query thread: {err}")))?;
        match receiver.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                Err(RuleStoreError::Timeout(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)))
            }
            Err(RecvTimeoutError::Disconnected) => {
                Err(RuleStoreError::Unavailable("query thread exited without a result".to_string()))
            }
        }
    }

    /// Keeps only rules that satisfy the query criteria.
    fn candidate_rules(&self, query: &RuleQuery, mut rules: Vec<Rule>) -> Vec<Rule> {
        let returned = rules.len();
        rules.retain(|rule| query.matches(rule));
        let discarded = returned - rules.len();
        if discarded > 0 {
            self.log.emit(
                &GateLogEvent::new(
                    "rules_discarded",
                    GateLogLevel::Warn,
                    "rule store returned rules outside the query criteria",
                )
                .with_field("tool", query.tool.as_str())
                .with_field("discarded", discarded),
            );
        }
        rules
    }

    /// Runs validators in order; the first block wins.
    fn run_validators(
        &self,
        request: &ToolCallRequest,
        rules: &[Rule],
        pressure: &PressureSnapshot,
    ) -> Outcome {
        let mut advisory = None;
        for (index, validator) in self.validators.iter().enumerate() {
            let result = match catch_unwind(AssertUnwindSafe(|| {
                validator.validate(request, rules, pressure)
            })) {
                Ok(Ok(result)) => result,
                Ok(Err(err)) => self.validator_failed(request, validator.name(), &err.to_string()),
                Err(payload) => {
                    let detail = panic_detail(payload.as_ref());
                    self.validator_failed(request, validator.name(), &detail)
                }
            };
            if result.blocked {
                return Outcome {
                    result,
                    rules_matched: rules.len(),
                    validators_run: index + 1,
                };
            }
            if advisory.is_none() && result.is_advisory() {
                advisory = Some(result);
            }
        }
        Outcome {
            result: advisory.unwrap_or_else(ValidationResult::pass),
            rules_matched: rules.len(),
            validators_run: self.validators.len(),
        }
    }

    /// Logs a validator failure and converts it into a block.
    fn validator_failed(
        &self,
        request: &ToolCallRequest,
        name: &str,
        detail: &str,
    ) -> ValidationResult {
        self.log.emit(
            &GateLogEvent::new(
                "validator_failed",
                GateLogLevel::Error,
                format!("validator {name} failed; blocking call"),
            )
            .with_field("tool", request.tool.as_str())
            .with_field("validator", name)
            .with_field("error", detail),
        );
        ValidationResult::block(
            format!("Validator {name} failed: {detail}"),
            Some(RuleId::new(VALIDATOR_FAILED_RULE_ID)),
        )
    }

    /// Builds the audit draft for one decision.
    fn audit_draft(
        &self,
        request: &ToolCallRequest,
        outcome: &Outcome,
        pressure: &PressureSnapshot,
        decision: AuditDecision,
        evaluated_at: OffsetDateTime,
    ) -> AuditDraft {
        let mut context = Map::new();
        context.insert("tool".to_string(), Value::from(request.tool.as_str()));
        context.insert("input".to_string(), Value::Object(request.input.clone()));
        if let Ok(invocation) = serde_json::to_value(&request.context) {
            context.insert("invocation".to_string(), invocation);
        }

        let mut metadata = Map::new();
        metadata.insert("pressure_level".to_string(), Value::from(pressure.level.as_str()));
        metadata.insert("pressure_score".to_string(), Value::from(pressure.score));
        metadata.insert("pressure_generation".to_string(), Value::from(pressure.generation));
        metadata.insert("rules_matched".to_string(), Value::from(outcome.rules_matched));
        metadata.insert("validators_run".to_string(), Value::from(outcome.validators_run));
        metadata.insert("user_override".to_string(), Value::from(request.context.user_override));

        let mut draft = AuditDraft::new(self.config.service.clone(), decision)
            .with_context(context)
            .with_metadata(metadata)
            .at(evaluated_at);
        if let Some(rule_id) = &outcome.result.rule_id {
            draft = draft.with_rule(rule_id.clone());
        }
        if let Some(reason) = &outcome.result.reason {
            draft = draft.with_reason(reason.clone());
        }
        draft
    }
}

/// Runs a rule query, converting a panicking store into a query error.
fn guarded_query(store: &dyn RuleStore, query: &RuleQuery) -> Result<Vec<Rule>, RuleStoreError> {
    catch_unwind(AssertUnwindSafe(|| store.query(query))).unwrap_or_else(|payload| {
        let detail = panic_detail(payload.as_ref());
        Err(RuleStoreError::Query(format!("rule store panicked: {detail}")))
    })
}
