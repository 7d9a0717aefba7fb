//! Warden Runtime - context discipline and failure economics for the
//! warden agent control plane.
//!
//! This crate provides:
//! - [`allocate_budget`]/[`check_budget`]/[`HotState`], the context
//!   budgeter (G).
//! - [`prune_history`], the recency-protecting history pruner (H).
//! - [`truncate_tool_result`]/[`truncate_tool_results`], the tool-result
//!   truncator (I).
//! - [`enforce_context_discipline`], the orchestrator tying G/H/I together
//!   into one decision over a turn's outbound payload (J).
//! - [`should_retry`]/[`execute_with_retry`], the retry policy (K).
//! - [`escalate`]/[`format_escalation`], the escalation builder (L).
//! - [`decide_session_auto_compact`]/[`decide_and_record_session_auto_compact`],
//!   the session auto-compact guard (M).
//! - [`SessionStore`], the session metadata persistence tier (N).
//! - [`validate_or_throw`]/[`validate_or_log`], the boundary contract
//!   validator (§7) for plan/task/result/escalation envelopes.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod budget;
mod compact;
mod contract;
mod discipline;
mod error;
mod escalation;
mod pruner;
mod retry;
mod session_store;
mod truncate;

pub use budget::{BudgetAllocation, BudgetCategory, BudgetRatios, BudgetViolation, HotState, allocate_budget, check_budget};
pub use compact::{
    AutoCompactDecision, SessionAutoCompactConfig, SessionAutoCompactConfigOverrides, SessionAutoCompactInput,
    decide_and_record_session_auto_compact, decide_session_auto_compact, has_oversized_message_for_summary,
    resolve_session_auto_compact_config,
};
pub use contract::{
    ContractValidationError, EscalationSignal, PlanArtifact, PlanRequest, PlanStatus, Priority, ResultEnvelope,
    TaskEnvelope, TaskStatus, Validate, validate_or_log, validate_or_throw,
};
pub use discipline::{ContextDisciplineInput, ContextDisciplineOutput, enforce_context_discipline};
pub use error::{RuntimeError, RuntimeResult};
pub use escalation::{EscalationInfo, escalate, format_escalation};
pub use pruner::{DEFAULT_MIN_RECENT_TURNS, PruneResult, prune_history};
pub use retry::{CallError, RetryContext, RetryDecision, execute_with_retry, should_retry};
pub use session_store::{SessionEntry, SessionStore};
pub use truncate::{TruncateOptions, TruncateResultsOutput, truncate_tool_result, truncate_tool_results};
