//! Context Discipline Orchestrator (J): composes the budgeter, pruner, and
//! truncator into one decision over a turn's outbound payload, and reports
//! what it did.

use warden_llm::HistoryMessage;

use crate::budget::{BudgetAllocation, BudgetRatios, allocate_budget, chars_to_tokens, check_budget};
use crate::error::RuntimeResult;
use crate::pruner::prune_history;
use crate::truncate::{TruncateOptions, truncate_tool_results};

/// Input to [`enforce_context_discipline`].
#[derive(Debug, Clone)]
pub struct ContextDisciplineInput {
    /// The provider's context window, in tokens.
    pub context_window: u64,
    /// The outbound system prompt.
    pub system_prompt: String,
    /// The serialized hot-state document, if any, already capped by the
    /// caller (see [`crate::budget::HotState::within_token_cap`]).
    pub hot_state: Option<String>,
    /// The conversation history to prune.
    pub messages: Vec<HistoryMessage>,
    /// Tool call results to truncate.
    pub tool_results: Vec<String>,
    /// Ratio overrides for [`allocate_budget`].
    pub budget_overrides: Option<BudgetRatios>,
    /// Override for the pruner's protected trailing-turn count.
    pub min_recent_turns: Option<usize>,
}

/// Output of [`enforce_context_discipline`].
#[derive(Debug, Clone)]
pub struct ContextDisciplineOutput {
    /// The system prompt, unmodified (truncating it is a collaborator's
    /// problem; this orchestrator only reports the overrun).
    pub system_prompt: String,
    /// The pruned message history.
    pub messages: Vec<HistoryMessage>,
    /// The truncated tool results.
    pub tool_results: Vec<String>,
    /// The budget allocation used for this decision.
    pub budget: BudgetAllocation,
    /// Human-readable actions taken or violations observed, in order.
    pub actions: Vec<String>,
}

/// Allocate a budget, truncate tool results, prune history, then re-check
/// every category and report what happened.
///
/// # Errors
///
/// Returns an error if `context_window` or `budget_overrides` are invalid
/// (see [`allocate_budget`]).
pub fn enforce_context_discipline(input: ContextDisciplineInput) -> RuntimeResult<ContextDisciplineOutput> {
    let budget = allocate_budget(input.context_window, input.budget_overrides)?;
    let mut actions = Vec::new();

    let sys_tokens = chars_to_tokens(input.system_prompt.len());
    let hot_tokens = input.hot_state.as_ref().map_or(0, |h| chars_to_tokens(h.len()));
    let sys_hot_budget = budget.system_prompt.saturating_add(budget.hot_state);
    let sys_hot_tokens = sys_tokens.saturating_add(hot_tokens);
    if sys_hot_tokens > sys_hot_budget {
        actions.push(format!(
            "system prompt + hot state ({sys_hot_tokens} tokens) exceeds allocated budget ({sys_hot_budget} tokens); \
             truncating the system prompt is a collaborator's responsibility"
        ));
    }

    let tool_budget_chars = usize::try_from(budget.tool_results.saturating_mul(4)).unwrap_or(usize::MAX);
    let truncate_opts = TruncateOptions::default();
    let truncated = truncate_tool_results(&input.tool_results, tool_budget_chars, &truncate_opts);
    if truncated.was_truncated {
        actions.push(format!(
            "truncated tool results to fit a {tool_budget_chars}-char budget ({} result(s) total)",
            input.tool_results.len()
        ));
    }

    let prune_result = prune_history(&input.messages, budget.history, input.min_recent_turns);
    if prune_result.pruned_count > 0 {
        actions.push(format!(
            "pruned {} message(s) from history ({} -> {} tokens)",
            prune_result.pruned_count, prune_result.tokens_before, prune_result.tokens_after
        ));
    }

    let tool_tokens_after: u64 = chars_to_tokens(truncated.results.iter().map(String::len).sum());
    let actual = BudgetAllocation {
        system_prompt: sys_tokens,
        hot_state: hot_tokens,
        history: prune_result.tokens_after,
        tool_results: tool_tokens_after,
        output_reserve: 0,
    };
    for violation in check_budget(&budget, &actual) {
        actions.push(format!(
            "{:?} still over budget after adjustments: {} > {} tokens (over by {})",
            violation.category, violation.actual, violation.allocated, violation.over_by
        ));
    }

    if actions.is_empty() {
        actions.push("All context within budget — no adjustments needed".to_string());
    }

    Ok(ContextDisciplineOutput {
        system_prompt: input.system_prompt,
        messages: prune_result.messages,
        tool_results: truncated.results,
        budget,
        actions,
    })
}
