//! Context budgeting (G) and hot-state cap enforcement.
//!
//! [`allocate_budget`] carves a context window into the five named
//! categories a turn's outbound payload competes for; [`check_budget`]
//! reports which categories a realized usage overran. [`HotState`] shares
//! the same char/4 token heuristic to decide whether it needs to fall back
//! to a minimal document before it is folded into the system-prompt
//! category.

use serde::{Deserialize, Serialize};

use warden_core::Level;

use crate::error::{RuntimeError, RuntimeResult};

const DEFAULT_SYSTEM_PROMPT_RATIO: f64 = 0.20;
const DEFAULT_HOT_STATE_RATIO: f64 = 0.00;
const DEFAULT_HISTORY_RATIO: f64 = 0.50;
const DEFAULT_TOOL_RESULTS_RATIO: f64 = 0.15;
const DEFAULT_OUTPUT_RESERVE_RATIO: f64 = 0.15;

/// Tolerance applied when checking that ratios sum to at most `1.0`.
const RATIO_SUM_TOLERANCE: f64 = 1e-9;

/// Convert a character count into a token count using the 4-chars-per-token
/// heuristic, without the per-message role-framing overhead the estimator
/// in `warden-llm` applies (this budgets whole documents, not messages).
#[must_use]
pub(crate) fn chars_to_tokens(chars: usize) -> u64 {
    #[allow(clippy::cast_possible_truncation)]
    {
        chars.div_ceil(4) as u64
    }
}

/// One of the five named budget categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BudgetCategory {
    /// The system prompt.
    SystemPrompt,
    /// The hot-state document.
    HotState,
    /// Conversation history.
    History,
    /// Tool call results.
    ToolResults,
    /// Reserved headroom for the model's own output.
    OutputReserve,
}

/// A token allocation across the five budget categories.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetAllocation {
    /// Tokens allocated to the system prompt.
    pub system_prompt: u64,
    /// Tokens allocated to the hot-state document.
    pub hot_state: u64,
    /// Tokens allocated to conversation history.
    pub history: u64,
    /// Tokens allocated to tool call results.
    pub tool_results: u64,
    /// Tokens reserved for model output.
    pub output_reserve: u64,
}

/// Caller-supplied ratio overrides for [`allocate_budget`]. Any field left
/// `None` falls back to the documented default for that category.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct BudgetRatios {
    /// Override for the system-prompt ratio (default `0.20`).
    pub system_prompt: Option<f64>,
    /// Override for the hot-state ratio (default `0.00`).
    pub hot_state: Option<f64>,
    /// Override for the history ratio (default `0.50`).
    pub history: Option<f64>,
    /// Override for the tool-results ratio (default `0.15`).
    pub tool_results: Option<f64>,
    /// Override for the output-reserve ratio (default `0.15`).
    pub output_reserve: Option<f64>,
}

/// One category whose realized usage exceeded its allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetViolation {
    /// The category that overran its allocation.
    pub category: BudgetCategory,
    /// The allocated token count.
    pub allocated: u64,
    /// The actual (realized) token count.
    pub actual: u64,
    /// `actual - allocated`.
    pub over_by: u64,
}

/// Allocate `window` tokens across the five named categories.
///
/// Missing ratios fall back to the defaults `0.20/0.00/0.50/0.15/0.15`.
/// Each category's allocation is `floor(window * ratio)`.
///
/// # Errors
///
/// Returns [`RuntimeError::InvalidContextWindow`] if `window` is zero, or
/// [`RuntimeError::InvalidRatios`] if any ratio is negative or the ratios
/// sum to more than `1.0 + 1e-9`.
pub fn allocate_budget(window: u64, ratios: Option<BudgetRatios>) -> RuntimeResult<BudgetAllocation> {
    if window == 0 {
        return Err(RuntimeError::InvalidContextWindow(
            "context window must be greater than zero".to_string(),
        ));
    }

    let ratios = ratios.unwrap_or_default();
    let system_prompt = ratios.system_prompt.unwrap_or(DEFAULT_SYSTEM_PROMPT_RATIO);
    let hot_state = ratios.hot_state.unwrap_or(DEFAULT_HOT_STATE_RATIO);
    let history = ratios.history.unwrap_or(DEFAULT_HISTORY_RATIO);
    let tool_results = ratios.tool_results.unwrap_or(DEFAULT_TOOL_RESULTS_RATIO);
    let output_reserve = ratios.output_reserve.unwrap_or(DEFAULT_OUTPUT_RESERVE_RATIO);

    for (name, ratio) in [
        ("systemPrompt", system_prompt),
        ("hotState", hot_state),
        ("history", history),
        ("toolResults", tool_results),
        ("outputReserve", output_reserve),
    ] {
        if ratio < 0.0 {
            return Err(RuntimeError::InvalidRatios(format!(
                "ratio for {name} must be non-negative, got {ratio}"
            )));
        }
    }

    // Safety: each ratio was just checked non-negative above; a five-way f64 sum cannot overflow.
    #[allow(clippy::arithmetic_side_effects)]
    let sum = system_prompt + hot_state + history + tool_results + output_reserve;
    if sum > 1.0 + RATIO_SUM_TOLERANCE {
        return Err(RuntimeError::InvalidRatios(format!(
            "ratios sum to {sum}, which exceeds 1.0"
        )));
    }

    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_sign_loss,
        clippy::cast_possible_truncation,
        clippy::arithmetic_side_effects
    )]
    let alloc = |ratio: f64| -> u64 { (window as f64 * ratio).floor() as u64 };

    Ok(BudgetAllocation {
        system_prompt: alloc(system_prompt),
        hot_state: alloc(hot_state),
        history: alloc(history),
        tool_results: alloc(tool_results),
        output_reserve: alloc(output_reserve),
    })
}

/// Compare a realized usage against an allocation, returning one
/// [`BudgetViolation`] per category where `actual > allocated`. A category
/// missing from `actual` is treated as zero; exact equality is not a
/// violation.
#[must_use]
pub fn check_budget(allocation: &BudgetAllocation, actual: &BudgetAllocation) -> Vec<BudgetViolation> {
    let pairs = [
        (BudgetCategory::SystemPrompt, allocation.system_prompt, actual.system_prompt),
        (BudgetCategory::HotState, allocation.hot_state, actual.hot_state),
        (BudgetCategory::History, allocation.history, actual.history),
        (BudgetCategory::ToolResults, allocation.tool_results, actual.tool_results),
        (BudgetCategory::OutputReserve, allocation.output_reserve, actual.output_reserve),
    ];

    pairs
        .into_iter()
        .filter(|&(_, allocated, actual)| actual > allocated)
        .map(|(category, allocated, actual)| BudgetViolation {
            category,
            allocated,
            actual,
            over_by: actual.saturating_sub(allocated),
        })
        .collect()
}

/// The strict structured "hot state" document carried alongside the system
/// prompt: session objective, risk level, open constraints and decisions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotState {
    /// The session this hot state belongs to.
    pub session_id: String,
    /// A short statement of the session's current objective.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objective: Option<String>,
    /// The session's current risk level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<Level>,
    /// Active constraints the agent must respect.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<String>,
    /// Open questions not yet resolved.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub open_questions: Vec<String>,
    /// Decisions already accepted for this session.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub accepted_decisions: Vec<String>,
}

impl HotState {
    /// Construct an empty hot-state document for a session.
    #[must_use]
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            objective: None,
            risk_level: None,
            constraints: Vec::new(),
            open_questions: Vec::new(),
            accepted_decisions: Vec::new(),
        }
    }

    fn minimal(&self) -> Self {
        Self {
            session_id: self.session_id.clone(),
            objective: None,
            risk_level: self.risk_level,
            constraints: Vec::new(),
            open_questions: Vec::new(),
            accepted_decisions: Vec::new(),
        }
    }

    /// Estimate this document's token cost via the char/4 heuristic.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be serialized.
    pub fn estimate_tokens(&self) -> RuntimeResult<u64> {
        let serialized = serde_json::to_string(self)?;
        Ok(chars_to_tokens(serialized.len()))
    }

    /// Return `self` if it fits within `cap_tokens`, otherwise fall back to
    /// a minimal document preserving only `session_id` and `risk_level`.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be serialized.
    pub fn within_token_cap(&self, cap_tokens: u64) -> RuntimeResult<Self> {
        if self.estimate_tokens()? <= cap_tokens {
            Ok(self.clone())
        } else {
            Ok(self.minimal())
        }
    }
}
