//! Session Auto-Compact Guard (M): decides when a session's history should
//! be summarized down, persisting its decision state (last-compacted-at,
//! last-compacted-at token count) through the session store (N).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warden_llm::HistoryMessage;

use crate::error::RuntimeResult;
use crate::session_store::SessionStore;

/// A single history message is considered "oversized" relative to the
/// context window when it alone would exceed this fraction of it. Large
/// enough that a single tool dump or pasted file doesn't trip the guard
/// on its own, small enough to catch the runaway case a summary step
/// would choke on.
const OVERSIZED_MESSAGE_SAFETY_MULTIPLIER: f64 = 0.5;

/// Tunables for [`decide_session_auto_compact`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionAutoCompactConfig {
    /// Whether auto-compaction is enabled at all.
    pub enabled: bool,
    /// Fraction of the context window that must be in use before
    /// compaction is considered.
    pub threshold_context_ratio: f64,
    /// Minimum time between compactions, in milliseconds.
    pub min_interval_ms: i64,
}

impl Default for SessionAutoCompactConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold_context_ratio: 0.5,
            min_interval_ms: 600_000,
        }
    }
}

/// Partial overrides for [`SessionAutoCompactConfig`], as supplied by
/// user-facing configuration.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SessionAutoCompactConfigOverrides {
    /// Override for [`SessionAutoCompactConfig::enabled`].
    pub enabled: Option<bool>,
    /// Override for [`SessionAutoCompactConfig::threshold_context_ratio`].
    pub threshold_context_ratio: Option<f64>,
    /// Override for [`SessionAutoCompactConfig::min_interval_ms`].
    pub min_interval_ms: Option<i64>,
}

/// Merge `overrides` onto [`SessionAutoCompactConfig::default`].
#[must_use]
pub fn resolve_session_auto_compact_config(overrides: Option<SessionAutoCompactConfigOverrides>) -> SessionAutoCompactConfig {
    let defaults = SessionAutoCompactConfig::default();
    let Some(overrides) = overrides else {
        return defaults;
    };

    SessionAutoCompactConfig {
        enabled: overrides.enabled.unwrap_or(defaults.enabled),
        threshold_context_ratio: overrides.threshold_context_ratio.unwrap_or(defaults.threshold_context_ratio),
        min_interval_ms: overrides.min_interval_ms.unwrap_or(defaults.min_interval_ms),
    }
}

/// Input to [`decide_session_auto_compact`].
#[derive(Debug, Clone, Copy)]
pub struct SessionAutoCompactInput {
    /// The resolved configuration to evaluate against.
    pub config: SessionAutoCompactConfig,
    /// Total tokens the session has consumed so far, if known.
    pub total_tokens: Option<u64>,
    /// Tokens currently occupying the context window, if known.
    pub context_tokens: Option<u64>,
    /// When auto-compaction last ran for this session, if ever.
    pub last_compact_at: Option<DateTime<Utc>>,
    /// `total_tokens` at the time auto-compaction last ran, if ever.
    pub last_compact_at_tokens: Option<u64>,
    /// The current time.
    pub now: DateTime<Utc>,
}

/// The outcome of [`decide_session_auto_compact`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoCompactDecision {
    /// Whether the session should be compacted now.
    pub should_compact: bool,
    /// A human-readable reason for the decision.
    pub reason: &'static str,
}

/// Decide whether a session should be auto-compacted now.
///
/// Reasons are evaluated in order, the first applicable one wins:
/// disabled, missing token metrics, below threshold, rate-limited by
/// `min_interval_ms`, no token growth since the last compaction, then
/// finally the threshold being hit.
#[must_use]
pub fn decide_session_auto_compact(input: &SessionAutoCompactInput) -> AutoCompactDecision {
    if !input.config.enabled {
        return AutoCompactDecision {
            should_compact: false,
            reason: "auto-compact disabled",
        };
    }

    let (Some(total_tokens), Some(context_tokens)) = (input.total_tokens, input.context_tokens) else {
        return AutoCompactDecision {
            should_compact: false,
            reason: "missing token metrics",
        };
    };
    if total_tokens == 0 || context_tokens == 0 {
        return AutoCompactDecision {
            should_compact: false,
            reason: "missing token metrics",
        };
    }

    #[allow(clippy::cast_precision_loss, clippy::arithmetic_side_effects)]
    let ratio = total_tokens as f64 / context_tokens as f64;
    if ratio < input.config.threshold_context_ratio {
        return AutoCompactDecision {
            should_compact: false,
            reason: "below threshold",
        };
    }

    if let Some(last_at) = input.last_compact_at {
        // Safety: chrono `DateTime` subtraction, not a primitive arithmetic op.
        #[allow(clippy::arithmetic_side_effects)]
        let elapsed_ms = (input.now - last_at).num_milliseconds();
        if elapsed_ms < input.config.min_interval_ms {
            return AutoCompactDecision {
                should_compact: false,
                reason: "rate-limited",
            };
        }
    }

    if let Some(last_tokens) = input.last_compact_at_tokens {
        if total_tokens <= last_tokens {
            return AutoCompactDecision {
                should_compact: false,
                reason: "no token growth since last compaction",
            };
        }
    }

    AutoCompactDecision {
        should_compact: true,
        reason: "threshold hit",
    }
}

/// Whether any single message in `messages` is large enough, relative to
/// `context_window_tokens`, that a summarization pass would be unable to
/// make headway on it.
#[must_use]
pub fn has_oversized_message_for_summary(messages: &[HistoryMessage], context_window_tokens: u64) -> bool {
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_sign_loss,
        clippy::cast_possible_truncation,
        clippy::arithmetic_side_effects
    )]
    let ceiling = (context_window_tokens as f64 * OVERSIZED_MESSAGE_SAFETY_MULTIPLIER) as usize;
    messages
        .iter()
        .any(|m| warden_llm::estimate_message_tokens(m) > ceiling)
}

/// Evaluate and, if `should_compact`, record an auto-compaction decision
/// for `session_key`, all under one exclusive lock on the session store.
///
/// # Errors
///
/// Returns an error if the session store cannot be read or written.
pub fn decide_and_record_session_auto_compact(
    store: &SessionStore,
    session_key: &str,
    config: SessionAutoCompactConfig,
    total_tokens: Option<u64>,
    context_tokens: Option<u64>,
    now: DateTime<Utc>,
) -> RuntimeResult<AutoCompactDecision> {
    let mut decision = AutoCompactDecision {
        should_compact: false,
        reason: "auto-compact disabled",
    };

    store.update(session_key, |entry| {
        entry.total_tokens = total_tokens.or(entry.total_tokens);
        entry.context_tokens = context_tokens.or(entry.context_tokens);

        let input = SessionAutoCompactInput {
            config,
            total_tokens,
            context_tokens,
            last_compact_at: entry.session_auto_compact_last_at,
            last_compact_at_tokens: entry.session_auto_compact_last_at_tokens,
            now,
        };
        decision = decide_session_auto_compact(&input);

        if decision.should_compact {
            entry.session_auto_compact_last_at = Some(now);
            entry.session_auto_compact_last_at_tokens = total_tokens;
        }
    })?;

    Ok(decision)
}
