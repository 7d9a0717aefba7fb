//! History pruning (H): drop the oldest non-protected messages until a
//! token budget is met, preserving every system message and the most
//! recent `min_recent_turns` user turns (and everything after them).

use std::collections::HashSet;

use warden_llm::{HistoryMessage, MessageRole, estimate_history_tokens, estimate_message_tokens};

/// The default number of trailing user turns protected from pruning.
pub const DEFAULT_MIN_RECENT_TURNS: usize = 4;

/// The result of a [`prune_history`] call.
#[derive(Debug, Clone)]
pub struct PruneResult {
    /// The surviving messages, in original relative order.
    pub messages: Vec<HistoryMessage>,
    /// How many messages were dropped.
    pub pruned_count: usize,
    /// Total estimated tokens before pruning.
    pub tokens_before: u64,
    /// Total estimated tokens after pruning.
    pub tokens_after: u64,
}

/// Determine, for each message index, whether it is protected by recency:
/// every index from the earliest user message that brings the trailing
/// user-turn count up to `min_recent_turns` onward. Returns `messages.len()`
/// (protecting nothing beyond system messages) when `min_recent_turns` is
/// zero, and `0` (protecting everything) when fewer than `min_recent_turns`
/// user messages exist at all.
fn recency_protect_from_index(messages: &[HistoryMessage], min_recent_turns: usize) -> usize {
    if min_recent_turns == 0 {
        return messages.len();
    }

    let mut user_count = 0usize;
    for i in (0..messages.len()).rev() {
        if messages[i].is_system() {
            continue;
        }
        if matches!(messages[i].role, MessageRole::User) {
            user_count = user_count.saturating_add(1);
            if user_count >= min_recent_turns {
                return i;
            }
        }
    }
    0
}

/// Drop the oldest non-protected messages until `budget` tokens are met.
///
/// System messages are always protected; the most recent `min_recent_turns`
/// user turns (default [`DEFAULT_MIN_RECENT_TURNS`]) and every message
/// after the earliest such turn are also protected. Among prunable
/// messages, the oldest are dropped first, stopping as soon as the running
/// token count falls at or below `budget`. If the history is already
/// within budget, it is returned verbatim with `pruned_count = 0`. If the
/// protected messages alone exceed `budget`, they are still returned
/// intact — reporting the remaining overrun is the caller's job.
#[must_use]
pub fn prune_history(messages: &[HistoryMessage], budget: u64, min_recent_turns: Option<usize>) -> PruneResult {
    let min_recent_turns = min_recent_turns.unwrap_or(DEFAULT_MIN_RECENT_TURNS);
    #[allow(clippy::cast_possible_truncation)]
    let tokens_before = estimate_history_tokens(messages) as u64;

    if tokens_before <= budget {
        return PruneResult {
            messages: messages.to_vec(),
            pruned_count: 0,
            tokens_before,
            tokens_after: tokens_before,
        };
    }

    let protect_from_index = recency_protect_from_index(messages, min_recent_turns);

    let pruneable: Vec<usize> = (0..messages.len())
        .filter(|&i| i < protect_from_index && !messages[i].is_system())
        .collect();

    let mut dropped: HashSet<usize> = HashSet::new();
    let mut running = tokens_before;
    for &i in &pruneable {
        #[allow(clippy::cast_possible_truncation)]
        let tokens = estimate_message_tokens(&messages[i]) as u64;
        running = running.saturating_sub(tokens);
        dropped.insert(i);
        if running <= budget {
            break;
        }
    }

    let survivors: Vec<HistoryMessage> = messages
        .iter()
        .enumerate()
        .filter(|(i, _)| !dropped.contains(i))
        .map(|(_, m)| m.clone())
        .collect();

    #[allow(clippy::cast_possible_truncation)]
    let tokens_after = estimate_history_tokens(&survivors) as u64;

    PruneResult {
        messages: survivors,
        pruned_count: dropped.len(),
        tokens_before,
        tokens_after,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long_message(role: MessageRole, tag: &str) -> HistoryMessage {
        let content = format!("{tag} {}", "x".repeat(200));
        match role {
            MessageRole::User => HistoryMessage::user(content),
            MessageRole::Assistant => HistoryMessage::assistant(content),
            MessageRole::Tool => HistoryMessage::tool(content),
            MessageRole::System => HistoryMessage::system(content),
        }
    }

    #[test]
    fn within_budget_returns_verbatim() {
        let messages = vec![HistoryMessage::user("hi")];
        let result = prune_history(&messages, 1_000, None);
        assert_eq!(result.pruned_count, 0);
        assert_eq!(result.messages.len(), 1);
    }

    #[test]
    fn system_messages_are_always_preserved() {
        let mut messages = vec![HistoryMessage::system("be helpful")];
        for i in 0..10 {
            messages.push(long_message(MessageRole::User, &format!("user-{i}")));
            messages.push(long_message(MessageRole::Assistant, &format!("assistant-{i}")));
        }

        let result = prune_history(&messages, 50, None);
        assert!(result.pruned_count > 0);
        assert!(result.messages.iter().any(HistoryMessage::is_system));
        assert_eq!(
            result.messages.iter().find(|m| m.is_system()).unwrap().content.char_len(),
            messages[0].content.char_len()
        );
    }

    #[test]
    fn recent_turns_survive_aggressive_pruning() {
        let mut messages = vec![HistoryMessage::system("be helpful")];
        for i in 0..10 {
            messages.push(long_message(MessageRole::User, &format!("user-{i}")));
            messages.push(long_message(MessageRole::Assistant, &format!("assistant-{i}")));
        }

        let result = prune_history(&messages, 50, Some(4));
        assert!(result.pruned_count > 0);

        let last_four_users: Vec<&HistoryMessage> = messages
            .iter()
            .rev()
            .filter(|m| matches!(m.role, MessageRole::User))
            .take(4)
            .collect();
        for kept in last_four_users {
            assert!(result.messages.iter().any(|m| m.content.char_len() == kept.content.char_len()));
        }
    }

    #[test]
    fn budget_conservation_holds() {
        let mut messages = vec![HistoryMessage::system("be helpful")];
        for i in 0..10 {
            messages.push(long_message(MessageRole::User, &format!("user-{i}")));
            messages.push(long_message(MessageRole::Assistant, &format!("assistant-{i}")));
        }

        let result = prune_history(&messages, 50, None);
        assert!(result.tokens_after <= result.tokens_before);
        #[allow(clippy::cast_possible_truncation)]
        let recomputed = estimate_history_tokens(&result.messages) as u64;
        assert!(recomputed <= estimate_history_tokens(&messages) as u64);
    }

    #[test]
    fn oversized_system_messages_alone_are_returned_intact() {
        let messages = vec![long_message(MessageRole::System, "huge")];
        let result = prune_history(&messages, 1, None);
        assert_eq!(result.messages.len(), 1);
        assert_eq!(result.pruned_count, 0);
    }

    #[test]
    fn zero_min_recent_turns_protects_only_system_messages() {
        let mut messages = vec![HistoryMessage::system("sys")];
        for i in 0..5 {
            messages.push(long_message(MessageRole::User, &format!("user-{i}")));
        }
        let result = prune_history(&messages, 10, Some(0));
        assert!(result.pruned_count > 0);
        assert!(result.messages.iter().any(HistoryMessage::is_system));
    }
}
