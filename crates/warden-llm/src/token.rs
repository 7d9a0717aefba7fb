//! A 4-chars-per-token heuristic for estimating message cost.
//!
//! Pure and deterministic: given the same message, always returns the same
//! count. Used proactively by the context discipline engine rather than
//! relying on any particular provider's tokenizer.

use crate::message::HistoryMessage;

/// The fixed character overhead added to every message to account for role
/// framing (`"role: "` prefixes, delimiters, …).
const ROLE_FRAMING_OVERHEAD_CHARS: usize = 10;

/// Estimate the token count of a single message.
///
/// `tokens = ceil((chars + 10) / 4)`, where `chars` is the message's
/// textual content length (structured content sums part lengths, counting
/// each non-text part as a fixed 100-char overhead).
#[must_use]
pub fn estimate_message_tokens(message: &HistoryMessage) -> usize {
    let chars = message.content.char_len();
    chars
        .saturating_add(ROLE_FRAMING_OVERHEAD_CHARS)
        .div_ceil(4)
}

/// Sum [`estimate_message_tokens`] across a whole history. Empty input
/// yields zero.
#[must_use]
pub fn estimate_history_tokens(messages: &[HistoryMessage]) -> usize {
    messages.iter().map(estimate_message_tokens).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{ContentPart, MessageContent, MessageRole};

    #[test]
    fn hello_is_four_tokens() {
        let m = HistoryMessage::user("hello");
        assert_eq!(estimate_message_tokens(&m), 4);
    }

    #[test]
    fn empty_history_is_zero() {
        assert_eq!(estimate_history_tokens(&[]), 0);
    }

    #[test]
    fn estimation_is_monotone_in_char_length() {
        let short = HistoryMessage::user("hi");
        let long = HistoryMessage::user("hi there, this is a much longer message body");
        assert!(estimate_message_tokens(&short) < estimate_message_tokens(&long));
    }

    #[test]
    fn non_text_parts_count_as_fixed_overhead() {
        let m = HistoryMessage {
            role: MessageRole::Assistant,
            content: MessageContent::Parts(vec![ContentPart::other(
                "tool_call",
                serde_json::json!({"name": "x"}),
            )]),
        };
        assert_eq!(estimate_message_tokens(&m), (100 + 10_usize).div_ceil(4));
    }

    #[test]
    fn history_sums_messages() {
        let messages = vec![HistoryMessage::user("hello"), HistoryMessage::assistant("hello")];
        let total: usize = messages.iter().map(estimate_message_tokens).sum();
        assert_eq!(estimate_history_tokens(&messages), total);
    }
}
