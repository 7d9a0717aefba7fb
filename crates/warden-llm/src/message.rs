//! The conversational history data model.
//!
//! `HistoryMessage` is the unit the context discipline engine (budgeter,
//! pruner, truncator) operates on. Content is either a plain string or
//! an ordered sequence of typed parts; only text parts contribute directly
//! to the character count used by the token estimator — non-text parts
//! (images, tool calls, …) contribute a fixed overhead instead.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The fixed character overhead attributed to a non-text content part.
pub const NON_TEXT_PART_OVERHEAD_CHARS: usize = 100;

/// A message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System instructions. Immutable and protected from pruning.
    System,
    /// User turn.
    User,
    /// Assistant turn.
    Assistant,
    /// Tool result.
    Tool,
}

impl MessageRole {
    /// Whether messages with this role are protected from pruning.
    #[must_use]
    pub fn is_protected_role(self) -> bool {
        matches!(self, Self::System)
    }
}

/// One part of a structured, multi-part message body.
///
/// `discriminator` names the part kind (e.g. `"image"`, `"tool_call"`,
/// `"tool_result"`); `fields` carries whatever associated data the part
/// kind needs. Only the `"text"` discriminator contributes its literal
/// character length to token estimation — every other discriminator
/// contributes [`NON_TEXT_PART_OVERHEAD_CHARS`] regardless of payload size.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentPart {
    /// The part kind.
    pub discriminator: String,
    /// Arbitrary fields associated with this part. For `discriminator ==
    /// "text"` this is expected to contain a top-level `"text"` string
    /// field, read by [`ContentPart::text_len`].
    #[serde(default)]
    pub fields: Value,
}

impl ContentPart {
    /// Construct a text part.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            discriminator: "text".to_string(),
            fields: serde_json::json!({ "text": text.into() }),
        }
    }

    /// Construct a non-text part (the payload is irrelevant to estimation).
    #[must_use]
    pub fn other(discriminator: impl Into<String>, fields: Value) -> Self {
        Self {
            discriminator: discriminator.into(),
            fields,
        }
    }

    /// Whether this part is a text part.
    #[must_use]
    pub fn is_text(&self) -> bool {
        self.discriminator == "text"
    }

    /// The character contribution of this part: the literal text length
    /// for text parts, [`NON_TEXT_PART_OVERHEAD_CHARS`] for everything
    /// else.
    #[must_use]
    pub fn char_contribution(&self) -> usize {
        if self.is_text() {
            self.fields
                .get("text")
                .and_then(Value::as_str)
                .map(str::len)
                .unwrap_or(0)
        } else {
            NON_TEXT_PART_OVERHEAD_CHARS
        }
    }
}

/// Message content: a plain string, or an ordered sequence of typed parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Plain text content.
    Text(String),
    /// Structured multi-part content.
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// Total character count contributed by this content.
    #[must_use]
    pub fn char_len(&self) -> usize {
        match self {
            Self::Text(s) => s.len(),
            Self::Parts(parts) => parts.iter().map(ContentPart::char_contribution).sum(),
        }
    }
}

/// A single message in conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryMessage {
    /// The speaking role.
    pub role: MessageRole,
    /// The message body.
    pub content: MessageContent,
}

impl HistoryMessage {
    /// Construct a plain-text user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: MessageContent::Text(content.into()),
        }
    }

    /// Construct a plain-text assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: MessageContent::Text(content.into()),
        }
    }

    /// Construct a plain-text system message. System messages are
    /// immutable and protected from pruning.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: MessageContent::Text(content.into()),
        }
    }

    /// Construct a plain-text tool message.
    pub fn tool(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Tool,
            content: MessageContent::Text(content.into()),
        }
    }

    /// Whether this message is protected from pruning by role alone.
    #[must_use]
    pub fn is_system(&self) -> bool {
        self.role.is_protected_role()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_content_char_len_is_string_len() {
        let m = HistoryMessage::user("hello");
        assert_eq!(m.content.char_len(), 5);
    }

    #[test]
    fn non_text_part_contributes_fixed_overhead() {
        let content = MessageContent::Parts(vec![
            ContentPart::text("hi"),
            ContentPart::other("image", serde_json::json!({"data": "..."})),
        ]);
        assert_eq!(content.char_len(), 2 + NON_TEXT_PART_OVERHEAD_CHARS);
    }

    #[test]
    fn system_messages_are_protected() {
        let m = HistoryMessage::system("be helpful");
        assert!(m.is_system());
        assert!(!HistoryMessage::user("hi").is_system());
    }
}
