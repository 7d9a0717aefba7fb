//! Warden LLM - conversational data model, token estimation, and error
//! taxonomy shared across the warden agent control plane.
//!
//! This crate provides:
//! - [`HistoryMessage`] / [`MessageContent`], the role+content model that
//!   the context discipline engine prunes and truncates.
//! - [`estimate_message_tokens`] / [`estimate_history_tokens`], the
//!   4-chars-per-token heuristic.
//! - [`ErrorCategory`] / [`categorize_error`], the closed-set failure
//!   taxonomy.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod error;
pub mod message;
pub mod taxonomy;
pub mod token;

pub use error::{LlmError, LlmResult};
pub use message::{ContentPart, HistoryMessage, MessageContent, MessageRole};
pub use taxonomy::{CallFailure, Classifiable, ErrorCategory, FailoverReason, categorize_error};
pub use token::{estimate_history_tokens, estimate_message_tokens};
