//! Escalation Builder (L): assembles a structured [`EscalationInfo`] from a
//! failed call and its retry context, and formats it as the single-line
//! `[ESCALATION] key=value …` form used in user-visible logs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warden_llm::{Classifiable, ErrorCategory, categorize_error};

use crate::retry::{CallError, RetryContext};

/// A structured record of a call that was not retried further.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationInfo {
    /// The failure's classified category.
    pub category: ErrorCategory,
    /// The provider name.
    pub provider: String,
    /// The provider-specific model identifier.
    pub model: String,
    /// Wall-clock latency from the first attempt to the escalation, in
    /// milliseconds.
    pub latency_ms: u64,
    /// How many retries preceded this escalation.
    pub retry_count: u32,
    /// The original error's message.
    pub error_message: String,
    /// A provider-specific error code, if known.
    pub error_code: Option<String>,
    /// The HTTP status code, if known.
    pub http_status: Option<u16>,
    /// When this escalation was built, in UTC.
    pub escalated_at: DateTime<Utc>,
}

fn category_name(category: ErrorCategory) -> &'static str {
    match category {
        ErrorCategory::RateLimit => "rate_limit",
        ErrorCategory::Auth => "auth",
        ErrorCategory::Timeout => "timeout",
        ErrorCategory::InvalidRequest => "invalid_request",
        ErrorCategory::ServerError => "server_error",
        ErrorCategory::Network => "network",
        ErrorCategory::Unknown => "unknown",
    }
}

/// Build an [`EscalationInfo`] from a failed call.
///
/// `started_at` is the time of the call's first attempt (not this retry);
/// `latency_ms` is measured from there to now. `retry_count` is how many
/// retries had already occurred.
#[must_use]
pub fn escalate<E: CallError>(err: &E, ctx: &RetryContext, started_at: DateTime<Utc>, retry_count: u32) -> EscalationInfo {
    let failure = err.call_failure();
    let category = categorize_error(Some(&failure));
    let now = Utc::now();
    // Safety: chrono `DateTime` subtraction, not a primitive arithmetic op.
    #[allow(clippy::cast_sign_loss, clippy::arithmetic_side_effects)]
    let latency_ms = (now - started_at).num_milliseconds().max(0) as u64;

    EscalationInfo {
        category,
        provider: ctx.provider.clone(),
        model: ctx.model.clone(),
        latency_ms,
        retry_count,
        error_message: err.to_string(),
        error_code: err.error_code(),
        http_status: err.http_status(),
        escalated_at: now,
    }
}

impl std::fmt::Display for EscalationInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[ESCALATION] category={} provider={} model={} latency_ms={} retry_count={}",
            category_name(self.category),
            self.provider,
            self.model,
            self.latency_ms,
            self.retry_count
        )?;
        if let Some(status) = self.http_status {
            write!(f, " http={status}")?;
        }
        if let Some(code) = &self.error_code {
            write!(f, " code={code}")?;
        }
        write!(f, " escalated_at={}", self.escalated_at.to_rfc3339())?;
        write!(f, " message=\"{}\"", self.error_message.replace('"', "\\\""))
    }
}

/// Format an [`EscalationInfo`] as the single-line `[ESCALATION] …` form.
/// Equivalent to `info.to_string()`, kept for parity with the distilled
/// spec's `formatEscalation` naming.
#[must_use]
pub fn format_escalation(info: &EscalationInfo) -> String {
    info.to_string()
}
