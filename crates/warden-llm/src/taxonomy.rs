//! Classify any provider failure into one of seven closed categories.
//!
//! Collaborators (the HTTP clients for individual providers, out of scope
//! here) describe a failure with [`CallFailure`]; this module never makes
//! the call itself, only classifies whatever description it is handed.
//! Classification degrades to [`ErrorCategory::Unknown`] for any input that
//! does not match a more specific rule, including the absence of a
//! description entirely.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// The closed set of failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Provider is rate-limiting the caller.
    RateLimit,
    /// Authentication or billing failure.
    Auth,
    /// The call timed out.
    Timeout,
    /// The request itself was malformed.
    InvalidRequest,
    /// The provider returned a 5xx / internal failure.
    ServerError,
    /// A network-layer failure (DNS, connection refused, …).
    Network,
    /// Could not be classified more specifically.
    Unknown,
}

/// Transient categories: a retry may succeed.
const TRANSIENT: [ErrorCategory; 4] = [
    ErrorCategory::RateLimit,
    ErrorCategory::Timeout,
    ErrorCategory::ServerError,
    ErrorCategory::Network,
];

/// Permanent categories: a retry will not succeed.
const PERMANENT: [ErrorCategory; 2] = [ErrorCategory::Auth, ErrorCategory::InvalidRequest];

impl ErrorCategory {
    /// Whether this category may succeed on retry.
    #[must_use]
    pub fn is_transient(self) -> bool {
        TRANSIENT.contains(&self)
    }

    /// Whether this category will never succeed on retry.
    #[must_use]
    pub fn is_permanent(self) -> bool {
        PERMANENT.contains(&self)
    }
}

/// Whether a category is in the transient set (standalone predicate form).
#[must_use]
pub fn is_transient_category(category: ErrorCategory) -> bool {
    category.is_transient()
}

/// Whether a category is in the permanent set (standalone predicate form).
#[must_use]
pub fn is_permanent_category(category: ErrorCategory) -> bool {
    category.is_permanent()
}

/// A provider's own pre-classified failover reason, when one is available
/// up front (checked first in [`categorize_error`]'s classification order).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailoverReason {
    /// Provider signalled a rate limit directly.
    RateLimit,
    /// Provider signalled an authentication failure.
    Auth,
    /// Provider signalled a billing failure.
    Billing,
    /// Provider signalled a timeout.
    Timeout,
    /// Provider signalled a malformed-request failure.
    Format,
    /// Provider could not classify its own failure.
    Unknown,
}

impl FailoverReason {
    fn to_category(self) -> ErrorCategory {
        match self {
            Self::RateLimit => ErrorCategory::RateLimit,
            Self::Auth | Self::Billing => ErrorCategory::Auth,
            Self::Timeout => ErrorCategory::Timeout,
            Self::Format => ErrorCategory::InvalidRequest,
            Self::Unknown => ErrorCategory::Unknown,
        }
    }
}

/// Implemented by any error type that can describe itself as a
/// [`CallFailure`] for classification purposes. This is the seam both
/// [`crate::retry::CallError`]-style provider error enums (out of this
/// crate's scope) and ambient helpers like `warden_telemetry::with_telemetry`
/// classify failures through, without needing to know the concrete error
/// type.
pub trait Classifiable {
    /// Describe this failure for classification purposes.
    fn call_failure(&self) -> CallFailure;
}

impl Classifiable for String {
    fn call_failure(&self) -> CallFailure {
        CallFailure::from_message(self.clone())
    }
}

impl Classifiable for &str {
    fn call_failure(&self) -> CallFailure {
        CallFailure::from_message(*self)
    }
}

/// A duck-typed description of a call failure, handed in by a collaborator.
///
/// Every field is optional: `categorize_error` accepts `None` and degrades
/// to [`ErrorCategory::Unknown`], mirroring the spec's requirement that the
/// taxonomy accept *any* value as input.
#[derive(Debug, Clone, Default)]
pub struct CallFailure {
    /// A pre-classified reason, if the collaborator already knows one.
    pub failover_reason: Option<FailoverReason>,
    /// HTTP status code, if the failure came from an HTTP response.
    pub http_status: Option<u16>,
    /// A system-level error code (e.g. `"ECONNREFUSED"`, `"ETIMEDOUT"`).
    pub system_error_code: Option<String>,
    /// A free-text error message, matched against the category regexes.
    pub message: Option<String>,
}

impl CallFailure {
    /// Build a failure from just a message string.
    #[must_use]
    pub fn from_message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Default::default()
        }
    }

    /// Build a failure from an HTTP status code.
    #[must_use]
    pub fn from_status(status: u16) -> Self {
        Self {
            http_status: Some(status),
            ..Default::default()
        }
    }

    /// Build a failure from a system error code.
    #[must_use]
    pub fn from_system_code(code: impl Into<String>) -> Self {
        Self {
            system_error_code: Some(code.into()),
            ..Default::default()
        }
    }
}

static NETWORK_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(ENOTFOUND|ECONNREFUSED|EHOSTUNREACH|ENETUNREACH|EAI_AGAIN|EPIPE)$").expect("valid regex"));
static TIMEOUT_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ETIMEDOUT$").expect("valid regex"));
static NETWORK_MSG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)network error|fetch failed|dns lookup|socket hang up|ECONNREFUSED")
        .expect("valid regex")
});
static SERVER_ERROR_MSG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b5\d{2}\b|internal server error|service unavailable|bad gateway")
        .expect("valid regex")
});
static TIMEOUT_MSG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)timed? ?out").expect("valid regex"));
static RATE_LIMIT_MSG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)rate limit|too many requests").expect("valid regex"));
static AUTH_MSG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)invalid api key|unauthorized").expect("valid regex"));

/// Classify a call failure into one of the seven closed categories.
///
/// Classification order (first match wins):
/// 1. A pre-classified `failover_reason`.
/// 2. HTTP status code (429, 401/402/403, 408, 5xx).
/// 3. A recognized system error code.
/// 4. Message-body regex matching (network, server error, timeout, rate
///    limit, auth — checked in that order).
/// 5. `Unknown`, otherwise.
#[must_use]
pub fn categorize_error(failure: Option<&CallFailure>) -> ErrorCategory {
    let Some(failure) = failure else {
        return ErrorCategory::Unknown;
    };

    if let Some(reason) = failure.failover_reason {
        return reason.to_category();
    }

    if let Some(status) = failure.http_status {
        match status {
            429 => return ErrorCategory::RateLimit,
            401 | 402 | 403 => return ErrorCategory::Auth,
            408 => return ErrorCategory::Timeout,
            500..=599 => return ErrorCategory::ServerError,
            _ => {},
        }
    }

    if let Some(code) = &failure.system_error_code {
        if NETWORK_CODE.is_match(code) {
            return ErrorCategory::Network;
        }
        if TIMEOUT_CODE.is_match(code) {
            return ErrorCategory::Timeout;
        }
    }

    if let Some(message) = &failure.message {
        if NETWORK_MSG.is_match(message) {
            return ErrorCategory::Network;
        }
        if SERVER_ERROR_MSG.is_match(message) {
            return ErrorCategory::ServerError;
        }
        if TIMEOUT_MSG.is_match(message) {
            return ErrorCategory::Timeout;
        }
        if RATE_LIMIT_MSG.is_match(message) {
            return ErrorCategory::RateLimit;
        }
        if AUTH_MSG.is_match(message) {
            return ErrorCategory::Auth;
        }
    }

    ErrorCategory::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_input_is_unknown() {
        assert_eq!(categorize_error(None), ErrorCategory::Unknown);
    }

    #[test]
    fn status_429_is_rate_limit() {
        assert_eq!(
            categorize_error(Some(&CallFailure::from_status(429))),
            ErrorCategory::RateLimit
        );
    }

    #[test]
    fn status_401_403_is_auth() {
        assert_eq!(
            categorize_error(Some(&CallFailure::from_status(401))),
            ErrorCategory::Auth
        );
        assert_eq!(
            categorize_error(Some(&CallFailure::from_status(403))),
            ErrorCategory::Auth
        );
    }

    #[test]
    fn status_5xx_is_server_error() {
        assert_eq!(
            categorize_error(Some(&CallFailure::from_status(503))),
            ErrorCategory::ServerError
        );
    }

    #[test]
    fn econnrefused_code_is_network() {
        assert_eq!(
            categorize_error(Some(&CallFailure::from_system_code("ECONNREFUSED"))),
            ErrorCategory::Network
        );
    }

    #[test]
    fn etimedout_code_is_timeout() {
        assert_eq!(
            categorize_error(Some(&CallFailure::from_system_code("ETIMEDOUT"))),
            ErrorCategory::Timeout
        );
    }

    #[test]
    fn message_regexes_classify_in_order() {
        assert_eq!(
            categorize_error(Some(&CallFailure::from_message("socket hang up"))),
            ErrorCategory::Network
        );
        assert_eq!(
            categorize_error(Some(&CallFailure::from_message("Internal Server Error"))),
            ErrorCategory::ServerError
        );
        assert_eq!(
            categorize_error(Some(&CallFailure::from_message("Request timed out"))),
            ErrorCategory::Timeout
        );
        assert_eq!(
            categorize_error(Some(&CallFailure::from_message("Too Many Requests"))),
            ErrorCategory::RateLimit
        );
        assert_eq!(
            categorize_error(Some(&CallFailure::from_message("Invalid API key"))),
            ErrorCategory::Auth
        );
    }

    #[test]
    fn unmatched_message_is_unknown() {
        assert_eq!(
            categorize_error(Some(&CallFailure::from_message("something weird happened"))),
            ErrorCategory::Unknown
        );
    }

    #[test]
    fn failover_reason_takes_precedence_over_status() {
        let failure = CallFailure {
            failover_reason: Some(FailoverReason::Billing),
            http_status: Some(429),
            ..Default::default()
        };
        assert_eq!(categorize_error(Some(&failure)), ErrorCategory::Auth);
    }

    #[test]
    fn classification_is_idempotent() {
        let failure = CallFailure::from_message("rate limit exceeded");
        let first = categorize_error(Some(&failure));
        let second = categorize_error(Some(&failure));
        assert_eq!(first, second);
    }

    #[test]
    fn transient_and_permanent_sets_are_disjoint() {
        for category in [
            ErrorCategory::RateLimit,
            ErrorCategory::Timeout,
            ErrorCategory::ServerError,
            ErrorCategory::Network,
        ] {
            assert!(category.is_transient());
            assert!(!category.is_permanent());
        }
        for category in [ErrorCategory::Auth, ErrorCategory::InvalidRequest] {
            assert!(category.is_permanent());
            assert!(!category.is_transient());
        }
        assert!(!ErrorCategory::Unknown.is_transient());
        assert!(!ErrorCategory::Unknown.is_permanent());
    }
}
