//! Retry Policy (K): decide retry vs. escalate from a failure's category
//! and the attempt count so far, and [`execute_with_retry`], the at-most-
//! one-retry call wrapper built on top of it.

use std::future::Future;

use chrono::Utc;

use warden_llm::{CallFailure, Classifiable, ErrorCategory, categorize_error};

use crate::escalation::{EscalationInfo, escalate};

/// Implemented by caller-defined call-failure error types so the taxonomy
/// (§4.B) and escalation builder (§4.L) can classify and describe them
/// without [`execute_with_retry`] needing to know the concrete error type.
/// The provider HTTP client (out of scope for this crate) is expected to
/// implement this for its own error enum. `call_failure` is inherited from
/// [`Classifiable`], the same seam `warden_telemetry::with_telemetry` uses.
pub trait CallError: std::fmt::Display + Classifiable {
    /// HTTP status code, if this failure carries one.
    fn http_status(&self) -> Option<u16> {
        None
    }

    /// A provider-specific error code, if this failure carries one.
    fn error_code(&self) -> Option<String> {
        None
    }
}

/// The outcome of [`should_retry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryDecision {
    /// Whether the caller should retry.
    pub should_retry: bool,
    /// The failure's classified category.
    pub category: ErrorCategory,
    /// A human-readable reason for the decision.
    pub reason: &'static str,
}

/// Decide whether a failure should be retried.
///
/// At most one retry is ever granted: a `retry_count` of `1` or more always
/// returns `false` ("Max retries exhausted"). Otherwise a transient
/// category retries; a permanent or unknown category does not (unknown is
/// treated conservatively, as non-retriable).
#[must_use]
pub fn should_retry(failure: Option<&CallFailure>, retry_count: u32) -> RetryDecision {
    let category = categorize_error(failure);

    if retry_count >= 1 {
        return RetryDecision {
            should_retry: false,
            category,
            reason: "Max retries exhausted",
        };
    }

    if category.is_transient() {
        RetryDecision {
            should_retry: true,
            category,
            reason: "transient failure, retrying",
        }
    } else {
        RetryDecision {
            should_retry: false,
            category,
            reason: "non-retriable category",
        }
    }
}

/// Provider/model identity carried through a retry loop, for telemetry and
/// escalation purposes.
#[derive(Debug, Clone)]
pub struct RetryContext {
    /// The provider name.
    pub provider: String,
    /// The provider-specific model identifier.
    pub model: String,
}

/// Run `run` to completion, retrying at most once on a transient failure
/// and otherwise escalating.
///
/// `on_retry` is awaited once, right before the retried attempt, if the
/// first attempt fails transiently. `on_escalation` is awaited once, right
/// before the final error is returned, if the call does not ultimately
/// succeed. A successful call invokes neither callback. The error returned
/// on exhaustion/escalation is the original error from `run`, not a
/// wrapper.
pub async fn execute_with_retry<T, E, F, Fut, OnRetry, OnRetryFut, OnEscalation, OnEscalationFut>(
    mut run: F,
    ctx: &RetryContext,
    on_retry: Option<OnRetry>,
    on_escalation: Option<OnEscalation>,
) -> Result<T, E>
where
    E: CallError,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    OnRetry: Fn(&E) -> OnRetryFut,
    OnRetryFut: Future<Output = ()>,
    OnEscalation: Fn(&EscalationInfo) -> OnEscalationFut,
    OnEscalationFut: Future<Output = ()>,
{
    let started_at = Utc::now();
    let mut retry_count = 0u32;

    loop {
        match run().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let failure = err.call_failure();
                let decision = should_retry(Some(&failure), retry_count);

                if decision.should_retry {
                    retry_count = retry_count.saturating_add(1);
                    if let Some(cb) = &on_retry {
                        cb(&err).await;
                    }
                    continue;
                }

                let info = escalate(&err, ctx, started_at, retry_count);
                if let Some(cb) = &on_escalation {
                    cb(&info).await;
                }
                return Err(err);
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, PartialEq)]
    struct FakeError(&'static str);

    impl std::fmt::Display for FakeError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{}", self.0)
        }
    }

    impl Classifiable for FakeError {
        fn call_failure(&self) -> CallFailure {
            CallFailure::from_message(self.0)
        }
    }

    impl CallError for FakeError {}

    #[test]
    fn retry_count_at_or_above_one_is_exhausted() {
        let decision = should_retry(Some(&CallFailure::from_message("timed out")), 1);
        assert!(!decision.should_retry);
        assert_eq!(decision.reason, "Max retries exhausted");
    }

    #[test]
    fn transient_category_retries_on_first_attempt() {
        let decision = should_retry(Some(&CallFailure::from_message("timed out")), 0);
        assert!(decision.should_retry);
        assert_eq!(decision.category, ErrorCategory::Timeout);
    }

    #[test]
    fn unknown_category_is_not_retried() {
        let decision = should_retry(Some(&CallFailure::from_message("something weird")), 0);
        assert!(!decision.should_retry);
        assert_eq!(decision.category, ErrorCategory::Unknown);
    }

    #[tokio::test]
    async fn at_most_one_retry_for_persistent_transient_failure() {
        let attempts = AtomicU32::new(0);
        let retries = AtomicU32::new(0);
        let ctx = RetryContext {
            provider: "openai".to_string(),
            model: "gpt".to_string(),
        };

        let result: Result<(), FakeError> = execute_with_retry(
            || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(FakeError("rate limit exceeded")) }
            },
            &ctx,
            Some(|_err: &FakeError| {
                retries.fetch_add(1, Ordering::SeqCst);
                async {}
            }),
            None::<fn(&EscalationInfo) -> std::future::Ready<()>>,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(retries.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn permanent_failure_is_attempted_exactly_once() {
        let attempts = AtomicU32::new(0);
        let ctx = RetryContext {
            provider: "openai".to_string(),
            model: "gpt".to_string(),
        };

        let result: Result<(), FakeError> = execute_with_retry(
            || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(FakeError("unauthorized")) }
            },
            &ctx,
            None::<fn(&FakeError) -> std::future::Ready<()>>,
            None::<fn(&EscalationInfo) -> std::future::Ready<()>>,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn success_path_fires_neither_callback() {
        let retries = AtomicU32::new(0);
        let escalations = AtomicU32::new(0);
        let ctx = RetryContext {
            provider: "openai".to_string(),
            model: "gpt".to_string(),
        };

        let mut first = true;
        let result: Result<&str, FakeError> = execute_with_retry(
            || {
                let was_first = first;
                first = false;
                async move {
                    if was_first {
                        Err(FakeError("timed out"))
                    } else {
                        Ok("ok")
                    }
                }
            },
            &ctx,
            Some(|_err: &FakeError| {
                retries.fetch_add(1, Ordering::SeqCst);
                async {}
            }),
            Some(|_info: &EscalationInfo| {
                escalations.fetch_add(1, Ordering::SeqCst);
                async {}
            }),
        )
        .await;

        assert_eq!(result, Ok("ok"));
        assert_eq!(retries.load(Ordering::SeqCst), 1);
        assert_eq!(escalations.load(Ordering::SeqCst), 0);
    }
}
