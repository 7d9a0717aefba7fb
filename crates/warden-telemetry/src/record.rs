//! The per-call telemetry record and its closed-set fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use warden_core::{Level, SessionId};

/// The role a call played within a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallRole {
    /// Top-level request router.
    Dispatcher,
    /// Plan generation.
    Planner,
    /// Plan execution.
    Executor,
    /// Context/document retrieval.
    Retriever,
    /// A nested subagent call.
    Subagent,
}

/// The terminal status of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    /// Completed successfully.
    Success,
    /// Failed with an error.
    Failure,
    /// Cancelled before completion.
    Cancelled,
    /// Exceeded a caller-imposed timeout.
    Timeout,
}

/// The closed set of ten error kinds a failed call may report.
///
/// The first seven mirror [`crate` error taxonomy categories][cat]; the
/// remaining three (`validation`, `cancelled`, `internal`) cover failures
/// that never reach the provider HTTP boundary at all (a malformed
/// envelope, cooperative cancellation, and a bug inside the control plane
/// itself). This mapping is a design decision recorded in `DESIGN.md`
/// since the distilled source does not enumerate the ten kinds by name.
///
/// [cat]: warden_llm::ErrorCategory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Provider rate-limited the call.
    RateLimit,
    /// Authentication or billing failure.
    Auth,
    /// The call timed out.
    Timeout,
    /// The request was malformed.
    InvalidRequest,
    /// The provider returned a server error.
    ServerError,
    /// A network-layer failure.
    Network,
    /// Could not be classified.
    Unknown,
    /// A boundary-crossing data envelope failed validation.
    Validation,
    /// Cooperatively cancelled.
    Cancelled,
    /// An internal control-plane bug.
    Internal,
}

impl From<warden_llm::ErrorCategory> for ErrorKind {
    fn from(category: warden_llm::ErrorCategory) -> Self {
        match category {
            warden_llm::ErrorCategory::RateLimit => Self::RateLimit,
            warden_llm::ErrorCategory::Auth => Self::Auth,
            warden_llm::ErrorCategory::Timeout => Self::Timeout,
            warden_llm::ErrorCategory::InvalidRequest => Self::InvalidRequest,
            warden_llm::ErrorCategory::ServerError => Self::ServerError,
            warden_llm::ErrorCategory::Network => Self::Network,
            warden_llm::ErrorCategory::Unknown => Self::Unknown,
        }
    }
}

/// A single per-call telemetry record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallTelemetry {
    /// Monotonic record identifier, assigned by the store.
    pub id: u64,
    /// The trace this call belongs to.
    pub trace_id: String,
    /// A per-request identifier (distinct from the trace id when a trace
    /// spans multiple requests, e.g. retries).
    pub request_id: String,
    /// The session this call occurred within, if any.
    pub session_id: Option<SessionId>,
    /// A caller-chosen session key, if distinct from `session_id`.
    pub session_key: Option<String>,
    /// The provider-specific model identifier.
    pub model_id: String,
    /// The provider name.
    pub provider: String,
    /// The role this call played.
    pub role: CallRole,
    /// When the call started.
    pub started_at: DateTime<Utc>,
    /// When the call completed, if it has.
    pub completed_at: Option<DateTime<Utc>>,
    /// Wall-clock latency in milliseconds, once completed.
    pub latency_ms: Option<u64>,
    /// Prompt tokens consumed.
    pub prompt_tokens: Option<u64>,
    /// Completion tokens produced.
    pub completion_tokens: Option<u64>,
    /// Tokens served from a provider-side cache read.
    pub cache_read_tokens: Option<u64>,
    /// Tokens written to a provider-side cache.
    pub cache_write_tokens: Option<u64>,
    /// Total tokens (prompt + completion), when known directly.
    pub total_tokens: Option<u64>,
    /// How many retries preceded this record's outcome.
    pub retry_count: u32,
    /// Escalation codes raised during this call, if any.
    pub escalation_codes: Option<Vec<String>>,
    /// Size in bytes of any artifact produced.
    pub artifact_bytes: Option<u64>,
    /// The terminal status.
    pub status: CallStatus,
    /// The error kind, when `status != success`.
    pub error_kind: Option<ErrorKind>,
    /// The error message, when `status != success`.
    pub error_message: Option<String>,
    /// Local process memory pressure observed at call time.
    pub local_memory_pressure: Option<Level>,
    /// Why the model stopped generating (e.g. `"stop"`, `"length"`).
    pub stop_reason: Option<String>,
    /// Whether this call was made on behalf of a subagent.
    pub is_subagent: bool,
    /// A caller-assigned label identifying the subagent.
    pub subagent_label: Option<String>,
    /// A caller-assigned routing lane.
    pub lane: Option<String>,
}

impl CallTelemetry {
    /// Build a record for a just-started call; `id` is assigned by the
    /// store on insert (0 until then).
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn started(
        trace_id: impl Into<String>,
        request_id: impl Into<String>,
        model_id: impl Into<String>,
        provider: impl Into<String>,
        role: CallRole,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: 0,
            trace_id: trace_id.into(),
            request_id: request_id.into(),
            session_id: None,
            session_key: None,
            model_id: model_id.into(),
            provider: provider.into(),
            role,
            started_at,
            completed_at: None,
            latency_ms: None,
            prompt_tokens: None,
            completion_tokens: None,
            cache_read_tokens: None,
            cache_write_tokens: None,
            total_tokens: None,
            retry_count: 0,
            escalation_codes: None,
            artifact_bytes: None,
            status: CallStatus::Success,
            error_kind: None,
            error_message: None,
            local_memory_pressure: None,
            stop_reason: None,
            is_subagent: false,
            subagent_label: None,
            lane: None,
        }
    }

    /// Mark this record failed with a provider-taxonomy category, e.g. from
    /// `with_telemetry`'s `Err` branch.
    pub fn mark_failed(&mut self, category: warden_llm::ErrorCategory, message: impl Into<String>) {
        self.status = CallStatus::Failure;
        self.error_kind = Some(ErrorKind::from(category));
        self.error_message = Some(message.into());
    }

    /// Mark this record cooperatively cancelled, e.g. by a caller that
    /// dropped or aborted the underlying request before it completed.
    pub fn mark_cancelled(&mut self) {
        self.status = CallStatus::Cancelled;
        self.error_kind = Some(ErrorKind::Cancelled);
    }

    /// Mark this record failed because a boundary-crossing data envelope
    /// failed validation (§7's `validateOrLog`/`validateOrThrow` contract;
    /// see `warden_runtime::contract`).
    pub fn mark_validation_failure(&mut self, message: impl Into<String>) {
        self.status = CallStatus::Failure;
        self.error_kind = Some(ErrorKind::Validation);
        self.error_message = Some(message.into());
    }

    /// Mark this record failed because of a bug inside the control plane
    /// itself, rather than anything the provider or caller did.
    pub fn mark_internal_failure(&mut self, message: impl Into<String>) {
        self.status = CallStatus::Failure;
        self.error_kind = Some(ErrorKind::Internal);
        self.error_message = Some(message.into());
    }
}
