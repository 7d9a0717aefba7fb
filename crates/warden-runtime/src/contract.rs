//! Boundary contract validator (§7): the declarative schemas and
//! `validateOrThrow`/`validateOrLog` entry points that guard data envelopes
//! crossing the core's external boundary (plan/task/result/escalation
//! payloads produced by the out-of-scope planner/executor collaborators)
//! before anything inside the core acts on them.
//!
//! Every schema type implements [`Validate`], collecting one
//! [`ContractValidationError`] per failing field rather than stopping at the
//! first. A caller chooses how to react: [`validate_or_throw`] aborts with a
//! single [`crate::error::RuntimeError::Contract`] carrying every failure;
//! [`validate_or_log`] logs each failure as a warning and returns whether the
//! value was valid, for callers that would rather degrade than abort.

use serde::{Deserialize, Serialize};

use crate::error::{RuntimeError, RuntimeResult};

/// A single failing field, reported with enough detail for a caller to
/// surface it to a user or another system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractValidationError {
    /// Dotted/indexed path to the failing field, e.g. `"steps[2]"`.
    pub path: String,
    /// Human-readable description of the failure.
    pub message: String,
    /// A machine-checkable failure code (`"required"`, `"non_empty"`,
    /// `"non_negative"`, `"closed_enum"`).
    pub code: &'static str,
}

impl ContractValidationError {
    fn non_empty(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            message: format!("{path} must not be empty"),
            path,
            code: "non_empty",
        }
    }

    fn non_negative(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            message: format!("{path} must not be negative"),
            path,
            code: "non_negative",
        }
    }

    fn closed_enum(path: impl Into<String>, value: &str) -> Self {
        let path = path.into();
        Self {
            message: format!("{path} has unrecognized value \"{value}\""),
            path,
            code: "closed_enum",
        }
    }
}

impl std::fmt::Display for ContractValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {}", self.path, self.code, self.message)
    }
}

/// Implemented by every declarative schema validated at the boundary.
pub trait Validate {
    /// Collect every failing field; an empty vec means the value is valid.
    fn validate(&self) -> Vec<ContractValidationError>;
}

/// Validate `value`, failing the whole call on the first invalid field set.
///
/// # Errors
///
/// Returns [`RuntimeError::Contract`] carrying every failing field when
/// `value` does not validate.
pub fn validate_or_throw<T: Validate>(value: &T) -> RuntimeResult<()> {
    let errors = value.validate();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(RuntimeError::Contract(errors))
    }
}

/// Validate `value`, logging each failing field as a warning instead of
/// aborting the call. Returns whether `value` was valid.
pub fn validate_or_log<T: Validate>(value: &T) -> bool {
    let errors = value.validate();
    for error in &errors {
        tracing::warn!(
            path = %error.path,
            code = error.code,
            message = %error.message,
            "contract validation failed"
        );
    }
    errors.is_empty()
}

/// Closed set of plan/task priorities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Low priority.
    Low,
    /// Default priority.
    Medium,
    /// High priority, processed ahead of queued lower-priority work.
    High,
}

/// Closed set of plan lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    /// Drafted but not yet accepted.
    Draft,
    /// Accepted and being executed.
    Active,
    /// Finished successfully.
    Completed,
    /// Finished with an unrecoverable failure.
    Failed,
}

/// Closed set of task lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Queued, not yet started.
    Pending,
    /// Currently executing.
    InProgress,
    /// Finished successfully.
    Completed,
    /// Finished with an unrecoverable failure.
    Failed,
}

/// A request to generate a plan, as handed to the (out-of-scope) planner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanRequest {
    /// Caller-assigned plan identifier.
    pub plan_id: String,
    /// Free-text objective the plan should satisfy.
    pub objective: String,
    /// Requested priority.
    pub priority: Priority,
}

impl Validate for PlanRequest {
    fn validate(&self) -> Vec<ContractValidationError> {
        let mut errors = Vec::new();
        if self.plan_id.trim().is_empty() {
            errors.push(ContractValidationError::non_empty("plan_id"));
        }
        if self.objective.trim().is_empty() {
            errors.push(ContractValidationError::non_empty("objective"));
        }
        errors
    }
}

/// A plan produced by the planner, as handed back into the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanArtifact {
    /// Must match the originating [`PlanRequest::plan_id`].
    pub plan_id: String,
    /// Current lifecycle state.
    pub status: PlanStatus,
    /// Ordered, non-empty list of step descriptions.
    pub steps: Vec<String>,
}

impl Validate for PlanArtifact {
    fn validate(&self) -> Vec<ContractValidationError> {
        let mut errors = Vec::new();
        if self.plan_id.trim().is_empty() {
            errors.push(ContractValidationError::non_empty("plan_id"));
        }
        if self.steps.is_empty() {
            errors.push(ContractValidationError::non_empty("steps"));
        }
        for (index, step) in self.steps.iter().enumerate() {
            if step.trim().is_empty() {
                errors.push(ContractValidationError::non_empty(format!("steps[{index}]")));
            }
        }
        errors
    }
}

/// A single unit of work dispatched to the (out-of-scope) executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEnvelope {
    /// Caller-assigned task identifier.
    pub task_id: String,
    /// The plan this task belongs to.
    pub plan_id: String,
    /// Free-text description of the work.
    pub description: String,
    /// Current lifecycle state.
    pub status: TaskStatus,
}

impl Validate for TaskEnvelope {
    fn validate(&self) -> Vec<ContractValidationError> {
        let mut errors = Vec::new();
        if self.task_id.trim().is_empty() {
            errors.push(ContractValidationError::non_empty("task_id"));
        }
        if self.plan_id.trim().is_empty() {
            errors.push(ContractValidationError::non_empty("plan_id"));
        }
        if self.description.trim().is_empty() {
            errors.push(ContractValidationError::non_empty("description"));
        }
        errors
    }
}

/// The outcome of executing a [`TaskEnvelope`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultEnvelope {
    /// The task this is a result for.
    pub task_id: String,
    /// Whether the task succeeded.
    pub success: bool,
    /// The task's output, when it succeeded.
    pub output: Option<String>,
    /// A failure message, required when `success` is `false`.
    pub error_message: Option<String>,
}

impl Validate for ResultEnvelope {
    fn validate(&self) -> Vec<ContractValidationError> {
        let mut errors = Vec::new();
        if self.task_id.trim().is_empty() {
            errors.push(ContractValidationError::non_empty("task_id"));
        }
        if !self.success
            && self
                .error_message
                .as_ref()
                .is_none_or(|message| message.trim().is_empty())
        {
            errors.push(ContractValidationError::non_empty("error_message"));
        }
        errors
    }
}

const ESCALATION_CATEGORIES: [&str; 7] = [
    "rate_limit",
    "auth",
    "timeout",
    "invalid_request",
    "server_error",
    "network",
    "unknown",
];

/// A boundary-crossing description of an escalated call, distinct from the
/// in-process [`crate::escalation::EscalationInfo`] it is usually built
/// from: this is the envelope shape validated when an escalation is handed
/// to an external collaborator (e.g. serialized into a user-facing report).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationSignal {
    /// One of the seven closed error-taxonomy category names.
    pub category: String,
    /// The provider name.
    pub provider: String,
    /// The provider-specific model identifier.
    pub model: String,
    /// Latency in milliseconds, must be non-negative.
    pub latency_ms: i64,
    /// Retry count, must be non-negative.
    pub retry_count: i64,
    /// Human-readable reason for the escalation.
    pub reason: String,
}

impl Validate for EscalationSignal {
    fn validate(&self) -> Vec<ContractValidationError> {
        let mut errors = Vec::new();
        if !ESCALATION_CATEGORIES.contains(&self.category.as_str()) {
            errors.push(ContractValidationError::closed_enum("category", &self.category));
        }
        if self.provider.trim().is_empty() {
            errors.push(ContractValidationError::non_empty("provider"));
        }
        if self.model.trim().is_empty() {
            errors.push(ContractValidationError::non_empty("model"));
        }
        if self.latency_ms < 0 {
            errors.push(ContractValidationError::non_negative("latency_ms"));
        }
        if self.retry_count < 0 {
            errors.push(ContractValidationError::non_negative("retry_count"));
        }
        if self.reason.trim().is_empty() {
            errors.push(ContractValidationError::non_empty("reason"));
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_request_rejects_empty_fields() {
        let request = PlanRequest {
            plan_id: String::new(),
            objective: "  ".to_string(),
            priority: Priority::Medium,
        };
        let errors = request.validate();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().any(|e| e.path == "plan_id"));
        assert!(errors.iter().any(|e| e.path == "objective"));
    }

    #[test]
    fn plan_request_accepts_valid_input() {
        let request = PlanRequest {
            plan_id: "plan-1".to_string(),
            objective: "ship the feature".to_string(),
            priority: Priority::High,
        };
        assert!(request.validate().is_empty());
    }

    #[test]
    fn plan_artifact_reports_each_blank_step_by_index() {
        let artifact = PlanArtifact {
            plan_id: "plan-1".to_string(),
            status: PlanStatus::Active,
            steps: vec!["do thing".to_string(), String::new(), "  ".to_string()],
        };
        let errors = artifact.validate();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].path, "steps[1]");
        assert_eq!(errors[1].path, "steps[2]");
    }

    #[test]
    fn plan_artifact_rejects_empty_step_list() {
        let artifact = PlanArtifact {
            plan_id: "plan-1".to_string(),
            status: PlanStatus::Draft,
            steps: vec![],
        };
        let errors = artifact.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, "non_empty");
    }

    #[test]
    fn task_envelope_requires_all_three_string_fields() {
        let task = TaskEnvelope {
            task_id: String::new(),
            plan_id: String::new(),
            description: String::new(),
            status: TaskStatus::Pending,
        };
        assert_eq!(task.validate().len(), 3);
    }

    #[test]
    fn result_envelope_requires_error_message_on_failure() {
        let result = ResultEnvelope {
            task_id: "task-1".to_string(),
            success: false,
            output: None,
            error_message: None,
        };
        let errors = result.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, "error_message");
    }

    #[test]
    fn result_envelope_ignores_error_message_on_success() {
        let result = ResultEnvelope {
            task_id: "task-1".to_string(),
            success: true,
            output: Some("done".to_string()),
            error_message: None,
        };
        assert!(result.validate().is_empty());
    }

    #[test]
    fn escalation_signal_rejects_unrecognized_category() {
        let signal = EscalationSignal {
            category: "not_a_real_category".to_string(),
            provider: "openai".to_string(),
            model: "gpt".to_string(),
            latency_ms: 10,
            retry_count: 0,
            reason: "escalated".to_string(),
        };
        let errors = signal.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, "closed_enum");
    }

    #[test]
    fn escalation_signal_rejects_negative_counters() {
        let signal = EscalationSignal {
            category: "timeout".to_string(),
            provider: "openai".to_string(),
            model: "gpt".to_string(),
            latency_ms: -1,
            retry_count: -1,
            reason: "escalated".to_string(),
        };
        let errors = signal.validate();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.code == "non_negative"));
    }

    #[test]
    fn validate_or_throw_returns_contract_error() {
        let request = PlanRequest {
            plan_id: String::new(),
            objective: "x".to_string(),
            priority: Priority::Low,
        };
        let result = validate_or_throw(&request);
        match result {
            Err(RuntimeError::Contract(errors)) => assert_eq!(errors.len(), 1),
            other => panic!("expected Contract error, got {other:?}"),
        }
    }

    #[test]
    fn validate_or_throw_passes_valid_input() {
        let request = PlanRequest {
            plan_id: "plan-1".to_string(),
            objective: "ship it".to_string(),
            priority: Priority::Low,
        };
        assert!(validate_or_throw(&request).is_ok());
    }

    #[test]
    fn validate_or_log_reports_validity_without_erroring() {
        let valid = PlanRequest {
            plan_id: "plan-1".to_string(),
            objective: "ship it".to_string(),
            priority: Priority::Low,
        };
        let invalid = PlanRequest {
            plan_id: String::new(),
            objective: String::new(),
            priority: Priority::Low,
        };
        assert!(validate_or_log(&valid));
        assert!(!validate_or_log(&invalid));
    }
}
