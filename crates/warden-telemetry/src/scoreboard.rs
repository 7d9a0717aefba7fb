//! The in-memory scoreboard: aggregates telemetry events by
//! `(provider, model)`.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock, RwLock};

use chrono::{DateTime, Utc};

use crate::bus::{ListenerHandle, TelemetryBus};
use crate::record::{CallStatus, CallTelemetry};

const UNKNOWN: &str = "unknown";

/// Aggregate counters for one `(provider, model)` pair.
#[derive(Debug, Clone, Default)]
pub struct ScoreboardEntry {
    /// Number of successful calls.
    pub success_count: u64,
    /// Number of failed/cancelled/timed-out calls.
    pub fail_count: u64,
    /// Sum of latencies across every completed call.
    pub total_latency_ms: u64,
    /// Sum of prompt tokens across every call.
    pub total_tokens_in: u64,
    /// Sum of completion tokens across every call.
    pub total_tokens_out: u64,
    /// When the most recent event for this key was recorded.
    pub last_event_at: Option<DateTime<Utc>>,
}

impl ScoreboardEntry {
    /// Total calls observed.
    #[must_use]
    #[allow(clippy::arithmetic_side_effects)] // both counters are process-lifetime call tallies, not attacker-controlled
    pub fn total_count(&self) -> u64 {
        self.success_count + self.fail_count
    }

    /// Success rate in `[0, 1]`, or `None` if no calls have been observed.
    #[must_use]
    pub fn success_rate(&self) -> Option<f64> {
        let total = self.total_count();
        if total == 0 {
            return None;
        }
        #[allow(clippy::cast_precision_loss, clippy::arithmetic_side_effects)]
        Some(self.success_count as f64 / total as f64)
    }

    /// Average latency in milliseconds, or `None` if no calls have been
    /// observed.
    #[must_use]
    pub fn avg_latency_ms(&self) -> Option<f64> {
        let total = self.total_count();
        if total == 0 {
            return None;
        }
        #[allow(clippy::cast_precision_loss, clippy::arithmetic_side_effects)]
        Some(self.total_latency_ms as f64 / total as f64)
    }
}

fn key_for(provider: &str, model: &str) -> String {
    let provider = if provider.is_empty() { UNKNOWN } else { provider };
    let model = if model.is_empty() { UNKNOWN } else { model };
    format!("{provider}::{model}")
}

/// In-memory aggregate view of telemetry events, keyed by
/// `"<provider>::<model>"`.
#[derive(Default)]
pub struct Scoreboard {
    entries: RwLock<HashMap<String, ScoreboardEntry>>,
    listener_handle: Mutex<Option<ListenerHandle>>,
}

static GLOBAL: OnceLock<Scoreboard> = OnceLock::new();

impl Scoreboard {
    /// The process-wide scoreboard singleton.
    pub fn global() -> &'static Scoreboard {
        GLOBAL.get_or_init(Scoreboard::default)
    }

    /// Record one telemetry event into the aggregate for its
    /// `(provider, model)` key.
    #[allow(clippy::arithmetic_side_effects)] // monotonically accumulating counters, not attacker-controlled
    pub fn record(&self, event: &CallTelemetry) {
        let key = key_for(&event.provider, &event.model_id);
        let mut entries = self.entries.write().expect("scoreboard lock poisoned");
        let entry = entries.entry(key).or_default();
        match event.status {
            CallStatus::Success => entry.success_count += 1,
            CallStatus::Failure | CallStatus::Cancelled | CallStatus::Timeout => {
                entry.fail_count += 1;
            },
        }
        if let Some(latency) = event.latency_ms {
            entry.total_latency_ms += latency;
        }
        if let Some(prompt) = event.prompt_tokens {
            entry.total_tokens_in += prompt;
        }
        if let Some(completion) = event.completion_tokens {
            entry.total_tokens_out += completion;
        }
        entry.last_event_at = Some(event.completed_at.unwrap_or(event.started_at));
    }

    /// Look up the aggregate for a `(provider, model)` pair.
    #[must_use]
    pub fn get(&self, provider: &str, model: &str) -> Option<ScoreboardEntry> {
        let entries = self.entries.read().expect("scoreboard lock poisoned");
        entries.get(&key_for(provider, model)).cloned()
    }

    /// Begin listening to the global telemetry bus. Idempotent: calling
    /// this while already started has no effect.
    pub fn start(&'static self) {
        let mut handle = self.listener_handle.lock().expect("scoreboard lock poisoned");
        if handle.is_some() {
            return;
        }
        let registered = TelemetryBus::global().register_listener(Box::new(|event| {
            Scoreboard::global().record(event);
        }));
        *handle = Some(registered);
    }

    /// Stop listening to the global telemetry bus. Idempotent: calling
    /// this while already stopped has no effect.
    pub fn stop(&self) {
        let mut handle = self.listener_handle.lock().expect("scoreboard lock poisoned");
        if let Some(registered) = handle.take() {
            TelemetryBus::global().unregister_listener(registered);
        }
    }

    /// Clear every aggregate. Test affordance for the process-wide
    /// singleton; does not affect `start`/`stop` state.
    pub fn reset(&self) {
        self.entries.write().expect("scoreboard lock poisoned").clear();
    }
}
