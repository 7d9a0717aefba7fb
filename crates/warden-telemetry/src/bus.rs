//! The in-process telemetry bus: event emission, listener registry,
//! and the `with_telemetry` scoped timing helper.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{OnceLock, RwLock};

use chrono::Utc;

use crate::record::{CallRole, CallStatus, CallTelemetry};
use crate::trace::current_trace_context;

/// A registered listener callback. Listeners are synchronous and must not
/// panic across the bus boundary; a panicking listener is caught and
/// logged rather than allowed to prevent other listeners from running.
pub type Listener = Box<dyn Fn(&CallTelemetry) + Send + Sync>;

/// A handle returned from [`TelemetryBus::register_listener`], used to
/// unregister it later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle(u64);

/// The process-wide telemetry bus.
///
/// Events fan out to every registered listener in registration order. A
/// listener that panics is caught (via [`std::panic::catch_unwind`]) and
/// logged, rather than aborting the emission or skipping later listeners.
#[derive(Default)]
pub struct TelemetryBus {
    listeners: RwLock<Vec<(u64, Listener)>>,
    next_id: AtomicU64,
}

static GLOBAL: OnceLock<TelemetryBus> = OnceLock::new();

impl TelemetryBus {
    /// The process-wide bus singleton.
    pub fn global() -> &'static TelemetryBus {
        GLOBAL.get_or_init(TelemetryBus::default)
    }

    /// Register a listener. Returns a handle that can later be passed to
    /// [`Self::unregister_listener`].
    pub fn register_listener(&self, listener: Listener) -> ListenerHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .write()
            .expect("telemetry bus lock poisoned")
            .push((id, listener));
        ListenerHandle(id)
    }

    /// Remove a previously registered listener. Removing an already-gone
    /// handle is not an error.
    pub fn unregister_listener(&self, handle: ListenerHandle) {
        self.listeners
            .write()
            .expect("telemetry bus lock poisoned")
            .retain(|(id, _)| *id != handle.0);
    }

    /// Emit a telemetry event: fill in `trace_id` from the ambient trace
    /// context if absent, log at `debug` (success) or `warn` (otherwise),
    /// then fan out to every registered listener. Returns the enriched
    /// event.
    pub fn emit_telemetry(&self, mut event: CallTelemetry) -> CallTelemetry {
        if event.trace_id.is_empty() {
            if let Some(ctx) = current_trace_context() {
                event.trace_id = ctx.trace_id;
            }
        }

        match event.status {
            CallStatus::Success => {
                tracing::debug!(
                    trace_id = %event.trace_id,
                    provider = %event.provider,
                    model_id = %event.model_id,
                    "telemetry: call succeeded"
                );
            },
            CallStatus::Failure | CallStatus::Cancelled | CallStatus::Timeout => {
                tracing::warn!(
                    trace_id = %event.trace_id,
                    provider = %event.provider,
                    model_id = %event.model_id,
                    error = event.error_message.as_deref().unwrap_or(""),
                    "telemetry: call did not succeed"
                );
            },
        }

        let listeners = self.listeners.read().expect("telemetry bus lock poisoned");
        for (_, listener) in listeners.iter() {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| listener(&event)));
            if result.is_err() {
                tracing::warn!("telemetry listener panicked; continuing with remaining listeners");
            }
        }

        event
    }

    /// Remove every registered listener. Test affordance for the
    /// process-wide singleton.
    pub fn reset(&self) {
        self.listeners
            .write()
            .expect("telemetry bus lock poisoned")
            .clear();
    }
}

/// The fields known before a call starts, used to seed [`with_telemetry`].
#[derive(Debug, Clone)]
pub struct TelemetryCallOptions {
    /// Trace id; left empty to pick up the ambient trace context.
    pub trace_id: String,
    /// Request id.
    pub request_id: String,
    /// Provider-specific model identifier.
    pub model_id: String,
    /// Provider name.
    pub provider: String,
    /// The role this call plays.
    pub role: CallRole,
}

/// Time `fut`, emitting a success event with latency on normal return, or
/// a failure event carrying the error's message on error — then
/// propagating whatever `fut` produced.
pub async fn with_telemetry<F, T, E>(opts: TelemetryCallOptions, fut: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: warden_llm::Classifiable + std::fmt::Display,
{
    let started_at = Utc::now();
    let mut record = CallTelemetry::started(
        opts.trace_id,
        opts.request_id,
        opts.model_id,
        opts.provider,
        opts.role,
        started_at,
    );

    let outcome = fut.await;
    let completed_at = Utc::now();
    #[allow(clippy::arithmetic_side_effects)]
    let latency_ms = (completed_at - started_at).num_milliseconds().max(0) as u64;
    record.completed_at = Some(completed_at);
    record.latency_ms = Some(latency_ms);

    match &outcome {
        Ok(_) => {
            record.status = CallStatus::Success;
        },
        Err(err) => {
            let category = warden_llm::categorize_error(Some(&err.call_failure()));
            record.mark_failed(category, err.to_string());
        },
    }

    TelemetryBus::global().emit_telemetry(record);
    outcome
}
