//! Warden Telemetry - trace propagation, call telemetry, and logging for
//! the warden agent control plane.
//!
//! This crate provides:
//! - [`TraceContext`] and the task-local helpers that propagate it across
//!   nested async calls.
//! - [`CallTelemetry`], the closed-set per-call record, and
//!   [`TelemetryBus`]/[`with_telemetry`], the emission path that fills
//!   and dispatches it.
//! - [`Scoreboard`], an in-memory `(provider, model)` aggregate fed from
//!   the bus.
//! - [`TelemetryStore`], durable record storage with routing-scoreboard
//!   aggregation and regression detection.
//! - [`LogConfig`]/[`setup_logging`], configurable `tracing` setup.
//!
//! # Example
//!
//! ```rust,no_run
//! use warden_telemetry::prelude::*;
//!
//! # fn main() -> TelemetryResult<()> {
//! let config = LogConfig::new("debug").with_format(LogFormat::Pretty);
//! setup_logging(&config)?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod prelude;

mod bus;
mod error;
mod logging;
mod record;
mod scoreboard;
mod store;
mod trace;

pub use bus::{ListenerHandle, TelemetryBus, TelemetryCallOptions, with_telemetry};
pub use error::{TelemetryError, TelemetryResult};
pub use logging::{FileLogConfig, FileRotation, LogConfig, LogFormat, LogTarget, setup_default_logging, setup_logging};
pub use record::{CallRole, CallStatus, CallTelemetry, ErrorKind};
pub use scoreboard::{Scoreboard, ScoreboardEntry};
pub use store::{
    RegressionAlert, RegressionMetric, RegressionSeverity, RegressionThresholds, RoutingScoreboardEntry,
    TelemetryFilter, TelemetryStore,
};
pub use trace::{
    AttributeValue, TraceContext, create_child_span, create_trace_context, current_trace_context,
    generate_span_id, generate_trace_id, with_trace_context,
};
