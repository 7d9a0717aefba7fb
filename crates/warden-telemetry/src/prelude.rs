//! Prelude module - commonly used types for convenient import.
//!
//! Use `use warden_telemetry::prelude::*;` to import all essential types.

// Errors
pub use crate::{TelemetryError, TelemetryResult};

// Logging configuration
pub use crate::{LogConfig, LogFormat, LogTarget};

// Setup functions
pub use crate::{setup_default_logging, setup_logging};

// Trace propagation
pub use crate::{TraceContext, create_child_span, create_trace_context, current_trace_context, with_trace_context};

// Call telemetry
pub use crate::{CallRole, CallStatus, CallTelemetry, ErrorKind, TelemetryBus, TelemetryCallOptions, with_telemetry};

// Aggregates and stores
pub use crate::{Scoreboard, TelemetryFilter, TelemetryStore};
