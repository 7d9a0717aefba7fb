//! Warden Core - shared identifiers and filesystem conventions for the
//! warden agent runtime control plane.
//!
//! This crate provides:
//! - `SessionId` and `Timestamp` used across telemetry, runtime, and
//!   credential crates.
//! - `WardenHome`, resolving the on-disk home directory that session and
//!   auth-profile stores live under.
//! - `truncate_to_boundary`, a UTF-8-safe byte-length truncation primitive
//!   used by the tool-result truncator.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod dirs;
pub mod error;
pub mod types;
pub mod utils;

pub use dirs::WardenHome;
pub use error::{CoreError, CoreResult};
pub use types::{Level, SessionId, Timestamp};
pub use utils::truncate_to_boundary;
