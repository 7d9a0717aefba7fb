//! Warden Storage - embedded key-value and query storage tier.
//!
//! # Tier 1: Raw Key-Value ([`KvStore`])
//!
//! Direct byte-level `get`/`set`/`delete`/`list`. The persistent telemetry
//! store scans this tier rather than issuing relational queries, since the
//! record volume this control plane deals with (per-call telemetry for one
//! agent process) does not warrant a query planner.
//!
//! Enable the `SurrealKV`-backed implementation with the **`kv`** feature;
//! [`MemoryKvStore`] is always available for tests.
//!
//! # Tier 2: Query Engine ([`Database`])
//!
//! A full `SurrealDB` connection, available for collaborators that need
//! relational queries this crate's [`KvStore`] tier does not provide.
//! Enable with the **`db`** feature.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod error;
pub mod kv;
pub mod lockfile;

#[cfg(feature = "db")]
pub mod db;

pub use error::{StorageError, StorageResult};
pub use kv::{KvEntry, KvStore, MemoryKvStore, ScopedKvStore};
pub use lockfile::{load_or_default, update};

#[cfg(feature = "kv")]
pub use kv::SurrealKvStore;

#[cfg(feature = "db")]
pub use db::Database;
