//! Auth Profile Store & Environment Autosync (O): a lock-serialized,
//! atomically-written JSON store mapping profile id to credential, plus a
//! fail-closed importer that seeds profiles from recognized provider
//! environment variables.
//!
//! Shares the exact lock-then-read-update-write discipline used by
//! `warden_runtime::SessionStore`, built on the same `warden-storage`
//! primitives.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod env;
mod error;
mod store;

pub use env::{KNOWN_PROVIDERS, ResolvedCredential, autosync_env_credentials_to_auth_profiles, resolve_env_credential};
pub use error::{CredentialsError, CredentialsResult};
pub use store::{AuthProfileDocument, AuthProfileStore, Credential, env_profile_id};
