//! Auth Profile Store (O): a lock-serialized, atomically-written JSON file
//! mapping profile id to [`Credential`], mirroring the session store's
//! update discipline exactly.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CredentialsResult;

/// A stored credential. Never logged in full — callers that need to report
/// on credential presence should log the provider and profile id only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Credential {
    /// A bearer API key.
    ApiKey {
        /// The provider this credential authenticates against.
        provider: String,
        /// The key material.
        key: String,
    },
    /// An OAuth-style access/session token.
    Token {
        /// The provider this credential authenticates against.
        provider: String,
        /// The token material.
        token: String,
    },
}

impl Credential {
    /// The provider this credential authenticates against.
    #[must_use]
    pub fn provider(&self) -> &str {
        match self {
            Self::ApiKey { provider, .. } | Self::Token { provider, .. } => provider,
        }
    }
}

/// The profile id reserved for a provider's environment-imported
/// credential: `"<provider>:env"`.
#[must_use]
pub fn env_profile_id(provider: &str) -> String {
    format!("{provider}:env")
}

fn default_version() -> u32 {
    1
}

/// The `{version, profiles}` document persisted to `auth-profiles.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthProfileDocument {
    /// Document format version.
    #[serde(default = "default_version")]
    pub version: u32,
    /// Profile id to credential.
    #[serde(default)]
    pub profiles: BTreeMap<String, Credential>,
}

impl Default for AuthProfileDocument {
    fn default() -> Self {
        Self {
            version: default_version(),
            profiles: BTreeMap::new(),
        }
    }
}

impl AuthProfileDocument {
    /// Whether any profile in this document authenticates the given
    /// provider (by `Credential::provider`, not by profile id naming).
    #[must_use]
    pub fn has_profile_for_provider(&self, provider: &str) -> bool {
        self.profiles.values().any(|c| c.provider() == provider)
    }
}

/// A single JSON document at `path`, mapping profile id to [`Credential`],
/// guarded by the advisory-lock discipline in `warden-storage`.
pub struct AuthProfileStore {
    path: PathBuf,
}

impl AuthProfileStore {
    /// Open an auth profile store backed by the JSON file at `path`. The
    /// file is created on first write; a missing file reads as an empty
    /// document.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the full document. A missing file reads as an empty document
    /// at the default version.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(&self) -> CredentialsResult<AuthProfileDocument> {
        Ok(warden_storage::load_or_default(&self.path)?)
    }

    /// Read a single profile, if present, without taking an exclusive lock.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn get(&self, profile_id: &str) -> CredentialsResult<Option<Credential>> {
        Ok(self.load()?.profiles.get(profile_id).cloned())
    }

    /// Atomically load, mutate, and persist the document under a single
    /// exclusive lock.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or written, or
    /// if `f` returns an error (in which case nothing is written).
    pub fn update<F>(&self, f: F) -> CredentialsResult<()>
    where
        F: FnOnce(&mut AuthProfileDocument) -> CredentialsResult<()>,
    {
        Ok(warden_storage::update::<AuthProfileDocument, _, crate::error::CredentialsError>(
            &self.path, f,
        )?)
    }

    /// Insert or replace a single profile directly. Prefer
    /// [`crate::autosync_env_credentials_to_auth_profiles`] for the
    /// fail-closed environment import path; this is for explicit,
    /// caller-initiated profile management.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or written.
    pub fn set_profile(&self, profile_id: &str, credential: Credential) -> CredentialsResult<()> {
        self.update(|doc| {
            doc.profiles.insert(profile_id.to_string(), credential);
            Ok(())
        })
    }
}
