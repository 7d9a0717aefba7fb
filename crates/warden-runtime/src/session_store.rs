//! Session Store (N): a lock-serialized, atomically-written JSON file
//! mapping session key to [`SessionEntry`], including the rate-limit
//! timestamps the auto-compact guard (M) persists across restarts.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RuntimeResult;

/// Per-session metadata persisted across process restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEntry {
    /// The session this entry describes.
    pub session_id: String,
    /// When this entry was last written. Never decreases for a given key.
    pub updated_at: DateTime<Utc>,
    /// Total tokens consumed by the session so far.
    pub total_tokens: Option<u64>,
    /// Tokens currently occupying the session's context window.
    pub context_tokens: Option<u64>,
    /// When auto-compaction last ran for this session.
    pub session_auto_compact_last_at: Option<DateTime<Utc>>,
    /// `total_tokens` at the time auto-compaction last ran.
    pub session_auto_compact_last_at_tokens: Option<u64>,
    /// When a token-pressure warning was last surfaced for this session.
    pub session_token_warning_last_at: Option<DateTime<Utc>>,
    /// `total_tokens` at the time the last token-pressure warning fired.
    pub session_token_warning_last_at_tokens: Option<u64>,
}

impl SessionEntry {
    /// Construct a fresh entry for a session, stamped with the current
    /// time.
    #[must_use]
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            updated_at: Utc::now(),
            total_tokens: None,
            context_tokens: None,
            session_auto_compact_last_at: None,
            session_auto_compact_last_at_tokens: None,
            session_token_warning_last_at: None,
            session_token_warning_last_at_tokens: None,
        }
    }
}

/// A single JSON document at `path`, mapping session key to
/// [`SessionEntry`], guarded by the advisory-lock discipline in
/// `warden-storage`.
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    /// Open a session store backed by the JSON file at `path`. The file is
    /// created on first write; a missing file reads as empty.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the full document. A missing file reads as an empty map.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(&self) -> RuntimeResult<BTreeMap<String, SessionEntry>> {
        Ok(warden_storage::load_or_default(&self.path)?)
    }

    /// Read a single session's entry, if present, without taking an
    /// exclusive lock.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn get(&self, session_key: &str) -> RuntimeResult<Option<SessionEntry>> {
        Ok(self.load()?.get(session_key).cloned())
    }

    /// Atomically load, mutate, and persist one session's entry under a
    /// single exclusive lock. Creates the entry (via [`SessionEntry::new`])
    /// if it doesn't already exist. `updated_at` is bumped to the current
    /// time (never decreasing) as part of every update.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or written.
    pub fn update<F>(&self, session_key: &str, f: F) -> RuntimeResult<SessionEntry>
    where
        F: FnOnce(&mut SessionEntry),
    {
        let mut updated = None;
        warden_storage::update::<BTreeMap<String, SessionEntry>, _, crate::error::RuntimeError>(&self.path, |doc| {
            let entry = doc
                .entry(session_key.to_string())
                .or_insert_with(|| SessionEntry::new(session_key));
            f(entry);
            entry.updated_at = entry.updated_at.max(Utc::now());
            updated = Some(entry.clone());
            Ok(())
        })?;
        Ok(updated.expect("updater always records the resulting entry"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("sessions.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn update_creates_entry_and_applies_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("sessions.json"));

        let entry = store
            .update("session-1", |entry| {
                entry.total_tokens = Some(1_000);
            })
            .unwrap();

        assert_eq!(entry.total_tokens, Some(1_000));
        assert_eq!(store.get("session-1").unwrap().unwrap().total_tokens, Some(1_000));
    }

    #[test]
    fn updated_at_never_decreases() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("sessions.json"));

        let first = store.update("session-1", |_| {}).unwrap();
        let second = store.update("session-1", |_| {}).unwrap();
        assert!(second.updated_at >= first.updated_at);
    }

    #[test]
    fn two_fresh_sessions_both_survive_concurrent_style_updates() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("sessions.json"));

        store.update("a", |entry| entry.total_tokens = Some(1)).unwrap();
        store.update("b", |entry| entry.total_tokens = Some(2)).unwrap();

        let doc = store.load().unwrap();
        assert_eq!(doc.len(), 2);
        assert_eq!(doc["a"].total_tokens, Some(1));
        assert_eq!(doc["b"].total_tokens, Some(2));
    }
}
