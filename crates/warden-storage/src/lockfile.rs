//! Advisory-locked, atomically-written JSON document stores.
//!
//! Every persisted store in this workspace (session metadata, auth
//! profiles) is a single JSON document guarded by a `.lk` sibling lock
//! file. Readers take a shared lock, writers an exclusive one; writes go
//! to a temp file in the same directory, are fsynced, then renamed into
//! place so a crash mid-write never leaves a torn document.

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{StorageError, StorageResult};

enum LockMode {
    Shared,
    Exclusive,
}

/// Acquire an advisory file lock on a `.lk` sibling of `path`.
///
/// Returns `None` in shared mode when the lock file doesn't exist yet —
/// there's nothing to coordinate with. In exclusive mode the lock file
/// and its parent directories are created as needed.
fn acquire_lock_file(path: &Path, mode: LockMode) -> StorageResult<Option<std::fs::File>> {
    use fs2::FileExt;

    let lock_path = path.with_extension("lk");

    match mode {
        LockMode::Shared => match std::fs::OpenOptions::new().read(true).open(&lock_path) {
            Ok(lock_file) => {
                lock_file
                    .lock_shared()
                    .map_err(|e| StorageError::Internal(format!("failed to acquire shared lock: {e}")))?;
                Ok(Some(lock_file))
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Internal(format!("failed to open lock file: {e}"))),
        },
        LockMode::Exclusive => {
            if let Some(parent) = lock_path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StorageError::Internal(format!("failed to create lock directory: {e}")))?;
            }

            let lock_file = std::fs::OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .read(true)
                .open(&lock_path)
                .map_err(|e| StorageError::Internal(format!("failed to open lock file: {e}")))?;

            lock_file
                .lock_exclusive()
                .map_err(|e| StorageError::Internal(format!("failed to acquire exclusive lock: {e}")))?;

            Ok(Some(lock_file))
        },
    }
}

fn read_or_default<T: Default + DeserializeOwned>(path: &Path) -> StorageResult<T> {
    match std::fs::read_to_string(path) {
        Ok(content) if content.trim().is_empty() => Ok(T::default()),
        Ok(content) => {
            serde_json::from_str(&content).map_err(|e| StorageError::Serialization(format!("malformed store at {}: {e}", path.display())))
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(StorageError::Internal(format!("failed to read {}: {e}", path.display()))),
    }
}

fn write_atomic<T: Serialize>(path: &Path, value: &T) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| StorageError::Internal(format!("failed to create parent directory: {e}")))?;
    }

    let body = serde_json::to_string_pretty(value)
        .map_err(|e| StorageError::Serialization(format!("failed to serialize store: {e}")))?;

    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .map_err(|e| StorageError::Internal(format!("failed to create temp file: {e}")))?;

    tmp.write_all(body.as_bytes())
        .map_err(|e| StorageError::Internal(format!("failed to write temp file: {e}")))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| StorageError::Internal(format!("failed to sync temp file: {e}")))?;
    tmp.persist(path)
        .map_err(|e| StorageError::Internal(format!("failed to replace store atomically: {e}")))?;

    Ok(())
}

/// Load a JSON document store, treating a missing file as the type's
/// default value. Fails closed: a present-but-malformed file is an
/// error, never silently discarded or rewritten.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_or_default<T: Default + DeserializeOwned>(path: &Path) -> StorageResult<T> {
    let _lock_guard = acquire_lock_file(path, LockMode::Shared)?;
    read_or_default(path)
}

/// Atomically load, mutate, and persist a JSON document store under a
/// single exclusive lock, preventing a read-modify-write race between
/// concurrent updaters.
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsed, or written, or
/// if `f` returns an error.
pub fn update<T, F, E>(path: &Path, f: F) -> Result<(), E>
where
    T: Default + DeserializeOwned + Serialize,
    F: FnOnce(&mut T) -> Result<(), E>,
    E: From<StorageError>,
{
    let _lock_guard = acquire_lock_file(path, LockMode::Exclusive)?;

    let mut value: T = read_or_default(path)?;
    f(&mut value)?;
    write_atomic(path, &value)?;

    Ok(())
}
