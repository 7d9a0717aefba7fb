//! Directory resolution for warden's on-disk state.
//!
//! `WardenHome` resolves the single root directory (`~/.warden/`, or
//! `$WARDEN_HOME`) that the persisted stores live under:
//!
//! ```text
//! ~/.warden/
//! ├── sessions.json          (session store)
//! ├── auth-profiles.json     (auth profile store)
//! ├── telemetry.db/          (persistent telemetry store)
//! └── logs/                  (log output)
//! ```

use std::io;
use std::path::{Path, PathBuf};

use crate::error::{CoreError, CoreResult};

/// Global warden home directory (`~/.warden/` or `$WARDEN_HOME`).
#[derive(Debug, Clone)]
pub struct WardenHome {
    root: PathBuf,
}

impl WardenHome {
    /// Resolve the home directory.
    ///
    /// Checks `$WARDEN_HOME` first, then falls back to `$HOME/.warden/`.
    ///
    /// # Errors
    ///
    /// Returns an error if `$WARDEN_HOME` is a relative path, or if neither
    /// `$WARDEN_HOME` nor `$HOME` is set.
    pub fn resolve() -> CoreResult<Self> {
        let root = if let Ok(custom) = std::env::var("WARDEN_HOME") {
            let p = PathBuf::from(&custom);
            if !p.is_absolute() {
                return Err(CoreError::HomeNotFound(
                    "WARDEN_HOME must be an absolute path".to_string(),
                ));
            }
            p
        } else {
            let home = std::env::var("HOME").map_err(|_| {
                CoreError::HomeNotFound(
                    "neither WARDEN_HOME nor HOME environment variable is set".to_string(),
                )
            })?;
            PathBuf::from(home).join(".warden")
        };

        Ok(Self { root })
    }

    /// Create from an explicit path (useful for testing).
    #[must_use]
    pub fn from_path(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Ensure the root directory exists.
    ///
    /// # Errors
    ///
    /// Returns an error if directory creation fails.
    pub fn ensure(&self) -> io::Result<()> {
        std::fs::create_dir_all(&self.root)
    }

    /// Root directory path.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path to the session store file.
    #[must_use]
    pub fn sessions_path(&self) -> PathBuf {
        self.root.join("sessions.json")
    }

    /// Path to the auth profile store file.
    #[must_use]
    pub fn auth_profiles_path(&self) -> PathBuf {
        self.root.join("auth-profiles.json")
    }

    /// Path to the persistent telemetry store.
    #[must_use]
    pub fn telemetry_db_path(&self) -> PathBuf {
        self.root.join("telemetry.db")
    }

    /// Logs directory.
    #[must_use]
    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_path_roundtrip() {
        let home = WardenHome::from_path("/tmp/warden-test");
        assert_eq!(home.root(), Path::new("/tmp/warden-test"));
        assert_eq!(
            home.sessions_path(),
            Path::new("/tmp/warden-test/sessions.json")
        );
        assert_eq!(
            home.auth_profiles_path(),
            Path::new("/tmp/warden-test/auth-profiles.json")
        );
    }

    #[test]
    #[allow(unsafe_code)]
    fn resolve_rejects_relative_warden_home() {
        // SAFETY: test-only env mutation, no concurrent access in this process.
        unsafe {
            std::env::set_var("WARDEN_HOME", "relative/path");
        }
        let result = WardenHome::resolve();
        unsafe {
            std::env::remove_var("WARDEN_HOME");
        }
        assert!(result.is_err());
    }
}
