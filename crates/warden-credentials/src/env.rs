//! Environment credential resolution and fail-closed autosync (O).
//!
//! The resolver maps a provider's normalized id to an ordered list of
//! candidate environment variable names, preferring OAuth tokens over API
//! keys where both are defined. `google-vertex` is deliberately absent from
//! [`KNOWN_PROVIDERS`]: it authenticates via external credential providers
//! (ADC, workload identity, …), not environment variables.

use std::collections::HashSet;

use crate::error::CredentialsResult;
use crate::store::{AuthProfileStore, Credential, env_profile_id};

/// Which `Credential` variant a resolved environment variable produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CandidateKind {
    ApiKey,
    Token,
}

struct Candidate {
    var_name: &'static str,
    kind: CandidateKind,
}

const fn api_key(var_name: &'static str) -> Candidate {
    Candidate {
        var_name,
        kind: CandidateKind::ApiKey,
    }
}

const fn token(var_name: &'static str) -> Candidate {
    Candidate {
        var_name,
        kind: CandidateKind::Token,
    }
}

/// The providers recognized by environment autosync, in the order they are
/// considered. `google-vertex` is intentionally not included.
pub const KNOWN_PROVIDERS: &[&str] = &[
    "openai",
    "anthropic",
    "gemini",
    "groq",
    "cerebras",
    "xai",
    "openrouter",
    "moonshot",
    "mistral",
    "ollama",
    "chutes",
    "zai",
    "opencode",
    "qwen-portal",
    "minimax-portal",
    "kimi-coding",
    "github-copilot",
];

/// Ordered candidate environment variables for a normalized provider id, or
/// `None` if the provider is not recognized by env autosync.
///
/// Order matters: earlier entries are preferred, and OAuth/token entries
/// precede API-key entries wherever a provider has both, per §4.O.
fn candidates_for(provider: &str) -> Option<Vec<Candidate>> {
    Some(match provider {
        "openai" => vec![api_key("OPENAI_API_KEY")],
        "anthropic" => vec![token("ANTHROPIC_OAUTH_TOKEN"), api_key("ANTHROPIC_API_KEY")],
        "gemini" => vec![api_key("GEMINI_API_KEY")],
        "groq" => vec![api_key("GROQ_API_KEY")],
        "cerebras" => vec![api_key("CEREBRAS_API_KEY")],
        "xai" => vec![api_key("XAI_API_KEY")],
        "openrouter" => vec![api_key("OPENROUTER_API_KEY")],
        "moonshot" => vec![api_key("MOONSHOT_API_KEY")],
        "mistral" => vec![api_key("MISTRAL_API_KEY")],
        "ollama" => vec![api_key("OLLAMA_API_KEY")],
        "chutes" => vec![token("CHUTES_OAUTH_TOKEN"), api_key("CHUTES_API_KEY")],
        "zai" => vec![token("ZAI_OAUTH_TOKEN"), api_key("ZAI_API_KEY")],
        "opencode" => vec![token("OPENCODE_OAUTH_TOKEN"), api_key("OPENCODE_API_KEY")],
        "qwen-portal" => vec![token("QWEN_PORTAL_OAUTH_TOKEN"), api_key("QWEN_PORTAL_API_KEY")],
        "minimax-portal" => vec![
            token("MINIMAX_PORTAL_OAUTH_TOKEN"),
            api_key("MINIMAX_PORTAL_API_KEY"),
        ],
        "kimi-coding" => vec![token("KIMI_CODING_OAUTH_TOKEN"), api_key("KIMI_CODING_API_KEY")],
        // Three-way preference order per §6: COPILOT_GITHUB_TOKEN, GH_TOKEN, GITHUB_TOKEN.
        "github-copilot" => vec![token("COPILOT_GITHUB_TOKEN"), token("GH_TOKEN"), token("GITHUB_TOKEN")],
        _ => return None,
    })
}

/// A credential resolved from the environment, along with where it came
/// from. The provenance fields exist purely for observability (logging);
/// they are not part of the persisted [`Credential`].
#[derive(Debug, Clone)]
pub struct ResolvedCredential {
    /// The resolved credential.
    pub credential: Credential,
    /// The environment variable it was read from.
    pub source_var: &'static str,
    /// Whether `source_var` was marked as originating from an applied
    /// shell profile.
    pub shell_profile: bool,
}

impl ResolvedCredential {
    /// The provenance label: `"shell:VAR"` if sourced from an applied shell
    /// profile, `"env:VAR"` otherwise.
    #[must_use]
    pub fn source_label(&self) -> String {
        let prefix = if self.shell_profile { "shell" } else { "env" };
        format!("{prefix}:{}", self.source_var)
    }
}

/// Resolve a credential for `provider` from the process environment,
/// trying candidates in preference order and stopping at the first one
/// that is set and non-empty.
///
/// `shell_profile_vars` names variables known to have been populated by an
/// applied shell profile (as opposed to the ambient process environment);
/// this only affects [`ResolvedCredential::source_label`], never which
/// candidate wins.
#[must_use]
pub fn resolve_env_credential(provider: &str, shell_profile_vars: &HashSet<String>) -> Option<ResolvedCredential> {
    let candidates = candidates_for(provider)?;
    for candidate in candidates {
        if let Ok(value) = std::env::var(candidate.var_name) {
            if value.is_empty() {
                continue;
            }
            let credential = match candidate.kind {
                CandidateKind::ApiKey => Credential::ApiKey {
                    provider: provider.to_string(),
                    key: value,
                },
                CandidateKind::Token => Credential::Token {
                    provider: provider.to_string(),
                    token: value,
                },
            };
            return Some(ResolvedCredential {
                credential,
                source_var: candidate.var_name,
                shell_profile: shell_profile_vars.contains(candidate.var_name),
            });
        }
    }
    None
}

/// Fail-closed environment credential autosync (§4.O).
///
/// For each provider in [`KNOWN_PROVIDERS`], adds the `"<provider>:env"`
/// profile only when all of the following hold:
/// 1. The provider currently has zero profiles in the store (checked by
///    `Credential::provider`, not by profile id).
/// 2. A credential is resolvable from the environment.
/// 3. The reserved profile id is not already present.
///
/// Existing profiles are never overwritten. A provider with no resolvable
/// credential is simply skipped; it does not affect any other provider's
/// outcome. The entire update is applied atomically under one file lock —
/// either every provider's import lands together, or (if the store cannot
/// be read, parsed, or written) none of it does.
///
/// Returns the number of profiles added.
///
/// # Errors
///
/// Returns an error if the store cannot be read, parsed, or written.
pub fn autosync_env_credentials_to_auth_profiles(
    store: &AuthProfileStore,
    shell_profile_vars: &HashSet<String>,
) -> CredentialsResult<usize> {
    let mut added = 0usize;

    store.update(|doc| {
        for &provider in KNOWN_PROVIDERS {
            if doc.has_profile_for_provider(provider) {
                continue;
            }

            let reserved_id = env_profile_id(provider);
            if doc.profiles.contains_key(&reserved_id) {
                continue;
            }

            let Some(resolved) = resolve_env_credential(provider, shell_profile_vars) else {
                continue;
            };

            tracing::debug!(provider, source = %resolved.source_label(), "env autosync: imported credential");
            doc.profiles.insert(reserved_id, resolved.credential);
            added = added.saturating_add(1);
        }
        Ok(())
    })?;

    Ok(added)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variable mutation is process-global; serialize these tests.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    struct EnvGuard {
        vars: Vec<&'static str>,
    }

    impl EnvGuard {
        #[allow(unsafe_code)]
        fn set(pairs: &[(&'static str, &str)]) -> Self {
            let vars: Vec<&'static str> = pairs.iter().map(|(k, _)| *k).collect();
            for (k, v) in pairs {
                // SAFETY: test-only env mutation, serialized by ENV_LOCK.
                unsafe {
                    std::env::set_var(k, v);
                }
            }
            Self { vars }
        }
    }

    impl Drop for EnvGuard {
        #[allow(unsafe_code)]
        fn drop(&mut self) {
            for var in &self.vars {
                // SAFETY: test-only env mutation, serialized by ENV_LOCK.
                unsafe {
                    std::env::remove_var(var);
                }
            }
        }
    }

    #[test]
    fn resolves_api_key_when_set() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guard = EnvGuard::set(&[("OPENAI_API_KEY", "sk-test")]);

        let resolved = resolve_env_credential("openai", &HashSet::new()).unwrap();
        assert_eq!(resolved.credential.provider(), "openai");
        assert_eq!(resolved.source_var, "OPENAI_API_KEY");
        assert_eq!(resolved.source_label(), "env:OPENAI_API_KEY");
    }

    #[test]
    fn prefers_oauth_token_over_api_key() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guard = EnvGuard::set(&[("ANTHROPIC_OAUTH_TOKEN", "oauth-tok"), ("ANTHROPIC_API_KEY", "sk-test")]);

        let resolved = resolve_env_credential("anthropic", &HashSet::new()).unwrap();
        assert_eq!(resolved.source_var, "ANTHROPIC_OAUTH_TOKEN");
        assert!(matches!(resolved.credential, Credential::Token { .. }));
    }

    #[test]
    fn github_copilot_prefers_copilot_token_then_gh_then_github() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guard = EnvGuard::set(&[("GH_TOKEN", "gh-tok"), ("GITHUB_TOKEN", "gh-classic")]);

        let resolved = resolve_env_credential("github-copilot", &HashSet::new()).unwrap();
        assert_eq!(resolved.source_var, "GH_TOKEN");
    }

    #[test]
    fn unknown_provider_resolves_to_none() {
        let _lock = ENV_LOCK.lock().unwrap();
        assert!(resolve_env_credential("google-vertex", &HashSet::new()).is_none());
    }

    #[test]
    fn shell_profile_vars_affect_only_the_label() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guard = EnvGuard::set(&[("OPENAI_API_KEY", "sk-test")]);
        let mut shell_vars = HashSet::new();
        shell_vars.insert("OPENAI_API_KEY".to_string());

        let resolved = resolve_env_credential("openai", &shell_vars).unwrap();
        assert_eq!(resolved.source_label(), "shell:OPENAI_API_KEY");
    }

    #[test]
    fn autosync_adds_profile_when_env_set_and_store_empty() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guard = EnvGuard::set(&[("OPENAI_API_KEY", "sk-test")]);

        let dir = tempfile::tempdir().unwrap();
        let store = AuthProfileStore::new(dir.path().join("auth-profiles.json"));

        let added = autosync_env_credentials_to_auth_profiles(&store, &HashSet::new()).unwrap();
        assert_eq!(added, 1);

        let doc = store.load().unwrap();
        let cred = doc.profiles.get("openai:env").unwrap();
        assert_eq!(cred.provider(), "openai");
        assert!(matches!(cred, Credential::ApiKey { key, .. } if key == "sk-test"));
    }

    #[test]
    fn autosync_is_idempotent() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guard = EnvGuard::set(&[("OPENAI_API_KEY", "sk-test")]);

        let dir = tempfile::tempdir().unwrap();
        let store = AuthProfileStore::new(dir.path().join("auth-profiles.json"));

        let first = autosync_env_credentials_to_auth_profiles(&store, &HashSet::new()).unwrap();
        let second = autosync_env_credentials_to_auth_profiles(&store, &HashSet::new()).unwrap();

        assert_eq!(first, 1);
        assert_eq!(second, 0);
        assert_eq!(store.load().unwrap().profiles.len(), 1);
    }

    #[test]
    fn autosync_never_overwrites_existing_profile_for_provider() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guard = EnvGuard::set(&[("OPENAI_API_KEY", "sk-from-env")]);

        let dir = tempfile::tempdir().unwrap();
        let store = AuthProfileStore::new(dir.path().join("auth-profiles.json"));
        store
            .set_profile(
                "openai:manual",
                Credential::ApiKey {
                    provider: "openai".to_string(),
                    key: "sk-manual".to_string(),
                },
            )
            .unwrap();

        let added = autosync_env_credentials_to_auth_profiles(&store, &HashSet::new()).unwrap();
        assert_eq!(added, 0);
        assert!(!store.load().unwrap().profiles.contains_key("openai:env"));
    }

    #[test]
    fn autosync_skips_providers_with_no_resolvable_credential_without_blocking_others() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guard = EnvGuard::set(&[("GEMINI_API_KEY", "gem-key")]);

        let dir = tempfile::tempdir().unwrap();
        let store = AuthProfileStore::new(dir.path().join("auth-profiles.json"));

        let added = autosync_env_credentials_to_auth_profiles(&store, &HashSet::new()).unwrap();
        assert_eq!(added, 1);
        let doc = store.load().unwrap();
        assert!(doc.profiles.contains_key("gemini:env"));
        assert!(!doc.profiles.contains_key("openai:env"));
    }
}
