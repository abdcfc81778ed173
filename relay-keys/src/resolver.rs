//! Stateless key resolution: one precedence walk shared by the simple
//! service wrappers and the registry's fallback path.

use crate::env::{EnvAccess, ProcessEnv};
use crate::error::{KeyError, Result};
use crate::keyfile;
use std::path::Path;

/// Where a resolved credential came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Direct,
    File,
    Environment,
}

/// Environment variables consumed for the well-known services.
pub(crate) const SERVICE_ENV_VARS: &[(&str, &str)] = &[
    ("openai", "OPENAI_API_KEY"),
    ("anthropic", "ANTHROPIC_API_KEY"),
    ("huggingface", "HF_API_KEY"),
];

pub(crate) fn mapped_env_var(service: &str) -> Option<&'static str> {
    SERVICE_ENV_VARS
        .iter()
        .find(|(name, _)| *name == service)
        .map(|(_, var)| *var)
}

/// Environment variable that satisfies `service`: the mapped name for the
/// well-known services, `{SERVICE}_API_KEY` derived by convention otherwise.
pub fn env_var_for(service: &str) -> String {
    match mapped_env_var(service) {
        Some(var) => var.to_string(),
        None => format!("{}_API_KEY", service.to_uppercase()),
    }
}

/// Resolve an API key for `service` without retaining any state.
///
/// Precedence, first match wins:
/// 1. `explicit_key`, if non-empty
/// 2. `key_file`, if given and the file exists
/// 3. `.keys.json` in the working directory
/// 4. `~/.relay_keys.json`
/// 5. the service's environment variable (well-known services only)
///
/// Files are consulted independently and never merged; the first one that
/// resolves the service wins.
pub fn resolve_key(
    service: &str,
    explicit_key: Option<&str>,
    key_file: Option<&Path>,
    use_env: bool,
    env: &dyn EnvAccess,
) -> Result<String> {
    if let Some(key) = explicit_key {
        if !key.is_empty() {
            return Ok(key.to_string());
        }
    }

    if let Some(path) = key_file {
        if path.exists() {
            if let Some(key) = keyfile::lookup_service(path, service) {
                return Ok(key);
            }
        }
    }

    let local = keyfile::local_keys_file();
    if local.exists() {
        if let Some(key) = keyfile::lookup_service(&local, service) {
            return Ok(key);
        }
    }

    let user = keyfile::user_keys_file();
    if user.exists() {
        if let Some(key) = keyfile::lookup_service(&user, service) {
            return Ok(key);
        }
    }

    if use_env {
        if let Some(var) = mapped_env_var(service) {
            if let Some(key) = env.get(var) {
                return Ok(key);
            }
        }
    }

    Err(KeyError::NotFound {
        service: service.to_string(),
        env_var: env_var_for(service),
    })
}

/// [`resolve_key`] against the real process environment.
pub fn resolve(
    service: &str,
    explicit_key: Option<&str>,
    key_file: Option<&Path>,
    use_env: bool,
) -> Result<String> {
    resolve_key(service, explicit_key, key_file, use_env, &ProcessEnv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::MapEnv;

    fn keys_file(dir: &tempfile::TempDir, body: &str) -> std::path::PathBuf {
        let path = dir.path().join("keys.json");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn explicit_key_wins_over_every_source() {
        let tmp = tempfile::tempdir().unwrap();
        let path = keys_file(&tmp, r#"{"openai": "file-key"}"#);
        let env = MapEnv::new();
        env.set("OPENAI_API_KEY", "env-key");

        let key = resolve_key("openai", Some("direct-key"), Some(&path), true, &env).unwrap();
        assert_eq!(key, "direct-key");
    }

    #[test]
    fn file_wins_over_environment() {
        let tmp = tempfile::tempdir().unwrap();
        let path = keys_file(&tmp, r#"{"openai": "file-key"}"#);
        let env = MapEnv::new();
        env.set("OPENAI_API_KEY", "env-key");

        let key = resolve_key("openai", None, Some(&path), true, &env).unwrap();
        assert_eq!(key, "file-key");
    }

    #[test]
    fn environment_is_the_last_resort() {
        let env = MapEnv::new();
        env.set("OPENAI_API_KEY", "env-key");

        let key = resolve_key("openai", None, None, true, &env).unwrap();
        assert_eq!(key, "env-key");
    }

    #[test]
    fn empty_explicit_key_falls_through() {
        let env = MapEnv::new();
        env.set("ANTHROPIC_API_KEY", "env-key");

        let key = resolve_key("anthropic", Some(""), None, true, &env).unwrap();
        assert_eq!(key, "env-key");
    }

    #[test]
    fn a_file_missing_the_service_falls_through_to_env() {
        let tmp = tempfile::tempdir().unwrap();
        let path = keys_file(&tmp, r#"{"anthropic": "other"}"#);
        let env = MapEnv::new();
        env.set("OPENAI_API_KEY", "env-key");

        let key = resolve_key("openai", None, Some(&path), true, &env).unwrap();
        assert_eq!(key, "env-key");
    }

    #[test]
    fn unknown_services_are_not_resolvable_from_env() {
        let env = MapEnv::new();
        env.set("FOOBAR_API_KEY", "set-but-unmapped");

        let err = resolve_key("foobar", None, None, true, &env).unwrap_err();
        match err {
            KeyError::NotFound { service, env_var } => {
                assert_eq!(service, "foobar");
                assert_eq!(env_var, "FOOBAR_API_KEY");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn not_found_names_the_mapped_variable() {
        let env = MapEnv::new();
        let err = resolve_key("huggingface", None, None, false, &env).unwrap_err();
        assert!(err.to_string().contains("HF_API_KEY"), "got: {err}");
    }
}
