//! Eager multi-service credential registry.

use crate::env::{EnvAccess, ProcessEnv};
use crate::error::Result;
use crate::keyfile;
use crate::probe::{self, ProbeTable, Validity};
use crate::resolver::{self, KeySource};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// A resolved credential plus its validation metadata.
#[derive(Debug, Clone)]
pub struct ServiceCredential {
    pub api_key: String,
    pub source: KeySource,
    pub validity: Validity,
    /// Populated only by a successful probe; trust it only when
    /// `validity == Validity::Valid`.
    pub models: Vec<String>,
}

impl ServiceCredential {
    fn unvalidated(api_key: String, source: KeySource) -> Self {
        Self {
            api_key,
            source,
            validity: Validity::Unknown,
            models: Vec::new(),
        }
    }
}

/// Construction options for [`KeyRegistry`].
pub struct RegistryOptions {
    /// Key file to discover from and persist to. Defaults to `.keys.json`
    /// in the working directory.
    pub keys_file: Option<PathBuf>,
    /// Whether to discover keys from environment variables.
    pub use_env: bool,
    /// Whether to probe every discovered credential during `open`.
    pub validate: bool,
    pub env: Box<dyn EnvAccess>,
    pub probes: ProbeTable,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            keys_file: None,
            use_env: true,
            validate: true,
            env: Box::new(ProcessEnv),
            probes: ProbeTable::well_known(),
        }
    }
}

/// Registry of every service a key was discovered for, with per-service
/// validity and model availability.
///
/// Mutating operations take `&mut self`; a multi-threaded host must
/// serialize access itself (the registry holds no internal lock).
pub struct KeyRegistry {
    keys_file: PathBuf,
    use_env: bool,
    env: Box<dyn EnvAccess>,
    probes: ProbeTable,
    http: reqwest::Client,
    services: HashMap<String, ServiceCredential>,
}

impl KeyRegistry {
    /// Discover credentials from the environment and the key file, then
    /// probe each one sequentially unless validation is disabled.
    ///
    /// Probe failures never fail construction; they surface as
    /// `Validity::Invalid` on the affected service only.
    pub async fn open(options: RegistryOptions) -> Self {
        let RegistryOptions {
            keys_file,
            use_env,
            validate,
            env,
            probes,
        } = options;

        let mut registry = Self {
            keys_file: keys_file.unwrap_or_else(keyfile::local_keys_file),
            use_env,
            env,
            probes,
            http: probe::http_client(),
            services: HashMap::new(),
        };
        registry.discover();
        tracing::debug!(
            services = registry.services.len(),
            keys_file = %registry.keys_file.display(),
            "credential discovery finished"
        );

        if validate {
            registry.validate_all().await;
        }
        registry
    }

    fn discover(&mut self) {
        if self.use_env {
            for (service, var) in resolver::SERVICE_ENV_VARS {
                if let Some(key) = self.env.get(var) {
                    self.services.insert(
                        (*service).to_string(),
                        ServiceCredential::unvalidated(key, KeySource::Environment),
                    );
                }
            }
        }

        if self.keys_file.exists() {
            for (service, key) in keyfile::read_all(&self.keys_file) {
                // Environment entries outrank file entries for the same name.
                self.services
                    .entry(service)
                    .or_insert_with(|| ServiceCredential::unvalidated(key, KeySource::File));
            }
        }
    }

    /// Probe every registered credential, one at a time.
    pub async fn validate_all(&mut self) {
        let mut services: Vec<String> = self.services.keys().cloned().collect();
        services.sort();
        for service in services {
            self.validate_service(&service).await;
        }
    }

    /// Probe one registered credential and record the outcome in place.
    pub async fn validate_service(&mut self, service: &str) {
        let probe_input = self.services.get(service).and_then(|cred| {
            self.probes
                .endpoint(service)
                .map(|endpoint| (cred.api_key.clone(), endpoint.clone()))
        });

        let Some((api_key, endpoint)) = probe_input else {
            // Unregistered service, or no probe endpoint for it:
            // availability stays unknown.
            if let Some(cred) = self.services.get_mut(service) {
                cred.validity = Validity::Unknown;
                cred.models.clear();
            }
            return;
        };

        let outcome = probe::probe_service(&self.http, &endpoint, &api_key).await;
        if let Some(cred) = self.services.get_mut(service) {
            cred.validity = outcome.validity;
            cred.models = outcome.models;
            tracing::debug!(
                service,
                validity = ?cred.validity,
                models = cred.models.len(),
                "probe finished"
            );
        }
    }

    /// Key for `service`, falling back to one-shot resolution (same key
    /// file and environment settings) for names never registered here.
    pub fn get_api_key(&self, service: &str) -> Result<String> {
        if let Some(cred) = self.services.get(service) {
            return Ok(cred.api_key.clone());
        }
        resolver::resolve_key(
            service,
            None,
            Some(&self.keys_file),
            self.use_env,
            self.env.as_ref(),
        )
    }

    /// Store a key for `service`, then re-probe it.
    ///
    /// With `to_environment` the key goes into the process environment
    /// under the mapped (or derived) variable name; otherwise it is merged
    /// into the configured key file. Returns `false` for an empty key or a
    /// failed file write; in both cases the registry is left untouched.
    pub async fn add_key(&mut self, service: &str, key: &str, to_environment: bool) -> bool {
        if key.is_empty() {
            return false;
        }

        let source = if to_environment {
            self.env.set(&resolver::env_var_for(service), key);
            KeySource::Environment
        } else {
            let mut keys = BTreeMap::new();
            keys.insert(service.to_string(), key.to_string());
            if let Err(e) = keyfile::save_keys(&keys, &self.keys_file) {
                tracing::warn!(service, error = %e, "failed to persist key");
                return false;
            }
            KeySource::File
        };

        self.services.insert(
            service.to_string(),
            ServiceCredential::unvalidated(key.to_string(), source),
        );
        self.validate_service(service).await;
        true
    }

    /// Replace the key for `service`, persisting wherever the current one
    /// came from. Unregistered services are added to the key file.
    pub async fn update_key(&mut self, service: &str, key: &str) -> bool {
        if key.is_empty() {
            return false;
        }
        let to_environment = matches!(
            self.services.get(service).map(|cred| cred.source),
            Some(KeySource::Environment)
        );
        self.add_key(service, key, to_environment).await
    }

    /// Snapshot of every registered service. The returned map is a copy;
    /// mutating it never touches the registry.
    pub fn available_services(&self) -> HashMap<String, ServiceCredential> {
        self.services.clone()
    }

    pub fn keys_file(&self) -> &Path {
        &self.keys_file
    }
}
