//! API-key resolution and service availability for Relay.
//!
//! Resolves provider credentials from explicit input, flat JSON key files,
//! and environment variables under a strict precedence order, and probes
//! provider endpoints to learn which keys actually work and which models
//! they unlock.

mod env;
mod error;
mod keyfile;
mod probe;
mod registry;
mod resolver;

pub use env::{EnvAccess, ProcessEnv};
pub use error::{KeyError, Result};
pub use keyfile::{local_keys_file, save_keys, user_keys_file};
pub use probe::{ModelListing, ProbeAuth, ProbeEndpoint, ProbeTable, Validity};
pub use registry::{KeyRegistry, RegistryOptions, ServiceCredential};
pub use resolver::{KeySource, env_var_for, resolve, resolve_key};
