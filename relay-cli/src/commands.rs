use anyhow::Context;
use relay_keys::{KeyRegistry, KeySource, RegistryOptions, Validity, save_keys};
use relay_llm::{ChatSession, LlmClient};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const DEFAULT_SYSTEM_MESSAGE: &str = "You are a helpful, concise assistant.";

async fn open_registry(keys_file: Option<PathBuf>, validate: bool) -> KeyRegistry {
    KeyRegistry::open(RegistryOptions {
        keys_file,
        validate,
        ..RegistryOptions::default()
    })
    .await
}

pub async fn keys_set(
    keys_file: Option<PathBuf>,
    service: &str,
    key: &str,
    to_environment: bool,
) -> anyhow::Result<()> {
    let mut registry = open_registry(keys_file, false).await;
    if !registry.add_key(service, key, to_environment).await {
        anyhow::bail!("could not store key for {service}");
    }

    let services = registry.available_services();
    let Some(cred) = services.get(service) else {
        anyhow::bail!("key for {service} was stored but not registered");
    };

    let verdict = match cred.validity {
        Validity::Valid => "accepted by the provider".to_string(),
        Validity::Invalid => "REJECTED by the provider".to_string(),
        Validity::Unknown => "stored (no validation endpoint for this service)".to_string(),
    };
    if to_environment {
        println!(
            "exported {} for {service}: {verdict}",
            relay_keys::env_var_for(service)
        );
    } else {
        println!(
            "saved {service} to {}: {verdict}",
            registry.keys_file().display()
        );
    }
    if !cred.models.is_empty() {
        println!("{} model(s) available", cred.models.len());
    }
    Ok(())
}

pub fn keys_import(keys_file: Option<PathBuf>, file: &Path) -> anyhow::Result<()> {
    let contents =
        std::fs::read_to_string(file).with_context(|| format!("read {}", file.display()))?;
    let parsed: BTreeMap<String, serde_json::Value> =
        serde_json::from_str(&contents).with_context(|| format!("parse {}", file.display()))?;

    let keys: BTreeMap<String, String> = parsed
        .into_iter()
        .filter(|(name, _)| !name.starts_with('_') && name != "comment")
        .filter_map(|(name, value)| match value {
            serde_json::Value::String(key) if !key.is_empty() => Some((name, key)),
            _ => None,
        })
        .collect();
    if keys.is_empty() {
        anyhow::bail!("{} contains no usable keys", file.display());
    }

    let target = keys_file.unwrap_or_else(relay_keys::local_keys_file);
    save_keys(&keys, &target)?;
    println!("merged {} key(s) into {}", keys.len(), target.display());
    Ok(())
}

pub async fn status(keys_file: Option<PathBuf>, no_validate: bool) -> anyhow::Result<()> {
    let registry = open_registry(keys_file, !no_validate).await;
    let mut services: Vec<_> = registry.available_services().into_iter().collect();
    services.sort_by(|a, b| a.0.cmp(&b.0));

    if services.is_empty() {
        println!(
            "no services discovered; set a provider variable or add keys to {}",
            registry.keys_file().display()
        );
        return Ok(());
    }

    for (name, cred) in services {
        let source = match cred.source {
            KeySource::Direct => "direct",
            KeySource::File => "file",
            KeySource::Environment => "environment",
        };
        let validity = match cred.validity {
            Validity::Valid => "valid",
            Validity::Invalid => "invalid",
            Validity::Unknown => "unknown",
        };
        if cred.models.is_empty() {
            println!("{name}: {validity} ({source})");
        } else {
            println!("{name}: {validity} ({source}), {} model(s)", cred.models.len());
        }
    }
    Ok(())
}

pub async fn ask(keys_file: Option<PathBuf>, question: &str, model: &str) -> anyhow::Result<()> {
    let registry = open_registry(keys_file, false).await;
    let client = LlmClient::from_registry(&registry, model)?;
    tracing::debug!(model, provider = ?client.provider(), "sending one-shot question");
    let mut session = ChatSession::new(client, DEFAULT_SYSTEM_MESSAGE);
    let reply = session.ask(question).await?;
    println!("{reply}");
    Ok(())
}
