//! Flat JSON key files: `{"openai": "sk-...", "_comment": "ignored"}`.

use crate::error::{KeyError, Result};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const LOCAL_KEYS_FILE: &str = ".keys.json";
const USER_KEYS_FILE: &str = ".relay_keys.json";

/// Key file in the current working directory.
pub fn local_keys_file() -> PathBuf {
    PathBuf::from(LOCAL_KEYS_FILE)
}

/// Per-user key file under `$HOME`.
pub fn user_keys_file() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    Path::new(&home).join(USER_KEYS_FILE)
}

fn read_object(path: &Path) -> Result<Map<String, Value>> {
    let contents = std::fs::read_to_string(path)?;
    match serde_json::from_str::<Value>(&contents)? {
        Value::Object(map) => Ok(map),
        _ => Err(KeyError::Parse(format!(
            "{} is not a JSON object",
            path.display()
        ))),
    }
}

/// Metadata members are not credentials.
fn is_metadata(name: &str) -> bool {
    name.starts_with('_') || name == "comment"
}

/// Look up `service` in a key file, trying four member-name variants in
/// order: the service name itself, `{service}_api_key`, the uppercased
/// name, and `{SERVICE}_API_KEY`. Unreadable or malformed files, and empty
/// values, resolve to `None`.
pub(crate) fn lookup_service(path: &Path, service: &str) -> Option<String> {
    let map = read_object(path).ok()?;
    let upper = service.to_uppercase();
    let variants = [
        service.to_string(),
        format!("{service}_api_key"),
        upper.clone(),
        format!("{upper}_API_KEY"),
    ];
    for name in &variants {
        if let Some(key) = map.get(name).and_then(Value::as_str) {
            if !key.is_empty() {
                return Some(key.to_string());
            }
        }
    }
    None
}

/// Every credential member of a key file, skipping metadata members and
/// empty values. A missing or malformed file reads as empty.
pub(crate) fn read_all(path: &Path) -> BTreeMap<String, String> {
    let Ok(map) = read_object(path) else {
        return BTreeMap::new();
    };
    map.iter()
        .filter(|(name, _)| !is_metadata(name))
        .filter_map(|(name, value)| {
            let key = value.as_str()?;
            if key.is_empty() {
                None
            } else {
                Some((name.clone(), key.to_string()))
            }
        })
        .collect()
}

/// Merge `keys` into the JSON object at `path` and write it back.
///
/// Existing members are preserved, same-name members are overwritten, and
/// parent directories are created as needed. Load-merge-store is not atomic
/// across processes; concurrent external writers can race.
pub fn save_keys(keys: &BTreeMap<String, String>, path: &Path) -> Result<()> {
    let mut merged = if path.exists() {
        read_object(path).unwrap_or_default()
    } else {
        Map::new()
    };
    for (service, key) in keys {
        merged.insert(service.clone(), Value::String(key.clone()));
    }

    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            std::fs::create_dir_all(dir)?;
        }
    }
    let body = serde_json::to_string_pretty(&Value::Object(merged))?;
    std::fs::write(path, body)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_file(dir: &tempfile::TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn lookup_tries_member_name_variants() {
        let tmp = tempfile::tempdir().unwrap();

        let exact = write_file(&tmp, "a.json", r#"{"openai": "k1"}"#);
        assert_eq!(lookup_service(&exact, "openai").as_deref(), Some("k1"));

        let suffixed = write_file(&tmp, "b.json", r#"{"openai_api_key": "k2"}"#);
        assert_eq!(lookup_service(&suffixed, "openai").as_deref(), Some("k2"));

        let upper = write_file(&tmp, "c.json", r#"{"OPENAI": "k3"}"#);
        assert_eq!(lookup_service(&upper, "openai").as_deref(), Some("k3"));

        let upper_suffixed = write_file(&tmp, "d.json", r#"{"OPENAI_API_KEY": "k4"}"#);
        assert_eq!(
            lookup_service(&upper_suffixed, "openai").as_deref(),
            Some("k4")
        );
    }

    #[test]
    fn lookup_prefers_exact_member_and_skips_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_file(
            &tmp,
            "keys.json",
            r#"{"openai": "exact", "OPENAI_API_KEY": "upper"}"#,
        );
        assert_eq!(lookup_service(&path, "openai").as_deref(), Some("exact"));

        let empty = write_file(&tmp, "empty.json", r#"{"openai": "", "OPENAI": "fallback"}"#);
        assert_eq!(lookup_service(&empty, "openai").as_deref(), Some("fallback"));
    }

    #[test]
    fn lookup_tolerates_missing_and_malformed_files() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(lookup_service(&tmp.path().join("nope.json"), "openai"), None);

        let bad = write_file(&tmp, "bad.json", "not json");
        assert_eq!(lookup_service(&bad, "openai"), None);
    }

    #[test]
    fn read_all_skips_metadata_members() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_file(
            &tmp,
            "keys.json",
            r#"{
                "openai": "sk-1",
                "anthropic": "sk-ant-1",
                "_comment": "ignored",
                "comment": "also ignored",
                "empty": ""
            }"#,
        );
        let all = read_all(&path);
        assert_eq!(all.len(), 2);
        assert_eq!(all["openai"], "sk-1");
        assert_eq!(all["anthropic"], "sk-ant-1");
    }

    #[test]
    fn save_keys_round_trips_and_merges() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("keys.json");

        let mut keys = BTreeMap::new();
        keys.insert("svc".to_string(), "k".to_string());
        save_keys(&keys, &path).unwrap();

        let on_disk = read_all(&path);
        assert_eq!(on_disk["svc"], "k");

        // Second save overwrites only the named member.
        let mut more = BTreeMap::new();
        more.insert("svc".to_string(), "k2".to_string());
        more.insert("other".to_string(), "o".to_string());
        save_keys(&more, &path).unwrap();

        let merged = read_all(&path);
        assert_eq!(merged["svc"], "k2");
        assert_eq!(merged["other"], "o");
    }

    #[test]
    fn save_keys_replaces_a_corrupt_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_file(&tmp, "keys.json", "not json at all");

        let mut keys = BTreeMap::new();
        keys.insert("svc".to_string(), "k".to_string());
        save_keys(&keys, &path).unwrap();
        assert_eq!(read_all(&path)["svc"], "k");
    }
}
