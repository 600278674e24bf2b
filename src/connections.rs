//! Minimal named-connection registry. The on-disk format is internal
//! convenience, not a stable contract; credential storage is out of
//! scope entirely.

use std::collections::HashMap;
use std::fs;
use std::io::Write as _;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::logging::config_dir;

const REGISTRY_FILE: &str = "connections.toml";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConnectionRecord {
  pub db_type: String,
  pub url: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct Registry {
  #[serde(default)]
  connections: HashMap<String, ConnectionRecord>,
}

fn registry_path() -> PathBuf {
  config_dir().join(REGISTRY_FILE)
}

fn read_registry() -> Registry {
  let path = registry_path();
  fs::read_to_string(path).ok().and_then(|s| toml::from_str(&s).ok()).unwrap_or_default()
}

/// Writes the registry atomically: write to a sibling temp file, then
/// rename over the target, so a concurrent reader never observes a
/// partially-written file.
fn write_registry(registry: &Registry) -> std::io::Result<()> {
  let path = registry_path();
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent)?;
  }
  let tmp_path = path.with_extension("toml.tmp");
  let serialized = toml::to_string_pretty(registry).map_err(std::io::Error::other)?;
  {
    let mut file = fs::File::create(&tmp_path)?;
    file.write_all(serialized.as_bytes())?;
    #[cfg(unix)]
    {
      use std::os::unix::fs::PermissionsExt;
      file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }
  }
  fs::rename(tmp_path, path)
}

pub fn list_connections() -> Vec<(String, ConnectionRecord)> {
  let registry = read_registry();
  let mut entries: Vec<_> = registry.connections.into_iter().collect();
  entries.sort_by(|a, b| a.0.cmp(&b.0));
  entries
}

pub fn get_connection(name: &str) -> Option<ConnectionRecord> {
  read_registry().connections.get(name).cloned()
}

pub fn save_connection(name: &str, record: ConnectionRecord) -> std::io::Result<()> {
  let mut registry = read_registry();
  registry.connections.insert(name.to_string(), record);
  write_registry(&registry)
}

pub fn remove_connection(name: &str) -> std::io::Result<bool> {
  let mut registry = read_registry();
  let existed = registry.connections.remove(name).is_some();
  if existed {
    write_registry(&registry)?;
  }
  Ok(existed)
}

/// Either a registry name or a raw `type:k=v,k=v` reference.
pub enum ConnectionRef {
  Named(String),
  Raw { db_type: String, params: HashMap<String, String> },
}

pub fn parse_connection_ref(raw: &str) -> ConnectionRef {
  match raw.split_once(':') {
    Some((db_type, rest)) if rest.contains('=') => {
      let params = rest
        .split(',')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
      ConnectionRef::Raw { db_type: db_type.to_string(), params }
    },
    _ => ConnectionRef::Named(raw.to_string()),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn raw_reference_is_parsed_into_type_and_params() {
    match parse_connection_ref("postgres:host=localhost,port=5432") {
      ConnectionRef::Raw { db_type, params } => {
        assert_eq!(db_type, "postgres");
        assert_eq!(params.get("host"), Some(&"localhost".to_string()));
        assert_eq!(params.get("port"), Some(&"5432".to_string()));
      },
      ConnectionRef::Named(_) => panic!("expected a raw reference"),
    }
  }

  #[test]
  fn bare_name_is_parsed_as_a_registry_name() {
    match parse_connection_ref("production") {
      ConnectionRef::Named(name) => assert_eq!(name, "production"),
      ConnectionRef::Raw { .. } => panic!("expected a named reference"),
    }
  }
}
