//! Layered configuration: built-in defaults -> config file -> environment
//! -> CLI flags (applied by the caller after loading `AppConfig`).

use serde::Deserialize;

use crate::logging::config_dir;

const CONFIG_FILE: &str = "config.toml";
const ENV_PREFIX: &str = "SQLGATE";

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
  #[serde(default = "default_row_limit")]
  pub default_row_limit: u64,
  #[serde(default = "default_log_retention_days")]
  pub log_retention_days: i64,
  #[serde(default)]
  pub log_root: Option<String>,
  #[serde(default)]
  pub max_gb: Option<f64>,
  #[serde(default)]
  pub max_usd: Option<f64>,
  #[serde(default)]
  pub max_rows: Option<u64>,
}

fn default_row_limit() -> u64 {
  crate::policy::DEFAULT_LIMIT
}

fn default_log_retention_days() -> i64 {
  30
}

impl Default for AppConfig {
  fn default() -> Self {
    Self {
      default_row_limit: default_row_limit(),
      log_retention_days: default_log_retention_days(),
      log_root: None,
      max_gb: None,
      max_usd: None,
      max_rows: None,
    }
  }
}

impl AppConfig {
  /// Loads defaults, layers the on-disk config file (if present), then
  /// `SQLGATE_*` environment variables over it. CLI flags are merged in
  /// by the caller after this returns, since `config` has no concept of
  /// clap's already-parsed values.
  pub fn load() -> Result<Self, config::ConfigError> {
    let config_path = config_dir().join(CONFIG_FILE);
    if !config_path.exists() {
      log::debug!("no config file at {}, using built-in defaults", config_path.display());
    }
    let builder = config::Config::builder()
      .set_default("default_row_limit", default_row_limit())?
      .set_default("log_retention_days", default_log_retention_days())?
      .add_source(config::File::from(config_path).format(config::FileFormat::Toml).required(false))
      .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true));
    builder.build()?.try_deserialize()
  }
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  #[test]
  fn defaults_match_policy_default_limit() {
    let config = AppConfig::default();
    assert_eq!(config.default_row_limit, crate::policy::DEFAULT_LIMIT);
    assert_eq!(config.log_retention_days, 30);
  }
}
