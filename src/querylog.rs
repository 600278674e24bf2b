//! Append-only, per-project, UTC-date-partitioned audit log.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write as _;
use std::path::PathBuf;

use chrono::{NaiveDate, Utc};
use serde::Serialize;

use crate::logging::data_dir;

pub const DEFAULT_RETENTION_DAYS: i64 = 30;

#[derive(Debug, Clone, Serialize)]
pub struct QueryLogEntry {
  pub timestamp: chrono::DateTime<Utc>,
  pub connection: String,
  pub dialect: String,
  pub original_sql: String,
  pub effective_sql: String,
  pub tables: Vec<String>,
  pub blocked: bool,
  pub codes: Vec<String>,
  pub dry_run: bool,
  pub cost_gb: Option<f64>,
  pub cost_usd: Option<f64>,
  pub duration_ms: Option<u64>,
  pub labels: BTreeMap<String, String>,
}

fn log_root() -> PathBuf {
  data_dir().join("logs")
}

/// Directory-safe slug for the current working directory, so each
/// project gets its own log subdirectory.
fn project_slug() -> String {
  let cwd = std::env::current_dir().unwrap_or_default();
  cwd
    .to_string_lossy()
    .chars()
    .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
    .collect::<String>()
    .trim_matches('_')
    .to_string()
}

fn project_log_dir() -> PathBuf {
  log_root().join(project_slug())
}

fn today_file() -> PathBuf {
  project_log_dir().join(format!("{}.jsonl", Utc::now().format("%Y-%m-%d")))
}

/// Appends one line to today's per-project log file, under append
/// semantics so concurrent writers never corrupt prior lines.
pub fn log_query(entry: &QueryLogEntry) -> std::io::Result<()> {
  let dir = project_log_dir();
  fs::create_dir_all(&dir)?;
  let line = serde_json::to_string(entry).map_err(std::io::Error::other)?;
  let mut file = fs::OpenOptions::new().create(true).append(true).open(today_file())?;
  writeln!(file, "{line}")
}

/// Deletes per-project log files older than `retention_days`; removes
/// the project directory entirely if it ends up empty.
pub fn cleanup_old_logs(retention_days: i64) -> std::io::Result<()> {
  let dir = project_log_dir();
  if !dir.exists() {
    return Ok(());
  }
  let cutoff = (Utc::now() - chrono::Duration::days(retention_days)).date_naive();
  let mut remaining = 0usize;
  for entry in fs::read_dir(&dir)? {
    let entry = entry?;
    let path = entry.path();
    let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else { continue };
    match NaiveDate::parse_from_str(stem, "%Y-%m-%d") {
      Ok(date) if date < cutoff => fs::remove_file(&path)?,
      _ => remaining += 1,
    }
  }
  if remaining == 0 {
    fs::remove_dir(&dir).ok();
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn project_slug_is_lowercase_and_trimmed() {
    let slug = project_slug();
    assert_eq!(slug, slug.to_lowercase());
    assert!(!slug.starts_with('_'));
    assert!(!slug.ends_with('_'));
  }
}
