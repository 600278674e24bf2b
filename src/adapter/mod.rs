//! The abstract engine-adapter contract the pipeline consumes, and the
//! concrete adapters built on the drivers this crate depends on.

mod mysql;
mod postgres;
mod sqlite;

pub use mysql::MySqlAdapter;
pub use postgres::PostgresAdapter;
pub use sqlite::SqliteAdapter;

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::Serialize;
use strum::Display;

use crate::cost::CostEstimate;
use crate::error::AdapterError;
use crate::parser::SqlDialect;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DbType {
  Postgres,
  MySql,
  Sqlite,
}

#[derive(Debug, Clone)]
pub struct ConnectionConfig {
  pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnInfo {
  pub name: String,
  pub type_name: String,
  pub nullable: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableInfo {
  pub schema: Option<String>,
  pub name: String,
  pub columns: Vec<ColumnInfo>,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct SchemaMetadata {
  pub tables: Vec<TableInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntrospectionLevel {
  Catalog,
  Structure,
  Full,
}

/// A single execution's result set, independent of the engine that
/// produced it.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
  pub columns: Vec<String>,
  pub rows: Vec<serde_json::Map<String, serde_json::Value>>,
  pub row_count: u64,
  pub cost: Option<CostEstimate>,
  pub duration_ms: Option<u64>,
}

/// Engine-specific labels attached to a server-side session for the
/// duration of one execute call (native label API, or a leading
/// comment, depending on what the engine supports).
pub type Labels = std::collections::BTreeMap<String, String>;

/// The contract the pipeline consumes to dry-run, execute, and
/// introspect against a single connected engine instance. Each adapter
/// owns exactly one driver handle; adapters never mutate global state.
#[async_trait(?Send)]
pub trait Adapter {
  async fn connect(&mut self, config: ConnectionConfig) -> Result<(), AdapterError>;

  async fn close(&mut self) -> Result<(), AdapterError>;

  /// `Ok(None)` means this engine cannot estimate this statement type;
  /// any other failure is a genuine adapter error.
  async fn dry_run(&mut self, sql: &str) -> Result<Option<CostEstimate>, AdapterError>;

  async fn execute(&mut self, sql: &str, labels: &Labels) -> Result<ExecutionResult, AdapterError>;

  async fn introspect(&mut self, level: IntrospectionLevel) -> Result<SchemaMetadata, AdapterError>;

  fn dialect(&self) -> SqlDialect;

  fn db_type(&self) -> DbType;

  /// Lower-cased function-name blocklist consumed by the safety checks.
  fn dangerous_functions(&self) -> BTreeSet<String>;

  /// Distinct schema names known to the engine. A catalog-level
  /// introspection is sufficient; no column detail is needed.
  async fn list_schemas(&mut self) -> Result<Vec<String>, AdapterError> {
    let metadata = self.introspect(IntrospectionLevel::Catalog).await?;
    let mut schemas: Vec<String> = metadata.tables.into_iter().filter_map(|t| t.schema).collect();
    schemas.sort();
    schemas.dedup();
    Ok(schemas)
  }

  /// Tables visible in `schema`, or every table when `schema` is `None`.
  async fn list_tables(&mut self, schema: Option<&str>) -> Result<Vec<TableInfo>, AdapterError> {
    let metadata = self.introspect(IntrospectionLevel::Catalog).await?;
    Ok(
      metadata
        .tables
        .into_iter()
        .filter(|t| schema.map_or(true, |s| t.schema.as_deref() == Some(s)))
        .collect(),
    )
  }

  /// Full column detail for a single table. Fails with
  /// [`AdapterError::Query`] when no table matches `name`/`schema`.
  async fn describe_table(&mut self, name: &str, schema: Option<&str>) -> Result<TableInfo, AdapterError> {
    let metadata = self.introspect(IntrospectionLevel::Full).await?;
    metadata
      .tables
      .into_iter()
      .find(|t| t.name == name && schema.map_or(true, |s| t.schema.as_deref() == Some(s)))
      .ok_or_else(|| AdapterError::Query(format!("table `{name}` not found")))
  }
}
