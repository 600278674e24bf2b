use std::collections::BTreeSet;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::{Map, Value as Json};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row, ValueRef};

use super::{Adapter, ColumnInfo, ConnectionConfig, DbType, ExecutionResult, IntrospectionLevel, Labels, SchemaMetadata, TableInfo};
use crate::cost::CostEstimate;
use crate::error::AdapterError;
use crate::parser::SqlDialect;

#[derive(Default)]
pub struct SqliteAdapter {
  pool: Option<sqlx::SqlitePool>,
}

#[async_trait(?Send)]
impl Adapter for SqliteAdapter {
  async fn connect(&mut self, config: ConnectionConfig) -> Result<(), AdapterError> {
    let pool = SqlitePoolOptions::new()
      .max_connections(1)
      .connect(&config.url)
      .await
      .map_err(|e| AdapterError::Connect(e.to_string()))?;
    self.pool = Some(pool);
    Ok(())
  }

  async fn close(&mut self) -> Result<(), AdapterError> {
    if let Some(pool) = self.pool.take() {
      pool.close().await;
    }
    Ok(())
  }

  /// SQLite's `EXPLAIN QUERY PLAN` exposes plan-node text but no
  /// cost/row estimates, so most `CostEstimate` fields stay absent —
  /// the cost gate's optional-field tolerance exists for this case.
  async fn dry_run(&mut self, sql: &str) -> Result<Option<CostEstimate>, AdapterError> {
    let pool = self.pool.as_ref().ok_or(AdapterError::Closed)?;
    let explain = format!("EXPLAIN QUERY PLAN {sql}");
    let rows = match sqlx::query(&explain).fetch_all(pool).await {
      Ok(rows) => rows,
      Err(sqlx::Error::Database(_)) => return Ok(None),
      Err(e) => return Err(AdapterError::Query(e.to_string())),
    };
    let mut warnings = Vec::new();
    let mut plan_node = None;
    for row in &rows {
      let detail: String = row.try_get("detail").unwrap_or_default();
      if detail.to_uppercase().starts_with("SCAN") && !detail.to_uppercase().contains("USING INDEX") {
        warnings.push(format!("full table scan: {detail}"));
      }
      if plan_node.is_none() {
        plan_node = Some(detail);
      }
    }
    Ok(Some(CostEstimate { plan_node: plan_node.clone(), warnings, summary: plan_node, ..Default::default() }))
  }

  async fn execute(&mut self, sql: &str, labels: &Labels) -> Result<ExecutionResult, AdapterError> {
    let pool = self.pool.as_ref().ok_or(AdapterError::Closed)?;
    let labeled_sql = with_label_comment(sql, labels);
    let started = Instant::now();
    let rows = sqlx::query(&labeled_sql).fetch_all(pool).await.map_err(|e| AdapterError::Query(e.to_string()))?;
    let duration_ms = started.elapsed().as_millis() as u64;

    let columns = rows.first().map(column_names).unwrap_or_default();
    let json_rows = rows.iter().map(row_to_json_map).collect::<Vec<_>>();
    let row_count = json_rows.len() as u64;

    Ok(ExecutionResult { columns, rows: json_rows, row_count, cost: None, duration_ms: Some(duration_ms) })
  }

  async fn introspect(&mut self, _level: IntrospectionLevel) -> Result<SchemaMetadata, AdapterError> {
    let pool = self.pool.as_ref().ok_or(AdapterError::Closed)?;
    let table_rows = sqlx::query("SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'")
      .fetch_all(pool)
      .await
      .map_err(|e| AdapterError::Query(e.to_string()))?;

    let mut tables = Vec::new();
    for table_row in table_rows {
      let name: String = table_row.try_get("name").unwrap_or_default();
      let column_rows = sqlx::query(&format!("PRAGMA table_info({name})"))
        .fetch_all(pool)
        .await
        .map_err(|e| AdapterError::Query(e.to_string()))?;
      let columns = column_rows
        .iter()
        .map(|r| ColumnInfo {
          name: r.try_get("name").unwrap_or_default(),
          type_name: r.try_get("type").unwrap_or_default(),
          nullable: r.try_get::<i64, _>("notnull").map(|v| v == 0).unwrap_or(true),
        })
        .collect();
      tables.push(TableInfo { schema: None, name, columns });
    }
    Ok(SchemaMetadata { tables })
  }

  fn dialect(&self) -> SqlDialect {
    SqlDialect::Sqlite
  }

  fn db_type(&self) -> DbType {
    DbType::Sqlite
  }

  /// SQLite ships no built-in surface comparable to Postgres's
  /// backend-control or file-reading functions, matching the empty
  /// blocklist default for engines without one.
  fn dangerous_functions(&self) -> BTreeSet<String> {
    BTreeSet::new()
  }
}

fn with_label_comment(sql: &str, labels: &Labels) -> String {
  if labels.is_empty() {
    return sql.to_string();
  }
  let rendered = labels.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join(" ");
  format!("/* sqlgate: {rendered} */ {sql}")
}

fn column_names(row: &SqliteRow) -> Vec<String> {
  row.columns().iter().map(|c| c.name().to_string()).collect()
}

fn row_to_json_map(row: &SqliteRow) -> Map<String, Json> {
  let mut map = Map::new();
  for col in row.columns() {
    map.insert(col.name().to_string(), column_to_json(row, col.ordinal()));
  }
  map
}

/// SQLite is dynamically typed per-value, so dispatch tries integer,
/// then float, then text, then blob, rather than trusting a declared
/// column type.
fn column_to_json(row: &SqliteRow, ordinal: usize) -> Json {
  if row.try_get_raw(ordinal).is_ok_and(|v| v.is_null()) {
    return Json::Null;
  }
  if let Ok(v) = row.try_get::<i64, _>(ordinal) {
    return Json::from(v);
  }
  if let Ok(v) = row.try_get::<f64, _>(ordinal) {
    return Json::from(v);
  }
  if let Ok(v) = row.try_get::<String, _>(ordinal) {
    return Json::String(v);
  }
  if let Ok(v) = row.try_get::<Vec<u8>, _>(ordinal) {
    return Json::String(v.iter().map(|b| format!("{b:02X}")).collect());
  }
  Json::Null
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn dangerous_functions_is_empty_by_default() {
    let adapter = SqliteAdapter::default();
    assert!(adapter.dangerous_functions().is_empty());
  }
}
