use std::collections::BTreeSet;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::{Map, Value as Json};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{Column, Row, TypeInfo, ValueRef};

use super::{Adapter, ColumnInfo, ConnectionConfig, DbType, ExecutionResult, IntrospectionLevel, Labels, SchemaMetadata, TableInfo};
use crate::cost::CostEstimate;
use crate::error::AdapterError;
use crate::parser::SqlDialect;

#[derive(Default)]
pub struct PostgresAdapter {
  pool: Option<sqlx::PgPool>,
}

#[async_trait(?Send)]
impl Adapter for PostgresAdapter {
  async fn connect(&mut self, config: ConnectionConfig) -> Result<(), AdapterError> {
    let pool = PgPoolOptions::new()
      .max_connections(3)
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

  async fn dry_run(&mut self, sql: &str) -> Result<Option<CostEstimate>, AdapterError> {
    let pool = self.pool.as_ref().ok_or(AdapterError::Closed)?;
    let explain = format!("EXPLAIN (FORMAT JSON) {sql}");
    let row = match sqlx::query(&explain).fetch_one(pool).await {
      Ok(row) => row,
      Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("42601") => return Ok(None),
      Err(e) => return Err(AdapterError::Query(e.to_string())),
    };
    let plan_json: Json = row.try_get::<Json, _>(0).map_err(|e| AdapterError::Query(e.to_string()))?;
    Ok(Some(plan_to_estimate(&plan_json)))
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
    let rows = sqlx::query(
      "SELECT table_schema, table_name, column_name, data_type, is_nullable \
       FROM information_schema.columns \
       WHERE table_schema NOT IN ('pg_catalog', 'information_schema') \
       ORDER BY table_schema, table_name, ordinal_position",
    )
    .fetch_all(pool)
    .await
    .map_err(|e| AdapterError::Query(e.to_string()))?;

    let mut tables: Vec<TableInfo> = Vec::new();
    for row in rows {
      let schema: String = row.try_get("table_schema").unwrap_or_default();
      let name: String = row.try_get("table_name").unwrap_or_default();
      let column = ColumnInfo {
        name: row.try_get("column_name").unwrap_or_default(),
        type_name: row.try_get("data_type").unwrap_or_default(),
        nullable: row.try_get::<String, _>("is_nullable").map(|v| v == "YES").unwrap_or(true),
      };
      match tables.iter_mut().find(|t| t.schema.as_deref() == Some(schema.as_str()) && t.name == name) {
        Some(table) => table.columns.push(column),
        None => tables.push(TableInfo { schema: Some(schema), name, columns: vec![column] }),
      }
    }
    Ok(SchemaMetadata { tables })
  }

  fn dialect(&self) -> SqlDialect {
    SqlDialect::Postgres
  }

  fn db_type(&self) -> DbType {
    DbType::Postgres
  }

  fn dangerous_functions(&self) -> BTreeSet<String> {
    [
      "pg_terminate_backend",
      "pg_cancel_backend",
      "pg_read_file",
      "pg_read_binary_file",
      "lo_import",
      "lo_export",
      "pg_advisory_lock",
      "pg_advisory_xact_lock",
      "set_config",
      "pg_switch_wal",
      "pg_create_restore_point",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
  }
}

fn with_label_comment(sql: &str, labels: &Labels) -> String {
  if labels.is_empty() {
    return sql.to_string();
  }
  let rendered = labels.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join(" ");
  format!("/* sqlgate: {rendered} */ {sql}")
}

fn column_names(row: &PgRow) -> Vec<String> {
  row.columns().iter().map(|c| c.name().to_string()).collect()
}

fn row_to_json_map(row: &PgRow) -> Map<String, Json> {
  let mut map = Map::new();
  for col in row.columns() {
    map.insert(col.name().to_string(), column_to_json(row, col.ordinal(), &col.type_info().to_string()));
  }
  map
}

/// Dispatches on the Postgres column type name the same way a textual
/// row-previewer does, but produces `serde_json::Value` rather than a
/// display string so execution results stay machine-readable.
fn column_to_json(row: &PgRow, ordinal: usize, type_name: &str) -> Json {
  if row.try_get_raw(ordinal).is_ok_and(|v| v.is_null()) {
    return Json::Null;
  }
  match type_name.to_uppercase().as_str() {
    "BOOL" => row.try_get::<bool, _>(ordinal).map(Json::from).unwrap_or(Json::Null),
    "SMALLINT" | "INT2" => row.try_get::<i16, _>(ordinal).map(Json::from).unwrap_or(Json::Null),
    "INT" | "INT4" => row.try_get::<i32, _>(ordinal).map(Json::from).unwrap_or(Json::Null),
    "BIGINT" | "INT8" => row.try_get::<i64, _>(ordinal).map(Json::from).unwrap_or(Json::Null),
    "REAL" | "FLOAT4" => row.try_get::<f32, _>(ordinal).map(|v| Json::from(v as f64)).unwrap_or(Json::Null),
    "DOUBLE PRECISION" | "FLOAT8" => row.try_get::<f64, _>(ordinal).map(Json::from).unwrap_or(Json::Null),
    "JSON" | "JSONB" => row.try_get::<Json, _>(ordinal).unwrap_or(Json::Null),
    "TIMESTAMPTZ" => {
      row.try_get::<chrono::DateTime<chrono::Utc>, _>(ordinal).map(|v| Json::String(v.to_rfc3339())).unwrap_or(Json::Null)
    },
    "TIMESTAMP" => {
      row.try_get::<chrono::NaiveDateTime, _>(ordinal).map(|v| Json::String(v.to_string())).unwrap_or(Json::Null)
    },
    "DATE" => row.try_get::<chrono::NaiveDate, _>(ordinal).map(|v| Json::String(v.to_string())).unwrap_or(Json::Null),
    "UUID" => row.try_get::<sqlx::types::Uuid, _>(ordinal).map(|v| Json::String(v.to_string())).unwrap_or(Json::Null),
    _ => row.try_get_unchecked::<String, _>(ordinal).map(Json::String).unwrap_or(Json::Null),
  }
}

fn plan_to_estimate(plan_json: &Json) -> CostEstimate {
  let plan = plan_json.as_array().and_then(|a| a.first()).and_then(|p| p.get("Plan"));
  let estimated_rows = plan.and_then(|p| p.get("Plan Rows")).and_then(Json::as_u64);
  let plan_node = plan.and_then(|p| p.get("Node Type")).and_then(Json::as_str).map(str::to_string);
  let mut warnings = Vec::new();
  if let (Some(node), Some(rows)) = (&plan_node, estimated_rows) {
    if node == "Seq Scan" && rows > 100_000 {
      warnings.push(format!("sequential scan over an estimated {rows} rows"));
    }
  }
  CostEstimate {
    estimated_rows,
    plan_node: plan_node.clone(),
    warnings,
    summary: plan_node.map(|n| format!("top-level plan node: {n}")),
    ..Default::default()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn dangerous_functions_matches_the_known_blocklist() {
    let adapter = PostgresAdapter::default();
    let blocklist = adapter.dangerous_functions();
    assert!(blocklist.contains("pg_terminate_backend"));
    assert!(blocklist.contains("pg_read_file"));
    assert_eq!(blocklist.len(), 11);
  }

  #[test]
  fn label_comment_is_prefixed_when_labels_present() {
    let mut labels = Labels::new();
    labels.insert("job".to_string(), "nightly".to_string());
    let sql = with_label_comment("SELECT 1", &labels);
    assert!(sql.starts_with("/* sqlgate: job=nightly */"));
  }

  #[test]
  fn no_labels_leaves_sql_untouched() {
    assert_eq!(with_label_comment("SELECT 1", &Labels::new()), "SELECT 1");
  }

  #[test]
  fn plan_json_extracts_seq_scan_warning() {
    let plan_json = serde_json::json!([{ "Plan": { "Node Type": "Seq Scan", "Plan Rows": 500_000 } }]);
    let estimate = plan_to_estimate(&plan_json);
    assert_eq!(estimate.estimated_rows, Some(500_000));
    assert!(!estimate.warnings.is_empty());
  }
}
