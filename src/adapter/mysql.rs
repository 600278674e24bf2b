use std::collections::BTreeSet;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::{Map, Value as Json};
use sqlx::mysql::{MySqlPoolOptions, MySqlRow};
use sqlx::{Column, Row, TypeInfo, ValueRef};

use super::{Adapter, ColumnInfo, ConnectionConfig, DbType, ExecutionResult, IntrospectionLevel, Labels, SchemaMetadata, TableInfo};
use crate::cost::CostEstimate;
use crate::error::AdapterError;
use crate::parser::SqlDialect;

#[derive(Default)]
pub struct MySqlAdapter {
  pool: Option<sqlx::MySqlPool>,
}

#[async_trait(?Send)]
impl Adapter for MySqlAdapter {
  async fn connect(&mut self, config: ConnectionConfig) -> Result<(), AdapterError> {
    let pool = MySqlPoolOptions::new()
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
    let explain = format!("EXPLAIN FORMAT=JSON {sql}");
    let row = match sqlx::query(&explain).fetch_one(pool).await {
      Ok(row) => row,
      Err(sqlx::Error::Database(db_err)) if db_err.message().contains("Unsupported") => return Ok(None),
      Err(e) => return Err(AdapterError::Query(e.to_string())),
    };
    let raw: String = row.try_get(0).map_err(|e| AdapterError::Query(e.to_string()))?;
    let plan_json: Json = serde_json::from_str(&raw).unwrap_or(Json::Null);
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
       WHERE table_schema NOT IN ('mysql', 'information_schema', 'performance_schema', 'sys') \
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
    SqlDialect::MySql
  }

  fn db_type(&self) -> DbType {
    DbType::MySql
  }

  fn dangerous_functions(&self) -> BTreeSet<String> {
    ["load_file", "sys_exec", "sys_eval"].into_iter().map(str::to_string).collect()
  }
}

fn with_label_comment(sql: &str, labels: &Labels) -> String {
  if labels.is_empty() {
    return sql.to_string();
  }
  let rendered = labels.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join(" ");
  format!("/* sqlgate: {rendered} */ {sql}")
}

fn column_names(row: &MySqlRow) -> Vec<String> {
  row.columns().iter().map(|c| c.name().to_string()).collect()
}

fn row_to_json_map(row: &MySqlRow) -> Map<String, Json> {
  let mut map = Map::new();
  for col in row.columns() {
    map.insert(col.name().to_string(), column_to_json(row, col.ordinal(), &col.type_info().to_string()));
  }
  map
}

fn column_to_json(row: &MySqlRow, ordinal: usize, type_name: &str) -> Json {
  if row.try_get_raw(ordinal).is_ok_and(|v| v.is_null()) {
    return Json::Null;
  }
  match type_name.to_uppercase().as_str() {
    "BOOLEAN" | "TINYINT(1)" => row.try_get::<bool, _>(ordinal).map(Json::from).unwrap_or(Json::Null),
    "SMALLINT" => row.try_get::<i16, _>(ordinal).map(Json::from).unwrap_or(Json::Null),
    "INT" | "INTEGER" => row.try_get::<i32, _>(ordinal).map(Json::from).unwrap_or(Json::Null),
    "BIGINT" => row.try_get::<i64, _>(ordinal).map(Json::from).unwrap_or(Json::Null),
    "FLOAT" => row.try_get::<f32, _>(ordinal).map(|v| Json::from(v as f64)).unwrap_or(Json::Null),
    "DOUBLE" => row.try_get::<f64, _>(ordinal).map(Json::from).unwrap_or(Json::Null),
    "JSON" => row.try_get::<Json, _>(ordinal).unwrap_or(Json::Null),
    "DATETIME" | "TIMESTAMP" => {
      row.try_get::<chrono::NaiveDateTime, _>(ordinal).map(|v| Json::String(v.to_string())).unwrap_or(Json::Null)
    },
    "DATE" => row.try_get::<chrono::NaiveDate, _>(ordinal).map(|v| Json::String(v.to_string())).unwrap_or(Json::Null),
    _ => row.try_get_unchecked::<String, _>(ordinal).map(Json::String).unwrap_or(Json::Null),
  }
}

fn plan_to_estimate(plan_json: &Json) -> CostEstimate {
  let cost_info = plan_json.get("query_block").and_then(|q| q.get("cost_info"));
  let estimated_rows =
    plan_json.get("query_block").and_then(|q| q.get("table")).and_then(|t| t.get("rows_examined_per_scan")).and_then(Json::as_u64);
  let summary = cost_info.and_then(|c| c.get("query_cost")).and_then(Json::as_str).map(|c| format!("query cost: {c}"));
  CostEstimate { estimated_rows, summary, ..Default::default() }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn dangerous_functions_cover_mysql_file_and_shell_surfaces() {
    let adapter = MySqlAdapter::default();
    let blocklist = adapter.dangerous_functions();
    assert!(blocklist.contains("load_file"));
    assert!(blocklist.contains("sys_exec"));
  }

  #[test]
  fn plan_json_extracts_rows_examined() {
    let plan_json = serde_json::json!({
      "query_block": { "table": { "rows_examined_per_scan": 42 }, "cost_info": { "query_cost": "1.25" } }
    });
    let estimate = plan_to_estimate(&plan_json);
    assert_eq!(estimate.estimated_rows, Some(42));
  }
}
