//! Orchestrates parse -> classify -> access-check -> safety -> enrich ->
//! verdict, in the fixed order the pipeline's invariants depend on.

mod classify;
mod enrich;
mod safety;
mod tables;

pub use classify::classify;
pub use enrich::{inject_limit, DEFAULT_LIMIT};
pub use safety::{
  check_constant_condition, check_cross_join_no_condition, check_dangerous_functions, check_delete_without_where,
  check_multiple_statements, check_update_without_where,
};
pub use tables::extract_tables;

use std::collections::BTreeSet;

use crate::diagnostics::{codes, Classification, Diagnostic, PipelineResult};
use crate::parser::{self, SqlDialect};

/// Options that shape a single policy run, corresponding to the options
/// enumerated for the `query`/`execute-write` entry points.
#[derive(Debug, Clone)]
pub struct PolicyOptions {
  pub dialect: Option<SqlDialect>,
  pub allow_write: bool,
  /// `None` disables row-cap enrichment entirely.
  pub limit: Option<u64>,
  pub dangerous_functions: BTreeSet<String>,
}

impl Default for PolicyOptions {
  fn default() -> Self {
    Self { dialect: None, allow_write: false, limit: Some(DEFAULT_LIMIT), dangerous_functions: BTreeSet::new() }
  }
}

/// Runs the full policy pipeline over a single SQL call.
pub fn run_policy(sql: &str, options: &PolicyOptions) -> PipelineResult {
  let mut diagnostics = Vec::new();

  // step 1: multiple-statements check needs only a count, not a full AST.
  let statement_count = parser::parse_many(sql, options.dialect).map(|v| v.len()).unwrap_or(1);
  if let Some(d) = check_multiple_statements(sql, statement_count) {
    diagnostics.push(d);
    return blocked_result(sql, diagnostics);
  }

  // step 2: parse the single statement.
  let statement = match parser::parse_one(sql, options.dialect) {
    Ok(stmt) => stmt,
    Err(e) => {
      diagnostics.push(Diagnostic::error(codes::SYNTAX_ERROR, e.to_string()));
      return blocked_result(sql, diagnostics);
    },
  };

  // step 3: classification and table extraction, once, never mutated after.
  let classification = classify(&statement);
  let tables = extract_tables(&statement);

  // step 4: access control.
  match classification {
    Classification::Dml if !options.allow_write => {
      diagnostics.push(Diagnostic::error(codes::WRITE_BLOCKED, "write statements are not allowed on this entry point"));
    },
    Classification::Ddl if !options.allow_write => {
      diagnostics.push(Diagnostic::error(codes::DDL_BLOCKED, "schema-changing statements are not allowed on this entry point"));
    },
    Classification::Admin => {
      diagnostics.push(Diagnostic::error(codes::ADMIN_BLOCKED, "administrative statements are never allowed"));
    },
    Classification::Unknown => {
      diagnostics.push(Diagnostic::error(
        codes::UNKNOWN_STATEMENT_BLOCKED,
        "statement could not be classified and is blocked by default",
      ));
    },
    _ => {},
  }

  // step 5: safety checks, deterministic order. multi-statement was
  // already handled in step 1.
  if let Some(d) = check_delete_without_where(&statement) {
    diagnostics.push(d);
  }
  if let Some(d) = check_update_without_where(&statement) {
    diagnostics.push(d);
  }
  if let Some(d) = check_cross_join_no_condition(&statement) {
    diagnostics.push(d);
  }
  if let Some(d) = check_constant_condition(&statement) {
    diagnostics.push(d);
  }
  if let Some(d) = check_dangerous_functions(&statement, &options.dangerous_functions) {
    diagnostics.push(d);
  }

  let blocked = diagnostics.iter().any(Diagnostic::is_blocking);

  // step 6: enrichment, only on an unblocked READ with enrichment enabled.
  let mut healed_sql = None;
  if !blocked && classification == Classification::Read {
    if let Some((rewritten, diagnostic)) = inject_limit(&statement, options.limit) {
      healed_sql = Some(rewritten.to_string());
      diagnostics.push(diagnostic);
    }
  }

  // step 7: compose the result. blocked is recomputed since enrichment
  // only ever adds an Info diagnostic, but recomputing keeps the
  // invariant self-evident at the call site.
  let blocked = diagnostics.iter().any(Diagnostic::is_blocking);

  PipelineResult { original_sql: sql.to_string(), healed_sql, diagnostics, blocked, classification, tables }
}

fn blocked_result(sql: &str, diagnostics: Vec<Diagnostic>) -> PipelineResult {
  PipelineResult {
    original_sql: sql.to_string(),
    healed_sql: None,
    diagnostics,
    blocked: true,
    classification: Classification::Unknown,
    tables: Vec::new(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn run(sql: &str) -> PipelineResult {
    run_policy(sql, &PolicyOptions::default())
  }

  fn run_with(sql: &str, options: PolicyOptions) -> PipelineResult {
    run_policy(sql, &options)
  }

  #[test]
  fn bare_select_gets_limited() {
    let result = run("SELECT id FROM users");
    assert_eq!(result.classification, Classification::Read);
    assert!(!result.blocked);
    assert!(result.effective_sql().contains("LIMIT 1000"));
    assert!(result.codes().contains(&codes::LIMIT_INJECTED));
  }

  #[test]
  fn multi_statement_injection_is_blocked() {
    let result = run("SELECT 1; DROP TABLE x");
    assert!(result.blocked);
    assert!(result.codes().contains(&codes::MULTIPLE_STATEMENTS));
  }

  #[test]
  fn writable_cte_escalates_and_is_blocked_without_allow_write() {
    let result = run("WITH d AS (DELETE FROM t WHERE id=1 RETURNING *) SELECT * FROM d");
    assert_eq!(result.classification, Classification::Dml);
    assert!(result.codes().contains(&codes::WRITE_BLOCKED));
    assert!(result.blocked);
  }

  #[test]
  fn cross_join_with_linking_where_has_no_warning() {
    let result = run("SELECT * FROM a, b WHERE a.id = b.id");
    assert!(!result.codes().contains(&codes::CROSS_JOIN_NO_CONDITION));
  }

  #[test]
  fn dangerous_function_is_blocked() {
    let mut blocklist = BTreeSet::new();
    blocklist.insert("pg_terminate_backend".to_string());
    let options = PolicyOptions { dangerous_functions: blocklist, ..PolicyOptions::default() };
    let result = run_with("SELECT pg_terminate_backend(1)", options);
    assert!(result.codes().contains(&codes::DANGEROUS_FUNCTION));
    assert!(result.blocked);
  }

  #[test]
  fn dangerous_function_in_update_assignment_is_blocked() {
    let mut blocklist = BTreeSet::new();
    blocklist.insert("pg_terminate_backend".to_string());
    let options = PolicyOptions { allow_write: true, dangerous_functions: blocklist, ..PolicyOptions::default() };
    let result = run_with("UPDATE t SET x = pg_terminate_backend(1) WHERE id=1", options);
    assert!(result.codes().contains(&codes::DANGEROUS_FUNCTION));
    assert!(result.blocked);
  }

  #[test]
  fn dangerous_function_nested_in_call_arguments_is_blocked() {
    let mut blocklist = BTreeSet::new();
    blocklist.insert("pg_terminate_backend".to_string());
    let options = PolicyOptions { dangerous_functions: blocklist, ..PolicyOptions::default() };
    let result = run_with("SELECT coalesce(pg_terminate_backend(1), 0)", options);
    assert!(result.codes().contains(&codes::DANGEROUS_FUNCTION));
    assert!(result.blocked);
  }

  #[test]
  fn admin_statement_is_always_blocked() {
    let options = PolicyOptions { allow_write: true, ..PolicyOptions::default() };
    let result = run_with("GRANT SELECT ON t TO alice", options);
    assert!(result.blocked);
    assert!(result.codes().contains(&codes::ADMIN_BLOCKED));
  }

  #[test]
  fn ddl_with_allow_write_is_permitted() {
    let options = PolicyOptions { allow_write: true, ..PolicyOptions::default() };
    let result = run_with("CREATE TABLE t (id int)", options);
    assert!(!result.codes().contains(&codes::DDL_BLOCKED));
  }

  #[test]
  fn healed_sql_round_trip_does_not_reinject_limit() {
    let first = run("SELECT id FROM users");
    let second = run(first.effective_sql());
    assert!(!second.codes().contains(&codes::LIMIT_INJECTED));
  }

  #[test]
  fn limit_none_disables_enrichment_end_to_end() {
    let options = PolicyOptions { limit: None, ..PolicyOptions::default() };
    let result = run_with("SELECT id FROM users", options);
    assert!(result.healed_sql.is_none());
    assert_eq!(result.effective_sql(), "SELECT id FROM users");
    assert!(!result.codes().contains(&codes::LIMIT_INJECTED));
  }

  #[test]
  fn syntax_error_is_blocked_with_q0001() {
    let result = run("SELECT * FROM 'unterminated");
    assert!(result.blocked);
    assert!(result.codes().contains(&codes::SYNTAX_ERROR));
  }
}
