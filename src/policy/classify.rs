//! Maps a parsed statement to a [`Classification`], purely structurally.

use sqlparser::ast::{Query, SetExpr, Statement};

use crate::diagnostics::Classification;

/// Applies the ordered classification rules to the root statement.
pub fn classify(statement: &Statement) -> Classification {
  match statement {
    // Privilege grants, bulk-copy directives, and anything the parser
    // could only decode as an opaque command are always ADMIN.
    Statement::Grant { .. } | Statement::Copy { .. } => Classification::Admin,

    Statement::Query(query) => classify_query(query),

    Statement::Insert(_) | Statement::Update { .. } | Statement::Delete(_) => Classification::Dml,

    Statement::CreateTable(_)
    | Statement::CreateView { .. }
    | Statement::CreateIndex(_)
    | Statement::CreateSchema { .. }
    | Statement::Drop { .. }
    | Statement::AlterTable { .. }
    | Statement::AlterIndex { .. }
    | Statement::AlterView { .. }
    | Statement::Truncate { .. } => Classification::Ddl,

    _ => Classification::Unknown,
  }
}

fn classify_query(query: &Query) -> Classification {
  if has_writable_cte(query) {
    return Classification::Dml;
  }
  if has_into_target(query) {
    return Classification::Ddl;
  }
  match query.body.as_ref() {
    SetExpr::Select(_) | SetExpr::SetOperation { .. } | SetExpr::Query(_) | SetExpr::Table(_) | SetExpr::Values(_) => {
      Classification::Read
    },
    _ => Classification::Unknown,
  }
}

fn has_writable_cte(query: &Query) -> bool {
  let Some(with) = &query.with else { return false };
  with.cte_tables.iter().any(|cte| statement_body_is_dml(&cte.query))
}

/// A CTE's body is itself a `Query`; sqlparser represents `INSERT/UPDATE/
/// DELETE ... RETURNING` used as a CTE body as a `SetExpr::Insert`/
/// `Update`/`Delete` variant inside that nested query's `body`.
fn statement_body_is_dml(query: &Query) -> bool {
  matches!(query.body.as_ref(), SetExpr::Insert(_) | SetExpr::Update(_))
}

fn has_into_target(query: &Query) -> bool {
  matches!(query.body.as_ref(), SetExpr::Select(select) if select.into.is_some())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::parser::{parse_one, SqlDialect};

  fn classify_sql(sql: &str) -> Classification {
    let stmt = parse_one(sql, Some(SqlDialect::Postgres)).expect("should parse");
    classify(&stmt)
  }

  #[test]
  fn plain_select_is_read() {
    assert_eq!(classify_sql("SELECT id FROM users"), Classification::Read);
  }

  #[test]
  fn union_is_read() {
    assert_eq!(classify_sql("SELECT id FROM a UNION SELECT id FROM b"), Classification::Read);
  }

  #[test]
  fn insert_update_delete_are_dml() {
    assert_eq!(classify_sql("INSERT INTO t (a) VALUES (1)"), Classification::Dml);
    assert_eq!(classify_sql("UPDATE t SET a = 1"), Classification::Dml);
    assert_eq!(classify_sql("DELETE FROM t"), Classification::Dml);
  }

  #[test]
  fn create_drop_alter_truncate_are_ddl() {
    assert_eq!(classify_sql("CREATE TABLE t (id int)"), Classification::Ddl);
    assert_eq!(classify_sql("DROP TABLE t"), Classification::Ddl);
    assert_eq!(classify_sql("ALTER TABLE t ADD COLUMN b int"), Classification::Ddl);
    assert_eq!(classify_sql("TRUNCATE TABLE t"), Classification::Ddl);
  }

  #[test]
  fn grant_is_admin() {
    assert_eq!(classify_sql("GRANT SELECT ON t TO alice"), Classification::Admin);
  }

  #[test]
  fn writable_cte_escalates_to_dml() {
    let classification =
      classify_sql("WITH d AS (DELETE FROM t WHERE id = 1 RETURNING *) SELECT * FROM d");
    assert_eq!(classification, Classification::Dml);
  }

  #[test]
  fn select_into_is_ddl() {
    assert_eq!(classify_sql("SELECT * INTO new_table FROM old_table"), Classification::Ddl);
  }
}
