//! Auto-rewrite of unbounded reads into row-capped ones.

use sqlparser::ast::{Query, SetExpr, Statement};

use crate::diagnostics::{codes, Diagnostic};

pub const DEFAULT_LIMIT: u64 = 1000;

/// Injects `LIMIT limit` into a plain `SELECT` that has neither a
/// `LIMIT` nor a `GROUP BY`. Returns the rewritten statement and an
/// info diagnostic on success; `None` if no injection was needed (the
/// caller should leave `healed_sql` unset in that case). `limit=None`
/// means the caller passed `limit=none` and enrichment is disabled
/// entirely, not "fall back to the default".
pub fn inject_limit(statement: &Statement, limit: Option<u64>) -> Option<(Statement, Diagnostic)> {
  let limit = limit?;
  let Statement::Query(query) = statement else { return None };
  if !is_plain_select(query) {
    return None;
  }
  if query.limit.is_some() || has_group_by(query) {
    return None;
  }

  let mut rewritten = query.as_ref().clone();
  rewritten.limit = Some(sqlparser::ast::Expr::Value(sqlparser::ast::Value::Number(limit.to_string(), false)));
  rewritten.limit_by = vec![];

  let diagnostic =
    Diagnostic::info(codes::LIMIT_INJECTED, format!("no LIMIT was present; capped at {limit} rows"))
      .with_note("pass an explicit limit, or limit=none, to opt out");

  Some((Statement::Query(Box::new(rewritten)), diagnostic))
}

fn is_plain_select(query: &Query) -> bool {
  matches!(query.body.as_ref(), SetExpr::Select(_))
}

fn has_group_by(query: &Query) -> bool {
  let SetExpr::Select(select) = query.body.as_ref() else { return false };
  !matches!(select.group_by, sqlparser::ast::GroupByExpr::Expressions(ref exprs, _) if exprs.is_empty())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::parser::{parse_one, SqlDialect};

  fn parse(sql: &str) -> Statement {
    parse_one(sql, Some(SqlDialect::Postgres)).expect("should parse")
  }

  #[test]
  fn injects_default_limit_on_bare_select() {
    let stmt = parse("SELECT id FROM users");
    let (rewritten, diagnostic) = inject_limit(&stmt, Some(DEFAULT_LIMIT)).expect("should inject");
    assert!(rewritten.to_string().contains("LIMIT 1000"));
    assert_eq!(diagnostic.code, codes::LIMIT_INJECTED);
  }

  #[test]
  fn skips_when_limit_already_present() {
    let stmt = parse("SELECT id FROM users LIMIT 10");
    assert!(inject_limit(&stmt, Some(DEFAULT_LIMIT)).is_none());
  }

  #[test]
  fn skips_when_group_by_present() {
    let stmt = parse("SELECT count(*) FROM users GROUP BY id");
    assert!(inject_limit(&stmt, Some(DEFAULT_LIMIT)).is_none());
  }

  #[test]
  fn none_disables_enrichment_entirely() {
    let stmt = parse("SELECT id FROM users");
    assert!(inject_limit(&stmt, None).is_none());
  }

  #[test]
  fn respects_custom_limit() {
    let stmt = parse("SELECT id FROM users");
    let (rewritten, _) = inject_limit(&stmt, Some(50)).expect("should inject");
    assert!(rewritten.to_string().contains("LIMIT 50"));
  }
}
