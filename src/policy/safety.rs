//! AST predicates that flag unsafe statement shapes.

use std::collections::BTreeSet;

use sqlparser::ast::{
  BinaryOperator, Delete, Expr, Function, FunctionArg, FunctionArgExpr, FunctionArguments, FromTable, Join,
  JoinConstraint, JoinOperator, ObjectName, Query, Select, SelectItem, SetExpr, Statement, TableFactor, TableWithJoins,
  Value, Values,
};

use crate::diagnostics::{codes, Diagnostic, Span};

/// `Q0202`. `parse_many` already ran by the time this is called; the
/// driver passes the statement count in directly.
pub fn check_multiple_statements(sql: &str, statement_count: usize) -> Option<Diagnostic> {
  if statement_count <= 1 {
    return None;
  }
  let split_at = sql.find(';').unwrap_or(sql.len() / 2);
  Some(
    Diagnostic::error(codes::MULTIPLE_STATEMENTS, "multiple statements are not allowed in a single call")
      .with_span(Span::new(split_at, (split_at + 1).min(sql.len())), Some("second statement begins near here"))
      .with_note("only single statements are allowed")
      .with_note("split into separate calls"),
  )
}

/// `Q0201`.
pub fn check_delete_without_where(statement: &Statement) -> Option<Diagnostic> {
  let Statement::Delete(delete) = statement else { return None };
  if delete.selection.is_none() {
    return Some(
      Diagnostic::error(codes::DELETE_WITHOUT_WHERE, "DELETE without a WHERE clause removes every row")
        .with_note("add a WHERE clause or confirm the unconditional delete out of band"),
    );
  }
  None
}

/// `Q0203`.
pub fn check_update_without_where(statement: &Statement) -> Option<Diagnostic> {
  let Statement::Update { selection, .. } = statement else { return None };
  if selection.is_none() {
    return Some(
      Diagnostic::error(codes::UPDATE_WITHOUT_WHERE, "UPDATE without a WHERE clause modifies every row")
        .with_note("add a WHERE clause or confirm the unconditional update out of band"),
    );
  }
  None
}

/// `Q0204`. Walks the top-level `FROM` of a plain select, folding each
/// joined relation's identifier set into a running left-side set. A
/// join (explicit `CROSS JOIN` or an implicit comma-join, i.e. a second
/// top-level `FROM` item with no `ON`/`USING`/`NATURAL`) only warns when
/// no `WHERE` predicate links the two sides by identifier.
pub fn check_cross_join_no_condition(statement: &Statement) -> Option<Diagnostic> {
  let Statement::Query(query) = statement else { return None };
  let SetExpr::Select(select) = query.body.as_ref() else { return None };
  if select.from.is_empty() {
    return None;
  }

  let mut left_ids = relation_identifiers(&select.from[0].relation);
  for join in &select.from[0].joins {
    if join_is_unconditioned(join) {
      let right_ids = relation_identifiers(&join.relation);
      if !where_links(&select.selection, &left_ids, &right_ids) {
        return Some(cross_join_warning());
      }
      left_ids.extend(right_ids);
    } else {
      left_ids.extend(relation_identifiers(&join.relation));
    }
  }

  for twj in &select.from[1..] {
    // a second top-level FROM item is an implicit comma-join against
    // everything accumulated so far.
    let right_ids = relation_identifiers(&twj.relation);
    if !where_links(&select.selection, &left_ids, &right_ids) {
      return Some(cross_join_warning());
    }
    left_ids.extend(right_ids.clone());
    for join in &twj.joins {
      if join_is_unconditioned(join) {
        let ids = relation_identifiers(&join.relation);
        if !where_links(&select.selection, &left_ids, &ids) {
          return Some(cross_join_warning());
        }
        left_ids.extend(ids);
      } else {
        left_ids.extend(relation_identifiers(&join.relation));
      }
    }
  }

  None
}

fn cross_join_warning() -> Diagnostic {
  Diagnostic::warning(codes::CROSS_JOIN_NO_CONDITION, "cross join has no joining condition")
    .with_note("add an ON/USING clause, or a WHERE predicate linking both sides, if this is intentional")
}

fn join_is_unconditioned(join: &Join) -> bool {
  match &join.join_operator {
    JoinOperator::CrossJoin => true,
    JoinOperator::Inner(JoinConstraint::None) => true,
    _ => false,
  }
}

fn relation_identifiers(factor: &TableFactor) -> BTreeSet<String> {
  let mut ids = BTreeSet::new();
  match factor {
    TableFactor::Table { name, alias, .. } => {
      if let Some(alias) = alias {
        ids.insert(alias.name.value.to_lowercase());
      }
      if let Some(last) = name.0.last() {
        ids.insert(last.value.to_lowercase());
      }
    },
    TableFactor::Derived { alias, .. } => {
      if let Some(alias) = alias {
        ids.insert(alias.name.value.to_lowercase());
      }
    },
    _ => {},
  }
  ids
}

/// A `WHERE` predicate *links* two relations when some comparison
/// sub-expression references an identifier from each side.
fn where_links(selection: &Option<Expr>, left: &BTreeSet<String>, right: &BTreeSet<String>) -> bool {
  let Some(expr) = selection else { return false };
  link_found_in_expr(expr, left, right)
}

fn link_found_in_expr(expr: &Expr, left: &BTreeSet<String>, right: &BTreeSet<String>) -> bool {
  match expr {
    Expr::BinaryOp { left: lhs, op, right: rhs } => {
      if matches!(
        op,
        BinaryOperator::Eq
          | BinaryOperator::NotEq
          | BinaryOperator::Gt
          | BinaryOperator::GtEq
          | BinaryOperator::Lt
          | BinaryOperator::LtEq
      ) {
        let lhs_ids = expr_identifiers(lhs);
        let rhs_ids = expr_identifiers(rhs);
        let links = (!lhs_ids.is_disjoint(left) && !rhs_ids.is_disjoint(right))
          || (!lhs_ids.is_disjoint(right) && !rhs_ids.is_disjoint(left));
        if links {
          return true;
        }
      }
      link_found_in_expr(lhs, left, right) || link_found_in_expr(rhs, left, right)
    },
    Expr::IsNotNull(inner) | Expr::IsNull(inner) => link_found_in_expr(inner, left, right),
    Expr::Nested(inner) => link_found_in_expr(inner, left, right),
    _ => false,
  }
}

fn expr_identifiers(expr: &Expr) -> BTreeSet<String> {
  let mut ids = BTreeSet::new();
  match expr {
    Expr::Identifier(ident) => {
      ids.insert(ident.value.to_lowercase());
    },
    Expr::CompoundIdentifier(parts) => {
      if let Some(first) = parts.first() {
        ids.insert(first.value.to_lowercase());
      }
    },
    _ => {},
  }
  ids
}

/// `Q0205`. Flags a boolean-literal `TRUE`/`1=1` style tautology, or an
/// equality between two literal constants of matching kind.
pub fn check_constant_condition(statement: &Statement) -> Option<Diagnostic> {
  let selection = match statement {
    Statement::Query(query) => match query.body.as_ref() {
      SetExpr::Select(select) => select.selection.clone(),
      _ => None,
    },
    Statement::Update { selection, .. } => selection.clone(),
    Statement::Delete(delete) => delete.selection.clone(),
    _ => None,
  }?;

  if contains_constant_condition(&selection) {
    return Some(
      Diagnostic::warning(codes::CONSTANT_CONDITION, "condition is always true regardless of row contents")
        .with_note("a constant condition does not filter any rows"),
    );
  }
  None
}

fn contains_constant_condition(expr: &Expr) -> bool {
  match expr {
    Expr::Value(Value::Boolean(true)) => true,
    Expr::BinaryOp { left, op: BinaryOperator::Eq, right } => matching_literal_equality(left, right),
    Expr::BinaryOp { left, op: BinaryOperator::And, right } | Expr::BinaryOp { left, op: BinaryOperator::Or, right } => {
      contains_constant_condition(left) || contains_constant_condition(right)
    },
    Expr::Nested(inner) => contains_constant_condition(inner),
    _ => false,
  }
}

fn matching_literal_equality(left: &Expr, right: &Expr) -> bool {
  match (left, right) {
    (Expr::Value(Value::Number(a, _)), Expr::Value(Value::Number(b, _))) => a == b,
    (Expr::Value(Value::SingleQuotedString(a)), Expr::Value(Value::SingleQuotedString(b))) => a == b,
    _ => false,
  }
}

/// `Q0206`. The blocklist is supplied by the engine adapter and keyed on
/// lower-cased function name; fires on the first match found anywhere in
/// the statement, at any nesting depth.
pub fn check_dangerous_functions(statement: &Statement, blocklist: &BTreeSet<String>) -> Option<Diagnostic> {
  if blocklist.is_empty() {
    return None;
  }
  let mut found = None;
  walk_statement_for_function_calls(statement, &mut |name| {
    if found.is_none() && blocklist.contains(&name.to_lowercase()) {
      found = Some(name.to_string());
    }
  });
  found.map(|name| {
    Diagnostic::error(codes::DANGEROUS_FUNCTION, format!("call to blocked function `{name}`"))
      .with_note("this function is disallowed by the connected engine's policy")
  })
}

/// Unconditional walk over every statement kind that can carry an
/// expression tree, mirroring an unrestricted `find_all` over the AST
/// rather than stopping at `SELECT` bodies.
fn walk_statement_for_function_calls(statement: &Statement, visit: &mut impl FnMut(&str)) {
  match statement {
    Statement::Query(query) => walk_query_for_function_calls(query, visit),
    Statement::Insert(insert) => {
      if let Some(source) = &insert.source {
        walk_query_for_function_calls(source, visit);
      }
    },
    Statement::Update { table, assignments, from, selection, .. } => {
      walk_table_with_joins_for_function_calls(table, visit);
      for assignment in assignments {
        walk_expr_for_function_calls(&assignment.value, visit);
      }
      if let Some(from) = from {
        walk_table_with_joins_for_function_calls(from, visit);
      }
      if let Some(selection) = selection {
        walk_expr_for_function_calls(selection, visit);
      }
    },
    Statement::Delete(delete) => walk_delete_for_function_calls(delete, visit),
    Statement::CreateView { query, .. } => walk_query_for_function_calls(query, visit),
    _ => {},
  }
}

fn walk_delete_for_function_calls(delete: &Delete, visit: &mut impl FnMut(&str)) {
  match &delete.from {
    FromTable::WithFromKeyword(list) | FromTable::WithoutKeyword(list) => {
      for twj in list {
        walk_table_with_joins_for_function_calls(twj, visit);
      }
    },
  }
  if let Some(using) = &delete.using {
    for twj in using {
      walk_table_with_joins_for_function_calls(twj, visit);
    }
  }
  if let Some(selection) = &delete.selection {
    walk_expr_for_function_calls(selection, visit);
  }
}

fn walk_table_with_joins_for_function_calls(twj: &TableWithJoins, visit: &mut impl FnMut(&str)) {
  walk_table_factor_for_function_calls(&twj.relation, visit);
  for join in &twj.joins {
    walk_table_factor_for_function_calls(&join.relation, visit);
  }
}

fn walk_table_factor_for_function_calls(factor: &TableFactor, visit: &mut impl FnMut(&str)) {
  match factor {
    TableFactor::Derived { subquery, .. } => walk_query_for_function_calls(subquery, visit),
    TableFactor::NestedJoin { table_with_joins, .. } => walk_table_with_joins_for_function_calls(table_with_joins, visit),
    _ => {},
  }
}

fn walk_query_for_function_calls(query: &Query, visit: &mut impl FnMut(&str)) {
  if let Some(with) = &query.with {
    for cte in &with.cte_tables {
      walk_query_for_function_calls(&cte.query, visit);
    }
  }
  walk_set_expr_for_function_calls(&query.body, visit);
}

fn walk_set_expr_for_function_calls(body: &SetExpr, visit: &mut impl FnMut(&str)) {
  match body {
    SetExpr::Select(select) => walk_select_for_function_calls(select, visit),
    SetExpr::Query(query) => walk_query_for_function_calls(query, visit),
    SetExpr::SetOperation { left, right, .. } => {
      walk_set_expr_for_function_calls(left, visit);
      walk_set_expr_for_function_calls(right, visit);
    },
    SetExpr::Values(values) => walk_values_for_function_calls(values, visit),
    SetExpr::Insert(stmt) | SetExpr::Update(stmt) => walk_statement_for_function_calls(stmt, visit),
    SetExpr::Table(_) => {},
  }
}

fn walk_values_for_function_calls(values: &Values, visit: &mut impl FnMut(&str)) {
  for row in &values.rows {
    for expr in row {
      walk_expr_for_function_calls(expr, visit);
    }
  }
}

fn walk_select_for_function_calls(select: &Select, visit: &mut impl FnMut(&str)) {
  for item in &select.projection {
    walk_select_item_for_function_calls(item, visit);
  }
  for twj in &select.from {
    walk_table_with_joins_for_function_calls(twj, visit);
  }
  if let Some(selection) = &select.selection {
    walk_expr_for_function_calls(selection, visit);
  }
  if let Some(having) = &select.having {
    walk_expr_for_function_calls(having, visit);
  }
}

fn walk_select_item_for_function_calls(item: &SelectItem, visit: &mut impl FnMut(&str)) {
  match item {
    SelectItem::UnnamedExpr(expr) | SelectItem::ExprWithAlias { expr, .. } => walk_expr_for_function_calls(expr, visit),
    _ => {},
  }
}

/// Recurses into every expression position reachable from `expr`,
/// including a function call's own arguments, `CASE`/`IN`/`BETWEEN`
/// branches and subqueries. Variants with no contained expression (plain
/// literals, identifiers, wildcards) are the only ones left unmatched.
fn walk_expr_for_function_calls(expr: &Expr, visit: &mut impl FnMut(&str)) {
  match expr {
    Expr::Function(func) => {
      let name = function_name(&func.name);
      visit(&name);
      walk_function_args_for_function_calls(func, visit);
    },
    Expr::BinaryOp { left, right, .. } => {
      walk_expr_for_function_calls(left, visit);
      walk_expr_for_function_calls(right, visit);
    },
    Expr::UnaryOp { expr, .. }
    | Expr::Nested(expr)
    | Expr::IsNull(expr)
    | Expr::IsNotNull(expr)
    | Expr::IsTrue(expr)
    | Expr::IsNotTrue(expr)
    | Expr::IsFalse(expr)
    | Expr::IsNotFalse(expr)
    | Expr::Cast { expr, .. }
    | Expr::Collate { expr, .. } => walk_expr_for_function_calls(expr, visit),
    Expr::Between { expr, low, high, .. } => {
      walk_expr_for_function_calls(expr, visit);
      walk_expr_for_function_calls(low, visit);
      walk_expr_for_function_calls(high, visit);
    },
    Expr::InList { expr, list, .. } => {
      walk_expr_for_function_calls(expr, visit);
      for item in list {
        walk_expr_for_function_calls(item, visit);
      }
    },
    Expr::InSubquery { expr, subquery, .. } => {
      walk_expr_for_function_calls(expr, visit);
      walk_query_for_function_calls(subquery, visit);
    },
    Expr::Subquery(subquery) | Expr::Exists { subquery, .. } => walk_query_for_function_calls(subquery, visit),
    Expr::Like { expr, pattern, .. } | Expr::ILike { expr, pattern, .. } => {
      walk_expr_for_function_calls(expr, visit);
      walk_expr_for_function_calls(pattern, visit);
    },
    Expr::Case { operand, conditions, results, else_result } => {
      if let Some(operand) = operand {
        walk_expr_for_function_calls(operand, visit);
      }
      for condition in conditions {
        walk_expr_for_function_calls(condition, visit);
      }
      for result in results {
        walk_expr_for_function_calls(result, visit);
      }
      if let Some(else_result) = else_result {
        walk_expr_for_function_calls(else_result, visit);
      }
    },
    Expr::Tuple(exprs) => {
      for expr in exprs {
        walk_expr_for_function_calls(expr, visit);
      }
    },
    _ => {},
  }
}

fn walk_function_args_for_function_calls(func: &Function, visit: &mut impl FnMut(&str)) {
  match &func.args {
    FunctionArguments::List(list) => {
      for arg in &list.args {
        let arg_expr = match arg {
          FunctionArg::Named { arg, .. } | FunctionArg::Unnamed(arg) => arg,
        };
        if let FunctionArgExpr::Expr(expr) = arg_expr {
          walk_expr_for_function_calls(expr, visit);
        }
      }
    },
    FunctionArguments::Subquery(subquery) => walk_query_for_function_calls(subquery, visit),
    FunctionArguments::None => {},
  }
}

fn function_name(name: &ObjectName) -> String {
  name.0.last().map(|i| i.value.clone()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::parser::{parse_one, SqlDialect};

  fn parse(sql: &str) -> Statement {
    parse_one(sql, Some(SqlDialect::Postgres)).expect("should parse")
  }

  #[test]
  fn flags_delete_without_where() {
    assert!(check_delete_without_where(&parse("DELETE FROM t")).is_some());
    assert!(check_delete_without_where(&parse("DELETE FROM t WHERE id = 1")).is_none());
  }

  #[test]
  fn flags_update_without_where() {
    assert!(check_update_without_where(&parse("UPDATE t SET a = 1")).is_some());
    assert!(check_update_without_where(&parse("UPDATE t SET a = 1 WHERE id = 1")).is_none());
  }

  #[test]
  fn cross_join_with_linking_where_is_suppressed() {
    let stmt = parse("SELECT * FROM a, b WHERE a.id = b.id");
    assert!(check_cross_join_no_condition(&stmt).is_none());
  }

  #[test]
  fn cross_join_without_linking_where_warns() {
    let stmt = parse("SELECT * FROM a, b");
    assert!(check_cross_join_no_condition(&stmt).is_some());
  }

  #[test]
  fn explicit_cross_join_without_condition_warns() {
    let stmt = parse("SELECT * FROM a CROSS JOIN b");
    assert!(check_cross_join_no_condition(&stmt).is_some());
  }

  #[test]
  fn inner_join_with_on_is_not_flagged() {
    let stmt = parse("SELECT * FROM a JOIN b ON a.id = b.id");
    assert!(check_cross_join_no_condition(&stmt).is_none());
  }

  #[test]
  fn boolean_true_condition_is_constant() {
    let stmt = parse("SELECT * FROM t WHERE TRUE");
    assert!(check_constant_condition(&stmt).is_some());
  }

  #[test]
  fn literal_equality_condition_is_constant() {
    let stmt = parse("SELECT * FROM t WHERE 1 = 1");
    assert!(check_constant_condition(&stmt).is_some());
  }

  #[test]
  fn column_comparison_is_not_constant() {
    let stmt = parse("SELECT * FROM t WHERE id = 1");
    assert!(check_constant_condition(&stmt).is_none());
  }

  #[test]
  fn dangerous_function_call_is_flagged() {
    let stmt = parse("SELECT pg_terminate_backend(1)");
    let mut blocklist = BTreeSet::new();
    blocklist.insert("pg_terminate_backend".to_string());
    assert!(check_dangerous_functions(&stmt, &blocklist).is_some());
  }

  #[test]
  fn empty_blocklist_never_flags() {
    let stmt = parse("SELECT pg_terminate_backend(1)");
    assert!(check_dangerous_functions(&stmt, &BTreeSet::new()).is_none());
  }

  fn blocklist_of(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|n| n.to_string()).collect()
  }

  #[test]
  fn dangerous_function_in_update_assignment_is_flagged() {
    let stmt = parse("UPDATE t SET x = pg_terminate_backend(1) WHERE id = 1");
    let blocklist = blocklist_of(&["pg_terminate_backend"]);
    assert!(check_dangerous_functions(&stmt, &blocklist).is_some());
  }

  #[test]
  fn dangerous_function_nested_in_call_arguments_is_flagged() {
    let stmt = parse("SELECT coalesce(pg_terminate_backend(1), 0)");
    let blocklist = blocklist_of(&["pg_terminate_backend"]);
    assert!(check_dangerous_functions(&stmt, &blocklist).is_some());
  }

  #[test]
  fn dangerous_function_in_delete_where_is_flagged() {
    let stmt = parse("DELETE FROM t WHERE pg_terminate_backend(id) > 0");
    let blocklist = blocklist_of(&["pg_terminate_backend"]);
    assert!(check_dangerous_functions(&stmt, &blocklist).is_some());
  }

  #[test]
  fn dangerous_function_in_insert_values_is_flagged() {
    let stmt = parse("INSERT INTO t (a) VALUES (pg_terminate_backend(1))");
    let blocklist = blocklist_of(&["pg_terminate_backend"]);
    assert!(check_dangerous_functions(&stmt, &blocklist).is_some());
  }

  #[test]
  fn dangerous_function_in_case_branch_is_flagged() {
    let stmt = parse("SELECT CASE WHEN id = 1 THEN pg_terminate_backend(1) ELSE 0 END FROM t");
    let blocklist = blocklist_of(&["pg_terminate_backend"]);
    assert!(check_dangerous_functions(&stmt, &blocklist).is_some());
  }

  #[test]
  fn dangerous_function_in_subquery_is_flagged() {
    let stmt = parse("SELECT * FROM t WHERE id IN (SELECT pg_terminate_backend(1))");
    let blocklist = blocklist_of(&["pg_terminate_backend"]);
    assert!(check_dangerous_functions(&stmt, &blocklist).is_some());
  }

  #[test]
  fn multiple_statements_is_flagged_by_count() {
    assert!(check_multiple_statements("SELECT 1; SELECT 2", 2).is_some());
    assert!(check_multiple_statements("SELECT 1", 1).is_none());
  }
}
