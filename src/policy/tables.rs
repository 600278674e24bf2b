//! Resolves the physical tables referenced by a statement.

use std::collections::BTreeSet;

use sqlparser::ast::{
  Delete, FromTable, Insert, ObjectName, Query, Select, SetExpr, Statement, TableFactor, TableWithJoins,
};

/// Returns the sorted, de-duplicated list of `schema.table` (or bare
/// `table` when unqualified) names referenced by `statement`.
///
/// For `SELECT`-shaped statements, CTE names are excluded by walking
/// only the non-CTE scopes and subtracting alias names collected from
/// `WITH`. For DML, the direct target is added explicitly since it does
/// not appear inside a `FROM`/select scope. DDL falls back to a plain
/// walk over every table factor reachable from the statement.
pub fn extract_tables(statement: &Statement) -> Vec<String> {
  let mut tables = BTreeSet::new();
  match statement {
    Statement::Query(query) => {
      let cte_names = collect_cte_names(query);
      collect_query_tables(query, &cte_names, &mut tables);
    },
    Statement::Insert(insert) => collect_insert_tables(insert, &mut tables),
    Statement::Update { table, .. } => {
      collect_table_with_joins(table, &BTreeSet::new(), &mut tables);
    },
    Statement::Delete(delete) => collect_delete_tables(delete, &mut tables),
    other => walk_statement_plain(other, &mut tables),
  }
  tables.into_iter().collect()
}

fn collect_cte_names(query: &Query) -> BTreeSet<String> {
  let mut names = BTreeSet::new();
  if let Some(with) = &query.with {
    for cte in &with.cte_tables {
      names.insert(cte.alias.name.value.to_lowercase());
    }
  }
  names
}

fn collect_query_tables(query: &Query, cte_names: &BTreeSet<String>, out: &mut BTreeSet<String>) {
  if let Some(with) = &query.with {
    for cte in &with.cte_tables {
      collect_query_tables(&cte.query, cte_names, out);
    }
  }
  collect_set_expr_tables(&query.body, cte_names, out);
}

fn collect_set_expr_tables(body: &SetExpr, cte_names: &BTreeSet<String>, out: &mut BTreeSet<String>) {
  match body {
    SetExpr::Select(select) => collect_select_tables(select, cte_names, out),
    SetExpr::Query(query) => collect_query_tables(query, cte_names, out),
    SetExpr::SetOperation { left, right, .. } => {
      collect_set_expr_tables(left, cte_names, out);
      collect_set_expr_tables(right, cte_names, out);
    },
    SetExpr::Insert(stmt) | SetExpr::Update(stmt) => {
      let mut plain = BTreeSet::new();
      walk_statement_plain(stmt, &mut plain);
      out.extend(plain);
    },
    SetExpr::Table(_) | SetExpr::Values(_) => {},
  }
}

fn collect_select_tables(select: &Select, cte_names: &BTreeSet<String>, out: &mut BTreeSet<String>) {
  collect_table_with_joins_list(&select.from, cte_names, out);
}

fn collect_table_with_joins_list(list: &[TableWithJoins], cte_names: &BTreeSet<String>, out: &mut BTreeSet<String>) {
  for twj in list {
    collect_table_with_joins(twj, cte_names, out);
  }
}

fn collect_table_with_joins(twj: &TableWithJoins, cte_names: &BTreeSet<String>, out: &mut BTreeSet<String>) {
  collect_table_factor(&twj.relation, cte_names, out);
  for join in &twj.joins {
    collect_table_factor(&join.relation, cte_names, out);
  }
}

fn collect_table_factor(factor: &TableFactor, cte_names: &BTreeSet<String>, out: &mut BTreeSet<String>) {
  match factor {
    TableFactor::Table { name, .. } => {
      let qualified = qualified_name(name);
      let bare = name.0.last().map(|p| p.to_string().to_lowercase()).unwrap_or_default();
      if !cte_names.contains(&bare) {
        out.insert(qualified);
      }
    },
    TableFactor::Derived { subquery, .. } => {
      collect_query_tables(subquery, cte_names, out);
    },
    TableFactor::NestedJoin { table_with_joins, .. } => {
      collect_table_with_joins(table_with_joins, cte_names, out);
    },
    _ => {},
  }
}

fn collect_insert_tables(insert: &Insert, out: &mut BTreeSet<String>) {
  out.insert(qualified_name(&insert.table_name));
  if let Some(source) = &insert.source {
    let mut plain = BTreeSet::new();
    collect_query_tables(source, &BTreeSet::new(), &mut plain);
    out.extend(plain);
  }
}

fn collect_delete_tables(delete: &Delete, out: &mut BTreeSet<String>) {
  match &delete.from {
    FromTable::WithFromKeyword(list) | FromTable::WithoutKeyword(list) => {
      collect_table_with_joins_list(list, &BTreeSet::new(), out);
    },
  }
  if let Some(using) = &delete.using {
    collect_table_with_joins_list(using, &BTreeSet::new(), out);
  }
}

/// Plain fallback walk for DDL and anything else: collects every object
/// name that looks like a table reference by scanning the statement's
/// debug-free structural fields we know about. DDL statements name their
/// single target directly rather than via a `FROM` scope.
fn walk_statement_plain(statement: &Statement, out: &mut BTreeSet<String>) {
  match statement {
    Statement::CreateTable(create) => {
      out.insert(qualified_name(&create.name));
    },
    Statement::CreateView { name, query, .. } => {
      out.insert(qualified_name(name));
      collect_query_tables(query, &BTreeSet::new(), out);
    },
    Statement::CreateIndex(create_index) => {
      out.insert(qualified_name(&create_index.table_name));
    },
    Statement::Drop { names, .. } => {
      for name in names {
        out.insert(qualified_name(name));
      }
    },
    Statement::AlterTable { name, .. } => {
      out.insert(qualified_name(name));
    },
    Statement::Truncate { table_names, .. } => {
      for t in table_names {
        out.insert(qualified_name(&t.name));
      }
    },
    _ => {},
  }
}

fn qualified_name(name: &ObjectName) -> String {
  name.0.iter().map(|ident| ident.value.to_lowercase()).collect::<Vec<_>>().join(".")
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::parser::{parse_one, SqlDialect};

  fn tables_of(sql: &str) -> Vec<String> {
    let stmt = parse_one(sql, Some(SqlDialect::Postgres)).expect("should parse");
    extract_tables(&stmt)
  }

  #[test]
  fn simple_select_extracts_the_table() {
    assert_eq!(tables_of("SELECT id FROM users"), vec!["users".to_string()]);
  }

  #[test]
  fn cte_name_is_excluded_from_tables() {
    let tables = tables_of("WITH recent AS (SELECT id FROM users) SELECT * FROM recent");
    assert_eq!(tables, vec!["users".to_string()]);
  }

  #[test]
  fn join_collects_both_sides() {
    let mut tables = tables_of("SELECT * FROM a JOIN b ON a.id = b.id");
    tables.sort();
    assert_eq!(tables, vec!["a".to_string(), "b".to_string()]);
  }

  #[test]
  fn delete_target_is_included() {
    assert_eq!(tables_of("DELETE FROM t WHERE id = 1"), vec!["t".to_string()]);
  }

  #[test]
  fn insert_target_is_included() {
    assert_eq!(tables_of("INSERT INTO t (a) VALUES (1)"), vec!["t".to_string()]);
  }

  #[test]
  fn ddl_falls_back_to_plain_walk() {
    assert_eq!(tables_of("CREATE TABLE t (id int)"), vec!["t".to_string()]);
    assert_eq!(tables_of("DROP TABLE t"), vec!["t".to_string()]);
  }

  #[test]
  fn schema_qualified_name_is_preserved() {
    assert_eq!(tables_of("SELECT * FROM public.users"), vec!["public.users".to_string()]);
  }
}
