//! Thin wrapper over `sqlparser`, isolating the rest of the system from
//! parser-library vocabulary.

use sqlparser::ast::Statement;
use sqlparser::dialect::{Dialect, GenericDialect, MySqlDialect, PostgreSqlDialect, SQLiteDialect};
use sqlparser::parser::{Parser, ParserError};
use strum::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum SqlDialect {
  Postgres,
  MySql,
  Sqlite,
  Generic,
}

impl SqlDialect {
  fn as_dialect(self) -> Box<dyn Dialect> {
    match self {
      SqlDialect::Postgres => Box::new(PostgreSqlDialect {}),
      SqlDialect::MySql => Box::new(MySqlDialect {}),
      SqlDialect::Sqlite => Box::new(SQLiteDialect {}),
      SqlDialect::Generic => Box::new(GenericDialect {}),
    }
  }

  /// All concrete dialects tried in order when none is specified, generic last.
  fn candidates() -> [SqlDialect; 4] {
    [SqlDialect::Postgres, SqlDialect::MySql, SqlDialect::Sqlite, SqlDialect::Generic]
  }
}

#[derive(Debug)]
pub enum ParseError {
  /// More than one non-empty statement was found where exactly one is required.
  MoreThanOneStatement,
  /// The input contained no statement at all.
  EmptyQuery,
  SqlParserError(ParserError),
}

impl std::fmt::Display for ParseError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      ParseError::MoreThanOneStatement => write!(f, "only one statement allowed per call"),
      ParseError::EmptyQuery => write!(f, "parsed query is empty"),
      ParseError::SqlParserError(e) => write!(f, "{e}"),
    }
  }
}

impl std::error::Error for ParseError {}

/// Parses every (non-empty) statement in `sql`, used only to count
/// statements for the multiple-statements safety check. Trailing
/// semicolons never produce an extra empty statement.
pub fn parse_many(sql: &str, dialect: Option<SqlDialect>) -> Result<Vec<Statement>, ParseError> {
  let statements = match dialect {
    Some(d) => Parser::parse_sql(&*d.as_dialect(), sql).map_err(ParseError::SqlParserError)?,
    None => parse_with_autodetect(sql)?,
  };
  Ok(statements)
}

/// Parses exactly one statement. Fails if the input holds zero or more
/// than one statement.
pub fn parse_one(sql: &str, dialect: Option<SqlDialect>) -> Result<Statement, ParseError> {
  let mut statements = parse_many(sql, dialect)?;
  match statements.len() {
    0 => Err(ParseError::EmptyQuery),
    1 => Ok(statements.remove(0)),
    _ => Err(ParseError::MoreThanOneStatement),
  }
}

fn parse_with_autodetect(sql: &str) -> Result<Vec<Statement>, ParseError> {
  let mut last_err = None;
  for candidate in SqlDialect::candidates() {
    match Parser::parse_sql(&*candidate.as_dialect(), sql) {
      Ok(statements) => return Ok(statements),
      Err(e) => last_err = Some(e),
    }
  }
  Err(ParseError::SqlParserError(last_err.expect("candidates is non-empty")))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parse_one_accepts_single_statement() {
    let stmt = parse_one("SELECT 1", Some(SqlDialect::Generic));
    assert!(stmt.is_ok());
  }

  #[test]
  fn parse_one_rejects_multiple_statements() {
    let err = parse_one("SELECT 1; SELECT 2", Some(SqlDialect::Generic)).unwrap_err();
    assert!(matches!(err, ParseError::MoreThanOneStatement));
  }

  #[test]
  fn trailing_semicolon_is_not_multiple_statements() {
    let stmt = parse_one("SELECT 1;", Some(SqlDialect::Generic));
    assert!(stmt.is_ok());
  }

  #[test]
  fn parse_many_counts_statements() {
    let statements = parse_many("SELECT 1; SELECT 2", Some(SqlDialect::Generic)).unwrap();
    assert_eq!(statements.len(), 2);
  }

  #[test]
  fn malformed_input_is_a_parse_error_not_a_panic() {
    let err = parse_one("SELECT * FROM 'unterminated", Some(SqlDialect::Generic));
    assert!(err.is_err());
  }

  #[test]
  fn autodetect_falls_back_across_dialects() {
    let stmt = parse_one("SELECT 1", None);
    assert!(stmt.is_ok());
  }
}
