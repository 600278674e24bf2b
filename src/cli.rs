use clap::{Parser, Subcommand, ValueEnum};

use crate::logging::version;

#[derive(Parser, Debug)]
#[command(author, version = version(), about = "a governed SQL gateway")]
pub struct Cli {
  #[command(subcommand)]
  pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Run the policy pipeline over a SQL string with no connected engine.
  Validate(ValidateArgs),
  /// Run the policy pipeline, then dry-run and optionally execute a read.
  Query(QueryArgs),
  /// Run the policy pipeline allowing writes, then execute.
  Exec(ExecArgs),
  /// Manage the named-connection registry.
  Connect(ConnectArgs),
  /// Browse connected schemas, tables, and columns.
  Schema(SchemaArgs),
}

#[derive(clap::Args, Debug)]
pub struct PolicyArgs {
  /// The SQL statement to evaluate.
  pub sql: String,

  #[arg(long, value_enum)]
  pub dialect: Option<DialectArg>,

  /// Row cap for unbounded reads; pass `none` to disable enrichment.
  #[arg(long)]
  pub limit: Option<String>,

  #[arg(long, value_enum, default_value = "json")]
  pub format: FormatArg,
}

#[derive(clap::Args, Debug)]
pub struct ValidateArgs {
  #[command(flatten)]
  pub policy: PolicyArgs,
}

#[derive(clap::Args, Debug)]
pub struct QueryArgs {
  #[command(flatten)]
  pub policy: PolicyArgs,

  /// Registry name, or `type:k=v,...`.
  #[arg(long)]
  pub connection: String,

  #[arg(long)]
  pub dry_run_only: bool,

  #[arg(long)]
  pub skip_dry_run: bool,

  #[arg(long)]
  pub max_gb: Option<f64>,

  #[arg(long)]
  pub max_usd: Option<f64>,

  #[arg(long)]
  pub max_rows: Option<u64>,
}

#[derive(clap::Args, Debug)]
pub struct ExecArgs {
  #[command(flatten)]
  pub policy: PolicyArgs,

  #[arg(long)]
  pub connection: String,

  #[arg(long)]
  pub max_gb: Option<f64>,

  #[arg(long)]
  pub max_usd: Option<f64>,

  #[arg(long)]
  pub max_rows: Option<u64>,
}

#[derive(clap::Args, Debug)]
pub struct ConnectArgs {
  #[command(subcommand)]
  pub action: ConnectAction,
}

#[derive(Subcommand, Debug)]
pub enum ConnectAction {
  List,
  Add { name: String, db_type: String, url: String },
  Remove { name: String },
}

#[derive(clap::Args, Debug)]
pub struct SchemaArgs {
  #[command(subcommand)]
  pub action: SchemaAction,
}

#[derive(Subcommand, Debug)]
pub enum SchemaAction {
  /// List schemas, or the tables within one schema.
  Ls {
    /// Schema to list tables within; omit to list schemas instead.
    schema: Option<String>,

    /// Registry name, or `type:k=v,...`.
    #[arg(long)]
    connection: String,

    #[arg(long, value_enum, default_value = "json")]
    format: FormatArg,
  },
  /// Show a table's columns. `table_ref` is `schema.table` or `table`.
  Show {
    table_ref: String,

    /// Registry name, or `type:k=v,...`.
    #[arg(long)]
    connection: String,

    #[arg(long, value_enum, default_value = "json")]
    format: FormatArg,
  },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum DialectArg {
  Postgres,
  Mysql,
  Sqlite,
  Generic,
}

impl From<DialectArg> for crate::parser::SqlDialect {
  fn from(value: DialectArg) -> Self {
    match value {
      DialectArg::Postgres => crate::parser::SqlDialect::Postgres,
      DialectArg::Mysql => crate::parser::SqlDialect::MySql,
      DialectArg::Sqlite => crate::parser::SqlDialect::Sqlite,
      DialectArg::Generic => crate::parser::SqlDialect::Generic,
    }
  }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormatArg {
  Json,
  Text,
}

impl From<FormatArg> for crate::verdict::OutputFormat {
  fn from(value: FormatArg) -> Self {
    match value {
      FormatArg::Json => crate::verdict::OutputFormat::Json,
      FormatArg::Text => crate::verdict::OutputFormat::Text,
    }
  }
}

/// Parses the `--limit` flag: absent means "use the configured
/// default", `none` disables enrichment, anything else is a row count.
pub fn parse_limit_flag(raw: &Option<String>, default_limit: u64) -> Option<u64> {
  match raw.as_deref() {
    None => Some(default_limit),
    Some("none") => None,
    Some(n) => n.parse().ok().or(Some(default_limit)),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn limit_flag_defaults_when_absent() {
    assert_eq!(parse_limit_flag(&None, 1000), Some(1000));
  }

  #[test]
  fn limit_flag_none_disables_enrichment() {
    assert_eq!(parse_limit_flag(&Some("none".to_string()), 1000), None);
  }

  #[test]
  fn limit_flag_parses_explicit_number() {
    assert_eq!(parse_limit_flag(&Some("50".to_string()), 1000), Some(50));
  }
}
