//! `schema`: browse connected schemas, tables, and columns.

use color_eyre::eyre::Result;
use serde_json::json;

use super::resolve_adapter;
use crate::cli::{FormatArg, SchemaAction, SchemaArgs};

pub async fn run_schema(args: SchemaArgs) -> Result<i32> {
  match args.action {
    SchemaAction::Ls { schema, connection, format } => run_ls(schema, connection, format).await,
    SchemaAction::Show { table_ref, connection, format } => run_show(table_ref, connection, format).await,
  }
}

async fn run_ls(schema: Option<String>, connection: String, format: FormatArg) -> Result<i32> {
  let mut adapter = resolve_adapter(&connection).await?;

  let outcome = match &schema {
    Some(schema) => adapter.list_tables(Some(schema.as_str())).await.map(|tables| {
      let names: Vec<String> = tables.into_iter().map(|t| t.name).collect();
      ls_doc_for_tables(schema, &names, format)
    }),
    None => adapter.list_schemas().await.map(|schemas| ls_doc_for_schemas(&schemas, format)),
  };
  adapter.close().await.ok();

  match outcome {
    Ok(doc) => {
      println!("{doc}");
      Ok(0)
    },
    Err(e) => {
      print_error(&e.to_string(), format);
      Ok(1)
    },
  }
}

async fn run_show(table_ref: String, connection: String, format: FormatArg) -> Result<i32> {
  let (schema, table) = match table_ref.split_once('.') {
    Some((schema, table)) => (Some(schema.to_string()), table.to_string()),
    None => (None, table_ref),
  };

  let mut adapter = resolve_adapter(&connection).await?;
  let outcome = adapter.describe_table(&table, schema.as_deref()).await;
  adapter.close().await.ok();

  match outcome {
    Ok(info) => {
      println!("{}", show_doc(&info, format));
      Ok(0)
    },
    Err(e) => {
      print_error(&e.to_string(), format);
      Ok(1)
    },
  }
}

fn ls_doc_for_schemas(schemas: &[String], format: FormatArg) -> String {
  match format {
    FormatArg::Json => json!({ "schemas": schemas }).to_string(),
    FormatArg::Text => {
      if schemas.is_empty() {
        "no schemas found".to_string()
      } else {
        schemas.join("\n")
      }
    },
  }
}

fn ls_doc_for_tables(schema: &str, tables: &[String], format: FormatArg) -> String {
  match format {
    FormatArg::Json => json!({ "schema": schema, "tables": tables }).to_string(),
    FormatArg::Text => {
      if tables.is_empty() {
        format!("no tables in `{schema}`")
      } else {
        tables.join("\n")
      }
    },
  }
}

fn show_doc(info: &crate::adapter::TableInfo, format: FormatArg) -> String {
  match format {
    FormatArg::Json => serde_json::to_string(info).unwrap_or_default(),
    FormatArg::Text => {
      let mut out = match &info.schema {
        Some(schema) => format!("{schema}.{}\n", info.name),
        None => format!("{}\n", info.name),
      };
      for column in &info.columns {
        let nullable = if column.nullable { "NULL" } else { "NOT NULL" };
        out.push_str(&format!("  {}  {}  {nullable}\n", column.name, column.type_name));
      }
      out
    },
  }
}

fn print_error(message: &str, format: FormatArg) {
  match format {
    FormatArg::Json => println!("{}", json!({ "error": message })),
    FormatArg::Text => eprintln!("error: {message}"),
  }
}
