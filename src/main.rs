#![allow(dead_code)]

pub mod adapter;
pub mod cli;
pub mod commands;
pub mod config;
pub mod connections;
pub mod cost;
pub mod diagnostics;
pub mod error;
pub mod logging;
pub mod parser;
pub mod policy;
pub mod querylog;
pub mod verdict;

use clap::Parser;
use cli::{Cli, Command};
use color_eyre::eyre::Result;

use crate::logging::{initialize_logging, initialize_panic_handler};

async fn tokio_main() -> Result<i32> {
  dotenvy::dotenv().ok();
  initialize_logging()?;
  initialize_panic_handler()?;

  let cli = Cli::parse();
  let exit_code = match cli.command {
    Command::Validate(args) => commands::run_validate(args)?,
    Command::Query(args) => commands::run_query(args).await?,
    Command::Exec(args) => commands::run_exec(args).await?,
    Command::Connect(args) => commands::run_connect(args)?,
    Command::Schema(args) => commands::run_schema(args).await?,
  };
  Ok(exit_code)
}

#[tokio::main]
async fn main() -> Result<()> {
  match tokio_main().await {
    Ok(exit_code) => std::process::exit(exit_code),
    Err(e) => {
      eprintln!("{} error: {e}", env!("CARGO_PKG_NAME"));
      std::process::exit(1);
    },
  }
}
