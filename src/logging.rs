//! Logging and panic-handling setup, initialised once from `main`.
//!
//! Structured logs go to a rotating file under the project's data
//! directory; stdout is reserved for the single verdict document a
//! command prints, so nothing here ever writes there.

use std::path::PathBuf;

use color_eyre::eyre::Result;
use directories::ProjectDirs;
use tracing_error::ErrorLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const PROJECT_QUALIFIER: &str = "dev";
const PROJECT_ORG: &str = "sqlgate";
const PROJECT_NAME: &str = "sqlgate";

fn project_dirs() -> Option<ProjectDirs> {
  ProjectDirs::from(PROJECT_QUALIFIER, PROJECT_ORG, PROJECT_NAME)
}

pub fn data_dir() -> PathBuf {
  project_dirs().map(|dirs| dirs.data_local_dir().to_path_buf()).unwrap_or_else(|| PathBuf::from(".sqlgate-data"))
}

pub fn config_dir() -> PathBuf {
  project_dirs().map(|dirs| dirs.config_local_dir().to_path_buf()).unwrap_or_else(|| PathBuf::from(".sqlgate-config"))
}

const LOG_ENV: &str = "SQLGATE_LOG";
const LOG_FILE: &str = "sqlgate.log";

pub fn initialize_logging() -> Result<()> {
  let directory = data_dir().join("logs");
  std::fs::create_dir_all(&directory)?;
  let log_path = directory.join(LOG_FILE);
  let log_file = std::fs::OpenOptions::new().create(true).append(true).open(log_path)?;
  std::env::set_var(
    "RUST_LOG",
    std::env::var("RUST_LOG").unwrap_or_else(|_| format!("{}=info", env!("CARGO_PKG_NAME").replace('-', "_"))),
  );
  let env_filter = EnvFilter::try_from_env(LOG_ENV).or_else(|_| EnvFilter::try_from_default_env())?;
  let file_subscriber = tracing_subscriber::fmt::layer()
    .with_file(true)
    .with_line_number(true)
    .with_writer(std::sync::Mutex::new(log_file))
    .with_target(false)
    .with_ansi(false)
    .with_filter(env_filter);
  tracing_subscriber::registry().with(file_subscriber).with(ErrorLayer::default()).init();
  Ok(())
}

pub fn initialize_panic_handler() -> Result<()> {
  let (panic_hook, eyre_hook) = color_eyre::config::HookBuilder::default()
    .panic_section(format!("This is a bug. Consider reporting it at {}", env!("CARGO_PKG_REPOSITORY")))
    .capture_span_trace_by_default(false)
    .display_location_section(false)
    .display_env_section(false)
    .into_hooks();
  eyre_hook.install()?;
  std::panic::set_hook(Box::new(move |panic_info| {
    if cfg!(debug_assertions) {
      better_panic::Settings::auto().most_recent_first(false).lineno_suffix(true).verbosity(better_panic::Verbosity::Full).create_panic_handler()(panic_info);
    } else {
      let metadata = human_panic::Metadata::new(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
        .authors(env!("CARGO_PKG_AUTHORS").replace(':', ", "))
        .homepage(env!("CARGO_PKG_HOMEPAGE"));
      let file_path = human_panic::handle_dump(&metadata, panic_info);
      human_panic::print_msg(file_path, &metadata).ok();
      eprintln!("{}", panic_hook.panic_report(panic_info));
    }
    std::process::exit(1);
  }));
  Ok(())
}

pub fn version() -> String {
  format!(
    "{} ({})",
    env!("CARGO_PKG_VERSION"),
    option_env!("VERGEN_GIT_SHA").unwrap_or("unknown"),
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn data_dir_is_non_empty() {
    assert!(!data_dir().as_os_str().is_empty());
  }
}
