//! Error taxonomy for the three disjoint failure families.
//!
//! Pipeline diagnostics are data (see [`crate::diagnostics::Diagnostic`])
//! and never flow through `Result`. This module covers the other two
//! families: adapter failures and internal misuse.

use std::fmt;

/// Failures reported by an engine adapter: connection, driver, and
/// engine-reported errors, collapsed into one kind with a message, per
/// the "single adapter-error taxonomy" design.
#[derive(Debug)]
pub enum AdapterError {
  Connect(String),
  Query(String),
  Unsupported(String),
  Closed,
}

impl fmt::Display for AdapterError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      AdapterError::Connect(msg) => write!(f, "failed to connect: {msg}"),
      AdapterError::Query(msg) => write!(f, "query failed: {msg}"),
      AdapterError::Unsupported(msg) => write!(f, "unsupported operation: {msg}"),
      AdapterError::Closed => write!(f, "adapter is closed"),
    }
  }
}

impl std::error::Error for AdapterError {}

/// Misuse of the core API that should never occur in a correct caller
/// (e.g. requesting a dry-run after `close`). Production callers should
/// treat these as [`AdapterError::Closed`] or similar; tests may assert
/// on them directly.
#[derive(Debug)]
pub enum PipelineError {
  InvalidState(String),
}

impl fmt::Display for PipelineError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      PipelineError::InvalidState(msg) => write!(f, "invalid pipeline state: {msg}"),
    }
  }
}

impl std::error::Error for PipelineError {}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn adapter_error_display_is_human_readable() {
    assert_eq!(AdapterError::Closed.to_string(), "adapter is closed");
    assert_eq!(AdapterError::Connect("timeout".into()).to_string(), "failed to connect: timeout");
  }
}
