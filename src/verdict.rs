//! Produces the single output document (JSON or text) emitted per
//! invocation, and maps a [`Decision`] to the process exit code.

use serde_json::{json, Value};

use crate::adapter::ExecutionResult;
use crate::cost::CostEstimate;
use crate::diagnostics::{self, Decision, PipelineResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
  Json,
  Text,
}

#[derive(Default)]
pub struct VerdictExtras {
  pub estimate: Option<CostEstimate>,
  pub cost_error: Option<String>,
  pub execution: Option<ExecutionResult>,
  pub dry_run: bool,
  pub adapter_error: Option<String>,
}

pub fn decide(result: &PipelineResult, extras: &VerdictExtras, allow_write_entry_point: bool) -> Decision {
  if result.blocked || extras.cost_error.is_some() || extras.adapter_error.is_some() {
    return Decision::Deny;
  }
  if !allow_write_entry_point
    && matches!(result.classification, diagnostics::Classification::Dml | diagnostics::Classification::Ddl)
  {
    return Decision::Ask;
  }
  Decision::Allow
}

pub fn exit_code(decision: Decision) -> i32 {
  match decision {
    Decision::Allow | Decision::Ask => 0,
    Decision::Deny => 1,
  }
}

pub fn render(result: &PipelineResult, extras: &VerdictExtras, decision: Decision, format: OutputFormat) -> String {
  match format {
    OutputFormat::Json => render_json_envelope(result, extras, decision).to_string(),
    OutputFormat::Text => render_text_envelope(result, extras, decision),
  }
}

fn decision_str(decision: Decision) -> &'static str {
  match decision {
    Decision::Allow => "allow",
    Decision::Ask => "ask",
    Decision::Deny => "deny",
  }
}

fn render_json_envelope(result: &PipelineResult, extras: &VerdictExtras, decision: Decision) -> Value {
  let mut envelope = diagnostics::render_json(result);
  let object = envelope.as_object_mut().expect("render_json always returns an object");
  object.insert("decision".to_string(), json!(decision_str(decision)));
  if let Some(estimate) = &extras.estimate {
    object.insert("estimate".to_string(), serde_json::to_value(estimate).unwrap_or(Value::Null));
  }
  if let Some(cost_error) = &extras.cost_error {
    object.insert("cost_error".to_string(), json!(cost_error));
  }
  if let Some(execution) = &extras.execution {
    object.insert("columns".to_string(), json!(execution.columns));
    object.insert("rows".to_string(), json!(execution.rows));
    object.insert("row_count".to_string(), json!(execution.row_count));
    object.insert("duration_ms".to_string(), json!(execution.duration_ms));
  }
  if extras.dry_run {
    object.insert("dry_run".to_string(), json!(true));
  }
  if let Some(error) = &extras.adapter_error {
    object.insert("error".to_string(), json!(error));
  }
  envelope
}

fn render_text_envelope(result: &PipelineResult, extras: &VerdictExtras, decision: Decision) -> String {
  let mut out = format!("decision: {}\n", decision_str(decision));
  out.push_str(&diagnostics::render_text(result));
  if let Some(estimate) = &extras.estimate {
    if let Some(summary) = &estimate.summary {
      out.push_str(&format!("estimate: {summary}\n"));
    }
  }
  if let Some(cost_error) = &extras.cost_error {
    out.push_str(&format!("cost_error: {cost_error}\n"));
  }
  if let Some(execution) = &extras.execution {
    out.push_str(&format!("{}\n", execution.columns.join(" | ")));
    out.push_str(&format!("{}\n", "-".repeat(execution.columns.len().max(1) * 10)));
    for row in &execution.rows {
      let rendered = execution
        .columns
        .iter()
        .map(|c| row.get(c).map(|v| v.to_string()).unwrap_or_else(|| "NULL".to_string()))
        .collect::<Vec<_>>()
        .join(" | ");
      out.push_str(&format!("{rendered}\n"));
    }
    out.push_str(&format!("({} rows)\n", execution.row_count));
  }
  if let Some(error) = &extras.adapter_error {
    out.push_str(&format!("error: {error}\n"));
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::diagnostics::Classification;

  fn result(classification: Classification, blocked: bool) -> PipelineResult {
    PipelineResult {
      original_sql: "SELECT 1".into(),
      healed_sql: None,
      diagnostics: vec![],
      blocked,
      classification,
      tables: vec![],
    }
  }

  #[test]
  fn allow_when_not_blocked_and_read() {
    let r = result(Classification::Read, false);
    assert_eq!(decide(&r, &VerdictExtras::default(), false), Decision::Allow);
  }

  #[test]
  fn ask_on_write_through_read_entry_point() {
    let r = result(Classification::Dml, false);
    assert_eq!(decide(&r, &VerdictExtras::default(), false), Decision::Ask);
  }

  #[test]
  fn allow_on_write_through_write_entry_point() {
    let r = result(Classification::Dml, false);
    assert_eq!(decide(&r, &VerdictExtras::default(), true), Decision::Allow);
  }

  #[test]
  fn deny_when_blocked() {
    let r = result(Classification::Read, true);
    assert_eq!(decide(&r, &VerdictExtras::default(), false), Decision::Deny);
  }

  #[test]
  fn exit_codes_match_decision() {
    assert_eq!(exit_code(Decision::Allow), 0);
    assert_eq!(exit_code(Decision::Ask), 0);
    assert_eq!(exit_code(Decision::Deny), 1);
  }

  /// Regression test for the `query` entry point: `run_policy` must be
  /// called with `allow_write: true` (matching `exec.rs`) so a real DML
  /// statement comes back unblocked, letting `decide` reach `Ask`
  /// instead of being pre-empted by `Q0301 WRITE_BLOCKED`.
  #[test]
  fn write_through_run_policy_with_allow_write_reaches_ask_at_read_entry_point() {
    use crate::policy::{run_policy, PolicyOptions};

    let options = PolicyOptions { allow_write: true, ..PolicyOptions::default() };
    let result = run_policy("UPDATE t SET a = 1 WHERE id = 1", &options);
    assert!(!result.blocked);
    assert_eq!(result.classification, Classification::Dml);
    assert_eq!(decide(&result, &VerdictExtras::default(), false), Decision::Ask);
  }
}
