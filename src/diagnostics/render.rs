use serde_json::{json, Value};

use super::types::{Classification, Diagnostic, Level, PipelineResult};

fn level_str(level: Level) -> &'static str {
  match level {
    Level::Info => "info",
    Level::Warning => "warning",
    Level::Error => "error",
  }
}

fn classification_str(classification: Classification) -> &'static str {
  match classification {
    Classification::Read => "READ",
    Classification::Dml => "DML",
    Classification::Ddl => "DDL",
    Classification::Admin => "ADMIN",
    Classification::Unknown => "UNKNOWN",
  }
}

fn diagnostic_to_value(d: &Diagnostic) -> Value {
  json!({
    "level": level_str(d.level),
    "code": d.code.to_string(),
    "message": d.message,
    "notes": d.notes,
  })
}

/// Builds the JSON envelope for a [`PipelineResult`], without adapter-level
/// fields (decision/estimate/execution). Callers merge those in afterward.
pub fn render_json(result: &PipelineResult) -> Value {
  json!({
    "original_sql": result.original_sql,
    "healed_sql": result.healed_sql,
    "effective_sql": result.effective_sql(),
    "blocked": result.blocked,
    "classification": classification_str(result.classification),
    "tables": result.tables,
    "diagnostics": result.diagnostics.iter().map(diagnostic_to_value).collect::<Vec<_>>(),
  })
}

/// Renders a compiler-style text report: `level[code]: message`, followed
/// by `= note:` and `= fix:` lines for each diagnostic.
pub fn render_text(result: &PipelineResult) -> String {
  let mut out = String::new();
  for d in &result.diagnostics {
    out.push_str(&format!("{}[{}]: {}\n", level_str(d.level), d.code, d.message));
    for note in &d.notes {
      out.push_str(&format!("  = note: {note}\n"));
    }
    for suggestion in &d.suggestions {
      let verb = match suggestion.applicability {
        super::types::Applicability::MachineApplicable => "fix",
        _ => "help",
      };
      out.push_str(&format!("  = {verb}: {}\n", suggestion.message));
    }
  }
  if result.diagnostics.is_empty() {
    out.push_str("no diagnostics\n");
  }
  out.push_str(&format!(
    "classification: {}, blocked: {}, tables: {}\n",
    classification_str(result.classification),
    result.blocked,
    if result.tables.is_empty() { "(none)".to_string() } else { result.tables.join(", ") }
  ));
  out
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::diagnostics::codes;

  fn sample_result() -> PipelineResult {
    PipelineResult {
      original_sql: "SELECT * FROM users".into(),
      healed_sql: Some("SELECT * FROM users LIMIT 1000".into()),
      diagnostics: vec![Diagnostic::info(codes::LIMIT_INJECTED, "row cap applied")],
      blocked: false,
      classification: Classification::Read,
      tables: vec!["users".into()],
    }
  }

  #[test]
  fn json_envelope_carries_effective_sql() {
    let value = render_json(&sample_result());
    assert_eq!(value["effective_sql"], "SELECT * FROM users LIMIT 1000");
    assert_eq!(value["classification"], "READ");
    assert_eq!(value["diagnostics"][0]["code"], "Q0601");
  }

  #[test]
  fn text_render_includes_level_and_code() {
    let text = render_text(&sample_result());
    assert!(text.contains("info[Q0601]: row cap applied"));
    assert!(text.contains("classification: READ"));
  }

  #[test]
  fn text_render_handles_no_diagnostics() {
    let mut result = sample_result();
    result.diagnostics.clear();
    let text = render_text(&result);
    assert!(text.contains("no diagnostics"));
  }
}
