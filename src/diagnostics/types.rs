use serde::Serialize;

use super::codes::Code;

/// Half-open byte interval `[start, end)` into the original SQL text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Span {
  pub start: usize,
  pub end: usize,
}

impl Span {
  pub fn new(start: usize, end: usize) -> Self {
    assert!(start <= end, "span start {start} must not exceed end {end}");
    Self { start, end }
  }

  pub fn is_empty(&self) -> bool {
    self.start == self.end
  }

  pub fn slice<'a>(&self, sql: &'a str) -> &'a str {
    &sql[self.start..self.end]
  }

  fn overlaps(&self, other: &Span) -> bool {
    self.start < other.end && other.start < self.end
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
  Info,
  Warning,
  Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanKind {
  Primary,
  Secondary,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpanLabel {
  pub span: Span,
  pub kind: SpanKind,
  pub label: Option<String>,
}

/// Whether a [`Suggestion`]'s parts may be applied without human review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Applicability {
  MachineApplicable,
  MaybeIncorrect,
  HasPlaceholders,
}

/// A single `(span, replacement)` edit within a [`Suggestion`].
#[derive(Debug, Clone, Serialize)]
pub struct SuggestionPart {
  pub span: Span,
  pub replacement: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Suggestion {
  pub message: String,
  pub parts: Vec<SuggestionPart>,
  pub applicability: Applicability,
}

impl Suggestion {
  pub fn new(message: impl Into<String>, applicability: Applicability) -> Self {
    Self { message: message.into(), parts: Vec::new(), applicability }
  }

  pub fn with_part(mut self, span: Span, replacement: impl Into<String>) -> Self {
    self.parts.push(SuggestionPart { span, replacement: replacement.into() });
    self
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
  pub level: Level,
  pub code: Code,
  pub message: String,
  pub spans: Vec<SpanLabel>,
  pub notes: Vec<String>,
  pub suggestions: Vec<Suggestion>,
}

impl Diagnostic {
  fn new(level: Level, code: Code, message: impl Into<String>) -> Self {
    Self { level, code, message: message.into(), spans: Vec::new(), notes: Vec::new(), suggestions: Vec::new() }
  }

  pub fn error(code: Code, message: impl Into<String>) -> Self {
    Self::new(Level::Error, code, message)
  }

  pub fn warning(code: Code, message: impl Into<String>) -> Self {
    Self::new(Level::Warning, code, message)
  }

  pub fn info(code: Code, message: impl Into<String>) -> Self {
    Self::new(Level::Info, code, message)
  }

  pub fn with_span(mut self, span: Span, label: Option<impl Into<String>>) -> Self {
    self.spans.push(SpanLabel { span, kind: SpanKind::Primary, label: label.map(Into::into) });
    self
  }

  pub fn with_secondary_span(mut self, span: Span, label: Option<impl Into<String>>) -> Self {
    self.spans.push(SpanLabel { span, kind: SpanKind::Secondary, label: label.map(Into::into) });
    self
  }

  pub fn with_note(mut self, note: impl Into<String>) -> Self {
    self.notes.push(note.into());
    self
  }

  pub fn with_fix(mut self, message: impl Into<String>, span: Span, replacement: impl Into<String>) -> Self {
    self.suggestions.push(Suggestion::new(message, Applicability::MachineApplicable).with_part(span, replacement));
    self
  }

  pub fn with_suggestion(mut self, suggestion: Suggestion) -> Self {
    self.suggestions.push(suggestion);
    self
  }

  pub fn is_blocking(&self) -> bool {
    self.level == Level::Error
  }

  fn machine_applicable_parts(&self) -> impl Iterator<Item = &SuggestionPart> {
    self
      .suggestions
      .iter()
      .filter(|s| s.applicability == Applicability::MachineApplicable)
      .flat_map(|s| s.parts.iter())
  }
}

/// Applies every `MachineApplicable` part across `diagnostics` to `sql`.
///
/// Parts are sorted by descending `span.start` so earlier offsets stay
/// valid while later ones are spliced. Returns `None` (no partial
/// application) if there are no applicable parts at all, or if any two
/// adjacent parts (after sorting) overlap.
pub fn apply_fixes(sql: &str, diagnostics: &[Diagnostic]) -> Option<String> {
  let mut parts: Vec<&SuggestionPart> = diagnostics.iter().flat_map(|d| d.machine_applicable_parts()).collect();
  if parts.is_empty() {
    return None;
  }
  parts.sort_by(|a, b| b.span.start.cmp(&a.span.start));
  for pair in parts.windows(2) {
    if pair[1].span.end > pair[0].span.start {
      return None;
    }
  }
  let mut result = sql.to_string();
  for part in parts {
    result.replace_range(part.span.start..part.span.end, &part.replacement);
  }
  Some(result)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Classification {
  Read,
  Dml,
  Ddl,
  Admin,
  Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
  Allow,
  Ask,
  Deny,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
  pub original_sql: String,
  pub healed_sql: Option<String>,
  pub diagnostics: Vec<Diagnostic>,
  pub blocked: bool,
  pub classification: Classification,
  pub tables: Vec<String>,
}

impl PipelineResult {
  pub fn effective_sql(&self) -> &str {
    self.healed_sql.as_deref().unwrap_or(&self.original_sql)
  }

  pub fn codes(&self) -> Vec<Code> {
    self.diagnostics.iter().map(|d| d.code).collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::diagnostics::codes;

  #[test]
  fn error_diagnostic_is_blocking() {
    let d = Diagnostic::error(codes::SYNTAX_ERROR, "bad sql");
    assert!(d.is_blocking());
    let w = Diagnostic::warning(codes::CONSTANT_CONDITION, "always true");
    assert!(!w.is_blocking());
  }

  #[test]
  fn apply_fixes_returns_none_without_parts() {
    assert_eq!(apply_fixes("select 1", &[]), None);
    let d = Diagnostic::info(codes::LIMIT_INJECTED, "limited");
    assert_eq!(apply_fixes("select 1", &[d]), None);
  }

  #[test]
  fn apply_fixes_splices_non_overlapping_parts_right_to_left() {
    let sql = "SELECT a, b FROM t";
    let d = Diagnostic::warning(codes::CONSTANT_CONDITION, "rewrite")
      .with_fix("rename a", Span::new(7, 8), "x")
      .with_fix("rename b", Span::new(10, 11), "y");
    let healed = apply_fixes(sql, std::slice::from_ref(&d)).expect("non-overlapping parts should apply");
    assert_eq!(healed, "SELECT x, y FROM t");
  }

  #[test]
  fn apply_fixes_rejects_overlapping_parts() {
    let sql = "SELECT a FROM t";
    let d = Diagnostic::warning(codes::CONSTANT_CONDITION, "rewrite")
      .with_fix("first", Span::new(7, 9), "xx")
      .with_fix("second", Span::new(8, 10), "yy");
    assert_eq!(apply_fixes(sql, &[d]), None);
  }

  #[test]
  fn apply_fixes_only_applies_machine_applicable_suggestions() {
    let sql = "SELECT a FROM t";
    let mut d = Diagnostic::warning(codes::CONSTANT_CONDITION, "rewrite");
    d.suggestions.push(
      Suggestion::new("maybe", Applicability::MaybeIncorrect).with_part(Span::new(7, 8), "z"),
    );
    assert_eq!(apply_fixes(sql, &[d]), None);
  }

  #[test]
  fn span_rejects_inverted_range() {
    let result = std::panic::catch_unwind(|| Span::new(5, 2));
    assert!(result.is_err());
  }

  #[test]
  fn pipeline_result_effective_sql_prefers_healed() {
    let result = PipelineResult {
      original_sql: "select 1".into(),
      healed_sql: Some("select 1 limit 1000".into()),
      diagnostics: vec![],
      blocked: false,
      classification: Classification::Read,
      tables: vec![],
    };
    assert_eq!(result.effective_sql(), "select 1 limit 1000");
  }
}
