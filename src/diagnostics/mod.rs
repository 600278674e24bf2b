//! Typed diagnostic records, span/fix application, and verdict rendering.

pub mod codes;
mod render;
mod types;

pub use codes::Code;
pub use render::{render_json, render_text};
pub use types::{
  apply_fixes, Applicability, Classification, Decision, Diagnostic, Level, PipelineResult, Span, SpanKind,
  SpanLabel, Suggestion, SuggestionPart,
};
