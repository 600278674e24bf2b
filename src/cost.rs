//! Adapter-agnostic cost estimate and threshold gate.

use serde::Serialize;

use crate::diagnostics::{codes, Diagnostic};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CostUnit {
  Bytes,
  CostUnits,
  Partitions,
}

/// Normalised across engines; every field is optional because engines'
/// EXPLAIN surfaces disagree on what they can tell us up front.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CostEstimate {
  pub raw_value: Option<f64>,
  pub unit: Option<CostUnit>,
  pub estimated_bytes: Option<u64>,
  pub estimated_cost_usd: Option<f64>,
  pub estimated_rows: Option<u64>,
  pub plan_node: Option<String>,
  pub warnings: Vec<String>,
  pub summary: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CostThresholds {
  pub max_gb: Option<f64>,
  pub max_usd: Option<f64>,
  pub max_rows: Option<u64>,
}

impl CostThresholds {
  pub fn any_set(&self) -> bool {
    self.max_gb.is_some() || self.max_usd.is_some() || self.max_rows.is_some()
  }
}

/// Checks `estimate` against `thresholds` in the fixed bytes -> usd ->
/// rows order; the first breach wins. A threshold that names a
/// dimension absent from the estimate is a no-op for that dimension —
/// it neither breaches nor clears the gate. Call `deny_without_estimate`
/// first when `estimate` is `None` and any threshold was requested.
pub fn check_cost_threshold(estimate: &CostEstimate, thresholds: &CostThresholds) -> Option<Diagnostic> {
  if let (Some(max_gb), Some(bytes)) = (thresholds.max_gb, estimate.estimated_bytes) {
    let gb = bytes as f64 / 1_000_000_000.0;
    if gb > max_gb {
      return Some(breach(format!("estimated {gb:.2} GB exceeds the {max_gb:.2} GB threshold"), estimate));
    }
  }
  if let (Some(max_usd), Some(usd)) = (thresholds.max_usd, estimate.estimated_cost_usd) {
    if usd > max_usd {
      return Some(breach(format!("estimated ${usd:.2} exceeds the ${max_usd:.2} threshold"), estimate));
    }
  }
  if let (Some(max_rows), Some(rows)) = (thresholds.max_rows, estimate.estimated_rows) {
    if rows > max_rows {
      return Some(breach(format!("estimated {rows} rows exceeds the {max_rows} row threshold"), estimate));
    }
  }
  None
}

/// When the caller requested any cost threshold but the adapter's
/// dry-run produced no estimate at all (unsupported statement type on
/// this engine), cost cannot be evaluated and the gate denies.
pub fn deny_without_estimate(thresholds: &CostThresholds) -> Option<Diagnostic> {
  if !thresholds.any_set() {
    return None;
  }
  Some(Diagnostic::error(
    codes::COST_OVER_THRESHOLD,
    "a cost threshold was requested but this statement cannot be cost-estimated on this engine",
  ))
}

fn breach(message: String, estimate: &CostEstimate) -> Diagnostic {
  let mut diagnostic = Diagnostic::error(codes::COST_OVER_THRESHOLD, message);
  if let Some(summary) = &estimate.summary {
    diagnostic = diagnostic.with_note(summary.clone());
  }
  diagnostic
}

#[cfg(test)]
mod tests {
  use super::*;

  fn estimate(bytes: Option<u64>, usd: Option<f64>, rows: Option<u64>) -> CostEstimate {
    CostEstimate { estimated_bytes: bytes, estimated_cost_usd: usd, estimated_rows: rows, ..Default::default() }
  }

  #[test]
  fn byte_threshold_breach_wins_first() {
    let est = estimate(Some(20_000_000_000), Some(1.0), Some(1));
    let thresholds = CostThresholds { max_gb: Some(10.0), max_usd: Some(100.0), max_rows: Some(1000) };
    let diagnostic = check_cost_threshold(&est, &thresholds).expect("should breach");
    assert!(diagnostic.message.contains("GB"));
  }

  #[test]
  fn missing_dimension_is_a_no_op() {
    let est = estimate(None, None, Some(5));
    let thresholds = CostThresholds { max_gb: Some(1.0), max_usd: Some(1.0), max_rows: Some(1000) };
    assert!(check_cost_threshold(&est, &thresholds).is_none());
  }

  #[test]
  fn row_threshold_breaches_when_others_absent() {
    let est = estimate(None, None, Some(2000));
    let thresholds = CostThresholds { max_rows: Some(1000), ..Default::default() };
    assert!(check_cost_threshold(&est, &thresholds).is_some());
  }

  #[test]
  fn deny_without_estimate_only_when_thresholds_requested() {
    assert!(deny_without_estimate(&CostThresholds::default()).is_none());
    let thresholds = CostThresholds { max_gb: Some(10.0), ..Default::default() };
    assert!(deny_without_estimate(&thresholds).is_some());
  }
}
