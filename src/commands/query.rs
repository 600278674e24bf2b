//! `query`: run the policy pipeline, dry-run for cost, and execute reads.
//! Writes reaching this entry point stop at a decision of `ask`.

use chrono::Utc;
use color_eyre::eyre::Result;

use super::{race_ctrl_c, resolve_adapter};
use crate::cli::{parse_limit_flag, QueryArgs};
use crate::config::AppConfig;
use crate::cost::{check_cost_threshold, deny_without_estimate, CostThresholds};
use crate::diagnostics::Classification;
use crate::policy::{run_policy, PolicyOptions};
use crate::querylog::{self, QueryLogEntry};
use crate::verdict::{self, VerdictExtras};

pub async fn run_query(args: QueryArgs) -> Result<i32> {
  let config = AppConfig::load().unwrap_or_default();
  querylog::cleanup_old_logs(config.log_retention_days).ok();

  let mut adapter = match resolve_adapter(&args.connection).await {
    Ok(adapter) => adapter,
    Err(e) => {
      let mut extras = VerdictExtras::default();
      extras.adapter_error = Some(e.to_string());
      let decision = crate::diagnostics::Decision::Deny;
      println!("{}", verdict::render(&empty_result(), &extras, decision, args.policy.format.into()));
      return Ok(verdict::exit_code(decision));
    },
  };

  let options = PolicyOptions {
    dialect: args.policy.dialect.map(Into::into).or(Some(adapter.dialect())),
    // the core pipeline must not block writes here: a write reaching
    // `query` is meant to fall through to `verdict::decide`'s `Ask`
    // branch (entry_point=false below), not be pre-blocked as
    // WRITE_BLOCKED/DDL_BLOCKED. `exec.rs` is the mirror image: it
    // passes allow_write=true too, and enforces its own "reject reads"
    // check externally instead of relying on the core.
    allow_write: true,
    limit: parse_limit_flag(&args.policy.limit, config.default_row_limit),
    dangerous_functions: adapter.dangerous_functions(),
  };
  let result = run_policy(&args.policy.sql, &options);
  let mut extras = VerdictExtras::default();

  let thresholds = CostThresholds {
    max_gb: args.max_gb.or(config.max_gb),
    max_usd: args.max_usd.or(config.max_usd),
    max_rows: args.max_rows.or(config.max_rows),
  };

  if !result.blocked && !args.skip_dry_run {
    match race_ctrl_c(adapter.dry_run(result.effective_sql())).await {
      Some(Ok(Some(estimate))) => {
        if let Some(diagnostic) = check_cost_threshold(&estimate, &thresholds) {
          extras.cost_error = Some(diagnostic.message.clone());
        }
        extras.estimate = Some(estimate);
      },
      Some(Ok(None)) => {
        if let Some(diagnostic) = deny_without_estimate(&thresholds) {
          extras.cost_error = Some(diagnostic.message.clone());
        }
      },
      Some(Err(e)) => {
        extras.adapter_error = Some(e.to_string());
      },
      None => {
        adapter.close().await.ok();
        log::warn!("interrupted during dry-run against `{}`; no query-log entry written", args.connection);
        return Ok(130);
      },
    }
  }

  let pre_execute_decision = verdict::decide(&result, &extras, false);

  if args.dry_run_only {
    extras.dry_run = true;
  } else if pre_execute_decision == crate::diagnostics::Decision::Allow
    && result.classification == Classification::Read
  {
    match race_ctrl_c(adapter.execute(result.effective_sql(), &Default::default())).await {
      Some(Ok(execution)) => extras.execution = Some(execution),
      Some(Err(e)) => extras.adapter_error = Some(e.to_string()),
      None => {
        adapter.close().await.ok();
        log::warn!("interrupted during execution against `{}`; no query-log entry written", args.connection);
        return Ok(130);
      },
    }
  }

  let final_decision = verdict::decide(&result, &extras, false);

  let entry = QueryLogEntry {
    timestamp: Utc::now(),
    connection: args.connection.clone(),
    dialect: adapter.dialect().to_string(),
    original_sql: result.original_sql.clone(),
    effective_sql: result.effective_sql().to_string(),
    tables: result.tables.clone(),
    blocked: result.blocked,
    codes: result.codes().iter().map(ToString::to_string).collect(),
    dry_run: args.dry_run_only,
    cost_gb: extras.estimate.as_ref().and_then(|e| e.estimated_bytes).map(|b| b as f64 / 1_000_000_000.0),
    cost_usd: extras.estimate.as_ref().and_then(|e| e.estimated_cost_usd),
    duration_ms: extras.execution.as_ref().and_then(|e| e.duration_ms),
    labels: Default::default(),
  };
  querylog::log_query(&entry).ok();
  adapter.close().await.ok();

  log::info!("query against `{}`: decision={final_decision:?}, tables={:?}", args.connection, result.tables);
  println!("{}", verdict::render(&result, &extras, final_decision, args.policy.format.into()));
  Ok(verdict::exit_code(final_decision))
}

fn empty_result() -> crate::diagnostics::PipelineResult {
  crate::diagnostics::PipelineResult {
    original_sql: String::new(),
    healed_sql: None,
    diagnostics: Vec::new(),
    blocked: true,
    classification: Classification::Unknown,
    tables: Vec::new(),
  }
}
