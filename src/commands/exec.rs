//! `execute-write`: run the policy pipeline with writes allowed, dry-run
//! for cost, and execute. The read/write roles are the mirror image of
//! `query`: a read reaching this entry point is rejected rather than run,
//! since reads belong on the `query` entry point.

use chrono::Utc;
use color_eyre::eyre::Result;

use super::{race_ctrl_c, resolve_adapter};
use crate::cli::{parse_limit_flag, ExecArgs};
use crate::config::AppConfig;
use crate::cost::{check_cost_threshold, deny_without_estimate, CostThresholds};
use crate::diagnostics::{Classification, Decision, PipelineResult};
use crate::policy::{run_policy, PolicyOptions};
use crate::querylog::{self, QueryLogEntry};
use crate::verdict::{self, VerdictExtras};

const READ_REJECTED_MESSAGE: &str = "read statements are rejected by the execute-write entry point; use query instead";

pub async fn run_exec(args: ExecArgs) -> Result<i32> {
  let config = AppConfig::load().unwrap_or_default();
  querylog::cleanup_old_logs(config.log_retention_days).ok();

  let mut adapter = match resolve_adapter(&args.connection).await {
    Ok(adapter) => adapter,
    Err(e) => {
      let mut extras = VerdictExtras::default();
      extras.adapter_error = Some(e.to_string());
      println!("{}", verdict::render(&empty_result(), &extras, Decision::Deny, args.policy.format.into()));
      return Ok(verdict::exit_code(Decision::Deny));
    },
  };

  let options = PolicyOptions {
    dialect: args.policy.dialect.map(Into::into).or(Some(adapter.dialect())),
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

  if !result.blocked && result.classification == Classification::Read {
    extras.adapter_error = Some(READ_REJECTED_MESSAGE.to_string());
  }

  if !result.blocked && extras.adapter_error.is_none() {
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
      Some(Err(e)) => extras.adapter_error = Some(e.to_string()),
      None => {
        adapter.close().await.ok();
        log::warn!("interrupted during dry-run against `{}`; no query-log entry written", args.connection);
        return Ok(130);
      },
    }
  }

  let pre_execute_decision = verdict::decide(&result, &extras, true);
  if pre_execute_decision == Decision::Allow {
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

  let final_decision = verdict::decide(&result, &extras, true);

  let entry = QueryLogEntry {
    timestamp: Utc::now(),
    connection: args.connection.clone(),
    dialect: adapter.dialect().to_string(),
    original_sql: result.original_sql.clone(),
    effective_sql: result.effective_sql().to_string(),
    tables: result.tables.clone(),
    blocked: result.blocked,
    codes: result.codes().iter().map(ToString::to_string).collect(),
    dry_run: false,
    cost_gb: extras.estimate.as_ref().and_then(|e| e.estimated_bytes).map(|b| b as f64 / 1_000_000_000.0),
    cost_usd: extras.estimate.as_ref().and_then(|e| e.estimated_cost_usd),
    duration_ms: extras.execution.as_ref().and_then(|e| e.duration_ms),
    labels: Default::default(),
  };
  querylog::log_query(&entry).ok();
  adapter.close().await.ok();

  log::info!("exec against `{}`: decision={final_decision:?}, tables={:?}", args.connection, result.tables);
  println!("{}", verdict::render(&result, &extras, final_decision, args.policy.format.into()));
  Ok(verdict::exit_code(final_decision))
}

fn empty_result() -> PipelineResult {
  PipelineResult {
    original_sql: String::new(),
    healed_sql: None,
    diagnostics: Vec::new(),
    blocked: true,
    classification: crate::diagnostics::Classification::Unknown,
    tables: Vec::new(),
  }
}
