//! `validate`: run the policy pipeline with no connected engine.

use color_eyre::eyre::Result;

use crate::cli::{parse_limit_flag, ValidateArgs};
use crate::config::AppConfig;
use crate::policy::{run_policy, PolicyOptions};
use crate::verdict::{self, OutputFormat, VerdictExtras};

pub fn run_validate(args: ValidateArgs) -> Result<i32> {
  let config = AppConfig::load().unwrap_or_default();
  let options = PolicyOptions {
    dialect: args.policy.dialect.map(Into::into),
    allow_write: false,
    limit: parse_limit_flag(&args.policy.limit, config.default_row_limit),
    dangerous_functions: Default::default(),
  };
  let result = run_policy(&args.policy.sql, &options);
  let decision = verdict::decide(&result, &VerdictExtras::default(), false);
  let format: OutputFormat = args.policy.format.into();
  println!("{}", verdict::render(&result, &VerdictExtras::default(), decision, format));
  Ok(verdict::exit_code(decision))
}
