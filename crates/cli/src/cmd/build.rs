//! Build command implementation.
//!
//! Runs the pipeline and prints one line per scheduled step. Exits non-zero
//! when any step failed, pointing at the failing step's log.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use owo_colors::{OwoColorize, Stream};
use tracing::debug;

use jsforge_lib::config::PipelineConfig;
use jsforge_lib::execute::{NativeRunner, PipelineResult, StepId, StepOutcome, execute_pipeline};

use crate::output::{
  OutputFormat, format_duration, outcome_label, print_error, print_json, print_success, print_warning, symbols,
};

pub async fn cmd_build(
  config: PipelineConfig,
  step: Option<StepId>,
  jobs: Option<usize>,
  format: OutputFormat,
) -> Result<()> {
  let config = match jobs {
    Some(jobs) => config.with_jobs(jobs),
    None => config,
  };
  debug!(jobs = config.jobs, target = ?step, "starting build");

  let start = Instant::now();
  let result = execute_pipeline(Arc::new(config), Arc::new(NativeRunner), step)
    .await
    .context("Failed to schedule pipeline")?;
  let elapsed = start.elapsed();

  if format.is_json() {
    print_json(&serde_json::json!({
      "success": result.is_success(),
      "duration_ms": elapsed.as_millis() as u64,
      "result": result,
    }))?;
  } else {
    print_summary(&result, elapsed);
  }

  if let Some((failed, _)) = result.failed.first() {
    bail!("step '{}' failed", failed);
  }
  Ok(())
}

fn print_summary(result: &PipelineResult, elapsed: Duration) {
  for step in StepId::ALL {
    if let Some((_, blocker)) = result.skipped.iter().find(|(s, _)| *s == step) {
      println!(
        "  {} {} {}",
        symbols::SKIP.if_supports_color(Stream::Stdout, |s| s.dimmed()),
        step,
        format!("(skipped, blocked by {})", blocker).if_supports_color(Stream::Stdout, |s| s.dimmed())
      );
      continue;
    }

    let Some(outcome) = result.outcome_of(step) else {
      continue;
    };
    let symbol = match outcome {
      StepOutcome::Failed(_) => symbols::ERROR.if_supports_color(Stream::Stdout, |s| s.red()).to_string(),
      StepOutcome::SkippedUpToDate => symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue()).to_string(),
      StepOutcome::Success(_) => symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()).to_string(),
    };
    println!("  {} {} ({})", symbol, step, outcome_label(&outcome));
  }
  println!();

  for (step, failure) in &result.failed {
    print_error(&format!("{}: {}", step, failure.diagnostic));
    if let Some(log) = &failure.log_path {
      eprintln!("  {} see {}", symbols::ARROW, log.display());
    }
  }
  if !result.skipped.is_empty() {
    print_warning(&format!("{} step(s) skipped", result.skipped.len()));
  }

  if result.is_success() {
    print_success(&format!(
      "Build finished in {} ({} ran, {} up to date)",
      format_duration(elapsed),
      result.succeeded.len(),
      result.up_to_date.len()
    ));
  }
}
