//! Pipeline execution.
//!
//! This module runs the pipeline graph. It handles:
//! - computing execution waves from the static graph
//! - running the steps of a wave concurrently, bounded by a semaphore
//! - stopping after a failure and recording which steps were skipped

pub mod dag;
pub mod types;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::PipelineConfig;
use crate::steps;

pub use dag::PipelineGraph;
pub use types::{ExecuteError, PipelineResult, StepFailure, StepId, StepOutcome};

/// Runs the body of one step. The seam between scheduling and the steps.
#[async_trait]
pub trait StepRunner: Send + Sync {
  async fn run(&self, step: StepId, config: &PipelineConfig) -> StepOutcome;
}

/// Runs the real pipeline steps.
pub struct NativeRunner;

#[async_trait]
impl StepRunner for NativeRunner {
  async fn run(&self, step: StepId, config: &PipelineConfig) -> StepOutcome {
    let result = match step {
      StepId::Download => steps::fetch::fetch_archive(config).await,
      StepId::Unpack => steps::unpack::unpack_archive(config).await,
      StepId::InstallCMake => steps::provision::install_cmake(config).await,
      StepId::Configure => steps::configure::configure_build(config).await,
      StepId::Compile => steps::compile::compile_target(config).await,
      StepId::StageHeaders => steps::headers::stage_headers(config).await,
      StepId::PreBuild => steps::prebuild::run_pre_build(config).await,
    };

    if let Err(e) = &result {
      error!(step = %step, error = %e, "step failed");
    }
    result.into()
  }
}

/// Run the pipeline, or only what `target` needs when given.
///
/// Waves run in order and the steps of a wave run concurrently. When a step
/// fails, the rest of its wave still finishes, then every later step is
/// recorded as skipped together with the step that blocked it.
pub async fn execute_pipeline(
  config: Arc<PipelineConfig>,
  runner: Arc<dyn StepRunner>,
  target: Option<StepId>,
) -> Result<PipelineResult, ExecuteError> {
  let full = PipelineGraph::from_config(&config);
  let graph = match target {
    Some(step) => full.closure(step)?,
    None => full,
  };
  let waves = graph.waves()?;

  info!(steps = graph.len(), waves = waves.len(), "starting pipeline");

  let semaphore = Arc::new(Semaphore::new(config.parallelism.max(1)));
  let mut result = PipelineResult::default();
  let mut blocked: HashSet<StepId> = HashSet::new();
  let mut first_failure: Option<StepId> = None;

  for (wave_idx, wave) in waves.iter().enumerate() {
    let mut ready = Vec::new();

    for &step in wave {
      let blocker = graph
        .dependencies(step)
        .into_iter()
        .find(|dep| blocked.contains(dep))
        .or(first_failure);

      match blocker {
        Some(dep) => {
          warn!(step = %step, blocked_by = %dep, "skipping step");
          result.skipped.push((step, dep));
          blocked.insert(step);
        }
        None => ready.push(step),
      }
    }

    if ready.is_empty() {
      continue;
    }

    debug!(wave = wave_idx, steps = ?ready, "executing wave");

    for (step, outcome) in run_wave(&ready, &config, &runner, &semaphore).await {
      match &outcome {
        StepOutcome::Success(_) => info!(step = %step, "step succeeded"),
        StepOutcome::SkippedUpToDate => info!(step = %step, "step up to date"),
        StepOutcome::Failed(failure) => {
          blocked.insert(step);
          first_failure.get_or_insert(step);
          if let Some(log) = &failure.log_path {
            error!(step = %step, log = %log.display(), "see log for details");
          }
        }
      }
      result.record(step, outcome);
    }
  }

  info!(
    succeeded = result.succeeded.len(),
    up_to_date = result.up_to_date.len(),
    failed = result.failed.len(),
    skipped = result.skipped.len(),
    "pipeline complete"
  );

  Ok(result)
}

/// Run the steps of one wave in parallel. Results are sorted by step.
async fn run_wave(
  ready: &[StepId],
  config: &Arc<PipelineConfig>,
  runner: &Arc<dyn StepRunner>,
  semaphore: &Arc<Semaphore>,
) -> Vec<(StepId, StepOutcome)> {
  let mut join_set = JoinSet::new();
  let mut task_steps = HashMap::new();

  for &step in ready {
    let config = Arc::clone(config);
    let runner = Arc::clone(runner);
    let semaphore = Arc::clone(semaphore);

    let handle = join_set.spawn(async move {
      // The semaphore is never closed, so acquiring only waits.
      let _permit = semaphore.acquire().await.ok();
      debug!(step = %step, "running step");
      (step, runner.run(step, &config).await)
    });
    task_steps.insert(handle.id(), step);
  }

  let mut outcomes = Vec::new();
  while let Some(joined) = join_set.join_next().await {
    match joined {
      Ok(done) => outcomes.push(done),
      Err(e) => {
        error!(error = %e, "step task panicked");
        if let Some(&step) = task_steps.get(&e.id()) {
          outcomes.push((
            step,
            StepOutcome::Failed(StepFailure {
              diagnostic: format!("step task panicked: {}", e),
              log_path: None,
            }),
          ));
        }
      }
    }
  }

  outcomes.sort_by_key(|(step, _)| *step);
  outcomes
}
