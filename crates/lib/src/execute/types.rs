//! Types for pipeline execution.
//!
//! This module defines the step identifiers, per-step outcomes and the
//! aggregate result of one pipeline run.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

use crate::steps::{self, Completion, StepError, StepOutputs};

/// A node of the pipeline graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StepId {
  Download,
  Unpack,
  InstallCMake,
  Configure,
  Compile,
  StageHeaders,
  PreBuild,
}

impl StepId {
  /// Every step in declaration order, which is also a valid execution order.
  pub const ALL: [StepId; 7] = [
    StepId::Download,
    StepId::Unpack,
    StepId::InstallCMake,
    StepId::Configure,
    StepId::Compile,
    StepId::StageHeaders,
    StepId::PreBuild,
  ];

  /// Stable name used on the command line, in logs and for step records.
  pub fn name(self) -> &'static str {
    match self {
      StepId::Download => steps::fetch::NAME,
      StepId::Unpack => steps::unpack::NAME,
      StepId::InstallCMake => steps::provision::NAME,
      StepId::Configure => steps::configure::NAME,
      StepId::Compile => steps::compile::NAME,
      StepId::StageHeaders => steps::headers::NAME,
      StepId::PreBuild => steps::prebuild::NAME,
    }
  }
}

impl fmt::Display for StepId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

impl Serialize for StepId {
  fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(self.name())
  }
}

impl FromStr for StepId {
  type Err = ExecuteError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    StepId::ALL
      .into_iter()
      .find(|id| id.name() == s)
      .ok_or_else(|| ExecuteError::UnknownStep(s.to_string()))
  }
}

/// A failed step: what went wrong and where the details are.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepFailure {
  pub diagnostic: String,
  pub log_path: Option<PathBuf>,
}

impl From<&StepError> for StepFailure {
  fn from(e: &StepError) -> Self {
    Self {
      diagnostic: e.to_string(),
      log_path: e.log_path().map(PathBuf::from),
    }
  }
}

/// Result of running one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum StepOutcome {
  Success(StepOutputs),
  SkippedUpToDate,
  Failed(StepFailure),
}

impl From<Result<Completion, StepError>> for StepOutcome {
  fn from(result: Result<Completion, StepError>) -> Self {
    match result {
      Ok(Completion::Ran(outputs)) => StepOutcome::Success(outputs),
      Ok(Completion::UpToDate) => StepOutcome::SkippedUpToDate,
      Err(e) => StepOutcome::Failed(StepFailure::from(&e)),
    }
  }
}

/// Errors that prevent the pipeline from being scheduled at all.
#[derive(Debug, Error)]
pub enum ExecuteError {
  #[error("dependency cycle detected")]
  CycleDetected,

  #[error("unknown step '{0}' (expected one of: {names})", names = step_names())]
  UnknownStep(String),

  /// The step exists but is not part of this session's graph.
  #[error("step '{0}' is not scheduled in this configuration")]
  NotScheduled(StepId),
}

fn step_names() -> String {
  StepId::ALL.iter().map(|s| s.name()).collect::<Vec<_>>().join(", ")
}

/// Outcome of a whole pipeline run.
#[derive(Debug, Default, Serialize)]
pub struct PipelineResult {
  /// Steps that ran and produced outputs.
  pub succeeded: Vec<(StepId, StepOutputs)>,

  /// Steps whose work was already done.
  pub up_to_date: Vec<StepId>,

  /// Steps that failed. Nothing is scheduled after the wave holding a failure.
  pub failed: Vec<(StepId, StepFailure)>,

  /// Steps not run because a dependency failed or was itself skipped.
  /// Maps the skipped step to the dependency that blocked it.
  pub skipped: Vec<(StepId, StepId)>,
}

impl PipelineResult {
  pub fn is_success(&self) -> bool {
    self.failed.is_empty() && self.skipped.is_empty()
  }

  pub fn total(&self) -> usize {
    self.succeeded.len() + self.up_to_date.len() + self.failed.len() + self.skipped.len()
  }

  pub fn record(&mut self, step: StepId, outcome: StepOutcome) {
    match outcome {
      StepOutcome::Success(outputs) => self.succeeded.push((step, outputs)),
      StepOutcome::SkippedUpToDate => self.up_to_date.push(step),
      StepOutcome::Failed(failure) => self.failed.push((step, failure)),
    }
  }

  /// Outcome recorded for `step`, if it was scheduled.
  pub fn outcome_of(&self, step: StepId) -> Option<StepOutcome> {
    if let Some((_, outputs)) = self.succeeded.iter().find(|(s, _)| *s == step) {
      return Some(StepOutcome::Success(outputs.clone()));
    }
    if self.up_to_date.contains(&step) {
      return Some(StepOutcome::SkippedUpToDate);
    }
    self
      .failed
      .iter()
      .find(|(s, _)| *s == step)
      .map(|(_, failure)| StepOutcome::Failed(failure.clone()))
  }
}
