//! Builds the engine's bytecode compiler target.
//!
//! The generated build files stand in for the real inputs: when none of
//! them changed since the last successful build and the artifact is still
//! the one that build produced, nothing runs.

use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::fingerprint::{Freshness, StepRecord};
use crate::process::{Invocation, run_logged};
use crate::util::hash::{ContentHash, hash_file};

use super::configure::build_fingerprint;
use super::{Completion, StepError, StepOutputs};

pub const NAME: &str = "compile";

pub fn compile_args(config: &PipelineConfig) -> Vec<String> {
  vec![
    "--build".to_string(),
    config.layout.engine_build_dir.display().to_string(),
    "--target".to_string(),
    config.engine.target.clone(),
    "-j".to_string(),
    config.jobs.to_string(),
  ]
}

fn artifact_hash(config: &PipelineConfig) -> Result<Option<ContentHash>, StepError> {
  let artifact = &config.layout.artifact_path;
  if !artifact.is_file() {
    return Ok(None);
  }
  Ok(Some(hash_file(artifact)?))
}

pub async fn compile_target(config: &PipelineConfig) -> Result<Completion, StepError> {
  let layout = &config.layout;
  let record_path = layout.record_path(NAME);

  let inputs = build_fingerprint(config)?.digest();
  let record = StepRecord::read(&record_path)?;

  match artifact_hash(config)? {
    Some(current) => match Freshness::check(record.as_ref(), &inputs, Some(&current)) {
      Freshness::UpToDate => {
        info!(artifact = %layout.artifact_path.display(), "compiled artifact up to date");
        return Ok(Completion::UpToDate);
      }
      Freshness::Stale(reason) => debug!(reason, "compiling"),
    },
    None => debug!(artifact = %layout.artifact_path.display(), "artifact missing, compiling"),
  }

  let invocation = Invocation::new(&layout.cmake_binary, &layout.source_dir)
    .args(compile_args(config))
    .stdout_to(&layout.compile_log)
    .stderr_to(&layout.compile_error_log);
  run_logged(&invocation).await?;

  let Some(produced) = artifact_hash(config)? else {
    return Err(StepError::ArtifactMissing {
      path: layout.artifact_path.clone(),
    });
  };

  // The build itself rewrites some fingerprint files (progress marks), so
  // the recorded inputs are taken after it finishes.
  let inputs = build_fingerprint(config)?.digest();
  StepRecord::new(NAME, &inputs, &produced).write(&record_path)?;

  info!(artifact = %layout.artifact_path.display(), "compiled {}", config.engine.target);
  Ok(Completion::Ran(StepOutputs::single(&layout.artifact_path)))
}
