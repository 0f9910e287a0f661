//! The host application's own pre-build command, run once the compiled
//! artifact and the staged headers are in place.

use tracing::info;

use crate::config::PipelineConfig;
use crate::process::{Invocation, run_logged};

use super::{Completion, StepError, StepOutputs};

pub const NAME: &str = "pre-build";

/// Run `host.pre_build` from the project root. Without a configured command
/// there is nothing to do.
pub async fn run_pre_build(config: &PipelineConfig) -> Result<Completion, StepError> {
  let Some(command) = &config.pre_build else {
    info!("native pipeline complete, no host pre-build command configured");
    return Ok(Completion::UpToDate);
  };

  let (program, args) = command.split_first().ok_or(StepError::EmptyCommand)?;
  let invocation = Invocation::new(program, &config.project_root).args(args.iter().cloned());
  run_logged(&invocation).await?;

  Ok(Completion::Ran(StepOutputs::default()))
}
