//! CMake configure step: generates native build scripts for the engine.

use std::path::PathBuf;

use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::fingerprint::{FingerprintSet, Freshness, StepRecord, build_output_patterns};
use crate::process::{Invocation, run_logged};
use crate::util::hash::{ContentHash, hash_parts};

use super::unpack::source_tree_digest;
use super::{Completion, StepError, StepOutputs};

pub const NAME: &str = "configure";

/// Arguments of the configure invocation.
pub fn configure_args(config: &PipelineConfig) -> Vec<String> {
  let layout = &config.layout;
  let mut args = vec!["--log-level=ERROR".to_string(), "-Wno-dev".to_string()];

  if cfg!(windows) {
    args.push("-GNMake Makefiles".to_string());
  }

  args.extend([
    "-S".to_string(),
    ".".to_string(),
    "-B".to_string(),
    layout.engine_build_dir.display().to_string(),
    format!("-DJSI_DIR={}", absolute_interface_dir(config).display()),
  ]);
  args.extend(config.engine.configure_args.iter().cloned());
  args
}

fn absolute_interface_dir(config: &PipelineConfig) -> PathBuf {
  dunce::canonicalize(&config.layout.interface_dir).unwrap_or_else(|_| config.layout.interface_dir.clone())
}

/// Digest of everything that decides what configure generates: the source
/// tree, the toolchain and the argument list.
fn input_digest(config: &PipelineConfig, args: &[String]) -> Result<ContentHash, StepError> {
  let source = source_tree_digest(&config.layout.source_dir)?;
  let cmake = config.layout.cmake_binary.display().to_string();

  let mut parts = vec![("source", source.as_str()), ("cmake", cmake.as_str())];
  parts.extend(args.iter().map(|arg| ("arg", arg.as_str())));
  Ok(hash_parts(parts))
}

/// Generated build files; empty before the first configure.
pub fn build_fingerprint(config: &PipelineConfig) -> Result<FingerprintSet, StepError> {
  Ok(FingerprintSet::collect(
    &config.layout.engine_build_dir,
    &build_output_patterns(),
    &[],
  )?)
}

/// Run the configure step unless the source tree and arguments are unchanged
/// since the last successful run.
pub async fn configure_build(config: &PipelineConfig) -> Result<Completion, StepError> {
  let layout = &config.layout;
  let record_path = layout.record_path(NAME);
  let args = configure_args(config);

  let inputs = input_digest(config, &args)?;
  let record = StepRecord::read(&record_path)?;
  let generated = build_fingerprint(config)?;

  match Freshness::check(record.as_ref(), &inputs, None) {
    Freshness::UpToDate if !generated.is_empty() => {
      info!(build_dir = %layout.engine_build_dir.display(), "build scripts up to date");
      return Ok(Completion::UpToDate);
    }
    Freshness::UpToDate => debug!("build scripts missing, reconfiguring"),
    Freshness::Stale(reason) => debug!(reason, "configuring"),
  }

  let invocation = Invocation::new(&layout.cmake_binary, &layout.source_dir)
    .args(args)
    .stdout_to(&layout.configure_log);
  run_logged(&invocation).await?;

  let generated = build_fingerprint(config)?;
  StepRecord::new(NAME, &inputs, &generated.digest()).write(&record_path)?;

  info!(
    build_dir = %layout.engine_build_dir.display(),
    files = generated.len(),
    "configured native build"
  );
  Ok(Completion::Ran(StepOutputs::single(&layout.engine_build_dir)))
}
