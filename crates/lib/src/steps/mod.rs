//! Pipeline step bodies.
//!
//! Each step is a single-shot operation over the filesystem: it either finds
//! its work already done ([`Completion::UpToDate`]), does it
//! ([`Completion::Ran`]), or fails with a [`StepError`].

pub mod compile;
pub mod configure;
pub mod fetch;
pub mod headers;
pub mod prebuild;
pub mod provision;
pub mod unpack;

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::fingerprint::RecordError;
use crate::util::hash::HashError;

/// Files or directories a step produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StepOutputs {
  pub paths: Vec<PathBuf>,
}

impl StepOutputs {
  pub fn single(path: impl Into<PathBuf>) -> Self {
    Self {
      paths: vec![path.into()],
    }
  }
}

/// How a step finished when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
  Ran(StepOutputs),
  UpToDate,
}

#[derive(Debug, Error)]
pub enum StepError {
  /// Transient failures persisted through every retry.
  #[error("failed to fetch {url} after {attempts} attempt(s): {message}")]
  FetchFailed { url: String, attempts: u32, message: String },

  #[error("fetching {url} returned HTTP {status}")]
  HttpStatus { url: String, status: u16 },

  #[error("could not find the sdkmanager executable (looked for {})", display_paths(.candidates))]
  InstallerNotFound { candidates: Vec<PathBuf> },

  #[error("toolchain binary not found at {path}")]
  ToolchainMissing { path: PathBuf },

  #[error("{program} exited with {}", exit_code(.code))]
  ProcessFailed {
    program: String,
    code: Option<i32>,
    log: Option<PathBuf>,
  },

  #[error("failed to start {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },

  #[error("build finished but {path} was not produced")]
  ArtifactMissing { path: PathBuf },

  #[error("failed to extract archive {path}: {source}")]
  Archive {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("host pre-build command is empty")]
  EmptyCommand,

  #[error(transparent)]
  Hash(#[from] HashError),

  #[error(transparent)]
  Record(#[from] RecordError),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

impl StepError {
  /// Log file holding the diagnostic detail, if the failing step wrote one.
  pub fn log_path(&self) -> Option<&Path> {
    match self {
      StepError::ProcessFailed { log, .. } => log.as_deref(),
      _ => None,
    }
  }
}

fn display_paths(paths: &[PathBuf]) -> String {
  paths.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", ")
}

fn exit_code(code: &Option<i32>) -> String {
  match code {
    Some(code) => format!("exit code {}", code),
    None => "no exit code (terminated by signal)".to_string(),
  }
}
