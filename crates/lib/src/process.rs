//! External process invocation with output captured to log files.
//!
//! Every external tool the pipeline runs goes through [`run_logged`]: the
//! console stays quiet and diagnostics live in the log files named by the
//! [`Invocation`].

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info};

use crate::steps::StepError;

/// One external process run.
#[derive(Debug, Clone)]
pub struct Invocation {
  pub program: PathBuf,
  pub args: Vec<String>,
  pub cwd: PathBuf,
  /// Where stdout goes. `None` inherits the console.
  pub stdout_log: Option<PathBuf>,
  /// Where stderr goes. `None` inherits the console.
  pub stderr_log: Option<PathBuf>,
}

impl Invocation {
  pub fn new(program: impl Into<PathBuf>, cwd: impl Into<PathBuf>) -> Self {
    Self {
      program: program.into(),
      args: Vec::new(),
      cwd: cwd.into(),
      stdout_log: None,
      stderr_log: None,
    }
  }

  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.args.extend(args.into_iter().map(Into::into));
    self
  }

  pub fn stdout_to(mut self, path: impl Into<PathBuf>) -> Self {
    self.stdout_log = Some(path.into());
    self
  }

  pub fn stderr_to(mut self, path: impl Into<PathBuf>) -> Self {
    self.stderr_log = Some(path.into());
    self
  }

  /// The log a failure should point at: stderr's log when captured,
  /// otherwise stdout's.
  pub fn diagnostic_log(&self) -> Option<&Path> {
    self.stderr_log.as_deref().or(self.stdout_log.as_deref())
  }

  /// Program and arguments as actually spawned. On Windows, scripts such as
  /// `sdkmanager.bat` only run through `cmd /c`.
  pub fn command_line(&self) -> (PathBuf, Vec<String>) {
    windows_aware(&self.program, &self.args, cfg!(windows))
  }
}

fn windows_aware(program: &Path, args: &[String], windows: bool) -> (PathBuf, Vec<String>) {
  if windows {
    let mut wrapped = vec!["/c".to_string(), program.display().to_string()];
    wrapped.extend(args.iter().cloned());
    (PathBuf::from("cmd"), wrapped)
  } else {
    (program.to_path_buf(), args.to_vec())
  }
}

fn open_log(path: &Path) -> Result<File, StepError> {
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent)?;
  }
  Ok(File::create(path)?)
}

/// Run an invocation to completion. Log files are truncated first.
///
/// A non-zero exit is [`StepError::ProcessFailed`] carrying the log to read.
pub async fn run_logged(invocation: &Invocation) -> Result<(), StepError> {
  let (program, args) = invocation.command_line();
  let program_name = invocation.program.display().to_string();

  info!(program = %program_name, cwd = %invocation.cwd.display(), "running");
  debug!(args = ?args, "command line");

  let mut command = Command::new(&program);
  command.args(&args).current_dir(&invocation.cwd).stdin(Stdio::null());

  if let Some(path) = &invocation.stdout_log {
    command.stdout(Stdio::from(open_log(path)?));
  }
  if let Some(path) = &invocation.stderr_log {
    command.stderr(Stdio::from(open_log(path)?));
  }

  let status = command
    .status()
    .await
    .map_err(|source| StepError::Spawn {
      program: program_name.clone(),
      source,
    })?;

  if !status.success() {
    return Err(StepError::ProcessFailed {
      program: program_name,
      code: status.code(),
      log: invocation.diagnostic_log().map(Path::to_path_buf),
    });
  }

  debug!(program = %program_name, "process finished");
  Ok(())
}
