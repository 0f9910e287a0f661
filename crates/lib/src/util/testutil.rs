//! Shared helpers for unit tests.

use std::path::{Path, PathBuf};

use crate::config::{EnvSnapshot, PipelineConfig, Settings};

/// Settings rooted in a scratch project: no retry delay and the archive host
/// pointed at `host` (usually a mock server).
pub fn test_settings(host: &str) -> Settings {
  let mut settings = Settings::default();
  settings.engine.host = host.to_string();
  settings.fetch.retry_delay_ms = 0;
  settings.fetch.timeout_secs = 10;
  settings
}

/// Resolve a config for a scratch project with its SDK at `<root>/sdk`.
pub fn test_config(root: &Path, settings: Settings) -> PipelineConfig {
  let env = EnvSnapshot {
    sdk_root: Some(root.join("sdk")),
    ..EnvSnapshot::default()
  };
  PipelineConfig::resolve(root, settings, env).unwrap()
}

/// Like [`test_config`], with the source tree supplied through the override
/// variable.
pub fn test_config_with_override(root: &Path, settings: Settings, override_dir: PathBuf) -> PipelineConfig {
  let env = EnvSnapshot {
    sdk_root: Some(root.join("sdk")),
    override_dir: Some(override_dir),
    ..EnvSnapshot::default()
  };
  PipelineConfig::resolve(root, settings, env).unwrap()
}

/// Write a file, creating parent directories.
pub fn write_file(path: &Path, content: &str) {
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent).unwrap();
  }
  std::fs::write(path, content).unwrap();
}

/// Write an executable shell script.
#[cfg(unix)]
pub fn write_script(path: &Path, body: &str) {
  use std::os::unix::fs::PermissionsExt;

  write_file(path, &format!("#!/bin/sh\n{}\n", body));
  let mut perms = std::fs::metadata(path).unwrap().permissions();
  perms.set_mode(0o755);
  std::fs::set_permissions(path, perms).unwrap();
}

/// Non-empty lines of a call log written by a fake tool.
pub fn read_lines(path: &Path) -> Vec<String> {
  std::fs::read_to_string(path)
    .unwrap_or_default()
    .lines()
    .filter(|l| !l.is_empty())
    .map(str::to_string)
    .collect()
}
