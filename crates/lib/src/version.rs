//! The version descriptor of the engine sources to fetch.

use std::fmt;
use std::path::Path;

use serde::Serialize;
use tracing::debug;

use crate::config::ConfigError;

/// Identifies which revision of the engine to fetch (a branch, tag or commit).
///
/// Read once per session and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct VersionDescriptor(String);

impl VersionDescriptor {
  pub fn new(value: impl Into<String>) -> Self {
    Self(value.into())
  }

  /// Read the pinned version from `path`, falling back to `default` when the
  /// file is absent or blank.
  pub fn read(path: &Path, default: &str) -> Result<Self, ConfigError> {
    if !path.exists() {
      debug!(path = %path.display(), default, "no pinned version file");
      return Ok(Self::new(default));
    }

    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadVersion {
      path: path.to_path_buf(),
      source,
    })?;

    let pinned = content.trim();
    if pinned.is_empty() {
      debug!(path = %path.display(), default, "pinned version file is blank");
      return Ok(Self::new(default));
    }

    debug!(path = %path.display(), version = pinned, "using pinned version");
    Ok(Self::new(pinned))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  /// The descriptor reduced to characters safe for a file name.
  pub fn file_safe(&self) -> String {
    self
      .0
      .chars()
      .map(|c| {
        if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
          c
        } else {
          '_'
        }
      })
      .collect()
  }
}

impl fmt::Display for VersionDescriptor {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}
