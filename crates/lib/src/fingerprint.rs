//! Input fingerprints and up-to-date records.
//!
//! A [`FingerprintSet`] hashes every file under a root that matches a list of
//! [`FilePattern`]s. Steps record the digest of their inputs and outputs in a
//! [`StepRecord`] after each successful run; on the next run the step is
//! skipped when the recorded digests still match.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

use crate::consts::RECORD_VERSION;
use crate::util::hash::{ContentHash, HashError, hash_file, hash_parts};

/// Selects files by extension or exact file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilePattern {
  /// Every regular file.
  Any,
  /// Files whose extension equals the value (without the dot).
  Extension(String),
  /// Files with exactly this name.
  FileName(String),
}

impl FilePattern {
  pub fn matches(&self, path: &Path) -> bool {
    match self {
      FilePattern::Any => true,
      FilePattern::Extension(ext) => path.extension().is_some_and(|e| e == ext.as_str()),
      FilePattern::FileName(name) => path.file_name().is_some_and(|n| n == name.as_str()),
    }
  }
}

/// Generated build files used as the change-detection surrogate for
/// "should recompilation run".
pub fn build_output_patterns() -> Vec<FilePattern> {
  vec![
    FilePattern::Extension("cmake".to_string()),
    FilePattern::Extension("marks".to_string()),
    FilePattern::FileName("compiler_depends.ts".to_string()),
    FilePattern::FileName("Makefile".to_string()),
    FilePattern::FileName("link.txt".to_string()),
  ]
}

/// Content hashes of the matching files under a root, keyed by relative path
/// with `/` separators.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FingerprintSet {
  pub files: BTreeMap<String, ContentHash>,
}

impl FingerprintSet {
  /// Collect the fingerprint of `root`.
  ///
  /// Directories named in `skip_dirs` are not descended into. A missing root
  /// yields an empty set.
  pub fn collect(root: &Path, patterns: &[FilePattern], skip_dirs: &[&str]) -> Result<Self, HashError> {
    let mut files = BTreeMap::new();

    if !root.exists() {
      return Ok(Self { files });
    }

    let walker = WalkDir::new(root).sort_by_file_name().into_iter().filter_entry(|e| {
      e.depth() == 0
        || !e.file_type().is_dir()
        || e.file_name().to_str().map(|name| !skip_dirs.contains(&name)).unwrap_or(true)
    });

    for entry in walker {
      let entry = entry.map_err(|e| HashError::Walk {
        root: root.display().to_string(),
        message: e.to_string(),
      })?;

      if !entry.file_type().is_file() || !patterns.iter().any(|p| p.matches(entry.path())) {
        continue;
      }

      let rel = relative_key(root, entry.path());
      files.insert(rel, hash_file(entry.path())?);
    }

    Ok(Self { files })
  }

  pub fn is_empty(&self) -> bool {
    self.files.is_empty()
  }

  pub fn len(&self) -> usize {
    self.files.len()
  }

  /// Combined digest over every (path, hash) pair.
  pub fn digest(&self) -> ContentHash {
    hash_parts(self.files.iter().map(|(path, hash)| (path.as_str(), hash.as_str())))
  }
}

/// Relative path of `path` under `root`, with `/` separators.
pub fn relative_key(root: &Path, path: &Path) -> String {
  let rel = path.strip_prefix(root).unwrap_or(path);
  rel
    .components()
    .map(|c| c.as_os_str().to_string_lossy())
    .collect::<Vec<_>>()
    .join("/")
}

#[derive(Debug, Error)]
pub enum RecordError {
  #[error("failed to read step record {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to write step record {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to encode step record: {0}")]
  Encode(#[from] serde_json::Error),
}

/// Digests of a step's inputs and outputs at its last successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
  pub version: u32,
  pub step: String,
  pub inputs: String,
  pub outputs: String,
}

impl StepRecord {
  pub fn new(step: &str, inputs: &ContentHash, outputs: &ContentHash) -> Self {
    Self {
      version: RECORD_VERSION,
      step: step.to_string(),
      inputs: inputs.0.clone(),
      outputs: outputs.0.clone(),
    }
  }

  /// Read a record. Missing, unreadable-as-JSON or outdated records count as
  /// absent, which forces the step to run.
  pub fn read(path: &Path) -> Result<Option<Self>, RecordError> {
    if !path.exists() {
      return Ok(None);
    }

    let content = std::fs::read_to_string(path).map_err(|source| RecordError::Read {
      path: path.to_path_buf(),
      source,
    })?;

    match serde_json::from_str::<StepRecord>(&content) {
      Ok(record) if record.version == RECORD_VERSION => Ok(Some(record)),
      Ok(record) => {
        debug!(path = %path.display(), version = record.version, "ignoring outdated step record");
        Ok(None)
      }
      Err(e) => {
        debug!(path = %path.display(), error = %e, "ignoring unreadable step record");
        Ok(None)
      }
    }
  }

  pub fn write(&self, path: &Path) -> Result<(), RecordError> {
    let write_err = |source| RecordError::Write {
      path: path.to_path_buf(),
      source,
    };

    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).map_err(write_err)?;
    }
    let content = serde_json::to_string_pretty(self)?;
    std::fs::write(path, format!("{}\n", content)).map_err(write_err)
  }
}

/// Whether a step may be skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Freshness {
  UpToDate,
  Stale(&'static str),
}

impl Freshness {
  /// Compare the current input digest, and optionally the current output
  /// digest, against the last record.
  pub fn check(record: Option<&StepRecord>, inputs: &ContentHash, outputs: Option<&ContentHash>) -> Self {
    let Some(record) = record else {
      return Freshness::Stale("no previous run");
    };

    if record.inputs != inputs.0 {
      return Freshness::Stale("inputs changed");
    }

    match outputs {
      Some(current) if record.outputs != current.0 => Freshness::Stale("outputs changed"),
      _ => Freshness::UpToDate,
    }
  }

  pub fn is_up_to_date(&self) -> bool {
    matches!(self, Freshness::UpToDate)
  }
}
