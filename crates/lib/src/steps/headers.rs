//! Stages public engine headers for native packaging.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::config::PipelineConfig;
use crate::fingerprint::{FilePattern, FingerprintSet, Freshness, StepRecord, relative_key};
use crate::util::hash::{ContentHash, HashError, hash_file, hash_parts};

use super::{Completion, StepError, StepOutputs};

pub const NAME: &str = "stage-headers";

/// Header roots under the source tree.
pub const HEADER_ROOTS: [&str; 2] = ["API", "public"];

/// Subdirectory of each root that the host application ships itself.
pub const EXCLUDED_DIR: &str = "jsi";

/// A header to stage: its path relative to the staging dir and its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderFile {
  pub relative: String,
  pub source: PathBuf,
}

/// Every `*.h` under the header roots, minus the excluded subdirectory.
/// Later roots win when two roots provide the same relative path.
pub fn select_headers(source_dir: &Path) -> Result<Vec<HeaderFile>, StepError> {
  let header = FilePattern::Extension("h".to_string());
  let mut selected = Vec::new();

  for root in HEADER_ROOTS.iter().map(|r| source_dir.join(r)) {
    if !root.is_dir() {
      debug!(root = %root.display(), "header root missing");
      continue;
    }

    let walker = WalkDir::new(&root)
      .sort_by_file_name()
      .into_iter()
      .filter_entry(|e| !(e.depth() == 1 && e.file_type().is_dir() && e.file_name() == EXCLUDED_DIR));

    for entry in walker {
      let entry = entry.map_err(|e| HashError::Walk {
        root: root.display().to_string(),
        message: e.to_string(),
      })?;
      if entry.file_type().is_file() && header.matches(entry.path()) {
        selected.push(HeaderFile {
          relative: relative_key(&root, entry.path()),
          source: entry.into_path(),
        });
      }
    }
  }

  Ok(selected)
}

fn input_digest(config: &PipelineConfig, headers: &[HeaderFile]) -> Result<ContentHash, StepError> {
  let artifact = if config.layout.artifact_path.is_file() {
    hash_file(&config.layout.artifact_path)?.0
  } else {
    "absent".to_string()
  };

  let hashes = headers
    .iter()
    .map(|h| hash_file(&h.source).map(|hash| (h.relative.as_str(), hash.0)))
    .collect::<Result<Vec<_>, _>>()?;

  let mut parts = vec![("artifact", artifact.as_str())];
  parts.extend(hashes.iter().map(|(rel, hash)| (*rel, hash.as_str())));
  Ok(hash_parts(parts))
}

fn staged_digest(dir: &Path) -> Result<ContentHash, StepError> {
  Ok(FingerprintSet::collect(dir, &[FilePattern::Any], &[])?.digest())
}

/// Copy the selected headers into the staging directory.
pub fn copy_headers(headers: &[HeaderFile], dest: &Path) -> Result<(), StepError> {
  fs::create_dir_all(dest)?;
  for header in headers {
    let target = dest.join(&header.relative);
    if let Some(parent) = target.parent() {
      fs::create_dir_all(parent)?;
    }
    fs::copy(&header.source, &target)?;
  }
  Ok(())
}

pub async fn stage_headers(config: &PipelineConfig) -> Result<Completion, StepError> {
  let layout = &config.layout;
  let record_path = layout.record_path(NAME);

  let headers = select_headers(&layout.source_dir)?;
  let inputs = input_digest(config, &headers)?;
  let record = StepRecord::read(&record_path)?;

  if Freshness::check(record.as_ref(), &inputs, Some(&staged_digest(&layout.headers_dir)?)).is_up_to_date() {
    info!(dir = %layout.headers_dir.display(), "staged headers up to date");
    return Ok(Completion::UpToDate);
  }

  copy_headers(&headers, &layout.headers_dir)?;
  StepRecord::new(NAME, &inputs, &staged_digest(&layout.headers_dir)?).write(&record_path)?;

  info!(dir = %layout.headers_dir.display(), count = headers.len(), "staged headers");
  Ok(Completion::Ran(StepOutputs::single(&layout.headers_dir)))
}
