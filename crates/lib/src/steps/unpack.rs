//! Archive extraction into the canonical source directory.
//!
//! Source tarballs wrap everything in a synthetic `<org>-<project>-<hash>/`
//! folder; it is stripped so the tree lands directly under the source
//! directory.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::fingerprint::{FilePattern, FingerprintSet, Freshness, StepRecord};
use crate::util::hash::{ContentHash, hash_file};

use super::{Completion, StepError, StepOutputs};

pub const NAME: &str = "unpack";

/// Directories never hashed as part of a source tree.
pub const SOURCE_SKIP_DIRS: &[&str] = &[".git"];

/// Map an archive entry path to its path under the source directory.
///
/// The first component is dropped when it starts with `prefix`; other entries
/// keep their path. Returns `None` for the bare top-level folder and for
/// entries that would escape the target (`..`, absolute paths).
pub fn normalize_entry_path(path: &Path, prefix: &str) -> Option<PathBuf> {
  let mut parts = Vec::new();
  for component in path.components() {
    match component {
      Component::Normal(part) => parts.push(part),
      Component::CurDir => {}
      Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
        warn!(entry = %path.display(), "skipping archive entry outside the target directory");
        return None;
      }
    }
  }

  let first = parts.first()?;
  let strip = first.to_string_lossy().starts_with(prefix);
  let normalized: PathBuf = parts.iter().skip(usize::from(strip)).collect();

  if normalized.as_os_str().is_empty() {
    None
  } else {
    Some(normalized)
  }
}

/// A symlink target that stays beside the link: relative and without `..`.
fn is_contained_link(target: &Path) -> bool {
  !target.as_os_str().is_empty()
    && target
      .components()
      .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Whether `path`, followed through any symlinks already on disk, lies
/// under the canonical `root`. The nearest existing ancestor decides.
fn resolves_within(root: &Path, path: &Path) -> bool {
  let mut existing = path;
  while existing.symlink_metadata().is_err() {
    match existing.parent() {
      Some(parent) => existing = parent,
      None => return false,
    }
  }
  dunce::canonicalize(existing).is_ok_and(|resolved| resolved.starts_with(root))
}

/// Content digest of a source tree.
pub fn source_tree_digest(root: &Path) -> Result<ContentHash, StepError> {
  Ok(FingerprintSet::collect(root, &[FilePattern::Any], SOURCE_SKIP_DIRS)?.digest())
}

/// Extract `archive` into `dest`, overwriting existing files.
///
/// Entries that would land outside `dest`, directly or through a symlink,
/// are skipped with a warning. Returns the number of entries written.
pub fn extract(archive: &Path, dest: &Path, prefix: &str) -> Result<usize, StepError> {
  let archive_err = |source| StepError::Archive {
    path: archive.to_path_buf(),
    source,
  };

  let file = File::open(archive).map_err(archive_err)?;
  let mut tar = Archive::new(GzDecoder::new(BufReader::new(file)));
  tar.set_overwrite(true);

  fs::create_dir_all(dest)?;
  let root = dunce::canonicalize(dest)?;
  let mut written = 0;

  for entry in tar.entries().map_err(archive_err)? {
    let mut entry = entry.map_err(archive_err)?;
    if entry.header().entry_type().is_pax_global_extensions() {
      continue;
    }

    let path = entry.path().map_err(archive_err)?.into_owned();
    let Some(relative) = normalize_entry_path(&path, prefix) else {
      continue;
    };

    let kind = entry.header().entry_type();
    if kind.is_hard_link() {
      warn!(entry = %path.display(), "skipping hard link archive entry");
      continue;
    }
    if kind.is_symlink() {
      let link = entry.link_name().map_err(archive_err)?;
      if !link.as_deref().is_some_and(is_contained_link) {
        warn!(entry = %path.display(), "skipping symlink pointing outside the target directory");
        continue;
      }
    }

    let target = dest.join(&relative);
    let Some(parent) = target.parent() else {
      continue;
    };
    if !resolves_within(&root, parent) || (kind.is_dir() && !resolves_within(&root, &target)) {
      warn!(entry = %path.display(), "skipping archive entry outside the target directory");
      continue;
    }
    fs::create_dir_all(parent)?;

    entry.unpack(&target).map_err(archive_err)?;
    written += 1;
  }

  debug!(archive = %archive.display(), entries = written, "extracted archive");
  Ok(written)
}

fn unpack_blocking(config: &PipelineConfig) -> Result<Completion, StepError> {
  let layout = &config.layout;
  let record_path = layout.record_path(NAME);

  let inputs = hash_file(&layout.archive_path)?;
  let record = StepRecord::read(&record_path)?;
  let current = source_tree_digest(&layout.source_dir)?;

  match Freshness::check(record.as_ref(), &inputs, Some(&current)) {
    Freshness::UpToDate => {
      info!(source = %layout.source_dir.display(), "source tree up to date");
      return Ok(Completion::UpToDate);
    }
    Freshness::Stale(reason) => debug!(reason, "unpacking archive"),
  }

  let entries = extract(&layout.archive_path, &layout.source_dir, &config.archive_prefix())?;
  let outputs = source_tree_digest(&layout.source_dir)?;
  StepRecord::new(NAME, &inputs, &outputs).write(&record_path)?;

  info!(source = %layout.source_dir.display(), entries, "unpacked source archive");
  Ok(Completion::Ran(StepOutputs::single(&layout.source_dir)))
}

/// Unpack the fetched archive into the source directory.
pub async fn unpack_archive(config: &PipelineConfig) -> Result<Completion, StepError> {
  let config = config.clone();
  tokio::task::spawn_blocking(move || unpack_blocking(&config))
    .await
    .map_err(|e| StepError::Io(std::io::Error::other(e)))?
}
