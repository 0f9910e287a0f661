//! Content hashing for fingerprints and step records.
//!
//! All digests are full 64-character lowercase SHA-256 hex strings.

use std::fs;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A full SHA-256 digest of some content.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl ContentHash {
  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl std::fmt::Display for ContentHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

#[derive(Debug, thiserror::Error)]
pub enum HashError {
  #[error("failed to walk {root}: {message}")]
  Walk { root: String, message: String },

  #[error("failed to read file {path}: {source}")]
  ReadFile {
    path: String,
    #[source]
    source: std::io::Error,
  },
}

/// Hash a file's contents, streaming it in fixed-size blocks.
pub fn hash_file(path: &Path) -> Result<ContentHash, HashError> {
  let read_err = |source| HashError::ReadFile {
    path: path.display().to_string(),
    source,
  };

  let mut file = fs::File::open(path).map_err(read_err)?;
  let mut hasher = Sha256::new();
  let mut buffer = [0u8; 8192];

  loop {
    let bytes_read = file.read(&mut buffer).map_err(read_err)?;
    if bytes_read == 0 {
      break;
    }
    hasher.update(&buffer[..bytes_read]);
  }

  Ok(ContentHash(hex::encode(hasher.finalize())))
}

#[cfg(test)]
fn hash_bytes(data: &[u8]) -> ContentHash {
  let mut hasher = Sha256::new();
  hasher.update(data);
  ContentHash(hex::encode(hasher.finalize()))
}

/// Hash an ordered list of labelled parts.
///
/// Each part is framed as `label=value\n` so that moving text between
/// adjacent parts changes the digest.
pub fn hash_parts<'a, I>(parts: I) -> ContentHash
where
  I: IntoIterator<Item = (&'a str, &'a str)>,
{
  let mut hasher = Sha256::new();
  for (label, value) in parts {
    hasher.update(label.as_bytes());
    hasher.update(b"=");
    hasher.update(value.as_bytes());
    hasher.update(b"\n");
  }
  ContentHash(hex::encode(hasher.finalize()))
}
