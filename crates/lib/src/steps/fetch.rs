//! Source archive download with conditional re-fetch and bounded retry.
//!
//! The entity tag and last-modified date of the last successful download are
//! kept in a sidecar file next to the archive. When both the archive and a
//! sidecar for the same URL exist, the request is conditional and a
//! `304 Not Modified` leaves the archive untouched.

use std::path::Path;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{ETAG, HeaderName, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::consts::APP_NAME;

use super::{Completion, StepError, StepOutputs};

pub const NAME: &str = "download";

/// Validators of the last successful download.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchMeta {
  pub url: String,
  pub etag: Option<String>,
  pub last_modified: Option<String>,
}

impl FetchMeta {
  fn has_validators(&self) -> bool {
    self.etag.is_some() || self.last_modified.is_some()
  }
}

/// Read the sidecar. Unreadable metadata is treated as absent.
pub fn read_meta(path: &Path) -> Option<FetchMeta> {
  let content = std::fs::read_to_string(path).ok()?;
  match serde_json::from_str(&content) {
    Ok(meta) => Some(meta),
    Err(e) => {
      debug!(path = %path.display(), error = %e, "ignoring unreadable fetch metadata");
      None
    }
  }
}

fn write_meta(path: &Path, meta: &FetchMeta) -> Result<(), StepError> {
  let content = serde_json::to_string_pretty(meta).map_err(std::io::Error::other)?;
  std::fs::write(path, content)?;
  Ok(())
}

enum AttemptError {
  Transient(String),
  Fatal(StepError),
}

impl From<std::io::Error> for AttemptError {
  fn from(e: std::io::Error) -> Self {
    AttemptError::Fatal(StepError::Io(e))
  }
}

fn classify(e: reqwest::Error) -> AttemptError {
  if e.is_builder() {
    AttemptError::Fatal(StepError::FetchFailed {
      url: e.url().map(|u| u.to_string()).unwrap_or_default(),
      attempts: 1,
      message: e.to_string(),
    })
  } else {
    AttemptError::Transient(e.to_string())
  }
}

/// Download the engine's source archive for the configured version.
pub async fn fetch_archive(config: &PipelineConfig) -> Result<Completion, StepError> {
  let url = config.archive_url();
  let layout = &config.layout;
  let meta_path = layout.archive_meta_path();

  tokio::fs::create_dir_all(&layout.downloads_dir).await?;

  let previous = if layout.archive_path.exists() {
    read_meta(&meta_path).filter(|m| m.url == url && m.has_validators())
  } else {
    None
  };

  let client = reqwest::Client::builder()
    .timeout(Duration::from_secs(config.fetch.timeout_secs))
    .user_agent(format!("{}/{}", APP_NAME, env!("CARGO_PKG_VERSION")))
    .build()
    .map_err(|e| StepError::FetchFailed {
      url: url.clone(),
      attempts: 0,
      message: e.to_string(),
    })?;

  let max_attempts = config.fetch.retries.saturating_add(1);
  let mut attempt: u32 = 0;

  loop {
    attempt = attempt.saturating_add(1);
    debug!(url = %url, attempt, conditional = previous.is_some(), "requesting archive");

    match try_fetch(&client, &url, previous.as_ref(), config).await {
      Ok(completion) => return Ok(completion),
      Err(AttemptError::Fatal(e)) => return Err(e),
      Err(AttemptError::Transient(message)) if attempt < max_attempts => {
        let delay = retry_delay(config.fetch.retry_delay_ms, attempt);
        warn!(url = %url, attempt, error = %message, "transient fetch failure, retrying");
        tokio::time::sleep(delay).await;
      }
      Err(AttemptError::Transient(message)) => {
        return Err(StepError::FetchFailed {
          url,
          attempts: attempt,
          message,
        });
      }
    }
  }
}

/// Linear back-off before the retry following `attempt`.
fn retry_delay(base_ms: u64, attempt: u32) -> Duration {
  Duration::from_millis(base_ms.saturating_mul(u64::from(attempt)))
}

async fn try_fetch(
  client: &reqwest::Client,
  url: &str,
  previous: Option<&FetchMeta>,
  config: &PipelineConfig,
) -> Result<Completion, AttemptError> {
  let layout = &config.layout;

  let mut request = client.get(url);
  if let Some(meta) = previous {
    if let Some(etag) = &meta.etag {
      request = request.header(IF_NONE_MATCH, etag);
    }
    if let Some(last_modified) = &meta.last_modified {
      request = request.header(IF_MODIFIED_SINCE, last_modified);
    }
  }

  let mut response = request.send().await.map_err(classify)?;
  let status = response.status();

  if status == StatusCode::NOT_MODIFIED && previous.is_some() {
    info!(path = %layout.archive_path.display(), "archive not modified");
    return Ok(Completion::UpToDate);
  }
  if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
    return Err(AttemptError::Transient(format!("HTTP {}", status)));
  }
  if !status.is_success() {
    return Err(AttemptError::Fatal(StepError::HttpStatus {
      url: url.to_string(),
      status: status.as_u16(),
    }));
  }

  let header = |name: HeaderName| {
    response
      .headers()
      .get(name)
      .and_then(|v| v.to_str().ok())
      .map(str::to_string)
  };
  let meta = FetchMeta {
    url: url.to_string(),
    etag: header(ETAG),
    last_modified: header(LAST_MODIFIED),
  };

  // Stream into a temp file beside the archive so the final rename stays on
  // one filesystem. Dropping the temp path on error removes the partial file.
  let temp = tempfile::NamedTempFile::new_in(&layout.downloads_dir)?;
  let (file, temp_path) = temp.into_parts();
  let mut file = tokio::fs::File::from_std(file);
  let mut size: u64 = 0;

  while let Some(chunk) = response.chunk().await.map_err(classify)? {
    file.write_all(&chunk).await?;
    size += chunk.len() as u64;
  }
  file.flush().await?;
  file.sync_all().await?;
  drop(file);

  temp_path.persist(&layout.archive_path).map_err(|e| e.error)?;
  write_meta(&layout.archive_meta_path(), &meta).map_err(AttemptError::Fatal)?;

  info!(path = %layout.archive_path.display(), size, etag = ?meta.etag, "archive downloaded");
  Ok(Completion::Ran(StepOutputs::single(&layout.archive_path)))
}
