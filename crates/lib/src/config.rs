//! Session configuration.
//!
//! Configuration comes from three places, resolved exactly once per session:
//! - the optional `jsforge.toml` settings file ([`Settings`])
//! - process environment variables ([`EnvSnapshot`], the only code in this
//!   crate that reads the environment)
//! - the pinned-version file named by the settings
//!
//! [`PipelineConfig::resolve`] combines them into an immutable
//! [`PipelineConfig`] that every step receives by reference.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::consts::{
  DEFAULT_CMAKE_VERSION, DEFAULT_FETCH_RETRIES, DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_HOST, DEFAULT_ORG,
  DEFAULT_PROJECT, DEFAULT_RETRY_DELAY_MS, DEFAULT_TARGET, DEFAULT_VERSION, ENV_ANDROID_HOME, ENV_DOWNLOADS_DIR,
  ENV_OVERRIDE_DIR, ENV_SDK_ROOT, SETTINGS_FILE,
};
use crate::layout::Layout;
use crate::version::VersionDescriptor;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read settings file {path}: {source}")]
  ReadSettings {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid settings file {path}: {source}")]
  ParseSettings {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },

  #[error("failed to read version file {path}: {source}")]
  ReadVersion {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("Android SDK not found: set {ENV_SDK_ROOT} or {ENV_ANDROID_HOME}, or toolchain.sdk_root in {SETTINGS_FILE}")]
  SdkRootMissing,

  #[error("failed to determine the working directory: {0}")]
  WorkingDir(#[source] std::io::Error),
}

/// Which engine to fetch and build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineSettings {
  /// Base URL of the archive host.
  pub host: String,
  pub org: String,
  pub project: String,
  /// Build target producing the compiled artifact.
  pub target: String,
  pub default_version: String,
  /// Pinned-version file, relative to the project root.
  pub version_file: PathBuf,
  /// Extra arguments appended to the configure invocation.
  pub configure_args: Vec<String>,
}

impl Default for EngineSettings {
  fn default() -> Self {
    Self {
      host: DEFAULT_HOST.to_string(),
      org: DEFAULT_ORG.to_string(),
      project: DEFAULT_PROJECT.to_string(),
      target: DEFAULT_TARGET.to_string(),
      default_version: DEFAULT_VERSION.to_string(),
      version_file: PathBuf::from("sdks").join(".hermesversion"),
      configure_args: Vec::new(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolchainSettings {
  pub cmake_version: String,
  /// SDK root used when neither SDK environment variable is set.
  pub sdk_root: Option<PathBuf>,
}

impl Default for ToolchainSettings {
  fn default() -> Self {
    Self {
      cmake_version: DEFAULT_CMAKE_VERSION.to_string(),
      sdk_root: None,
    }
  }
}

/// Directory settings; relative paths resolve against the project root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathSettings {
  pub source_dir: PathBuf,
  pub downloads_dir: PathBuf,
  pub build_dir: PathBuf,
  /// Platform-interface directory handed to the configure step.
  pub interface_dir: PathBuf,
}

impl Default for PathSettings {
  fn default() -> Self {
    Self {
      source_dir: PathBuf::from("sdks").join("hermes"),
      downloads_dir: PathBuf::from("sdks").join("download"),
      build_dir: PathBuf::from("build"),
      interface_dir: PathBuf::from("ReactCommon").join("jsi"),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchSettings {
  /// Retries after the first attempt for transient failures.
  pub retries: u32,
  /// Base back-off; attempt `n` waits `n * retry_delay_ms`.
  pub retry_delay_ms: u64,
  pub timeout_secs: u64,
}

impl Default for FetchSettings {
  fn default() -> Self {
    Self {
      retries: DEFAULT_FETCH_RETRIES,
      retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
      timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostSettings {
  /// The host application's own pre-build command, run after the pipeline.
  pub pre_build: Option<Vec<String>>,
}

/// Contents of the settings file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
  pub engine: EngineSettings,
  pub toolchain: ToolchainSettings,
  pub paths: PathSettings,
  pub fetch: FetchSettings,
  pub host: HostSettings,
}

impl Settings {
  pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
    toml::from_str(content).map_err(|source| ConfigError::ParseSettings {
      path: path.to_path_buf(),
      source,
    })
  }

  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadSettings {
      path: path.to_path_buf(),
      source,
    })?;
    Self::parse(&content, path)
  }

  /// Load `explicit` if given, otherwise `jsforge.toml` under `project_root`
  /// when present, otherwise the defaults.
  pub fn load_or_default(project_root: &Path, explicit: Option<&Path>) -> Result<Self, ConfigError> {
    if let Some(path) = explicit {
      return Self::load(path);
    }

    let default_path = project_root.join(SETTINGS_FILE);
    if default_path.exists() {
      debug!(path = %default_path.display(), "loading settings");
      Self::load(&default_path)
    } else {
      Ok(Self::default())
    }
  }
}

/// Environment variables relevant to the pipeline, captured once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSnapshot {
  pub override_dir: Option<PathBuf>,
  pub downloads_dir: Option<PathBuf>,
  pub sdk_root: Option<PathBuf>,
  pub android_home: Option<PathBuf>,
}

impl EnvSnapshot {
  /// Read the process environment. Blank values count as unset.
  pub fn capture() -> Self {
    fn var(name: &str) -> Option<PathBuf> {
      std::env::var_os(name).filter(|v| !v.to_string_lossy().trim().is_empty()).map(PathBuf::from)
    }

    Self {
      override_dir: var(ENV_OVERRIDE_DIR),
      downloads_dir: var(ENV_DOWNLOADS_DIR),
      sdk_root: var(ENV_SDK_ROOT),
      android_home: var(ENV_ANDROID_HOME),
    }
  }
}

/// Immutable configuration for one pipeline session.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
  pub project_root: PathBuf,
  pub engine: EngineSettings,
  pub version: VersionDescriptor,
  pub layout: Layout,
  /// Whether the source tree was supplied through the override variable.
  /// When set, nothing is fetched or unpacked.
  pub source_override: bool,
  pub cmake_version: String,
  pub fetch: FetchSettings,
  pub pre_build: Option<Vec<String>>,
  /// Parallelism passed to the native build tool.
  pub jobs: usize,
  /// Maximum number of pipeline steps running at once.
  pub parallelism: usize,
}

impl PipelineConfig {
  pub fn resolve(project_root: &Path, settings: Settings, env: EnvSnapshot) -> Result<Self, ConfigError> {
    let project_root = absolute(project_root)?;

    let sdk_root = env
      .sdk_root
      .clone()
      .or_else(|| env.android_home.clone())
      .or_else(|| settings.toolchain.sdk_root.clone())
      .ok_or(ConfigError::SdkRootMissing)?;
    // Steps spawn tools from other working directories.
    let sdk_root = project_root.join(sdk_root);

    let version = VersionDescriptor::read(
      &project_root.join(&settings.engine.version_file),
      &settings.engine.default_version,
    )?;

    let layout = Layout::resolve(&project_root, &settings, &env, &version, &sdk_root);
    let jobs = available_jobs();

    info!(
      version = %version,
      source = %layout.source_dir.display(),
      source_override = env.override_dir.is_some(),
      "resolved pipeline configuration"
    );

    Ok(Self {
      project_root,
      version,
      layout,
      source_override: env.override_dir.is_some(),
      cmake_version: settings.toolchain.cmake_version,
      fetch: settings.fetch,
      pre_build: settings.host.pre_build,
      engine: settings.engine,
      jobs,
      parallelism: jobs,
    })
  }

  pub fn with_jobs(mut self, jobs: usize) -> Self {
    self.jobs = jobs.max(1);
    self
  }

  /// `<host>/<org>/<project>/tarball/<version>`
  pub fn archive_url(&self) -> String {
    format!(
      "{}/{}/{}/tarball/{}",
      self.engine.host.trim_end_matches('/'),
      self.engine.org,
      self.engine.project,
      self.version
    )
  }

  /// Prefix of the synthetic top-level folder inside the tarball
  /// (`<org>-<project>-<hash>/`).
  pub fn archive_prefix(&self) -> String {
    format!("{}-{}-", self.engine.org, self.engine.project)
  }
}

fn absolute(path: &Path) -> Result<PathBuf, ConfigError> {
  if path.is_absolute() {
    return Ok(path.to_path_buf());
  }
  let cwd = std::env::current_dir().map_err(ConfigError::WorkingDir)?;
  Ok(cwd.join(path))
}

fn available_jobs() -> usize {
  std::thread::available_parallelism().map(|p| p.get()).unwrap_or(4)
}
