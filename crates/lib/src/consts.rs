//! Fixed names and defaults shared across the pipeline.

pub const APP_NAME: &str = "jsforge";

/// Settings file looked up at the project root when `--config` is not given.
pub const SETTINGS_FILE: &str = "jsforge.toml";

/// Directory under the build root that holds step records.
pub const STATE_DIR: &str = ".jsforge";

pub const DEFAULT_HOST: &str = "https://github.com";
pub const DEFAULT_ORG: &str = "facebook";
pub const DEFAULT_PROJECT: &str = "hermes";
pub const DEFAULT_TARGET: &str = "hermesc";

/// Moving reference used when no pinned-version file exists.
pub const DEFAULT_VERSION: &str = "main";

pub const DEFAULT_CMAKE_VERSION: &str = "3.31.1";

/// Retries after the first attempt for transient fetch failures.
pub const DEFAULT_FETCH_RETRIES: u32 = 5;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 500;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 300;

pub const ENV_OVERRIDE_DIR: &str = "REACT_NATIVE_OVERRIDE_HERMES_DIR";
pub const ENV_DOWNLOADS_DIR: &str = "REACT_NATIVE_DOWNLOADS_DIR";
pub const ENV_SDK_ROOT: &str = "ANDROID_SDK_ROOT";
pub const ENV_ANDROID_HOME: &str = "ANDROID_HOME";

/// Step record format version.
pub const RECORD_VERSION: u32 = 1;
