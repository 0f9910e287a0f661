mod build;
mod info;
mod plan;

use std::path::Path;

use anyhow::{Context, Result};
use jsforge_lib::config::{EnvSnapshot, PipelineConfig, Settings};

pub use build::cmd_build;
pub use info::cmd_info;
pub use plan::cmd_plan;

/// Resolve the session configuration from the settings file and the
/// process environment.
pub fn load_config(project_root: &Path, settings_path: Option<&Path>) -> Result<PipelineConfig> {
  let settings = Settings::load_or_default(project_root, settings_path).context("Failed to load settings")?;
  PipelineConfig::resolve(project_root, settings, EnvSnapshot::capture()).context("Failed to resolve configuration")
}
