//! Pinned CMake provisioning through the Android SDK manager.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::PipelineConfig;
use crate::process::{Invocation, run_logged};

use super::{Completion, StepError, StepOutputs};

pub const NAME: &str = "install-cmake";

/// SDK manager locations relative to the SDK root, in lookup order.
pub const SDKMANAGER_CANDIDATES: [&str; 4] = [
  "cmdline-tools/latest/bin/sdkmanager",
  "cmdline-tools/latest/bin/sdkmanager.bat",
  "tools/bin/sdkmanager",
  "tools/bin/sdkmanager.bat",
];

pub fn sdkmanager_candidates(sdk_root: &Path) -> Vec<PathBuf> {
  SDKMANAGER_CANDIDATES.iter().map(|rel| sdk_root.join(rel)).collect()
}

/// First existing SDK manager under `sdk_root`.
pub fn locate_sdkmanager(sdk_root: &Path) -> Result<PathBuf, StepError> {
  let candidates = sdkmanager_candidates(sdk_root);
  match candidates.iter().find(|p| p.exists()) {
    Some(found) => Ok(found.clone()),
    None => Err(StepError::InstallerNotFound { candidates }),
  }
}

/// Make sure the pinned CMake exists under the SDK root.
///
/// An existing install directory is trusted as-is: its version is not
/// inspected, so a directory holding a different build still counts as
/// installed.
pub async fn install_cmake(config: &PipelineConfig) -> Result<Completion, StepError> {
  let layout = &config.layout;

  if layout.cmake_dir.exists() {
    info!(path = %layout.cmake_dir.display(), "cmake already installed");
    return Ok(Completion::UpToDate);
  }

  let sdkmanager = locate_sdkmanager(&layout.sdk_root)?;
  let package = format!("cmake;{}", config.cmake_version);

  info!(sdkmanager = %sdkmanager.display(), package = %package, "installing cmake");
  let invocation = Invocation::new(&sdkmanager, &layout.sdk_root).args(["--install".to_string(), package]);
  run_logged(&invocation).await?;

  if !layout.cmake_binary.exists() {
    return Err(StepError::ToolchainMissing {
      path: layout.cmake_binary.clone(),
    });
  }

  Ok(Completion::Ran(StepOutputs::single(&layout.cmake_dir)))
}
