//! Every path the pipeline reads or writes, computed once per session.
//!
//! # Layout
//!
//! ```text
//! <project>/
//! ├── sdks/download/<project>-<version>.tar.gz    # fetch (+ .meta.json)
//! ├── sdks/hermes/                                # unpack (or the override dir)
//! └── build/
//!     ├── hermes/                                 # configure output tree
//!     │   └── bin/hermesc                         # compiled artifact
//!     ├── prefab-headers/                         # staged headers
//!     ├── configure-hermesc.log
//!     ├── build-hermesc.log
//!     ├── build-hermesc.error.log
//!     └── .jsforge/steps/<step>.json              # up-to-date records
//! <sdk>/cmake/<cmake-version>/bin/cmake           # provisioned toolchain
//! ```

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::{EnvSnapshot, Settings};
use crate::consts::STATE_DIR;
use crate::version::VersionDescriptor;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Layout {
  pub downloads_dir: PathBuf,
  pub archive_path: PathBuf,
  pub source_dir: PathBuf,
  pub build_root: PathBuf,
  /// Output tree of the configure step.
  pub engine_build_dir: PathBuf,
  pub artifact_path: PathBuf,
  pub headers_dir: PathBuf,
  pub interface_dir: PathBuf,
  pub configure_log: PathBuf,
  pub compile_log: PathBuf,
  pub compile_error_log: PathBuf,
  pub state_dir: PathBuf,
  pub sdk_root: PathBuf,
  pub cmake_dir: PathBuf,
  pub cmake_binary: PathBuf,
}

impl Layout {
  pub fn resolve(
    project_root: &Path,
    settings: &Settings,
    env: &EnvSnapshot,
    version: &VersionDescriptor,
    sdk_root: &Path,
  ) -> Self {
    let engine = &settings.engine;
    let paths = &settings.paths;

    let downloads_dir = project_root.join(env.downloads_dir.as_ref().unwrap_or(&paths.downloads_dir));
    let source_dir = project_root.join(env.override_dir.as_ref().unwrap_or(&paths.source_dir));
    let build_root = project_root.join(&paths.build_dir);
    let engine_build_dir = build_root.join(&engine.project);
    let cmake_dir = sdk_root.join("cmake").join(&settings.toolchain.cmake_version);

    Self {
      archive_path: downloads_dir.join(archive_file_name(&engine.project, version)),
      downloads_dir,
      source_dir,
      artifact_path: engine_build_dir
        .join("bin")
        .join(format!("{}{}", engine.target, std::env::consts::EXE_SUFFIX)),
      engine_build_dir,
      headers_dir: build_root.join("prefab-headers"),
      interface_dir: project_root.join(&paths.interface_dir),
      configure_log: build_root.join(format!("configure-{}.log", engine.target)),
      compile_log: build_root.join(format!("build-{}.log", engine.target)),
      compile_error_log: build_root.join(format!("build-{}.error.log", engine.target)),
      state_dir: build_root.join(STATE_DIR).join("steps"),
      build_root,
      sdk_root: sdk_root.to_path_buf(),
      cmake_binary: cmake_dir
        .join("bin")
        .join(format!("cmake{}", std::env::consts::EXE_SUFFIX)),
      cmake_dir,
    }
  }

  /// Sidecar file holding the conditional-fetch metadata of the archive.
  pub fn archive_meta_path(&self) -> PathBuf {
    let mut name = self.archive_path.file_name().unwrap_or_default().to_os_string();
    name.push(".meta.json");
    self.archive_path.with_file_name(name)
  }

  /// Up-to-date record of a step.
  pub fn record_path(&self, step: &str) -> PathBuf {
    self.state_dir.join(format!("{}.json", step))
  }
}

/// Archive file name; includes the version so different versions never share
/// a cached archive.
pub fn archive_file_name(project: &str, version: &VersionDescriptor) -> String {
  format!("{}-{}.tar.gz", project, version.file_safe())
}
