//! Shared helpers for end-to-end pipeline tests.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use jsforge_lib::config::{EnvSnapshot, PipelineConfig, Settings};
use jsforge_lib::execute::{NativeRunner, PipelineResult, StepId, execute_pipeline};
use tempfile::TempDir;

/// A scratch project with an SDK holding a fake `cmake`.
pub struct TestProject {
  pub temp: TempDir,
  pub settings: Settings,
  pub override_dir: Option<PathBuf>,
}

impl TestProject {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    let project = Self {
      temp,
      settings: Settings::default(),
      override_dir: None,
    };

    project.write_file("ReactCommon/jsi/jsi/jsi.h", "// host jsi");
    project.install_fake_cmake();
    project
  }

  /// Use a local source tree instead of fetching one.
  pub fn with_local_source(mut self) -> Self {
    let source = self.root().join("local-hermes");
    populate_source(&source);
    self.override_dir = Some(source);
    self
  }

  pub fn root(&self) -> &Path {
    self.temp.path()
  }

  pub fn sdk_root(&self) -> PathBuf {
    self.root().join("sdk")
  }

  /// Every invocation of the fake cmake, one line each: `<cwd> <args>`.
  pub fn calls_path(&self) -> PathBuf {
    self.root().join("cmake.calls")
  }

  pub fn calls(&self) -> Vec<String> {
    std::fs::read_to_string(self.calls_path())
      .unwrap_or_default()
      .lines()
      .map(str::to_string)
      .collect()
  }

  pub fn clear_calls(&self) {
    let _ = std::fs::remove_file(self.calls_path());
  }

  pub fn write_file(&self, relative: &str, content: &str) {
    write_file(&self.root().join(relative), content);
  }

  pub fn config(&self) -> PipelineConfig {
    let env = EnvSnapshot {
      sdk_root: Some(self.sdk_root()),
      override_dir: self.override_dir.clone(),
      ..EnvSnapshot::default()
    };
    PipelineConfig::resolve(self.root(), self.settings.clone(), env).unwrap()
  }

  pub async fn run(&self) -> PipelineResult {
    self.run_target(None).await
  }

  pub async fn run_target(&self, target: Option<StepId>) -> PipelineResult {
    execute_pipeline(Arc::new(self.config()), Arc::new(NativeRunner), target)
      .await
      .unwrap()
  }

  /// The fake configures by writing generated build files under `-B` and
  /// builds by writing the artifact under `--build`.
  fn install_fake_cmake(&self) {
    let cmake = self
      .sdk_root()
      .join("cmake")
      .join(&self.settings.toolchain.cmake_version)
      .join("bin/cmake");

    let script = format!(
      r#"#!/bin/sh
echo "$(pwd -P) $*" >> '{calls}'
if [ "$1" = "--build" ]; then
  mkdir -p "$2/bin"
  echo "compiled" > "$2/bin/hermesc"
  echo "[100%] Built target hermesc"
  exit 0
fi
while [ $# -gt 0 ]; do
  if [ "$1" = "-B" ]; then build="$2"; fi
  shift
done
mkdir -p "$build/CMakeFiles" "$build/tools/hermesc/CMakeFiles/hermesc.dir"
echo "all: hermesc" > "$build/Makefile"
echo "set(HERMES 1)" > "$build/CMakeFiles/Export.cmake"
echo "4" > "$build/CMakeFiles/progress.marks"
echo "c++ -o hermesc" > "$build/tools/hermesc/CMakeFiles/hermesc.dir/link.txt"
echo "-- Configuring done"
"#,
      calls = self.calls_path().display()
    );

    write_file(&cmake, &script);
    let mut perms = std::fs::metadata(&cmake).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&cmake, perms).unwrap();
  }
}

pub fn write_file(path: &Path, content: &str) {
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent).unwrap();
  }
  std::fs::write(path, content).unwrap();
}

/// A minimal engine source tree.
pub fn populate_source(root: &Path) {
  write_file(&root.join("CMakeLists.txt"), "project(hermes)");
  write_file(&root.join("API/hermes/hermes.h"), "// hermes api");
  write_file(&root.join("API/jsi/jsi/jsi.h"), "// bundled jsi");
  write_file(&root.join("public/hermes/Public/GCConfig.h"), "// gc config");
}

/// Calls made in configure mode.
pub fn configure_calls(calls: &[String]) -> Vec<&String> {
  calls.iter().filter(|c| !c.contains("--build")).collect()
}

/// Calls made in build mode.
pub fn build_calls(calls: &[String]) -> Vec<&String> {
  calls.iter().filter(|c| c.contains("--build")).collect()
}
