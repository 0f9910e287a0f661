//! Shared test helpers for CLI integration tests.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Isolated test environment.
///
/// Each test gets its own project root, SDK root and local engine source
/// tree inside one temporary directory.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  /// A project whose SDK already holds a working fake `cmake`.
  pub fn new() -> Self {
    let env = Self {
      temp: TempDir::new().unwrap(),
    };
    env.write_file("ReactCommon/jsi/jsi/jsi.h", "// host jsi");
    env.write_file("local-hermes/CMakeLists.txt", "project(hermes)");
    env.write_file("local-hermes/API/hermes/hermes.h", "// hermes api");
    env.write_file("local-hermes/public/hermes/Public/GCConfig.h", "// gc config");
    env.install_cmake(WORKING_CMAKE);
    env
  }

  pub fn root(&self) -> &Path {
    self.temp.path()
  }

  /// Write a file relative to the temp directory.
  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.root().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }

  pub fn cmake_path(&self) -> PathBuf {
    self.root().join("sdk/cmake/3.31.1/bin/cmake")
  }

  /// Replace the fake `cmake` with `script`.
  pub fn install_cmake(&self, script: &str) {
    let path = self.cmake_path();
    self.write_file("sdk/cmake/3.31.1/bin/cmake", script);
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
  }

  /// Every invocation of the fake `cmake`, one line each.
  pub fn cmake_calls(&self) -> Vec<String> {
    std::fs::read_to_string(self.root().join("cmake.calls"))
      .unwrap_or_default()
      .lines()
      .map(str::to_string)
      .collect()
  }

  /// A `jsforge` command rooted at this project with the source tree
  /// supplied through the override variable.
  pub fn cmd(&self) -> Command {
    let mut cmd = cargo_bin_cmd!("jsforge");
    cmd
      .current_dir(self.root())
      .env_remove("REACT_NATIVE_DOWNLOADS_DIR")
      .env_remove("ANDROID_HOME")
      .env("ANDROID_SDK_ROOT", self.root().join("sdk"))
      .env("REACT_NATIVE_OVERRIDE_HERMES_DIR", self.root().join("local-hermes"));
    cmd
  }
}

/// Records each call, then fakes configure and build output.
pub const WORKING_CMAKE: &str = r#"#!/bin/sh
echo "$*" >> "$ANDROID_SDK_ROOT/../cmake.calls"
if [ "$1" = "--build" ]; then
  mkdir -p "$2/bin"
  echo "compiled" > "$2/bin/hermesc"
  exit 0
fi
while [ $# -gt 0 ]; do
  if [ "$1" = "-B" ]; then build="$2"; fi
  shift
done
mkdir -p "$build/CMakeFiles"
echo "all: hermesc" > "$build/Makefile"
echo "set(HERMES 1)" > "$build/CMakeFiles/Export.cmake"
"#;

/// Configures fine, then fails to compile.
pub const BROKEN_COMPILER_CMAKE: &str = r#"#!/bin/sh
if [ "$1" = "--build" ]; then
  echo "error: hermesc.cpp:1: boom" >&2
  exit 2
fi
while [ $# -gt 0 ]; do
  if [ "$1" = "-B" ]; then build="$2"; fi
  shift
done
mkdir -p "$build"
echo "all: hermesc" > "$build/Makefile"
"#;
