//! Incremental behaviour of the configure, compile and header steps.

use jsforge_lib::execute::StepId;
use serial_test::serial;

use super::common::{TestProject, build_calls, configure_calls, write_file};

#[tokio::test]
#[serial]
async fn first_run_configures_compiles_and_stages() {
  let project = TestProject::new().with_local_source();
  let result = project.run().await;

  assert!(result.is_success(), "pipeline failed: {:?}", result.failed);
  let calls = project.calls();
  assert_eq!(configure_calls(&calls).len(), 1);
  assert_eq!(build_calls(&calls).len(), 1);

  let config = project.config();
  assert!(config.layout.artifact_path.exists());
  assert!(config.layout.headers_dir.join("hermes/hermes.h").exists());
  assert!(config.layout.headers_dir.join("hermes/Public/GCConfig.h").exists());
  assert!(!config.layout.headers_dir.join("jsi").exists());

  assert!(config.layout.configure_log.exists());
  assert!(config.layout.compile_log.exists());
  assert!(config.layout.compile_error_log.exists());
}

#[tokio::test]
#[serial]
async fn rerun_without_changes_spawns_nothing() {
  let project = TestProject::new().with_local_source();
  project.run().await;
  project.clear_calls();

  let result = project.run().await;

  assert!(result.is_success());
  assert!(project.calls().is_empty(), "unexpected calls: {:?}", project.calls());
  assert!(result.succeeded.is_empty());
  for step in [StepId::Configure, StepId::Compile, StepId::StageHeaders] {
    assert!(result.up_to_date.contains(&step), "{} should be up to date", step);
  }
}

#[tokio::test]
#[serial]
async fn override_dir_skips_fetching_and_configures_in_place() {
  let project = TestProject::new().with_local_source();
  let result = project.run().await;

  assert!(result.outcome_of(StepId::Download).is_none());
  assert!(result.outcome_of(StepId::Unpack).is_none());
  assert!(result.skipped.is_empty());

  let source = dunce::canonicalize(project.override_dir.as_ref().unwrap()).unwrap();
  let calls = project.calls();
  let configure = configure_calls(&calls);
  assert!(
    configure[0].starts_with(&format!("{} ", source.display())),
    "configure ran in the wrong directory: {}",
    configure[0]
  );
}

#[tokio::test]
#[serial]
async fn changed_fingerprint_recompiles_existing_artifact() {
  let project = TestProject::new().with_local_source();
  project.run().await;
  project.clear_calls();

  let config = project.config();
  assert!(config.layout.artifact_path.exists());
  write_file(&config.layout.engine_build_dir.join("Makefile"), "all: hermesc hermes");

  let result = project.run().await;

  assert!(result.is_success());
  let calls = project.calls();
  assert!(configure_calls(&calls).is_empty());
  assert_eq!(build_calls(&calls).len(), 1);
  assert!(result.up_to_date.contains(&StepId::Configure));
}

#[tokio::test]
#[serial]
async fn unmatched_build_files_do_not_recompile() {
  let project = TestProject::new().with_local_source();
  project.run().await;
  project.clear_calls();

  let config = project.config();
  write_file(&config.layout.engine_build_dir.join("CMakeCache.txt"), "CACHE=changed");

  project.run().await;
  assert!(project.calls().is_empty());
}

#[tokio::test]
#[serial]
async fn missing_artifact_recompiles() {
  let project = TestProject::new().with_local_source();
  project.run().await;
  project.clear_calls();

  std::fs::remove_file(project.config().layout.artifact_path).unwrap();
  let result = project.run().await;

  assert!(result.is_success());
  assert_eq!(build_calls(&project.calls()).len(), 1);
  assert!(project.config().layout.artifact_path.exists());
}

#[tokio::test]
#[serial]
async fn source_change_reconfigures() {
  let project = TestProject::new().with_local_source();
  project.run().await;
  project.clear_calls();

  write_file(
    &project.override_dir.as_ref().unwrap().join("CMakeLists.txt"),
    "project(hermes VERSION 2)",
  );
  project.run().await;

  let calls = project.calls();
  assert_eq!(configure_calls(&calls).len(), 1);
  // Regenerated build files are identical, so the build is still current.
  assert!(build_calls(&calls).is_empty());
}

#[tokio::test]
#[serial]
async fn header_change_restages_only_headers() {
  let project = TestProject::new().with_local_source();
  project.run().await;
  project.clear_calls();

  let source = project.override_dir.clone().unwrap();
  write_file(&source.join("public/hermes/Public/CrashManager.h"), "// new header");
  let result = project.run().await;

  assert!(result.succeeded.iter().any(|(step, _)| *step == StepId::StageHeaders));
  assert!(
    project
      .config()
      .layout
      .headers_dir
      .join("hermes/Public/CrashManager.h")
      .exists()
  );
  // The header lives in the source tree, which configure hashes.
  assert_eq!(configure_calls(&project.calls()).len(), 1);
}

#[tokio::test]
#[serial]
async fn target_step_runs_only_its_dependencies() {
  let project = TestProject::new().with_local_source();
  let result = project.run_target(Some(StepId::Configure)).await;

  assert!(result.is_success());
  assert_eq!(result.total(), 2);
  let calls = project.calls();
  assert_eq!(configure_calls(&calls).len(), 1);
  assert!(build_calls(&calls).is_empty());
  assert!(!project.config().layout.artifact_path.exists());
}

#[tokio::test]
#[serial]
async fn failing_configure_blocks_everything_after_it() {
  let project = TestProject::new().with_local_source();
  let config = project.config();
  write_file(&config.layout.cmake_binary, "#!/bin/sh\necho 'CMake Error' \nexit 1\n");

  let result = project.run().await;

  assert!(!result.is_success());
  let (step, failure) = &result.failed[0];
  assert_eq!(*step, StepId::Configure);
  assert_eq!(failure.log_path.as_deref(), Some(config.layout.configure_log.as_path()));
  let skipped: Vec<_> = result.skipped.iter().map(|(s, _)| *s).collect();
  assert_eq!(skipped, vec![StepId::Compile, StepId::StageHeaders, StepId::PreBuild]);
}
