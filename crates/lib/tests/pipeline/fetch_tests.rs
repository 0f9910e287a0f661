//! The full pipeline against a mock archive host.

use flate2::Compression;
use flate2::write::GzEncoder;
use jsforge_lib::execute::StepId;
use mockito::Matcher;
use serial_test::serial;

use super::common::{TestProject, build_calls, configure_calls};

const ARCHIVE_PATH: &str = "/facebook/hermes/tarball/main";

/// A GitHub-style tarball: every entry sits under `facebook-hermes-<hash>/`.
fn engine_tarball() -> Vec<u8> {
  let files = [
    ("CMakeLists.txt", "project(hermes)"),
    ("API/hermes/hermes.h", "// hermes api"),
    ("API/jsi/jsi/jsi.h", "// bundled jsi"),
    ("public/hermes/Public/GCConfig.h", "// gc config"),
  ];

  let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
  for (path, content) in files {
    let mut header = tar::Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
      .append_data(&mut header, format!("facebook-hermes-abc123/{}", path), content.as_bytes())
      .unwrap();
  }
  builder.into_inner().unwrap().finish().unwrap()
}

fn fetching_project(host: &str) -> TestProject {
  let mut project = TestProject::new();
  project.settings.engine.host = host.to_string();
  project.settings.fetch.retry_delay_ms = 0;
  project.settings.fetch.timeout_secs = 10;
  project
}

#[tokio::test]
#[serial]
async fn downloads_unpacks_and_builds() {
  let mut server = mockito::Server::new_async().await;
  let download = server
    .mock("GET", ARCHIVE_PATH)
    .with_status(200)
    .with_header("etag", "\"v1\"")
    .with_body(engine_tarball())
    .expect(1)
    .create_async()
    .await;

  let project = fetching_project(&server.url());
  let result = project.run().await;

  download.assert_async().await;
  assert!(result.is_success(), "pipeline failed: {:?}", result.failed);
  assert_eq!(result.succeeded.len(), 5);

  let config = project.config();
  assert_eq!(config.layout.source_dir, project.root().join("sdks/hermes"));
  assert!(config.layout.source_dir.join("CMakeLists.txt").exists());
  assert!(!config.layout.source_dir.join("facebook-hermes-abc123").exists());
  assert!(config.layout.archive_path.exists());
  assert!(config.layout.artifact_path.exists());
  assert!(config.layout.headers_dir.join("hermes/hermes.h").exists());
}

#[tokio::test]
#[serial]
async fn unchanged_archive_leaves_everything_up_to_date() {
  let mut server = mockito::Server::new_async().await;
  let first = server
    .mock("GET", ARCHIVE_PATH)
    .match_header("if-none-match", Matcher::Missing)
    .with_status(200)
    .with_header("etag", "\"v1\"")
    .with_body(engine_tarball())
    .expect(1)
    .create_async()
    .await;
  let revalidate = server
    .mock("GET", ARCHIVE_PATH)
    .match_header("if-none-match", "\"v1\"")
    .with_status(304)
    .expect(1)
    .create_async()
    .await;

  let project = fetching_project(&server.url());
  assert!(project.run().await.is_success());
  project.clear_calls();

  let result = project.run().await;

  first.assert_async().await;
  revalidate.assert_async().await;
  assert!(result.is_success());
  assert!(result.succeeded.is_empty());
  assert_eq!(result.up_to_date.len(), 7);
  assert!(project.calls().is_empty());
}

#[tokio::test]
#[serial]
async fn unreachable_host_fails_download_and_skips_the_rest() {
  let mut server = mockito::Server::new_async().await;
  let unavailable = server
    .mock("GET", ARCHIVE_PATH)
    .with_status(503)
    .expect(2)
    .create_async()
    .await;

  let mut project = fetching_project(&server.url());
  project.settings.fetch.retries = 1;
  let result = project.run().await;

  unavailable.assert_async().await;
  assert!(!result.is_success());
  assert_eq!(result.failed[0].0, StepId::Download);
  assert!(result.failed[0].1.diagnostic.contains("after 2 attempt(s)"));
  assert_eq!(result.up_to_date, vec![StepId::InstallCMake]);
  assert_eq!(result.skipped.len(), 5);

  let calls = project.calls();
  assert!(configure_calls(&calls).is_empty());
  assert!(build_calls(&calls).is_empty());
}
