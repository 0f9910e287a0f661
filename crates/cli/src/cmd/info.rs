use anyhow::Result;

use jsforge_lib::config::PipelineConfig;

use crate::output::{OutputFormat, print_info, print_json, print_stat};

pub fn cmd_info(config: &PipelineConfig, format: OutputFormat) -> Result<()> {
  let layout = &config.layout;

  if format.is_json() {
    return print_json(&serde_json::json!({
      "version": config.version,
      "archive_url": config.archive_url(),
      "source_override": config.source_override,
      "cmake_version": config.cmake_version,
      "jobs": config.jobs,
      "pre_build": config.pre_build,
      "layout": layout,
    }));
  }

  print_info(&format!("{} {}", config.engine.project, config.version));
  print_stat("Archive", &config.archive_url());
  print_stat("Source", &layout.source_dir.display().to_string());
  print_stat("Build", &layout.engine_build_dir.display().to_string());
  print_stat("Artifact", &layout.artifact_path.display().to_string());
  print_stat("Headers", &layout.headers_dir.display().to_string());
  print_stat("CMake", &format!("{} ({})", config.cmake_version, layout.cmake_binary.display()));
  print_stat("Jobs", &config.jobs.to_string());
  if let Some(command) = &config.pre_build {
    print_stat("Pre-build", &command.join(" "));
  }

  Ok(())
}
