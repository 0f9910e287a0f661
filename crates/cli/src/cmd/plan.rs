//! Implementation of the `jsforge plan` command.
//!
//! Prints the pipeline graph for the current configuration as execution
//! waves without running anything. Only the source override changes the
//! graph, so no settings file or SDK is needed.

use std::path::Path;

use anyhow::{Context, Result};

use jsforge_lib::config::EnvSnapshot;
use jsforge_lib::consts::ENV_OVERRIDE_DIR;
use jsforge_lib::execute::{PipelineGraph, StepId};

use crate::output::{OutputFormat, print_info, print_json, symbols};

pub fn cmd_plan(
  project_root: &Path,
  env: &EnvSnapshot,
  step: Option<StepId>,
  verbose: bool,
  format: OutputFormat,
) -> Result<()> {
  let override_dir = env.override_dir.as_ref().map(|dir| project_root.join(dir));
  let full = PipelineGraph::new(override_dir.is_none());
  let graph = match step {
    Some(step) => full.closure(step)?,
    None => full,
  };
  let waves = graph.waves().context("Failed to order pipeline steps")?;

  if format.is_json() {
    let dependencies: serde_json::Map<String, serde_json::Value> = graph
      .steps()
      .into_iter()
      .map(|s| (s.to_string(), serde_json::json!(graph.dependencies(s))))
      .collect();
    return print_json(&serde_json::json!({
      "source_override": override_dir.is_some(),
      "waves": waves,
      "dependencies": dependencies,
    }));
  }

  print_info(&format!("Plan: {} step(s) in {} wave(s)", graph.len(), waves.len()));
  if let Some(dir) = &override_dir {
    println!("  source from {} ({}), nothing is fetched", ENV_OVERRIDE_DIR, dir.display());
  }
  println!();

  for (idx, wave) in waves.iter().enumerate() {
    let names: Vec<String> = wave.iter().map(StepId::to_string).collect();
    println!("  {} {}: {}", symbols::ARROW, idx + 1, names.join(", "));

    if verbose {
      for &step in wave {
        let deps = graph.dependencies(step);
        if !deps.is_empty() {
          let deps: Vec<String> = deps.iter().map(StepId::to_string).collect();
          println!("      {} after {}", step, deps.join(", "));
        }
      }
    }
  }

  Ok(())
}
