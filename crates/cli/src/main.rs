use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use jsforge_lib::config::EnvSnapshot;
use jsforge_lib::execute::StepId;
use tracing_subscriber::EnvFilter;

mod cmd;
mod output;

use output::OutputFormat;

/// jsforge - native build pipeline for the Hermes JavaScript engine
#[derive(Parser)]
#[command(name = "jsforge")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Root of the host project
  #[arg(long, global = true, default_value = ".")]
  project_root: PathBuf,

  /// Settings file (default: jsforge.toml in the project root, if present)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Output format
  #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
  output: OutputFormat,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Run the pipeline, skipping steps that are up to date
  Build {
    /// Run only this step and the steps it depends on
    #[arg(long)]
    step: Option<StepId>,

    /// Parallelism of the native build (default: available CPUs)
    #[arg(short, long)]
    jobs: Option<usize>,
  },

  /// Show which steps are scheduled and in which order
  Plan {
    /// Plan only this step and the steps it depends on
    #[arg(long)]
    step: Option<StepId>,
  },

  /// Show the resolved configuration and paths
  Info,
}

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "info" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let load_config = || cmd::load_config(&cli.project_root, cli.config.as_deref());

  match cli.command {
    Commands::Build { step, jobs } => cmd::cmd_build(load_config()?, step, jobs, cli.output).await,
    Commands::Plan { step } => cmd::cmd_plan(&cli.project_root, &EnvSnapshot::capture(), step, cli.verbose, cli.output),
    Commands::Info => cmd::cmd_info(&load_config()?, cli.output),
  }
}
