mod cmd;
mod output;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cmd::{SelectArgs, cmd_info, cmd_plan, cmd_setup};
use output::OutputFormat;
use rigup_lib::Config;

/// rigup - bootstrap a machine from a declarative list of setup entries
#[derive(Parser)]
#[command(name = "rigup")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Path to the configuration file
  #[arg(short, long, global = true, default_value = Config::DEFAULT_FILE)]
  config: PathBuf,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Run the setup entries selected for this machine
  Setup {
    #[command(flatten)]
    select: SelectArgs,

    /// Pause before and after every attempt (e.g. "250ms"); overrides the config
    #[arg(long, value_parser = humantime::parse_duration)]
    delay: Option<Duration>,

    /// Stream process output while entries run
    #[arg(short, long)]
    verbose: bool,
  },

  /// Show what setup would run, without running anything
  Plan {
    #[command(flatten)]
    select: SelectArgs,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },

  /// Show the detected platform
  Info {
    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let cli = Cli::parse();

  match cli.command {
    Commands::Setup { select, delay, verbose } => cmd_setup(&cli.config, &select, delay, verbose),
    Commands::Plan { select, output } => cmd_plan(&cli.config, &select, output),
    Commands::Info { output } => cmd_info(output),
  }
}
