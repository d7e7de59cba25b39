mod info;
mod plan;
mod setup;

pub use info::cmd_info;
pub use plan::cmd_plan;
pub use setup::cmd_setup;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;

use rigup_lib::{Config, Platform, RunOptions, TagSet};

use crate::output::print_warning;

/// Entry selection shared by `setup` and `plan`.
#[derive(Args, Debug, Clone, Default)]
pub struct SelectArgs {
  /// Only these entries (default: every entry matching the platform and tags)
  pub names: Vec<String>,

  /// Runtime tags; repeat or separate with commas
  #[arg(short, long = "tag", value_name = "TAG", value_delimiter = ',')]
  pub tags: Vec<String>,
}

impl SelectArgs {
  pub fn run_options(&self) -> RunOptions {
    RunOptions {
      tags: self.tags.iter().cloned().collect(),
      names: self.names.iter().cloned().collect::<TagSet>(),
      delay: None,
    }
  }

  /// Warn about requested names no entry in `config` declares.
  pub fn warn_unknown_names(&self, config: &Config) {
    for name in self.names.iter().filter(|name| !config.declares(name)) {
      print_warning(&format!("No setup entry named '{}'", name));
    }
  }
}

fn load_config(path: &Path) -> Result<Config> {
  Config::load(path).with_context(|| format!("Failed to load config: {}", path.display()))
}

fn detect_platform() -> Result<Platform> {
  Platform::current().context("Failed to detect platform")
}
