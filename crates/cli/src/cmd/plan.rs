//! Implementation of the `rigup plan` command.
//!
//! Shows the adapters and entries `rigup setup` would use on this machine,
//! without running anything.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use rigup_lib::system::Invocation;
use rigup_lib::{EntryKind, RetryPolicy, TagSet, plan};

use super::{SelectArgs, detect_platform, load_config};
use crate::output::{OutputFormat, print_info, print_json, print_stat, print_step};

#[derive(Debug, Serialize)]
struct PlanOutput<'a> {
  platform: String,
  package_manager: &'a str,
  shell: String,
  entries: Vec<PlannedEntry<'a>>,
}

#[derive(Debug, Serialize)]
struct PlannedEntry<'a> {
  name: &'a str,
  kind: EntryKind,
  tags: &'a TagSet,
  required_tags: &'a TagSet,
  continue_on_error: bool,
  retry: RetryPolicy,
  command: Invocation,
}

pub fn cmd_plan(config_path: &Path, select: &SelectArgs, output: OutputFormat) -> Result<()> {
  let config = load_config(config_path)?;
  let platform = detect_platform()?;
  select.warn_unknown_names(&config);

  let plan = plan(&config, platform, &select.run_options()).context("Failed to plan setup")?;

  let shell = plan.system.shell;
  let report = PlanOutput {
    platform: platform.to_string(),
    package_manager: &plan.system.package_manager.script,
    shell: Invocation::new(shell.cmd.clone(), shell.args.clone()).to_string(),
    entries: plan
      .invocations()
      .map(|(entry, command)| PlannedEntry {
        name: &entry.name,
        kind: entry.kind(),
        tags: &entry.tags,
        required_tags: &entry.required_tags,
        continue_on_error: entry.continue_on_error,
        retry: entry.retry,
        command,
      })
      .collect(),
  };

  if output.is_json() {
    return print_json(&report);
  }

  print_info(&format!("Platform: {}", report.platform));
  print_stat("Package manager", report.package_manager);
  print_stat("Shell", &report.shell);
  println!();

  if report.entries.is_empty() {
    print_info("No setup entries selected");
    return Ok(());
  }

  for entry in &report.entries {
    let mut line = format!("{} ({})", entry.name, entry.kind);
    if entry.retry.count > 0 {
      line.push_str(&format!(", retry {}", entry.retry.count));
    }
    if entry.continue_on_error {
      line.push_str(", continue on error");
    }
    print_step(&line);
    println!("    {}", entry.command);
  }

  println!();
  print_info(&format!("{} entries would run", report.entries.len()));

  Ok(())
}
