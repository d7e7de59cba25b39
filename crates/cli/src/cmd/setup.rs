//! Implementation of the `rigup setup` command.
//!
//! Selects entries for this machine and runs them, printing each entry's
//! transitions as they happen.

use std::io::{self, Write};
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use tracing::debug;

use rigup_lib::execute::{EntryState, TokioProcessRunner};
use rigup_lib::{ProgressObserver, RetryBehavior, RunState, Status, run};

use super::{SelectArgs, detect_platform, load_config};
use crate::output::{
  format_elapsed, print_error, print_info, print_output_tail, print_stat, print_step, print_success, print_warning,
};

/// Lines of output shown for a failed entry when output is not streamed.
const FAILURE_TAIL_LINES: usize = 20;

/// Prints entry transitions and, when verbose, streams process output.
struct ProgressPrinter {
  verbose: bool,
  /// Last reported `(status, tries)` per entry.
  seen: Vec<(Status, u32)>,
  /// Bytes of the current attempt's output already streamed, per entry.
  streamed: Vec<usize>,
}

impl ProgressPrinter {
  fn new(verbose: bool) -> Self {
    Self {
      verbose,
      seen: Vec::new(),
      streamed: Vec::new(),
    }
  }

  fn report(&self, state: &EntryState<'_>) {
    let name = &state.entry.name;
    match state.status {
      Status::Running if state.tries == 0 => print_step(name),
      Status::Running => print_step(&format!("{} (attempt {} of {})", name, state.tries + 1, state.max_tries())),
      Status::Complete => print_success(name),
      Status::Waiting if state.retrying => {
        let when = match state.entry.retry.behavior {
          RetryBehavior::InPlace => "retrying",
          RetryBehavior::AtEnd => "retrying after remaining entries",
        };
        print_warning(&format!("{} failed, {} ({} of {} tries used)", name, when, state.tries, state.max_tries()));
      }
      Status::Waiting => {}
      Status::Error => {
        if state.is_tolerated_error() {
          print_warning(&format!("{} failed, continuing", name));
        } else {
          print_error(&format!("{} failed", name));
        }
        if !self.verbose {
          print_output_tail(&state.output(), FAILURE_TAIL_LINES);
        }
      }
    }
  }

  fn stream(&mut self, index: usize, out: &[u8]) {
    let done = self.streamed[index];
    if out.len() <= done {
      return;
    }

    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout.write_all(&out[done..]).and_then(|_| stdout.flush()) {
      debug!(error = %err, "failed to stream entry output");
    }
    self.streamed[index] = out.len();
  }
}

impl ProgressObserver for ProgressPrinter {
  fn on_progress(&mut self, state: &RunState<'_>) {
    if self.seen.len() != state.entries.len() {
      self.seen = vec![(Status::Waiting, 0); state.entries.len()];
      self.streamed = vec![0; state.entries.len()];
    }

    for (index, entry) in state.entries.iter().enumerate() {
      let current = (entry.status, entry.tries);
      if current != self.seen[index] {
        if entry.status == Status::Running {
          self.streamed[index] = 0;
        }
        self.report(entry);
        self.seen[index] = current;
      }

      if self.verbose {
        self.stream(index, &entry.out);
      }
    }
  }
}

pub fn cmd_setup(config_path: &Path, select: &SelectArgs, delay: Option<Duration>, verbose: bool) -> Result<()> {
  let config = load_config(config_path)?;
  let platform = detect_platform()?;
  select.warn_unknown_names(&config);

  let mut options = select.run_options();
  options.delay = delay;

  let mut printer = ProgressPrinter::new(verbose);
  let started = Instant::now();

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let state = rt
    .block_on(run(&config, platform, &options, TokioProcessRunner, &mut printer))
    .context("Setup failed")?;

  let elapsed = format_elapsed(started.elapsed());

  if state.entries.is_empty() {
    print_info(&format!("No setup entries selected for {}", platform));
    return Ok(());
  }

  println!();
  print_stat("Entries", &state.entries.len().to_string());
  print_stat("Errored", &state.errored_count.to_string());
  print_stat("Elapsed", &elapsed);

  if state.status != Status::Complete {
    bail!("Setup finished with status {}", state.status);
  }

  if state.errored_count > 0 {
    print_warning(&format!("Setup complete with {} tolerated failure(s)", state.errored_count));
  } else {
    print_success("Setup complete");
  }

  Ok(())
}
