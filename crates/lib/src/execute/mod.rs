//! Sequential, retry-aware execution of selected entries.
//!
//! Entries run one at a time in selection order. A cursor walks the entry
//! list and wraps around until the run reaches a terminal status, which is
//! what gives `AtEnd` retries their round-robin placement. `InPlace` retries
//! repeat on the same entry before the cursor moves on.

pub mod process;
pub mod types;

use tracing::{debug, error, info, warn};

use crate::config::{Config, check_unique_names};
use crate::entry::{Entry, RetryBehavior};
use crate::filter::Filterer;
use crate::platform::Platform;
use crate::system::{Invocation, System};
use crate::tags::TagSet;

pub use process::{OutputSink, ProcessError, ProcessRunner, TokioProcessRunner};
pub use types::{EntryState, ExecuteConfig, RunError, RunState, Status};

/// Receives the run state after every transition and every output write.
///
/// Called synchronously from the run loop; a slow observer stalls the run.
pub trait ProgressObserver {
  fn on_progress(&mut self, state: &RunState<'_>);
}

/// Observer that ignores all progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
  fn on_progress(&mut self, _state: &RunState<'_>) {}
}

/// Sink tied to the running entry: appends to its `out` and notifies.
struct EntryOutput<'s, 'a, O: ?Sized> {
  state: &'s mut RunState<'a>,
  index: usize,
  observer: &'s mut O,
}

impl<O: ProgressObserver + ?Sized> OutputSink for EntryOutput<'_, '_, O> {
  fn write(&mut self, bytes: &[u8]) {
    self.state.entries[self.index].out.extend_from_slice(bytes);
    self.observer.on_progress(self.state);
  }
}

/// Drives entries to completion with the selected system adapters.
pub struct Engine<'a, R> {
  system: System<'a>,
  runner: R,
  config: ExecuteConfig,
}

impl<'a, R: ProcessRunner> Engine<'a, R> {
  pub fn new(system: System<'a>, runner: R, config: ExecuteConfig) -> Self {
    Self { system, runner, config }
  }

  /// Run `entries` until every one is complete or one fails fatally.
  ///
  /// On a fatal failure the error is returned immediately; entries after the
  /// failing one stay `Waiting` and the observer has already seen the final
  /// state.
  pub async fn execute<O>(&self, entries: Vec<&'a Entry>, observer: &mut O) -> Result<RunState<'a>, RunError>
  where
    O: ProgressObserver + ?Sized,
  {
    let mut state = RunState::new(entries);
    info!(entries = state.entries.len(), "starting run");
    observer.on_progress(&state);

    let mut index = 0;
    while !state.status.is_completed() {
      if index >= state.entries.len() {
        index = 0;
      }

      if !state.entries[index].status.is_completed() {
        self.run_entry(&mut state, index, observer).await?;
      }

      index += 1;
    }

    info!(
      status = %state.status,
      errored = state.errored_count,
      "run finished"
    );
    Ok(state)
  }

  async fn run_entry<O>(&self, state: &mut RunState<'a>, index: usize, observer: &mut O) -> Result<(), RunError>
  where
    O: ProgressObserver + ?Sized,
  {
    let entry = state.entries[index].entry;

    loop {
      let retry_pending = self.attempt(state, index, observer).await?;
      if !retry_pending || entry.retry.behavior == RetryBehavior::AtEnd {
        return Ok(());
      }
    }
  }

  /// Make one attempt at the entry at `index`.
  ///
  /// Returns whether the entry is waiting on another try.
  async fn attempt<O>(&self, state: &mut RunState<'a>, index: usize, observer: &mut O) -> Result<bool, RunError>
  where
    O: ProgressObserver + ?Sized,
  {
    let entry = state.entries[index].entry;

    self.pause().await;

    let entry_state = &mut state.entries[index];
    entry_state.status = Status::Running;
    entry_state.out.clear();
    let attempt = entry_state.tries + 1;
    state.recalculate();
    observer.on_progress(state);

    let invocation = entry.build_command(&self.system);
    debug!(
      entry = %entry.name,
      kind = %entry.kind(),
      attempt,
      command = %invocation,
      "running entry"
    );

    let result = self.invoke(&invocation, state, index, observer).await;

    self.pause().await;

    let entry_state = &mut state.entries[index];
    entry_state.tries += 1;
    let tries = entry_state.tries;

    let outcome = match result {
      Ok(()) => {
        entry_state.status = Status::Complete;
        entry_state.retrying = false;
        debug!(entry = %entry.name, tries, "entry complete");
        Ok(false)
      }
      Err(err) if tries <= entry.retry.count => {
        entry_state.status = Status::Waiting;
        entry_state.retrying = true;
        warn!(
          entry = %entry.name,
          tries,
          retries = entry.retry.count,
          behavior = ?entry.retry.behavior,
          error = %err,
          "entry failed, will retry"
        );
        Ok(true)
      }
      Err(err) if entry.continue_on_error => {
        entry_state.status = Status::Error;
        entry_state.retrying = false;
        warn!(entry = %entry.name, tries, error = %err, "entry failed, continuing");
        Ok(false)
      }
      Err(err) => {
        entry_state.status = Status::Error;
        entry_state.retrying = false;
        error!(entry = %entry.name, tries, error = %err, "entry failed");
        Err(RunError::FatalExecution {
          entry: entry.name.clone(),
          source: err,
        })
      }
    };

    state.recalculate();
    observer.on_progress(state);
    outcome
  }

  async fn invoke<O>(
    &self,
    invocation: &Invocation,
    state: &mut RunState<'a>,
    index: usize,
    observer: &mut O,
  ) -> Result<(), ProcessError>
  where
    O: ProgressObserver + ?Sized,
  {
    let mut sink = EntryOutput { state, index, observer };
    self.runner.run(invocation, &mut sink).await
  }

  async fn pause(&self) {
    if !self.config.delay.is_zero() {
      tokio::time::sleep(self.config.delay).await;
    }
  }
}

/// Operator choices for a run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
  /// Runtime tags.
  pub tags: TagSet,
  /// Entry names to run. Empty runs every selected entry.
  pub names: TagSet,
  /// Overrides the configured delay.
  pub delay: Option<std::time::Duration>,
}

/// What a run would do: the selected adapters and entries.
#[derive(Debug, Clone)]
pub struct Plan<'c> {
  pub platform: Platform,
  pub system: System<'c>,
  pub entries: Vec<&'c Entry>,
}

impl<'c> Plan<'c> {
  /// Each selected entry with the invocation it would run.
  pub fn invocations(&self) -> impl Iterator<Item = (&'c Entry, Invocation)> + '_ {
    self
      .entries
      .iter()
      .map(|entry| (*entry, entry.build_command(&self.system)))
  }
}

/// Select adapters and entries for `platform` without running anything.
pub fn plan<'c>(config: &'c Config, platform: Platform, options: &RunOptions) -> Result<Plan<'c>, RunError> {
  let filterer = Filterer::new(platform)
    .with_tags(options.tags.clone())
    .with_names(options.names.clone());

  let system = filterer.select_system(&config.package_managers, &config.shells)?;
  let entries = filterer.select_entries(&config.groups);
  check_unique_names(&entries)?;

  Ok(Plan {
    platform,
    system,
    entries,
  })
}

/// Select and run entries from `config`.
///
/// Returns the final state when every entry reached a terminal status, or
/// the first error that stopped the run.
pub async fn run<'c, R, O>(
  config: &'c Config,
  platform: Platform,
  options: &RunOptions,
  runner: R,
  observer: &mut O,
) -> Result<RunState<'c>, RunError>
where
  R: ProcessRunner,
  O: ProgressObserver + ?Sized,
{
  let plan = plan(config, platform, options)?;
  info!(
    platform = %platform,
    tags = %options.tags,
    package_manager = %plan.system.package_manager.script,
    shell = %plan.system.shell.cmd,
    "selected system"
  );

  let execute_config = ExecuteConfig {
    delay: options.delay.unwrap_or(config.delay),
  };
  let engine = Engine::new(plan.system, runner, execute_config);
  engine.execute(plan.entries, observer).await
}
