//! Run state and error types for entry execution.

use std::borrow::Cow;
use std::fmt;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use super::process::ProcessError;
use crate::config::ConfigError;
use crate::entry::Entry;
use crate::filter::FilterError;

/// Errors that end a run early.
#[derive(Debug, Error)]
pub enum RunError {
  /// Configuration was rejected before anything ran.
  #[error(transparent)]
  Config(#[from] ConfigError),

  /// No usable package manager or shell for this platform.
  #[error(transparent)]
  Filter(#[from] FilterError),

  /// An entry failed with no retries left and without `continueOnError`.
  #[error("entry '{entry}' failed")]
  FatalExecution {
    entry: String,
    #[source]
    source: ProcessError,
  },
}

/// Lifecycle of an entry, and of a run as a whole.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
  #[default]
  Waiting,
  Running,
  Complete,
  Error,
}

impl Status {
  /// Terminal states. An entry waiting on a retry is back in `Waiting`.
  pub fn is_completed(self) -> bool {
    matches!(self, Status::Complete | Status::Error)
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Status::Waiting => "waiting",
      Status::Running => "running",
      Status::Complete => "complete",
      Status::Error => "error",
    }
  }
}

impl fmt::Display for Status {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// Per-entry record for one run.
#[derive(Debug, Clone)]
pub struct EntryState<'a> {
  pub entry: &'a Entry,
  pub status: Status,
  /// Attempts finished so far.
  pub tries: u32,
  /// Set while a failed attempt is queued for another try.
  pub retrying: bool,
  /// Output of the latest attempt.
  pub out: Vec<u8>,
}

impl<'a> EntryState<'a> {
  pub fn new(entry: &'a Entry) -> Self {
    Self {
      entry,
      status: Status::Waiting,
      tries: 0,
      retrying: false,
      out: Vec::new(),
    }
  }

  /// Output of the latest attempt, lossily decoded.
  pub fn output(&self) -> Cow<'_, str> {
    String::from_utf8_lossy(&self.out)
  }

  /// Failed, but the entry allows the run to continue.
  pub fn is_tolerated_error(&self) -> bool {
    self.status == Status::Error && self.entry.continue_on_error
  }

  /// Total attempts the entry may make.
  pub fn max_tries(&self) -> u32 {
    self.entry.retry.count.saturating_add(1)
  }
}

/// Aggregate state of a run, recalculated after every entry transition.
#[derive(Debug, Clone)]
pub struct RunState<'a> {
  pub status: Status,
  /// Entries that ended in `Error`, tolerated or not.
  pub errored_count: usize,
  pub entries: Vec<EntryState<'a>>,
}

impl<'a> RunState<'a> {
  pub fn new(entries: impl IntoIterator<Item = &'a Entry>) -> Self {
    let mut state = Self {
      status: Status::Waiting,
      errored_count: 0,
      entries: entries.into_iter().map(EntryState::new).collect(),
    };
    state.recalculate();
    state
  }

  /// Recompute `status` and `errored_count` from the entry states.
  ///
  /// Precedence: an untolerated error makes the run `Error`; otherwise the run
  /// is `Complete` once every entry is terminal, `Running` while any entry is
  /// running, and `Waiting` before that. An empty run is `Complete`.
  pub fn recalculate(&mut self) {
    let mut running = false;
    let mut failed = false;
    let mut completed = 0;
    let mut errored = 0;

    for state in &self.entries {
      match state.status {
        Status::Running => running = true,
        Status::Complete => completed += 1,
        Status::Error => {
          errored += 1;
          completed += 1;
          if !state.entry.continue_on_error {
            failed = true;
          }
        }
        Status::Waiting => {}
      }
    }

    self.errored_count = errored;
    self.status = if failed {
      Status::Error
    } else if completed >= self.entries.len() {
      Status::Complete
    } else if running {
      Status::Running
    } else {
      Status::Waiting
    };
  }

  pub fn completed_count(&self) -> usize {
    self.entries.iter().filter(|s| s.status.is_completed()).count()
  }

  pub fn entry(&self, name: &str) -> Option<&EntryState<'a>> {
    self.entries.iter().find(|s| s.entry.name == name)
  }
}

/// Configuration for entry execution.
#[derive(Debug, Clone, Default)]
pub struct ExecuteConfig {
  /// Fixed pause before and after every attempt.
  pub delay: Duration,
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::entry::{Commander, ScriptRun};

  fn entry(name: &str, continue_on_error: bool) -> Entry {
    let mut entry = Entry::new(
      name,
      Commander::Script(ScriptRun {
        script: "true".to_string(),
      }),
    );
    entry.continue_on_error = continue_on_error;
    entry
  }

  fn state_with<'a>(entries: &'a [Entry], statuses: &[Status]) -> RunState<'a> {
    let mut state = RunState::new(entries);
    for (s, status) in state.entries.iter_mut().zip(statuses) {
      s.status = *status;
    }
    state.recalculate();
    state
  }

  #[test]
  fn empty_run_is_complete() {
    let state = RunState::new(Vec::<&Entry>::new());
    assert_eq!(state.status, Status::Complete);
    assert_eq!(state.errored_count, 0);
  }

  #[test]
  fn fresh_run_is_waiting() {
    let entries = vec![entry("a", false), entry("b", false)];
    let state = RunState::new(&entries);
    assert_eq!(state.status, Status::Waiting);
  }

  #[test]
  fn running_entry_makes_run_running() {
    let entries = vec![entry("a", false), entry("b", false)];
    let state = state_with(&entries, &[Status::Complete, Status::Running]);
    assert_eq!(state.status, Status::Running);
  }

  #[test]
  fn tolerated_error_still_completes() {
    let entries = vec![entry("a", true), entry("b", false)];
    let state = state_with(&entries, &[Status::Error, Status::Complete]);

    assert_eq!(state.status, Status::Complete);
    assert_eq!(state.errored_count, 1);
    assert!(state.entries[0].is_tolerated_error());
  }

  #[test]
  fn untolerated_error_fails_run_immediately() {
    let entries = vec![entry("a", false), entry("b", false)];
    let state = state_with(&entries, &[Status::Error, Status::Waiting]);

    assert_eq!(state.status, Status::Error);
    assert!(state.status.is_completed());
  }

  #[test]
  fn recalculate_ignores_entry_order() {
    let entries = vec![entry("a", true), entry("b", false), entry("c", false)];
    let statuses = [Status::Error, Status::Running, Status::Complete];
    let forward = state_with(&entries, &statuses);

    let reversed_entries: Vec<Entry> = entries.iter().rev().cloned().collect();
    let reversed_statuses: Vec<Status> = statuses.iter().rev().copied().collect();
    let mut backward = state_with(&reversed_entries, &reversed_statuses);

    assert_eq!(forward.status, backward.status);
    assert_eq!(forward.errored_count, backward.errored_count);

    // idempotent
    backward.recalculate();
    assert_eq!(forward.status, backward.status);
    assert_eq!(forward.errored_count, backward.errored_count);
  }

  #[test]
  fn status_terminal_states() {
    assert!(!Status::Waiting.is_completed());
    assert!(!Status::Running.is_completed());
    assert!(Status::Complete.is_completed());
    assert!(Status::Error.is_completed());
  }
}
