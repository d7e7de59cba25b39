//! Setup entries: the declarative units of work a run executes.

pub mod commander;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::filter::Filterable;
use crate::platform::Platform;
use crate::system::{Invocation, System};
use crate::tags::TagSet;

pub use commander::{Commander, GitCleanup, GitClone, PackageInstall, RawCommand, ScriptRun};

/// The kind of work an entry declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
  Package,
  Script,
  Command,
  Git,
}

impl EntryKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Package => "package",
      Self::Script => "script",
      Self::Command => "command",
      Self::Git => "git",
    }
  }
}

impl fmt::Display for EntryKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// Where a failed attempt is retried.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RetryBehavior {
  /// Retry immediately, before any other entry runs.
  #[default]
  InPlace,
  /// Retry after the cursor has visited every other pending entry.
  AtEnd,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RetryPolicy {
  /// Additional attempts after the first failure.
  pub count: u32,
  pub behavior: RetryBehavior,
}

/// A single unit of setup work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
  pub name: String,
  pub platform: Platform,
  pub tags: TagSet,
  pub required_tags: TagSet,
  pub continue_on_error: bool,
  pub retry: RetryPolicy,
  pub commander: Commander,
}

impl Entry {
  /// Create an entry that runs everywhere, with no tags and no retries.
  pub fn new(name: impl Into<String>, commander: Commander) -> Self {
    Self {
      name: name.into(),
      platform: Platform::any(),
      tags: TagSet::new(),
      required_tags: TagSet::new(),
      continue_on_error: false,
      retry: RetryPolicy::default(),
      commander,
    }
  }

  pub fn kind(&self) -> EntryKind {
    self.commander.kind()
  }

  pub fn build_command(&self, system: &System<'_>) -> Invocation {
    self.commander.build_command(system)
  }
}

impl Filterable for Entry {
  fn platform(&self) -> Platform {
    self.platform
  }

  fn tags(&self) -> &TagSet {
    &self.tags
  }

  fn required_tags(&self) -> &TagSet {
    &self.required_tags
  }
}

/// Entries declared together in configuration, sharing defaults.
///
/// Entries with the same name are platform or tag variants of one item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EntryGroup {
  pub entries: Vec<Entry>,
}

impl EntryGroup {
  pub fn new(entries: Vec<Entry>) -> Self {
    Self { entries }
  }

  /// Distinct entry names, in declaration order.
  pub fn names(&self) -> Vec<&str> {
    let mut names: Vec<&str> = Vec::new();
    for entry in &self.entries {
      if !names.contains(&entry.name.as_str()) {
        names.push(&entry.name);
      }
    }
    names
  }

  /// Every variant declared under `name`, in declaration order.
  pub fn variants<'g>(&'g self, name: &'g str) -> impl Iterator<Item = &'g Entry> + 'g {
    self.entries.iter().filter(move |entry| entry.name == name)
  }
}
