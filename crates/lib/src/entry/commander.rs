//! Turning an entry's declared intent into a process invocation.

use serde::{Deserialize, Serialize};

use super::EntryKind;
use crate::system::{Invocation, System};

/// Per-kind strategy for building an entry's invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Commander {
  Package(PackageInstall),
  Script(ScriptRun),
  Command(RawCommand),
  Git(GitClone),
}

impl Commander {
  pub fn kind(&self) -> EntryKind {
    match self {
      Self::Package(_) => EntryKind::Package,
      Self::Script(_) => EntryKind::Script,
      Self::Command(_) => EntryKind::Command,
      Self::Git(_) => EntryKind::Git,
    }
  }

  pub fn build_command(&self, system: &System<'_>) -> Invocation {
    match self {
      Self::Package(package) => system.package_manager.build_command(system.shell, &package.packages),
      Self::Script(script) => system.shell.build_command(&script.script),
      Self::Command(command) => Invocation::new(command.cmd.clone(), command.args.clone()),
      Self::Git(git) => system.shell.build_command(&git.script()),
    }
  }
}

/// Install packages with the selected package manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageInstall {
  pub packages: Vec<String>,
}

/// Run a script body through the selected shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptRun {
  pub script: String,
}

/// Run a program directly, without a shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawCommand {
  pub cmd: String,
  pub args: Vec<String>,
}

/// What to do with an existing destination before cloning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GitCleanup {
  #[default]
  Remove,
  Nothing,
}

/// Clone a git repository through the selected shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GitClone {
  /// `owner/name` shorthand for GitHub, or a full `https://` URL.
  pub repo: String,
  pub dest: String,
  /// Clone depth; values below 1 clone the full history.
  pub depth: i64,
  pub cleanup: GitCleanup,
}

impl GitClone {
  pub fn new(repo: impl Into<String>, dest: impl Into<String>) -> Self {
    Self {
      repo: repo.into(),
      dest: dest.into(),
      depth: 1,
      cleanup: GitCleanup::default(),
    }
  }

  /// Full clone URL for `repo`.
  pub fn url(&self) -> String {
    let mut url = self.repo.clone();
    if !url.to_ascii_lowercase().starts_with("https://") {
      url = format!("https://github.com/{}", url);
    }
    if !url.to_ascii_lowercase().ends_with(".git") {
      url.push_str(".git");
    }
    url
  }

  /// Shell script performing the clone.
  pub fn script(&self) -> String {
    let depth = if self.depth < 1 {
      String::new()
    } else {
      format!(" --depth={}", self.depth)
    };

    let dest = self.quoted_dest();
    let clone = format!("git clone{} {} {}", depth, quote(&self.url()), dest);

    match self.cleanup {
      GitCleanup::Remove => format!("rm -rf {}; {}", dest, clone),
      GitCleanup::Nothing => clone,
    }
  }

  /// `dest` as a single shell word. A leading `~/` stays bare so the shell expands it.
  fn quoted_dest(&self) -> String {
    if self.dest == "~" {
      return self.dest.clone();
    }
    match self.dest.strip_prefix("~/") {
      Some(rest) => format!("~/{}", quote(rest)),
      None => quote(&self.dest),
    }
  }
}

/// POSIX shell quoting; strings that need no quoting pass through unchanged.
fn quote(word: &str) -> String {
  shlex::try_quote(word).map_or_else(|_| word.to_string(), |quoted| quoted.into_owned())
}
