//! System adapters: the package manager and shell that entries are run through.
//!
//! Both kinds are declared in configuration with a platform descriptor and tags,
//! and exactly one of each is selected for a run by the filter.

use std::fmt;

use serde::Serialize;

use crate::filter::{Filterable, SystemAdapter};
use crate::platform::{Os, Platform};
use crate::tags::TagSet;

/// A concrete process invocation: program plus argument list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invocation {
  pub program: String,
  pub args: Vec<String>,
}

impl Invocation {
  pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
    Self {
      program: program.into(),
      args,
    }
  }
}

impl fmt::Display for Invocation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.program)?;
    for arg in &self.args {
      if arg.is_empty() || arg.contains(char::is_whitespace) {
        write!(f, " {:?}", arg)?;
      } else {
        write!(f, " {}", arg)?;
      }
    }
    Ok(())
  }
}

/// Package manager adapter.
///
/// `script` is the install command prefix, e.g. `sudo apt-get install -y`;
/// package names are appended and the result runs through the shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageManager {
  pub platform: Platform,
  pub tags: TagSet,
  pub required_tags: TagSet,
  pub script: String,
}

impl PackageManager {
  pub fn new(script: impl Into<String>) -> Self {
    Self {
      platform: Platform::any(),
      tags: TagSet::new(),
      required_tags: TagSet::new(),
      script: script.into(),
    }
  }

  /// Build the shell invocation that installs `packages`.
  pub fn build_command(&self, shell: &Shell, packages: &[String]) -> Invocation {
    let mut parts = Vec::with_capacity(packages.len() + 1);
    parts.push(self.script.as_str());
    parts.extend(packages.iter().map(String::as_str));

    shell.build_command(&parts.join(" "))
  }
}

/// Shell adapter: a program plus the fixed leading arguments that make it
/// execute the script passed as the final argument (`bash -c <script>`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Shell {
  pub platform: Platform,
  pub tags: TagSet,
  pub required_tags: TagSet,
  pub cmd: String,
  pub args: Vec<String>,
}

impl Shell {
  pub fn new(cmd: impl Into<String>, args: Vec<String>) -> Self {
    Self {
      platform: Platform::any(),
      tags: TagSet::new(),
      required_tags: TagSet::new(),
      cmd: cmd.into(),
      args,
    }
  }

  /// Shells used when the configuration declares none.
  ///
  /// Listed most-specific first: PowerShell on Windows, `/bin/sh` elsewhere.
  pub fn builtin() -> Vec<Shell> {
    let mut powershell = Shell::new(
      "powershell.exe",
      vec![
        "-NoProfile".to_string(),
        "-ExecutionPolicy".to_string(),
        "Bypass".to_string(),
        "-Command".to_string(),
      ],
    );
    powershell.platform.os = Os::Windows;

    vec![powershell, Shell::new("/bin/sh", vec!["-c".to_string()])]
  }

  /// Wrap `script` into an invocation of this shell.
  pub fn build_command(&self, script: &str) -> Invocation {
    let mut args = Vec::with_capacity(self.args.len() + 1);
    args.extend(self.args.iter().cloned());
    args.push(script.to_string());

    Invocation::new(self.cmd.clone(), args)
  }
}

/// The adapters selected for a run.
#[derive(Debug, Clone, Copy)]
pub struct System<'a> {
  pub package_manager: &'a PackageManager,
  pub shell: &'a Shell,
}

impl Filterable for PackageManager {
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

impl SystemAdapter for PackageManager {
  const KIND: &'static str = "package manager";
}

impl Filterable for Shell {
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

impl SystemAdapter for Shell {
  const KIND: &'static str = "shell";
}
