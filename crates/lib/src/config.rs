//! YAML configuration: system adapter candidates and setup entry groups.
//!
//! ```yaml
//! delay: 250
//! packageManagers:
//!   - os: darwin
//!     script: brew install
//!   - os: linux
//!     script: sudo apt-get install -y
//! shells:
//!   - cmd: /bin/bash
//!     args: [-c]
//! setup:
//!   - git                       # package entry named after the package
//!   - name: rust
//!     cmd: rustup
//!     args: [default, stable]
//!   - tags: [work!]             # defaults for every entry below
//!     continueOnError: true
//!     entries:
//!       - jq
//!       - name: dotfiles
//!         repo: me/dotfiles
//!         dest: ~/.dotfiles
//!   - name: node                # variants of one entry, the best match runs
//!     entries:
//!       - os: darwin
//!         packages: [node]
//!       - packages: [nodejs]
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::entry::{
  Commander, Entry, EntryGroup, EntryKind, GitCleanup, GitClone, PackageInstall, RawCommand, RetryBehavior,
  RetryPolicy, ScriptRun,
};
use crate::platform::{Arch, Os, Platform};
use crate::system::{PackageManager, Shell};
use crate::tags::TagSet;

/// Suffix marking a tag as required.
const REQUIRED_MARKER: char = '!';

/// Errors produced while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read config {}: {source}", path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid config: {0}")]
  Parse(#[from] serde_yaml::Error),

  #[error("setup entry {entry} is missing required field '{field}'")]
  MissingField { entry: String, field: &'static str },

  #[error("setup entry '{entry}' has an empty '{field}'")]
  EmptyField { entry: String, field: &'static str },

  #[error("cannot infer the type of setup entry '{0}'")]
  UnknownType(String),

  #[error("invalid tag '{0}'")]
  InvalidTag(String),

  #[error("setup group {0} cannot contain nested groups")]
  NestedGroup(String),

  #[error("setup entry '{0}' is selected more than once")]
  DuplicateEntry(String),
}

/// Fully parsed configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
  /// Pause before and after every attempt.
  pub delay: Duration,
  /// Package manager candidates, most specific first.
  pub package_managers: Vec<PackageManager>,
  /// Shell candidates, most specific first. [`Shell::builtin`] when none are declared.
  pub shells: Vec<Shell>,
  pub groups: Vec<EntryGroup>,
}

impl Config {
  /// Config file looked up in the working directory.
  pub const DEFAULT_FILE: &'static str = ".rigup.yaml";

  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;

    let config: Config = contents.parse()?;
    debug!(
      path = %path.display(),
      package_managers = config.package_managers.len(),
      shells = config.shells.len(),
      groups = config.groups.len(),
      "loaded config"
    );
    Ok(config)
  }

  /// All declared entries, in group order.
  pub fn entries(&self) -> impl Iterator<Item = &Entry> {
    self.groups.iter().flat_map(|group| group.entries.iter())
  }

  /// True when any group declares an entry called `name`, on any platform.
  pub fn declares(&self, name: &str) -> bool {
    self.entries().any(|entry| entry.name == name)
  }
}

impl FromStr for Config {
  type Err = ConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let raw: RawConfig = serde_yaml::from_str(s)?;

    let shells = match raw.shells {
      Some(shells) => shells.into_iter().map(Shell::try_from).collect::<Result<_, _>>()?,
      None => Shell::builtin(),
    };

    let package_managers = raw
      .package_managers
      .into_iter()
      .map(PackageManager::try_from)
      .collect::<Result<_, _>>()?;

    let groups = raw
      .setup
      .into_iter()
      .enumerate()
      .map(|(index, value)| parse_group(index, value))
      .collect::<Result<_, _>>()?;

    Ok(Config {
      delay: Duration::from_millis(raw.delay),
      package_managers,
      shells,
      groups,
    })
  }
}

/// Reject entries sharing a name within one run.
pub fn check_unique_names(entries: &[&Entry]) -> Result<(), ConfigError> {
  let mut seen = TagSet::new();
  for entry in entries {
    if !seen.insert(entry.name.as_str()) {
      return Err(ConfigError::DuplicateEntry(entry.name.clone()));
    }
  }
  Ok(())
}

/// Split `labels` into `(tags, required_tags)`.
///
/// A trailing `!` marks a required tag; it is added to both sets without the marker.
pub fn parse_tags(labels: &[String]) -> Result<(TagSet, TagSet), ConfigError> {
  let mut tags = TagSet::new();
  let mut required = TagSet::new();

  for label in labels {
    let (name, is_required) = match label.strip_suffix(REQUIRED_MARKER) {
      Some(name) => (name, true),
      None => (label.as_str(), false),
    };

    if name.trim().is_empty() || name.ends_with(REQUIRED_MARKER) {
      return Err(ConfigError::InvalidTag(label.clone()));
    }

    tags.insert(name);
    if is_required {
      required.insert(name);
    }
  }

  Ok((tags, required))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawConfig {
  #[serde(default)]
  delay: u64,
  #[serde(default)]
  package_managers: Vec<RawPackageManager>,
  #[serde(default, alias = "scripts")]
  shells: Option<Vec<RawShell>>,
  #[serde(default)]
  setup: Vec<serde_yaml::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPackageManager {
  #[serde(default)]
  os: Os,
  #[serde(default)]
  arch: Arch,
  #[serde(default)]
  tags: Vec<String>,
  script: String,
}

impl TryFrom<RawPackageManager> for PackageManager {
  type Error = ConfigError;

  fn try_from(raw: RawPackageManager) -> Result<Self, Self::Error> {
    let (tags, required_tags) = parse_tags(&raw.tags)?;
    Ok(PackageManager {
      platform: Platform::new(raw.os, raw.arch),
      tags,
      required_tags,
      script: raw.script,
    })
  }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawShell {
  #[serde(default)]
  os: Os,
  #[serde(default)]
  arch: Arch,
  #[serde(default)]
  tags: Vec<String>,
  cmd: String,
  #[serde(default)]
  args: Vec<String>,
}

impl TryFrom<RawShell> for Shell {
  type Error = ConfigError;

  fn try_from(raw: RawShell) -> Result<Self, Self::Error> {
    let (tags, required_tags) = parse_tags(&raw.tags)?;
    Ok(Shell {
      platform: Platform::new(raw.os, raw.arch),
      tags,
      required_tags,
      cmd: raw.cmd,
      args: raw.args,
    })
  }
}

/// `retry: 3` or `retry: { count: 3, behavior: AT_END }`.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
enum RawRetry {
  Count(u32),
  Policy(RetryFields),
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RetryFields {
  count: Option<u32>,
  behavior: Option<RetryBehavior>,
}

impl From<RawRetry> for RetryFields {
  fn from(raw: RawRetry) -> Self {
    match raw {
      RawRetry::Count(count) => RetryFields {
        count: Some(count),
        behavior: None,
      },
      RawRetry::Policy(fields) => fields,
    }
  }
}

/// One map under `setup`, either an entry or a group carrying `entries`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawEntry {
  name: Option<String>,
  #[serde(rename = "type")]
  kind: Option<EntryKind>,
  os: Option<Os>,
  arch: Option<Arch>,
  tags: Option<Vec<String>>,
  continue_on_error: Option<bool>,
  retry: Option<RawRetry>,
  packages: Option<Vec<String>>,
  script: Option<String>,
  cmd: Option<String>,
  args: Option<Vec<String>>,
  repo: Option<String>,
  dest: Option<String>,
  depth: Option<i64>,
  cleanup: Option<GitCleanup>,
  entries: Option<Vec<serde_yaml::Value>>,
}

impl RawEntry {
  fn package(name: String) -> Self {
    RawEntry {
      name: Some(name.clone()),
      kind: Some(EntryKind::Package),
      packages: Some(vec![name]),
      ..Default::default()
    }
  }

  /// Fill shared keys this entry leaves unset from its group.
  ///
  /// Payload fields are never inherited. Retry fields are merged individually.
  fn inherit(mut self, group: &RawEntry) -> Self {
    if self.name.is_none() {
      self.name.clone_from(&group.name);
    }
    self.kind = self.kind.or(group.kind);
    self.os = self.os.or(group.os);
    self.arch = self.arch.or(group.arch);
    if self.tags.is_none() {
      self.tags.clone_from(&group.tags);
    }
    self.continue_on_error = self.continue_on_error.or(group.continue_on_error);
    self.depth = self.depth.or(group.depth);
    self.cleanup = self.cleanup.or(group.cleanup);

    if let Some(group_retry) = group.retry.map(RetryFields::from) {
      let own = self.retry.map(RetryFields::from).unwrap_or_default();
      self.retry = Some(RawRetry::Policy(RetryFields {
        count: own.count.or(group_retry.count),
        behavior: own.behavior.or(group_retry.behavior),
      }));
    }

    self
  }

  fn infer_kind(&self) -> Option<EntryKind> {
    if self.kind.is_some() {
      self.kind
    } else if self.packages.is_some() {
      Some(EntryKind::Package)
    } else if self.script.is_some() {
      Some(EntryKind::Script)
    } else if self.cmd.is_some() {
      Some(EntryKind::Command)
    } else if self.repo.is_some() {
      Some(EntryKind::Git)
    } else {
      None
    }
  }

  fn into_entry(self, location: &str) -> Result<Entry, ConfigError> {
    let name = self.name.clone().ok_or_else(|| ConfigError::MissingField {
      entry: location.to_string(),
      field: "name",
    })?;
    let kind = self.infer_kind().ok_or_else(|| ConfigError::UnknownType(name.clone()))?;
    let missing = |field: &'static str| ConfigError::MissingField {
      entry: format!("'{}'", name),
      field,
    };

    let commander = match kind {
      EntryKind::Package => Commander::Package(PackageInstall {
        packages: self.packages.filter(|p| !p.is_empty()).ok_or_else(|| missing("packages"))?,
      }),
      EntryKind::Script => Commander::Script(ScriptRun {
        script: self.script.ok_or_else(|| missing("script"))?,
      }),
      EntryKind::Command => Commander::Command(RawCommand {
        cmd: self.cmd.ok_or_else(|| missing("cmd"))?,
        args: self.args.unwrap_or_default(),
      }),
      EntryKind::Git => Commander::Git(GitClone {
        repo: self.repo.ok_or_else(|| missing("repo"))?,
        dest: match self.dest {
          Some(dest) if dest.trim().is_empty() => {
            return Err(ConfigError::EmptyField {
              entry: name.clone(),
              field: "dest",
            });
          }
          dest => dest.ok_or_else(|| missing("dest"))?,
        },
        depth: self.depth.unwrap_or(1),
        cleanup: self.cleanup.unwrap_or_default(),
      }),
    };

    let (tags, required_tags) = parse_tags(self.tags.as_deref().unwrap_or_default())?;
    let retry = self.retry.map(RetryFields::from).unwrap_or_default();

    Ok(Entry {
      name,
      platform: Platform::new(self.os.unwrap_or_default(), self.arch.unwrap_or_default()),
      tags,
      required_tags,
      continue_on_error: self.continue_on_error.unwrap_or(false),
      retry: RetryPolicy {
        count: retry.count.unwrap_or(0),
        behavior: retry.behavior.unwrap_or_default(),
      },
      commander,
    })
  }
}

fn parse_group(index: usize, value: serde_yaml::Value) -> Result<EntryGroup, ConfigError> {
  let location = format!("setup[{}]", index);

  let mut raw = match value {
    serde_yaml::Value::String(name) => {
      let entry = RawEntry::package(name).into_entry(&location)?;
      return Ok(EntryGroup::new(vec![entry]));
    }
    value => serde_yaml::from_value::<RawEntry>(value)?,
  };

  let Some(items) = raw.entries.take() else {
    return Ok(EntryGroup::new(vec![raw.into_entry(&location)?]));
  };

  let entries = items
    .into_iter()
    .enumerate()
    .map(|(item_index, item)| {
      let item_location = format!("{}.entries[{}]", location, item_index);
      let item = match item {
        serde_yaml::Value::String(name) => RawEntry::package(name),
        value => serde_yaml::from_value::<RawEntry>(value)?,
      };
      if item.entries.is_some() {
        return Err(ConfigError::NestedGroup(item_location));
      }
      item.inherit(&raw).into_entry(&item_location)
    })
    .collect::<Result<_, _>>()?;

  Ok(EntryGroup::new(entries))
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  fn parse(yaml: &str) -> Config {
    yaml.parse().unwrap()
  }

  fn entries(config: &Config) -> Vec<&Entry> {
    config.entries().collect()
  }

  #[test]
  fn bare_string_is_package_entry() {
    let config = parse("setup:\n  - git\n");
    let entry = entries(&config)[0];

    assert_eq!(entry.name, "git");
    assert_eq!(
      entry.commander,
      Commander::Package(PackageInstall {
        packages: vec!["git".to_string()]
      })
    );
    assert_eq!(entry.platform, Platform::any());
  }

  #[test]
  fn type_inference_priority() {
    let config = parse(
      r#"
setup:
  - name: both
    packages: [jq]
    script: echo ignored
  - name: script
    script: echo hi
    cmd: ignored
  - name: cmd
    cmd: rustup
    args: [default, stable]
  - name: repo
    repo: me/dots
    dest: /tmp/dots
  - name: explicit
    type: script
    packages: [jq]
    script: echo explicit
"#,
    );

    let kinds: Vec<EntryKind> = config.entries().map(Entry::kind).collect();
    assert_eq!(
      kinds,
      vec![
        EntryKind::Package,
        EntryKind::Script,
        EntryKind::Command,
        EntryKind::Git,
        EntryKind::Script
      ]
    );
  }

  #[test]
  fn required_tags_marked_with_bang() {
    let config = parse("setup:\n  - name: vpn\n    script: connect\n    tags: [work!, laptop]\n");
    let entry = entries(&config)[0];

    assert_eq!(entry.tags, TagSet::from(["work", "laptop"]));
    assert_eq!(entry.required_tags, TagSet::from(["work"]));
  }

  #[test]
  fn invalid_tags_rejected() {
    for label in ["!", "", "a!!"] {
      let err = parse_tags(&[label.to_string()]).unwrap_err();
      assert!(matches!(err, ConfigError::InvalidTag(_)), "{:?} accepted", label);
    }
  }

  #[test]
  fn retry_accepts_count_or_policy() {
    let config = parse(
      r#"
setup:
  - name: a
    script: "true"
    retry: 2
  - name: b
    script: "true"
    retry:
      count: 3
      behavior: AT_END
"#,
    );
    let all = entries(&config);

    assert_eq!(
      all[0].retry,
      RetryPolicy {
        count: 2,
        behavior: RetryBehavior::InPlace
      }
    );
    assert_eq!(
      all[1].retry,
      RetryPolicy {
        count: 3,
        behavior: RetryBehavior::AtEnd
      }
    );
  }

  #[test]
  fn group_defaults_fill_unset_keys() {
    let config = parse(
      r#"
setup:
  - os: darwin
    tags: [home]
    continueOnError: true
    retry: { count: 2, behavior: AT_END }
    entries:
      - jq
      - name: fd
        packages: [fd]
        tags: [work]
        retry: 5
"#,
    );
    let all = entries(&config);
    assert_eq!(config.groups.len(), 1);

    assert_eq!(all[0].platform.os, Os::Darwin);
    assert_eq!(all[0].tags, TagSet::from(["home"]));
    assert!(all[0].continue_on_error);
    assert_eq!(all[0].retry.count, 2);

    assert_eq!(all[1].tags, TagSet::from(["work"]));
    assert_eq!(
      all[1].retry,
      RetryPolicy {
        count: 5,
        behavior: RetryBehavior::AtEnd
      }
    );
  }

  #[test]
  fn group_name_shared_by_variants() {
    let config = parse(
      r#"
setup:
  - name: node
    entries:
      - os: linux
        packages: [nodejs]
      - packages: [node]
"#,
    );
    let all = entries(&config);

    assert_eq!(all.len(), 2);
    assert!(all.iter().all(|entry| entry.name == "node"));
    assert_eq!(all[0].platform.os, Os::Linux);
    assert_eq!(all[1].platform, Platform::any());
  }

  #[test]
  fn git_defaults() {
    let config = parse("setup:\n  - name: dots\n    repo: me/dots\n    dest: ~/.dots\n");
    let entry = config.entries().next().unwrap();
    let Commander::Git(git) = &entry.commander else {
      panic!("expected git entry");
    };

    assert_eq!(git.depth, 1);
    assert_eq!(git.cleanup, GitCleanup::Remove);
  }

  #[test]
  fn missing_fields_reported() {
    let err = "setup:\n  - script: echo\n".parse::<Config>().unwrap_err();
    assert!(matches!(err, ConfigError::MissingField { field: "name", .. }));

    let err = "setup:\n  - name: dots\n    repo: me/dots\n".parse::<Config>().unwrap_err();
    assert!(matches!(err, ConfigError::MissingField { field: "dest", .. }));

    for dest in ["\"\"", "\"  \""] {
      let yaml = format!("setup:\n  - name: dots\n    repo: me/dots\n    dest: {}\n", dest);
      let err = yaml.parse::<Config>().unwrap_err();
      assert!(matches!(err, ConfigError::EmptyField { field: "dest", .. }), "{} accepted", dest);
    }

    let err = "setup:\n  - name: nothing\n".parse::<Config>().unwrap_err();
    assert!(matches!(err, ConfigError::UnknownType(name) if name == "nothing"));
  }

  #[test]
  fn unknown_keys_and_platforms_rejected() {
    assert!(matches!(
      "setup:\n  - name: a\n    script: x\n    sript: y\n".parse::<Config>(),
      Err(ConfigError::Parse(_))
    ));
    assert!(matches!(
      "setup:\n  - name: a\n    script: x\n    os: beos\n".parse::<Config>(),
      Err(ConfigError::Parse(_))
    ));
  }

  #[test]
  fn nested_groups_rejected() {
    let err = "setup:\n  - entries:\n      - entries: [jq]\n".parse::<Config>().unwrap_err();
    assert!(matches!(err, ConfigError::NestedGroup(_)));
  }

  #[test]
  fn adapters_parse_and_shells_default() {
    let config = parse(
      r#"
delay: 150
packageManagers:
  - os: linux
    arch: amd64
    tags: [apt]
    script: sudo apt-get install -y
"#,
    );

    assert_eq!(config.delay, Duration::from_millis(150));
    let pm = &config.package_managers[0];
    assert_eq!(pm.platform, Platform::new(Os::Linux, Arch::X86_64));
    assert_eq!(pm.tags, TagSet::from(["apt"]));
    assert_eq!(config.shells, Shell::builtin());
  }

  #[test]
  fn scripts_is_an_alias_for_shells() {
    let config = parse("scripts:\n  - cmd: zsh\n    args: [-c]\n");
    assert_eq!(config.shells, vec![Shell::new("zsh", vec!["-c".to_string()])]);
  }

  #[test]
  fn duplicate_selected_names_rejected() {
    let config = parse("setup:\n  - git\n  - name: git\n    os: linux\n    packages: [git]\n");
    let all = entries(&config);

    assert!(check_unique_names(&all[..1]).is_ok());
    assert!(matches!(
      check_unique_names(&all),
      Err(ConfigError::DuplicateEntry(name)) if name == "git"
    ));
    assert!(config.declares("git"));
    assert!(!config.declares("hg"));
  }

  #[test]
  fn load_reads_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join(Config::DEFAULT_FILE);
    let mut file = fs::File::create(&path).unwrap();
    writeln!(file, "setup:\n  - git").unwrap();

    let config = Config::load(&path).unwrap();
    assert_eq!(entries(&config)[0].name, "git");

    let err = Config::load(&dir.path().join("missing.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
    assert!(err.to_string().contains("missing.yaml"));
  }
}
