//! Selection of system adapters and entries for the runtime platform and tags.
//!
//! Every candidate is classified into a [`Match`] level:
//! - incompatible: wrong platform, or a required tag missing from the runtime tags
//! - compatible: runs here, but did not match the requested tags
//! - tagged: runtime tags are empty, or they intersect the item's tags
//! - required-tagged: tagged, and the item declares at least one required tag
//!
//! Adapters fall back to the first compatible candidate when nothing matched
//! the tags; entries are dropped instead, so tags act as an opt-in for entries
//! and as a preference for adapters.

use thiserror::Error;
use tracing::debug;

use crate::entry::{Entry, EntryGroup};
use crate::platform::Platform;
use crate::system::{PackageManager, Shell, System};
use crate::tags::TagSet;

/// Anything that can be selected by platform and tags.
pub trait Filterable {
  fn platform(&self) -> Platform;
  fn tags(&self) -> &TagSet;
  fn required_tags(&self) -> &TagSet;
}

/// A filterable item of which exactly one is selected per run.
pub trait SystemAdapter: Filterable {
  /// Human readable kind, used in errors.
  const KIND: &'static str;
}

#[derive(Debug, Error)]
pub enum FilterError {
  #[error("no compatible {kind} found for platform {platform}")]
  NoCompatibleAdapter { kind: &'static str, platform: Platform },
}

/// How well a candidate matches the runtime. Ordered from worst to best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Match {
  Incompatible,
  Compatible,
  Tagged,
  RequiredTagged,
}

/// Whether merely compatible candidates may be selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
  Restrictive,
  NonRestrictive,
}

/// Candidates grouped by the best level they reached, in candidate order.
///
/// A required-tagged item is also tagged and compatible, so it appears in all
/// three lists.
#[derive(Debug)]
pub struct Buckets<'a, T> {
  pub compatible: Vec<&'a T>,
  pub tagged: Vec<&'a T>,
  pub required_tagged: Vec<&'a T>,
}

impl<'a, T> Buckets<'a, T> {
  /// The highest-priority candidate allowed by `mode`.
  pub fn first(&self, mode: Mode) -> Option<&'a T> {
    if let Some(item) = self.required_tagged.first() {
      return Some(*item);
    }
    if let Some(item) = self.tagged.first() {
      return Some(*item);
    }
    match mode {
      Mode::NonRestrictive => self.compatible.first().copied(),
      Mode::Restrictive => None,
    }
  }
}

/// Selects adapters and entries for one run.
#[derive(Debug, Clone)]
pub struct Filterer {
  platform: Platform,
  tags: TagSet,
  names: TagSet,
}

impl Filterer {
  pub fn new(platform: Platform) -> Self {
    Self {
      platform,
      tags: TagSet::new(),
      names: TagSet::new(),
    }
  }

  /// Runtime tags requested by the operator.
  pub fn with_tags(mut self, tags: TagSet) -> Self {
    self.tags = tags;
    self
  }

  /// Restrict entry selection to these names. Empty means no restriction.
  pub fn with_names(mut self, names: TagSet) -> Self {
    self.names = names;
    self
  }

  pub fn platform(&self) -> Platform {
    self.platform
  }

  pub fn tags(&self) -> &TagSet {
    &self.tags
  }

  /// Classify a single candidate.
  pub fn classify<T: Filterable + ?Sized>(&self, item: &T) -> Match {
    if !item.platform().matches(&self.platform) {
      return Match::Incompatible;
    }

    let required = item.required_tags();
    if !required.is_empty() && !self.tags.contains_all_of(required) {
      return Match::Incompatible;
    }

    let tags = item.tags();
    let tagged = self.tags.is_empty() || (!tags.is_empty() && self.tags.contains_any_of(tags));
    if !tagged {
      return Match::Compatible;
    }

    if required.is_empty() {
      Match::Tagged
    } else {
      Match::RequiredTagged
    }
  }

  /// Sort `items` into buckets in a single pass.
  pub fn buckets<'a, T: Filterable + 'a>(&self, items: impl IntoIterator<Item = &'a T>) -> Buckets<'a, T> {
    let mut buckets = Buckets {
      compatible: Vec::new(),
      tagged: Vec::new(),
      required_tagged: Vec::new(),
    };

    for item in items {
      let level = self.classify(item);
      if level >= Match::Compatible {
        buckets.compatible.push(item);
      }
      if level >= Match::Tagged {
        buckets.tagged.push(item);
      }
      if level == Match::RequiredTagged {
        buckets.required_tagged.push(item);
      }
    }

    buckets
  }

  /// Pick one item from `items` according to `mode`.
  pub fn select<'a, T: Filterable>(&self, items: &'a [T], mode: Mode) -> Option<&'a T> {
    self.buckets(items).first(mode)
  }

  /// Pick the adapter to use for this run, falling back to any compatible one.
  ///
  /// Callers list candidates most-specific first; no further ordering happens.
  pub fn select_system_adapter<'a, T: SystemAdapter>(&self, candidates: &'a [T]) -> Result<&'a T, FilterError> {
    let selected = self
      .select(candidates, Mode::NonRestrictive)
      .ok_or(FilterError::NoCompatibleAdapter {
        kind: T::KIND,
        platform: self.platform,
      })?;

    debug!(kind = T::KIND, platform = %self.platform, "selected system adapter");
    Ok(selected)
  }

  /// Pick the package manager and shell for this run.
  pub fn select_system<'a>(
    &self,
    package_managers: &'a [PackageManager],
    shells: &'a [Shell],
  ) -> Result<System<'a>, FilterError> {
    Ok(System {
      package_manager: self.select_system_adapter(package_managers)?,
      shell: self.select_system_adapter(shells)?,
    })
  }

  /// Flatten `groups` into the entries that take part in this run.
  ///
  /// Entries sharing a name within a group are variants of one item; at most
  /// one variant per name is kept, picked in restrictive mode. Names outside a
  /// non-empty name selection are dropped before any tag matching.
  pub fn select_entries<'a>(&self, groups: &'a [EntryGroup]) -> Vec<&'a Entry> {
    let restrict_names = !self.names.is_empty();
    let mut selected = Vec::new();

    for group in groups {
      for name in group.names() {
        if restrict_names && !self.names.contains(name) {
          continue;
        }

        let variants = group.variants(name);
        if let Some(entry) = self.buckets(variants).first(Mode::Restrictive) {
          selected.push(entry);
        }
      }
    }

    debug!(selected = selected.len(), tags = %self.tags, "selected entries");
    selected
  }
}
