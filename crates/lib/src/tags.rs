//! Tag labels attached to adapters, entries, and the runtime selection.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Case-sensitive, deduplicated set of labels.
///
/// Backed by a `BTreeSet` so iteration and serialized output are stable, but
/// equality is plain membership equality.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagSet(BTreeSet<String>);

impl TagSet {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn contains(&self, label: &str) -> bool {
    self.0.contains(label)
  }

  /// True when every label of `other` is in `self` (`other ⊆ self`).
  pub fn contains_all_of(&self, other: &TagSet) -> bool {
    other.0.is_subset(&self.0)
  }

  /// True when `self` and `other` share at least one label.
  pub fn contains_any_of(&self, other: &TagSet) -> bool {
    !self.0.is_disjoint(&other.0)
  }

  pub fn union(&self, other: &TagSet) -> TagSet {
    TagSet(self.0.union(&other.0).cloned().collect())
  }

  pub fn insert(&mut self, label: impl Into<String>) -> bool {
    self.0.insert(label.into())
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = &str> {
    self.0.iter().map(String::as_str)
  }
}

impl<S: Into<String>> FromIterator<S> for TagSet {
  fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
    TagSet(iter.into_iter().map(Into::into).collect())
  }
}

impl<S: Into<String>, const N: usize> From<[S; N]> for TagSet {
  fn from(labels: [S; N]) -> Self {
    labels.into_iter().collect()
  }
}

impl std::fmt::Display for TagSet {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let labels: Vec<&str> = self.iter().collect();
    write!(f, "[{}]", labels.join(", "))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn duplicates_collapse() {
    let tags = TagSet::from(["work", "work", "home"]);
    assert_eq!(tags.len(), 2);
  }

  #[test]
  fn labels_are_case_sensitive() {
    let tags = TagSet::from(["Work"]);
    assert!(tags.contains("Work"));
    assert!(!tags.contains("work"));
  }

  #[test]
  fn subset_and_intersection() {
    let runtime = TagSet::from(["work", "laptop"]);

    assert!(runtime.contains_all_of(&TagSet::from(["work"])));
    assert!(runtime.contains_all_of(&TagSet::new()));
    assert!(!runtime.contains_all_of(&TagSet::from(["work", "server"])));

    assert!(runtime.contains_any_of(&TagSet::from(["server", "laptop"])));
    assert!(!runtime.contains_any_of(&TagSet::from(["server"])));
    assert!(!runtime.contains_any_of(&TagSet::new()));
  }

  #[test]
  fn union_and_equality_ignore_order() {
    let a = TagSet::from(["b", "a"]);
    let b = TagSet::from(["c"]);
    assert_eq!(a.union(&b), TagSet::from(["c", "a", "b"]));
    assert_eq!(a.to_string(), "[a, b]");
  }
}
