use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::PlatformError;

/// Operating systems an adapter or entry can target.
///
/// `Any` is the wildcard used by items that run everywhere; it is never
/// returned by [`Os::current`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Os {
  #[default]
  Any,
  Linux,
  Darwin,
  Windows,
  FreeBsd,
  NetBsd,
  OpenBsd,
  DragonFly,
  Solaris,
  Illumos,
  Android,
  Ios,
}

impl Os {
  /// Detect the current operating system at runtime
  pub fn current() -> Option<Self> {
    match std::env::consts::OS {
      "linux" => Some(Self::Linux),
      "macos" => Some(Self::Darwin),
      "windows" => Some(Self::Windows),
      "freebsd" => Some(Self::FreeBsd),
      "netbsd" => Some(Self::NetBsd),
      "openbsd" => Some(Self::OpenBsd),
      "dragonfly" => Some(Self::DragonFly),
      "solaris" => Some(Self::Solaris),
      "illumos" => Some(Self::Illumos),
      "android" => Some(Self::Android),
      "ios" => Some(Self::Ios),
      _ => None,
    }
  }

  /// Returns the lowercase string identifier for this OS
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Any => "any",
      Self::Linux => "linux",
      Self::Darwin => "darwin",
      Self::Windows => "windows",
      Self::FreeBsd => "freebsd",
      Self::NetBsd => "netbsd",
      Self::OpenBsd => "openbsd",
      Self::DragonFly => "dragonfly",
      Self::Solaris => "solaris",
      Self::Illumos => "illumos",
      Self::Android => "android",
      Self::Ios => "ios",
    }
  }

  /// True when a descriptor with this OS accepts the `runtime` OS.
  pub fn accepts(&self, runtime: Os) -> bool {
    *self == Self::Any || *self == runtime
  }
}

impl fmt::Display for Os {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl FromStr for Os {
  type Err = PlatformError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "any" => Ok(Self::Any),
      "linux" => Ok(Self::Linux),
      "darwin" | "macos" => Ok(Self::Darwin),
      "windows" => Ok(Self::Windows),
      "freebsd" => Ok(Self::FreeBsd),
      "netbsd" => Ok(Self::NetBsd),
      "openbsd" => Ok(Self::OpenBsd),
      "dragonfly" => Ok(Self::DragonFly),
      "solaris" => Ok(Self::Solaris),
      "illumos" => Ok(Self::Illumos),
      "android" => Ok(Self::Android),
      "ios" => Ok(Self::Ios),
      _ => Err(PlatformError::UnknownOs(s.to_string())),
    }
  }
}

impl TryFrom<String> for Os {
  type Error = PlatformError;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    value.parse()
  }
}

impl From<Os> for String {
  fn from(os: Os) -> Self {
    os.as_str().to_string()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn current_is_never_any() {
    assert_ne!(Os::current(), Some(Os::Any));
  }

  #[test]
  fn macos_uses_darwin_identifier() {
    assert_eq!(Os::Darwin.as_str(), "darwin");
    assert_eq!("macOS".parse::<Os>().unwrap(), Os::Darwin);
  }

  #[test]
  fn parse_is_case_insensitive() {
    assert_eq!("Linux".parse::<Os>().unwrap(), Os::Linux);
    assert_eq!("WINDOWS".parse::<Os>().unwrap(), Os::Windows);
    assert!("beos".parse::<Os>().is_err());
  }

  #[test]
  fn any_accepts_everything() {
    assert!(Os::Any.accepts(Os::Linux));
    assert!(Os::Linux.accepts(Os::Linux));
    assert!(!Os::Windows.accepts(Os::Linux));
  }
}
