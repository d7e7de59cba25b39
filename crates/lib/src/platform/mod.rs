pub mod arch;
pub mod os;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use arch::Arch;
pub use os::Os;

/// Errors produced while detecting or parsing platforms.
#[derive(Debug, Error)]
pub enum PlatformError {
  #[error("unsupported platform: os '{os}', arch '{arch}'")]
  Unsupported { os: String, arch: String },

  #[error("unknown os: {0}")]
  UnknownOs(String),

  #[error("unknown arch: {0}")]
  UnknownArch(String),
}

/// An `(os, arch)` pair.
///
/// Used both as the detected runtime platform and as the target descriptor of
/// adapters and entries, where either field may be the `Any` wildcard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Platform {
  pub os: Os,
  pub arch: Arch,
}

impl Platform {
  /// Create a new platform identifier
  pub fn new(os: Os, arch: Arch) -> Self {
    Self { os, arch }
  }

  /// The wildcard descriptor that matches every runtime.
  pub fn any() -> Self {
    Self::default()
  }

  /// Detect the current platform at runtime
  ///
  /// Computed once by the caller and handed to the filter, so nothing below
  /// this point inspects the host directly.
  pub fn current() -> Result<Self, PlatformError> {
    match (Os::current(), Arch::current()) {
      (Some(os), Some(arch)) => Ok(Self { os, arch }),
      _ => Err(PlatformError::Unsupported {
        os: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
      }),
    }
  }

  /// True when this descriptor accepts the `runtime` platform.
  pub fn matches(&self, runtime: &Platform) -> bool {
    self.os.accepts(runtime.os) && self.arch.accepts(runtime.arch)
  }

  /// Returns the platform triple string (e.g., "aarch64-darwin")
  pub fn triple(&self) -> String {
    format!("{}-{}", self.arch, self.os)
  }
}

impl fmt::Display for Platform {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.triple())
  }
}
