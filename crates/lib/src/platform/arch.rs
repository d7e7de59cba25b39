use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::PlatformError;

/// CPU architectures an adapter or entry can target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Arch {
  #[default]
  Any,
  X86,
  X86_64,
  Arm,
  Aarch64,
  LoongArch64,
  Mips,
  Mips64,
  PowerPc,
  PowerPc64,
  Riscv64,
  S390x,
}

impl Arch {
  /// Detect the current CPU architecture at runtime
  pub fn current() -> Option<Self> {
    match std::env::consts::ARCH {
      "x86" => Some(Self::X86),
      "x86_64" => Some(Self::X86_64),
      "arm" => Some(Self::Arm),
      "aarch64" => Some(Self::Aarch64),
      "loongarch64" => Some(Self::LoongArch64),
      "mips" => Some(Self::Mips),
      "mips64" => Some(Self::Mips64),
      "powerpc" => Some(Self::PowerPc),
      "powerpc64" => Some(Self::PowerPc64),
      "riscv64" => Some(Self::Riscv64),
      "s390x" => Some(Self::S390x),
      _ => None,
    }
  }

  /// Returns the lowercase string identifier for this architecture
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Any => "any",
      Self::X86 => "x86",
      Self::X86_64 => "x86_64",
      Self::Arm => "arm",
      Self::Aarch64 => "aarch64",
      Self::LoongArch64 => "loongarch64",
      Self::Mips => "mips",
      Self::Mips64 => "mips64",
      Self::PowerPc => "powerpc",
      Self::PowerPc64 => "powerpc64",
      Self::Riscv64 => "riscv64",
      Self::S390x => "s390x",
    }
  }

  /// True when a descriptor with this architecture accepts the `runtime` one.
  pub fn accepts(&self, runtime: Arch) -> bool {
    *self == Self::Any || *self == runtime
  }
}

impl fmt::Display for Arch {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl FromStr for Arch {
  type Err = PlatformError;

  /// Accepts both Rust target names and Go `GOARCH` spellings.
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "any" => Ok(Self::Any),
      "x86" | "386" | "i386" | "i686" => Ok(Self::X86),
      "x86_64" | "amd64" => Ok(Self::X86_64),
      "arm" => Ok(Self::Arm),
      "aarch64" | "arm64" => Ok(Self::Aarch64),
      "loongarch64" | "loong64" => Ok(Self::LoongArch64),
      "mips" => Ok(Self::Mips),
      "mips64" => Ok(Self::Mips64),
      "powerpc" | "ppc" => Ok(Self::PowerPc),
      "powerpc64" | "ppc64" => Ok(Self::PowerPc64),
      "riscv64" => Ok(Self::Riscv64),
      "s390x" => Ok(Self::S390x),
      _ => Err(PlatformError::UnknownArch(s.to_string())),
    }
  }
}

impl TryFrom<String> for Arch {
  type Error = PlatformError;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    value.parse()
  }
}

impl From<Arch> for String {
  fn from(arch: Arch) -> Self {
    arch.as_str().to_string()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn go_spellings_are_accepted() {
    assert_eq!("amd64".parse::<Arch>().unwrap(), Arch::X86_64);
    assert_eq!("arm64".parse::<Arch>().unwrap(), Arch::Aarch64);
    assert_eq!("386".parse::<Arch>().unwrap(), Arch::X86);
  }

  #[test]
  fn unknown_arch_is_an_error() {
    let err = "vax".parse::<Arch>().unwrap_err();
    assert!(err.to_string().contains("vax"));
  }
}
