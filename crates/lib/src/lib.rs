//! rigup-lib: entry selection and execution for rigup
//!
//! This crate provides everything behind the `rigup` binary:
//! - `Config`: package managers, shells and setup entries read from YAML
//! - `Filterer`: picks the adapters and entries for a platform and tag selection
//! - `Engine`: runs selected entries one at a time, with per-entry retries
//! - `RunState`: per-entry and aggregate status reported to a `ProgressObserver`

pub mod config;
pub mod entry;
pub mod execute;
pub mod filter;
pub mod platform;
pub mod system;
pub mod tags;

pub use config::{Config, ConfigError};
pub use entry::{Entry, EntryGroup, EntryKind, RetryBehavior, RetryPolicy};
pub use execute::{
  Engine, NoProgress, Plan, ProgressObserver, RunError, RunOptions, RunState, Status, TokioProcessRunner, plan, run,
};
pub use filter::{FilterError, Filterer};
pub use platform::{Arch, Os, Platform, PlatformError};
pub use tags::TagSet;
