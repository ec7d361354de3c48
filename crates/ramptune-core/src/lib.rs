//! ramptune-core: shared types for the ramptune rate finder.
//!
//! Defines the polled stat model (`Stat`, `Snapshot`), the run
//! configuration (`TunerConfig`), the `TargetSystem` trait the control
//! loop talks to, and the error types shared across the workspace.

pub mod config;
pub mod error;
pub mod stats;
pub mod target;

pub use config::{RampPolicy, TunerConfig, TunerFile, UpdateMode};
pub use error::{ConfigError, LookupError, TargetError};
pub use stats::{Snapshot, Stat};
pub use target::TargetSystem;
