//! The load generator as seen by the control loop.

use std::future::Future;

use crate::error::TargetError;
use crate::stats::Snapshot;

/// A load generator exposing a stats read and a rate set.
///
/// Implementations perform blocking network I/O; the control loop never
/// overlaps two calls.
pub trait TargetSystem {
    /// Read the current stat snapshot. Never cached.
    fn fetch_snapshot(&self) -> impl Future<Output = Result<Snapshot, TargetError>> + Send;

    /// Set the generator's outbound rate in requests per second.
    fn apply_rate(&self, rate: u64) -> impl Future<Output = Result<(), TargetError>> + Send;
}
