//! Mutable tuning state for one run.

use ramptune_core::TunerConfig;

/// Tuning state threaded through every `decide` call.
///
/// Only the controller module mutates it; everyone else gets read access.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerState {
    /// Last rate requested of the load generator (unfloored).
    pub(crate) current_rate: f64,
    /// Last rate at which the goal held.
    pub(crate) best_rate: f64,
    /// Working copy of the ramp-up factor; decays toward 1 on misses.
    pub(crate) effective_ramp_up_factor: f64,
    /// Cooperative cancellation flag.
    pub(crate) running: bool,
}

impl ControllerState {
    pub fn new(config: &TunerConfig) -> Self {
        Self {
            current_rate: 1.0,
            best_rate: 1.0,
            effective_ramp_up_factor: config.ramp_up_factor,
            running: true,
        }
    }

    pub fn current_rate(&self) -> f64 {
        self.current_rate
    }

    pub fn best_rate(&self) -> f64 {
        self.best_rate
    }

    pub fn effective_ramp_up_factor(&self) -> f64 {
        self.effective_ramp_up_factor
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// The current rate as it is sent over the wire.
    pub fn applied_rate(&self) -> u64 {
        floor_rate(self.current_rate)
    }

    /// The last known-good rate as it would be reported.
    pub fn applied_best_rate(&self) -> u64 {
        floor_rate(self.best_rate)
    }
}

/// Floor a rate to a non-negative whole number of requests per second.
pub(crate) fn floor_rate(rate: f64) -> u64 {
    // `as` saturates, so an overflowing rate pins at u64::MAX.
    if rate > 0.0 {
        rate.floor() as u64
    } else {
        0
    }
}
