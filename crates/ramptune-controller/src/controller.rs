//! Rate controller: the per-cycle ramp decision.

use std::fmt;

use ramptune_core::{LookupError, RampPolicy, Snapshot, Stat, TunerConfig};

use crate::state::{floor_rate, ControllerState};

/// Direction of a rate change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ramp {
    Up,
    Down,
}

impl fmt::Display for Ramp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => f.write_str("ramped up"),
            Self::Down => f.write_str("ramped down"),
        }
    }
}

/// The target/compare measurement behind a decision.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub target: Stat,
    pub compare: Stat,
    /// `None` when the compare stat's rate is zero.
    pub ratio: Option<f64>,
    pub goal_met: bool,
}

impl Comparison {
    fn measure(target: &Stat, compare: &Stat, threshold: f64) -> Self {
        let ratio = if compare.rate_per_second == 0.0 {
            None
        } else {
            Some(target.rate_per_second / compare.rate_per_second)
        };
        // A zero denominator never counts as meeting the goal.
        let goal_met = matches!(ratio, Some(r) if r >= threshold);

        Self {
            target: target.clone(),
            compare: compare.clone(),
            ratio,
            goal_met,
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = if self.goal_met { "/" } else { "<" };
        write!(
            f,
            "{} {} {op} {} {} = ",
            self.target.name,
            self.target.rate_per_second,
            self.compare.name,
            self.compare.rate_per_second
        )?;
        match self.ratio {
            Some(r) => write!(f, "{r:.4}"),
            None => f.write_str("undefined (zero compare rate)"),
        }
    }
}

/// Outcome of one decision step.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Keep running at `rate`.
    ApplyRate {
        rate: u64,
        ramp: Ramp,
        comparison: Comparison,
    },
    /// The ramp-up step has decayed away; `rate` is the recommended steady rate.
    Converged { rate: u64, comparison: Comparison },
    /// A named stat was missing from the snapshot. Fatal.
    ConfigError(LookupError),
}

impl Decision {
    /// The rate carried by this decision, if any.
    pub fn rate(&self) -> Option<u64> {
        match self {
            Self::ApplyRate { rate, .. } | Self::Converged { rate, .. } => Some(*rate),
            Self::ConfigError(_) => None,
        }
    }
}

/// Run one decision step against `snapshot`.
///
/// Pure apart from mutating `state`: identical inputs always produce the
/// identical next state and decision.
pub fn decide(snapshot: &Snapshot, config: &TunerConfig, state: &mut ControllerState) -> Decision {
    let target = match snapshot.lookup(&config.target_stat_name) {
        Ok(s) => s,
        Err(e) => return Decision::ConfigError(e),
    };
    let compare = match snapshot.lookup(&config.compare_stat_name) {
        Ok(s) => s,
        Err(e) => return Decision::ConfigError(e),
    };

    let comparison = Comparison::measure(target, compare, config.min_ratio_threshold);

    if comparison.goal_met {
        state.best_rate = state.current_rate;
        let step = match config.policy {
            RampPolicy::Decaying => state.effective_ramp_up_factor,
            RampPolicy::Fixed => config.ramp_up_factor,
        };
        state.current_rate *= step;
        return Decision::ApplyRate {
            rate: floor_rate(state.current_rate),
            ramp: Ramp::Up,
            comparison,
        };
    }

    match config.policy {
        RampPolicy::Decaying => {
            state.effective_ramp_up_factor *= config.ramp_down_factor;
            if state.effective_ramp_up_factor <= 1.0 {
                return Decision::Converged {
                    rate: floor_rate(state.best_rate),
                    comparison,
                };
            }
            state.current_rate = state.best_rate * state.effective_ramp_up_factor;
        }
        RampPolicy::Fixed => {
            state.current_rate *= config.ramp_down_factor;
        }
    }

    Decision::ApplyRate {
        rate: floor_rate(state.current_rate),
        ramp: Ramp::Down,
        comparison,
    }
}

/// Owns the config and state for one run and applies `decide` to each snapshot.
#[derive(Debug, Clone)]
pub struct RateController {
    config: TunerConfig,
    state: ControllerState,
}

impl RateController {
    pub fn new(config: TunerConfig) -> Self {
        let state = ControllerState::new(&config);
        Self { config, state }
    }

    pub fn decide(&mut self, snapshot: &Snapshot) -> Decision {
        decide(snapshot, &self.config, &mut self.state)
    }

    pub fn config(&self) -> &TunerConfig {
        &self.config
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    /// Clear the running flag. Checked by the driver at cycle boundaries.
    pub fn stop(&mut self) {
        self.state.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.state.running
    }
}
