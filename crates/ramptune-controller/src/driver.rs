//! Control loop driver: fetch, decide, apply, sleep.
//!
//! One cycle runs to completion before the next starts. Cancellation is
//! observed only between cycles and during the inter-cycle sleep, so an
//! in-flight fetch or apply always finishes first.

use std::time::Duration;

use ramptune_core::{LookupError, TargetError, TargetSystem, TunerConfig};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::controller::{Decision, RateController};

/// Where the driver is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverPhase {
    /// Priming the generator to the baseline rate.
    Init,
    /// Polling and adjusting.
    Running,
    /// Finished with a recommended rate.
    Converged(u64),
    /// Cancelled by the operator.
    Stopped,
    /// Aborted on a network or configuration error.
    Failed(String),
}

impl DriverPhase {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Init | Self::Running)
    }
}

/// How a run ended, when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum RunOutcome {
    Converged {
        rate: u64,
        cycles: u64,
    },
    Stopped {
        /// Rate most recently pushed to the generator.
        last_rate: u64,
        /// Last rate at which the goal held.
        best_rate: u64,
        cycles: u64,
    },
}

/// Errors that end a run.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("load generator error: {0}")]
    Network(#[from] TargetError),

    #[error("configuration error: {0}")]
    Config(#[from] LookupError),
}

/// Drives a `RateController` against a load generator.
pub struct Driver<T> {
    target: T,
    controller: RateController,
    phase: DriverPhase,
    cycles: u64,
    last_applied: u64,
}

impl<T: TargetSystem> Driver<T> {
    pub fn new(target: T, config: TunerConfig) -> Self {
        Self {
            target,
            controller: RateController::new(config),
            phase: DriverPhase::Init,
            cycles: 0,
            last_applied: 0,
        }
    }

    pub fn phase(&self) -> &DriverPhase {
        &self.phase
    }

    /// Number of completed decision cycles.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn controller(&self) -> &RateController {
        &self.controller
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    /// Run until convergence, cancellation, or failure.
    ///
    /// `shutdown` flipping to `true` requests a graceful stop.
    pub async fn run(
        &mut self,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<RunOutcome, DriverError> {
        let config = self.controller.config().clone();
        info!(
            api = %config.api_authority(),
            target_stat = %config.target_stat_name,
            compare_stat = %config.compare_stat_name,
            threshold = config.min_ratio_threshold,
            ramp_up = config.ramp_up_factor,
            ramp_down = config.ramp_down_factor,
            policy = %config.policy,
            interval_ms = config.poll_interval.as_millis() as u64,
            "tuner started"
        );

        if *shutdown.borrow() {
            return Ok(self.stop());
        }

        if config.prime {
            let baseline = self.controller.state().applied_rate();
            if let Err(e) = self.target.apply_rate(baseline).await {
                return Err(self.fail(e.into()));
            }
            self.last_applied = baseline;
            debug!(rate = baseline, "primed baseline rate");

            if wait_for_tick(config.poll_interval, &mut shutdown).await {
                return Ok(self.stop());
            }
        }

        self.phase = DriverPhase::Running;

        loop {
            if *shutdown.borrow() || !self.controller.is_running() {
                return Ok(self.stop());
            }

            let snapshot = match self.target.fetch_snapshot().await {
                Ok(s) => s,
                Err(e) => return Err(self.fail(e.into())),
            };
            self.cycles += 1;
            debug!(cycle = self.cycles, stats = snapshot.len(), "snapshot fetched");

            match self.controller.decide(&snapshot) {
                Decision::ApplyRate {
                    rate,
                    ramp,
                    comparison,
                } => {
                    info!(
                        cycle = self.cycles,
                        rate,
                        factor = self.controller.state().effective_ramp_up_factor(),
                        "{comparison}: {ramp}. New target rate is {rate}"
                    );
                    if let Err(e) = self.target.apply_rate(rate).await {
                        return Err(self.fail(e.into()));
                    }
                    self.last_applied = rate;
                }
                Decision::Converged { rate, comparison } => {
                    info!(
                        cycle = self.cycles,
                        rate,
                        "{comparison}: converged. Optimal rate is {rate}"
                    );
                    self.phase = DriverPhase::Converged(rate);
                    return Ok(RunOutcome::Converged {
                        rate,
                        cycles: self.cycles,
                    });
                }
                Decision::ConfigError(e) => return Err(self.fail(e.into())),
            }

            if wait_for_tick(config.poll_interval, &mut shutdown).await {
                return Ok(self.stop());
            }
        }
    }

    fn stop(&mut self) -> RunOutcome {
        self.controller.stop();
        self.phase = DriverPhase::Stopped;
        let outcome = RunOutcome::Stopped {
            last_rate: self.last_applied,
            best_rate: self.controller.state().applied_best_rate(),
            cycles: self.cycles,
        };
        info!(cycles = self.cycles, last_rate = self.last_applied, "tuner stopped");
        outcome
    }

    fn fail(&mut self, err: DriverError) -> DriverError {
        self.controller.stop();
        warn!(cycle = self.cycles, error = %err, "tuner failed");
        self.phase = DriverPhase::Failed(err.to_string());
        err
    }
}

/// Sleep one poll interval. Returns `true` if a stop was requested.
async fn wait_for_tick(interval: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    if *shutdown.borrow_and_update() {
        return true;
    }

    let sleep = tokio::time::sleep(interval);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            _ = &mut sleep => return *shutdown.borrow(),
            changed = shutdown.changed() => {
                if changed.is_err() {
                    // Sender gone: nobody can cancel us any more.
                    (&mut sleep).await;
                    return false;
                }
                if *shutdown.borrow_and_update() {
                    return true;
                }
            }
        }
    }
}
