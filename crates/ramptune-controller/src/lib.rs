//! ramptune-controller: finds the highest sustainable request rate.
//!
//! Each poll cycle the driver reads a stat snapshot from the load
//! generator and hands it to `decide`, which compares the target stat
//! against the compare stat and picks the next rate.
//!
//! # Decaying-step policy
//!
//! ```text
//! ratio = target.rate / compare.rate
//!
//! if ratio >= min_ratio_threshold:
//!     best_rate    = current_rate
//!     current_rate = current_rate * factor          // ApplyRate
//! else:
//!     factor = factor * ramp_down_factor
//!     if factor <= 1: Converged(best_rate)
//!     current_rate = best_rate * factor             // ApplyRate
//! ```
//!
//! A miss never cuts the rate directly. It shrinks the next step taken
//! from the last rate that held, so the search converges geometrically.
//! The `fixed` policy instead multiplies the rate by the up or down
//! factor forever and only stops when cancelled.

pub mod controller;
pub mod driver;
pub mod state;

pub use controller::{decide, Comparison, Decision, Ramp, RateController};
pub use driver::{Driver, DriverError, DriverPhase, RunOutcome};
pub use state::ControllerState;
