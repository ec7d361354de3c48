//! Tuner configuration.
//!
//! `TunerFile` mirrors the optional `ramptune.toml` file: every field is
//! optional so CLI flags can fill or override it. `TunerFile::resolve`
//! applies defaults and produces the immutable `TunerConfig` for a run.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_API_ADDRESS: &str = "localhost";
pub const DEFAULT_API_PORT: u16 = 8080;
pub const DEFAULT_MIN_RATIO_THRESHOLD: f64 = 0.95;
pub const DEFAULT_RAMP_UP_FACTOR: f64 = 2.0;
pub const DEFAULT_RAMP_DOWN_FACTOR: f64 = 0.9;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(6);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// How the controller reacts to a missed goal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RampPolicy {
    /// Shrink the ramp-up factor on every miss and stop once it reaches 1.
    #[default]
    Decaying,
    /// Multiply the rate by fixed up/down factors forever.
    Fixed,
}

impl FromStr for RampPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "decaying" => Ok(Self::Decaying),
            "fixed" => Ok(Self::Fixed),
            other => Err(format!("unknown ramp policy '{other}' (expected decaying or fixed)")),
        }
    }
}

impl fmt::Display for RampPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decaying => f.write_str("decaying"),
            Self::Fixed => f.write_str("fixed"),
        }
    }
}

/// Wire format used to push a new rate to the load generator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateMode {
    /// `GET /update/rps/{value}`
    #[default]
    Path,
    /// `PUT /update` with `{"rps": value}`
    Json,
}

impl FromStr for UpdateMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "path" => Ok(Self::Path),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown update mode '{other}' (expected path or json)")),
        }
    }
}

impl fmt::Display for UpdateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path => f.write_str("path"),
            Self::Json => f.write_str("json"),
        }
    }
}

/// Contents of a `ramptune.toml` file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TunerFile {
    pub api_address: Option<String>,
    pub api_port: Option<u16>,
    pub target_stat: Option<String>,
    pub compare_stat: Option<String>,
    /// Fraction in (0, 1], e.g. 0.95.
    pub min_ratio_threshold: Option<f64>,
    pub ramp_up_factor: Option<f64>,
    pub ramp_down_factor: Option<f64>,
    /// Duration string such as "6s", "500ms" or "1m".
    pub poll_interval: Option<String>,
    pub request_timeout: Option<String>,
    pub policy: Option<RampPolicy>,
    pub update_mode: Option<UpdateMode>,
    /// Push a baseline rate of 1 and wait one interval before the first decision.
    pub prime: Option<bool>,
}

impl TunerFile {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Fill unset fields with defaults, parse durations, and validate.
    pub fn resolve(self) -> Result<TunerConfig, ConfigError> {
        let poll_interval = match self.poll_interval {
            Some(s) => parse_duration(&s)
                .ok_or_else(|| ConfigError::Invalid(format!("bad poll_interval '{s}'")))?,
            None => DEFAULT_POLL_INTERVAL,
        };
        let request_timeout = match self.request_timeout {
            Some(s) => parse_duration(&s)
                .ok_or_else(|| ConfigError::Invalid(format!("bad request_timeout '{s}'")))?,
            None => DEFAULT_REQUEST_TIMEOUT,
        };

        let config = TunerConfig {
            api_address: self
                .api_address
                .unwrap_or_else(|| DEFAULT_API_ADDRESS.to_string()),
            api_port: self.api_port.unwrap_or(DEFAULT_API_PORT),
            target_stat_name: self.target_stat.unwrap_or_default(),
            compare_stat_name: self.compare_stat.unwrap_or_default(),
            min_ratio_threshold: self
                .min_ratio_threshold
                .unwrap_or(DEFAULT_MIN_RATIO_THRESHOLD),
            ramp_up_factor: self.ramp_up_factor.unwrap_or(DEFAULT_RAMP_UP_FACTOR),
            ramp_down_factor: self.ramp_down_factor.unwrap_or(DEFAULT_RAMP_DOWN_FACTOR),
            poll_interval,
            request_timeout,
            policy: self.policy.unwrap_or_default(),
            update_mode: self.update_mode.unwrap_or_default(),
            prime: self.prime.unwrap_or(true),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Immutable configuration for one tuning run.
#[derive(Debug, Clone, PartialEq)]
pub struct TunerConfig {
    pub api_address: String,
    pub api_port: u16,
    /// Stat whose rate must keep up (e.g. `OfferReceived`).
    pub target_stat_name: String,
    /// Stat the target is measured against (e.g. `DiscoverSent`).
    pub compare_stat_name: String,
    /// Minimum acceptable `target / compare` ratio, in (0, 1].
    pub min_ratio_threshold: f64,
    /// Multiplicative growth step, > 1.
    pub ramp_up_factor: f64,
    /// Decay applied to the growth step on a miss, in (0, 1).
    pub ramp_down_factor: f64,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub policy: RampPolicy,
    pub update_mode: UpdateMode,
    pub prime: bool,
}

impl TunerConfig {
    /// Config with defaults for everything but the two stat names.
    pub fn new(target_stat_name: impl Into<String>, compare_stat_name: impl Into<String>) -> Self {
        Self {
            api_address: DEFAULT_API_ADDRESS.to_string(),
            api_port: DEFAULT_API_PORT,
            target_stat_name: target_stat_name.into(),
            compare_stat_name: compare_stat_name.into(),
            min_ratio_threshold: DEFAULT_MIN_RATIO_THRESHOLD,
            ramp_up_factor: DEFAULT_RAMP_UP_FACTOR,
            ramp_down_factor: DEFAULT_RAMP_DOWN_FACTOR,
            poll_interval: DEFAULT_POLL_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            policy: RampPolicy::default(),
            update_mode: UpdateMode::default(),
            prime: true,
        }
    }

    /// `host:port` of the load generator API.
    pub fn api_authority(&self) -> String {
        format!("{}:{}", self.api_address, self.api_port)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_stat_name.trim().is_empty() {
            return Err(ConfigError::Invalid("target stat name is required".into()));
        }
        if self.compare_stat_name.trim().is_empty() {
            return Err(ConfigError::Invalid("compare stat name is required".into()));
        }
        if !(self.min_ratio_threshold > 0.0 && self.min_ratio_threshold <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "min ratio threshold must be in (0, 1], got {}",
                self.min_ratio_threshold
            )));
        }
        if !(self.ramp_up_factor > 1.0) || !self.ramp_up_factor.is_finite() {
            return Err(ConfigError::Invalid(format!(
                "ramp-up factor must be greater than 1, got {}",
                self.ramp_up_factor
            )));
        }
        if !(self.ramp_down_factor > 0.0 && self.ramp_down_factor < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "ramp-down factor must be in (0, 1), got {}",
                self.ramp_down_factor
            )));
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::Invalid("poll interval must be non-zero".into()));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::Invalid("request timeout must be non-zero".into()));
        }
        Ok(())
    }
}

/// Parse a duration string like "5s", "500ms", "1m". A bare number is seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(secs) = s.strip_suffix('s') {
        if let Some(ms) = secs.strip_suffix('m') {
            ms.parse::<u64>().ok().map(Duration::from_millis)
        } else {
            secs.parse::<u64>().ok().map(Duration::from_secs)
        }
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}
