//! Error types shared across the ramptune crates.

use thiserror::Error;

/// A named stat was absent from a snapshot.
///
/// Never defaulted to zero: a missing stat means the operator named the
/// wrong counter, and a made-up rate would corrupt the ratio.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("stat not found in snapshot: {0}")]
pub struct LookupError(pub String);

/// Errors raised while loading or validating a `TunerConfig`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Errors talking to the load generator.
#[derive(Debug, Error)]
pub enum TargetError {
    #[error("connection to {address} failed: {reason}")]
    Connect { address: String, reason: String },

    #[error("request to {uri} failed: {reason}")]
    Request { uri: String, reason: String },

    #[error("{uri} returned status {status}")]
    Status { uri: String, status: u16 },

    #[error("failed to decode response from {uri}: {reason}")]
    Decode { uri: String, reason: String },

    #[error("request to {uri} timed out after {timeout_ms}ms")]
    Timeout { uri: String, timeout_ms: u64 },
}
