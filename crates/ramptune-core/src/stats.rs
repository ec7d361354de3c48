//! Stat snapshot model.
//!
//! A `Snapshot` is one poll of the load generator's `/stats` endpoint:
//! an ordered list of named counters with their per-second rates.

use serde::{Deserialize, Serialize};

use crate::error::LookupError;

/// One named counter as reported by the load generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stat {
    #[serde(rename = "stat_name")]
    pub name: String,
    #[serde(rename = "stat_rate_per_second")]
    pub rate_per_second: f64,
    /// Absolute counter value, when the generator reports it.
    #[serde(rename = "stat_value", default, skip_serializing_if = "Option::is_none")]
    pub value: Option<i64>,
    /// Counter value at the previous stats tick.
    #[serde(
        rename = "stat_previous_ticker_value",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub previous_ticker_value: Option<i64>,
}

impl Stat {
    pub fn new(name: impl Into<String>, rate_per_second: f64) -> Self {
        Self {
            name: name.into(),
            rate_per_second,
            value: None,
            previous_ticker_value: None,
        }
    }
}

/// All stats from a single poll cycle, in the order the generator sent them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    pub stats: Vec<Stat>,
}

impl Snapshot {
    pub fn new(stats: Vec<Stat>) -> Self {
        Self { stats }
    }

    /// Parse the JSON array served by `GET /stats`.
    pub fn from_json(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }

    /// Find a stat by name.
    ///
    /// If the snapshot holds several stats with the same name, the last
    /// one in poll order wins. The load generator never sends duplicates,
    /// but this is the documented policy if one ever does.
    pub fn lookup(&self, name: &str) -> Result<&Stat, LookupError> {
        self.stats
            .iter()
            .rev()
            .find(|s| s.name == name)
            .ok_or_else(|| LookupError(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }
}

impl FromIterator<Stat> for Snapshot {
    fn from_iter<I: IntoIterator<Item = Stat>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
