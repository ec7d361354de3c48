//! ramptune-target: talks to the load generator's HTTP API.
//!
//! Two endpoints are used:
//!
//! ```text
//! GET /stats                 -> [{"stat_name": ..., "stat_rate_per_second": ...}, ...]
//! GET /update/rps/{value}    (update_mode = path)
//! PUT /update {"rps": value} (update_mode = json)
//! ```
//!
//! Any non-2xx status is an error; response bodies of rate updates are ignored.

pub mod client;

pub use client::HttpTarget;
