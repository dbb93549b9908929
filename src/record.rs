//! Record types consumed from the record source
//!
//! Two kinds of records flow into the engine:
//!
//! - [`PairStatistics`]: per-pair aggregates over the query window (average
//!   hop count and sample count), used by the pair validator.
//! - [`TraceRecord`]: one traceroute measurement (hops, route fingerprint,
//!   timestamp, looping flag, max RTT), used by the stability tracker, the
//!   route-change recorder and the edge aggregator.
//!
//! Trace records are decoded with every field optional. Each consumer projects
//! out the fields it needs and skips the record when one is missing, so a
//! malformed record never touches aggregate state.
//!
//! # Wire format
//!
//! ```text
//! {"src":"10.0.0.1","dest":"10.0.0.2","timestamp":1589932800000,
//!  "hops":["10.0.0.1","192.168.1.1","10.0.0.2"],"route-sha1":"9f2c...",
//!  "looping":false,"max_rtt":12.5,"src_production":true,"dest_production":true}
//! ```

use crate::node_pair::NodePair;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::borrow::Cow;

/// Aggregated statistics for one ordered pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairStatistics {
    pub src: String,
    pub dest: String,
    /// Mean hop count over the window
    pub avg_hops: f64,
    /// Number of measurements over the window
    pub sample_count: u64,
}

impl PairStatistics {
    pub fn new(src: impl Into<String>, dest: impl Into<String>, avg_hops: f64, sample_count: u64) -> Self {
        Self {
            src: src.into(),
            dest: dest.into(),
            avg_hops,
            sample_count,
        }
    }

    pub fn pair(&self) -> NodePair {
        NodePair::new(self.src.clone(), self.dest.clone())
    }
}

/// A single traceroute measurement as delivered by the record source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraceRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dest: Option<String>,
    /// Epoch milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hops: Option<Vec<String>>,
    #[serde(rename = "route-sha1", default, skip_serializing_if = "Option::is_none")]
    pub route_sha1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub looping: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_rtt: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_production: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dest_production: Option<bool>,
}

/// Fields the route stability tracker needs
#[derive(Debug, Clone, PartialEq)]
pub struct RouteObservation<'a> {
    pub pair: NodePair,
    pub fingerprint: Cow<'a, str>,
    pub hops: &'a [String],
    pub looping: bool,
    pub max_rtt: f64,
}

/// Fields the route change recorder needs
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeObservation<'a> {
    pub pair: NodePair,
    pub fingerprint: Cow<'a, str>,
    pub timestamp: i64,
}

impl TraceRecord {
    /// Builder used by sources and tests for a fully-populated record
    pub fn new(
        src: impl Into<String>,
        dest: impl Into<String>,
        timestamp: i64,
        hops: Vec<String>,
        route_sha1: impl Into<String>,
    ) -> Self {
        Self {
            src: Some(src.into()),
            dest: Some(dest.into()),
            timestamp: Some(timestamp),
            hops: Some(hops),
            route_sha1: Some(route_sha1.into()),
            looping: Some(false),
            max_rtt: Some(0.0),
            src_production: Some(true),
            dest_production: Some(true),
        }
    }

    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = Some(looping);
        self
    }

    pub fn with_max_rtt(mut self, max_rtt: f64) -> Self {
        self.max_rtt = Some(max_rtt);
        self
    }

    pub fn pair(&self) -> Option<NodePair> {
        match (&self.src, &self.dest) {
            (Some(src), Some(dest)) => Some(NodePair::new(src.clone(), dest.clone())),
            _ => None,
        }
    }

    /// Route fingerprint, derived from the hops when `derive` is set and the
    /// record carries no `route-sha1`
    pub fn fingerprint(&self, derive: bool) -> Option<Cow<'_, str>> {
        match (&self.route_sha1, &self.hops) {
            (Some(sha), _) => Some(Cow::Borrowed(sha.as_str())),
            (None, Some(hops)) if derive => Some(Cow::Owned(RouteFingerprint::of_hops(hops))),
            _ => None,
        }
    }

    /// Project the fields used for route stability tracking.
    ///
    /// `src`, `dest`, the fingerprint and `hops` are required. A missing
    /// `looping` flag reads as false and a missing `max_rtt` as 0.0.
    pub fn route_observation(&self, derive_fingerprint: bool) -> Option<RouteObservation<'_>> {
        let pair = self.pair()?;
        let fingerprint = self.fingerprint(derive_fingerprint)?;
        let hops = self.hops.as_deref()?;
        Some(RouteObservation {
            pair,
            fingerprint,
            hops,
            looping: self.looping.unwrap_or(false),
            max_rtt: self.max_rtt.unwrap_or(0.0),
        })
    }

    /// Project the fields used for route change recording
    pub fn change_observation(&self, derive_fingerprint: bool) -> Option<ChangeObservation<'_>> {
        let pair = self.pair()?;
        let fingerprint = self.fingerprint(derive_fingerprint)?;
        let timestamp = self.timestamp?;
        Some(ChangeObservation {
            pair,
            fingerprint,
            timestamp,
        })
    }

    pub fn hop_sequence(&self) -> Option<&[String]> {
        self.hops.as_deref()
    }

    /// True unless either endpoint is explicitly flagged as non-production
    pub fn is_production(&self) -> bool {
        self.src_production != Some(false) && self.dest_production != Some(false)
    }
}

/// Route fingerprint helpers
pub struct RouteFingerprint;

impl RouteFingerprint {
    /// Hex SHA-256 over the ordered hop list.
    ///
    /// Hops are separated by a NUL byte so `["ab", "c"]` and `["a", "bc"]`
    /// hash differently.
    pub fn of_hops(hops: &[String]) -> String {
        let mut hasher = Sha256::new();
        for hop in hops {
            hasher.update(hop.as_bytes());
            hasher.update([0u8]);
        }
        hex::encode(hasher.finalize())
    }
}
