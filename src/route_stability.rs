//! Route stability tracking for validated pairs
//!
//! For every trace record of a currently valid pair, the tracker compares the
//! route fingerprint against the pair's baseline:
//!
//! | state            | record                     | outcome                          |
//! |------------------|----------------------------|----------------------------------|
//! | no baseline      | any                        | baseline created (1 record)      |
//! | baseline         | looping                    | disqualified `looping`           |
//! | baseline         | same fingerprint           | max RTT kept, record count + 1   |
//! | baseline         | different fingerprint      | disqualified `unstable`          |
//!
//! A route change is never rebased: the whole pair is dropped from the graph
//! along with its route record. Because disqualification removes the pair
//! from the valid set, every later record for it is ignored.
//!
//! A loop on the very first sighting is not flagged; there is no baseline to
//! compare it against.

use crate::node_pair::NodePair;
use crate::pair_graph::PairGraph;
use crate::pair_validator::ValidatedGraph;
use crate::quarantine::DisqualifyReason;
use crate::record::TraceRecord;
use crate::source::SourceError;
use indexmap::IndexMap;
use serde::Serialize;
use tracing::info;

/// Baseline route of a stable pair
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteRecord {
    pub fingerprint: String,
    pub hops: Vec<String>,
    /// Largest RTT seen on this route
    pub max_rtt: f64,
    /// Records that confirmed this route, including the first
    pub records: u64,
}

/// What the tracker did with one record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// Required fields missing
    Skipped,
    /// Pair not in the valid set (never was, or already disqualified)
    NotValid,
    /// First record for the pair; baseline created
    Baseline,
    /// Same fingerprint as the baseline
    Confirmed,
    /// Pair removed from the graph
    Disqualified(DisqualifyReason),
}

/// Counters reported after stability tracking
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StabilitySummary {
    pub records: usize,
    pub skipped: usize,
    pub not_valid: usize,
    pub confirmed: usize,
    pub looping: usize,
    pub unstable: usize,
    /// Pairs with a surviving route record
    pub stable_routes: usize,
}

/// Second pass of the analysis; requires a converged [`ValidatedGraph`]
#[derive(Debug)]
pub struct RouteStabilityTracker {
    graph: PairGraph,
    routes: IndexMap<NodePair, RouteRecord>,
    derive_fingerprints: bool,
    summary: StabilitySummary,
}

impl RouteStabilityTracker {
    pub fn new(validated: ValidatedGraph) -> Self {
        Self {
            graph: validated.into_graph(),
            routes: IndexMap::new(),
            derive_fingerprints: false,
            summary: StabilitySummary::default(),
        }
    }

    /// Derive fingerprints from hops for records without `route-sha1`
    pub fn derive_fingerprints(mut self, enabled: bool) -> Self {
        self.derive_fingerprints = enabled;
        self
    }

    pub fn observe(&mut self, record: &TraceRecord) -> Observation {
        self.summary.records += 1;

        let Some(obs) = record.route_observation(self.derive_fingerprints) else {
            self.summary.skipped += 1;
            return Observation::Skipped;
        };
        if !self.graph.contains(&obs.pair) {
            self.summary.not_valid += 1;
            return Observation::NotValid;
        }

        let Some(route) = self.routes.get_mut(&obs.pair) else {
            self.routes.insert(
                obs.pair,
                RouteRecord {
                    fingerprint: obs.fingerprint.into_owned(),
                    hops: obs.hops.to_vec(),
                    max_rtt: obs.max_rtt,
                    records: 1,
                },
            );
            return Observation::Baseline;
        };

        let reason = if obs.looping {
            DisqualifyReason::Looping
        } else if route.fingerprint == obs.fingerprint {
            if obs.max_rtt > route.max_rtt {
                route.max_rtt = obs.max_rtt;
            }
            route.records += 1;
            self.summary.confirmed += 1;
            return Observation::Confirmed;
        } else {
            DisqualifyReason::Unstable
        };

        self.disqualify(&obs.pair, reason);
        Observation::Disqualified(reason)
    }

    fn disqualify(&mut self, pair: &NodePair, reason: DisqualifyReason) {
        match reason {
            DisqualifyReason::Looping => self.summary.looping += 1,
            DisqualifyReason::Unstable => self.summary.unstable += 1,
            _ => {}
        }
        self.routes.shift_remove(pair);
        self.graph.disqualify(pair, reason);
    }

    /// Consume a trace stream; the first source error aborts the pass
    pub fn track<I>(mut self, records: I) -> Result<StabilityOutcome, SourceError>
    where
        I: IntoIterator<Item = Result<TraceRecord, SourceError>>,
    {
        for record in records {
            self.observe(&record?);
        }
        Ok(self.finish())
    }

    pub fn routes(&self) -> &IndexMap<NodePair, RouteRecord> {
        &self.routes
    }

    pub fn graph(&self) -> &PairGraph {
        &self.graph
    }

    pub fn finish(mut self) -> StabilityOutcome {
        self.summary.stable_routes = self.routes.len();
        info!(
            stable_routes = self.summary.stable_routes,
            unstable = self.summary.unstable,
            looping = self.summary.looping,
            skipped = self.summary.skipped,
            "Successfully identified {} stable routes",
            self.summary.stable_routes
        );
        StabilityOutcome {
            graph: self.graph,
            routes: self.routes,
            summary: self.summary,
        }
    }
}

/// Graph and route records after stability tracking
#[derive(Debug, Clone)]
pub struct StabilityOutcome {
    pub graph: PairGraph,
    pub routes: IndexMap<NodePair, RouteRecord>,
    pub summary: StabilitySummary,
}
