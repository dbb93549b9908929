//! Quarantine ledger: why each disqualified pair was removed
//!
//! The ledger maps a [`NodePair`] to the ordered list of reasons it was
//! disqualified. Entries are append-only: a pair can collect several reasons
//! (e.g. both hop-count and sample-count failures in one pass) and nothing
//! ever removes it again. Repeated reasons are kept as-is because they show
//! how many times a pair tripped the same check.
//!
//! The ledger itself is a leaf structure. Removing a pair from the valid set
//! and adjacency happens in [`crate::pair_graph::PairGraph::disqualify`], the
//! only place that writes to a ledger during analysis.

use crate::node_pair::NodePair;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Reason a pair was excluded from the connectivity graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DisqualifyReason {
    /// Average hop count too low to be a real path
    InsufficientHopCount,
    /// Too few samples over the query window
    InsufficientSampleCount,
    /// The reverse direction is not valid
    Nonsymmetry,
    /// Route loops after a baseline was established
    Looping,
    /// Route fingerprint changed after a baseline was established
    Unstable,
}

impl DisqualifyReason {
    /// Stable tag used in logs and exported ledgers
    pub fn as_str(&self) -> &'static str {
        match self {
            DisqualifyReason::InsufficientHopCount => "insufficient-hop-count",
            DisqualifyReason::InsufficientSampleCount => "insufficient-sample-count",
            DisqualifyReason::Nonsymmetry => "nonsymmetry",
            DisqualifyReason::Looping => "looping",
            DisqualifyReason::Unstable => "unstable",
        }
    }
}

impl fmt::Display for DisqualifyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only record of disqualified pairs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuarantineLedger {
    entries: IndexMap<NodePair, Vec<DisqualifyReason>>,
}

impl QuarantineLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `reason` to the pair's entry, creating it if absent
    pub fn record(&mut self, pair: NodePair, reason: DisqualifyReason) {
        self.entries.entry(pair).or_default().push(reason);
    }

    pub fn is_quarantined(&self, pair: &NodePair) -> bool {
        self.entries.contains_key(pair)
    }

    /// Reasons recorded for a pair, oldest first
    pub fn reasons(&self, pair: &NodePair) -> Option<&[DisqualifyReason]> {
        self.entries.get(pair).map(Vec::as_slice)
    }

    /// Iterate entries in the order pairs were first quarantined
    pub fn iter(&self) -> impl Iterator<Item = (&NodePair, &[DisqualifyReason])> {
        self.entries
            .iter()
            .map(|(pair, reasons)| (pair, reasons.as_slice()))
    }

    /// Number of quarantined pairs
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// How many times each reason was recorded across all pairs
    pub fn reason_counts(&self) -> BTreeMap<DisqualifyReason, usize> {
        let mut counts = BTreeMap::new();
        for reasons in self.entries.values() {
            for reason in reasons {
                *counts.entry(*reason).or_insert(0) += 1;
            }
        }
        counts
    }
}
