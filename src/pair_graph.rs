//! Valid pair set, adjacency and quarantine ledger as one owned state object
//!
//! `PairGraph` keeps three structures consistent:
//!
//! - the valid pair set (insertion ordered, no duplicates)
//! - the adjacency map `src -> {dest}` (insertion ordered)
//! - the quarantine ledger
//!
//! A pair is in the valid set iff its destination is in `adjacency[src]`, and
//! a quarantined pair is in neither. Sources with no destinations are removed
//! immediately. All writes go through [`PairGraph::admit`] and
//! [`PairGraph::disqualify`], which maintain these invariants.
//!
//! # Symmetry fix-up
//!
//! ```text
//!   before                      after
//!   A -> {B, C}                 A -> {B}
//!   B -> {A}          ──►       B -> {A}
//!   C -> {}  (absent)           (C -> A never measured, so A -> C goes)
//! ```
//!
//! [`PairGraph::enforce_symmetry`] repeats full scans until neither the valid
//! set size nor the adjacency size changes. Every pass can only remove pairs,
//! so the loop terminates after at most `|valid| + 1` passes.

use crate::node_pair::NodePair;
use crate::quarantine::{DisqualifyReason, QuarantineLedger};
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use tracing::{debug, trace};

/// Source -> set of destinations currently considered valid
pub type Adjacency = IndexMap<String, IndexSet<String>>;

/// Sizes observed after each symmetry pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SymmetryReport {
    /// `(valid pair count, adjacency source count)` before the first pass
    pub initial: (usize, usize),
    /// `(valid pair count, adjacency source count)` after each pass
    pub passes: Vec<(usize, usize)>,
    /// Pairs disqualified as nonsymmetric across all passes
    pub removed: usize,
}

impl SymmetryReport {
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PairGraph {
    valid: IndexSet<NodePair>,
    adjacency: Adjacency,
    ledger: QuarantineLedger,
}

impl PairGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pair to the valid set and adjacency.
    ///
    /// Returns `false` without changing anything if the pair is quarantined or
    /// already valid.
    pub fn admit(&mut self, pair: NodePair) -> bool {
        if self.ledger.is_quarantined(&pair) || self.valid.contains(&pair) {
            return false;
        }
        self.adjacency
            .entry(pair.src.clone())
            .or_default()
            .insert(pair.dest.clone());
        self.valid.insert(pair);
        true
    }

    /// Quarantine a pair with `reason`, removing it from the valid set and
    /// adjacency if present. Quarantine is permanent.
    pub fn disqualify(&mut self, pair: &NodePair, reason: DisqualifyReason) {
        debug!(pair = %pair, reason = %reason, "disqualifying pair");

        if let Some(dests) = self.adjacency.get_mut(&pair.src) {
            dests.shift_remove(&pair.dest);
            if dests.is_empty() {
                self.adjacency.shift_remove(&pair.src);
            }
        }
        self.valid.shift_remove(pair);
        self.ledger.record(pair.clone(), reason);
    }

    /// Remove pairs whose reverse direction is not valid, to a fixed point
    pub fn enforce_symmetry(&mut self) -> SymmetryReport {
        let mut report = SymmetryReport {
            initial: self.sizes(),
            ..SymmetryReport::default()
        };

        loop {
            let before = self.sizes();
            report.removed += self.symmetry_pass();
            let after = self.sizes();
            trace!(pass = report.passes.len() + 1, ?before, ?after, "symmetry pass");
            report.passes.push(after);
            if after == before {
                break;
            }
        }

        report
    }

    /// One full scan over the adjacency; returns the number of removals
    fn symmetry_pass(&mut self) -> usize {
        let sources: Vec<String> = self.adjacency.keys().cloned().collect();
        let mut removed = 0;

        for src in sources {
            let dests: Vec<String> = match self.adjacency.get(&src) {
                Some(dests) => dests.iter().cloned().collect(),
                None => continue,
            };
            for dest in dests {
                let has_reverse = self
                    .adjacency
                    .get(&dest)
                    .is_some_and(|back| back.contains(&src));
                if !has_reverse {
                    self.disqualify(&NodePair::new(src.clone(), dest), DisqualifyReason::Nonsymmetry);
                    removed += 1;
                }
            }
        }

        removed
    }

    /// `(valid pair count, adjacency source count)`
    pub fn sizes(&self) -> (usize, usize) {
        (self.valid.len(), self.adjacency.len())
    }

    pub fn contains(&self, pair: &NodePair) -> bool {
        self.valid.contains(pair)
    }

    pub fn valid_pairs(&self) -> &IndexSet<NodePair> {
        &self.valid
    }

    pub fn adjacency(&self) -> &Adjacency {
        &self.adjacency
    }

    pub fn ledger(&self) -> &QuarantineLedger {
        &self.ledger
    }

    pub fn is_quarantined(&self, pair: &NodePair) -> bool {
        self.ledger.is_quarantined(pair)
    }

    /// Every valid pair has a valid reverse
    pub fn is_symmetric(&self) -> bool {
        self.valid.iter().all(|pair| self.valid.contains(&pair.reversed()))
    }

    /// Valid set and adjacency describe the same pairs, with no empty sources
    /// and no quarantined members
    pub fn is_consistent(&self) -> bool {
        let adjacency_pairs: usize = self.adjacency.values().map(IndexSet::len).sum();
        adjacency_pairs == self.valid.len()
            && self.adjacency.values().all(|dests| !dests.is_empty())
            && self.valid.iter().all(|pair| {
                self.adjacency
                    .get(&pair.src)
                    .is_some_and(|dests| dests.contains(&pair.dest))
                    && !self.ledger.is_quarantined(pair)
            })
    }
}
