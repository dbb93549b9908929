//! Pair validation: quality filters plus enforced symmetry
//!
//! The validator runs in two phases:
//!
//! 1. **Filtering** ([`PairValidator::observe`]): each aggregated pair record
//!    is checked against the hop-count and sample-count thresholds. Both
//!    checks always run, so a pair failing both gets both reasons. Survivors
//!    are admitted to the [`PairGraph`]; repeat observations only bump the
//!    duplicate counter.
//! 2. **Symmetry fix-up** ([`PairValidator::finish`]): pairs without a valid
//!    reverse are removed until a fixed point.
//!
//! The result is a [`ValidatedGraph`], which downstream passes require as
//! input. Since it can only be produced by `finish`, no consumer can observe a
//! graph whose fix-up has not converged.
//!
//! # Example
//!
//! ```
//! use routegraph::pair_validator::{PairValidator, ValidationThresholds};
//! use routegraph::record::PairStatistics;
//!
//! let mut validator = PairValidator::new(ValidationThresholds::default());
//! validator.observe(&PairStatistics::new("A", "B", 2.0, 1500));
//! validator.observe(&PairStatistics::new("B", "A", 2.0, 1500));
//!
//! let validated = validator.finish();
//! assert_eq!(validated.graph().valid_pairs().len(), 2);
//! ```

use crate::node_pair::NodePair;
use crate::pair_graph::{PairGraph, SymmetryReport};
use crate::quarantine::DisqualifyReason;
use crate::record::PairStatistics;
use crate::source::SourceError;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Quality thresholds for pair admission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationThresholds {
    /// Pairs with an average hop count at or below this are disqualified
    pub min_avg_hops: f64,
    /// Pairs with fewer samples than this are disqualified
    pub min_sample_count: u64,
}

impl Default for ValidationThresholds {
    fn default() -> Self {
        Self {
            min_avg_hops: 1.0,
            min_sample_count: 1000,
        }
    }
}

/// Counters reported after validation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationSummary {
    /// Pair records consumed
    pub observed: usize,
    /// Records that passed both thresholds and were newly admitted
    pub admitted: usize,
    /// Records for pairs that were already admitted
    pub duplicates: usize,
    /// Pairs removed by the symmetry fix-up
    pub nonsymmetric: usize,
    /// Symmetry passes until convergence
    pub symmetry_passes: usize,
    /// Final valid pair count
    pub valid_pairs: usize,
    /// Final number of sources in the adjacency
    pub sources: usize,
    /// Pairs in the quarantine ledger
    pub quarantined: usize,
}

/// First pass of the analysis: builds the validated, symmetric pair graph
#[derive(Debug)]
pub struct PairValidator {
    thresholds: ValidationThresholds,
    graph: PairGraph,
    observed: usize,
    admitted: usize,
    duplicates: usize,
}

impl PairValidator {
    pub fn new(thresholds: ValidationThresholds) -> Self {
        Self {
            thresholds,
            graph: PairGraph::new(),
            observed: 0,
            admitted: 0,
            duplicates: 0,
        }
    }

    /// Apply the quality filters to one aggregated pair record
    pub fn observe(&mut self, stats: &PairStatistics) {
        self.observed += 1;
        let pair = stats.pair();

        if stats.avg_hops <= self.thresholds.min_avg_hops {
            self.graph.disqualify(&pair, DisqualifyReason::InsufficientHopCount);
        }
        if stats.sample_count < self.thresholds.min_sample_count {
            self.graph.disqualify(&pair, DisqualifyReason::InsufficientSampleCount);
        }

        if self.graph.is_quarantined(&pair) {
            return;
        }
        if self.graph.admit(pair) {
            self.admitted += 1;
        } else {
            self.duplicates += 1;
        }
    }

    /// Consume a pair-statistics stream, then run the symmetry fix-up.
    ///
    /// The first source error aborts validation.
    pub fn validate<I>(mut self, records: I) -> Result<ValidatedGraph, SourceError>
    where
        I: IntoIterator<Item = Result<PairStatistics, SourceError>>,
    {
        for record in records {
            self.observe(&record?);
        }
        Ok(self.finish())
    }

    /// Run the symmetry fix-up to convergence and hand over the graph
    pub fn finish(mut self) -> ValidatedGraph {
        let symmetry = self.graph.enforce_symmetry();
        let (valid_pairs, sources) = self.graph.sizes();

        let summary = ValidationSummary {
            observed: self.observed,
            admitted: self.admitted,
            duplicates: self.duplicates,
            nonsymmetric: symmetry.removed,
            symmetry_passes: symmetry.pass_count(),
            valid_pairs,
            sources,
            quarantined: self.graph.ledger().len(),
        };

        info!(
            valid_pairs,
            sources,
            quarantined = summary.quarantined,
            duplicates = summary.duplicates,
            passes = summary.symmetry_passes,
            "Successfully identified {} measurement pairs",
            valid_pairs
        );

        ValidatedGraph {
            graph: self.graph,
            symmetry,
            summary,
        }
    }
}

/// Pair graph whose symmetry fix-up has converged
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedGraph {
    graph: PairGraph,
    symmetry: SymmetryReport,
    summary: ValidationSummary,
}

impl ValidatedGraph {
    pub fn graph(&self) -> &PairGraph {
        &self.graph
    }

    pub fn symmetry(&self) -> &SymmetryReport {
        &self.symmetry
    }

    pub fn summary(&self) -> &ValidationSummary {
        &self.summary
    }

    pub fn contains(&self, pair: &NodePair) -> bool {
        self.graph.contains(pair)
    }

    pub(crate) fn into_graph(self) -> PairGraph {
        self.graph
    }
}
