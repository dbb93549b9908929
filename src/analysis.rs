//! End-to-end analysis over a record source
//!
//! # Pass ordering
//!
//! ```text
//!            scan_pair_statistics()          (or derived from a trace scan)
//!                     │
//!                     ▼
//!             ┌───────────────┐
//!             │ PairValidator │  filters + symmetry fix-up to a fixed point
//!             └───────┬───────┘
//!                     │ ValidatedGraph (barrier)
//!      ┌──────────────┼──────────────────────┬─────────────────────┐
//!      ▼              ▼                      ▼                     │
//! ┌───────────┐ ┌───────────────────┐ ┌────────────────┐           │
//! │ Stability │ │ RouteChangeRecorder│ │ EdgeAggregator │  each on its own
//! │ Tracker   │ │ (no validity gate) │ │                │  trace scan
//! └───────────┘ └───────────────────┘ └────────────────┘
//! ```
//!
//! The three trace passes share no mutable state and run on scoped threads.
//! The stability tracker takes ownership of the validated graph, so it is the
//! only writer to the ledger after validation.

use crate::config::{AnalysisConfig, ConfigError};
use crate::edge_counts::{self, Edge, EdgeAggregator, EdgeCount};
use crate::network::EdgeNetwork;
use crate::node_pair::NodePair;
use crate::pair_graph::PairGraph;
use crate::pair_stats::PairStatsAggregator;
use crate::pair_validator::{PairValidator, ValidatedGraph, ValidationSummary};
use crate::route_changes::{self, RouteChangeLog, RouteChangeRecorder, RouteChangeRow};
use crate::route_stability::{RouteRecord, RouteStabilityTracker, StabilityOutcome, StabilitySummary};
use crate::source::{RecordSource, SourceError};
use crate::time_window::{TimeWindow, WindowError};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::{info, info_span};

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Record source failed: {0}")]
    Source(#[from] SourceError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Window(#[from] WindowError),

    #[error("The {0} pass panicked")]
    WorkerPanicked(&'static str),
}

/// Where the pair validator gets its input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PairInput {
    /// Pre-aggregated statistics from the source
    #[default]
    SourceStatistics,
    /// Aggregate statistics from a trace scan over the window
    DerivedFromTraces,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSummary {
    pub pairs: usize,
    pub changes: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EdgeSummary {
    pub distinct: usize,
    pub traversals: u64,
    pub skipped: usize,
}

/// Serializable overview of a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisSummary {
    pub window_start: String,
    pub window_end: String,
    pub validation: ValidationSummary,
    pub stability: StabilitySummary,
    pub route_changes: ChangeSummary,
    pub edges: EdgeSummary,
    /// Pairs removed by the optional post-tracking symmetry pass
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resymmetrized: Option<usize>,
    pub valid_pairs: usize,
    pub sources: usize,
    pub symmetric: bool,
    pub quarantined: usize,
    pub quarantine_reasons: BTreeMap<String, usize>,
}

impl fmt::Display for AnalysisSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Route Graph Analysis ===")?;
        writeln!(f, "Window: {} .. {}", self.window_start, self.window_end)?;
        writeln!(f)?;
        writeln!(f, "Pairs observed:      {}", self.validation.observed)?;
        writeln!(f, "Pairs admitted:      {}", self.validation.admitted)?;
        writeln!(f, "Duplicate records:   {}", self.validation.duplicates)?;
        writeln!(
            f,
            "Nonsymmetric:        {} ({} passes)",
            self.validation.nonsymmetric, self.validation.symmetry_passes
        )?;
        writeln!(f, "Stable routes:       {}", self.stability.stable_routes)?;
        writeln!(f, "Unstable / looping:  {} / {}", self.stability.unstable, self.stability.looping)?;
        if let Some(removed) = self.resymmetrized {
            writeln!(f, "Resymmetrized:       {}", removed)?;
        }
        writeln!(f, "Valid pairs:         {} across {} sources", self.valid_pairs, self.sources)?;
        writeln!(f, "Symmetric:           {}", if self.symmetric { "yes" } else { "no" })?;
        writeln!(f, "Routes with changes: {} pairs, {} changes", self.route_changes.pairs, self.route_changes.changes)?;
        writeln!(f, "Edges:               {} distinct, {} traversals", self.edges.distinct, self.edges.traversals)?;
        writeln!(f)?;
        writeln!(f, "Quarantined pairs:   {}", self.quarantined)?;
        for (reason, count) in &self.quarantine_reasons {
            writeln!(f, "  {:<28}{}", reason, count)?;
        }
        Ok(())
    }
}

/// Everything the passes produced
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub window: TimeWindow,
    pub graph: PairGraph,
    pub routes: IndexMap<NodePair, RouteRecord>,
    pub route_changes: IndexMap<NodePair, RouteChangeLog>,
    pub edges: IndexMap<Edge, u64>,
    pub summary: AnalysisSummary,
}

impl AnalysisReport {
    pub fn route_change_rows(&self) -> Vec<RouteChangeRow> {
        route_changes::rows(&self.route_changes)
    }

    /// All edges, most traversed first
    pub fn all_edges(&self) -> Vec<EdgeCount> {
        edge_counts::top_edges(&self.edges, self.edges.len())
    }

    pub fn top_edges(&self, n: usize) -> Vec<EdgeCount> {
        edge_counts::top_edges(&self.edges, n)
    }

    /// Network of the `n` most traversed edges
    pub fn network(&self, prefix: &str, n: usize) -> anyhow::Result<EdgeNetwork> {
        EdgeNetwork::from_edges(prefix, &self.top_edges(n))
    }

    pub fn average_route_life(&self) -> IndexMap<NodePair, chrono::Duration> {
        route_changes::average_route_life(&self.route_changes, self.window.duration())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    config: AnalysisConfig,
    pair_input: PairInput,
}

impl Analyzer {
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            config,
            pair_input: PairInput::default(),
        }
    }

    pub fn with_pair_input(mut self, pair_input: PairInput) -> Self {
        self.pair_input = pair_input;
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Pair validation only (first pass)
    pub fn validate(&self, source: &dyn RecordSource, window: &TimeWindow) -> Result<ValidatedGraph, AnalysisError> {
        let _span = info_span!("pair_validation").entered();
        let validator = PairValidator::new(self.config.validation.clone());

        let validated = match self.pair_input {
            PairInput::SourceStatistics => validator.validate(source.scan_pair_statistics()?)?,
            PairInput::DerivedFromTraces => {
                let stats = PairStatsAggregator::new().aggregate(source.scan_trace_records(window)?)?;
                validator.validate(stats.statistics().into_iter().map(Ok))?
            }
        };
        Ok(validated)
    }

    /// Run every pass and assemble the report
    pub fn run(&self, source: &dyn RecordSource, window: &TimeWindow) -> Result<AnalysisReport, AnalysisError> {
        self.config.validate()?;
        let validated = self.validate(source, window)?;
        let validation = validated.summary().clone();
        let derive = self.config.stability.derive_fingerprints;

        let (stability, changes, edges) = crossbeam::scope(|s| {
            let stability = s.spawn(move |_| -> Result<StabilityOutcome, SourceError> {
                let _span = info_span!("route_stability").entered();
                let scan = source.scan_trace_records(window)?;
                RouteStabilityTracker::new(validated).derive_fingerprints(derive).track(scan)
            });
            let changes = s.spawn(move |_| -> Result<RouteChangeRecorder, SourceError> {
                let _span = info_span!("route_changes").entered();
                let scan = source.scan_trace_records(window)?;
                RouteChangeRecorder::new().derive_fingerprints(derive).record(scan)
            });
            let edges = s.spawn(move |_| -> Result<EdgeAggregator, SourceError> {
                let _span = info_span!("edge_counts").entered();
                let scan = source.scan_trace_records(window)?;
                EdgeAggregator::new().aggregate(scan)
            });
            (stability.join(), changes.join(), edges.join())
        })
        .map_err(|_| AnalysisError::WorkerPanicked("trace"))?;

        let StabilityOutcome {
            mut graph,
            mut routes,
            summary: stability,
        } = stability.map_err(|_| AnalysisError::WorkerPanicked("route stability"))??;
        let changes = changes.map_err(|_| AnalysisError::WorkerPanicked("route change"))??;
        let edges = edges.map_err(|_| AnalysisError::WorkerPanicked("edge count"))??;

        let resymmetrized = if self.config.stability.resymmetrize {
            let report = graph.enforce_symmetry();
            routes.retain(|pair, _| graph.contains(pair));
            info!(removed = report.removed, "resymmetrized graph after stability tracking");
            Some(report.removed)
        } else {
            None
        };

        let (query_start, query_end) = window.to_query_strings();
        let (valid_pairs, sources) = graph.sizes();
        let summary = AnalysisSummary {
            window_start: query_start,
            window_end: query_end,
            validation,
            stability,
            route_changes: ChangeSummary {
                pairs: changes.logs().len(),
                changes: changes.total_changes(),
                skipped: changes.skipped(),
            },
            edges: EdgeSummary {
                distinct: edges.edges().len(),
                traversals: edges.total_traversals(),
                skipped: edges.skipped(),
            },
            resymmetrized,
            valid_pairs,
            sources,
            symmetric: graph.is_symmetric(),
            quarantined: graph.ledger().len(),
            quarantine_reasons: graph
                .ledger()
                .reason_counts()
                .into_iter()
                .map(|(reason, count)| (reason.as_str().to_string(), count))
                .collect(),
        };

        Ok(AnalysisReport {
            window: *window,
            graph,
            routes,
            route_changes: changes.into_logs(),
            edges: edges.into_edges(),
            summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quarantine::DisqualifyReason;
    use crate::record::{PairStatistics, TraceRecord};
    use crate::source::MemorySource;

    fn hops(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn mesh_source() -> MemorySource {
        let pairs = vec![
            PairStatistics::new("A", "B", 3.0, 2000),
            PairStatistics::new("B", "A", 3.0, 2000),
            PairStatistics::new("A", "C", 3.0, 2000),
            PairStatistics::new("C", "A", 3.0, 2000),
            PairStatistics::new("B", "C", 3.0, 2000),
        ];
        let traces = vec![
            TraceRecord::new("A", "B", 1_000, hops(&["A", "X", "B"]), "ab1"),
            TraceRecord::new("B", "A", 1_100, hops(&["B", "X", "A"]), "ba1"),
            TraceRecord::new("A", "C", 1_200, hops(&["A", "Y", "C"]), "ac1"),
            TraceRecord::new("A", "C", 2_000, hops(&["A", "Z", "C"]), "ac2"),
            TraceRecord::new("A", "B", 2_100, hops(&["A", "X", "B"]), "ab1"),
        ];
        MemorySource::new(pairs, traces)
    }

    #[test]
    fn test_full_run() {
        let report = Analyzer::new(AnalysisConfig::default())
            .run(&mesh_source(), &TimeWindow::unbounded())
            .unwrap();

        // B -> C had no reverse; A -> C changed route
        assert!(report.graph.contains(&NodePair::new("A", "B")));
        assert!(report.graph.contains(&NodePair::new("B", "A")));
        assert!(report.graph.contains(&NodePair::new("C", "A")));
        assert!(!report.graph.contains(&NodePair::new("A", "C")));
        assert_eq!(
            report.graph.ledger().reasons(&NodePair::new("B", "C")).unwrap(),
            &[DisqualifyReason::Nonsymmetry]
        );
        assert_eq!(
            report.graph.ledger().reasons(&NodePair::new("A", "C")).unwrap(),
            &[DisqualifyReason::Unstable]
        );

        assert_eq!(report.routes[&NodePair::new("A", "B")].records, 2);
        assert_eq!(report.route_changes[&NodePair::new("A", "C")].history(), vec![1_200, 2_000]);
        assert_eq!(report.edges[&("A".to_string(), "X".to_string())], 3);
        assert_eq!(report.summary.stability.unstable, 1);
        assert!(!report.summary.symmetric);
        assert_eq!(report.summary.resymmetrized, None);
    }

    #[test]
    fn test_resymmetrize_after_tracking() {
        let mut config = AnalysisConfig::default();
        config.stability.resymmetrize = true;

        let report = Analyzer::new(config).run(&mesh_source(), &TimeWindow::unbounded()).unwrap();

        assert!(!report.graph.contains(&NodePair::new("C", "A")));
        assert!(report.graph.is_symmetric());
        assert_eq!(report.summary.resymmetrized, Some(1));
        assert!(report.routes.keys().all(|pair| report.graph.contains(pair)));
    }

    #[test]
    fn test_derived_pair_statistics() {
        let mut config = AnalysisConfig::default();
        config.validation.min_sample_count = 1;
        let source = MemorySource::new(
            vec![],
            vec![
                TraceRecord::new("A", "B", 0, hops(&["A", "X", "B"]), "h1"),
                TraceRecord::new("B", "A", 0, hops(&["B", "X", "A"]), "h2"),
            ],
        );

        let report = Analyzer::new(config)
            .with_pair_input(PairInput::DerivedFromTraces)
            .run(&source, &TimeWindow::unbounded())
            .unwrap();

        assert_eq!(report.summary.valid_pairs, 2);
        assert_eq!(report.summary.stability.stable_routes, 2);
    }

    #[test]
    fn test_source_failure_is_reported() {
        struct FailingSource;
        impl RecordSource for FailingSource {
            fn scan_pair_statistics(&self) -> Result<crate::source::PairScan<'_>, SourceError> {
                Err(SourceError::Query("connection refused".to_string()))
            }
            fn scan_trace_records(&self, _: &TimeWindow) -> Result<crate::source::TraceScan<'_>, SourceError> {
                Err(SourceError::Query("connection refused".to_string()))
            }
        }

        let err = Analyzer::new(AnalysisConfig::default())
            .run(&FailingSource, &TimeWindow::unbounded())
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Source(SourceError::Query(_))));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_summary_text() {
        let report = Analyzer::new(AnalysisConfig::default())
            .run(&mesh_source(), &TimeWindow::unbounded())
            .unwrap();
        let text = report.summary.to_string();
        assert!(text.contains("Valid pairs:"));
        assert!(text.contains("nonsymmetry"));
        assert!(text.contains("unstable"));
    }

    #[test]
    fn test_network_from_report() {
        let report = Analyzer::new(AnalysisConfig::default())
            .run(&mesh_source(), &TimeWindow::unbounded())
            .unwrap();
        let network = report.network("Network", 2).unwrap();
        assert_eq!(network.edge_count(), 2);
        assert_eq!(network.name(), "Network_00002");
    }
}
