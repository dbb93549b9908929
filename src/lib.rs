//! Routegraph - consistency analysis for network path measurements
//!
//! Consumes aggregated per-pair statistics and raw trace records and
//! maintains a validated, symmetric set of measurement pairs:
//!
//! - [`pair_validator`] filters pairs by hop and sample counts, then removes
//!   pairs without a valid reverse direction until the graph is symmetric
//! - [`route_stability`] disqualifies pairs whose route loops or changes
//! - [`route_changes`] keeps a per-pair history of route changes
//! - [`edge_counts`] counts traversals of each undirected hop-to-hop link
//!
//! Every disqualification lands in the [`quarantine`] ledger, and a
//! quarantined pair never returns to the valid set. [`analysis`] runs the
//! passes in order over a [`source::RecordSource`].

pub mod analysis;
pub mod cli;
pub mod config;
pub mod edge_counts;
pub mod export;
pub mod network;
pub mod node_pair;
pub mod pair_graph;
pub mod pair_stats;
pub mod pair_validator;
pub mod quarantine;
pub mod record;
pub mod route_changes;
pub mod route_stability;
pub mod source;
pub mod time_window;
