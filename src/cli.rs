//! CLI argument parsing for routegraph

use crate::time_window::{parse_utc, TimeWindow, WindowError};
use chrono::{DateTime, Utc};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Output format for reports and exported tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary; tables are written as CSV (default)
    Text,
    /// JSON format for machine parsing
    Json,
    /// Route change table as CSV on stdout; the summary goes to stderr
    Csv,
}

#[derive(Parser, Debug)]
#[command(name = "routegraph")]
#[command(version)]
#[command(about = "Consistency analysis for network path measurements", long_about = None)]
pub struct Cli {
    /// Aggregated pair statistics (JSON lines: src, dest, avg_hops, sample_count)
    #[arg(long = "pairs", value_name = "FILE")]
    pub pairs: Option<PathBuf>,

    /// Trace records (JSON lines)
    #[arg(long = "traces", value_name = "FILE")]
    pub traces: PathBuf,

    /// Window start, ISO-8601 UTC (e.g. 2024-01-01T00:00:00.000Z)
    #[arg(long = "start", value_name = "TIME")]
    pub start: Option<String>,

    /// Window end, ISO-8601 UTC
    #[arg(long = "end", value_name = "TIME")]
    pub end: Option<String>,

    /// TOML configuration file
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Write route changes, edges, quarantine ledger and summary to this directory
    #[arg(short = 'o', long = "output-dir", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Number of most traversed edges in the network summary (overrides config)
    #[arg(long = "top-edges", value_name = "N")]
    pub top_edges: Option<usize>,

    /// Re-run the symmetry fix-up after stability tracking
    #[arg(long = "resymmetrize")]
    pub resymmetrize: bool,

    /// Derive route fingerprints from hops when route-sha1 is missing
    #[arg(long = "derive-fingerprints")]
    pub derive_fingerprints: bool,

    /// Keep test-node and looping records
    #[arg(long = "include-all")]
    pub include_all: bool,

    /// Enable debug tracing output to stderr
    #[arg(long = "debug")]
    pub debug: bool,
}

impl Cli {
    /// Analysis window; a missing bound is open-ended
    pub fn window(&self) -> Result<TimeWindow, WindowError> {
        let start = match &self.start {
            Some(start) => parse_utc(start)?,
            None => DateTime::<Utc>::MIN_UTC,
        };
        let end = match &self.end {
            Some(end) => parse_utc(end)?,
            None => DateTime::<Utc>::MAX_UTC,
        };
        TimeWindow::new(start, end)
    }
}
