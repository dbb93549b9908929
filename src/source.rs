//! Record source interface and file/memory backed implementations
//!
//! The engine never talks to the search backend directly. It asks a
//! [`RecordSource`] for a fresh stream per pass; each stream is forward-only
//! and finite, and a second pass over the same data means a second scan.
//!
//! Stream items are `Result`s. An `Err` item means the source itself failed
//! (connection dropped, file unreadable) and aborts the pass. Records that
//! decode but lack fields are not errors here; consumers skip them.
//!
//! # Implementations
//!
//! - [`MemorySource`]: a pre-materialized batch, shared by every scan
//! - [`JsonLinesSource`]: newline-delimited JSON dumps, re-opened per scan

use crate::record::{PairStatistics, TraceRecord};
use crate::time_window::TimeWindow;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Failed to open record source {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read record stream at line {line}: {source}")]
    Read {
        line: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("Record source has no {0} data configured")]
    Unavailable(&'static str),

    #[error("Query failed: {0}")]
    Query(String),
}

/// One-shot stream of pair statistics
pub type PairScan<'a> = Box<dyn Iterator<Item = Result<PairStatistics, SourceError>> + Send + 'a>;

/// One-shot stream of trace records
pub type TraceScan<'a> = Box<dyn Iterator<Item = Result<TraceRecord, SourceError>> + Send + 'a>;

/// Supplier of measurement records.
///
/// Implementations must support several independent scans, possibly from
/// different threads at the same time.
pub trait RecordSource: Sync {
    /// Aggregated per-pair statistics over the source's default window
    fn scan_pair_statistics(&self) -> Result<PairScan<'_>, SourceError>;

    /// Trace records whose timestamps fall inside `window`
    fn scan_trace_records(&self, window: &TimeWindow) -> Result<TraceScan<'_>, SourceError>;
}

/// Query-side restrictions applied to trace scans
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SourceFilter {
    /// Drop records whose endpoints are flagged as non-production
    pub production_only: bool,
    /// Drop records flagged as looping
    pub exclude_looping: bool,
}

impl Default for SourceFilter {
    fn default() -> Self {
        Self {
            production_only: true,
            exclude_looping: true,
        }
    }
}

impl SourceFilter {
    /// Keep every record regardless of flags
    pub fn permissive() -> Self {
        Self {
            production_only: false,
            exclude_looping: false,
        }
    }

    /// Whether a record inside the window passes the query restrictions.
    ///
    /// Records without a timestamp are kept so the consumers can decide
    /// whether they need one.
    pub fn accepts(&self, record: &TraceRecord, window: &TimeWindow) -> bool {
        if let Some(ts) = record.timestamp {
            if !window.contains_millis(ts) {
                return false;
            }
        }
        if self.production_only && !record.is_production() {
            return false;
        }
        if self.exclude_looping && record.looping == Some(true) {
            return false;
        }
        true
    }
}

/// Pre-materialized record batch
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    pairs: Vec<PairStatistics>,
    traces: Vec<TraceRecord>,
    filter: SourceFilter,
}

impl MemorySource {
    pub fn new(pairs: Vec<PairStatistics>, traces: Vec<TraceRecord>) -> Self {
        Self {
            pairs,
            traces,
            filter: SourceFilter::default(),
        }
    }

    pub fn with_filter(mut self, filter: SourceFilter) -> Self {
        self.filter = filter;
        self
    }
}

impl RecordSource for MemorySource {
    fn scan_pair_statistics(&self) -> Result<PairScan<'_>, SourceError> {
        Ok(Box::new(self.pairs.iter().cloned().map(Ok)))
    }

    fn scan_trace_records(&self, window: &TimeWindow) -> Result<TraceScan<'_>, SourceError> {
        let window = *window;
        let filter = self.filter.clone();
        Ok(Box::new(
            self.traces
                .iter()
                .filter(move |record| filter.accepts(record, &window))
                .cloned()
                .map(Ok),
        ))
    }
}

/// Newline-delimited JSON dumps on disk
///
/// Each scan re-opens its file. Blank lines are ignored; lines that are not
/// UTF-8, or not valid JSON for the record type, are logged, counted and
/// skipped.
#[derive(Debug, Clone)]
pub struct JsonLinesSource {
    pairs_path: Option<PathBuf>,
    traces_path: Option<PathBuf>,
    filter: SourceFilter,
    /// Malformed lines per file, as the largest count seen by one scan
    pairs_malformed: Arc<AtomicU64>,
    traces_malformed: Arc<AtomicU64>,
}

impl JsonLinesSource {
    pub fn new(pairs_path: Option<PathBuf>, traces_path: Option<PathBuf>) -> Self {
        Self {
            pairs_path,
            traces_path,
            filter: SourceFilter::default(),
            pairs_malformed: Arc::new(AtomicU64::new(0)),
            traces_malformed: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn with_filter(mut self, filter: SourceFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn has_pair_statistics(&self) -> bool {
        self.pairs_path.is_some()
    }

    /// Undecodable lines on disk across both files.
    ///
    /// A file scanned several times counts each bad line once.
    pub fn malformed_lines(&self) -> u64 {
        self.pairs_malformed.load(Ordering::Relaxed) + self.traces_malformed.load(Ordering::Relaxed)
    }

    fn open(path: &Path) -> Result<BufReader<File>, SourceError> {
        let file = File::open(path).map_err(|source| SourceError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "opened record dump");
        Ok(BufReader::new(file))
    }
}

/// Decode a JSON-lines reader lazily, skipping undecodable lines.
///
/// `malformed` is raised to this scan's running count of skipped lines, so
/// concurrent scans of one file never add up. Only I/O failures are errors.
fn json_lines<T, R>(reader: R, malformed: Arc<AtomicU64>) -> impl Iterator<Item = Result<T, SourceError>>
where
    T: DeserializeOwned,
    R: BufRead,
{
    let mut skipped = 0u64;
    reader
        .split(b'\n')
        .enumerate()
        .filter_map(move |(idx, line)| {
            let line = match line {
                Ok(line) => line,
                Err(source) => return Some(Err(SourceError::Read { line: idx + 1, source })),
            };
            if line.iter().all(u8::is_ascii_whitespace) {
                return None;
            }
            let decoded = std::str::from_utf8(&line)
                .map_err(|e| e.to_string())
                .and_then(|text| serde_json::from_str::<T>(text).map_err(|e| e.to_string()));
            match decoded {
                Ok(record) => Some(Ok(record)),
                Err(error) => {
                    warn!(line = idx + 1, %error, "skipping malformed record");
                    skipped += 1;
                    malformed.fetch_max(skipped, Ordering::Relaxed);
                    None
                }
            }
        })
}

impl RecordSource for JsonLinesSource {
    fn scan_pair_statistics(&self) -> Result<PairScan<'_>, SourceError> {
        let path = self
            .pairs_path
            .as_deref()
            .ok_or(SourceError::Unavailable("pair statistics"))?;
        let reader = Self::open(path)?;
        Ok(Box::new(json_lines::<PairStatistics, _>(
            reader,
            Arc::clone(&self.pairs_malformed),
        )))
    }

    fn scan_trace_records(&self, window: &TimeWindow) -> Result<TraceScan<'_>, SourceError> {
        let path = self
            .traces_path
            .as_deref()
            .ok_or(SourceError::Unavailable("trace record"))?;
        let reader = Self::open(path)?;
        let window = *window;
        let filter = self.filter.clone();
        Ok(Box::new(
            json_lines::<TraceRecord, _>(reader, Arc::clone(&self.traces_malformed)).filter(
                move |item| match item {
                    Ok(record) => filter.accepts(record, &window),
                    Err(_) => true,
                },
            ),
        ))
    }
}
