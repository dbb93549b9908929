//! Longitudinal route change recording
//!
//! Unlike the stability tracker, the recorder watches every pair regardless
//! of validity. It keeps the latest fingerprint per pair and the ordered list
//! of instants at which the fingerprint changed, so change frequency can be
//! computed even for pairs that were quarantined.
//!
//! Each pair's history starts with the timestamp of its first sighting,
//! followed by one entry per fingerprint transition:
//!
//! ```text
//! t=10 h1   t=20 h1   t=30 h2   t=40 h2   t=50 h1
//!   │                   │                   │
//!   first_seen          change              change      history = [10, 30, 50]
//! ```

use crate::node_pair::NodePair;
use crate::record::TraceRecord;
use crate::source::SourceError;
use chrono::Duration;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Fingerprint history for one pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteChangeLog {
    /// Most recently seen fingerprint
    pub fingerprint: String,
    /// Timestamp of the first record for the pair (epoch ms)
    pub first_seen: i64,
    /// Timestamps at which the fingerprint differed from the previous one
    pub change_times: Vec<i64>,
}

impl RouteChangeLog {
    /// First sighting followed by every change time
    pub fn history(&self) -> Vec<i64> {
        let mut history = Vec::with_capacity(self.change_times.len() + 1);
        history.push(self.first_seen);
        history.extend_from_slice(&self.change_times);
        history
    }

    /// Number of distinct route epochs observed
    pub fn epochs(&self) -> usize {
        self.change_times.len() + 1
    }
}

/// Flat table row: one per pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteChangeRow {
    pub src: String,
    pub dest: String,
    pub sha: String,
    pub changetimes: Vec<i64>,
}

#[derive(Debug, Default)]
pub struct RouteChangeRecorder {
    logs: IndexMap<NodePair, RouteChangeLog>,
    derive_fingerprints: bool,
    skipped: usize,
}

impl RouteChangeRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn derive_fingerprints(mut self, enabled: bool) -> Self {
        self.derive_fingerprints = enabled;
        self
    }

    /// Record one trace; returns true if it registered a route change
    pub fn observe(&mut self, record: &TraceRecord) -> bool {
        let Some(obs) = record.change_observation(self.derive_fingerprints) else {
            self.skipped += 1;
            return false;
        };

        match self.logs.get_mut(&obs.pair) {
            Some(log) => {
                if log.fingerprint == obs.fingerprint {
                    return false;
                }
                log.fingerprint = obs.fingerprint.into_owned();
                log.change_times.push(obs.timestamp);
                true
            }
            None => {
                self.logs.insert(
                    obs.pair,
                    RouteChangeLog {
                        fingerprint: obs.fingerprint.into_owned(),
                        first_seen: obs.timestamp,
                        change_times: Vec::new(),
                    },
                );
                false
            }
        }
    }

    /// Consume a trace stream; the first source error aborts the pass
    pub fn record<I>(mut self, records: I) -> Result<Self, SourceError>
    where
        I: IntoIterator<Item = Result<TraceRecord, SourceError>>,
    {
        for record in records {
            self.observe(&record?);
        }
        info!(
            pairs = self.logs.len(),
            changes = self.total_changes(),
            skipped = self.skipped,
            "Successfully identified {} routes that had activity",
            self.logs.len()
        );
        Ok(self)
    }

    pub fn logs(&self) -> &IndexMap<NodePair, RouteChangeLog> {
        &self.logs
    }

    pub fn into_logs(self) -> IndexMap<NodePair, RouteChangeLog> {
        self.logs
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn total_changes(&self) -> usize {
        self.logs.values().map(|log| log.change_times.len()).sum()
    }

    pub fn rows(&self) -> Vec<RouteChangeRow> {
        rows(&self.logs)
    }
}

/// Flatten change logs into table rows, in first-sighting order
pub fn rows(logs: &IndexMap<NodePair, RouteChangeLog>) -> Vec<RouteChangeRow> {
    logs.iter()
        .map(|(pair, log)| RouteChangeRow {
            src: pair.src.clone(),
            dest: pair.dest.clone(),
            sha: log.fingerprint.clone(),
            changetimes: log.history(),
        })
        .collect()
}

/// Average lifetime of a route per pair over a window of `window` length:
/// the window divided by the number of route epochs observed.
pub fn average_route_life(
    logs: &IndexMap<NodePair, RouteChangeLog>,
    window: Duration,
) -> IndexMap<NodePair, Duration> {
    logs.iter()
        .map(|(pair, log)| {
            let epochs = i32::try_from(log.epochs()).unwrap_or(i32::MAX);
            (pair.clone(), window / epochs)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trace(src: &str, dest: &str, ts: i64, sha: &str) -> TraceRecord {
        TraceRecord::new(src, dest, ts, vec![src.to_string(), dest.to_string()], sha)
    }

    #[test]
    fn test_first_sighting_creates_log() {
        let mut recorder = RouteChangeRecorder::new();
        assert!(!recorder.observe(&trace("A", "B", 10, "h1")));

        let log = &recorder.logs()[&NodePair::new("A", "B")];
        assert_eq!(log.fingerprint, "h1");
        assert!(log.change_times.is_empty());
        assert_eq!(log.history(), vec![10]);
    }

    #[test]
    fn test_change_appends_timestamp() {
        let mut recorder = RouteChangeRecorder::new();
        recorder.observe(&trace("A", "B", 10, "h1"));
        assert!(!recorder.observe(&trace("A", "B", 20, "h1")));
        assert!(recorder.observe(&trace("A", "B", 30, "h2")));
        assert!(!recorder.observe(&trace("A", "B", 40, "h2")));
        assert!(recorder.observe(&trace("A", "B", 50, "h1")));

        let log = &recorder.logs()[&NodePair::new("A", "B")];
        assert_eq!(log.fingerprint, "h1");
        assert_eq!(log.change_times, vec![30, 50]);
        assert_eq!(log.history(), vec![10, 30, 50]);
        assert_eq!(recorder.total_changes(), 2);
    }

    #[test]
    fn test_directions_tracked_separately() {
        let mut recorder = RouteChangeRecorder::new();
        recorder.observe(&trace("A", "B", 10, "h1"));
        recorder.observe(&trace("B", "A", 11, "h9"));
        assert_eq!(recorder.logs().len(), 2);
        assert_eq!(recorder.total_changes(), 0);
    }

    #[test]
    fn test_missing_timestamp_skipped() {
        let mut recorder = RouteChangeRecorder::new();
        recorder.observe(&trace("A", "B", 10, "h1"));
        let mut broken = trace("A", "B", 20, "h2");
        broken.timestamp = None;

        assert!(!recorder.observe(&broken));
        assert_eq!(recorder.skipped(), 1);
        assert_eq!(recorder.logs()[&NodePair::new("A", "B")].fingerprint, "h1");
    }

    #[test]
    fn test_rows() {
        let recorder = RouteChangeRecorder::new()
            .record(vec![
                Ok(trace("A", "B", 10, "h1")),
                Ok(trace("A", "B", 20, "h2")),
                Ok(trace("C", "D", 15, "h7")),
            ])
            .unwrap();

        let rows = recorder.rows();
        assert_eq!(
            rows,
            vec![
                RouteChangeRow {
                    src: "A".into(),
                    dest: "B".into(),
                    sha: "h2".into(),
                    changetimes: vec![10, 20],
                },
                RouteChangeRow {
                    src: "C".into(),
                    dest: "D".into(),
                    sha: "h7".into(),
                    changetimes: vec![15],
                },
            ]
        );
    }

    #[test]
    fn test_average_route_life() {
        let mut recorder = RouteChangeRecorder::new();
        recorder.observe(&trace("A", "B", 10, "h1"));
        recorder.observe(&trace("A", "B", 20, "h2"));
        recorder.observe(&trace("A", "B", 30, "h3"));
        recorder.observe(&trace("C", "D", 10, "h1"));

        let life = average_route_life(recorder.logs(), Duration::hours(6));
        assert_eq!(life[&NodePair::new("A", "B")], Duration::hours(2));
        assert_eq!(life[&NodePair::new("C", "D")], Duration::hours(6));
    }
}
