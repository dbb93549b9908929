//! Per-pair statistics derived from raw trace records
//!
//! The pair validator normally consumes statistics aggregated by the record
//! source. When only a trace dump is available, this aggregator computes the
//! same figures locally: mean hop count and sample count per ordered pair.

use crate::node_pair::NodePair;
use crate::record::{PairStatistics, TraceRecord};
use crate::source::SourceError;
use indexmap::IndexMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default)]
struct HopAccumulator {
    total_hops: u64,
    samples: u64,
}

#[derive(Debug, Default)]
pub struct PairStatsAggregator {
    pairs: IndexMap<NodePair, HopAccumulator>,
    skipped: usize,
}

impl PairStatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one trace; records missing endpoints or hops are skipped
    pub fn observe(&mut self, record: &TraceRecord) {
        let (Some(pair), Some(hops)) = (record.pair(), record.hop_sequence()) else {
            self.skipped += 1;
            return;
        };
        let acc = self.pairs.entry(pair).or_default();
        acc.total_hops += hops.len() as u64;
        acc.samples += 1;
    }

    pub fn aggregate<I>(mut self, records: I) -> Result<Self, SourceError>
    where
        I: IntoIterator<Item = Result<TraceRecord, SourceError>>,
    {
        for record in records {
            self.observe(&record?);
        }
        debug!(pairs = self.pairs.len(), skipped = self.skipped, "aggregated pair statistics");
        Ok(self)
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Statistics per pair, in first-seen order
    pub fn statistics(&self) -> Vec<PairStatistics> {
        self.pairs
            .iter()
            .map(|(pair, acc)| {
                PairStatistics::new(
                    pair.src.clone(),
                    pair.dest.clone(),
                    acc.total_hops as f64 / acc.samples as f64,
                    acc.samples,
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trace(src: &str, dest: &str, hop_count: usize) -> TraceRecord {
        let hops = (0..hop_count).map(|i| format!("10.0.0.{}", i)).collect();
        TraceRecord::new(src, dest, 0, hops, "h")
    }

    #[test]
    fn test_mean_hops_and_count() {
        let agg = PairStatsAggregator::new()
            .aggregate(vec![Ok(trace("A", "B", 2)), Ok(trace("A", "B", 4)), Ok(trace("B", "A", 3))])
            .unwrap();

        let stats = agg.statistics();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0], PairStatistics::new("A", "B", 3.0, 2));
        assert_eq!(stats[1], PairStatistics::new("B", "A", 3.0, 1));
    }

    #[test]
    fn test_missing_hops_skipped() {
        let mut record = trace("A", "B", 2);
        record.hops = None;
        let mut agg = PairStatsAggregator::new();
        agg.observe(&record);

        assert_eq!(agg.skipped(), 1);
        assert!(agg.statistics().is_empty());
    }
}
