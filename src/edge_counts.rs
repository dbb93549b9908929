//! Undirected hop-edge traversal counts
//!
//! Every consecutive hop pair `(hops[i], hops[i+1])` of a trace is one edge
//! traversal. An edge and its reverse are the same physical link, so counts
//! accumulate on whichever orientation was seen first:
//!
//! ```text
//! [N1, N2, N3]  →  (N1,N2)=1  (N2,N3)=1
//! [N3, N2, N1]  →  (N2,N3)=2  (N1,N2)=2      (reverse keys reused)
//! ```

use crate::record::TraceRecord;
use crate::source::SourceError;
use indexmap::IndexMap;
use serde::Serialize;
use tracing::info;

/// Edge key in its canonical (first-seen) orientation
pub type Edge = (String, String);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EdgeCount {
    pub a: String,
    pub b: String,
    pub count: u64,
}

#[derive(Debug, Default)]
pub struct EdgeAggregator {
    counts: IndexMap<Edge, u64>,
    skipped: usize,
}

impl EdgeAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count each consecutive hop pair of one sequence
    pub fn observe_hops(&mut self, hops: &[String]) {
        for window in hops.windows(2) {
            let (s, d) = (&window[0], &window[1]);
            self.bump(s, d);
        }
    }

    fn bump(&mut self, s: &str, d: &str) {
        let forward = (s.to_string(), d.to_string());
        if let Some(count) = self.counts.get_mut(&forward) {
            *count += 1;
            return;
        }
        let reverse = (d.to_string(), s.to_string());
        if let Some(count) = self.counts.get_mut(&reverse) {
            *count += 1;
            return;
        }
        self.counts.insert(forward, 1);
    }

    /// Count a record's hops; records without hop data are skipped
    pub fn observe(&mut self, record: &TraceRecord) {
        match record.hop_sequence() {
            Some(hops) => self.observe_hops(hops),
            None => self.skipped += 1,
        }
    }

    /// Consume a trace stream; the first source error aborts the pass
    pub fn aggregate<I>(mut self, records: I) -> Result<Self, SourceError>
    where
        I: IntoIterator<Item = Result<TraceRecord, SourceError>>,
    {
        for record in records {
            self.observe(&record?);
        }
        info!(
            edges = self.counts.len(),
            traversals = self.total_traversals(),
            skipped = self.skipped,
            "Successfully counted {} distinct edges",
            self.counts.len()
        );
        Ok(self)
    }

    /// Traversals of the link between `a` and `b`, in either direction
    pub fn count(&self, a: &str, b: &str) -> u64 {
        let forward = (a.to_string(), b.to_string());
        let reverse = (b.to_string(), a.to_string());
        self.counts
            .get(&forward)
            .or_else(|| self.counts.get(&reverse))
            .copied()
            .unwrap_or(0)
    }

    pub fn edges(&self) -> &IndexMap<Edge, u64> {
        &self.counts
    }

    pub fn into_edges(self) -> IndexMap<Edge, u64> {
        self.counts
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn total_traversals(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn top_edges(&self, n: usize) -> Vec<EdgeCount> {
        top_edges(&self.counts, n)
    }
}

/// The `n` most traversed edges, highest count first; ties keep first-seen order
pub fn top_edges(counts: &IndexMap<Edge, u64>, n: usize) -> Vec<EdgeCount> {
    let mut edges: Vec<EdgeCount> = counts
        .iter()
        .map(|((a, b), count)| EdgeCount {
            a: a.clone(),
            b: b.clone(),
            count: *count,
        })
        .collect();
    // stable sort keeps insertion order among equal counts
    edges.sort_by(|x, y| y.count.cmp(&x.count));
    edges.truncate(n);
    edges
}
