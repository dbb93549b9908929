// Library pipeline over JSON-lines dumps

use chrono::Duration;
use routegraph::analysis::{Analyzer, PairInput};
use routegraph::config::AnalysisConfig;
use routegraph::node_pair::NodePair;
use routegraph::source::{JsonLinesSource, RecordSource, SourceError};
use routegraph::time_window::TimeWindow;
use std::fs;
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, lines: &[&str]) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, lines.join("\n")).unwrap();
    path
}

#[test]
fn test_analysis_over_dumps() {
    let dir = TempDir::new().unwrap();
    let pairs = write(
        &dir,
        "pairs.jsonl",
        &[
            r#"{"src":"A","dest":"B","avg_hops":4.0,"sample_count":2000}"#,
            r#"{"src":"B","dest":"A","avg_hops":4.0,"sample_count":2000}"#,
            "",
            r#"{"src":"A","dest":"B","avg_hops":4.0}"#,
        ],
    );
    let traces = write(
        &dir,
        "traces.jsonl",
        &[
            r#"{"src":"A","dest":"B","timestamp":0,"hops":["A","R1","B"],"route-sha1":"x","max_rtt":3.5}"#,
            r#"{"src":"A","dest":"B","timestamp":1000,"hops":["A","R1","B"],"route-sha1":"x","max_rtt":9.0}"#,
            r#"{"src":"B","dest":"A","timestamp":2000,"hops":["B","R1","A"],"route-sha1":"y"}"#,
            r#"{"src":"B","dest":"A","timestamp":3000,"hops":["B","R1","A"],"route-sha1":"y","looping":true}"#,
        ],
    );

    let source = JsonLinesSource::new(Some(pairs), Some(traces));
    let window = TimeWindow::parse("1970-01-01T00:00:00Z", "1970-01-01T00:01:40Z").unwrap();
    let report = Analyzer::new(AnalysisConfig::default()).run(&source, &window).unwrap();

    // The pair line without sample_count does not decode
    assert_eq!(source.malformed_lines(), 1);
    assert_eq!(report.summary.validation.observed, 2);
    assert_eq!(report.summary.valid_pairs, 2);
    assert!(report.summary.symmetric);

    let route = &report.routes[&NodePair::new("A", "B")];
    assert_eq!(route.records, 2);
    assert_eq!(route.max_rtt, 9.0);
    assert_eq!(route.hops, vec!["A", "R1", "B"]);

    // The looping record was excluded by the source filter
    assert_eq!(report.routes[&NodePair::new("B", "A")].records, 1);
    assert_eq!(report.edges[&("A".to_string(), "R1".to_string())], 3);

    let life = report.average_route_life();
    assert_eq!(life[&NodePair::new("A", "B")], Duration::seconds(100));
}

#[test]
fn test_bad_trace_lines_skipped_and_counted_once() {
    let dir = TempDir::new().unwrap();
    let pairs = write(
        &dir,
        "pairs.jsonl",
        &[
            r#"{"src":"A","dest":"B","avg_hops":4.0,"sample_count":2000}"#,
            r#"{"src":"B","dest":"A","avg_hops":4.0,"sample_count":2000}"#,
        ],
    );
    let traces = dir.path().join("traces.jsonl");
    let mut dump = Vec::new();
    dump.extend_from_slice(br#"{"src":"A","dest":"B","timestamp":0,"hops":["A","R1","B"],"route-sha1":"x"}"#);
    dump.extend_from_slice(b"\n\xff\xfe garbage\nnot json\n");
    dump.extend_from_slice(br#"{"src":"B","dest":"A","timestamp":1,"hops":["B","R1","A"],"route-sha1":"y"}"#);
    dump.push(b'\n');
    fs::write(&traces, dump).unwrap();

    let source = JsonLinesSource::new(Some(pairs), Some(traces));
    let report = Analyzer::new(AnalysisConfig::default())
        .run(&source, &TimeWindow::unbounded())
        .unwrap();

    assert_eq!(report.summary.stability.stable_routes, 2);
    assert_eq!(report.edges[&("A".to_string(), "R1".to_string())], 2);
    // Three trace scans, each sees the same two bad lines
    assert_eq!(source.malformed_lines(), 2);
}

#[test]
fn test_scans_are_independent() {
    let dir = TempDir::new().unwrap();
    let traces = write(
        &dir,
        "traces.jsonl",
        &[r#"{"src":"A","dest":"B","timestamp":0,"hops":["A","B"],"route-sha1":"x"}"#],
    );
    let source = JsonLinesSource::new(None, Some(traces));
    let window = TimeWindow::unbounded();

    let first: Vec<_> = source.scan_trace_records(&window).unwrap().collect();
    let second: Vec<_> = source.scan_trace_records(&window).unwrap().collect();
    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);
}

#[test]
fn test_missing_pair_statistics() {
    let dir = TempDir::new().unwrap();
    let traces = write(&dir, "traces.jsonl", &[]);
    let source = JsonLinesSource::new(None, Some(traces));

    let err = Analyzer::new(AnalysisConfig::default())
        .run(&source, &TimeWindow::unbounded())
        .unwrap_err();
    assert!(err.to_string().contains("pair statistics"));

    let report = Analyzer::new(AnalysisConfig::default())
        .with_pair_input(PairInput::DerivedFromTraces)
        .run(&source, &TimeWindow::unbounded())
        .unwrap();
    assert_eq!(report.summary.valid_pairs, 0);
    assert!(report.edges.is_empty());
}

#[test]
fn test_unreadable_trace_file() {
    let dir = TempDir::new().unwrap();
    let source = JsonLinesSource::new(None, Some(dir.path().join("nope.jsonl")));

    let err = source.scan_trace_records(&TimeWindow::unbounded()).err().unwrap();
    assert!(matches!(err, SourceError::Open { .. }));
}
