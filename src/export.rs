//! Tabular and JSON output for analysis artifacts
//!
//! - Route change table: one row per pair (`src,dest,sha,changetimes`)
//! - Edge counts: one row per undirected edge (`a,b,count`)
//! - Quarantine ledger: `"src -> dest": [reasons]` JSON object, for audit
//!
//! CSV lists (change times) are `;`-joined inside a single field so each pair
//! stays on one row. The table schema is fixed, so a columnar writer can
//! consume the same rows.

use crate::analysis::AnalysisReport;
use crate::cli::OutputFormat;
use crate::edge_counts::EdgeCount;
use crate::quarantine::{DisqualifyReason, QuarantineLedger};
use crate::route_changes::RouteChangeRow;
use anyhow::{Context, Result};
use indexmap::IndexMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Escape CSV field (handle commas, quotes, newlines)
fn escape_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

pub fn route_changes_csv(rows: &[RouteChangeRow]) -> String {
    let mut output = String::from("src,dest,sha,changetimes\n");
    for row in rows {
        let times: Vec<String> = row.changetimes.iter().map(i64::to_string).collect();
        output.push_str(&format!(
            "{},{},{},{}\n",
            escape_field(&row.src),
            escape_field(&row.dest),
            escape_field(&row.sha),
            times.join(";")
        ));
    }
    output
}

pub fn edges_csv(edges: &[EdgeCount]) -> String {
    let mut output = String::from("a,b,count\n");
    for edge in edges {
        output.push_str(&format!(
            "{},{},{}\n",
            escape_field(&edge.a),
            escape_field(&edge.b),
            edge.count
        ));
    }
    output
}

/// Ledger as an insertion-ordered JSON object keyed by `src -> dest`
pub fn ledger_json(ledger: &QuarantineLedger) -> Result<String> {
    let entries: IndexMap<String, &[DisqualifyReason]> = ledger
        .iter()
        .map(|(pair, reasons)| (pair.to_string(), reasons))
        .collect();
    serde_json::to_string_pretty(&entries).context("Failed to serialize quarantine ledger")
}

pub fn write_route_changes<W: Write>(mut out: W, rows: &[RouteChangeRow], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut out, rows).context("Failed to serialize route changes")?;
            writeln!(out)?;
        }
        OutputFormat::Csv | OutputFormat::Text => out.write_all(route_changes_csv(rows).as_bytes())?,
    }
    Ok(())
}

pub fn write_edges<W: Write>(mut out: W, edges: &[EdgeCount], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut out, edges).context("Failed to serialize edge counts")?;
            writeln!(out)?;
        }
        OutputFormat::Csv | OutputFormat::Text => out.write_all(edges_csv(edges).as_bytes())?,
    }
    Ok(())
}

/// Write every artifact of a report into `dir`, returning the files written
pub fn write_to_dir(report: &AnalysisReport, dir: &Path, format: OutputFormat) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    let ext = match format {
        OutputFormat::Json => "json",
        OutputFormat::Csv | OutputFormat::Text => "csv",
    };
    let mut written = Vec::new();

    let path = dir.join(format!("route_changes.{}", ext));
    write_route_changes(create(&path)?, &report.route_change_rows(), format)?;
    written.push(path);

    let path = dir.join(format!("edges.{}", ext));
    write_edges(create(&path)?, &report.all_edges(), format)?;
    written.push(path);

    let path = dir.join("quarantine.json");
    let mut out = create(&path)?;
    writeln!(out, "{}", ledger_json(report.graph.ledger())?)?;
    written.push(path);

    let path = dir.join("summary.json");
    let mut out = create(&path)?;
    serde_json::to_writer_pretty(&mut out, &report.summary).context("Failed to serialize summary")?;
    writeln!(out)?;
    written.push(path);

    Ok(written)
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}
