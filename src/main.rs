use anyhow::{Context, Result};
use clap::Parser;
use routegraph::analysis::{AnalysisReport, Analyzer, PairInput};
use routegraph::cli::{Cli, OutputFormat};
use routegraph::config::AnalysisConfig;
use routegraph::export;
use routegraph::source::{JsonLinesSource, SourceFilter};
use serde_json::json;
use std::io::{self, Write};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber; INFO by default, TRACE with --debug
fn init_tracing(debug: bool) {
    let level = if debug {
        tracing::Level::TRACE
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();
}

/// Load the config file (if any) and apply command-line overrides
fn load_config(args: &Cli) -> Result<AnalysisConfig> {
    let mut config = match &args.config {
        Some(path) => AnalysisConfig::from_file(path)?,
        None => AnalysisConfig::default(),
    };
    if let Some(n) = args.top_edges {
        config.output.top_edges = n;
    }
    if args.resymmetrize {
        config.stability.resymmetrize = true;
    }
    if args.derive_fingerprints {
        config.stability.derive_fingerprints = true;
    }
    if args.include_all {
        config.source = SourceFilter::permissive();
    }
    Ok(config)
}

fn print_text(report: &AnalysisReport, config: &AnalysisConfig) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write!(out, "{}", report.summary)?;

    let network = report.network(&config.output.network_name, config.output.top_edges)?;
    writeln!(out)?;
    writeln!(
        out,
        "Network {}: {} nodes, {} edges",
        network.name(),
        network.node_count(),
        network.edge_count()
    )?;
    writeln!(out, "─────────────────────────────────────────")?;
    for edge in report.top_edges(config.output.top_edges) {
        writeln!(out, "{:>10}  {} - {}", edge.count, edge.a, edge.b)?;
    }
    Ok(())
}

fn print_json(report: &AnalysisReport, config: &AnalysisConfig) -> Result<()> {
    let network = report.network(&config.output.network_name, config.output.top_edges)?;
    let value = json!({
        "summary": report.summary,
        "network": {
            "name": network.name(),
            "nodes": network.node_count(),
            "edges": report.top_edges(config.output.top_edges),
        },
    });
    let stdout = io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, &value).context("Failed to serialize report")?;
    writeln!(out)?;
    Ok(())
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.debug);

    let config = load_config(&args)?;
    let window = args.window()?;

    let source = JsonLinesSource::new(args.pairs.clone(), Some(args.traces.clone()))
        .with_filter(config.source.clone());
    let pair_input = if source.has_pair_statistics() {
        PairInput::SourceStatistics
    } else {
        info!("no pair statistics given, deriving them from trace records");
        PairInput::DerivedFromTraces
    };

    let report = Analyzer::new(config.clone())
        .with_pair_input(pair_input)
        .run(&source, &window)?;

    if source.malformed_lines() > 0 {
        warn!(lines = source.malformed_lines(), "skipped malformed input lines");
    }

    match args.format {
        OutputFormat::Text => print_text(&report, &config)?,
        OutputFormat::Json => print_json(&report, &config)?,
        OutputFormat::Csv => {
            export::write_route_changes(io::stdout().lock(), &report.route_change_rows(), OutputFormat::Csv)?;
            eprint!("{}", report.summary);
        }
    }

    if let Some(dir) = &args.output_dir {
        for path in export::write_to_dir(&report, dir, args.format)? {
            info!(path = %path.display(), "wrote output");
        }
    }

    Ok(())
}
