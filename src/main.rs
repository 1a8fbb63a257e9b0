use anyhow::{Context, Result};
use clap::Parser;
use servitrace::cli::{Algorithm, Cli, OutputFormat};
use servitrace::config::CriticalPathConfig;
use servitrace::connectivity::ConnectivityEvidence;
use servitrace::critical_path::{CriticalPathExtractor, RecursionPolicy};
use servitrace::json_output::JsonOutput;
use servitrace::span_record::SpanRecord;
use servitrace::span_tree::{SpanId, SpanTree};
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Resolve a span id given on the command line
fn lookup(tree: &SpanTree, span_id: &str, flag: &str) -> Result<SpanId> {
    tree.find(span_id)
        .with_context(|| format!("{} span '{}' not found in trace", flag, span_id))
}

/// Run one extraction and format it for output
fn render<P: RecursionPolicy>(
    args: &Cli,
    tree: &SpanTree,
    evidence: &ConnectivityEvidence,
    extractor: &CriticalPathExtractor<P>,
    from: SpanId,
) -> Result<String> {
    let path = extractor.extract(tree, evidence, from)?;
    let report = path.report(tree);

    match args.format {
        OutputFormat::Text => Ok(report.to_string()),
        OutputFormat::Json => {
            let end_span = evidence.end_span().map(|id| tree[id].span_id.clone());
            let output = JsonOutput::new(
                extractor.policy().name(),
                extractor.config().margin,
                end_span,
                report,
            );
            Ok(output.to_json()?)
        }
    }
}

fn main() -> Result<()> {
    let args = Cli::parse();

    init_tracing(args.debug);

    let input = std::fs::read_to_string(&args.trace)
        .with_context(|| format!("Failed to read trace file {}", args.trace.display()))?;
    let records: Vec<SpanRecord> = serde_json::from_str(&input)
        .with_context(|| format!("Failed to parse span records from {}", args.trace.display()))?;

    let tree = SpanTree::from_records(&records).context("Malformed trace")?;

    let evidence = match &args.end_span {
        Some(end) => ConnectivityEvidence::from_end_span(&tree, lookup(&tree, end, "--end")?)?,
        None => ConnectivityEvidence::from_latest_end(&tree),
    };
    let (from, evidence) = match &args.from_span {
        Some(from) => {
            let from = lookup(&tree, from, "--from")?;
            (from, evidence.rooted_at(from))
        }
        None => (tree.root(), evidence),
    };

    let config = CriticalPathConfig::default().with_margin(args.margin);
    let report = match args.algorithm {
        Algorithm::Async => {
            let extractor = CriticalPathExtractor::new(config)?;
            render(&args, &tree, &evidence, &extractor, from)?
        }
        Algorithm::Sync => {
            let extractor = CriticalPathExtractor::sync_baseline(config)?;
            render(&args, &tree, &evidence, &extractor, from)?
        }
    };
    println!("{}", report);

    Ok(())
}
