//! CLI argument parsing for servitrace

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Output format for critical path results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format (default)
    Text,
    /// JSON format for machine parsing
    Json,
}

/// Critical path algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Algorithm {
    /// Async-aware extraction using connectivity evidence (default)
    Async,
    /// Synchronous baseline (treats every call as blocking)
    Sync,
}

#[derive(Parser, Debug)]
#[command(name = "servitrace")]
#[command(version)]
#[command(about = "Critical path extraction for serverless execution traces", long_about = None)]
pub struct Cli {
    /// JSON file containing an array of span records
    #[arg(value_name = "TRACE")]
    pub trace: PathBuf,

    /// Extraction algorithm
    #[arg(short, long, value_enum, default_value = "async")]
    pub algorithm: Algorithm,

    /// Output format (text or json)
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Async margin in trace time units (child counts as async past parent end + margin)
    #[arg(short, long, value_name = "UNITS", default_value = "1")]
    pub margin: u64,

    /// Span id that ends the trace (default: the span with the latest end time)
    #[arg(long = "end", value_name = "SPAN_ID")]
    pub end_span: Option<String>,

    /// Span id to start extraction from (default: the root span)
    #[arg(long = "from", value_name = "SPAN_ID")]
    pub from_span: Option<String>,

    /// Enable debug tracing output to stderr
    #[arg(long)]
    pub debug: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["servitrace", "trace.json"]);

        assert_eq!(cli.trace, PathBuf::from("trace.json"));
        assert_eq!(cli.algorithm, Algorithm::Async);
        assert_eq!(cli.format, OutputFormat::Text);
        assert_eq!(cli.margin, 1);
        assert!(cli.end_span.is_none());
        assert!(cli.from_span.is_none());
        assert!(!cli.debug);
    }

    #[test]
    fn test_all_flags() {
        let cli = Cli::parse_from([
            "servitrace",
            "--algorithm",
            "sync",
            "--format",
            "json",
            "-m",
            "999",
            "--end",
            "s3",
            "--from",
            "s2",
            "--debug",
            "trace.json",
        ]);

        assert_eq!(cli.algorithm, Algorithm::Sync);
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.margin, 999);
        assert_eq!(cli.end_span.as_deref(), Some("s3"));
        assert_eq!(cli.from_span.as_deref(), Some("s2"));
        assert!(cli.debug);
    }

    #[test]
    fn test_missing_trace_rejected() {
        assert!(Cli::try_parse_from(["servitrace"]).is_err());
    }
}
