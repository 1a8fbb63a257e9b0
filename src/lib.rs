//! Servitrace - critical path extraction for serverless execution traces
//!
//! This library computes the chain of spans that determines when a
//! distributed trace completes, telling synchronous (blocking) child calls
//! apart from asynchronous (fire-and-forget) ones by combining timestamp
//! heuristics with connectivity evidence from trace correlation.

pub mod cli;
pub mod config;
pub mod connectivity;
pub mod critical_path;
pub mod error;
pub mod json_output;
pub mod report;
pub mod span_record;
pub mod span_tree;

pub use config::CriticalPathConfig;
pub use connectivity::ConnectivityEvidence;
pub use critical_path::{
    critical_path, longest_path, AsyncAware, CriticalPath, CriticalPathExtractor,
    RecursionPolicy, SyncBaseline,
};
pub use error::{Result, TraceError};
pub use span_tree::{Span, SpanId, SpanNode, SpanTree};
