//! Error types for trace construction and critical path extraction
//!
//! Heuristic-accuracy problems (misleading connectivity evidence, identical
//! zero-duration siblings) are not errors: the extractor still returns a
//! plausible path. Only structural contract violations end up here.

use thiserror::Error;

/// Errors raised while building a span tree or running an extraction
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TraceError {
    #[error("Span {span_id} ends before it starts (start={start_time}, end={end_time})")]
    InvalidTimestamps {
        span_id: String,
        start_time: u64,
        end_time: u64,
    },

    #[error("Duplicate span id: {0}")]
    DuplicateSpanId(String),

    #[error("Span {span_id} references unknown parent {parent_span_id}")]
    UnknownParent {
        span_id: String,
        parent_span_id: String,
    },

    #[error("Trace has no root span")]
    NoRoot,

    #[error("Trace has multiple root spans: {0:?}")]
    MultipleRoots(Vec<String>),

    #[error("Malformed trace: span {0} is its own ancestor")]
    Cycle(String),

    #[error("Trace contains no spans")]
    EmptyTrace,

    #[error("Span index {0} does not belong to this trace")]
    UnknownSpan(usize),

    #[error("Trace nesting exceeds the depth limit of {0}")]
    DepthLimitExceeded(usize),

    #[error("Trace has {0} spans, more than a span graph can index")]
    TooManySpans(usize),

    #[error("Failed to add parent-child edge: {0}")]
    Graph(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for trace operations
pub type Result<T> = std::result::Result<T, TraceError>;
