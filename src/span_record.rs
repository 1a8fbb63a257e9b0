//! Flat span record schema
//!
//! Trace correlation tools usually hand spans over as a flat list where each
//! record points at its parent by id. `SpanRecord` is that interchange shape;
//! [`SpanTree::from_records`](crate::span_tree::SpanTree::from_records) links
//! the records into a rooted tree.
//!
//! # JSON Layout
//!
//! ```text
//! [
//!   {"span_id": "s1", "name": "api", "start_time": 0, "end_time": 50},
//!   {"span_id": "s2", "parent_span_id": "s1", "start_time": 10, "end_time": 20}
//! ]
//! ```
//!
//! Timestamps are plain integers in a trace-local unit. All records of one
//! trace must use the same unit; mixing milliseconds and microseconds is what
//! the async margin in [`CriticalPathConfig`](crate::config::CriticalPathConfig)
//! is there to absorb.

use serde::{Deserialize, Serialize};

/// One span of a trace, as produced by trace correlation
///
/// Timestamps are unsigned integers. Collectors that report float epoch
/// seconds must convert to an integer unit first (e.g. microseconds since
/// the trace start) and pick the async margin in that unit.
///
/// # Example
///
/// ```
/// use servitrace::span_record::SpanRecord;
///
/// let span = SpanRecord::new("s2", Some("s1"), "db.query", 10, 20);
///
/// assert!(!span.is_root());
/// assert_eq!(span.duration(), 10);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SpanRecord {
    /// Identifier unique within the trace
    pub span_id: String,

    /// Parent span id
    ///
    /// - `None` marks the root span
    /// - `Some(id)` must name another record of the same trace
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub parent_span_id: Option<String>,

    /// Human-readable span name (e.g., "lambda.invoke", "dynamodb.put")
    #[serde(default)]
    pub name: String,

    /// Start timestamp in the trace-local unit
    pub start_time: u64,

    /// End timestamp in the trace-local unit
    pub end_time: u64,
}

impl SpanRecord {
    /// Create a new record
    pub fn new(
        span_id: impl Into<String>,
        parent_span_id: Option<&str>,
        name: impl Into<String>,
        start_time: u64,
        end_time: u64,
    ) -> Self {
        Self {
            span_id: span_id.into(),
            parent_span_id: parent_span_id.map(str::to_string),
            name: name.into(),
            start_time,
            end_time,
        }
    }

    /// Check if this is a root span (no parent)
    pub fn is_root(&self) -> bool {
        self.parent_span_id.is_none()
    }

    /// Span duration, zero when the timestamps are inverted
    pub fn duration(&self) -> u64 {
        self.end_time.saturating_sub(self.start_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_detection() {
        let root = SpanRecord::new("root", None, "root", 0, 10);
        let child = SpanRecord::new("child", Some("root"), "child", 1, 2);

        assert!(root.is_root());
        assert!(!child.is_root());
    }

    #[test]
    fn test_duration_saturates() {
        let span = SpanRecord::new("s", None, "s", 10, 4);
        assert_eq!(span.duration(), 0);
    }

    #[test]
    fn test_deserialize_minimal_record() {
        let json = r#"{"span_id": "s1", "start_time": 0, "end_time": 50}"#;
        let span: SpanRecord = serde_json::from_str(json).unwrap();

        assert_eq!(span.span_id, "s1");
        assert!(span.is_root());
        assert!(span.name.is_empty());
        assert_eq!(span.end_time, 50);
    }

    #[test]
    fn test_serialize_skips_missing_parent() {
        let root = SpanRecord::new("s1", None, "api", 0, 50);
        let json = serde_json::to_string(&root).unwrap();

        assert!(!json.contains("parent_span_id"));

        let child = SpanRecord::new("s2", Some("s1"), "db", 10, 20);
        let json = serde_json::to_string(&child).unwrap();
        assert!(json.contains(r#""parent_span_id":"s1""#));
    }
}
