//! Critical path report
//!
//! Flattens a [`CriticalPath`] into owned entries that latency-breakdown and
//! reporting tools can consume without holding on to the span tree.

use crate::critical_path::CriticalPath;
use crate::span_tree::SpanTree;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One span on the critical path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub span_id: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub name: String,
    pub start_time: u64,
    pub end_time: u64,
    pub duration: u64,
}

/// Critical path of one trace in reporting form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriticalPathReport {
    /// Spans in path order
    pub spans: Vec<ReportEntry>,
    /// First span's start to last span's end
    pub end_to_end_duration: u64,
}

impl CriticalPathReport {
    pub fn new(tree: &SpanTree, path: &CriticalPath) -> Self {
        let spans = path
            .iter()
            .map(|id| {
                let span = &tree[id];
                ReportEntry {
                    span_id: span.span_id.clone(),
                    name: span.name.clone(),
                    start_time: span.start_time,
                    end_time: span.end_time,
                    duration: span.duration(),
                }
            })
            .collect();

        Self {
            spans,
            end_to_end_duration: path.end_to_end_duration(tree),
        }
    }

    /// Longest single span on the path (biggest bottleneck)
    pub fn longest_span(&self) -> Option<&ReportEntry> {
        self.spans.iter().max_by_key(|entry| entry.duration)
    }
}

impl fmt::Display for CriticalPathReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Critical path ({} spans)", self.spans.len())?;
        for entry in &self.spans {
            let label = if entry.name.is_empty() {
                entry.span_id.as_str()
            } else {
                entry.name.as_str()
            };
            writeln!(
                f,
                "  {:<24} start={:<12} end={:<12} duration={}",
                label, entry.start_time, entry.end_time, entry.duration
            )?;
        }
        write!(f, "End-to-end duration: {}", self.end_to_end_duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::ConnectivityEvidence;
    use crate::critical_path::critical_path;
    use crate::span_record::SpanRecord;

    fn report() -> CriticalPathReport {
        let tree = SpanTree::from_records(&[
            SpanRecord::new("s1", None, "api", 0, 50),
            SpanRecord::new("s2", Some("s1"), "", 10, 20),
            SpanRecord::new("s3", Some("s1"), "db", 30, 45),
        ])
        .unwrap();
        let evidence = ConnectivityEvidence::from_latest_end(&tree);
        critical_path(&tree, &evidence, tree.root())
            .unwrap()
            .report(&tree)
    }

    #[test]
    fn test_report_entries() {
        let report = report();

        let ids: Vec<&str> = report.spans.iter().map(|e| e.span_id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "s2", "s3"]);
        assert_eq!(report.spans[2].duration, 15);
        assert_eq!(report.end_to_end_duration, 45);
        assert_eq!(report.longest_span().unwrap().span_id, "s1");
    }

    #[test]
    fn test_report_text() {
        let text = report().to_string();

        assert!(text.starts_with("Critical path (3 spans)"));
        assert!(text.contains("api"));
        assert!(text.contains("s2")); // unnamed span falls back to its id
        assert!(text.ends_with("End-to-end duration: 45"));
    }

    #[test]
    fn test_report_json_skips_empty_names() {
        let json = serde_json::to_value(report()).unwrap();

        assert_eq!(json["spans"][0]["name"], "api");
        assert!(json["spans"][1].get("name").is_none());
        assert_eq!(json["end_to_end_duration"], 45);
    }
}
