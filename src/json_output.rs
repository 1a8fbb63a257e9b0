//! JSON output format for critical path results
//!
//! `servitrace --format json` prints one [`JsonOutput`] document per trace.

use crate::report::CriticalPathReport;
use serde::{Deserialize, Serialize};

/// Format tag written into every document
pub const FORMAT: &str = "servitrace-json-v1";

/// Top-level JSON document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonOutput {
    /// Crate version that produced the document
    pub version: String,
    /// Always [`FORMAT`]
    pub format: String,
    /// Extraction policy ("async" or "sync")
    pub algorithm: String,
    /// Async margin in trace-local units
    pub margin: u64,
    /// Span that ends the trace (head of the connectivity evidence)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_span: Option<String>,
    pub critical_path: CriticalPathReport,
}

impl JsonOutput {
    pub fn new(
        algorithm: &str,
        margin: u64,
        end_span: Option<String>,
        critical_path: CriticalPathReport,
    ) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            format: FORMAT.to_string(),
            algorithm: algorithm.to_string(),
            margin,
            end_span,
            critical_path,
        }
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
