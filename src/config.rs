// Configuration for critical path extraction
//
// The only tunable heuristic is the async margin: how far a child may end after
// its parent before the child counts as asynchronously invoked.

use crate::error::{Result, TraceError};
use serde::{Deserialize, Serialize};

/// Default async margin in trace-local time units
pub const DEFAULT_MARGIN: u64 = 1;

/// Default nesting limit for extraction
pub const DEFAULT_MAX_DEPTH: usize = 4096;

/// Configuration for critical path extraction
///
/// # Example
/// ```
/// use servitrace::config::CriticalPathConfig;
///
/// let config = CriticalPathConfig::default();
/// assert_eq!(config.margin, 1);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriticalPathConfig {
    /// Tolerance for end-time comparisons in `is_async`
    ///
    /// A child is async when `child.end_time > parent.end_time + margin`.
    /// Services reporting timestamps at different resolutions (ms vs µs)
    /// produce children that appear to outlive their parent by less than one
    /// coarse tick; the margin keeps those classified as synchronous.
    ///
    /// - 0: exact comparison
    /// - 1 (default): absorbs rounding of same-resolution timestamps
    /// - 999: absorbs ms vs µs mixing when the trace unit is µs
    pub margin: u64,

    /// Maximum call nesting depth followed during extraction
    ///
    /// Real traces nest a few dozen levels at most; anything deeper is almost
    /// certainly a broken correlation and is rejected. The walk itself keeps
    /// its frames on the heap, so the limit bounds memory, not stack use.
    pub max_depth: usize,
}

impl Default for CriticalPathConfig {
    fn default() -> Self {
        Self {
            margin: DEFAULT_MARGIN,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl CriticalPathConfig {
    /// Exact timestamp comparison (no margin)
    pub fn strict() -> Self {
        Self {
            margin: 0,
            ..Self::default()
        }
    }

    /// Margin for µs traces mixing in ms-resolution services
    pub fn coarse() -> Self {
        Self {
            margin: 999,
            ..Self::default()
        }
    }

    /// Override the async margin
    pub fn with_margin(mut self, margin: u64) -> Self {
        self.margin = margin;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_depth == 0 {
            return Err(TraceError::InvalidConfig(
                "max_depth must be >= 1".to_string(),
            ));
        }

        Ok(())
    }
}
