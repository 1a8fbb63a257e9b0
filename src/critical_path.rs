//! Critical path extraction for serverless traces
//!
//! The **critical path** is the chain of spans whose timing determines when
//! the trace completes. Shortening a span off the critical path does not make
//! the trace finish earlier.
//!
//! # Algorithm
//!
//! Both extractors are the same recursive walk, parameterized by a
//! [`RecursionPolicy`] that decides which children to follow:
//!
//! ```text
//! walk(span):
//!   path += span
//!   if evidence.top == span: evidence.pop
//!   children = sort(span.children)          // by end (and start)
//!   last = children.last
//!   for child in children[..last]:
//!     if policy.follow_sibling(child): walk(child)
//!   if policy.follow_last_child(last): walk(last)
//! ```
//!
//! The walk keeps its own frame stack instead of recursing, so deep call
//! chains cost heap, not thread stack. Each decision is still taken only
//! after the subtrees of all earlier siblings are finished, exactly as in the
//! recursive form above.
//!
//! `last` is evaluated strictly after its siblings so the path comes out in
//! chronological order. Appending the last child first (as the published
//! longest-path algorithm does) yields `[s1, s3, s2]` for two sequential calls
//! `s2` then `s3`.
//!
//! # Policies
//!
//! - [`SyncBaseline`]: every call blocks its parent. Siblings are followed
//!   when they finish before the last child starts; the last child is always
//!   followed. Async calls nested under a synchronous parent end up on the
//!   path by mistake.
//! - [`AsyncAware`]: a child that outlives its parent by more than the margin
//!   is async and only followed when the connectivity evidence says it leads
//!   to the end of the trace. Synchronous children are only followed while
//!   the path has not already branched into an async call.
//!
//! # Example
//!
//! ```
//! use servitrace::connectivity::ConnectivityEvidence;
//! use servitrace::critical_path::critical_path;
//! use servitrace::span_record::SpanRecord;
//! use servitrace::span_tree::SpanTree;
//!
//! # fn main() -> servitrace::error::Result<()> {
//! let tree = SpanTree::from_records(&[
//!     SpanRecord::new("s1", None, "api", 0, 50),
//!     SpanRecord::new("s2", Some("s1"), "publish", 10, 20),
//!     SpanRecord::new("s", Some("s1"), "db", 30, 40),
//!     SpanRecord::new("s3", Some("s2"), "worker", 70, 80),
//! ])?;
//! let evidence = ConnectivityEvidence::from_latest_end(&tree);
//!
//! let path = critical_path(&tree, &evidence, tree.root())?;
//!
//! assert_eq!(path.span_ids(&tree), vec!["s1", "s2", "s3"]);
//! # Ok(())
//! # }
//! ```

use crate::config::CriticalPathConfig;
use crate::connectivity::{ConnectivityEvidence, EvidenceCursor};
use crate::error::{Result, TraceError};
use crate::report::CriticalPathReport;
use crate::span_tree::{Span, SpanId, SpanTree};
use serde::Serialize;

/// Ordered spans forming a critical path, first span first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CriticalPath {
    spans: Vec<SpanId>,
}

impl CriticalPath {
    pub fn spans(&self) -> &[SpanId] {
        &self.spans
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn first(&self) -> Option<SpanId> {
        self.spans.first().copied()
    }

    pub fn last(&self) -> Option<SpanId> {
        self.spans.last().copied()
    }

    /// Check if a specific span is on the critical path
    pub fn contains(&self, id: SpanId) -> bool {
        self.spans.contains(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = SpanId> + '_ {
        self.spans.iter().copied()
    }

    /// External span ids along the path
    pub fn span_ids<'t>(&self, tree: &'t SpanTree) -> Vec<&'t str> {
        self.iter().map(|id| tree[id].span_id.as_str()).collect()
    }

    /// Time from the start of the first span to the end of the last one
    pub fn end_to_end_duration(&self, tree: &SpanTree) -> u64 {
        match (self.first(), self.last()) {
            (Some(first), Some(last)) => {
                tree[last].end_time.saturating_sub(tree[first].start_time)
            }
            _ => 0,
        }
    }

    /// Per-span breakdown for reporting
    pub fn report(&self, tree: &SpanTree) -> CriticalPathReport {
        CriticalPathReport::new(tree, self)
    }
}

/// Everything a policy may look at when deciding whether to follow a child
#[derive(Debug, Clone, Copy)]
pub struct Step<'a> {
    /// Span being expanded
    pub current: &'a Span,
    /// Candidate child
    pub child: &'a Span,
    /// Child that ends last (the candidate itself when deciding the last child)
    pub last_child: &'a Span,
    /// Span most recently appended to the path
    pub path_tail: &'a Span,
    /// Whether the candidate is the next span on the connectivity chain
    pub on_evidence: bool,
    pub margin: u64,
}

impl Step<'_> {
    pub fn child_is_async(&self) -> bool {
        self.current.is_async_within(self.child, self.margin)
    }

    /// Whether the path already continues into an async call of `current`
    pub fn tail_is_async(&self) -> bool {
        self.current.is_async_within(self.path_tail, self.margin)
    }
}

/// Decides which children a critical path walk recurses into
pub trait RecursionPolicy {
    /// Short name used in logs and reports
    fn name(&self) -> &'static str;

    /// Whether children with equal end times are ordered by start time
    fn tie_break_on_start(&self) -> bool;

    /// Decision for every child except the one ending last
    fn follow_sibling(&self, step: &Step<'_>) -> bool;

    /// Decision for the child ending last, taken after all siblings
    fn follow_last_child(&self, step: &Step<'_>) -> bool;
}

/// Longest path under the assumption that every call is synchronous
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncBaseline;

impl RecursionPolicy for SyncBaseline {
    fn name(&self) -> &'static str {
        "sync"
    }

    fn tie_break_on_start(&self) -> bool {
        false
    }

    fn follow_sibling(&self, step: &Step<'_>) -> bool {
        step.child.happens_before(step.last_child)
    }

    fn follow_last_child(&self, _step: &Step<'_>) -> bool {
        true
    }
}

/// Critical path that tells async invocations apart using connectivity evidence
#[derive(Debug, Clone, Copy, Default)]
pub struct AsyncAware;

impl RecursionPolicy for AsyncAware {
    fn name(&self) -> &'static str {
        "async"
    }

    fn tie_break_on_start(&self) -> bool {
        true
    }

    fn follow_sibling(&self, step: &Step<'_>) -> bool {
        let child_async = step.child_is_async();
        (child_async && step.on_evidence)
            || (!child_async
                && step.child.happens_before(step.last_child)
                && !step.tail_is_async())
    }

    fn follow_last_child(&self, step: &Step<'_>) -> bool {
        let child_async = step.child_is_async();
        (child_async && step.on_evidence) || (!child_async && !step.tail_is_async())
    }
}

/// Critical path extractor bound to a policy and configuration
///
/// The extractor holds no per-trace state and can be shared across threads.
#[derive(Debug, Clone)]
pub struct CriticalPathExtractor<P = AsyncAware> {
    policy: P,
    config: CriticalPathConfig,
}

impl CriticalPathExtractor<AsyncAware> {
    /// Async-aware extractor
    pub fn new(config: CriticalPathConfig) -> Result<Self> {
        Self::with_policy(AsyncAware, config)
    }
}

impl CriticalPathExtractor<SyncBaseline> {
    /// Synchronous baseline extractor
    pub fn sync_baseline(config: CriticalPathConfig) -> Result<Self> {
        Self::with_policy(SyncBaseline, config)
    }
}

impl<P: RecursionPolicy> CriticalPathExtractor<P> {
    pub fn with_policy(policy: P, config: CriticalPathConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { policy, config })
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn config(&self) -> &CriticalPathConfig {
        &self.config
    }

    /// Extract the critical path starting at `from`
    ///
    /// # Errors
    ///
    /// - [`TraceError::UnknownSpan`] if `from` is not part of `tree`
    /// - [`TraceError::DepthLimitExceeded`] if nesting below `from` exceeds
    ///   `config.max_depth`
    pub fn extract(
        &self,
        tree: &SpanTree,
        evidence: &ConnectivityEvidence,
        from: SpanId,
    ) -> Result<CriticalPath> {
        tree.get(from)?;

        let mut walk = Walk {
            tree,
            policy: &self.policy,
            cursor: evidence.cursor(),
            margin: self.config.margin,
            max_depth: self.config.max_depth,
            path: Vec::new(),
        };
        walk.run(from)?;

        tracing::debug!(
            policy = self.policy.name(),
            from = %tree[from].span_id,
            spans = walk.path.len(),
            evidence_consumed = walk.cursor.is_exhausted(),
            "extracted critical path"
        );

        Ok(CriticalPath { spans: walk.path })
    }

    /// Extract the critical path of the whole trace
    pub fn extract_trace(
        &self,
        tree: &SpanTree,
        evidence: &ConnectivityEvidence,
    ) -> Result<CriticalPath> {
        self.extract(tree, evidence, tree.root())
    }
}

/// State of one extraction
struct Walk<'a, P> {
    tree: &'a SpanTree,
    policy: &'a P,
    cursor: EvidenceCursor<'a>,
    margin: u64,
    max_depth: usize,
    path: Vec<SpanId>,
}

/// A span whose children are being decided
struct Frame {
    id: SpanId,
    /// Sorted so the child ending last comes last
    children: Vec<SpanId>,
    next: usize,
    depth: usize,
}

impl<'a, P: RecursionPolicy> Walk<'a, P> {
    fn run(&mut self, from: SpanId) -> Result<()> {
        let tree = self.tree;
        let mut frames = vec![self.enter(from, 1)?];

        while let Some(frame) = frames.last_mut() {
            let (Some(&child), Some(&last_child)) =
                (frame.children.get(frame.next), frame.children.last())
            else {
                frames.pop();
                continue;
            };
            frame.next += 1;
            let is_last = frame.next == frame.children.len();
            let (current, depth) = (&tree[frame.id], frame.depth);

            let step = self.step(current, child, last_child);
            let follow = if is_last {
                self.policy.follow_last_child(&step)
            } else {
                self.policy.follow_sibling(&step)
            };
            tracing::trace!(
                parent = %current,
                child = %step.child,
                last = is_last,
                is_async = step.child_is_async(),
                on_evidence = step.on_evidence,
                follow,
                "child"
            );

            if follow {
                let next = self.enter(child, depth + 1)?;
                frames.push(next);
            }
        }

        Ok(())
    }

    /// Append `id` to the path and prepare its children
    fn enter(&mut self, id: SpanId, depth: usize) -> Result<Frame> {
        if depth > self.max_depth {
            return Err(TraceError::DepthLimitExceeded(self.max_depth));
        }

        self.path.push(id);
        self.cursor.advance_past(id);

        let tree = self.tree;
        let mut children = tree.children(id);
        if self.policy.tie_break_on_start() {
            children.sort_by_key(|&c| (tree[c].end_time, tree[c].start_time));
        } else {
            children.sort_by_key(|&c| tree[c].end_time);
        }

        Ok(Frame {
            id,
            children,
            next: 0,
            depth,
        })
    }

    fn step(&self, current: &'a Span, child: SpanId, last_child: SpanId) -> Step<'a> {
        let tree = self.tree;
        let tail = self.path.last().copied().unwrap_or(child);
        Step {
            current,
            child: &tree[child],
            last_child: &tree[last_child],
            path_tail: &tree[tail],
            on_evidence: self.cursor.is_top(child),
            margin: self.margin,
        }
    }
}

/// Async-aware critical path with the default configuration
pub fn critical_path(
    tree: &SpanTree,
    evidence: &ConnectivityEvidence,
    from: SpanId,
) -> Result<CriticalPath> {
    CriticalPathExtractor::new(CriticalPathConfig::default())?.extract(tree, evidence, from)
}

/// Synchronous baseline longest path with the default configuration
pub fn longest_path(tree: &SpanTree, from: SpanId) -> Result<CriticalPath> {
    CriticalPathExtractor::sync_baseline(CriticalPathConfig::default())?.extract(
        tree,
        &ConnectivityEvidence::empty(),
        from,
    )
}
