//! Connectivity evidence for asynchrony resolution
//!
//! Timestamps alone cannot prove that a child span was invoked asynchronously.
//! The extra evidence is topological: the ancestor chain from the span that
//! ends last in the whole trace up to the root. A child that clearly outlives
//! its parent is only followed when it lies on this chain.
//!
//! # Stack Order
//!
//! The chain is kept in stack order, `[end, ..., root]`. The top of the stack
//! (the last element) is the root, matched first when extraction starts at the
//! root, and each level of recursion that matches the current top moves one
//! step towards the end span.
//!
//! ```text
//! s1 (0..50)                     stack: [s3, s2, s1]
//! ├─ s2 (10..20)                          ▲       ▲
//! │  └─ s3 (70..80)  ← ends last          end     top
//! └─ s  (30..40)
//! ```
//!
//! The evidence itself is never mutated. Each extraction walks it with a
//! private [`EvidenceCursor`], so one `ConnectivityEvidence` can serve any
//! number of extractions, concurrently or in sequence.

use crate::error::Result;
use crate::span_tree::{SpanId, SpanTree};

/// Ancestor chain from the latest-ending span to the root, in stack order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectivityEvidence {
    chain: Vec<SpanId>,
}

impl ConnectivityEvidence {
    /// Evidence that never matches; only synchronous children are followed
    pub fn empty() -> Self {
        Self::default()
    }

    /// Wrap a chain supplied by an external correlation step
    ///
    /// `stack` is in stack order: `stack[0]` is the span that ends the trace
    /// and the last element is the root.
    pub fn from_stack(stack: Vec<SpanId>) -> Self {
        Self { chain: stack }
    }

    /// Derive the chain ending at `end` by following parent links
    pub fn from_end_span(tree: &SpanTree, end: SpanId) -> Result<Self> {
        let chain = tree.ancestors(end)?;
        tracing::debug!(
            end = %tree[end].span_id,
            depth = chain.len(),
            "derived connectivity evidence"
        );
        Ok(Self { chain })
    }

    /// Derive the chain for the span with the globally latest end time
    pub fn from_latest_end(tree: &SpanTree) -> Self {
        let end = tree.latest_ending_span();
        let chain = tree
            .ancestors(end)
            .unwrap_or_else(|_| vec![tree.root()]);
        Self { chain }
    }

    /// The part of the chain from the end span up to `from`, inclusive
    ///
    /// An extraction starting below the root must see `from` as the top of
    /// the stack, otherwise the cursor never moves. Empty when `from` is not
    /// on the chain: the end of the trace is not below it.
    pub fn rooted_at(&self, from: SpanId) -> Self {
        let chain = match self.chain.iter().position(|&id| id == from) {
            Some(pos) => self.chain[..=pos].to_vec(),
            None => Vec::new(),
        };
        Self { chain }
    }

    /// Span the chain leads to
    pub fn end_span(&self) -> Option<SpanId> {
        self.chain.first().copied()
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn contains(&self, id: SpanId) -> bool {
        self.chain.contains(&id)
    }

    /// The chain in stack order
    pub fn as_stack(&self) -> &[SpanId] {
        &self.chain
    }

    /// Fresh cursor positioned at the top of the stack
    pub fn cursor(&self) -> EvidenceCursor<'_> {
        EvidenceCursor {
            chain: &self.chain,
            remaining: self.chain.len(),
        }
    }
}

/// Read position inside a [`ConnectivityEvidence`]
///
/// Equivalent to popping a private copy of the stack: `top` is the next
/// unmatched ancestor, `advance_past` pops it.
#[derive(Debug, Clone)]
pub struct EvidenceCursor<'a> {
    chain: &'a [SpanId],
    remaining: usize,
}

impl EvidenceCursor<'_> {
    /// Next unmatched span, `None` once the chain is exhausted
    pub fn top(&self) -> Option<SpanId> {
        self.remaining
            .checked_sub(1)
            .and_then(|idx| self.chain.get(idx))
            .copied()
    }

    pub fn is_top(&self, id: SpanId) -> bool {
        self.top() == Some(id)
    }

    /// Pop the top if it is `id`; returns whether it moved
    pub fn advance_past(&mut self, id: SpanId) -> bool {
        if self.is_top(id) {
            self.remaining -= 1;
            true
        } else {
            false
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }
}
