//! Span tree model
//!
//! A trace is a single rooted tree of timed spans. Span metadata lives in one
//! `Vec` addressed by [`SpanId`]; parent → child edges live in a
//! `trueno_graph::CsrGraph` keyed by the same index, weighted by the child's
//! duration. Identity is the index, so two spans with identical timestamps
//! are still distinct spans. Structural comparison goes through [`SpanNode`],
//! the owned recursive form used to write trees down in tests and fixtures.
//!
//! Every traversal here uses an explicit work stack, so arbitrarily deep
//! traces never exhaust the thread stack.
//!
//! # Example
//!
//! ```
//! use servitrace::span_tree::{SpanNode, SpanTree};
//!
//! # fn main() -> servitrace::error::Result<()> {
//! let trace = SpanNode::new(0, 6, vec![SpanNode::leaf(1, 3)]);
//! let tree = SpanTree::from_node(&trace)?;
//!
//! assert_eq!(tree.span_count(), 2);
//! assert_eq!(tree.to_node(tree.root())?, trace);
//! # Ok(())
//! # }
//! ```

use crate::config::DEFAULT_MARGIN;
use crate::error::{Result, TraceError};
use crate::span_record::SpanRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::ops::Index;
use trueno_graph::{CsrGraph, NodeId};

/// Index of a span inside its [`SpanTree`]
///
/// Thin wrapper over the graph's [`NodeId`] index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SpanId(u32);

impl SpanId {
    /// Position of the span in its tree
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Graph node backing this span
    pub fn node(self) -> NodeId {
        NodeId(self.0)
    }
}

impl From<NodeId> for SpanId {
    fn from(node: NodeId) -> Self {
        SpanId(node.0)
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Owned, recursive span description
///
/// Two nodes are equal when their timestamps match and their child lists are
/// recursively equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanNode {
    pub start_time: u64,
    pub end_time: u64,
    #[serde(default)]
    pub children: Vec<SpanNode>,
}

impl SpanNode {
    pub fn new(start_time: u64, end_time: u64, children: Vec<SpanNode>) -> Self {
        Self {
            start_time,
            end_time,
            children,
        }
    }

    /// Span without children
    pub fn leaf(start_time: u64, end_time: u64) -> Self {
        Self::new(start_time, end_time, Vec::new())
    }
}

impl fmt::Display for SpanNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.start_time, self.end_time)
    }
}

/// A span stored in a [`SpanTree`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    /// External identifier (record id, or preorder index for trees built from nodes)
    pub span_id: String,
    pub name: String,
    pub start_time: u64,
    pub end_time: u64,
    parent: Option<SpanId>,
    child_count: usize,
}

impl Span {
    /// Parent span, `None` for the root
    pub fn parent(&self) -> Option<SpanId> {
        self.parent
    }

    pub fn child_count(&self) -> usize {
        self.child_count
    }

    pub fn is_leaf(&self) -> bool {
        self.child_count == 0
    }

    pub fn duration(&self) -> u64 {
        self.end_time - self.start_time
    }

    /// True iff this span ends no later than `next` starts
    ///
    /// No tolerance is applied. Two consecutive spans with identical
    /// timestamps both satisfy this in either direction.
    pub fn happens_before(&self, next: &Span) -> bool {
        self.end_time <= next.start_time
    }

    /// True iff `next` clearly outlives this span, using [`DEFAULT_MARGIN`]
    pub fn is_async(&self, next: &Span) -> bool {
        self.is_async_within(next, DEFAULT_MARGIN)
    }

    /// True iff `next` ends more than `margin` units after this span
    ///
    /// Async children that finish before their parent look exactly like
    /// synchronous ones and are never flagged.
    pub fn is_async_within(&self, next: &Span, margin: u64) -> bool {
        next.end_time > self.end_time.saturating_add(margin)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}, {})", self.span_id, self.start_time, self.end_time)
    }
}

/// Rooted, acyclic tree of spans for one trace
///
/// Construction validates every invariant the extractors rely on:
/// `start_time <= end_time` for all spans, exactly one root, and no cycles.
pub struct SpanTree {
    /// Parent → child edges (via trueno-graph)
    graph: CsrGraph,
    /// Span metadata indexed by `SpanId`
    spans: Vec<Span>,
    root: SpanId,
}

impl SpanTree {
    /// Build a tree from an owned node hierarchy
    ///
    /// Spans are numbered in preorder, so the root is `#0` and its first
    /// child `#1`. The preorder index doubles as `span_id`.
    pub fn from_node(root: &SpanNode) -> Result<Self> {
        let mut spans: Vec<Span> = Vec::new();
        let mut parents = Vec::new();
        let mut stack: Vec<(&SpanNode, Option<SpanId>)> = vec![(root, None)];

        while let Some((node, parent)) = stack.pop() {
            let id = SpanId(index_u32(spans.len())?);
            let span_id = id.0.to_string();

            if node.start_time > node.end_time {
                return Err(TraceError::InvalidTimestamps {
                    span_id,
                    start_time: node.start_time,
                    end_time: node.end_time,
                });
            }

            spans.push(Span {
                span_id,
                name: String::new(),
                start_time: node.start_time,
                end_time: node.end_time,
                parent,
                child_count: 0,
            });
            parents.push(parent);

            // Reversed so the first child is numbered next
            stack.extend(node.children.iter().rev().map(|child| (child, Some(id))));
        }

        Self::link(spans, &parents, SpanId(0))
    }

    /// Build a tree from flat span records linked by parent id
    ///
    /// Children keep the order in which their records appear.
    ///
    /// # Errors
    ///
    /// - [`TraceError::EmptyTrace`] for an empty slice
    /// - [`TraceError::InvalidTimestamps`] if a span ends before it starts
    /// - [`TraceError::DuplicateSpanId`] if two records share an id
    /// - [`TraceError::UnknownParent`] if a parent id is not in the slice
    /// - [`TraceError::Cycle`] if following parent links loops
    /// - [`TraceError::MultipleRoots`] if more than one record has no parent
    pub fn from_records(records: &[SpanRecord]) -> Result<Self> {
        if records.is_empty() {
            return Err(TraceError::EmptyTrace);
        }
        index_u32(records.len())?;

        let mut index_of: HashMap<&str, u32> = HashMap::with_capacity(records.len());
        for (idx, record) in records.iter().enumerate() {
            if record.start_time > record.end_time {
                return Err(TraceError::InvalidTimestamps {
                    span_id: record.span_id.clone(),
                    start_time: record.start_time,
                    end_time: record.end_time,
                });
            }
            if index_of.insert(record.span_id.as_str(), idx as u32).is_some() {
                return Err(TraceError::DuplicateSpanId(record.span_id.clone()));
            }
        }

        let mut parents = Vec::with_capacity(records.len());
        for record in records {
            let parent = match &record.parent_span_id {
                None => None,
                Some(parent_id) => match index_of.get(parent_id.as_str()) {
                    Some(&idx) => Some(SpanId(idx)),
                    None => {
                        return Err(TraceError::UnknownParent {
                            span_id: record.span_id.clone(),
                            parent_span_id: parent_id.clone(),
                        })
                    }
                },
            };
            parents.push(parent);
        }

        detect_cycle(&parents).map_err(|idx| TraceError::Cycle(records[idx].span_id.clone()))?;

        let roots: Vec<usize> = (0..records.len())
            .filter(|&i| parents[i].is_none())
            .collect();
        let root = match roots.as_slice() {
            [] => return Err(TraceError::NoRoot),
            [root] => SpanId(*root as u32),
            many => {
                return Err(TraceError::MultipleRoots(
                    many.iter().map(|&i| records[i].span_id.clone()).collect(),
                ))
            }
        };

        let spans: Vec<Span> = records
            .iter()
            .zip(&parents)
            .map(|(record, &parent)| Span {
                span_id: record.span_id.clone(),
                name: record.name.clone(),
                start_time: record.start_time,
                end_time: record.end_time,
                parent,
                child_count: 0,
            })
            .collect();

        let tree = Self::link(spans, &parents, root)?;
        tracing::debug!(
            spans = tree.spans.len(),
            edges = tree.graph.num_edges(),
            root = %tree[root].span_id,
            "built span tree"
        );

        Ok(tree)
    }

    /// Add one parent → child edge per span, weighted by the child's duration
    fn link(mut spans: Vec<Span>, parents: &[Option<SpanId>], root: SpanId) -> Result<Self> {
        let mut graph = CsrGraph::new();

        for (idx, parent) in parents.iter().enumerate() {
            let Some(parent) = *parent else {
                continue;
            };
            let child = SpanId(idx as u32);
            let weight = spans[idx].duration() as f32;
            graph
                .add_edge(parent.node(), child.node(), weight)
                .map_err(|e| TraceError::Graph(e.to_string()))?;
            spans[parent.index()].child_count += 1;
        }

        Ok(Self { graph, spans, root })
    }

    pub fn root(&self) -> SpanId {
        self.root
    }

    /// Number of spans in the trace (always at least one)
    pub fn span_count(&self) -> usize {
        self.spans.len()
    }

    /// Look up a span, failing for ids from another tree
    pub fn get(&self, id: SpanId) -> Result<&Span> {
        self.spans.get(id.index()).ok_or(TraceError::UnknownSpan(id.index()))
    }

    pub fn contains(&self, id: SpanId) -> bool {
        id.index() < self.spans.len()
    }

    /// Children of `id` in recorded order
    ///
    /// Child ids grow with record order (and preorder for trees built from
    /// nodes), so sorting the adjacency by id restores it.
    pub fn children(&self, id: SpanId) -> Vec<SpanId> {
        if self.get(id).map_or(true, Span::is_leaf) {
            return Vec::new();
        }
        let (neighbors, _weights) = self.graph.adjacency(id.node());
        let mut children: Vec<SpanId> = neighbors.iter().map(|&n| SpanId(n)).collect();
        children.sort_unstable();
        children
    }

    /// Number of parent → child edges
    pub fn edge_count(&self) -> usize {
        self.graph.num_edges()
    }

    /// Find a span by its external id
    pub fn find(&self, span_id: &str) -> Option<SpanId> {
        self.spans
            .iter()
            .position(|span| span.span_id == span_id)
            .map(|idx| SpanId(idx as u32))
    }

    pub fn iter(&self) -> impl Iterator<Item = (SpanId, &Span)> {
        self.spans
            .iter()
            .enumerate()
            .map(|(i, span)| (SpanId(i as u32), span))
    }

    /// The span that determines the trace's end
    ///
    /// Maximal by `(end_time, start_time)`; on a full tie the span stored
    /// last wins.
    pub fn latest_ending_span(&self) -> SpanId {
        self.iter()
            .max_by_key(|(_, span)| (span.end_time, span.start_time))
            .map(|(id, _)| id)
            .unwrap_or(self.root)
    }

    /// Chain from `id` up to the root, both inclusive
    pub fn ancestors(&self, id: SpanId) -> Result<Vec<SpanId>> {
        let mut chain = vec![id];
        let mut current = self.get(id)?;
        while let Some(parent) = current.parent {
            chain.push(parent);
            current = &self[parent];
        }
        Ok(chain)
    }

    /// Check whether `ancestor` lies on the parent chain of `id` (or is `id`)
    pub fn is_ancestor(&self, ancestor: SpanId, id: SpanId) -> bool {
        self.ancestors(id)
            .map(|chain| chain.contains(&ancestor))
            .unwrap_or(false)
    }

    /// Owned copy of the subtree rooted at `id`
    pub fn to_node(&self, id: SpanId) -> Result<SpanNode> {
        self.get(id)?;

        // Preorder puts every parent before its children, so building in
        // reverse finishes all children before their parent.
        let mut order = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            order.push(next);
            stack.extend(self.children(next));
        }

        let mut built: HashMap<SpanId, SpanNode> = HashMap::with_capacity(order.len());
        for &next in order.iter().rev() {
            let span = &self[next];
            let children = self
                .children(next)
                .into_iter()
                .filter_map(|child| built.remove(&child))
                .collect();
            built.insert(next, SpanNode::new(span.start_time, span.end_time, children));
        }

        built.remove(&id).ok_or(TraceError::UnknownSpan(id.index()))
    }
}

impl fmt::Debug for SpanTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpanTree")
            .field("spans", &self.spans)
            .field("edges", &self.graph.num_edges())
            .field("root", &self.root)
            .finish()
    }
}

impl Index<SpanId> for SpanTree {
    type Output = Span;

    fn index(&self, id: SpanId) -> &Span {
        &self.spans[id.index()]
    }
}

fn index_u32(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| TraceError::TooManySpans(len))
}

/// Walk every parent chain once; returns the index of a span on a cycle
fn detect_cycle(parents: &[Option<SpanId>]) -> std::result::Result<(), usize> {
    const UNVISITED: u8 = 0;
    const IN_PROGRESS: u8 = 1;
    const DONE: u8 = 2;

    let mut state = vec![UNVISITED; parents.len()];
    let mut walk = Vec::new();

    for start in 0..parents.len() {
        let mut current = Some(start);
        while let Some(idx) = current {
            match state[idx] {
                DONE => break,
                IN_PROGRESS => return Err(idx),
                _ => {
                    state[idx] = IN_PROGRESS;
                    walk.push(idx);
                    current = parents[idx].map(SpanId::index);
                }
            }
        }
        for idx in walk.drain(..) {
            state[idx] = DONE;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, parent: Option<&str>, start: u64, end: u64) -> SpanRecord {
        SpanRecord::new(id, parent, id, start, end)
    }

    #[test]
    fn test_happens_before() {
        let tree = SpanTree::from_node(&SpanNode::new(
            0,
            50,
            vec![SpanNode::leaf(10, 20), SpanNode::leaf(20, 40), SpanNode::leaf(15, 30)],
        ))
        .unwrap();
        let (a, b, c) = (&tree[SpanId(1)], &tree[SpanId(2)], &tree[SpanId(3)]);

        assert!(a.happens_before(b)); // touching counts
        assert!(!a.happens_before(c));
        assert!(!b.happens_before(a));
    }

    #[test]
    fn test_is_async_margin() {
        let tree = SpanTree::from_node(&SpanNode::new(
            0,
            10,
            vec![SpanNode::leaf(5, 11), SpanNode::leaf(5, 12), SpanNode::leaf(1, 4)],
        ))
        .unwrap();
        let parent = &tree[tree.root()];

        assert!(!parent.is_async(&tree[SpanId(1)])); // within margin
        assert!(parent.is_async(&tree[SpanId(2)]));
        assert!(!parent.is_async(&tree[SpanId(3)])); // ends before parent

        assert!(parent.is_async_within(&tree[SpanId(1)], 0));
        assert!(!parent.is_async_within(&tree[SpanId(2)], 2));
    }

    #[test]
    fn test_is_async_saturates() {
        let tree = SpanTree::from_node(&SpanNode::new(
            0,
            u64::MAX,
            vec![SpanNode::leaf(1, u64::MAX)],
        ))
        .unwrap();

        assert!(!tree[tree.root()].is_async(&tree[SpanId(1)]));
    }

    #[test]
    fn test_from_node_preorder_ids() {
        let trace = SpanNode::new(
            0,
            50,
            vec![
                SpanNode::new(10, 20, vec![SpanNode::leaf(70, 80)]),
                SpanNode::leaf(30, 40),
            ],
        );
        let tree = SpanTree::from_node(&trace).unwrap();

        assert_eq!(tree.span_count(), 4);
        assert_eq!(tree.edge_count(), 3);
        assert_eq!(tree.children(SpanId(0)), vec![SpanId(1), SpanId(3)]);
        assert_eq!(tree[SpanId(0)].child_count(), 2);
        assert!(tree.children(SpanId(3)).is_empty());
        assert_eq!(tree[SpanId(2)].parent(), Some(SpanId(1)));
        assert_eq!(tree[SpanId(2)].span_id, "2");
        assert_eq!(tree.to_node(tree.root()).unwrap(), trace);
    }

    #[test]
    fn test_structural_equality() {
        let a = SpanNode::new(0, 6, vec![SpanNode::leaf(1, 3)]);
        let b = SpanNode::new(0, 6, vec![SpanNode::leaf(1, 3)]);
        let c = SpanNode::new(0, 6, vec![SpanNode::leaf(1, 4)]);
        let d = SpanNode::new(0, 6, vec![SpanNode::leaf(1, 3), SpanNode::leaf(1, 3)]);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn test_leaf_children_not_shared() {
        let mut a = SpanNode::leaf(0, 1);
        let b = SpanNode::leaf(0, 1);
        a.children.push(SpanNode::leaf(0, 0));

        assert!(b.children.is_empty());
    }

    #[test]
    fn test_from_node_rejects_inverted_timestamps() {
        let trace = SpanNode::new(0, 10, vec![SpanNode::leaf(8, 3)]);
        let err = SpanTree::from_node(&trace).unwrap_err();

        assert_eq!(
            err,
            TraceError::InvalidTimestamps {
                span_id: "1".to_string(),
                start_time: 8,
                end_time: 3,
            }
        );
    }

    #[test]
    fn test_from_records_links_children_in_order() {
        let tree = SpanTree::from_records(&[
            record("c2", Some("root"), 30, 40),
            record("root", None, 0, 50),
            record("c1", Some("root"), 10, 20),
        ])
        .unwrap();

        let root = tree.find("root").unwrap();
        assert_eq!(tree.root(), root);
        assert_eq!(
            tree.children(root),
            vec![tree.find("c2").unwrap(), tree.find("c1").unwrap()]
        );
    }

    #[test]
    fn test_from_records_errors() {
        assert_eq!(SpanTree::from_records(&[]).unwrap_err(), TraceError::EmptyTrace);

        let dup = [record("a", None, 0, 1), record("a", Some("a"), 0, 1)];
        assert_eq!(
            SpanTree::from_records(&dup).unwrap_err(),
            TraceError::DuplicateSpanId("a".to_string())
        );

        let orphan = [record("a", None, 0, 1), record("b", Some("x"), 0, 1)];
        assert!(matches!(
            SpanTree::from_records(&orphan).unwrap_err(),
            TraceError::UnknownParent { .. }
        ));

        let two_roots = [record("a", None, 0, 1), record("b", None, 0, 1)];
        assert_eq!(
            SpanTree::from_records(&two_roots).unwrap_err(),
            TraceError::MultipleRoots(vec!["a".to_string(), "b".to_string()])
        );
    }

    #[test]
    fn test_from_records_detects_cycles() {
        let self_loop = [record("root", None, 0, 10), record("a", Some("a"), 1, 2)];
        assert_eq!(
            SpanTree::from_records(&self_loop).unwrap_err(),
            TraceError::Cycle("a".to_string())
        );

        let ring = [
            record("root", None, 0, 10),
            record("a", Some("c"), 1, 2),
            record("b", Some("a"), 1, 2),
            record("c", Some("b"), 1, 2),
        ];
        assert!(matches!(
            SpanTree::from_records(&ring).unwrap_err(),
            TraceError::Cycle(_)
        ));
    }

    #[test]
    fn test_latest_ending_span_and_ancestors() {
        let tree = SpanTree::from_records(&[
            record("s1", None, 0, 50),
            record("s2", Some("s1"), 10, 20),
            record("s", Some("s1"), 30, 40),
            record("s3", Some("s2"), 70, 80),
        ])
        .unwrap();

        let end = tree.latest_ending_span();
        assert_eq!(tree[end].span_id, "s3");

        let chain: Vec<&str> = tree
            .ancestors(end)
            .unwrap()
            .into_iter()
            .map(|id| tree[id].span_id.as_str())
            .collect();
        assert_eq!(chain, vec!["s3", "s2", "s1"]);

        assert!(tree.is_ancestor(tree.find("s2").unwrap(), end));
        assert!(!tree.is_ancestor(tree.find("s").unwrap(), end));
    }

    #[test]
    fn test_unknown_span_lookup() {
        let tree = SpanTree::from_node(&SpanNode::leaf(0, 1)).unwrap();

        assert!(tree.contains(SpanId(0)));
        assert_eq!(tree.get(SpanId(5)).unwrap_err(), TraceError::UnknownSpan(5));
        assert!(tree.ancestors(SpanId(5)).is_err());
    }
}
