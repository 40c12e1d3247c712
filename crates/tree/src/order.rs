//! Document order.
//!
//! Within one document a node's position is the triple
//! `(owner index, class, index)`: tree nodes are `(n, 0, 0)`, namespace nodes
//! of element `e` are `(e, 1, declaration)` and attributes of `e` are
//! `(e, 2, attribute)`. Because an element's children have larger indices
//! than the element, its namespaces and attributes sort between the element
//! and its first child. Nodes of different documents order by document id.
use crate::node::{NodeId, NodeRef};
use itertools::Itertools;
use std::cmp::Ordering;

pub(crate) fn sequence_key(node: &NodeRef<'_>) -> (u32, u8, u32) {
    match node.id {
        NodeId::Tree(i) => (i, 0, 0),
        NodeId::Namespace { element, decl } => (element, 1, decl),
        NodeId::Attribute(a) => (node.doc.attributes[a as usize].parent, 2, a),
    }
}

/// Compares two nodes in document order. Returns `Equal` only when both
/// handles denote the same node.
pub fn compare(a: &NodeRef<'_>, b: &NodeRef<'_>) -> Ordering {
    if !std::ptr::eq(a.doc, b.doc) {
        return a.doc.id().cmp(&b.doc.id());
    }
    sequence_key(a).cmp(&sequence_key(b))
}

/// Sorts into document order and removes duplicates.
pub fn sort_in_document_order(nodes: &mut Vec<NodeRef<'_>>) {
    nodes.sort_by(compare);
    nodes.dedup();
}

/// Merges two sequences that are each already in document order into one
/// duplicate-free sequence in document order.
pub fn union_in_document_order<'d>(
    a: impl IntoIterator<Item = NodeRef<'d>>,
    b: impl IntoIterator<Item = NodeRef<'d>>,
) -> Vec<NodeRef<'d>> {
    a.into_iter()
        .merge_by(b, |x, y| compare(x, y) != Ordering::Greater)
        .dedup()
        .collect()
}
