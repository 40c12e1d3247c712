//! Lazy axis cursors. Each cursor only does work when `next()` is pulled.
use crate::axis::Axis;
use crate::document::Document;
use crate::node::{NodeId, NodeKind, NodeRef, XML_NAMESPACE_DECL};
use crate::test::NodeTest;
use stylus_names::{NamespaceCode, PrefixCode, UriCode};

#[derive(Debug, Clone)]
enum Cursor {
    Empty,
    /// At most one node (self, parent).
    Single(Option<NodeId>),
    /// Walks parent links; `pending` is the origin for ancestor-or-self.
    Ancestors { pending: Option<NodeId>, next: Option<u32> },
    /// Follows forward sibling links (child, following-sibling).
    Siblings { next: Option<u32> },
    /// Follows backward sibling links.
    PrecedingSiblings { next: Option<u32> },
    /// The contiguous run of nodes deeper than `depth` (descendants), after
    /// `pending` for descendant-or-self.
    Subtree {
        pending: Option<NodeId>,
        next: u32,
        depth: u32,
    },
    /// Every node from `next` to the end of the document (following).
    ToEnd { next: u32 },
    /// Backwards from `next`, skipping ancestors unless they are included.
    Preceding {
        next: Option<u32>,
        ancestor_depth: Option<u32>,
        include_ancestors: bool,
    },
    Attributes { next: u32, end: u32 },
    Namespaces(NamespaceCursor),
}

/// A cursor over the nodes reached along one axis from one origin.
///
/// Cloning a cursor is cheap and yields an independent cursor at the same
/// position, which is how [`AxisIter::last_position`] counts without
/// allocating.
#[derive(Debug, Clone)]
pub struct AxisIter<'d> {
    doc: &'d Document,
    test: NodeTest,
    cursor: Cursor,
}

impl<'d> AxisIter<'d> {
    pub(crate) fn new(origin: NodeRef<'d>, axis: Axis, test: NodeTest) -> Self {
        let doc = origin.doc;
        AxisIter {
            doc,
            test,
            cursor: cursor_for(doc, origin.id, axis),
        }
    }

    /// The number of nodes remaining on this cursor.
    pub fn last_position(&self) -> usize {
        match &self.cursor {
            Cursor::Empty => 0,
            Cursor::Single(id) => id
                .map(|id| self.accepts(id) as usize)
                .unwrap_or(0),
            _ => self.clone().count(),
        }
    }

    fn accepts(&self, id: NodeId) -> bool {
        let node = NodeRef::new(self.doc, id);
        self.test
            .matches_parts(node.kind(), node.name_code(), self.doc.pool())
    }

    fn accepts_tree(&self, index: u32) -> bool {
        let data = &self.doc.nodes[index as usize];
        self.test.matches_parts(data.kind, data.name, self.doc.pool())
    }

    fn advance(&mut self) -> Option<NodeId> {
        let doc = self.doc;
        loop {
            let candidate = match &mut self.cursor {
                Cursor::Empty => return None,
                Cursor::Single(id) => id.take()?,
                Cursor::Ancestors { pending, next } => match pending.take() {
                    Some(origin) => origin,
                    None => {
                        let index = (*next)?;
                        *next = doc.nodes[index as usize].parent;
                        NodeId::Tree(index)
                    }
                },
                Cursor::Siblings { next } => {
                    let index = (*next)?;
                    *next = doc.nodes[index as usize].next_sibling;
                    NodeId::Tree(index)
                }
                Cursor::PrecedingSiblings { next } => {
                    let index = (*next)?;
                    *next = doc.prior_sibling(index);
                    NodeId::Tree(index)
                }
                Cursor::Subtree {
                    pending,
                    next,
                    depth,
                } => match pending.take() {
                    Some(origin) => origin,
                    None => {
                        let index = *next;
                        if index as usize >= doc.nodes.len()
                            || doc.nodes[index as usize].depth <= *depth
                        {
                            return None;
                        }
                        *next += 1;
                        NodeId::Tree(index)
                    }
                },
                Cursor::ToEnd { next } => {
                    let index = *next;
                    if index as usize >= doc.nodes.len() {
                        return None;
                    }
                    *next += 1;
                    NodeId::Tree(index)
                }
                Cursor::Preceding {
                    next,
                    ancestor_depth,
                    include_ancestors,
                } => {
                    let mut index = (*next)?;
                    if !*include_ancestors {
                        // Walking backwards, the next node at the expected
                        // depth is the nearest ancestor not yet skipped.
                        loop {
                            match *ancestor_depth {
                                Some(depth) if doc.nodes[index as usize].depth == depth => {
                                    *ancestor_depth = depth.checked_sub(1);
                                    match index.checked_sub(1) {
                                        Some(previous) => index = previous,
                                        None => {
                                            *next = None;
                                            return None;
                                        }
                                    }
                                }
                                // Past the root, or not an ancestor: stop skipping.
                                Some(_) | None => break,
                            }
                        }
                    }
                    *next = index.checked_sub(1);
                    NodeId::Tree(index)
                }
                Cursor::Attributes { next, end } => {
                    if *next >= *end {
                        return None;
                    }
                    *next += 1;
                    NodeId::Attribute(*next - 1)
                }
                Cursor::Namespaces(cursor) => cursor.advance(doc)?,
            };
            let accepted = match candidate {
                NodeId::Tree(index) => self.accepts_tree(index),
                other => self.accepts(other),
            };
            if accepted {
                return Some(candidate);
            }
        }
    }
}

impl<'d> Iterator for AxisIter<'d> {
    type Item = NodeRef<'d>;

    fn next(&mut self) -> Option<Self::Item> {
        self.advance().map(|id| NodeRef::new(self.doc, id))
    }
}

fn cursor_for(doc: &Document, origin: NodeId, axis: Axis) -> Cursor {
    // Attribute and namespace nodes have no children or siblings; their
    // ancestors, preceding and following nodes are those of their element.
    let (tree_index, owner) = match origin {
        NodeId::Tree(i) => (Some(i), None),
        NodeId::Attribute(a) => (None, Some(doc.attributes[a as usize].parent)),
        NodeId::Namespace { element, .. } => (None, Some(element)),
    };

    match axis {
        Axis::SelfAxis => Cursor::Single(Some(origin)),
        Axis::Parent => Cursor::Single(
            tree_index
                .and_then(|i| doc.nodes[i as usize].parent)
                .or(owner)
                .map(NodeId::Tree),
        ),
        Axis::Ancestor => Cursor::Ancestors {
            pending: None,
            next: tree_index.and_then(|i| doc.nodes[i as usize].parent).or(owner),
        },
        Axis::AncestorOrSelf => Cursor::Ancestors {
            pending: Some(origin),
            next: tree_index.and_then(|i| doc.nodes[i as usize].parent).or(owner),
        },
        Axis::Child => match tree_index {
            Some(i) => Cursor::Siblings {
                next: first_child(doc, i),
            },
            None => Cursor::Empty,
        },
        Axis::Descendant => match tree_index {
            Some(i) => Cursor::Subtree {
                pending: None,
                next: i + 1,
                depth: doc.nodes[i as usize].depth,
            },
            None => Cursor::Empty,
        },
        Axis::DescendantOrSelf => match tree_index {
            Some(i) => Cursor::Subtree {
                pending: Some(origin),
                next: i + 1,
                depth: doc.nodes[i as usize].depth,
            },
            None => Cursor::Single(Some(origin)),
        },
        Axis::FollowingSibling => match tree_index {
            Some(i) => Cursor::Siblings {
                next: doc.nodes[i as usize].next_sibling,
            },
            None => Cursor::Empty,
        },
        Axis::PrecedingSibling => match tree_index {
            Some(i) if doc.nodes[i as usize].parent.is_some() => Cursor::PrecedingSiblings {
                next: doc.prior_sibling(i),
            },
            _ => Cursor::Empty,
        },
        Axis::Following => match (tree_index, owner) {
            (Some(i), _) => match following_start(doc, i) {
                Some(start) => Cursor::ToEnd { next: start },
                None => Cursor::Empty,
            },
            (None, Some(element)) => Cursor::ToEnd { next: element + 1 },
            (None, None) => Cursor::Empty,
        },
        Axis::Preceding | Axis::PrecedingOrAncestor => {
            let include_ancestors = axis == Axis::PrecedingOrAncestor;
            match (tree_index, owner) {
                (Some(i), _) => Cursor::Preceding {
                    next: i.checked_sub(1),
                    ancestor_depth: doc.nodes[i as usize].depth.checked_sub(1),
                    include_ancestors,
                },
                (None, Some(element)) => Cursor::Preceding {
                    next: if include_ancestors {
                        Some(element)
                    } else {
                        element.checked_sub(1)
                    },
                    ancestor_depth: doc.nodes[element as usize].depth.checked_sub(1),
                    include_ancestors,
                },
                (None, None) => Cursor::Empty,
            }
        }
        Axis::Attribute => match tree_index {
            Some(i) if doc.nodes[i as usize].kind == NodeKind::Element => {
                let (next, end) = doc.nodes[i as usize].attributes;
                Cursor::Attributes { next, end }
            }
            _ => Cursor::Empty,
        },
        Axis::Namespace => match tree_index {
            Some(i) if doc.nodes[i as usize].kind == NodeKind::Element => {
                Cursor::Namespaces(NamespaceCursor::new(doc, i))
            }
            _ => Cursor::Empty,
        },
    }
}

fn first_child(doc: &Document, index: u32) -> Option<u32> {
    let next = index as usize + 1;
    let depth = doc.nodes[index as usize].depth;
    (next < doc.nodes.len() && doc.nodes[next].depth == depth + 1).then_some(next as u32)
}

/// The first node after the subtree rooted at `index`.
fn following_start(doc: &Document, index: u32) -> Option<u32> {
    let mut current = index;
    loop {
        let node = &doc.nodes[current as usize];
        if let Some(next) = node.next_sibling {
            return Some(next);
        }
        current = node.parent?;
    }
}

/// In-scope namespaces of an element: its own declarations, then those of
/// each ancestor not overridden closer in, then the implicit `xml` binding.
#[derive(Debug, Clone)]
struct NamespaceCursor {
    owner: u32,
    current: Option<u32>,
    next_decl: u32,
    end_decl: u32,
    seen: Vec<PrefixCode>,
    xml_pending: bool,
}

impl NamespaceCursor {
    fn new(doc: &Document, element: u32) -> Self {
        let (next_decl, end_decl) = doc.nodes[element as usize].namespaces;
        NamespaceCursor {
            owner: element,
            current: Some(element),
            next_decl,
            end_decl,
            seen: Vec::new(),
            xml_pending: true,
        }
    }

    fn advance(&mut self, doc: &Document) -> Option<NodeId> {
        while let Some(element) = self.current {
            while self.next_decl < self.end_decl {
                let decl = self.next_decl;
                self.next_decl += 1;
                let code: NamespaceCode = doc.namespaces[decl as usize].code;
                let prefix = code.prefix_code();
                if self.seen.contains(&prefix) {
                    continue;
                }
                self.seen.push(prefix);
                // An undeclaration hides outer bindings of the prefix but is not itself a node.
                if code.uri_code() == UriCode::NULL {
                    continue;
                }
                return Some(NodeId::Namespace {
                    element: self.owner,
                    decl,
                });
            }
            self.current = doc.nodes[element as usize]
                .parent
                .filter(|&p| doc.nodes[p as usize].kind == NodeKind::Element);
            if let Some(parent) = self.current {
                (self.next_decl, self.end_decl) = doc.nodes[parent as usize].namespaces;
            }
        }
        if std::mem::take(&mut self.xml_pending)
            && !self.seen.contains(&NamespaceCode::XML.prefix_code())
        {
            return Some(NodeId::Namespace {
                element: self.owner,
                decl: XML_NAMESPACE_DECL,
            });
        }
        None
    }
}
