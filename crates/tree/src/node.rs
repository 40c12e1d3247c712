//! Node handles: a copyable reference to one node of an immutable [`Document`].
use crate::axis::Axis;
use crate::document::Document;
use crate::iter::AxisIter;
use crate::order;
use crate::test::NodeTest;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use stylus_names::{Fingerprint, NameCode, NamespaceCode};

/// The closed set of node kinds of the data model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKind {
    Root,
    Element,
    Attribute,
    Text,
    Comment,
    ProcessingInstruction,
    Namespace,
}

impl NodeKind {
    pub const ALL: [NodeKind; 7] = [
        NodeKind::Root,
        NodeKind::Element,
        NodeKind::Attribute,
        NodeKind::Text,
        NodeKind::Comment,
        NodeKind::ProcessingInstruction,
        NodeKind::Namespace,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            NodeKind::Root => "document-node",
            NodeKind::Element => "element",
            NodeKind::Attribute => "attribute",
            NodeKind::Text => "text",
            NodeKind::Comment => "comment",
            NodeKind::ProcessingInstruction => "processing-instruction",
            NodeKind::Namespace => "namespace",
        }
    }
}

/// Sentinel declaration index for the implicit `xml` namespace node.
pub(crate) const XML_NAMESPACE_DECL: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum NodeId {
    Tree(u32),
    Attribute(u32),
    /// The namespace node of `element` for the declaration at index `decl`,
    /// which may belong to an ancestor of `element`.
    Namespace { element: u32, decl: u32 },
}

/// A lightweight handle to a node. Copying it is free; it borrows the
/// document, which owns all storage. Parents are reached by index, never owned.
#[derive(Clone, Copy)]
pub struct NodeRef<'d> {
    pub(crate) doc: &'d Document,
    pub(crate) id: NodeId,
}

impl<'d> NodeRef<'d> {
    pub(crate) fn new(doc: &'d Document, id: NodeId) -> Self {
        NodeRef { doc, id }
    }

    pub fn document(&self) -> &'d Document {
        self.doc
    }

    pub fn kind(&self) -> NodeKind {
        match self.id {
            NodeId::Tree(i) => self.doc.nodes[i as usize].kind,
            NodeId::Attribute(_) => NodeKind::Attribute,
            NodeId::Namespace { .. } => NodeKind::Namespace,
        }
    }

    /// The name code, or `None` for unnamed kinds (root, text, comment, and
    /// the namespace node of the default namespace).
    pub fn name_code(&self) -> Option<NameCode> {
        match self.id {
            NodeId::Tree(i) => self.doc.nodes[i as usize].name,
            NodeId::Attribute(a) => Some(self.doc.attributes[a as usize].name),
            NodeId::Namespace { decl, .. } => self.doc.namespace_name(decl),
        }
    }

    pub fn fingerprint(&self) -> Option<Fingerprint> {
        self.name_code().map(NameCode::fingerprint)
    }

    /// The local part of the name; empty for unnamed nodes.
    pub fn local_name(&self) -> Arc<str> {
        self.name_code()
            .and_then(|code| self.doc.pool().local_name(code).ok())
            .unwrap_or_else(|| Arc::from(""))
    }

    /// The namespace URI of the name; empty for unnamed nodes and names in no namespace.
    pub fn uri(&self) -> Arc<str> {
        self.name_code()
            .and_then(|code| self.doc.pool().uri(code).ok())
            .unwrap_or_else(|| Arc::from(""))
    }

    pub fn prefix(&self) -> Arc<str> {
        self.name_code()
            .and_then(|code| self.doc.pool().prefix(code).ok())
            .unwrap_or_else(|| Arc::from(""))
    }

    /// The lexical name as written, `prefix:local`; empty for unnamed nodes.
    pub fn display_name(&self) -> String {
        self.name_code()
            .and_then(|code| self.doc.pool().display_name(code).ok())
            .unwrap_or_default()
    }

    /// Character content of text, comment and processing-instruction nodes.
    pub(crate) fn content(&self) -> &'d str {
        match self.id {
            NodeId::Tree(i) => self.doc.content(i),
            _ => "",
        }
    }

    /// The string value as defined by the data model: descendant text for
    /// roots and elements, the value for attributes, the URI for namespaces.
    pub fn string_value(&self) -> String {
        match self.id {
            NodeId::Tree(i) => match self.doc.nodes[i as usize].kind {
                NodeKind::Root | NodeKind::Element => {
                    let depth = self.doc.nodes[i as usize].depth;
                    let mut value = String::new();
                    let mut next = i as usize + 1;
                    while next < self.doc.nodes.len() && self.doc.nodes[next].depth > depth {
                        if self.doc.nodes[next].kind == NodeKind::Text {
                            value.push_str(self.doc.content(next as u32));
                        }
                        next += 1;
                    }
                    value
                }
                _ => self.doc.content(i).to_string(),
            },
            NodeId::Attribute(a) => self.doc.attributes[a as usize].value.to_string(),
            NodeId::Namespace { decl, .. } => self.doc.namespace_uri(decl).to_string(),
        }
    }

    pub fn parent(&self) -> Option<NodeRef<'d>> {
        let parent = match self.id {
            NodeId::Tree(i) => self.doc.nodes[i as usize].parent?,
            NodeId::Attribute(a) => self.doc.attributes[a as usize].parent,
            NodeId::Namespace { element, .. } => element,
        };
        Some(NodeRef::new(self.doc, NodeId::Tree(parent)))
    }

    /// A lazy cursor over `axis`, yielding only the nodes that satisfy `test`.
    pub fn axis(&self, axis: Axis, test: NodeTest) -> AxisIter<'d> {
        AxisIter::new(*self, axis, test)
    }

    pub fn children(&self) -> AxisIter<'d> {
        self.axis(Axis::Child, NodeTest::AnyNode)
    }

    pub fn attributes(&self) -> AxisIter<'d> {
        self.axis(Axis::Attribute, NodeTest::AnyNode)
    }

    pub fn attribute_value(&self, name: Fingerprint) -> Option<&'d str> {
        let NodeId::Tree(i) = self.id else {
            return None;
        };
        let (start, end) = self.doc.nodes[i as usize].attributes;
        self.doc.attributes[start as usize..end as usize]
            .iter()
            .find(|attr| attr.name.fingerprint() == name)
            .map(|attr| &*attr.value)
    }

    /// Namespace declarations written on this element itself (not inherited).
    pub fn declared_namespaces(&self) -> impl Iterator<Item = NamespaceCode> + 'd {
        let doc = self.doc;
        let range = match self.id {
            NodeId::Tree(i) => doc.nodes[i as usize].namespaces,
            _ => (0, 0),
        };
        (range.0..range.1).map(move |n| doc.namespaces[n as usize].code)
    }

    /// The namespace binding represented by a namespace node.
    pub fn namespace_code(&self) -> Option<NamespaceCode> {
        match self.id {
            NodeId::Namespace { decl, .. } => Some(self.doc.namespace_code(decl)),
            _ => None,
        }
    }

    pub fn is_root(&self) -> bool {
        self.id == NodeId::Tree(0)
    }

    pub fn root(&self) -> NodeRef<'d> {
        self.doc.root()
    }

    /// Document-order comparison; `Equal` only for the very same node.
    pub fn compare(&self, other: &NodeRef<'_>) -> Ordering {
        order::compare(self, other)
    }

    pub fn is_same_node(&self, other: &NodeRef<'_>) -> bool {
        std::ptr::eq(self.doc, other.doc) && self.id == other.id
    }

    /// True if `self` is a proper ancestor of `other`.
    pub fn is_ancestor_of(&self, other: &NodeRef<'_>) -> bool {
        if !std::ptr::eq(self.doc, other.doc) {
            return false;
        }
        let NodeId::Tree(a) = self.id else {
            return false;
        };
        let (owner, inclusive) = match other.id {
            NodeId::Tree(b) => (b, false),
            NodeId::Attribute(x) => (self.doc.attributes[x as usize].parent, true),
            NodeId::Namespace { element, .. } => (element, true),
        };
        let mut current = if inclusive {
            Some(owner)
        } else {
            self.doc.nodes[owner as usize].parent
        };
        while let Some(n) = current {
            if n <= a {
                return n == a;
            }
            current = self.doc.nodes[n as usize].parent;
        }
        false
    }

    /// A string identifier unique to this node among all live documents,
    /// stable for the lifetime of the document.
    pub fn generate_id(&self) -> String {
        let doc = self.doc.id();
        match self.id {
            NodeId::Tree(i) => format!("d{}n{}", doc, i),
            NodeId::Attribute(a) => format!("d{}a{}", doc, a),
            NodeId::Namespace { element, decl } if decl == XML_NAMESPACE_DECL => {
                format!("d{}n{}x", doc, element)
            }
            NodeId::Namespace { element, decl } => format!("d{}n{}s{}", doc, element, decl),
        }
    }

    /// The input line on which the node started, when line numbering was on.
    pub fn line_number(&self) -> Option<u32> {
        let index = match self.id {
            NodeId::Tree(i) => i,
            NodeId::Attribute(a) => self.doc.attributes[a as usize].parent,
            NodeId::Namespace { element, .. } => element,
        };
        self.doc.line_number(index)
    }

    pub(crate) fn tree_index(&self) -> Option<u32> {
        match self.id {
            NodeId::Tree(i) => Some(i),
            _ => None,
        }
    }
}

impl PartialEq for NodeRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.is_same_node(other)
    }
}

impl Eq for NodeRef<'_> {}

impl Hash for NodeRef<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.doc.id().hash(state);
        self.id.hash(state);
    }
}

impl PartialOrd for NodeRef<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NodeRef<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        order::compare(self, other)
    }
}

impl fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = self.kind();
        match kind {
            NodeKind::Element | NodeKind::Attribute | NodeKind::ProcessingInstruction => {
                write!(f, "{}({})[{}]", kind.name(), self.display_name(), self.generate_id())
            }
            _ => write!(f, "{}()[{}]", kind.name(), self.generate_id()),
        }
    }
}

/// A short human-readable description, used in diagnostics.
pub fn describe(node: &NodeRef<'_>) -> String {
    match node.kind() {
        NodeKind::Root => "/".to_string(),
        NodeKind::Element => format!("<{}>", node.display_name()),
        NodeKind::Attribute => format!("@{}", node.display_name()),
        NodeKind::Text => {
            let text = node.string_value();
            let short: String = text.chars().take(20).collect();
            if short.len() < text.len() {
                format!("text(\"{}...\")", short)
            } else {
                format!("text(\"{}\")", short)
            }
        }
        NodeKind::Comment => "comment()".to_string(),
        NodeKind::ProcessingInstruction => format!("processing-instruction({})", node.display_name()),
        NodeKind::Namespace => format!("namespace::{}", node.local_name()),
    }
}

/// An absolute path that identifies `node` within its document, such as
/// `/doc/list[1]/item[2]/@id`.
pub fn path(node: &NodeRef<'_>) -> String {
    let Some(parent) = node.parent() else {
        return "/".to_string();
    };
    let prefix = match path(&parent) {
        root if root == "/" => String::new(),
        other => other,
    };
    let number = crate::number::count_simple(node);
    match node.kind() {
        NodeKind::Root => "/".to_string(),
        NodeKind::Element => format!("{}/{}[{}]", prefix, node.display_name(), number),
        NodeKind::Attribute => format!("{}/@{}", prefix, node.display_name()),
        NodeKind::Text => format!("{}/text()[{}]", prefix, number),
        NodeKind::Comment => format!("{}/comment()[{}]", prefix, number),
        NodeKind::ProcessingInstruction => {
            format!("{}/processing-instruction()[{}]", prefix, number)
        }
        NodeKind::Namespace => format!("{}/namespace::{}", prefix, node.local_name()),
    }
}
