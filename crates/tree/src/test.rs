//! Node tests: the filter applied to each node an axis visits.
use crate::node::{NodeKind, NodeRef};
use std::fmt;
use std::sync::Arc;
use stylus_names::{Fingerprint, NameCode, NamePool, UriCode};

#[derive(Debug, Clone, PartialEq)]
pub enum NodeTest {
    /// `node()`: any node at all.
    AnyNode,
    /// A kind test such as `text()`, or `*` for the axis's principal kind.
    Kind(NodeKind),
    /// A node of the given kind with exactly this (URI, local name).
    Name(NodeKind, Fingerprint),
    /// `prefix:*`: a node of the given kind in the given namespace.
    Namespace(NodeKind, UriCode),
    /// `*:local`: a node of the given kind with this local name in any namespace.
    Local(NodeKind, Arc<str>),
}

impl NodeTest {
    /// Tests the kind and name of a node without materialising a handle.
    ///
    /// Name codes must come from `pool`; mixing pools is a programming error
    /// caught by a debug assertion.
    pub fn matches_parts(&self, kind: NodeKind, name: Option<NameCode>, pool: &NamePool) -> bool {
        match self {
            NodeTest::AnyNode => true,
            NodeTest::Kind(k) => *k == kind,
            NodeTest::Name(k, fingerprint) => {
                *k == kind
                    && name.is_some_and(|code| {
                        debug_assert_eq!(code.pool(), fingerprint.pool(), "name code from a foreign pool");
                        code.fingerprint() == *fingerprint
                    })
            }
            NodeTest::Namespace(k, uri) => {
                *k == kind && name.is_some_and(|code| pool.uri_code(code).is_ok_and(|u| u == *uri))
            }
            NodeTest::Local(k, local) => {
                *k == kind
                    && name.is_some_and(|code| pool.local_name(code).is_ok_and(|l| l == *local))
            }
        }
    }

    pub fn matches(&self, node: &NodeRef<'_>) -> bool {
        self.matches_parts(node.kind(), node.name_code(), node.document().pool())
    }

    /// The single node kind this test can match, if it is restricted to one.
    pub fn node_kind(&self) -> Option<NodeKind> {
        match self {
            NodeTest::AnyNode => None,
            NodeTest::Kind(k)
            | NodeTest::Name(k, _)
            | NodeTest::Namespace(k, _)
            | NodeTest::Local(k, _) => Some(*k),
        }
    }

    pub fn fingerprint(&self) -> Option<Fingerprint> {
        match self {
            NodeTest::Name(_, fingerprint) => Some(*fingerprint),
            _ => None,
        }
    }

    /// Default priority of a pattern consisting of just this test: names 0,
    /// namespace or local wildcards -0.25, kind tests and `node()` -0.5.
    pub fn default_priority(&self) -> f64 {
        match self {
            NodeTest::Name(..) => 0.0,
            NodeTest::Namespace(..) | NodeTest::Local(..) => -0.25,
            NodeTest::Kind(_) | NodeTest::AnyNode => -0.5,
        }
    }
}

impl fmt::Display for NodeTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeTest::AnyNode => write!(f, "node()"),
            NodeTest::Kind(NodeKind::Element | NodeKind::Attribute | NodeKind::Namespace) => {
                write!(f, "*")
            }
            NodeTest::Kind(NodeKind::Root) => write!(f, "document-node()"),
            NodeTest::Kind(kind) => write!(f, "{}()", kind.name()),
            NodeTest::Name(kind, fp) => write!(f, "{}({:#x})", kind.name(), fp.bits()),
            NodeTest::Namespace(_, uri) => write!(f, "{{#{}}}*", uri.0),
            NodeTest::Local(_, local) => write!(f, "*:{}", local),
        }
    }
}
