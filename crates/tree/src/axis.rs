//! The fourteen navigation axes and their ordering properties.
use crate::node::NodeKind;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Ancestor,
    AncestorOrSelf,
    Attribute,
    Child,
    Descendant,
    DescendantOrSelf,
    Following,
    FollowingSibling,
    Namespace,
    Parent,
    Preceding,
    PrecedingSibling,
    SelfAxis,
    /// Union of `preceding` and `ancestor` in one reverse pass. Internal: it
    /// has no surface syntax and exists for `level="any"` numbering.
    PrecedingOrAncestor,
}

/// `(forwards, reverse, peer, subtree)` per axis.
const PROPERTIES: [(Axis, bool, bool, bool, bool); 14] = [
    (Axis::Ancestor, false, true, false, false),
    (Axis::AncestorOrSelf, false, true, false, false),
    (Axis::Attribute, true, false, true, true),
    (Axis::Child, true, false, true, true),
    (Axis::Descendant, true, false, false, true),
    (Axis::DescendantOrSelf, true, false, false, true),
    (Axis::Following, true, false, false, false),
    (Axis::FollowingSibling, true, false, true, false),
    (Axis::Namespace, false, false, false, false),
    (Axis::Parent, true, true, true, false),
    (Axis::Preceding, false, true, false, false),
    (Axis::PrecedingSibling, false, true, true, false),
    (Axis::SelfAxis, true, true, true, true),
    (Axis::PrecedingOrAncestor, false, true, false, false),
];

impl Axis {
    pub const ALL: [Axis; 14] = [
        Axis::Ancestor,
        Axis::AncestorOrSelf,
        Axis::Attribute,
        Axis::Child,
        Axis::Descendant,
        Axis::DescendantOrSelf,
        Axis::Following,
        Axis::FollowingSibling,
        Axis::Namespace,
        Axis::Parent,
        Axis::Preceding,
        Axis::PrecedingSibling,
        Axis::SelfAxis,
        Axis::PrecedingOrAncestor,
    ];

    fn properties(self) -> (bool, bool, bool, bool) {
        let (_, forwards, reverse, peer, subtree) = PROPERTIES[self as usize];
        (forwards, reverse, peer, subtree)
    }

    /// Nodes are visited in increasing document order.
    pub fn is_forwards(self) -> bool {
        self.properties().0
    }

    /// Nodes are visited in decreasing document order.
    pub fn is_reverse(self) -> bool {
        self.properties().1
    }

    /// No result node is an ancestor of another result node.
    pub fn is_peer(self) -> bool {
        self.properties().2
    }

    /// Every result node is a descendant-or-self of the origin.
    pub fn is_subtree(self) -> bool {
        self.properties().3
    }

    /// The kind a name test or `*` selects on this axis.
    pub fn principal_node_kind(self) -> NodeKind {
        match self {
            Axis::Attribute => NodeKind::Attribute,
            Axis::Namespace => NodeKind::Namespace,
            _ => NodeKind::Element,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Axis::Ancestor => "ancestor",
            Axis::AncestorOrSelf => "ancestor-or-self",
            Axis::Attribute => "attribute",
            Axis::Child => "child",
            Axis::Descendant => "descendant",
            Axis::DescendantOrSelf => "descendant-or-self",
            Axis::Following => "following",
            Axis::FollowingSibling => "following-sibling",
            Axis::Namespace => "namespace",
            Axis::Parent => "parent",
            Axis::Preceding => "preceding",
            Axis::PrecedingSibling => "preceding-sibling",
            Axis::SelfAxis => "self",
            Axis::PrecedingOrAncestor => "preceding-or-ancestor",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownAxis(pub String);

impl fmt::Display for UnknownAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown axis '{}'", self.0)
    }
}

impl std::error::Error for UnknownAxis {}

impl FromStr for Axis {
    type Err = UnknownAxis;

    /// Parses an axis name as written in a path expression. The internal
    /// preceding-or-ancestor axis is deliberately not accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Axis::ALL
            .iter()
            .copied()
            .filter(|axis| *axis != Axis::PrecedingOrAncestor)
            .find(|axis| axis.name() == s)
            .ok_or_else(|| UnknownAxis(s.to_string()))
    }
}
