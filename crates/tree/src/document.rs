//! Arena storage for an immutable tree.
//!
//! Nodes other than attributes and namespaces live in one vector in document
//! order, so a node's index is its position in document order and the
//! descendants of node `n` are the contiguous run after `n` whose depth is
//! greater than `n`'s. Siblings are linked forwards through `next_sibling`;
//! the backwards links are derived on first use.
use crate::node::{NodeId, NodeKind, NodeRef, XML_NAMESPACE_DECL};
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use stylus_names::{Fingerprint, NameCode, NamePool, NamespaceCode, standard};

/// Process-unique document identity; orders nodes of different documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(u64);

impl DocumentId {
    pub(crate) fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        DocumentId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct NodeData {
    pub(crate) kind: NodeKind,
    pub(crate) depth: u32,
    pub(crate) parent: Option<u32>,
    pub(crate) next_sibling: Option<u32>,
    pub(crate) name: Option<NameCode>,
    /// Byte range in the shared character buffer (text, comment, PI data).
    pub(crate) content: (u32, u32),
    /// Index range into the attribute table.
    pub(crate) attributes: (u32, u32),
    /// Index range into the namespace declaration table.
    pub(crate) namespaces: (u32, u32),
}

#[derive(Debug, Clone)]
pub(crate) struct AttributeData {
    pub(crate) parent: u32,
    pub(crate) name: NameCode,
    pub(crate) value: Box<str>,
}

#[derive(Debug, Clone)]
pub(crate) struct NamespaceData {
    pub(crate) code: NamespaceCode,
    /// The prefix interned as a local name; `None` for the default namespace.
    pub(crate) name: Option<NameCode>,
    pub(crate) uri: Arc<str>,
}

/// An immutable tree built by [`TreeBuilder`](crate::TreeBuilder).
///
/// Documents are `Send + Sync`; any number of runs may navigate one
/// concurrently. The lazily built indexes are initialised at most once.
pub struct Document {
    id: DocumentId,
    pool: Arc<NamePool>,
    pub(crate) nodes: Vec<NodeData>,
    pub(crate) attributes: Vec<AttributeData>,
    pub(crate) namespaces: Vec<NamespaceData>,
    pub(crate) text: String,
    system_id: Option<String>,
    line_numbers: Option<Vec<u32>>,
    xml_namespace_name: Option<NameCode>,
    prior: OnceCell<Vec<Option<u32>>>,
    ids: OnceCell<HashMap<Box<str>, u32>>,
    element_lists: Mutex<HashMap<Fingerprint, Arc<[u32]>>>,
}

pub(crate) struct DocumentParts {
    pub(crate) nodes: Vec<NodeData>,
    pub(crate) attributes: Vec<AttributeData>,
    pub(crate) namespaces: Vec<NamespaceData>,
    pub(crate) text: String,
    pub(crate) system_id: Option<String>,
    pub(crate) line_numbers: Option<Vec<u32>>,
    pub(crate) xml_namespace_name: Option<NameCode>,
}

impl Document {
    pub(crate) fn from_parts(pool: Arc<NamePool>, parts: DocumentParts) -> Self {
        Document {
            id: DocumentId::next(),
            pool,
            nodes: parts.nodes,
            attributes: parts.attributes,
            namespaces: parts.namespaces,
            text: parts.text,
            system_id: parts.system_id,
            line_numbers: parts.line_numbers,
            xml_namespace_name: parts.xml_namespace_name,
            prior: OnceCell::new(),
            ids: OnceCell::new(),
            element_lists: Mutex::new(HashMap::new()),
        }
    }

    pub fn id(&self) -> DocumentId {
        self.id
    }

    /// The pool that issued every name code in this document.
    pub fn pool(&self) -> &Arc<NamePool> {
        &self.pool
    }

    pub fn root(&self) -> NodeRef<'_> {
        NodeRef::new(self, NodeId::Tree(0))
    }

    /// The document element, if the tree has one.
    pub fn document_element(&self) -> Option<NodeRef<'_>> {
        self.root().children().find(|n| n.kind() == NodeKind::Element)
    }

    pub fn system_id(&self) -> Option<&str> {
        self.system_id.as_deref()
    }

    /// Number of tree nodes, excluding attributes and namespace nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn attribute_count(&self) -> usize {
        self.attributes.len()
    }

    pub(crate) fn content(&self, index: u32) -> &str {
        let (start, end) = self.nodes[index as usize].content;
        &self.text[start as usize..end as usize]
    }

    pub(crate) fn line_number(&self, index: u32) -> Option<u32> {
        self.line_numbers
            .as_ref()
            .and_then(|lines| lines.get(index as usize).copied())
    }

    pub(crate) fn namespace_code(&self, decl: u32) -> NamespaceCode {
        if decl == XML_NAMESPACE_DECL {
            NamespaceCode::XML
        } else {
            self.namespaces[decl as usize].code
        }
    }

    pub(crate) fn namespace_name(&self, decl: u32) -> Option<NameCode> {
        if decl == XML_NAMESPACE_DECL {
            self.xml_namespace_name
        } else {
            self.namespaces[decl as usize].name
        }
    }

    pub(crate) fn namespace_uri(&self, decl: u32) -> &str {
        if decl == XML_NAMESPACE_DECL {
            standard::XML
        } else {
            &self.namespaces[decl as usize].uri
        }
    }

    /// Backward sibling links, derived once from the forward links.
    pub(crate) fn prior_sibling(&self, index: u32) -> Option<u32> {
        let prior = self.prior.get_or_init(|| {
            let mut prior = vec![None; self.nodes.len()];
            for (i, node) in self.nodes.iter().enumerate() {
                if let Some(next) = node.next_sibling {
                    prior[next as usize] = Some(i as u32);
                }
            }
            prior
        });
        prior[index as usize]
    }

    /// The element carrying `xml:id="id"`, if any.
    pub fn element_with_id(&self, id: &str) -> Option<NodeRef<'_>> {
        let ids = self.ids.get_or_init(|| {
            let mut ids = HashMap::new();
            if let Some(xml_id) = self.pool.fingerprint_for(standard::XML, "id") {
                for attr in &self.attributes {
                    if attr.name.fingerprint() == xml_id {
                        ids.entry(attr.value.trim().into()).or_insert(attr.parent);
                    }
                }
            }
            ids
        });
        ids.get(id).map(|&i| NodeRef::new(self, NodeId::Tree(i)))
    }

    /// All elements with the given name, in document order. The list is
    /// computed on first request and cached.
    pub fn all_elements(&self, name: Fingerprint) -> impl Iterator<Item = NodeRef<'_>> + '_ {
        let list = {
            let mut lists = self
                .element_lists
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            Arc::clone(lists.entry(name).or_insert_with(|| {
                self.nodes
                    .iter()
                    .enumerate()
                    .filter(|(_, n)| {
                        n.kind == NodeKind::Element && n.name.map(NameCode::fingerprint) == Some(name)
                    })
                    .map(|(i, _)| i as u32)
                    .collect()
            }))
        };
        (0..list.len()).map(move |i| NodeRef::new(self, NodeId::Tree(list[i])))
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("id", &self.id)
            .field("system_id", &self.system_id)
            .field("nodes", &self.nodes.len())
            .field("attributes", &self.attributes.len())
            .finish()
    }
}
