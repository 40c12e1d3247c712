//! # stylus-tree
//!
//! The navigation model: immutable arena documents, copyable node handles,
//! the fourteen axes with their lazy cursors, document order, and the
//! push-style builder that materialises documents from parser events.
//!
//! ```
//! use stylus_names::NamePool;
//! use stylus_tree::{Axis, BuildOptions, NodeKind, NodeTest, parse_document};
//!
//! let doc = parse_document("<a><b/><c/></a>", NamePool::new_shared(), BuildOptions::default())?;
//! let a = doc.document_element().unwrap();
//! let names: Vec<String> = a
//!     .axis(Axis::Child, NodeTest::Kind(NodeKind::Element))
//!     .map(|n| n.local_name().to_string())
//!     .collect();
//! assert_eq!(names, ["b", "c"]);
//! # Ok::<(), stylus_tree::BuildError>(())
//! ```
pub mod axis;
pub mod builder;
pub mod document;
pub mod error;
pub mod iter;
pub mod node;
pub mod number;
pub mod order;
pub mod stripper;
pub mod test;
pub mod xml;

pub use axis::{Axis, UnknownAxis};
pub use builder::{Attribute, BuildOptions, Receiver, TreeBuilder};
pub use document::{Document, DocumentId};
pub use error::{BuildError, Location};
pub use iter::AxisIter;
pub use node::{NodeKind, NodeRef, describe, path};
pub use order::{sort_in_document_order, union_in_document_order};
pub use stripper::{PreserveAll, SpacePolicy, StripAll, Stripper, is_whitespace};
pub use test::NodeTest;
pub use xml::{drive, parse_document, parse_document_with_policy};
