//! # stylus-names
//!
//! Interning of namespace-qualified names. Every element, attribute and
//! pattern name seen during a run is allocated in a [`NamePool`] and handled
//! afterwards as a [`NameCode`], so name comparison is an integer comparison.
//!
//! ```
//! use stylus_names::NamePool;
//!
//! let pool = NamePool::new();
//! let a = pool.allocate("xsl", "http://example/ns", "foo")?;
//! let b = pool.allocate("x", "http://example/ns", "foo")?;
//! assert_eq!(a.fingerprint(), b.fingerprint());
//! assert_ne!(a, b);
//! # Ok::<(), stylus_names::NamePoolError>(())
//! ```
pub mod code;
pub mod error;
pub mod pool;
pub mod snapshot;
pub mod standard;

pub use code::{Fingerprint, NameCode, NamespaceCode, PoolId, PrefixCode, UriCode};
pub use error::NamePoolError;
pub use pool::{NamePool, NamespaceResolver, split_qname};
pub use snapshot::PoolSnapshot;
