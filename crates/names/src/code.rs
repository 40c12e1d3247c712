//! Compact integer codes handed out by the name pool.
//!
//! A name code packs three fields into 28 bits:
//!
//! | Bits   | Field        | Meaning                                         |
//! |--------|--------------|-------------------------------------------------|
//! | 20..28 | prefix index | which prefix was used with the URI (0 = none)   |
//! | 10..20 | depth        | position of the entry in its hash chain         |
//! | 0..10  | hash slot    | `hash(local name) % 1023`                       |
//!
//! The low 20 bits form the fingerprint. Every code also remembers the
//! [`PoolId`] of the pool that issued it, so codes from different pools never
//! compare equal and resolving one against the wrong pool is detected.
use serde::{Deserialize, Serialize};
use std::fmt;

pub(crate) const FINGERPRINT_MASK: u32 = 0xf_ffff;
pub(crate) const SLOT_MASK: u32 = 0x3ff;

/// Process-unique identity of a [`NamePool`](crate::NamePool).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PoolId(pub(crate) u32);

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An interned (prefix, namespace URI, local name) triple.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NameCode {
    pool: PoolId,
    bits: u32,
}

impl NameCode {
    pub(crate) fn new(pool: PoolId, prefix_index: u32, depth: u32, slot: u32) -> Self {
        NameCode {
            pool,
            bits: (prefix_index << 20) | (depth << 10) | slot,
        }
    }

    pub(crate) fn from_raw(pool: PoolId, bits: u32) -> Self {
        NameCode { pool, bits }
    }

    /// The (URI, local name) identity of this code, ignoring the prefix.
    pub fn fingerprint(self) -> Fingerprint {
        Fingerprint {
            pool: self.pool,
            bits: self.bits & FINGERPRINT_MASK,
        }
    }

    pub fn prefix_index(self) -> u32 {
        (self.bits >> 20) & 0xff
    }

    pub fn pool(self) -> PoolId {
        self.pool
    }

    /// The raw integer encoding. Only meaningful together with the issuing pool.
    pub fn bits(self) -> u32 {
        self.bits
    }

    pub(crate) fn slot(self) -> u32 {
        self.bits & SLOT_MASK
    }

    pub(crate) fn depth(self) -> u32 {
        (self.bits >> 10) & SLOT_MASK
    }
}

impl fmt::Debug for NameCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NameCode({:#07x}@{})", self.bits, self.pool)
    }
}

/// Identifies a (namespace URI, local name) pair. Two names are the "same
/// name" for matching purposes exactly when their fingerprints are equal.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint {
    pool: PoolId,
    bits: u32,
}

impl Fingerprint {
    pub fn pool(self) -> PoolId {
        self.pool
    }

    pub fn bits(self) -> u32 {
        self.bits
    }

    /// The name code for this name written without a prefix.
    pub fn to_name_code(self) -> NameCode {
        NameCode::from_raw(self.pool, self.bits)
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({:#07x}@{})", self.bits, self.pool)
    }
}

impl From<NameCode> for Fingerprint {
    fn from(code: NameCode) -> Self {
        code.fingerprint()
    }
}

/// Index of a namespace URI in the pool's URI table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UriCode(pub u16);

impl UriCode {
    pub const NULL: UriCode = UriCode(0);
    pub const XML: UriCode = UriCode(1);
    pub const XSLT: UriCode = UriCode(2);
    pub const EXTENSIONS: UriCode = UriCode(3);
    pub const FUNCTIONS: UriCode = UriCode(4);
}

/// Index of a prefix in the pool's prefix table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PrefixCode(pub u16);

/// A (prefix, URI) binding as written in a namespace declaration:
/// `(prefix_code << 16) | uri_code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NamespaceCode(pub u32);

impl NamespaceCode {
    /// The undeclaration `xmlns=""`.
    pub const NULL: NamespaceCode = NamespaceCode(0);
    /// `xmlns:xml="http://www.w3.org/XML/1998/namespace"`, implicitly in scope everywhere.
    pub const XML: NamespaceCode = NamespaceCode((1 << 16) | 1);

    pub fn new(prefix: PrefixCode, uri: UriCode) -> Self {
        NamespaceCode(((prefix.0 as u32) << 16) | uri.0 as u32)
    }

    pub fn prefix_code(self) -> PrefixCode {
        PrefixCode((self.0 >> 16) as u16)
    }

    pub fn uri_code(self) -> UriCode {
        UriCode((self.0 & 0xffff) as u16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_code_fields_round_trip_through_bits() {
        let code = NameCode::new(PoolId(7), 3, 5, 1000);
        assert_eq!(code.prefix_index(), 3);
        assert_eq!(code.depth(), 5);
        assert_eq!(code.slot(), 1000);
        assert_eq!(code.fingerprint().bits(), (5 << 10) | 1000);
    }

    #[test]
    fn codes_from_different_pools_never_compare_equal() {
        let a = NameCode::new(PoolId(1), 0, 0, 10);
        let b = NameCode::new(PoolId(2), 0, 0, 10);
        assert_eq!(a.bits(), b.bits());
        assert_ne!(a, b);
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn namespace_code_packs_prefix_then_uri() {
        let code = NamespaceCode::new(PrefixCode(2), UriCode(9));
        assert_eq!(code.0, (2 << 16) | 9);
        assert_eq!(code.prefix_code(), PrefixCode(2));
        assert_eq!(code.uri_code(), UriCode(9));
    }
}
