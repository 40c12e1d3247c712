//! The name pool: a hash table of interned (URI, local name) entries plus
//! growable tables of prefixes and namespace URIs.
use crate::code::{Fingerprint, NameCode, NamespaceCode, PoolId, PrefixCode, UriCode};
use crate::error::NamePoolError;
use crate::standard::STANDARD_NAMESPACES;
use log::debug;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

const HASH_MODULUS: u32 = 1023;
pub(crate) const HASH_SLOTS: usize = 1024;

/// Maximum number of entries sharing one hash slot.
pub const MAX_CHAIN_DEPTH: u32 = 1024;
/// Maximum number of distinct non-empty prefixes used with one namespace URI.
pub const MAX_PREFIXES_PER_URI: usize = 255;
/// Hard ceiling on the number of distinct prefixes, and separately of URIs.
pub const MAX_TABLE_SIZE: usize = 32_000;

/// Maps a namespace prefix to its URI during name allocation.
pub trait NamespaceResolver {
    fn resolve_prefix(&self, prefix: &str) -> Option<String>;
}

impl NamespaceResolver for HashMap<String, String> {
    fn resolve_prefix(&self, prefix: &str) -> Option<String> {
        self.get(prefix).cloned()
    }
}

impl NamespaceResolver for BTreeMap<String, String> {
    fn resolve_prefix(&self, prefix: &str) -> Option<String> {
        self.get(prefix).cloned()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct NameEntry {
    pub(crate) uri: UriCode,
    pub(crate) local: Arc<str>,
    pub(crate) next: Option<u32>,
}

#[derive(Debug, Clone)]
pub(crate) struct UriEntry {
    pub(crate) uri: Arc<str>,
    /// Prefix index `i + 1` refers to `prefixes[i]`; index 0 is always the empty prefix.
    pub(crate) prefixes: Vec<PrefixCode>,
}

#[derive(Debug, Clone)]
pub(crate) struct Tables {
    pub(crate) slots: Vec<Option<u32>>,
    pub(crate) entries: Vec<NameEntry>,
    pub(crate) prefixes: Vec<Arc<str>>,
    pub(crate) uris: Vec<UriEntry>,
    pub(crate) sealed: bool,
}

impl Tables {
    fn standard() -> Self {
        let mut tables = Tables {
            slots: vec![None; HASH_SLOTS],
            entries: Vec::new(),
            prefixes: Vec::with_capacity(STANDARD_NAMESPACES.len()),
            uris: Vec::with_capacity(STANDARD_NAMESPACES.len()),
            sealed: false,
        };
        for (code, prefix, uri) in STANDARD_NAMESPACES {
            tables.prefixes.push(Arc::from(prefix));
            let prefixes = if prefix.is_empty() {
                Vec::new()
            } else {
                vec![PrefixCode(code.0)]
            };
            tables.uris.push(UriEntry {
                uri: Arc::from(uri),
                prefixes,
            });
        }
        tables
    }

    fn uri_code(&self, uri: &str) -> Option<UriCode> {
        self.uris
            .iter()
            .position(|entry| &*entry.uri == uri)
            .map(|i| UriCode(i as u16))
    }

    fn prefix_code(&self, prefix: &str) -> Option<PrefixCode> {
        self.prefixes
            .iter()
            .position(|p| &**p == prefix)
            .map(|i| PrefixCode(i as u16))
    }

    fn prefix_index(&self, uri: UriCode, prefix: &str) -> Option<u32> {
        if prefix.is_empty() {
            return Some(0);
        }
        let entry = self.uris.get(uri.0 as usize)?;
        entry
            .prefixes
            .iter()
            .position(|code| &*self.prefixes[code.0 as usize] == prefix)
            .map(|i| i as u32 + 1)
    }

    /// Walks the chain at `slot`. Returns the depth of the name (or the depth a
    /// new entry would take), its entry index if present, and the index of the
    /// last entry visited.
    fn find_in_chain(&self, slot: u32, uri: UriCode, local: &str) -> (u32, Option<u32>, Option<u32>) {
        let mut depth = 0;
        let mut last = None;
        let mut cursor = self.slots[slot as usize];
        while let Some(index) = cursor {
            let entry = &self.entries[index as usize];
            if entry.uri == uri && &*entry.local == local {
                return (depth, Some(index), last);
            }
            depth += 1;
            last = Some(index);
            cursor = entry.next;
        }
        (depth, None, last)
    }

    fn lookup(&self, prefix: &str, uri: &str, local: &str) -> Option<(u32, u32, u32)> {
        let uri_code = self.uri_code(uri)?;
        let prefix_index = self.prefix_index(uri_code, prefix)?;
        let slot = hash_slot(local);
        match self.find_in_chain(slot, uri_code, local) {
            (depth, Some(_), _) => Some((prefix_index, depth, slot)),
            _ => None,
        }
    }

    fn entry_at(&self, slot: u32, depth: u32) -> Option<&NameEntry> {
        let mut cursor = self.slots.get(slot as usize).copied().flatten();
        for _ in 0..depth {
            cursor = self.entries[cursor? as usize].next;
        }
        cursor.map(|index| &self.entries[index as usize])
    }

    fn allocate_uri(&mut self, uri: &str) -> Result<UriCode, NamePoolError> {
        if let Some(code) = self.uri_code(uri) {
            return Ok(code);
        }
        if self.sealed {
            return Err(NamePoolError::Sealed(format!("namespace URI '{}'", uri)));
        }
        if self.uris.len() >= MAX_TABLE_SIZE {
            return Err(NamePoolError::TooManyUris(MAX_TABLE_SIZE));
        }
        self.uris.push(UriEntry {
            uri: Arc::from(uri),
            prefixes: Vec::new(),
        });
        Ok(UriCode((self.uris.len() - 1) as u16))
    }

    fn allocate_prefix(&mut self, prefix: &str) -> Result<PrefixCode, NamePoolError> {
        if let Some(code) = self.prefix_code(prefix) {
            return Ok(code);
        }
        if self.sealed {
            return Err(NamePoolError::Sealed(format!("prefix '{}'", prefix)));
        }
        if self.prefixes.len() >= MAX_TABLE_SIZE {
            return Err(NamePoolError::TooManyPrefixCodes(MAX_TABLE_SIZE));
        }
        self.prefixes.push(Arc::from(prefix));
        Ok(PrefixCode((self.prefixes.len() - 1) as u16))
    }

    fn register_prefix_for_uri(&mut self, uri: UriCode, prefix: &str) -> Result<u32, NamePoolError> {
        if let Some(index) = self.prefix_index(uri, prefix) {
            return Ok(index);
        }
        let prefix_code = self.allocate_prefix(prefix)?;
        if self.sealed {
            return Err(NamePoolError::Sealed(format!("prefix '{}'", prefix)));
        }
        let entry = &mut self.uris[uri.0 as usize];
        if entry.prefixes.len() >= MAX_PREFIXES_PER_URI {
            return Err(NamePoolError::TooManyPrefixes {
                uri: entry.uri.to_string(),
                max: MAX_PREFIXES_PER_URI,
            });
        }
        entry.prefixes.push(prefix_code);
        Ok(entry.prefixes.len() as u32)
    }
}

/// Polynomial (base 31) hash over the UTF-16 code units, masked positive, modulo 1023.
pub(crate) fn hash_slot(local: &str) -> u32 {
    let hash = local
        .encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(unit as i32));
    ((hash & 0x7fff_ffff) as u32) % HASH_MODULUS
}

/// Interns qualified names into [`NameCode`]s.
///
/// A pool is shared, typically behind an `Arc`, by every stylesheet and
/// document of a run, and may be shared by concurrent runs. Allocation takes
/// an exclusive lock; resolving an existing code takes a shared lock and only
/// reads entries, which are never modified once appended.
///
/// Name codes are only meaningful for the pool that issued them. Resolving a
/// code against another pool returns [`NamePoolError::ForeignNameCode`].
#[derive(Debug)]
pub struct NamePool {
    id: PoolId,
    tables: RwLock<Tables>,
}

impl Default for NamePool {
    fn default() -> Self {
        Self::new()
    }
}

impl NamePool {
    /// Creates a pool with the standard namespaces pre-registered at fixed codes.
    pub fn new() -> Self {
        Self::from_tables(Tables::standard())
    }

    /// Convenience for simple callers: a fresh standard pool, ready to share.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub(crate) fn from_tables(tables: Tables) -> Self {
        static NEXT_ID: AtomicU32 = AtomicU32::new(1);
        NamePool {
            id: PoolId(NEXT_ID.fetch_add(1, Ordering::Relaxed)),
            tables: RwLock::new(tables),
        }
    }

    pub fn id(&self) -> PoolId {
        self.id
    }

    // Entries are append-only, so a poisoned lock still guards consistent data.
    pub(crate) fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Interns `(prefix, uri, local)`. Names with equal `(uri, local)` share a
    /// fingerprint whatever their prefix; equal triples yield equal codes.
    pub fn allocate(&self, prefix: &str, uri: &str, local: &str) -> Result<NameCode, NamePoolError> {
        if let Some((prefix_index, depth, slot)) = self.read().lookup(prefix, uri, local) {
            return Ok(NameCode::new(self.id, prefix_index, depth, slot));
        }

        let mut tables = self.write();
        let uri_code = tables.allocate_uri(uri)?;
        self.allocate_in(&mut tables, prefix, uri_code, local)
    }

    /// Interns a name whose URI is already registered.
    pub fn allocate_with_uri_code(
        &self,
        prefix: &str,
        uri: UriCode,
        local: &str,
    ) -> Result<NameCode, NamePoolError> {
        let mut tables = self.write();
        if uri.0 as usize >= tables.uris.len() {
            return Err(NamePoolError::UnknownNamespaceCode(uri.0 as u32));
        }
        self.allocate_in(&mut tables, prefix, uri, local)
    }

    fn allocate_in(
        &self,
        tables: &mut Tables,
        prefix: &str,
        uri: UriCode,
        local: &str,
    ) -> Result<NameCode, NamePoolError> {
        let slot = hash_slot(local);
        let (depth, found, last) = tables.find_in_chain(slot, uri, local);
        if found.is_none() {
            if depth >= MAX_CHAIN_DEPTH {
                return Err(NamePoolError::ChainTooDeep {
                    slot,
                    max: MAX_CHAIN_DEPTH as usize,
                });
            }
            if tables.sealed {
                return Err(NamePoolError::Sealed(local.to_string()));
            }
        }
        let prefix_index = tables.register_prefix_for_uri(uri, prefix)?;

        if found.is_none() {
            let index = tables.entries.len() as u32;
            tables.entries.push(NameEntry {
                uri,
                local: Arc::from(local),
                next: None,
            });
            match last {
                Some(previous) => tables.entries[previous as usize].next = Some(index),
                None => tables.slots[slot as usize] = Some(index),
            }
        }
        Ok(NameCode::new(self.id, prefix_index, depth, slot))
    }

    /// Interns a name written in Clark notation, `{uri}local` or plain `local`.
    pub fn allocate_clark_name(&self, clark: &str) -> Result<NameCode, NamePoolError> {
        match clark.strip_prefix('{') {
            Some(rest) => {
                let (uri, local) = rest
                    .split_once('}')
                    .ok_or_else(|| NamePoolError::InvalidQName(clark.to_string()))?;
                self.allocate("", uri, local)
            }
            None => self.allocate("", "", clark),
        }
    }

    /// Interns a lexical QName (`prefix:local` or `local`), resolving its prefix.
    ///
    /// An unprefixed name takes the resolver's binding for `""` only when
    /// `use_default_namespace` is set (element names do, attribute names don't).
    pub fn allocate_lexical(
        &self,
        qname: &str,
        resolver: &dyn NamespaceResolver,
        use_default_namespace: bool,
    ) -> Result<NameCode, NamePoolError> {
        let (prefix, local) = split_qname(qname)?;
        let uri = match prefix {
            "" if !use_default_namespace => String::new(),
            "" => resolver.resolve_prefix("").unwrap_or_default(),
            "xml" => crate::standard::XML.to_string(),
            p => resolver
                .resolve_prefix(p)
                .ok_or_else(|| NamePoolError::UndeclaredPrefix(p.to_string()))?,
        };
        self.allocate(prefix, &uri, local)
    }

    /// Read-only lookup; never allocates, so it is safe on a sealed pool.
    pub fn fingerprint_for(&self, uri: &str, local: &str) -> Option<Fingerprint> {
        let tables = self.read();
        let uri_code = tables.uri_code(uri)?;
        let slot = hash_slot(local);
        match tables.find_in_chain(slot, uri_code, local) {
            (depth, Some(_), _) => Some(NameCode::new(self.id, 0, depth, slot).fingerprint()),
            _ => None,
        }
    }

    fn check_pool(&self, code: NameCode) -> Result<(), NamePoolError> {
        if code.pool() != self.id {
            return Err(NamePoolError::ForeignNameCode {
                code: code.bits(),
                issuer: code.pool(),
                resolver: self.id,
            });
        }
        Ok(())
    }

    fn with_entry<T>(
        &self,
        code: NameCode,
        f: impl FnOnce(&Tables, &NameEntry) -> T,
    ) -> Result<T, NamePoolError> {
        self.check_pool(code)?;
        let tables = self.read();
        let entry = tables
            .entry_at(code.slot(), code.depth())
            .ok_or(NamePoolError::UnknownNameCode(code.bits()))?;
        Ok(f(&tables, entry))
    }

    pub fn local_name(&self, code: NameCode) -> Result<Arc<str>, NamePoolError> {
        self.with_entry(code, |_, entry| Arc::clone(&entry.local))
    }

    pub fn uri_code(&self, code: NameCode) -> Result<UriCode, NamePoolError> {
        self.with_entry(code, |_, entry| entry.uri)
    }

    pub fn uri(&self, code: NameCode) -> Result<Arc<str>, NamePoolError> {
        self.with_entry(code, |tables, entry| {
            Arc::clone(&tables.uris[entry.uri.0 as usize].uri)
        })
    }

    pub fn prefix(&self, code: NameCode) -> Result<Arc<str>, NamePoolError> {
        let index = code.prefix_index();
        self.with_entry(code, |tables, entry| {
            prefix_with_index(tables, entry.uri, index)
        })?
        .ok_or(NamePoolError::UnknownNameCode(code.bits()))
    }

    /// `prefix:local`, or just `local` for an unprefixed name.
    pub fn display_name(&self, code: NameCode) -> Result<String, NamePoolError> {
        let index = code.prefix_index();
        self.with_entry(code, |tables, entry| {
            if index == 0 {
                return Some(entry.local.to_string());
            }
            prefix_with_index(tables, entry.uri, index)
                .map(|prefix| format!("{}:{}", prefix, entry.local))
        })?
        .ok_or(NamePoolError::UnknownNameCode(code.bits()))
    }

    /// `{uri}local`, or just `local` for a name in no namespace.
    pub fn clark_name(&self, code: NameCode) -> Result<String, NamePoolError> {
        self.with_entry(code, |tables, entry| {
            let uri = &tables.uris[entry.uri.0 as usize].uri;
            if uri.is_empty() {
                entry.local.to_string()
            } else {
                format!("{{{}}}{}", uri, entry.local)
            }
        })
    }

    /// Rebuilds a code of this pool from its raw bits, checking that it resolves.
    pub fn name_code_from_bits(&self, bits: u32) -> Result<NameCode, NamePoolError> {
        let code = NameCode::from_raw(self.id, bits);
        self.with_entry(code, |tables, entry| {
            code.prefix_index() == 0
                || prefix_with_index(tables, entry.uri, code.prefix_index()).is_some()
        })?
        .then_some(code)
        .ok_or(NamePoolError::UnknownNameCode(bits))
    }

    pub fn allocate_uri(&self, uri: &str) -> Result<UriCode, NamePoolError> {
        if let Some(code) = self.read().uri_code(uri) {
            return Ok(code);
        }
        self.write().allocate_uri(uri)
    }

    pub fn uri_code_for(&self, uri: &str) -> Option<UriCode> {
        self.read().uri_code(uri)
    }

    pub fn uri_for_code(&self, code: UriCode) -> Result<Arc<str>, NamePoolError> {
        self.read()
            .uris
            .get(code.0 as usize)
            .map(|entry| Arc::clone(&entry.uri))
            .ok_or(NamePoolError::UnknownNamespaceCode(code.0 as u32))
    }

    pub fn allocate_prefix(&self, prefix: &str) -> Result<PrefixCode, NamePoolError> {
        if let Some(code) = self.read().prefix_code(prefix) {
            return Ok(code);
        }
        self.write().allocate_prefix(prefix)
    }

    pub fn prefix_for_code(&self, code: PrefixCode) -> Result<Arc<str>, NamePoolError> {
        self.read()
            .prefixes
            .get(code.0 as usize)
            .cloned()
            .ok_or(NamePoolError::UnknownNamespaceCode((code.0 as u32) << 16))
    }

    /// Interns a namespace declaration. The prefix is also recorded as one
    /// used with the URI.
    pub fn allocate_namespace_code(&self, prefix: &str, uri: &str) -> Result<NamespaceCode, NamePoolError> {
        {
            let tables = self.read();
            if let (Some(p), Some(u)) = (tables.prefix_code(prefix), tables.uri_code(uri)) {
                if tables.prefix_index(u, prefix).is_some() {
                    return Ok(NamespaceCode::new(p, u));
                }
            }
        }
        let mut tables = self.write();
        let uri_code = tables.allocate_uri(uri)?;
        let prefix_code = tables.allocate_prefix(prefix)?;
        if !uri.is_empty() {
            tables.register_prefix_for_uri(uri_code, prefix)?;
        }
        Ok(NamespaceCode::new(prefix_code, uri_code))
    }

    pub fn namespace_prefix(&self, code: NamespaceCode) -> Result<Arc<str>, NamePoolError> {
        self.read()
            .prefixes
            .get(code.prefix_code().0 as usize)
            .cloned()
            .ok_or(NamePoolError::UnknownNamespaceCode(code.0))
    }

    pub fn namespace_uri(&self, code: NamespaceCode) -> Result<Arc<str>, NamePoolError> {
        self.read()
            .uris
            .get(code.uri_code().0 as usize)
            .map(|entry| Arc::clone(&entry.uri))
            .ok_or(NamePoolError::UnknownNamespaceCode(code.0))
    }

    /// After sealing, any attempt to intern something new fails with
    /// [`NamePoolError::Sealed`]; lookups of existing names still succeed.
    pub fn seal(&self) {
        let mut tables = self.write();
        if !tables.sealed {
            debug!(
                "Sealing name pool {} with {} names, {} URIs, {} prefixes",
                self.id,
                tables.entries.len(),
                tables.uris.len(),
                tables.prefixes.len()
            );
        }
        tables.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.read().sealed
    }

    /// Number of distinct (URI, local name) entries.
    pub fn name_count(&self) -> usize {
        self.read().entries.len()
    }
}

fn prefix_with_index(tables: &Tables, uri: UriCode, index: u32) -> Option<Arc<str>> {
    if index == 0 {
        return Some(Arc::from(""));
    }
    let code = tables.uris[uri.0 as usize].prefixes.get(index as usize - 1)?;
    Some(Arc::clone(&tables.prefixes[code.0 as usize]))
}

/// Splits `prefix:local` into its parts; an unprefixed name has prefix `""`.
pub fn split_qname(qname: &str) -> Result<(&str, &str), NamePoolError> {
    let invalid = || NamePoolError::InvalidQName(qname.to_string());
    match qname.split_once(':') {
        Some((prefix, local)) => {
            if prefix.is_empty() || local.is_empty() || local.contains(':') {
                return Err(invalid());
            }
            Ok((prefix, local))
        }
        None if qname.is_empty() => Err(invalid()),
        None => Ok(("", qname)),
    }
}
