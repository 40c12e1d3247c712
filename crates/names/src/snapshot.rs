//! Serializable image of a pool's tables.
//!
//! A snapshot preserves every code's bit layout, so a pool rebuilt with
//! [`NamePool::from_snapshot`] resolves the same raw bits to the same names.
//! The rebuilt pool has a fresh [`PoolId`](crate::PoolId): codes must be
//! re-attached with [`NamePool::name_code_from_bits`].
use crate::code::{PrefixCode, UriCode};
use crate::error::NamePoolError;
use crate::pool::{HASH_SLOTS, MAX_CHAIN_DEPTH, MAX_PREFIXES_PER_URI, MAX_TABLE_SIZE, NameEntry, NamePool, Tables, UriEntry};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    pub prefixes: Vec<String>,
    pub uris: Vec<UriSnapshot>,
    pub chains: Vec<ChainSnapshot>,
    pub sealed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UriSnapshot {
    pub uri: String,
    pub prefixes: Vec<PrefixCode>,
}

/// The names hashed to one slot, in chain order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainSnapshot {
    pub slot: u16,
    pub names: Vec<(UriCode, String)>,
}

impl NamePool {
    pub fn snapshot(&self) -> PoolSnapshot {
        let tables = self.read();
        let chains = tables
            .slots
            .iter()
            .enumerate()
            .filter_map(|(slot, head)| {
                let mut names = Vec::new();
                let mut cursor = *head;
                while let Some(index) = cursor {
                    let entry = &tables.entries[index as usize];
                    names.push((entry.uri, entry.local.to_string()));
                    cursor = entry.next;
                }
                (!names.is_empty()).then_some(ChainSnapshot {
                    slot: slot as u16,
                    names,
                })
            })
            .collect();

        PoolSnapshot {
            prefixes: tables.prefixes.iter().map(|p| p.to_string()).collect(),
            uris: tables
                .uris
                .iter()
                .map(|entry| UriSnapshot {
                    uri: entry.uri.to_string(),
                    prefixes: entry.prefixes.clone(),
                })
                .collect(),
            chains,
            sealed: tables.sealed,
        }
    }

    pub fn from_snapshot(snapshot: &PoolSnapshot) -> Result<NamePool, NamePoolError> {
        let corrupt = |msg: String| NamePoolError::CorruptSnapshot(msg);

        if snapshot.prefixes.len() > MAX_TABLE_SIZE {
            return Err(NamePoolError::TooManyPrefixCodes(MAX_TABLE_SIZE));
        }
        if snapshot.uris.len() > MAX_TABLE_SIZE {
            return Err(NamePoolError::TooManyUris(MAX_TABLE_SIZE));
        }

        let mut uris = Vec::with_capacity(snapshot.uris.len());
        for entry in &snapshot.uris {
            if entry.prefixes.len() > MAX_PREFIXES_PER_URI {
                return Err(NamePoolError::TooManyPrefixes {
                    uri: entry.uri.clone(),
                    max: MAX_PREFIXES_PER_URI,
                });
            }
            if let Some(bad) = entry
                .prefixes
                .iter()
                .find(|p| p.0 as usize >= snapshot.prefixes.len())
            {
                return Err(corrupt(format!("prefix code {} out of range", bad.0)));
            }
            uris.push(UriEntry {
                uri: Arc::from(entry.uri.as_str()),
                prefixes: entry.prefixes.clone(),
            });
        }

        let mut tables = Tables {
            slots: vec![None; HASH_SLOTS],
            entries: Vec::new(),
            prefixes: snapshot.prefixes.iter().map(|p| Arc::from(p.as_str())).collect(),
            uris,
            sealed: snapshot.sealed,
        };

        for chain in &snapshot.chains {
            let slot = chain.slot as usize;
            if slot >= HASH_SLOTS || tables.slots[slot].is_some() {
                return Err(corrupt(format!("bad or repeated slot {}", slot)));
            }
            if chain.names.len() > MAX_CHAIN_DEPTH as usize {
                return Err(NamePoolError::ChainTooDeep {
                    slot: slot as u32,
                    max: MAX_CHAIN_DEPTH as usize,
                });
            }
            let mut previous: Option<u32> = None;
            for (uri, local) in &chain.names {
                if uri.0 as usize >= tables.uris.len() {
                    return Err(corrupt(format!("URI code {} out of range", uri.0)));
                }
                let index = tables.entries.len() as u32;
                tables.entries.push(NameEntry {
                    uri: *uri,
                    local: Arc::from(local.as_str()),
                    next: None,
                });
                match previous {
                    Some(p) => tables.entries[p as usize].next = Some(index),
                    None => tables.slots[slot] = Some(index),
                }
                previous = Some(index);
            }
        }

        Ok(NamePool::from_tables(tables))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_preserves_code_layout() {
        let pool = NamePool::new();
        let a = pool.allocate("p", "urn:one", "alpha").unwrap();
        let b = pool.allocate("", "", "Aa").unwrap();
        let c = pool.allocate("", "", "BB").unwrap();

        let json = serde_json::to_string(&pool.snapshot()).unwrap();
        let restored: PoolSnapshot = serde_json::from_str(&json).unwrap();
        let copy = NamePool::from_snapshot(&restored).unwrap();

        assert_ne!(copy.id(), pool.id());
        for code in [a, b, c] {
            let rebound = copy.name_code_from_bits(code.bits()).unwrap();
            assert_eq!(copy.display_name(rebound).unwrap(), pool.display_name(code).unwrap());
            assert_eq!(copy.uri(rebound).unwrap(), pool.uri(code).unwrap());
        }
    }

    #[test]
    fn corrupt_snapshots_are_rejected() {
        let mut snapshot = NamePool::new().snapshot();
        snapshot.chains.push(ChainSnapshot {
            slot: 3,
            names: vec![(UriCode(999), "x".into())],
        });
        assert!(matches!(
            NamePool::from_snapshot(&snapshot),
            Err(NamePoolError::CorruptSnapshot(_))
        ));
    }
}
