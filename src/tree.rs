//! Abstract view of the authenticated key-value store.
//!
//! The engine never talks to the Merkle tree directly. Reads go through an
//! [`ImmutableTree`] snapshot that is swapped atomically at block
//! boundaries; writes are buffered by the caller's [`MutableTree`] and only
//! touched from [`crate::Swap::commit`].

use std::collections::BTreeMap;
use std::ops::Bound;

/// Read-only snapshot with ordered range iteration.
pub trait ImmutableTree: Send + Sync {
    /// Value stored at `key`, if any.
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    /// Visits every entry with `start <= key < end`. `ascending` selects the
    /// traversal direction. Iteration stops early when `f` returns `true`.
    fn iterate_range(
        &self,
        start: &[u8],
        end: &[u8],
        ascending: bool,
        f: &mut dyn FnMut(&[u8], &[u8]) -> bool,
    );
}

/// Buffered writer for the next version of the tree.
pub trait MutableTree {
    fn set(&mut self, key: Vec<u8>, value: Vec<u8>);

    /// Removes `key`, reporting whether it was present.
    fn remove(&mut self, key: &[u8]) -> bool;
}

/// Ordered in-memory tree. Stands in for the real Merkle store in tests and
/// tooling; iteration order matches the on-disk tree byte order.
#[derive(Debug, Default, Clone)]
pub struct MemTree {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys currently stored under `prefix`. Test helper.
    pub fn keys_with_prefix(&self, prefix: &[u8]) -> Vec<Vec<u8>> {
        self.entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect()
    }
}

impl ImmutableTree for MemTree {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.entries.get(key).cloned()
    }

    fn iterate_range(
        &self,
        start: &[u8],
        end: &[u8],
        ascending: bool,
        f: &mut dyn FnMut(&[u8], &[u8]) -> bool,
    ) {
        let range = self.entries.range::<[u8], _>((
            Bound::Included(start),
            Bound::Excluded(end),
        ));
        if ascending {
            for (key, value) in range {
                if f(key, value) {
                    return;
                }
            }
        } else {
            for (key, value) in range.rev() {
                if f(key, value) {
                    return;
                }
            }
        }
    }
}

impl MutableTree for MemTree {
    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.entries.insert(key, value);
    }

    fn remove(&mut self, key: &[u8]) -> bool {
        self.entries.remove(key).is_some()
    }
}
