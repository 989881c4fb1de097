//! Per-pair view of the price-indexed order book.
//!
//! The on-disk index is the source of truth for committed orders; this
//! structure overlays the delta accumulated since the last commit (orders
//! created, filled or removed in the current block) and materializes
//! merged, price-ordered id lists per side on demand. Merged lists are
//! memoized so repeated iterations inside one block do not re-scan the
//! tree.

use crate::key::{self, PairKey};
use crate::math::Price;
use crate::order::Limit;
use crate::tree::ImmutableTree;
use alloy_primitives::U256;
use std::collections::{BTreeSet, HashMap, HashSet};

#[derive(Debug, Default, Clone)]
pub(crate) struct OrderBook {
    /// Orders known in memory: everything touched this block plus records
    /// pulled in by index scans.
    orders: HashMap<u32, Limit>,
    /// Ids changed since the last commit, including removed ones.
    dirty: BTreeSet<u32>,
    /// Ids removed since the last commit.
    deleted: HashSet<u32>,
    /// Memoized merged id lists, ascending taker price per side.
    merged_sell: Option<Vec<u32>>,
    merged_buy: Option<Vec<u32>>,
}

impl OrderBook {
    pub(crate) fn cached(&self, id: u32) -> Option<&Limit> {
        if self.deleted.contains(&id) {
            return None;
        }
        self.orders.get(&id)
    }

    pub(crate) fn is_deleted(&self, id: u32) -> bool {
        self.deleted.contains(&id)
    }

    /// Dirty ids in descending order, the commit processing order.
    pub(crate) fn dirty_ids_desc(&self) -> Vec<u32> {
        self.dirty.iter().rev().copied().collect()
    }

    /// The order as commit sees it: present even when terminal, so the
    /// stale index entry can be located and removed.
    pub(crate) fn dirty_order(&self, id: u32) -> Option<&Limit> {
        self.orders.get(&id)
    }

    /// Registers a brand new order.
    pub(crate) fn insert(&mut self, limit: Limit) {
        let id = limit.id();
        self.dirty.insert(id);
        self.orders.insert(id, limit);
        self.invalidate();
    }

    /// Applies a fill to an order already in memory. Terminal orders are
    /// marked deleted.
    pub(crate) fn apply_fill(&mut self, id: u32, pays: U256, gets: U256) {
        let Some(order) = self.orders.get_mut(&id) else {
            panic!("fill for unknown order {id}");
        };
        order.fill(pays, gets);
        if order.is_empty() {
            self.deleted.insert(id);
        }
        self.dirty.insert(id);
        self.invalidate();
    }

    /// Removes an order outright (cancellation, expiry).
    pub(crate) fn remove(&mut self, id: u32) {
        self.deleted.insert(id);
        self.dirty.insert(id);
        self.invalidate();
    }

    /// Makes sure the record for `id` is cached, pulling it from the tree
    /// when needed. Returns `false` for ids with no live order.
    pub(crate) fn ensure_loaded(&mut self, id: u32, tree: &dyn ImmutableTree) -> bool {
        if self.deleted.contains(&id) {
            return false;
        }
        if self.orders.contains_key(&id) {
            return true;
        }
        let Some(bytes) = tree.get(&key::order_record_path(id)) else {
            return false;
        };
        match Limit::decode_record(id, &bytes) {
            Ok(limit) => {
                self.orders.insert(id, limit);
                true
            }
            Err(err) => panic!("corrupted order record {id}: {err}"),
        }
    }

    /// Clears the delta after a commit. Loaded records stay cached; their
    /// indexed price is now their current price.
    pub(crate) fn clear_delta(&mut self) {
        for id in self.deleted.iter() {
            self.orders.remove(id);
        }
        for id in self.dirty.iter() {
            if let Some(order) = self.orders.get_mut(id) {
                order.old_sort_price = Some(order.sort_price());
            }
        }
        self.dirty.clear();
        self.deleted.clear();
        self.invalidate();
    }

    fn invalidate(&mut self) {
        self.merged_sell = None;
        self.merged_buy = None;
    }

    /// Live order ids of one side in ascending taker (sort) price, the
    /// order in which a swap in that direction crosses them. Ties follow
    /// the encoded key order: newest first on the sale side (complemented
    /// ids), oldest first on the buy side.
    pub(crate) fn side_ids(
        &mut self,
        pair: PairKey,
        sell_side: bool,
        tree: &dyn ImmutableTree,
    ) -> Vec<u32> {
        let memo = if sell_side { &self.merged_sell } else { &self.merged_buy };
        if let Some(ids) = memo {
            return ids.clone();
        }

        // committed entries, already price-ordered by the key encoding
        let (start, end) = key::order_index_range(pair, sell_side);
        let mut tree_ids: Vec<u32> = Vec::new();
        tree.iterate_range(&start, &end, true, &mut |key_bytes, _| {
            if let Some(id) = key::order_id_from_key(key_bytes, sell_side) {
                tree_ids.push(id);
            }
            false
        });

        // the delta owns the current position of every dirty order
        let mut entries: Vec<(Price, u32)> = Vec::new();
        for id in tree_ids {
            if self.dirty.contains(&id) || self.deleted.contains(&id) {
                continue;
            }
            if !self.ensure_loaded(id, tree) {
                continue;
            }
            if let Some(order) = self.orders.get(&id) {
                entries.push((order.sort_price(), id));
            }
        }
        for id in self.dirty.iter() {
            if self.deleted.contains(id) {
                continue;
            }
            let Some(order) = self.orders.get(id) else { continue };
            if order.sell_side() != sell_side || order.is_empty() {
                continue;
            }
            entries.push((order.sort_price(), *id));
        }

        if sell_side {
            entries.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));
        } else {
            entries.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
        }
        let ids: Vec<u32> = entries.into_iter().map(|(_, id)| id).collect();
        if sell_side {
            self.merged_sell = Some(ids.clone());
        } else {
            self.merged_buy = Some(ids.clone());
        }
        ids
    }
}
