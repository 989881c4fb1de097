//! Pair identity and the byte layout of the swap subtree.
//!
//! Everything the engine persists lives under the `b's'` prefix of the
//! authenticated KV store:
//!
//! ```text
//! s i                                  -> next pair id (RLP u32)
//! s n                                  -> next order id (RLP u32)
//! s d <coin0_be> <coin1_be>            -> pair data record
//! s o <coin0_be> <coin1_be> <side> ... -> order index sentinel (empty value)
//! s l <order_id_be>                    -> order record
//! ```

use crate::math::Price;
use alloy_rlp::{Decodable, Encodable};
use serde::{Deserialize, Serialize};
use std::fmt;

pub(crate) const MAIN_PREFIX: u8 = b's';
pub(crate) const PAIR_DATA_PREFIX: u8 = b'd';
pub(crate) const ORDER_RECORD_PREFIX: u8 = b'l';
pub(crate) const ORDER_INDEX_PREFIX: u8 = b'o';
pub(crate) const NEXT_PAIR_ID_PREFIX: u8 = b'i';
pub(crate) const NEXT_ORDER_ID_PREFIX: u8 = b'n';

/// Identifier of a coin in the external coin registry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct CoinId(pub u32);

impl fmt::Display for CoinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Encodable for CoinId {
    fn encode(&self, out: &mut dyn alloy_rlp::BufMut) {
        self.0.encode(out);
    }

    fn length(&self) -> usize {
        self.0.length()
    }
}

impl Decodable for CoinId {
    fn decode(buf: &mut &[u8]) -> alloy_rlp::Result<Self> {
        Ok(CoinId(u32::decode(buf)?))
    }
}

/// An unordered coin pair. The canonical form keeps `coin0 < coin1`; all
/// on-disk keys are built from the canonical form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey {
    pub coin0: CoinId,
    pub coin1: CoinId,
}

impl PairKey {
    pub fn new(coin0: CoinId, coin1: CoinId) -> Self {
        Self { coin0, coin1 }
    }

    pub fn is_canonical(&self) -> bool {
        self.coin0 < self.coin1
    }

    pub fn reversed(&self) -> PairKey {
        PairKey { coin0: self.coin1, coin1: self.coin0 }
    }

    /// The canonical (sorted) form of this key.
    pub fn canonical(&self) -> PairKey {
        if self.is_canonical() { *self } else { self.reversed() }
    }

    /// Canonical 8-byte encoding used as the pair component of every key.
    pub fn bytes(&self) -> [u8; 8] {
        let key = self.canonical();
        let mut out = [0u8; 8];
        out[..4].copy_from_slice(&key.coin0.0.to_be_bytes());
        out[4..].copy_from_slice(&key.coin1.0.to_be_bytes());
        out
    }
}

/// `s d <pair>`: pair data record.
pub(crate) fn pair_data_path(key: PairKey) -> Vec<u8> {
    let mut path = Vec::with_capacity(10);
    path.push(MAIN_PREFIX);
    path.push(PAIR_DATA_PREFIX);
    path.extend_from_slice(&key.bytes());
    path
}

/// Half-open range covering every pair data record.
pub(crate) fn pair_data_range() -> (Vec<u8>, Vec<u8>) {
    (
        vec![MAIN_PREFIX, PAIR_DATA_PREFIX],
        vec![MAIN_PREFIX, PAIR_DATA_PREFIX + 1],
    )
}

/// `s l <id>`: order record.
pub(crate) fn order_record_path(id: u32) -> Vec<u8> {
    let mut path = Vec::with_capacity(6);
    path.push(MAIN_PREFIX);
    path.push(ORDER_RECORD_PREFIX);
    path.extend_from_slice(&id.to_be_bytes());
    path
}

pub(crate) fn next_pair_id_path() -> Vec<u8> {
    vec![MAIN_PREFIX, NEXT_PAIR_ID_PREFIX]
}

pub(crate) fn next_order_id_path() -> Vec<u8> {
    vec![MAIN_PREFIX, NEXT_ORDER_ID_PREFIX]
}

/// Order id component of an index key. Sell-side ids are complemented so
/// the two sides get opposite tie-break order inside one price tier.
pub(crate) fn order_id_key(id: u32, sell_side: bool) -> [u8; 4] {
    let id = if sell_side { u32::MAX - id } else { id };
    id.to_be_bytes()
}

/// Recovers the order id from the tail of an index key.
pub(crate) fn order_id_from_key(key: &[u8], sell_side: bool) -> Option<u32> {
    if key.len() < 4 {
        return None;
    }
    let raw = u32::from_be_bytes(key[key.len() - 4..].try_into().ok()?);
    Some(if sell_side { u32::MAX - raw } else { raw })
}

/// `s o <pair> <side>`: prefix of one side of a pair's order index.
pub(crate) fn order_index_prefix(key: PairKey, sell_side: bool) -> Vec<u8> {
    let mut path = Vec::with_capacity(11);
    path.push(MAIN_PREFIX);
    path.push(ORDER_INDEX_PREFIX);
    path.extend_from_slice(&key.bytes());
    path.push(u8::from(sell_side));
    path
}

/// Half-open range covering one side of a pair's order index.
pub(crate) fn order_index_range(key: PairKey, sell_side: bool) -> (Vec<u8>, Vec<u8>) {
    let start = order_index_prefix(key, sell_side);
    let mut end = start.clone();
    if let Some(last) = end.last_mut() {
        *last += 1;
    }
    (start, end)
}

/// Full index key of one order at one price.
pub(crate) fn order_index_path(key: PairKey, sell_side: bool, price: &Price, id: u32) -> Vec<u8> {
    let mut path = order_index_prefix(key, sell_side);
    path.extend_from_slice(&price.to_sort_bytes());
    path.extend_from_slice(&order_id_key(id, sell_side));
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::U256;

    #[test]
    fn canonicalization_is_stable() {
        let key = PairKey::new(CoinId(7), CoinId(3));
        assert!(!key.is_canonical());
        let canonical = key.canonical();
        assert_eq!(canonical, PairKey::new(CoinId(3), CoinId(7)));
        assert_eq!(canonical, canonical.canonical());
        assert_eq!(key.canonical(), key.reversed().canonical());
        assert_eq!(key.bytes(), key.reversed().bytes());
    }

    #[test]
    fn pair_data_path_layout() {
        let path = pair_data_path(PairKey::new(CoinId(1), CoinId(2)));
        assert_eq!(path[..2], [b's', b'd']);
        assert_eq!(&path[2..6], &1u32.to_be_bytes());
        assert_eq!(&path[6..10], &2u32.to_be_bytes());
    }

    #[test]
    fn sell_ids_are_complemented() {
        assert_eq!(order_id_key(5, false), 5u32.to_be_bytes());
        assert_eq!(order_id_key(5, true), (u32::MAX - 5).to_be_bytes());
        let path = order_index_path(
            PairKey::new(CoinId(1), CoinId(2)),
            true,
            &Price::from_ratio(U256::from(9u64), U256::from(10u64)).unwrap(),
            5,
        );
        assert_eq!(order_id_from_key(&path, true), Some(5));
        assert_eq!(
            order_id_from_key(&path, false),
            Some(u32::MAX - 5),
            "raw id without complement"
        );
    }

    #[test]
    fn index_range_brackets_the_side() {
        let key = PairKey::new(CoinId(1), CoinId(2));
        let (start, end) = order_index_range(key, true);
        let path = order_index_path(
            key,
            true,
            &Price::from_ratio(U256::from(1u64), U256::from(1u64)).unwrap(),
            9,
        );
        assert!(start.as_slice() < path.as_slice());
        assert!(path.as_slice() < end.as_slice());

        let other_side = order_index_path(
            key,
            false,
            &Price::from_ratio(U256::from(1u64), U256::from(1u64)).unwrap(),
            9,
        );
        assert!(other_side.as_slice() < start.as_slice());
    }
}
