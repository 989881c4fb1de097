//! Limit order records.
//!
//! Orders are stored relative to the canonical pair and named from the
//! owner's side: `want_sell` is what the owner still gives (the escrowed
//! coin), `want_buy` what the owner still receives.
//!
//! - `is_buy = true`: the owner sells `coin0` and wants `coin1`.
//! - `is_buy = false` (the sale side): the owner sells `coin1` and wants
//!   `coin0`.
//!
//! A taker selling coin0 crosses sale-side orders; inside the matching
//! loop the taker always pays into `want_buy` and is paid out of
//! `want_sell`, whichever side the order is on. The index sorts every
//! order by `want_buy / want_sell`, the taker-side price (what a unit of
//! output costs the taker), so ascending key order on either side is the
//! order in which a descending pool sweep crosses the orders.

use crate::key::{self, CoinId, PairKey};
use crate::math::Price;
use alloy_primitives::{Address, U256};
use alloy_rlp::{Decodable, Encodable, RlpDecodable, RlpEncodable};

/// A single live limit order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limit {
    pub(crate) id: u32,
    pub(crate) pair: PairKey,
    pub(crate) is_buy: bool,
    pub(crate) want_sell: U256,
    pub(crate) want_buy: U256,
    pub(crate) owner: Address,
    pub(crate) height: u64,
    /// Price under which the order is currently written in the on-disk
    /// index; `None` when it has never been indexed. Needed to locate the
    /// stale index entry when the order moves or dies.
    pub(crate) old_sort_price: Option<Price>,
}

/// On-disk form of a [`Limit`] under `s l <id>`.
#[derive(Debug, RlpEncodable, RlpDecodable, PartialEq, Eq)]
struct LimitRecord {
    is_buy: bool,
    coin0: CoinId,
    coin1: CoinId,
    want_sell: U256,
    want_buy: U256,
    owner: Address,
    height: u64,
}

impl Limit {
    pub(crate) fn new(
        id: u32,
        pair: PairKey,
        is_buy: bool,
        want_sell: U256,
        want_buy: U256,
        owner: Address,
        height: u64,
    ) -> Self {
        debug_assert!(pair.is_canonical());
        Self {
            id,
            pair,
            is_buy,
            want_sell,
            want_buy,
            owner,
            height,
            old_sort_price: None,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn pair(&self) -> PairKey {
        self.pair
    }

    pub fn is_buy(&self) -> bool {
        self.is_buy
    }

    pub fn want_sell(&self) -> U256 {
        self.want_sell
    }

    pub fn want_buy(&self) -> U256 {
        self.want_buy
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    /// The coin the owner escrowed (and is refunded on cancellation).
    pub fn sell_coin(&self) -> CoinId {
        if self.is_buy { self.pair.coin0 } else { self.pair.coin1 }
    }

    /// The coin the owner receives when the order fills.
    pub fn buy_coin(&self) -> CoinId {
        if self.is_buy { self.pair.coin1 } else { self.pair.coin0 }
    }

    /// An order with either volume at zero is terminal.
    pub fn is_empty(&self) -> bool {
        self.want_sell.is_zero() || self.want_buy.is_zero()
    }

    /// Sort price: what one unit of the order's output costs its taker,
    /// `want_buy / want_sell`. Uniform across both sides.
    pub fn sort_price(&self) -> Price {
        Price::from_ratio(self.want_buy, self.want_sell).unwrap_or(Price::ZERO)
    }

    /// Crossing price in the units of the side that fills this order:
    /// what the taker receives per unit paid, `want_sell / want_buy`.
    pub fn crossing_price(&self) -> Price {
        Price::from_ratio(self.want_sell, self.want_buy).unwrap_or(Price::ZERO)
    }

    /// True when the order sits on the sale side of the index
    /// (`side_byte = 1`, ascending iteration, complemented ids).
    pub(crate) fn sell_side(&self) -> bool {
        !self.is_buy
    }

    /// Applies a fill: the counterparty paid `pays` toward `want_buy` and
    /// took `gets` out of `want_sell`.
    ///
    /// # Panics
    ///
    /// Overconsuming an order means it was spent twice; that is a
    /// consensus-fatal inconsistency.
    pub(crate) fn fill(&mut self, pays: U256, gets: U256) {
        self.want_buy = self
            .want_buy
            .checked_sub(pays)
            .unwrap_or_else(|| panic!("order {} overfilled on buy side", self.id));
        self.want_sell = self
            .want_sell
            .checked_sub(gets)
            .unwrap_or_else(|| panic!("order {} overfilled on sell side", self.id));
    }

    /// Index key for the order at its current sort price.
    pub(crate) fn index_path(&self) -> Vec<u8> {
        key::order_index_path(self.pair, self.sell_side(), &self.sort_price(), self.id)
    }

    /// Index key the order was last written under, if any.
    pub(crate) fn old_index_path(&self) -> Option<Vec<u8>> {
        let price = self.old_sort_price?;
        Some(key::order_index_path(self.pair, self.sell_side(), &price, self.id))
    }

    pub(crate) fn encode_record(&self) -> Vec<u8> {
        let record = LimitRecord {
            is_buy: self.is_buy,
            coin0: self.pair.coin0,
            coin1: self.pair.coin1,
            want_sell: self.want_sell,
            want_buy: self.want_buy,
            owner: self.owner,
            height: self.height,
        };
        let mut out = Vec::new();
        record.encode(&mut out);
        out
    }

    /// Decodes a record loaded from the tree. The stored state is indexed
    /// at its current sort price, so `old_sort_price` is primed with it.
    pub(crate) fn decode_record(id: u32, mut bytes: &[u8]) -> alloy_rlp::Result<Self> {
        let record = LimitRecord::decode(&mut bytes)?;
        let mut limit = Limit::new(
            id,
            PairKey::new(record.coin0, record.coin1),
            record.is_buy,
            record.want_sell,
            record.want_buy,
            record.owner,
            record.height,
        );
        limit.old_sort_price = Some(limit.sort_price());
        Ok(limit)
    }
}
