//! Genesis export/import types.
//!
//! Amounts travel as decimal strings so the snapshot survives tooling that
//! cannot represent 256-bit integers. Volumes are coordinate-fixed:
//! `volume0` is always the coin0 amount of the canonical pair.

use crate::key::CoinId;
use crate::order::Limit;
use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

/// Snapshot of the whole swap module.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapState {
    pub pools: Vec<PoolState>,
    pub next_order_id: u32,
}

/// One pool with its live orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolState {
    pub coin0: u32,
    pub coin1: u32,
    pub reserve0: String,
    pub reserve1: String,
    pub id: u32,
    pub orders: Vec<OrderState>,
}

/// One live limit order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderState {
    /// True when the owner sells coin1 for coin0.
    pub is_sale: bool,
    /// Remaining coin0 volume.
    pub volume0: String,
    /// Remaining coin1 volume.
    pub volume1: String,
    pub id: u32,
    pub owner: Address,
    pub height: u64,
}

impl OrderState {
    pub(crate) fn from_limit(order: &Limit) -> Self {
        let (volume0, volume1) = if order.is_buy() {
            (order.want_sell(), order.want_buy())
        } else {
            (order.want_buy(), order.want_sell())
        };
        Self {
            is_sale: !order.is_buy(),
            volume0: volume0.to_string(),
            volume1: volume1.to_string(),
            id: order.id(),
            owner: order.owner(),
            height: order.height(),
        }
    }
}

impl PoolState {
    pub fn key(&self) -> (CoinId, CoinId) {
        (CoinId(self.coin0), CoinId(self.coin1))
    }
}
