//! Adapters to the surrounding state machine.
//!
//! The engine owns pool reserves and order escrow but never account
//! balances; crediting owners and takers is the caller's job. These traits
//! are the narrow waist through which the engine reports balance credits,
//! module-holding deltas for the solvency audit, and emitted events.

use crate::key::CoinId;
use alloy_primitives::{Address, I256, Sign, U256};
use parking_lot::Mutex;

/// Account balance ledger operations the engine is allowed to trigger
/// (only the expiry sweep credits balances directly).
pub trait AccountsAdapter: Send + Sync {
    fn add_balance(&self, address: Address, coin: CoinId, amount: U256);
}

/// Reserve bookkeeping for the solvency audit: every change of the coins
/// held by the swap module (pool reserves and order escrow) is reported.
pub trait CoinChecker: Send + Sync {
    fn add_coin(&self, coin: CoinId, delta: I256);
}

/// Events emitted towards the node's event bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapEvent {
    OrderExpired {
        id: u64,
        address: Address,
        coin: CoinId,
        amount: U256,
    },
}

pub trait EventBus: Send + Sync {
    fn add_event(&self, event: SwapEvent);
}

/// Bundle of the three adapters, mirroring the node-side bus object.
pub trait SwapBus: Send + Sync {
    fn accounts(&self) -> &dyn AccountsAdapter;
    fn checker(&self) -> &dyn CoinChecker;
    fn events(&self) -> &dyn EventBus;
}

/// Builds a signed checker delta from a sign and magnitude.
///
/// # Panics
///
/// Panics when the magnitude exceeds the signed range. Module holdings are
/// bounded far below that; hitting it means corrupted state.
pub(crate) fn signed_delta(negative: bool, amount: U256) -> I256 {
    let sign = if negative { Sign::Negative } else { Sign::Positive };
    match I256::checked_from_sign_and_abs(sign, amount) {
        Some(delta) => delta,
        None => panic!("coin delta out of signed range: {amount}"),
    }
}

/// Bus that ignores everything. Useful for genesis import tooling and
/// read-only contexts.
#[derive(Debug, Default)]
pub struct NullBus;

impl AccountsAdapter for NullBus {
    fn add_balance(&self, _address: Address, _coin: CoinId, _amount: U256) {}
}

impl CoinChecker for NullBus {
    fn add_coin(&self, _coin: CoinId, _delta: I256) {}
}

impl EventBus for NullBus {
    fn add_event(&self, _event: SwapEvent) {}
}

impl SwapBus for NullBus {
    fn accounts(&self) -> &dyn AccountsAdapter {
        self
    }

    fn checker(&self) -> &dyn CoinChecker {
        self
    }

    fn events(&self) -> &dyn EventBus {
        self
    }
}

/// Bus that records every call, for assertions in tests.
#[derive(Debug, Default)]
pub struct RecordingBus {
    pub balances: Mutex<Vec<(Address, CoinId, U256)>>,
    pub coin_deltas: Mutex<Vec<(CoinId, I256)>>,
    pub events: Mutex<Vec<SwapEvent>>,
}

impl RecordingBus {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AccountsAdapter for RecordingBus {
    fn add_balance(&self, address: Address, coin: CoinId, amount: U256) {
        self.balances.lock().push((address, coin, amount));
    }
}

impl CoinChecker for RecordingBus {
    fn add_coin(&self, coin: CoinId, delta: I256) {
        self.coin_deltas.lock().push((coin, delta));
    }
}

impl EventBus for RecordingBus {
    fn add_event(&self, event: SwapEvent) {
        self.events.lock().push(event);
    }
}

impl SwapBus for RecordingBus {
    fn accounts(&self) -> &dyn AccountsAdapter {
        self
    }

    fn checker(&self) -> &dyn CoinChecker {
        self
    }

    fn events(&self) -> &dyn EventBus {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_delta_round_trips_sign() {
        let up = signed_delta(false, U256::from(5u64));
        let down = signed_delta(true, U256::from(5u64));
        assert_eq!(up + down, I256::ZERO);
    }

    #[test]
    fn recording_bus_captures_calls() {
        let bus = RecordingBus::new();
        let owner = Address::repeat_byte(0x11);
        bus.accounts().add_balance(owner, CoinId(1), U256::from(500u64));
        bus.events().add_event(SwapEvent::OrderExpired {
            id: 7,
            address: owner,
            coin: CoinId(1),
            amount: U256::from(500u64),
        });
        assert_eq!(bus.balances.lock().len(), 1);
        assert_eq!(bus.events.lock().len(), 1);
    }
}
