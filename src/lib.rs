//! Swap engine of a blockchain state machine: a constant-product AMM with
//! an interoperating on-chain limit-order book.
//!
//! The engine exposes deterministic primitives used by transaction
//! handlers to manage liquidity pools, quote and execute swaps that
//! combine pool liquidity with crossed limit orders, and persist the
//! resulting state into an authenticated ordered key-value store with
//! per-block commit semantics.
//!
//! Entry point is [`Swap`]; per-pool operations live on [`Pair`] handles
//! obtained from it. Storage and the surrounding ledger are consumed
//! through the traits in [`tree`] and [`bus`].
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod book;

pub mod bus;
pub mod error;
pub mod genesis;
pub mod key;
pub mod math;
pub mod order;
pub mod pair;
pub mod swap;
pub mod tree;

pub use bus::{AccountsAdapter, CoinChecker, EventBus, NullBus, RecordingBus, SwapBus, SwapEvent};
pub use error::{Result, SwapError};
pub use genesis::{OrderState, PoolState, SwapState};
pub use key::{CoinId, PairKey};
pub use math::Price;
pub use order::Limit;
pub use pair::{COMMISSION, COMMISSION_ORDER, MINIMUM_LIQUIDITY, OrderFill, Pair, TradeWithOrders};
pub use swap::{OrderDetail, Swap, SwapOutcome};
pub use tree::{ImmutableTree, MemTree, MutableTree};
