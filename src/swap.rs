//! The swap registry: every pool, the id allocators, the dirty sets and
//! the per-block commit pipeline.
//!
//! A [`Swap`] owns the in-memory pair cache over one immutable tree
//! snapshot. Reads may run concurrently; mutations are serialized by the
//! block executor. `commit` flushes exactly the dirty subset into the
//! mutable tree, in an order that is deterministic across nodes.

use crate::book::OrderBook;
use crate::bus::{SwapBus, SwapEvent, signed_delta};
use crate::error::{Result, SwapError};
use crate::genesis::{OrderState, PoolState, SwapState};
use crate::key::{self, CoinId, PairKey};
use crate::order::Limit;
use crate::pair::{Pair, PairData, PairInner, TradeWithOrders, order_net};
use crate::tree::{ImmutableTree, MutableTree};
use alloy_primitives::{Address, U256};
use alloy_rlp::Decodable;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Lazily loaded, monotonically growing id counter persisted as RLP u32.
#[derive(Debug, Default)]
struct IdCounter {
    cached: Option<u32>,
    dirty: bool,
}

impl IdCounter {
    fn current(&mut self, tree: &dyn ImmutableTree, path: &[u8]) -> u32 {
        if let Some(value) = self.cached {
            return value;
        }
        let value = match tree.get(path) {
            Some(bytes) => match u32::decode(&mut bytes.as_slice()) {
                Ok(value) => value,
                Err(err) => panic!("corrupted id counter: {err}"),
            },
            None => 1,
        };
        self.cached = Some(value);
        value
    }

    fn alloc(&mut self, tree: &dyn ImmutableTree, path: &[u8]) -> u32 {
        let id = self.current(tree, path);
        self.cached = Some(id + 1);
        self.dirty = true;
        id
    }

    fn force(&mut self, value: u32) {
        self.cached = Some(value);
        self.dirty = true;
    }
}

/// State shared between the registry and every pair handle: the tree
/// snapshot and the dirty bookkeeping.
pub(crate) struct SwapShared {
    tree: RwLock<Arc<dyn ImmutableTree>>,
    dirty_pairs: Mutex<HashSet<PairKey>>,
    dirty_order_pairs: Mutex<HashSet<PairKey>>,
    next_pair_id: Mutex<IdCounter>,
    next_order_id: Mutex<IdCounter>,
}

impl SwapShared {
    pub(crate) fn new(tree: Arc<dyn ImmutableTree>) -> Arc<Self> {
        Arc::new(Self {
            tree: RwLock::new(tree),
            dirty_pairs: Mutex::new(HashSet::new()),
            dirty_order_pairs: Mutex::new(HashSet::new()),
            next_pair_id: Mutex::new(IdCounter::default()),
            next_order_id: Mutex::new(IdCounter::default()),
        })
    }

    pub(crate) fn tree_handle(&self) -> Arc<dyn ImmutableTree> {
        Arc::clone(&self.tree.read())
    }

    pub(crate) fn mark_dirty_pair(&self, key: PairKey) {
        self.dirty_pairs.lock().insert(key);
    }

    pub(crate) fn mark_dirty_orders(&self, key: PairKey) {
        self.dirty_order_pairs.lock().insert(key);
    }

    fn alloc_pair_id(&self) -> u32 {
        let tree = self.tree_handle();
        self.next_pair_id.lock().alloc(tree.as_ref(), &key::next_pair_id_path())
    }

    fn alloc_order_id(&self) -> u32 {
        let tree = self.tree_handle();
        self.next_order_id.lock().alloc(tree.as_ref(), &key::next_order_id_path())
    }
}

/// One order owner's payout from a swap, in the coin the taker sold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDetail {
    pub owner: Address,
    pub value: U256,
}

/// Result of a delivered swap-with-orders.
#[derive(Debug, Clone, PartialEq)]
pub struct SwapOutcome {
    pub amount_in: U256,
    pub amount_out: U256,
    pub pair_id: u32,
    pub trade: TradeWithOrders,
    /// Order owners to credit with `value` of the input coin.
    pub sellers: Vec<OrderDetail>,
}

/// The process-wide swap engine state.
pub struct Swap {
    shared: Arc<SwapShared>,
    pairs: Mutex<HashMap<PairKey, Option<Arc<PairInner>>>>,
    /// Pairs of orders created since the last commit, which have no tree
    /// record to resolve their pair from.
    order_pairs: Mutex<HashMap<u32, PairKey>>,
    bus: Arc<dyn SwapBus>,
}

impl Swap {
    pub fn new(bus: Arc<dyn SwapBus>, tree: Arc<dyn ImmutableTree>) -> Self {
        Self {
            shared: SwapShared::new(tree),
            pairs: Mutex::new(HashMap::new()),
            order_pairs: Mutex::new(HashMap::new()),
            bus,
        }
    }

    /// Swaps in the snapshot for the next block. Cached pair data stays
    /// valid: it was flushed by the commit that produced the snapshot.
    pub fn set_immutable_tree(&self, tree: Arc<dyn ImmutableTree>) {
        *self.shared.tree.write() = tree;
    }

    // ---- pair lookup ----

    fn pair_view(&self, inner: &Arc<PairInner>, coin0: CoinId, coin1: CoinId) -> Pair {
        let reversed = !PairKey::new(coin0, coin1).is_canonical();
        Pair::new(Arc::clone(inner), reversed)
    }

    /// The pool for `(coin0, coin1)`, oriented that way, if it exists.
    pub fn swapper(&self, coin0: CoinId, coin1: CoinId) -> Option<Pair> {
        if coin0 == coin1 {
            return None;
        }
        let canonical = PairKey::new(coin0, coin1).canonical();
        let mut pairs = self.pairs.lock();
        if let Some(cached) = pairs.get(&canonical) {
            return cached.as_ref().map(|inner| self.pair_view(inner, coin0, coin1));
        }

        let tree = self.shared.tree_handle();
        let Some(bytes) = tree.get(&key::pair_data_path(canonical)) else {
            pairs.insert(canonical, None);
            return None;
        };
        let data = match PairData::decode(&mut bytes.as_slice()) {
            Ok(data) => data,
            Err(err) => panic!("corrupted pair data for {canonical:?}: {err}"),
        };
        let inner = Arc::new(PairInner {
            key: canonical,
            data: RwLock::new(data),
            book: RwLock::new(OrderBook::default()),
            shared: Arc::clone(&self.shared),
            detached: false,
        });
        pairs.insert(canonical, Some(Arc::clone(&inner)));
        Some(self.pair_view(&inner, coin0, coin1))
    }

    /// The pool for `(coin0, coin1)`, created empty when missing.
    fn return_pair(&self, coin0: CoinId, coin1: CoinId) -> Result<Pair> {
        if coin0 == coin1 {
            return Err(SwapError::IdenticalCoins(coin0));
        }
        if let Some(pair) = self.swapper(coin0, coin1) {
            return Ok(pair);
        }
        let canonical = PairKey::new(coin0, coin1).canonical();
        let inner = Arc::new(PairInner {
            key: canonical,
            data: RwLock::new(PairData::empty()),
            book: RwLock::new(OrderBook::default()),
            shared: Arc::clone(&self.shared),
            detached: false,
        });
        self.pairs.lock().insert(canonical, Some(Arc::clone(&inner)));
        Ok(self.pair_view(&inner, coin0, coin1))
    }

    fn existing_pair(&self, coin0: CoinId, coin1: CoinId) -> Result<Pair> {
        self.swapper(coin0, coin1)
            .ok_or(SwapError::PairNotExists(coin0, coin1))
    }

    pub fn pool_exists(&self, coin0: CoinId, coin1: CoinId) -> bool {
        self.swapper(coin0, coin1).is_some()
    }

    /// Reserves and id, oriented to the argument order.
    pub fn pool_reserves(&self, coin0: CoinId, coin1: CoinId) -> Option<(U256, U256, u32)> {
        let pair = self.swapper(coin0, coin1)?;
        let (reserve0, reserve1) = pair.reserves();
        Some((reserve0, reserve1, pair.id()))
    }

    // ---- quotes ----

    pub fn calculate_buy_for_sell(
        &self,
        coin0: CoinId,
        coin1: CoinId,
        amount0_in: U256,
    ) -> Result<U256> {
        let pair = self.existing_pair(coin0, coin1)?;
        pair.calculate_buy_for_sell(amount0_in)
            .ok_or(SwapError::InsufficientLiquidity)
    }

    pub fn calculate_sell_for_buy(
        &self,
        coin0: CoinId,
        coin1: CoinId,
        amount1_out: U256,
    ) -> Result<U256> {
        let pair = self.existing_pair(coin0, coin1)?;
        pair.calculate_sell_for_buy(amount1_out)
            .ok_or(SwapError::InsufficientLiquidity)
    }

    pub fn check_swap(
        &self,
        coin0: CoinId,
        coin1: CoinId,
        amount0_in: U256,
        amount1_out: U256,
    ) -> Result<()> {
        self.existing_pair(coin0, coin1)?.check_swap(amount0_in, amount1_out)
    }

    // ---- liquidity ----

    /// Creates the pool and seeds it. Returns the deposited amounts, the
    /// minted liquidity and the pair id.
    pub fn pair_create(
        &self,
        coin0: CoinId,
        coin1: CoinId,
        amount0: U256,
        amount1: U256,
    ) -> Result<(U256, U256, U256, u32)> {
        if coin0 == coin1 {
            return Err(SwapError::IdenticalCoins(coin0));
        }
        // validate before materializing the pair, so a rejected create
        // does not leave an empty pool in the cache
        crate::pair::check_create_amounts(amount0, amount1)?;
        let pair = self.return_pair(coin0, coin1)?;
        let id = self.shared.alloc_pair_id();
        pair.set_id(id);
        let liquidity = pair.create(amount0, amount1)?;

        self.bus.checker().add_coin(coin0, signed_delta(false, amount0));
        self.bus.checker().add_coin(coin1, signed_delta(false, amount1));
        Ok((amount0, amount1, liquidity, id))
    }

    /// Adds liquidity. Returns the deposited amounts and minted shares.
    pub fn pair_mint(
        &self,
        coin0: CoinId,
        coin1: CoinId,
        amount0: U256,
        max_amount1: U256,
        total_supply: U256,
    ) -> Result<(U256, U256, U256)> {
        let pair = self.existing_pair(coin0, coin1)?;
        let (liquidity, amount1) = pair.mint(amount0, max_amount1, total_supply)?;
        self.bus.checker().add_coin(coin0, signed_delta(false, amount0));
        self.bus.checker().add_coin(coin1, signed_delta(false, amount1));
        Ok((amount0, amount1, liquidity))
    }

    /// Removes liquidity. Returns the released amounts.
    pub fn pair_burn(
        &self,
        coin0: CoinId,
        coin1: CoinId,
        liquidity: U256,
        min_amount0: U256,
        min_amount1: U256,
        total_supply: U256,
    ) -> Result<(U256, U256)> {
        let pair = self.existing_pair(coin0, coin1)?;
        let (amount0, amount1) =
            pair.burn(liquidity, min_amount0, min_amount1, total_supply)?;
        self.bus.checker().add_coin(coin0, signed_delta(true, amount0));
        self.bus.checker().add_coin(coin1, signed_delta(true, amount1));
        Ok((amount0, amount1))
    }

    // ---- swaps ----

    fn seller_payouts(&self, trade: &TradeWithOrders) -> (Vec<OrderDetail>, U256) {
        let mut sellers = Vec::with_capacity(trade.fills.len());
        let mut total = U256::ZERO;
        for fill in &trade.fills {
            let value = order_net(fill.pays);
            total += value;
            sellers.push(OrderDetail { owner: fill.owner, value });
        }
        (sellers, total)
    }

    fn report_swap_deltas(
        &self,
        coin_in: CoinId,
        coin_out: CoinId,
        amount_in: U256,
        amount_out: U256,
        sellers_total: U256,
    ) {
        // module holdings: the full input arrives, owners are paid their
        // net share out of it; the taker's output leaves pool + escrow
        self.bus
            .checker()
            .add_coin(coin_in, signed_delta(false, amount_in - sellers_total));
        self.bus.checker().add_coin(coin_out, signed_delta(true, amount_out));
    }

    /// Sells an exact `amount0_in` of `coin0`, filling crossed orders on
    /// the way. Fails without touching state when the result would be
    /// below `min_amount1_out`.
    pub fn pair_sell_with_orders(
        &self,
        coin0: CoinId,
        coin1: CoinId,
        amount0_in: U256,
        min_amount1_out: U256,
    ) -> Result<SwapOutcome> {
        let pair = self.existing_pair(coin0, coin1)?;
        let (amount1_out, fills) = pair.calculate_buy_for_sell_with_orders(amount0_in);
        if amount1_out.is_zero() {
            return Err(SwapError::InsufficientLiquidity);
        }
        if amount1_out < min_amount1_out {
            return Err(SwapError::InsufficientOutputAmount);
        }

        let trade = pair.apply_swap_with_orders(amount0_in, amount1_out, fills);
        let (sellers, sellers_total) = self.seller_payouts(&trade);
        self.report_swap_deltas(coin0, coin1, amount0_in, amount1_out, sellers_total);

        Ok(SwapOutcome {
            amount_in: amount0_in,
            amount_out: amount1_out,
            pair_id: pair.id(),
            trade,
            sellers,
        })
    }

    /// Buys an exact `amount1_out` of `coin1`, filling crossed orders on
    /// the way. Fails without touching state when the required input
    /// exceeds `max_amount0_in`.
    pub fn pair_buy_with_orders(
        &self,
        coin0: CoinId,
        coin1: CoinId,
        max_amount0_in: U256,
        amount1_out: U256,
    ) -> Result<SwapOutcome> {
        let pair = self.existing_pair(coin0, coin1)?;
        let (amount0_in, delivered, fills) = pair
            .calculate_sell_for_buy_with_orders(amount1_out)
            .ok_or(SwapError::InsufficientLiquidity)?;
        if amount0_in > max_amount0_in {
            return Err(SwapError::InsufficientInputAmount);
        }

        let trade = pair.apply_swap_with_orders(amount0_in, delivered, fills);
        let (sellers, sellers_total) = self.seller_payouts(&trade);
        self.report_swap_deltas(coin0, coin1, amount0_in, delivered, sellers_total);

        Ok(SwapOutcome {
            amount_in: amount0_in,
            amount_out: delivered,
            pair_id: pair.id(),
            trade,
            sellers,
        })
    }

    // ---- limit orders ----

    /// Places a limit order: the owner offers `want_sell` of
    /// `coin_want_sell` for `want_buy` of `coin_want_buy`. The caller has
    /// already escrowed the sold amount. Returns the order id.
    pub fn pair_add_order(
        &self,
        coin_want_buy: CoinId,
        coin_want_sell: CoinId,
        want_buy: U256,
        want_sell: U256,
        owner: Address,
        height: u64,
    ) -> Result<u32> {
        let id = self.shared.alloc_order_id();
        self.insert_order(coin_want_buy, coin_want_sell, want_buy, want_sell, owner, height, id)
    }

    /// Import path: places an order under an explicit id without touching
    /// the allocator.
    pub fn pair_add_order_with_id(
        &self,
        coin_want_buy: CoinId,
        coin_want_sell: CoinId,
        want_buy: U256,
        want_sell: U256,
        owner: Address,
        height: u64,
        id: u32,
    ) -> Result<u32> {
        self.insert_order(coin_want_buy, coin_want_sell, want_buy, want_sell, owner, height, id)
    }

    #[allow(clippy::too_many_arguments)]
    fn insert_order(
        &self,
        coin_want_buy: CoinId,
        coin_want_sell: CoinId,
        want_buy: U256,
        want_sell: U256,
        owner: Address,
        height: u64,
        id: u32,
    ) -> Result<u32> {
        if coin_want_buy == coin_want_sell {
            return Err(SwapError::IdenticalCoins(coin_want_buy));
        }
        if want_sell.is_zero() {
            return Err(SwapError::InsufficientInputAmount);
        }
        if want_buy.is_zero() {
            return Err(SwapError::InsufficientOutputAmount);
        }
        let pair = self.existing_pair(coin_want_sell, coin_want_buy)?;
        let canonical = pair.canonical_key();
        let is_buy = coin_want_sell == canonical.coin0;

        let limit = Limit::new(id, canonical, is_buy, want_sell, want_buy, owner, height);
        pair.insert_order(limit);
        self.order_pairs.lock().insert(id, canonical);
        self.bus
            .checker()
            .add_coin(coin_want_sell, signed_delta(false, want_sell));
        Ok(id)
    }

    /// The live order with the given id, if any.
    pub fn get_order(&self, id: u32) -> Option<Limit> {
        if let Some(canonical) = self.order_pairs.lock().get(&id).copied() {
            let pair = self.swapper(canonical.coin0, canonical.coin1)?;
            return pair.order_by_id(id);
        }
        let tree = self.shared.tree_handle();
        let bytes = tree.get(&key::order_record_path(id))?;
        let record = match Limit::decode_record(id, &bytes) {
            Ok(record) => record,
            Err(err) => panic!("corrupted order record {id}: {err}"),
        };
        let pair = self.swapper(record.pair().coin0, record.pair().coin1)?;
        // the pair may hold a fresher in-block state for this order
        pair.order_by_id(id)
    }

    pub fn get_orders(&self, ids: &[u32]) -> Vec<Option<Limit>> {
        ids.iter().map(|id| self.get_order(*id)).collect()
    }

    /// Ownership precondition for cancelling an order.
    pub fn check_remove_limit_order(&self, id: u32, sender: Address) -> Result<()> {
        let order = self.get_order(id).ok_or(SwapError::OrderNotFound(id))?;
        if order.owner() != sender {
            return Err(SwapError::NotOrderOwner(id));
        }
        Ok(())
    }

    /// Removes a live order. Returns the coin and amount to refund to the
    /// owner; crediting the balance is the caller's responsibility.
    pub fn pair_remove_limit_order(&self, id: u32) -> Result<(CoinId, U256)> {
        let order = self.get_order(id).ok_or(SwapError::OrderNotFound(id))?;
        let pair = self.existing_pair(order.pair().coin0, order.pair().coin1)?;
        pair.remove_order(id);

        let coin = order.sell_coin();
        let amount = order.want_sell();
        self.bus.checker().add_coin(coin, signed_delta(true, amount));
        Ok((coin, amount))
    }

    /// Removes every order whose activation height has passed, credits
    /// the owners through the accounts adapter and emits events.
    pub fn expire_orders(&self, before_height: u64) {
        let tree = self.shared.tree_handle();
        let mut expired: Vec<Limit> = Vec::new();
        tree.iterate_range(
            &key::order_record_path(0),
            &key::order_record_path(u32::MAX),
            true,
            &mut |key_bytes, value| {
                if value.is_empty() {
                    return false;
                }
                let Some(id) = key::order_id_from_key(key_bytes, false) else {
                    return false;
                };
                let order = match Limit::decode_record(id, value) {
                    Ok(order) => order,
                    Err(err) => panic!("corrupted order record {id}: {err}"),
                };
                // records are scanned in id order; the sweep stops at the
                // first order that is not yet expirable
                if order.height() > before_height {
                    return true;
                }
                expired.push(order);
                false
            },
        );

        for order in expired {
            let Ok((coin, amount)) = self.pair_remove_limit_order(order.id()) else {
                // already removed in this block
                continue;
            };
            self.bus.accounts().add_balance(order.owner(), coin, amount);
            self.bus.events().add_event(SwapEvent::OrderExpired {
                id: order.id() as u64,
                address: order.owner(),
                coin,
                amount,
            });
        }
    }

    // ---- commit ----

    fn ordered_dirty_keys(set: &Mutex<HashSet<PairKey>>) -> Vec<PairKey> {
        let mut keys: Vec<PairKey> = set.lock().drain().collect();
        keys.sort_by(|a, b| b.bytes().cmp(&a.bytes()));
        keys
    }

    /// Flushes the dirty subset into the mutable tree. Processing order is
    /// deterministic: id counters, then dirty pairs by descending key
    /// bytes, then dirty orders per pair by descending id.
    pub fn commit(&self, db: &mut dyn MutableTree, height: u64) {
        {
            let mut counter = self.shared.next_pair_id.lock();
            if counter.dirty {
                counter.dirty = false;
                if let Some(value) = counter.cached {
                    db.set(key::next_pair_id_path(), alloy_rlp::encode(value));
                }
            }
        }
        {
            let mut counter = self.shared.next_order_id.lock();
            if counter.dirty {
                counter.dirty = false;
                if let Some(value) = counter.cached {
                    db.set(key::next_order_id_path(), alloy_rlp::encode(value));
                }
            }
        }

        let pairs = self.pairs.lock();

        let dirty_pairs = Self::ordered_dirty_keys(&self.shared.dirty_pairs);
        let mut flushed_pairs = 0usize;
        for pair_key in dirty_pairs {
            let Some(Some(inner)) = pairs.get(&pair_key) else { continue };
            let data = inner.data.read();
            db.set(key::pair_data_path(pair_key), alloy_rlp::encode(&*data));
            flushed_pairs += 1;
        }

        let dirty_order_pairs = Self::ordered_dirty_keys(&self.shared.dirty_order_pairs);
        let mut flushed_orders = 0usize;
        for pair_key in dirty_order_pairs {
            let Some(Some(inner)) = pairs.get(&pair_key) else { continue };
            let mut book = inner.book.write();
            for id in book.dirty_ids_desc() {
                let Some(order) = book.dirty_order(id) else { continue };
                flushed_orders += 1;

                if book.is_deleted(id) || order.is_empty() {
                    db.remove(&key::order_record_path(id));
                    if let Some(old_path) = order.old_index_path() {
                        db.remove(&old_path);
                    }
                    continue;
                }

                let new_path = order.index_path();
                if let Some(old_path) = order.old_index_path() {
                    if old_path != new_path {
                        db.remove(&old_path);
                    }
                }
                db.set(new_path, Vec::new());
                db.set(key::order_record_path(id), order.encode_record());
            }
            book.clear_delta();
        }

        debug!(height, pairs = flushed_pairs, orders = flushed_orders, "swap state committed");
    }

    // ---- genesis ----

    /// Writes every pool with its orders into `state`, deterministically
    /// ordered by coin pair.
    pub fn export(&self, state: &mut SwapState) {
        let tree = self.shared.tree_handle();
        let (start, end) = key::pair_data_range();
        let mut pair_keys: Vec<PairKey> = Vec::new();
        tree.iterate_range(&start, &end, true, &mut |key_bytes, _| {
            if key_bytes.len() >= 10 {
                let coin0 = u32::from_be_bytes(key_bytes[2..6].try_into().unwrap_or_default());
                let coin1 = u32::from_be_bytes(key_bytes[6..10].try_into().unwrap_or_default());
                pair_keys.push(PairKey::new(CoinId(coin0), CoinId(coin1)));
            }
            false
        });

        for pair_key in pair_keys {
            let Some(pair) = self.swapper(pair_key.coin0, pair_key.coin1) else { continue };
            let mut orders: Vec<OrderState> = Vec::new();
            for sell_side in [false, true] {
                let (start, end) = key::order_index_range(pair_key, sell_side);
                tree.iterate_range(&start, &end, true, &mut |key_bytes, _| {
                    let Some(id) = key::order_id_from_key(key_bytes, sell_side) else {
                        return false;
                    };
                    if let Some(bytes) = tree.get(&key::order_record_path(id)) {
                        match Limit::decode_record(id, &bytes) {
                            Ok(order) => orders.push(OrderState::from_limit(&order)),
                            Err(err) => panic!("corrupted order record {id}: {err}"),
                        }
                    }
                    false
                });
            }

            let (reserve0, reserve1) = pair.reserves();
            state.pools.push(PoolState {
                coin0: pair_key.coin0.0,
                coin1: pair_key.coin1.0,
                reserve0: reserve0.to_string(),
                reserve1: reserve1.to_string(),
                id: pair.id(),
                orders,
            });
        }

        state.pools.sort_by_key(|pool| (pool.coin0, pool.coin1));
        let tree = self.shared.tree_handle();
        state.next_order_id =
            self.shared.next_order_id.lock().current(tree.as_ref(), &key::next_order_id_path());
    }

    /// Rebuilds engine state from a genesis export. Everything imported is
    /// marked dirty so the next commit persists it.
    ///
    /// # Panics
    ///
    /// Malformed genesis state is fatal.
    pub fn import(&self, state: &SwapState) {
        let mut max_pair_id = 0u32;
        for pool in &state.pools {
            let coin0 = CoinId(pool.coin0);
            let coin1 = CoinId(pool.coin1);
            let pair = match self.return_pair(coin0, coin1) {
                Ok(pair) => pair,
                Err(err) => panic!("invalid genesis pool ({coin0}, {coin1}): {err}"),
            };
            let reserve0 = parse_amount(&pool.reserve0);
            let reserve1 = parse_amount(&pool.reserve1);
            pair.set_id(pool.id);
            pair.seed_reserves(reserve0, reserve1);
            max_pair_id = max_pair_id.max(pool.id);

            self.bus.checker().add_coin(coin0, signed_delta(false, reserve0));
            self.bus.checker().add_coin(coin1, signed_delta(false, reserve1));

            for order in &pool.orders {
                let volume0 = parse_amount(&order.volume0);
                let volume1 = parse_amount(&order.volume1);
                // a sale order escrows coin1 and wants coin0
                let (coin_want_buy, coin_want_sell, want_buy, want_sell) = if order.is_sale {
                    (coin0, coin1, volume0, volume1)
                } else {
                    (coin1, coin0, volume1, volume0)
                };
                if let Err(err) = self.pair_add_order_with_id(
                    coin_want_buy,
                    coin_want_sell,
                    want_buy,
                    want_sell,
                    order.owner,
                    order.height,
                    order.id,
                ) {
                    panic!("invalid genesis order {}: {err}", order.id);
                }
            }
        }

        self.shared.next_pair_id.lock().force(max_pair_id + 1);
        self.shared.next_order_id.lock().force(state.next_order_id);
    }
}

fn parse_amount(value: &str) -> U256 {
    match U256::from_str_radix(value, 10) {
        Ok(amount) => amount,
        Err(err) => panic!("invalid genesis amount {value:?}: {err}"),
    }
}
