//! The pair engine: constant-product reserves plus the attached order book.
//!
//! A [`Pair`] is a cheap handle over the canonical pair state. Operations
//! accept either orientation; a reversed handle swaps reserves, order sides
//! and price semantics while routing every mutation to the canonical state
//! exactly once.

use crate::book::OrderBook;
use crate::error::{Result, SwapError};
use crate::key::PairKey;
use crate::math::{Price, isqrt, mul_div, mul_div_ceil, narrow, price_scale, widen};
use crate::order::Limit;
use crate::swap::SwapShared;
use crate::tree::ImmutableTree;
use alloy_primitives::{Address, U256, U512};
use alloy_rlp::{RlpDecodable, RlpEncodable};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::warn;

/// Pool commission in permille, charged on the input side of every swap.
pub const COMMISSION: u64 = 2;

/// Order commission in permille, split half to each side of a fill.
pub const COMMISSION_ORDER: u64 = 2;

/// Lower bound on the initial liquidity of a pool.
pub const MINIMUM_LIQUIDITY: u64 = 1000;

const THOUSAND: u64 = 1000;
const MILLION: u64 = 1_000_000;

/// Reserves and id of a pool, as persisted under `s d <pair>`.
#[derive(Debug, Clone, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub(crate) struct PairData {
    pub(crate) reserve0: U256,
    pub(crate) reserve1: U256,
    pub(crate) id: u32,
}

impl PairData {
    pub(crate) fn empty() -> Self {
        Self { reserve0: U256::ZERO, reserve1: U256::ZERO, id: 0 }
    }
}

pub(crate) struct PairInner {
    pub(crate) key: PairKey,
    pub(crate) data: RwLock<PairData>,
    pub(crate) book: RwLock<OrderBook>,
    pub(crate) shared: Arc<SwapShared>,
    /// Detached pairs are speculative snapshots: they never mark anything
    /// dirty and never allocate ids.
    pub(crate) detached: bool,
}

/// Signed reserve adjustment.
#[derive(Debug, Clone, Copy)]
pub(crate) enum ReserveDelta {
    Add(U256),
    Sub(U256),
}

impl ReserveDelta {
    fn apply(self, reserve: U256, side: &str) -> U256 {
        match self {
            ReserveDelta::Add(v) => reserve
                .checked_add(v)
                .unwrap_or_else(|| panic!("reserve {side} overflow")),
            ReserveDelta::Sub(v) => reserve
                .checked_sub(v)
                .unwrap_or_else(|| panic!("reserve {side} underflow")),
        }
    }
}

/// One limit order consumed (fully or partially) by a planned swap.
///
/// Amounts are gross, in the orientation of the pair handle that produced
/// the plan: `pays` flows taker → order in the view's sell coin, `gets`
/// flows order → taker in the view's buy coin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderFill {
    pub id: u32,
    pub owner: Address,
    pub pays: U256,
    pub gets: U256,
}

/// Outcome of an applied swap-with-orders, in view orientation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeWithOrders {
    /// Input routed through the pool (excludes order fills, includes none
    /// of the commissions).
    pub pool_in: U256,
    /// Output taken from the pool.
    pub pool_out: U256,
    /// Order commission donated to the view's sell-side reserve.
    pub commission_in: U256,
    /// Order commission donated to the view's buy-side reserve.
    pub commission_out: U256,
    pub fills: Vec<OrderFill>,
}

/// Net amount the receiving side keeps from a gross order volume.
pub(crate) fn order_net(amount: U256) -> U256 {
    let per_side = THOUSAND - COMMISSION_ORDER / 2;
    mul_div(amount, U256::from(per_side), U256::from(THOUSAND)).unwrap_or(amount)
}

/// Order commission withheld from a gross volume: `ceil(amount / 1000)`.
pub(crate) fn order_fee(amount: U256) -> U256 {
    amount - order_net(amount)
}

fn div_ceil_512(num: U512, den: U512) -> U512 {
    let mut quo = num / den;
    if num % den != U512::ZERO {
        quo += U512::from(1u64);
    }
    quo
}

/// Pool-only forward quote on raw reserves:
/// `a1 = r1 - ceil(k*1e6 / (((a0 + r0)*1000 - a0*c) * 1000)) - 1`.
fn pool_buy_for_sell(r0: U256, r1: U256, amount0_in: U256) -> Option<U256> {
    let k_adj = widen(r0)
        .checked_mul(widen(r1))?
        .checked_mul(U512::from(MILLION))?;
    let balance0_adj = (widen(amount0_in) + widen(r0)) * U512::from(THOUSAND)
        - widen(amount0_in) * U512::from(COMMISSION);
    let quo = div_ceil_512(k_adj, balance0_adj * U512::from(THOUSAND));
    let out = widen(r1)
        .checked_sub(quo)?
        .checked_sub(U512::from(1u64))?;
    if out.is_zero() {
        return None;
    }
    narrow(out)
}

/// Pool-only inverse quote on raw reserves:
/// `a0 = ceil((k*1e6 / ((r1 - a1)*1000) - r0*1000) / (1000 - c)) + 1`.
fn pool_sell_for_buy(r0: U256, r1: U256, amount1_out: U256) -> Option<U256> {
    if amount1_out >= r1 {
        return None;
    }
    let k_adj = widen(r0)
        .checked_mul(widen(r1))?
        .checked_mul(U512::from(MILLION))?;
    let balance1_adj = (widen(r1) - widen(amount1_out)) * U512::from(THOUSAND);
    let quo = k_adj / balance1_adj;
    let numer = quo.checked_sub(widen(r0) * U512::from(THOUSAND))?;
    let amount0 = div_ceil_512(numer, U512::from(THOUSAND - COMMISSION));
    narrow(amount0 + U512::from(1u64))
}

/// Commission-scaled k-check for a proposed `(a0_in, a1_out)` swap.
fn pool_k_holds(r0: U256, r1: U256, amount0_in: U256, amount1_out: U256) -> bool {
    let balance0_adj = (widen(amount0_in) + widen(r0)) * U512::from(THOUSAND)
        - widen(amount0_in) * U512::from(COMMISSION);
    let Some(balance1_adj) = widen(r1)
        .checked_sub(widen(amount1_out))
        .map(|v| v * U512::from(THOUSAND))
    else {
        return false;
    };
    let Some(lhs) = balance0_adj.checked_mul(balance1_adj) else {
        return false;
    };
    let Some(rhs) = widen(r0)
        .checked_mul(widen(r1))
        .and_then(|k| k.checked_mul(U512::from(MILLION)))
    else {
        return false;
    };
    lhs >= rhs
}

/// Input of the view's sell coin that sweeps the pool marginal price down
/// to `price`, with the output it produces. Solves the commission-adjusted
/// quadratic and rounds so that executing the step never leaves the price
/// above the target.
fn pool_step_to_price(r0: U256, r1: U256, price: Price) -> Option<(U256, U256)> {
    if r0.is_zero() || r1.is_zero() || price.is_zero() {
        return None;
    }
    let pool_price = Price::from_ratio(r1, r0)?;
    if price >= pool_price {
        return None;
    }

    let p = price.raw();
    let r0w = widen(r0);
    let r1w = widen(r1);
    let e24 = price_scale() * U512::from(MILLION);

    // inner = r0^2/1e6 + 1002 * r0 * r1 / (1000 * p); scaled by D = 1e9 * p
    let n1 = r0w.checked_mul(r0w)?.checked_mul(U512::from(THOUSAND))?.checked_mul(p)?;
    let n2 = r0w
        .checked_mul(r1w)?
        .checked_mul(U512::from(THOUSAND + COMMISSION))?
        .checked_mul(e24)?;
    let d = U512::from(1_000_000_000u64).checked_mul(p)?;
    let root = isqrt((n1.checked_add(n2)?) / d);

    // x = (1000 * sqrt(inner) - 1001 * r0) / 1002
    let lhs = root.checked_mul(U512::from(THOUSAND))?;
    let rhs = r0w * U512::from(THOUSAND + COMMISSION / 2);
    if lhs <= rhs {
        return None;
    }
    let x = (lhs - rhs) / U512::from(THOUSAND + COMMISSION);

    // nudge up by the commission band so the target is reached from below
    let num = x.checked_mul(U512::from(THOUSAND + COMMISSION))?;
    let mut amount0 = num / U512::from(THOUSAND);
    if num % U512::from(THOUSAND) != U512::ZERO {
        amount0 += U512::from(1u64);
    }
    amount0 += U512::from(1u64);

    let amount0 = narrow(amount0)?;
    let amount1 = pool_buy_for_sell(r0, r1, amount0)?;
    Some((amount0, amount1))
}

/// Handle over one pool, in one of its two orientations.
#[derive(Clone)]
pub struct Pair {
    pub(crate) inner: Arc<PairInner>,
    pub(crate) reversed: bool,
}

impl Pair {
    pub(crate) fn new(inner: Arc<PairInner>, reversed: bool) -> Self {
        Self { inner, reversed }
    }

    /// The same pool seen from the other side.
    pub fn reverse(&self) -> Pair {
        Pair { inner: Arc::clone(&self.inner), reversed: !self.reversed }
    }

    /// The pair key in this handle's orientation.
    pub fn key(&self) -> PairKey {
        if self.reversed { self.inner.key.reversed() } else { self.inner.key }
    }

    /// The canonical pair key.
    pub fn canonical_key(&self) -> PairKey {
        self.inner.key
    }

    pub fn id(&self) -> u32 {
        self.inner.data.read().id
    }

    pub(crate) fn set_id(&self, id: u32) {
        self.inner.data.write().id = id;
    }

    /// Import path: installs reserves into a freshly created empty pair,
    /// oriented to this handle.
    pub(crate) fn seed_reserves(&self, reserve0: U256, reserve1: U256) {
        self.update(ReserveDelta::Add(reserve0), ReserveDelta::Add(reserve1));
    }

    /// Registers a new order with this pair's book.
    pub(crate) fn insert_order(&self, limit: Limit) {
        self.mark_dirty_orders();
        self.inner.book.write().insert(limit);
    }

    /// Drops a live order from this pair's book.
    pub(crate) fn remove_order(&self, id: u32) {
        self.mark_dirty_orders();
        self.inner.book.write().remove(id);
    }

    /// Reserves in view orientation.
    pub fn reserves(&self) -> (U256, U256) {
        let data = self.inner.data.read();
        if self.reversed {
            (data.reserve1, data.reserve0)
        } else {
            (data.reserve0, data.reserve1)
        }
    }

    /// Marginal price of this orientation, `reserve1 / reserve0`.
    pub fn price(&self) -> Option<Price> {
        let (r0, r1) = self.reserves();
        Price::from_ratio(r1, r0)
    }

    fn tree(&self) -> Arc<dyn ImmutableTree> {
        self.inner.shared.tree_handle()
    }

    fn mark_dirty(&self) {
        if !self.inner.detached {
            self.inner.shared.mark_dirty_pair(self.inner.key);
        }
    }

    pub(crate) fn mark_dirty_orders(&self) {
        if !self.inner.detached {
            self.inner.shared.mark_dirty_orders(self.inner.key);
        }
    }

    /// Adjusts reserves, mapping view deltas onto the canonical state.
    pub(crate) fn update(&self, delta0: ReserveDelta, delta1: ReserveDelta) {
        self.mark_dirty();
        let mut data = self.inner.data.write();
        if self.reversed {
            data.reserve1 = delta0.apply(data.reserve1, "1");
            data.reserve0 = delta1.apply(data.reserve0, "0");
        } else {
            data.reserve0 = delta0.apply(data.reserve0, "0");
            data.reserve1 = delta1.apply(data.reserve1, "1");
        }
    }

    // ---- pool-only math ----

    /// Output of selling `amount0_in` into the pool alone.
    pub fn calculate_buy_for_sell(&self, amount0_in: U256) -> Option<U256> {
        let (r0, r1) = self.reserves();
        pool_buy_for_sell(r0, r1, amount0_in)
    }

    /// Input required to take `amount1_out` out of the pool alone.
    pub fn calculate_sell_for_buy(&self, amount1_out: U256) -> Option<U256> {
        let (r0, r1) = self.reserves();
        pool_sell_for_buy(r0, r1, amount1_out)
    }

    /// Precondition form of the commission-scaled k-check.
    pub fn check_swap(&self, amount0_in: U256, amount1_out: U256) -> Result<()> {
        let (r0, r1) = self.reserves();
        if amount1_out > r1 {
            return Err(SwapError::InsufficientLiquidity);
        }
        if amount1_out.is_zero() {
            return Err(SwapError::InsufficientOutputAmount);
        }
        if amount0_in.is_zero() {
            return Err(SwapError::InsufficientInputAmount);
        }
        if !pool_k_holds(r0, r1, amount0_in, amount1_out) {
            return Err(SwapError::KViolation);
        }
        Ok(())
    }

    /// Applies a plain pool swap that has already been validated.
    ///
    /// # Panics
    ///
    /// A failing k-check here is a consensus inconsistency.
    pub(crate) fn apply_swap(&self, amount0_in: U256, amount1_out: U256) {
        let (r0, r1) = self.reserves();
        assert!(
            amount1_out <= r1 && pool_k_holds(r0, r1, amount0_in, amount1_out),
            "constant product violated on pair {:?}",
            self.inner.key,
        );
        self.update(ReserveDelta::Add(amount0_in), ReserveDelta::Sub(amount1_out));
    }

    // ---- order access ----

    /// Ids of the orders a sale in this orientation can cross, cheapest
    /// first.
    fn crossing_order_ids(&self) -> Vec<u32> {
        let tree = self.tree();
        self.inner
            .book
            .write()
            .side_ids(self.inner.key, !self.reversed, tree.as_ref())
    }

    pub(crate) fn order_by_id(&self, id: u32) -> Option<Limit> {
        let tree = self.tree();
        let mut book = self.inner.book.write();
        if !book.ensure_loaded(id, tree.as_ref()) {
            return None;
        }
        book.cached(id).cloned()
    }

    /// First `limit` orders crossable by a sale in this orientation, by
    /// ascending crossing price. Records are returned in their canonical
    /// storage orientation.
    pub fn orders_sell(&self, limit: u32) -> Vec<Limit> {
        self.crossing_order_ids()
            .into_iter()
            .take(limit as usize)
            .filter_map(|id| self.order_by_id(id))
            .collect()
    }

    /// The `index`-th crossable order, if that many exist.
    pub fn order_sell_by_index(&self, index: usize) -> Option<Limit> {
        let id = self.crossing_order_ids().into_iter().nth(index)?;
        self.order_by_id(id)
    }

    // ---- swap combined with the order book ----

    /// Plans a sale of `amount0_in`: the output obtained by filling every
    /// crossed order and sweeping the pool in between. Read-only.
    pub fn calculate_buy_for_sell_with_orders(
        &self,
        amount0_in: U256,
    ) -> (U256, Vec<OrderFill>) {
        let (mut r0, mut r1) = self.reserves();
        let mut amount_in = amount0_in;
        let mut amount_out = U256::ZERO;
        let mut fills = Vec::new();

        for id in self.crossing_order_ids() {
            if amount_in.is_zero() {
                break;
            }
            let Some(order) = self.order_by_id(id) else { continue };
            // crossing price: taker-gets per taker-pays
            let order_price = order.crossing_price();
            if order_price.is_zero() {
                continue;
            }
            let Some(pool_price) = Price::from_ratio(r1, r0) else { break };
            if order_price >= pool_price {
                break;
            }

            if let Some((step0, step1)) = pool_step_to_price(r0, r1, order_price) {
                if amount_in <= step0 {
                    break;
                }
                amount_in -= step0;
                amount_out += step1;
                r0 += step0;
                r1 -= step1;
            }

            if amount_in <= order.want_buy() {
                // partial fill, proportional at the order price
                let gets = mul_div(amount_in, order.want_sell(), order.want_buy())
                    .unwrap_or(U256::ZERO);
                amount_out += order_net(gets);
                fills.push(OrderFill {
                    id: order.id(),
                    owner: order.owner(),
                    pays: amount_in,
                    gets,
                });
                amount_in = U256::ZERO;
                break;
            }

            amount_in -= order.want_buy();
            amount_out += order_net(order.want_sell());
            // the two order commissions stay in the pool
            r0 += order_fee(order.want_buy());
            r1 += order_fee(order.want_sell());
            fills.push(OrderFill {
                id: order.id(),
                owner: order.owner(),
                pays: order.want_buy(),
                gets: order.want_sell(),
            });
        }

        if !amount_in.is_zero() {
            if let Some(residual) = pool_buy_for_sell(r0, r1, amount_in) {
                amount_out += residual;
            }
        }
        (amount_out, fills)
    }

    /// Plans the input needed to obtain `amount1_out`. Returns
    /// `(amount0_in, delivered, fills)`; `delivered` can exceed the target
    /// by the fill rounding. `None` when the pool cannot cover the residual.
    pub fn calculate_sell_for_buy_with_orders(
        &self,
        amount1_out: U256,
    ) -> Option<(U256, U256, Vec<OrderFill>)> {
        let (mut r0, mut r1) = self.reserves();
        let mut target = amount1_out;
        let mut amount_in = U256::ZERO;
        let mut delivered = U256::ZERO;
        let mut fills = Vec::new();

        for id in self.crossing_order_ids() {
            if target.is_zero() {
                break;
            }
            let Some(order) = self.order_by_id(id) else { continue };
            let order_price = order.crossing_price();
            if order_price.is_zero() {
                continue;
            }
            let Some(pool_price) = Price::from_ratio(r1, r0) else { break };
            if order_price >= pool_price {
                break;
            }

            if let Some((step0, step1)) = pool_step_to_price(r0, r1, order_price) {
                if target <= step1 {
                    break;
                }
                target -= step1;
                delivered += step1;
                amount_in += step0;
                r0 += step0;
                r1 -= step1;
            }

            let net_available = order_net(order.want_sell());
            if target <= net_available {
                // gross volume whose net covers the remaining target
                let per_side = THOUSAND - COMMISSION_ORDER / 2;
                let mut gets =
                    mul_div_ceil(target, U256::from(THOUSAND), U256::from(per_side))?;
                if gets > order.want_sell() {
                    gets = order.want_sell();
                }
                let mut pays = mul_div_ceil(gets, order.want_buy(), order.want_sell())?;
                if pays > order.want_buy() {
                    pays = order.want_buy();
                }
                delivered += order_net(gets);
                amount_in += pays;
                fills.push(OrderFill { id: order.id(), owner: order.owner(), pays, gets });
                target = U256::ZERO;
                break;
            }

            target -= net_available;
            delivered += net_available;
            amount_in += order.want_buy();
            r0 += order_fee(order.want_buy());
            r1 += order_fee(order.want_sell());
            fills.push(OrderFill {
                id: order.id(),
                owner: order.owner(),
                pays: order.want_buy(),
                gets: order.want_sell(),
            });
        }

        if !target.is_zero() {
            let residual = pool_sell_for_buy(r0, r1, target)?;
            amount_in += residual;
            delivered += target;
        }
        Some((amount_in, delivered, fills))
    }

    /// Applies a planned swap-with-orders to the real state: decrements the
    /// consumed orders, donates the order commissions to the reserves and
    /// moves the residual through the pool.
    pub(crate) fn apply_swap_with_orders(
        &self,
        amount0_in: U256,
        amount1_out: U256,
        fills: Vec<OrderFill>,
    ) -> TradeWithOrders {
        let mut pays_sum = U256::ZERO;
        let mut net_gets_sum = U256::ZERO;
        let mut commission_in = U256::ZERO;
        let mut commission_out = U256::ZERO;
        for fill in &fills {
            pays_sum += fill.pays;
            net_gets_sum += order_net(fill.gets);
            commission_in += order_fee(fill.pays);
            commission_out += order_fee(fill.gets);
        }

        let pool_in = amount0_in
            .checked_sub(pays_sum)
            .unwrap_or_else(|| panic!("order fills exceed swap input"));
        let pool_out = amount1_out.saturating_sub(net_gets_sum);

        if !pool_in.is_zero() || !pool_out.is_zero() {
            // whether or not fills were interleaved, the amounts routed
            // through the pool must satisfy the k-check against the real
            // reserves; the commissions donated below only grow k
            self.apply_swap(pool_in, pool_out);
        }
        if !commission_in.is_zero() || !commission_out.is_zero() {
            self.update(
                ReserveDelta::Add(commission_in),
                ReserveDelta::Add(commission_out),
            );
        }

        if !fills.is_empty() {
            self.mark_dirty_orders();
            let mut book = self.inner.book.write();
            for fill in &fills {
                book.apply_fill(fill.id, fill.pays, fill.gets);
            }
        }

        TradeWithOrders { pool_in, pool_out, commission_in, commission_out, fills }
    }

    // ---- speculative snapshots ----

    fn detach(&self) -> Pair {
        let inner = PairInner {
            key: self.inner.key,
            data: RwLock::new(self.inner.data.read().clone()),
            book: RwLock::new(self.inner.book.read().clone()),
            shared: Arc::clone(&self.inner.shared),
            detached: true,
        };
        Pair { inner: Arc::new(inner), reversed: self.reversed }
    }

    /// Snapshot with a plain pool step applied. The real pair is untouched.
    pub fn add_last_swap_step(&self, amount0_in: U256, amount1_out: U256) -> Pair {
        let snapshot = self.detach();
        snapshot.update(
            ReserveDelta::Add(amount0_in),
            ReserveDelta::Sub(amount1_out),
        );
        snapshot
    }

    /// Snapshot with a full swap-with-orders applied, for chaining route
    /// estimates. The real pair is untouched.
    pub fn add_last_swap_step_with_orders(&self, amount0_in: U256, amount1_out: U256) -> Pair {
        let (calculated, fills) = self.calculate_buy_for_sell_with_orders(amount0_in);
        if calculated != amount1_out {
            warn!(
                expected = %amount1_out,
                calculated = %calculated,
                "speculative swap step disagrees with supplied output"
            );
        }
        let snapshot = self.detach();
        snapshot.apply_swap_with_orders(amount0_in, calculated, fills);
        snapshot
    }

    // ---- liquidity ----

    /// `liquidity = total_supply * amount0 / reserve0` and the coin1 amount
    /// matching `amount0` at the current ratio.
    pub fn calculate_add_liquidity(
        &self,
        amount0: U256,
        total_supply: U256,
    ) -> Result<(U256, U256)> {
        let (r0, r1) = self.reserves();
        if r0.is_zero() {
            return Err(SwapError::InsufficientLiquidity);
        }
        let liquidity =
            mul_div(total_supply, amount0, r0).ok_or(SwapError::InsufficientLiquidity)?;
        let amount1 = mul_div(amount0, r1, r0).ok_or(SwapError::InsufficientLiquidity)?;
        Ok((liquidity, amount1))
    }

    pub fn check_mint(&self, amount0: U256, max_amount1: U256, total_supply: U256) -> Result<()> {
        let (liquidity, amount1) = self.calculate_add_liquidity(amount0, total_supply)?;
        if amount1 > max_amount1 {
            return Err(SwapError::InsufficientInputAmount);
        }
        if liquidity.is_zero() {
            return Err(SwapError::InsufficientLiquidityMinted);
        }
        Ok(())
    }

    /// Adds liquidity. Returns the minted share amount and the coin1 amount
    /// actually taken.
    pub(crate) fn mint(
        &self,
        amount0: U256,
        max_amount1: U256,
        total_supply: U256,
    ) -> Result<(U256, U256)> {
        let (liquidity, amount1) = self.calculate_add_liquidity(amount0, total_supply)?;
        if amount1 > max_amount1 {
            return Err(SwapError::InsufficientInputAmount);
        }
        if liquidity.is_zero() {
            return Err(SwapError::InsufficientLiquidityMinted);
        }
        self.update(ReserveDelta::Add(amount0), ReserveDelta::Add(amount1));
        Ok((liquidity, amount1))
    }

    pub fn check_create(&self, amount0: U256, amount1: U256) -> Result<()> {
        check_create_amounts(amount0, amount1)
    }

    /// Seeds an empty pool. Returns the initial liquidity.
    ///
    /// # Panics
    ///
    /// Creating over a non-empty pool is a dispatcher bug and fatal.
    pub(crate) fn create(&self, amount0: U256, amount1: U256) -> Result<U256> {
        let liquidity = starting_supply(amount0, amount1);
        if liquidity <= U256::from(MINIMUM_LIQUIDITY) {
            return Err(SwapError::InsufficientLiquidityMinted);
        }
        {
            let data = self.inner.data.read();
            assert!(
                data.reserve0.is_zero() && data.reserve1.is_zero(),
                "create on non-empty pair {:?}",
                self.inner.key,
            );
        }
        self.update(ReserveDelta::Add(amount0), ReserveDelta::Add(amount1));
        Ok(liquidity)
    }

    /// Amounts returned for burning `liquidity` of `total_supply` shares.
    pub fn amounts(&self, liquidity: U256, total_supply: U256) -> Result<(U256, U256)> {
        if total_supply.is_zero() {
            return Err(SwapError::InsufficientLiquidityBurned);
        }
        let (r0, r1) = self.reserves();
        let amount0 =
            mul_div(liquidity, r0, total_supply).ok_or(SwapError::InsufficientLiquidityBurned)?;
        let amount1 =
            mul_div(liquidity, r1, total_supply).ok_or(SwapError::InsufficientLiquidityBurned)?;
        Ok((amount0, amount1))
    }

    pub fn check_burn(
        &self,
        liquidity: U256,
        min_amount0: U256,
        min_amount1: U256,
        total_supply: U256,
    ) -> Result<()> {
        if liquidity > total_supply {
            return Err(SwapError::InsufficientLiquidityBalance);
        }
        let (amount0, amount1) = self.amounts(liquidity, total_supply)?;
        if amount0 < min_amount0 || amount1 < min_amount1 {
            return Err(SwapError::InsufficientLiquidityBurned);
        }
        Ok(())
    }

    /// Removes liquidity. Returns the amounts released.
    pub(crate) fn burn(
        &self,
        liquidity: U256,
        min_amount0: U256,
        min_amount1: U256,
        total_supply: U256,
    ) -> Result<(U256, U256)> {
        self.check_burn(liquidity, min_amount0, min_amount1, total_supply)?;
        let (amount0, amount1) = self.amounts(liquidity, total_supply)?;
        self.update(ReserveDelta::Sub(amount0), ReserveDelta::Sub(amount1));
        Ok((amount0, amount1))
    }
}

/// `floor(sqrt(amount0 * amount1))`, the starting share supply.
fn starting_supply(amount0: U256, amount1: U256) -> U256 {
    let product = widen(amount0) * widen(amount1);
    narrow(isqrt(product)).unwrap_or(U256::MAX)
}

/// Minimum-liquidity bound for seeding a pool, checkable before the pair
/// object exists.
pub(crate) fn check_create_amounts(amount0: U256, amount1: U256) -> Result<()> {
    if starting_supply(amount0, amount1) <= U256::from(MINIMUM_LIQUIDITY) {
        return Err(SwapError::InsufficientLiquidityMinted);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::CoinId;
    use crate::swap::SwapShared;
    use crate::tree::MemTree;
    use alloy_primitives::address;

    const OWNER: Address = address!("0x00000000000000000000000000000000000000bb");

    fn detached_pair(r0: u64, r1: u64) -> Pair {
        let shared = SwapShared::new(Arc::new(MemTree::new()));
        let inner = PairInner {
            key: PairKey::new(CoinId(1), CoinId(2)),
            data: RwLock::new(PairData {
                reserve0: U256::from(r0),
                reserve1: U256::from(r1),
                id: 1,
            }),
            book: RwLock::new(Default::default()),
            shared,
            detached: true,
        };
        Pair::new(Arc::new(inner), false)
    }

    fn sale_order_price() -> Price {
        // taker price of the (450, 500) sale order
        Price::from_ratio(U256::from(500u64), U256::from(450u64)).unwrap()
    }

    fn add_sale_order(pair: &Pair, id: u32, want_sell: u64, want_buy: u64) {
        let limit = Limit::new(
            id,
            pair.canonical_key(),
            false,
            U256::from(want_sell),
            U256::from(want_buy),
            OWNER,
            1,
        );
        pair.inner.book.write().insert(limit);
    }

    #[test]
    fn buy_for_sell_matches_reference_value() {
        // reserves (1e6, 1e6), selling 1000 nets exactly 996
        let pair = detached_pair(1_000_000, 1_000_000);
        assert_eq!(
            pair.calculate_buy_for_sell(U256::from(1000u64)),
            Some(U256::from(996u64))
        );
        // the quote must satisfy its own k-check
        pair.check_swap(U256::from(1000u64), U256::from(996u64)).unwrap();
    }

    #[test]
    fn sell_for_buy_inverts_with_pool_favor() {
        let pair = detached_pair(1_000_000, 1_000_000);
        let out = U256::from(996u64);
        let back = pair.calculate_sell_for_buy(out).unwrap();
        // requires at most what the forward quote charged
        assert!(back <= U256::from(1000u64));
        assert!(back > U256::ZERO);

        assert_eq!(pair.calculate_sell_for_buy(U256::from(1_000_000u64)), None);
    }

    #[test]
    fn buy_for_sell_rejects_dust() {
        let pair = detached_pair(1_000_000, 1_000_000);
        assert_eq!(pair.calculate_buy_for_sell(U256::ZERO), None);
        assert_eq!(pair.calculate_buy_for_sell(U256::from(1u64)), None);
    }

    #[test]
    fn applied_swap_preserves_k_invariant() {
        let pair = detached_pair(1_000_000, 1_000_000);
        let amount_in = U256::from(12_345u64);
        let amount_out = pair.calculate_buy_for_sell(amount_in).unwrap();
        pair.check_swap(amount_in, amount_out).unwrap();
        pair.apply_swap(amount_in, amount_out);

        let (r0, r1) = pair.reserves();
        assert_eq!(r0, U256::from(1_012_345u64));
        assert_eq!(r1, U256::from(1_000_000u64) - amount_out);
    }

    #[test]
    fn check_swap_flags_greedy_output() {
        let pair = detached_pair(1_000_000, 1_000_000);
        let amount_in = U256::from(1000u64);
        let fair = pair.calculate_buy_for_sell(amount_in).unwrap();
        assert_eq!(
            pair.check_swap(amount_in, fair + U256::from(10u64)),
            Err(SwapError::KViolation)
        );
        assert_eq!(
            pair.check_swap(amount_in, U256::from(2_000_000u64)),
            Err(SwapError::InsufficientLiquidity)
        );
        assert_eq!(
            pair.check_swap(amount_in, U256::ZERO),
            Err(SwapError::InsufficientOutputAmount)
        );
    }

    #[test]
    fn reversed_view_swaps_reserves_and_routes_mutations() {
        let pair = detached_pair(10_000, 40_000);
        let reversed = pair.reverse();
        assert_eq!(reversed.reserves(), (U256::from(40_000u64), U256::from(10_000u64)));
        assert_eq!(reversed.key(), pair.key().reversed());
        assert_eq!(reversed.canonical_key(), pair.canonical_key());

        reversed.update(
            ReserveDelta::Add(U256::from(100u64)),
            ReserveDelta::Sub(U256::from(10u64)),
        );
        assert_eq!(pair.reserves(), (U256::from(9_990u64), U256::from(40_100u64)));
    }

    #[test]
    fn prices_of_the_two_views_are_reciprocal() {
        let pair = detached_pair(10_000, 40_000);
        let direct = pair.price().unwrap();
        let reversed = pair.reverse().price().unwrap();
        let product = direct.raw() * reversed.raw() / price_scale();
        assert_eq!(product, price_scale());
    }

    #[test]
    fn step_to_price_lands_at_or_below_target() {
        let target = Price::from_ratio(U256::from(9u64), U256::from(10u64)).unwrap();
        let (d0, d1) = pool_step_to_price(
            U256::from(1_000_000u64),
            U256::from(1_000_000u64),
            target,
        )
        .unwrap();
        assert!(d0 > U256::ZERO && d1 > U256::ZERO);

        let r0 = U256::from(1_000_000u64) + d0;
        let r1 = U256::from(1_000_000u64) - d1;
        let landed = Price::from_ratio(r1, r0).unwrap();
        assert!(landed <= target, "price {landed:?} above target {target:?}");
        // and not grossly overshot: within ~1% of the target
        let floor = Price::from_ratio(U256::from(89u64), U256::from(100u64)).unwrap();
        assert!(landed >= floor, "overshot to {landed:?}");
    }

    #[test]
    fn step_to_price_refuses_prices_above_pool() {
        let above = Price::from_ratio(U256::from(2u64), U256::from(1u64)).unwrap();
        assert_eq!(
            pool_step_to_price(U256::from(1_000_000u64), U256::from(1_000_000u64), above),
            None
        );
    }

    #[test]
    fn small_sale_below_crossing_threshold_is_pool_only() {
        // the 0.9 order is crossed only once the pool price has been
        // swept down to it; a 2000 sale stops far short of that
        let pair = detached_pair(1_000_000, 1_000_000);
        add_sale_order(&pair, 1, 450, 500);

        let (out, fills) = pair.calculate_buy_for_sell_with_orders(U256::from(2000u64));
        assert!(fills.is_empty());
        assert_eq!(out, pair.calculate_buy_for_sell(U256::from(2000u64)).unwrap());
    }

    #[test]
    fn crossed_order_fills_between_pool_steps() {
        // sale order gives 450 coin1 for 500 coin0 at price 0.9; a sale
        // big enough to sweep the pool to 0.9 fills it completely: 449
        // nets to the taker, 499 to the owner, one unit of commission to
        // each reserve, and the remaining 1500 pool-swaps.
        let pair = detached_pair(1_000_000, 1_000_000);
        add_sale_order(&pair, 1, 450, 500);

        let crossing = Price::from_ratio(U256::from(450u64), U256::from(500u64)).unwrap();
        let (d0, d1) = pool_step_to_price(
            U256::from(1_000_000u64),
            U256::from(1_000_000u64),
            crossing,
        )
        .unwrap();

        let amount_in = d0 + U256::from(500u64) + U256::from(1500u64);
        let (out, fills) = pair.calculate_buy_for_sell_with_orders(amount_in);
        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].pays, U256::from(500u64));
        assert_eq!(fills[0].gets, U256::from(450u64));

        // taker nets 449 from the order; the owner will net 499
        assert_eq!(order_net(U256::from(450u64)), U256::from(449u64));
        assert_eq!(order_net(U256::from(500u64)), U256::from(499u64));

        // residual pool swap runs on the stepped reserves plus the two
        // one-unit order commissions
        let residual = pool_buy_for_sell(
            U256::from(1_000_000u64) + d0 + U256::from(1u64),
            U256::from(1_000_000u64) - d1 + U256::from(1u64),
            U256::from(1500u64),
        )
        .unwrap();
        assert_eq!(out, d1 + U256::from(449u64) + residual);

        let trade = pair.apply_swap_with_orders(amount_in, out, fills);
        assert_eq!(trade.pool_in, d0 + U256::from(1500u64));
        assert_eq!(trade.pool_out, d1 + residual);
        assert_eq!(trade.commission_in, U256::from(1u64));
        assert_eq!(trade.commission_out, U256::from(1u64));

        let (r0, r1) = pair.reserves();
        assert_eq!(r0, U256::from(1_000_000u64) + trade.pool_in + U256::from(1u64));
        assert_eq!(r1, U256::from(1_000_000u64) - trade.pool_out + U256::from(1u64));

        // the order is spent
        assert!(pair.order_by_id(1).is_none());
    }

    #[test]
    fn partial_fill_reduces_order_proportionally() {
        // once the pool has stepped to 0.9, a further 100 of input takes
        // 90 from the order and leaves it open at (360, 400); the sort
        // price is unchanged
        let pair = detached_pair(1_000_000, 1_000_000);
        add_sale_order(&pair, 1, 450, 500);

        let crossing = Price::from_ratio(U256::from(450u64), U256::from(500u64)).unwrap();
        let (d0, d1) = pool_step_to_price(
            U256::from(1_000_000u64),
            U256::from(1_000_000u64),
            crossing,
        )
        .unwrap();

        let amount_in = d0 + U256::from(100u64);
        let (out, fills) = pair.calculate_buy_for_sell_with_orders(amount_in);
        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].pays, U256::from(100u64));
        assert_eq!(fills[0].gets, U256::from(90u64));
        assert_eq!(out, d1 + order_net(U256::from(90u64)));

        let trade = pair.apply_swap_with_orders(amount_in, out, fills);
        assert_eq!(trade.pool_in, d0);
        assert_eq!(trade.pool_out, d1);
        assert_eq!(trade.commission_in, U256::from(1u64));
        assert_eq!(trade.commission_out, U256::from(1u64));

        let order = pair.order_by_id(1).unwrap();
        assert_eq!(order.want_buy(), U256::from(400u64));
        assert_eq!(order.want_sell(), U256::from(360u64));
        assert_eq!(order.sort_price(), sale_order_price());
    }

    #[test]
    fn orders_above_pool_price_stay_untouched() {
        let pair = detached_pair(1_000_000, 1_000_000);
        // price 1.1, above the pool's 1.0
        add_sale_order(&pair, 1, 1100, 1000);

        let (out, fills) = pair.calculate_buy_for_sell_with_orders(U256::from(2000u64));
        assert!(fills.is_empty());
        assert_eq!(out, pair.calculate_buy_for_sell(U256::from(2000u64)).unwrap());
    }

    #[test]
    fn sell_for_buy_with_orders_covers_target() {
        let pair = detached_pair(1_000_000, 1_000_000);
        add_sale_order(&pair, 1, 450, 500);

        // below the crossing threshold the quote is pool-only and the
        // round trip covers the target exactly
        let target = U256::from(2000u64);
        let (amount_in, delivered, fills) =
            pair.calculate_sell_for_buy_with_orders(target).unwrap();
        assert!(fills.is_empty());
        assert!(delivered >= target);
        let (forward, _) = pair.calculate_buy_for_sell_with_orders(amount_in);
        assert!(
            forward >= target,
            "selling {amount_in} yields {forward}, below target {target}"
        );

        // past the threshold the order is consumed on the way
        let crossing = Price::from_ratio(U256::from(450u64), U256::from(500u64)).unwrap();
        let (_, d1) = pool_step_to_price(
            U256::from(1_000_000u64),
            U256::from(1_000_000u64),
            crossing,
        )
        .unwrap();
        let target = d1 + U256::from(1000u64);
        let (_, delivered, fills) =
            pair.calculate_sell_for_buy_with_orders(target).unwrap();
        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].pays, U256::from(500u64));
        assert!(delivered >= target);
    }

    #[test]
    fn speculative_step_leaves_real_pair_untouched() {
        let pair = detached_pair(1_000_000, 1_000_000);
        add_sale_order(&pair, 1, 450, 500);

        let crossing = Price::from_ratio(U256::from(450u64), U256::from(500u64)).unwrap();
        let (d0, _) = pool_step_to_price(
            U256::from(1_000_000u64),
            U256::from(1_000_000u64),
            crossing,
        )
        .unwrap();
        let amount_in = d0 + U256::from(2000u64);
        let (out, _) = pair.calculate_buy_for_sell_with_orders(amount_in);
        let stepped = pair.add_last_swap_step_with_orders(amount_in, out);

        assert_eq!(pair.reserves(), (U256::from(1_000_000u64), U256::from(1_000_000u64)));
        assert!(pair.order_by_id(1).is_some());

        let (r0, _) = stepped.reserves();
        // step + full order commission + residual all landed on reserve0
        assert_eq!(r0, U256::from(1_000_000u64) + d0 + U256::from(1500u64) + U256::from(1u64));
        assert!(stepped.order_by_id(1).is_none());
    }

    #[test]
    fn create_mints_geometric_mean() {
        // S1: create(10_000, 40_000) mints sqrt(4e8) = 20_000
        let pair = detached_pair(0, 0);
        let liquidity = pair
            .create(U256::from(10_000u64), U256::from(40_000u64))
            .unwrap();
        assert_eq!(liquidity, U256::from(20_000u64));
        assert_eq!(pair.reserves(), (U256::from(10_000u64), U256::from(40_000u64)));
    }

    #[test]
    fn create_rejects_minimum_liquidity() {
        let pair = detached_pair(0, 0);
        assert_eq!(
            pair.create(U256::from(1000u64), U256::from(1000u64)),
            Err(SwapError::InsufficientLiquidityMinted)
        );
        assert_eq!(
            pair.check_create(U256::from(10u64), U256::from(10u64)),
            Err(SwapError::InsufficientLiquidityMinted)
        );
    }

    #[test]
    fn mint_then_burn_rounds_in_pool_favor() {
        let pair = detached_pair(10_000, 40_000);
        let total_supply = U256::from(20_000u64);
        let amount0 = U256::from(333u64);

        let (liquidity, amount1) = pair.mint(amount0, U256::MAX, total_supply).unwrap();
        assert!(liquidity > U256::ZERO);

        let (back0, back1) = pair
            .burn(liquidity, U256::ZERO, U256::ZERO, total_supply + liquidity)
            .unwrap();
        assert!(back0 <= amount0);
        assert!(back1 <= amount1);
    }

    #[test]
    fn mint_respects_max_amount1() {
        let pair = detached_pair(10_000, 40_000);
        let result = pair.mint(U256::from(100u64), U256::from(10u64), U256::from(20_000u64));
        assert_eq!(result, Err(SwapError::InsufficientInputAmount));
    }

    #[test]
    fn burn_respects_minimums_and_balance() {
        let pair = detached_pair(10_000, 40_000);
        let total_supply = U256::from(20_000u64);
        assert_eq!(
            pair.burn(U256::from(100u64), U256::from(51u64), U256::ZERO, total_supply),
            Err(SwapError::InsufficientLiquidityBurned)
        );
        assert_eq!(
            pair.check_burn(total_supply + U256::from(1u64), U256::ZERO, U256::ZERO, total_supply),
            Err(SwapError::InsufficientLiquidityBalance)
        );
    }
}
