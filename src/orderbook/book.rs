use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, trace};

use crate::orderbook::error::{BookError, BookResult};
use crate::orderbook::pool::{Handle, ObjectPool, PoolStats};
use crate::orderbook::types::{
    DepthLevel, Order, OrderId, OrderStatus, OrderType, Price, PriceLevel, Quantity, Side,
    SymbolId, MAX_PRICE, MIN_PRICE,
};
use crate::utils::time::Clock;

const ORDER_POOL_CAPACITY: usize = 10_000;
const LEVEL_POOL_CAPACITY: usize = 1_000;

/// Point-in-time totals for one book.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct BookStats {
    pub total_orders: usize,
    pub active_orders: usize,
    pub bid_levels: usize,
    pub ask_levels: usize,
    pub best_bid: Price,
    pub best_ask: Price,
    pub mid_price: Price,
    pub spread: Price,
}

/// All mutable book state. Lives under the book mutex; every method here is
/// a "locked" helper and assumes the caller holds that lock.
struct BookInner {
    symbol: SymbolId,
    /// Best bid is the highest key (iterate in reverse)
    bids: BTreeMap<Price, Handle<PriceLevel>>,
    /// Best ask is the lowest key
    asks: BTreeMap<Price, Handle<PriceLevel>>,
    /// Single source of truth for order membership
    orders: BTreeMap<OrderId, Handle<Order>>,
    order_pool: ObjectPool<Order>,
    level_pool: ObjectPool<PriceLevel>,
}

impl BookInner {
    fn new(symbol: SymbolId) -> Self {
        Self {
            symbol,
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            orders: BTreeMap::new(),
            order_pool: ObjectPool::with_capacity(ORDER_POOL_CAPACITY),
            level_pool: ObjectPool::with_capacity(LEVEL_POOL_CAPACITY),
        }
    }

    fn side_levels(&self, side: Side) -> &BTreeMap<Price, Handle<PriceLevel>> {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    fn side_levels_mut(&mut self, side: Side) -> &mut BTreeMap<Price, Handle<PriceLevel>> {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }

    fn level_for(&mut self, price: Price, side: Side) -> Handle<PriceLevel> {
        if let Some(handle) = self.side_levels(side).get(&price) {
            return *handle;
        }

        let handle = self.level_pool.allocate();
        self.level_pool
            .get_mut(handle)
            .expect("freshly allocated level")
            .init(price);
        self.side_levels_mut(side).insert(price, handle);
        handle
    }

    fn drop_level_if_empty(&mut self, price: Price, side: Side) {
        let Some(&handle) = self.side_levels(side).get(&price) else {
            return;
        };
        let empty = self
            .level_pool
            .get(handle)
            .map(|level| level.is_empty())
            .unwrap_or(true);
        if empty {
            self.side_levels_mut(side).remove(&price);
            self.level_pool.deallocate(handle);
            trace!(symbol = self.symbol, price, %side, "price level retired");
        }
    }

    fn add_order_locked(
        &mut self,
        order_id: OrderId,
        price: Price,
        quantity: Quantity,
        side: Side,
        kind: OrderType,
    ) -> BookResult<()> {
        if self.orders.contains_key(&order_id) {
            return Err(BookError::DuplicateOrder);
        }
        if quantity == 0 {
            return Err(BookError::InvalidQuantity);
        }
        if !(MIN_PRICE..=MAX_PRICE).contains(&price) {
            return Err(BookError::InvalidPrice);
        }

        let level_handle = self.level_for(price, side);
        let now = Clock::nanos();

        let order_handle = self.order_pool.allocate();
        let order = self
            .order_pool
            .get_mut(order_handle)
            .expect("freshly allocated order");
        order.id = order_id;
        order.symbol = self.symbol;
        order.price = price;
        order.quantity = quantity;
        order.filled_quantity = 0;
        order.side = side;
        order.kind = kind;
        order.status = OrderStatus::Active;
        order.timestamp = now;
        order.level = Some(level_handle);

        self.orders.insert(order_id, order_handle);

        let level = self
            .level_pool
            .get_mut(level_handle)
            .expect("level just linked");
        level.total_quantity += quantity;
        level.order_count += 1;
        level.last_update = now;

        Ok(())
    }

    fn cancel_order_locked(&mut self, order_id: OrderId, quantity: Quantity) -> BookResult<()> {
        let &order_handle = self.orders.get(&order_id).ok_or(BookError::OrderNotFound)?;
        let order = *self
            .order_pool
            .get(order_handle)
            .ok_or(BookError::OrderNotFound)?;
        if !order.is_active() {
            return Err(BookError::InvalidOrderState);
        }

        let remaining = order.remaining();
        let effective = if quantity == 0 {
            remaining
        } else {
            quantity.min(remaining)
        };

        let now = Clock::nanos();
        let level_handle = order.level.expect("active order is linked to a level");
        if let Some(level) = self.level_pool.get_mut(level_handle) {
            level.total_quantity -= effective;
            level.last_update = now;
        }

        let done = {
            let record = self
                .order_pool
                .get_mut(order_handle)
                .expect("order checked above");
            // Cancelled quantity folds into filled_quantity; an exhausted
            // order reports Filled regardless of how it drained.
            record.filled_quantity += effective;
            if record.filled_quantity >= record.quantity {
                record.status = OrderStatus::Filled;
                record.level = None;
                true
            } else {
                false
            }
        };

        if done {
            if let Some(level) = self.level_pool.get_mut(level_handle) {
                level.order_count -= 1;
                level.last_update = now;
            }
            self.drop_level_if_empty(order.price, order.side);
            self.orders.remove(&order_id);
            self.order_pool.deallocate(order_handle);
        }

        Ok(())
    }

    fn modify_order_locked(
        &mut self,
        order_id: OrderId,
        new_price: Price,
        new_quantity: Quantity,
    ) -> BookResult<()> {
        let &order_handle = self.orders.get(&order_id).ok_or(BookError::OrderNotFound)?;
        let order = *self
            .order_pool
            .get(order_handle)
            .ok_or(BookError::OrderNotFound)?;
        if !order.is_active() {
            return Err(BookError::InvalidOrderState);
        }
        if new_quantity <= order.filled_quantity {
            return Err(BookError::InvalidQuantity);
        }
        if !(MIN_PRICE..=MAX_PRICE).contains(&new_price) {
            return Err(BookError::InvalidPrice);
        }

        let now = Clock::nanos();

        // Take the remaining quantity off the current level
        let old_level_handle = order.level.expect("active order is linked to a level");
        if let Some(level) = self.level_pool.get_mut(old_level_handle) {
            level.total_quantity -= order.remaining();
            level.order_count -= 1;
            level.last_update = now;
        }
        self.drop_level_if_empty(order.price, order.side);

        // Relink under the new price; time priority is not preserved
        let new_level_handle = self.level_for(new_price, order.side);
        let contribution = new_quantity - order.filled_quantity;
        {
            let level = self
                .level_pool
                .get_mut(new_level_handle)
                .expect("level just linked");
            level.total_quantity += contribution;
            level.order_count += 1;
            level.last_update = now;
        }

        let record = self
            .order_pool
            .get_mut(order_handle)
            .expect("order checked above");
        record.price = new_price;
        record.quantity = new_quantity;
        record.timestamp = now;
        record.level = Some(new_level_handle);

        Ok(())
    }

    fn execute_trade_locked(
        &mut self,
        price: Price,
        quantity: Quantity,
        aggressor: Side,
    ) -> bool {
        let victim = aggressor.opposite();
        let mut remaining = quantity;

        while remaining > 0 {
            // Best level on the victim side: lowest ask for a buyer,
            // highest bid for a seller.
            let best = match victim {
                Side::Sell => self.asks.iter().next().map(|(p, h)| (*p, *h)),
                Side::Buy => self.bids.iter().next_back().map(|(p, h)| (*p, *h)),
            };
            let Some((level_price, level_handle)) = best else {
                break;
            };

            // Stop at the first level strictly worse than the limit
            let acceptable = match aggressor {
                Side::Buy => level_price <= price,
                Side::Sell => level_price >= price,
            };
            if !acceptable {
                break;
            }

            let now = Clock::nanos();
            let execute_qty = {
                let level = self
                    .level_pool
                    .get_mut(level_handle)
                    .expect("indexed level is live");
                let execute_qty = remaining.min(level.total_quantity);
                level.total_quantity -= execute_qty;
                level.last_update = now;
                execute_qty
            };
            remaining -= execute_qty;

            // Distribute the consumed quantity across resident orders in
            // order-table order; no time priority is promised.
            let resident: Vec<(OrderId, Handle<Order>)> = self
                .orders
                .iter()
                .filter(|(_, &h)| {
                    self.order_pool
                        .get(h)
                        .map(|o| o.is_active() && o.level == Some(level_handle))
                        .unwrap_or(false)
                })
                .map(|(&id, &h)| (id, h))
                .collect();

            let mut to_apply = execute_qty;
            for (resident_id, resident_handle) in resident {
                if to_apply == 0 {
                    break;
                }
                let filled = {
                    let order = self
                        .order_pool
                        .get_mut(resident_handle)
                        .expect("resident order is live");
                    let order_execute = to_apply.min(order.remaining());
                    order.filled_quantity += order_execute;
                    to_apply -= order_execute;
                    if order.filled_quantity >= order.quantity {
                        order.status = OrderStatus::Filled;
                        order.level = None;
                        true
                    } else {
                        false
                    }
                };
                if filled {
                    if let Some(level) = self.level_pool.get_mut(level_handle) {
                        level.order_count -= 1;
                    }
                    self.orders.remove(&resident_id);
                    self.order_pool.deallocate(resident_handle);
                    trace!(symbol = self.symbol, order_id = resident_id, "order filled");
                }
            }

            let level_empty = self
                .level_pool
                .get(level_handle)
                .map(|level| level.is_empty())
                .unwrap_or(true);
            if level_empty {
                self.side_levels_mut(victim).remove(&level_price);
                self.level_pool.deallocate(level_handle);
            }
        }

        remaining < quantity
    }

    fn best_locked(&self, side: Side) -> DepthLevel {
        let best = match side {
            Side::Buy => self.bids.iter().next_back(),
            Side::Sell => self.asks.iter().next(),
        };
        best.and_then(|(price, &handle)| {
            self.level_pool
                .get(handle)
                .map(|level| (*price, level.total_quantity))
        })
        .unwrap_or((0, 0))
    }

    fn mid_price_locked(&self) -> Price {
        let (bid, _) = self.best_locked(Side::Buy);
        let (ask, _) = self.best_locked(Side::Sell);
        if bid == 0 || ask == 0 {
            return 0;
        }
        (bid + ask) / 2
    }

    fn spread_locked(&self) -> Price {
        let (bid, _) = self.best_locked(Side::Buy);
        let (ask, _) = self.best_locked(Side::Sell);
        if bid == 0 || ask == 0 {
            return 0;
        }
        ask - bid
    }

    fn depth_locked(&self, side: Side, depth: usize) -> Vec<DepthLevel> {
        let levels = self.side_levels(side);
        let iter: Box<dyn Iterator<Item = (&Price, &Handle<PriceLevel>)>> = match side {
            Side::Buy => Box::new(levels.iter().rev()),
            Side::Sell => Box::new(levels.iter()),
        };
        iter.take(depth)
            .filter_map(|(price, &handle)| {
                self.level_pool
                    .get(handle)
                    .map(|level| (*price, level.total_quantity))
            })
            .collect()
    }

    fn stats_locked(&self) -> BookStats {
        let (best_bid, _) = self.best_locked(Side::Buy);
        let (best_ask, _) = self.best_locked(Side::Sell);
        let active_orders = self
            .orders
            .values()
            .filter(|&&h| self.order_pool.get(h).map(|o| o.is_active()).unwrap_or(false))
            .count();

        BookStats {
            total_orders: self.orders.len(),
            active_orders,
            bid_levels: self.bids.len(),
            ask_levels: self.asks.len(),
            best_bid,
            best_ask,
            mid_price: self.mid_price_locked(),
            spread: self.spread_locked(),
        }
    }
}

/// Per-symbol limit order book with price-time aggregation.
///
/// One mutex covers all book state, pools included; public methods take the
/// lock once and delegate to locked helpers, so composite reads (`stats`,
/// `mid_price`) never re-enter.
pub struct OrderBook {
    symbol: SymbolId,
    inner: Mutex<BookInner>,
}

impl OrderBook {
    pub fn new(symbol: SymbolId) -> Self {
        debug!(symbol, "creating order book");
        Self {
            symbol,
            inner: Mutex::new(BookInner::new(symbol)),
        }
    }

    pub fn symbol(&self) -> SymbolId {
        self.symbol
    }

    /// Rest a new passive order. Rejects duplicates without touching state.
    pub fn add_order(
        &self,
        order_id: OrderId,
        price: Price,
        quantity: Quantity,
        side: Side,
        kind: OrderType,
    ) -> BookResult<()> {
        debug!(symbol = self.symbol, order_id, price, quantity, %side, "add order");
        self.inner
            .lock()
            .add_order_locked(order_id, price, quantity, side, kind)
    }

    /// Cancel `quantity` shares of an order; 0 cancels all remaining.
    pub fn cancel_order(&self, order_id: OrderId, quantity: Quantity) -> BookResult<()> {
        debug!(symbol = self.symbol, order_id, quantity, "cancel order");
        self.inner.lock().cancel_order_locked(order_id, quantity)
    }

    /// Re-price and re-size an active order. Time priority is lost.
    pub fn modify_order(
        &self,
        order_id: OrderId,
        new_price: Price,
        new_quantity: Quantity,
    ) -> BookResult<()> {
        debug!(symbol = self.symbol, order_id, new_price, new_quantity, "modify order");
        self.inner
            .lock()
            .modify_order_locked(order_id, new_price, new_quantity)
    }

    /// Sweep resting liquidity with an aggressing order. A buyer consumes
    /// asks from the lowest price up to `price`; a seller consumes bids from
    /// the highest price down to `price`. Returns true iff any quantity
    /// traded.
    pub fn execute_trade(&self, price: Price, quantity: Quantity, aggressor: Side) -> bool {
        debug!(symbol = self.symbol, price, quantity, %aggressor, "execute trade");
        self.inner
            .lock()
            .execute_trade_locked(price, quantity, aggressor)
    }

    /// Best bid as (price, aggregated quantity), or (0, 0) when empty.
    pub fn best_bid(&self) -> DepthLevel {
        self.inner.lock().best_locked(Side::Buy)
    }

    /// Best ask as (price, aggregated quantity), or (0, 0) when empty.
    pub fn best_ask(&self) -> DepthLevel {
        self.inner.lock().best_locked(Side::Sell)
    }

    /// Truncating midpoint, 0 unless both sides are populated.
    pub fn mid_price(&self) -> Price {
        self.inner.lock().mid_price_locked()
    }

    /// Touch spread, 0 unless both sides are populated.
    pub fn spread(&self) -> Price {
        self.inner.lock().spread_locked()
    }

    /// Up to `depth` bid levels from the best outward.
    pub fn bids(&self, depth: usize) -> Vec<DepthLevel> {
        self.inner.lock().depth_locked(Side::Buy, depth)
    }

    /// Up to `depth` ask levels from the best outward.
    pub fn asks(&self, depth: usize) -> Vec<DepthLevel> {
        self.inner.lock().depth_locked(Side::Sell, depth)
    }

    /// Value snapshot of a resting order.
    pub fn order(&self, order_id: OrderId) -> Option<Order> {
        let inner = self.inner.lock();
        let &handle = inner.orders.get(&order_id)?;
        inner.order_pool.get(handle).copied()
    }

    pub fn order_count(&self) -> usize {
        self.inner.lock().orders.len()
    }

    pub fn level_count(&self) -> usize {
        let inner = self.inner.lock();
        inner.bids.len() + inner.asks.len()
    }

    pub fn is_empty(&self) -> bool {
        let inner = self.inner.lock();
        inner.bids.is_empty() && inner.asks.is_empty()
    }

    pub fn stats(&self) -> BookStats {
        self.inner.lock().stats_locked()
    }

    /// (order pool, level pool) usage counters.
    pub fn pool_stats(&self) -> (PoolStats, PoolStats) {
        let inner = self.inner.lock();
        (inner.order_pool.stats(), inner.level_pool.stats())
    }
}
