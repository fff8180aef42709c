//! Illustrative market-making policies built on the core API.
//!
//! Strategies are clients of the book registry and position tracker; they
//! quote both sides, hear about their fills, and react to position changes.
//! Dispatch is a trait object over a small capability set.

use tracing::debug;

use crate::orderbook::registry::BookRegistry;
use crate::orderbook::types::{OrderId, OrderType, Price, Quantity, Side, SymbolId, Timestamp};
use crate::position::tracker::{Position, PositionTracker, TrackerStats};

/// Capability set a market-making policy implements.
pub trait MarketMakingStrategy {
    /// Refresh resting quotes for all configured symbols.
    fn update_quotes(
        &mut self,
        books: &BookRegistry,
        positions: &PositionTracker,
        now: Timestamp,
    );

    /// Notification of a fill attributed to this strategy.
    fn on_trade(&mut self, symbol: SymbolId, price: Price, quantity: Quantity, side: Side, now: Timestamp);

    /// Notification of a position or P&L update.
    fn on_position_update(
        &mut self,
        symbol: SymbolId,
        position: &Position,
        stats: &TrackerStats,
        now: Timestamp,
    );
}

#[derive(Debug, Clone, Copy, Default)]
struct QuoteState {
    bid_order_id: OrderId,
    ask_order_id: OrderId,
}

/// Quotes a fixed symmetric spread around a configured base price.
#[derive(Debug, Clone)]
pub struct FixedSpreadConfig {
    pub base_price: Price,
    pub spread: Price,
    pub quote_size: Quantity,
    pub symbols: Vec<SymbolId>,
}

pub struct FixedSpreadStrategy {
    config: FixedSpreadConfig,
    state: Vec<QuoteState>,
}

impl FixedSpreadStrategy {
    /// Base for this strategy's deterministic order ids.
    const ORDER_ID_BASE: OrderId = 10_000;

    pub fn new(config: FixedSpreadConfig) -> Self {
        let state = vec![QuoteState::default(); config.symbols.len()];
        Self { config, state }
    }
}

impl MarketMakingStrategy for FixedSpreadStrategy {
    fn update_quotes(&mut self, books: &BookRegistry, _positions: &PositionTracker, _now: Timestamp) {
        for (i, &symbol) in self.config.symbols.iter().enumerate() {
            let state = &mut self.state[i];
            let bid = self.config.base_price - self.config.spread / 2;
            let ask = self.config.base_price + self.config.spread / 2;

            // Pull the previous pair before re-quoting; a missing order just
            // means it traded away.
            if state.bid_order_id != 0 {
                let _ = books.cancel_order(symbol, state.bid_order_id, 0);
            }
            if state.ask_order_id != 0 {
                let _ = books.cancel_order(symbol, state.ask_order_id, 0);
            }

            state.bid_order_id = Self::ORDER_ID_BASE + (i as OrderId) * 2 + 1;
            state.ask_order_id = Self::ORDER_ID_BASE + (i as OrderId) * 2 + 2;
            let _ = books.add_order(
                symbol,
                state.bid_order_id,
                bid,
                self.config.quote_size,
                Side::Buy,
                OrderType::Limit,
            );
            let _ = books.add_order(
                symbol,
                state.ask_order_id,
                ask,
                self.config.quote_size,
                Side::Sell,
                OrderType::Limit,
            );
            debug!(symbol, bid, ask, "fixed spread quotes refreshed");
        }
    }

    fn on_trade(&mut self, _symbol: SymbolId, _price: Price, _quantity: Quantity, _side: Side, _now: Timestamp) {}

    fn on_position_update(
        &mut self,
        _symbol: SymbolId,
        _position: &Position,
        _stats: &TrackerStats,
        _now: Timestamp,
    ) {
    }
}

/// Skews quotes away from accumulated inventory and widens the spread as
/// inventory grows.
#[derive(Debug, Clone)]
pub struct InventorySkewedConfig {
    pub base_price: Price,
    pub min_spread: Price,
    pub max_spread: Price,
    pub quote_size: Quantity,
    pub max_inventory: Quantity,
    pub symbols: Vec<SymbolId>,
}

pub struct InventorySkewedStrategy {
    config: InventorySkewedConfig,
    state: Vec<QuoteState>,
}

impl InventorySkewedStrategy {
    const ORDER_ID_BASE: OrderId = 20_000;

    pub fn new(config: InventorySkewedConfig) -> Self {
        let state = vec![QuoteState::default(); config.symbols.len()];
        Self { config, state }
    }

    fn quote_prices(&self, net_inventory: i64) -> (Price, Price) {
        let skew = net_inventory as f64 / self.config.max_inventory as f64;
        let mid = self.config.base_price
            - (skew * self.config.max_spread as f64 / 2.0) as Price;
        let spread = self.config.min_spread
            + (skew.abs() * (self.config.max_spread - self.config.min_spread) as f64) as Price;
        (mid - spread / 2, mid + spread / 2)
    }
}

impl MarketMakingStrategy for InventorySkewedStrategy {
    fn update_quotes(&mut self, books: &BookRegistry, positions: &PositionTracker, _now: Timestamp) {
        for i in 0..self.config.symbols.len() {
            let symbol = self.config.symbols[i];
            let net = positions
                .position(symbol)
                .map(|p| p.net_position())
                .unwrap_or(0);
            let (bid, ask) = self.quote_prices(net);
            let state = &mut self.state[i];

            if state.bid_order_id != 0 {
                let _ = books.cancel_order(symbol, state.bid_order_id, 0);
            }
            if state.ask_order_id != 0 {
                let _ = books.cancel_order(symbol, state.ask_order_id, 0);
            }

            state.bid_order_id = Self::ORDER_ID_BASE + (i as OrderId) * 2 + 1;
            state.ask_order_id = Self::ORDER_ID_BASE + (i as OrderId) * 2 + 2;
            let _ = books.add_order(
                symbol,
                state.bid_order_id,
                bid,
                self.config.quote_size,
                Side::Buy,
                OrderType::Limit,
            );
            let _ = books.add_order(
                symbol,
                state.ask_order_id,
                ask,
                self.config.quote_size,
                Side::Sell,
                OrderType::Limit,
            );
            debug!(symbol, net, bid, ask, "inventory skewed quotes refreshed");
        }
    }

    fn on_trade(&mut self, _symbol: SymbolId, _price: Price, _quantity: Quantity, _side: Side, _now: Timestamp) {}

    fn on_position_update(
        &mut self,
        _symbol: SymbolId,
        _position: &Position,
        _stats: &TrackerStats,
        _now: Timestamp,
    ) {
    }
}
