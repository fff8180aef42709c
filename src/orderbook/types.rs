use serde::{Deserialize, Serialize};
use std::fmt;

use crate::orderbook::pool::Handle;
use crate::utils::time::Clock;

/// Price in ticks; one tick is 1/10,000 of a dollar.
pub type Price = i64;
/// Quantity in shares.
pub type Quantity = u32;
/// Realized or unrealized profit/loss, in ticks x shares.
pub type Pnl = i64;
pub type OrderId = u64;
pub type SymbolId = u16;
/// Nanoseconds since the Unix epoch.
pub type Timestamp = u64;

pub const PRICE_TICKS_PER_DOLLAR: i64 = 10_000;
/// Valid prices exclude the outer halves of the representable range so that
/// price arithmetic (mid, spread, notional) cannot overflow.
pub const MAX_PRICE: Price = i64::MAX / 2;
pub const MIN_PRICE: Price = -MAX_PRICE;

/// Convert decimal dollars to ticks.
pub fn price_from_dollars(dollars: f64) -> Price {
    (dollars * PRICE_TICKS_PER_DOLLAR as f64) as Price
}

/// Convert ticks to decimal dollars.
pub fn price_to_dollars(price: Price) -> f64 {
    price as f64 / PRICE_TICKS_PER_DOLLAR as f64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Active,
    Filled,
    Cancelled,
    Rejected,
}

/// A resting order owned by one book's order pool.
///
/// `level` is a non-owning back-reference to the price level the order rests
/// under; it resolves exactly while the order is active and the book lock is
/// held.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub symbol: SymbolId,
    pub price: Price,
    pub quantity: Quantity,
    pub filled_quantity: Quantity,
    pub side: Side,
    pub kind: OrderType,
    pub status: OrderStatus,
    pub timestamp: Timestamp,
    #[serde(skip)]
    pub level: Option<Handle<PriceLevel>>,
}

impl Default for Order {
    fn default() -> Self {
        Self {
            id: 0,
            symbol: 0,
            price: 0,
            quantity: 0,
            filled_quantity: 0,
            side: Side::Buy,
            kind: OrderType::Limit,
            status: OrderStatus::Pending,
            timestamp: 0,
            level: None,
        }
    }
}

impl Order {
    pub fn remaining(&self) -> Quantity {
        self.quantity.saturating_sub(self.filled_quantity)
    }

    pub fn is_active(&self) -> bool {
        self.status == OrderStatus::Active
    }
}

/// Aggregated standing liquidity at one price on one side of a book.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: Price,
    pub total_quantity: Quantity,
    pub order_count: u32,
    pub last_update: Timestamp,
}

impl PriceLevel {
    /// Reinitialize a pooled record for a fresh price.
    pub fn init(&mut self, price: Price) {
        self.price = price;
        self.total_quantity = 0;
        self.order_count = 0;
        self.last_update = Clock::nanos();
    }

    pub fn is_empty(&self) -> bool {
        self.total_quantity == 0
    }
}

/// One (price, aggregated quantity) rung of book depth.
pub type DepthLevel = (Price, Quantity);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_conversions() {
        assert_eq!(price_from_dollars(100.0), 1_000_000);
        assert_eq!(price_from_dollars(0.10), 1_000);
        assert_eq!(price_to_dollars(1_000_500), 100.05);
    }

    #[test]
    fn test_side_opposite() {
        assert_eq!(Side::Buy.opposite(), Side::Sell);
        assert_eq!(Side::Sell.opposite(), Side::Buy);
        assert_eq!(Side::Buy.to_string(), "BUY");
    }

    #[test]
    fn test_order_remaining() {
        let mut order = Order {
            id: 1,
            quantity: 100,
            status: OrderStatus::Active,
            ..Order::default()
        };
        assert_eq!(order.remaining(), 100);

        order.filled_quantity = 30;
        assert_eq!(order.remaining(), 70);
        assert!(order.is_active());

        order.filled_quantity = 100;
        assert_eq!(order.remaining(), 0);
    }
}
