//! Per-symbol limit order books and their supporting machinery.
//!
//! The book keeps two ordered price-level indexes (bids descending, asks
//! ascending), an order-id table, and object pools for order and level
//! records. All mutation goes through one mutex per book.

pub mod book;
pub mod error;
pub mod pool;
pub mod registry;
pub mod types;

// Re-export main types for convenience
pub use book::{BookStats, OrderBook};
pub use error::{BookError, BookResult};
pub use pool::{Handle, ObjectPool, PoolStats};
pub use registry::BookRegistry;
pub use types::{
    price_from_dollars, price_to_dollars, DepthLevel, Order, OrderId, OrderStatus, OrderType,
    Pnl, Price, PriceLevel, Quantity, Side, SymbolId, Timestamp,
};
