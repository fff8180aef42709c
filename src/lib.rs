//! In-Memory Equities Market-Making Simulator
//!
//! Per-symbol limit order books with price-time aggregation and a matching
//! engine, coupled to a position and P&L tracker, driven by binary feed
//! replay or text scenario scripts.
//!
//! # Features
//!
//! - **Pooled Hot Path**: order and price-level records live in object pools
//!   with generation handles; no heap churn per order after warm-up
//! - **Two-Sided Matching**: explicit trade execution sweeps resting
//!   liquidity with price-crossing and per-level order iteration
//! - **Position Accounting**: independent long/short legs with
//!   weighted-average cost bases, realized and unrealized P&L, pre-trade
//!   limit checks and a trade journal
//! - **Replay Drivers**: a framed binary feed adapter and a text scenario
//!   engine apply external order events into books and positions
//! - **Thread Safe**: one mutex per book, synchronous API callable from any
//!   thread
//!
//! # Quick Start
//!
//! ```rust
//! use market_maker_engine::orderbook::{price_from_dollars, OrderBook, OrderType, Side};
//!
//! let book = OrderBook::new(1);
//! book.add_order(1, price_from_dollars(100.00), 1000, Side::Buy, OrderType::Limit)?;
//! book.add_order(2, price_from_dollars(100.10), 1000, Side::Sell, OrderType::Limit)?;
//!
//! assert_eq!(book.mid_price(), price_from_dollars(100.05));
//!
//! // A marketable sell hits the bid
//! assert!(book.execute_trade(price_from_dollars(100.00), 500, Side::Sell));
//! # Ok::<(), market_maker_engine::orderbook::BookError>(())
//! ```
//!
//! # Architecture
//!
//! ```text
//! feed frames ──> FeedAdapter ──┐
//!                               ├──> BookRegistry ──> OrderBook (pools, levels)
//! scenario text ─> ScenarioRunner ┘         │
//!                                           └── fills ──> PositionTracker
//! ```
//!
//! Books are created lazily by symbol and never deleted; the tracker is
//! updated after matching returns, never under a book lock.

pub mod feed;
pub mod metrics;
pub mod orderbook;
pub mod position;
pub mod scenario;
pub mod strategy;
pub mod utils;

// Re-export commonly used types
pub use orderbook::{
    error::{BookError, BookResult},
    types::{
        price_from_dollars, price_to_dollars, Order, OrderId, OrderStatus, OrderType, Pnl,
        Price, Quantity, Side, SymbolId, Timestamp,
    },
    BookRegistry, BookStats, OrderBook,
};

pub use feed::{FeedAdapter, FeedMessage, FeedStats};
pub use self::metrics::EngineMetrics;
pub use position::{Position, PositionLimits, PositionTracker, TrackerStats};
pub use scenario::{ScenarioResult, ScenarioRunner};
pub use strategy::MarketMakingStrategy;

#[cfg(test)]
mod integration_tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_basic_market_making_workflow() {
        let registry = BookRegistry::new();
        let tracker = PositionTracker::default();

        // Quote both sides
        registry
            .add_order(1, 1, price_from_dollars(100.00), 1000, Side::Buy, OrderType::Limit)
            .unwrap();
        registry
            .add_order(1, 2, price_from_dollars(100.10), 1000, Side::Sell, OrderType::Limit)
            .unwrap();

        // A seller hits our bid: we bought 500
        assert!(registry.execute_trade(1, price_from_dollars(100.00), 500, Side::Sell));
        tracker.record_trade(1, price_from_dollars(100.00), 500, Side::Buy, 1);

        // A buyer lifts our offer: we sold 300
        assert!(registry.execute_trade(1, price_from_dollars(100.10), 300, Side::Buy));
        tracker.record_trade(1, price_from_dollars(100.10), 300, Side::Sell, 2);

        let book = registry.book(1);
        assert_eq!(book.best_bid(), (price_from_dollars(100.00), 500));
        assert_eq!(book.best_ask(), (price_from_dollars(100.10), 700));

        // 10c captured on the 300 that round-tripped
        assert_eq!(
            tracker.total_realized_pnl(),
            (price_from_dollars(100.10) - price_from_dollars(100.00)) * 300
        );

        tracker.update_unrealized_pnl(1, book.mid_price());
        assert!(tracker.check_risk_limits());
    }

    #[test]
    fn test_concurrent_books() {
        let registry = Arc::new(BookRegistry::new());
        let mut handles = vec![];

        // Four writers, two per symbol, disjoint order-id ranges
        for thread_id in 0u64..4 {
            let registry = Arc::clone(&registry);
            handles.push(thread::spawn(move || {
                let symbol = (thread_id % 2 + 1) as SymbolId;
                for i in 0..100u64 {
                    let order_id = thread_id * 1_000 + i;
                    let price = price_from_dollars(100.00) + (thread_id as i64) * 100 + i as i64;
                    registry
                        .add_order(symbol, order_id, price, 100, Side::Buy, OrderType::Limit)
                        .unwrap();
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.book_count(), 2);
        let total: usize = registry
            .active_symbols()
            .iter()
            .map(|&s| registry.book(s).order_count())
            .sum();
        assert_eq!(total, 400);
    }

    #[test]
    fn test_concurrent_fills_and_position_updates() {
        let registry = Arc::new(BookRegistry::new());
        let tracker = Arc::new(PositionTracker::default());

        registry
            .add_order(1, 1, price_from_dollars(100.00), 100_000, Side::Buy, OrderType::Limit)
            .unwrap();

        let mut handles = vec![];
        for thread_id in 0u64..4 {
            let registry = Arc::clone(&registry);
            let tracker = Arc::clone(&tracker);
            handles.push(thread::spawn(move || {
                for i in 0..50u64 {
                    if registry.execute_trade(1, price_from_dollars(100.00), 10, Side::Sell) {
                        tracker.record_trade(
                            1,
                            price_from_dollars(100.00),
                            10,
                            Side::Buy,
                            thread_id * 100 + i,
                        );
                    }
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        // 4 threads x 50 fills x 10 shares came off the bid and into the
        // long leg
        assert_eq!(registry.book(1).best_bid(), (price_from_dollars(100.00), 98_000));
        assert_eq!(tracker.position(1).unwrap().long_quantity, 2_000);
        assert_eq!(tracker.all_trade_history().len(), 200);
    }
}
