use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::feed::decode::FrameIter;
use crate::feed::messages::FeedMessage;
use crate::orderbook::registry::BookRegistry;
use crate::orderbook::types::{OrderType, Price, Side, SymbolId};
use crate::position::tracker::PositionTracker;

/// Multiplier from the feed's integer price unit to internal ticks.
/// The feed quotes in 1/100 cents; internal ticks are 1/100 of that.
pub const DEFAULT_PRICE_SCALE: Price = 100;

/// Per-type message counters plus the malformed-record counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedStats {
    pub total_messages: u64,
    pub add_orders: u64,
    pub executions: u64,
    pub cancels: u64,
    pub deletes: u64,
    pub replaces: u64,
    pub trades: u64,
    pub errors: u64,
}

/// Routes typed feed records into the book registry and position tracker.
///
/// The adapter owns the stock-locate to SymbolId mapping: locates are
/// assigned sequential ids on first sight and the mapping is stable for the
/// adapter's lifetime.
pub struct FeedAdapter<'a> {
    registry: &'a BookRegistry,
    tracker: &'a PositionTracker,
    symbol_map: HashMap<u8, SymbolId>,
    next_symbol_id: SymbolId,
    price_scale: Price,
    stats: FeedStats,
}

impl<'a> FeedAdapter<'a> {
    pub fn new(registry: &'a BookRegistry, tracker: &'a PositionTracker) -> Self {
        Self::with_price_scale(registry, tracker, DEFAULT_PRICE_SCALE)
    }

    pub fn with_price_scale(
        registry: &'a BookRegistry,
        tracker: &'a PositionTracker,
        price_scale: Price,
    ) -> Self {
        Self {
            registry,
            tracker,
            symbol_map: HashMap::new(),
            next_symbol_id: 1,
            price_scale,
            stats: FeedStats::default(),
        }
    }

    fn symbol_id(&mut self, locate: u8) -> SymbolId {
        if let Some(&id) = self.symbol_map.get(&locate) {
            return id;
        }
        let id = self.next_symbol_id;
        self.next_symbol_id += 1;
        self.symbol_map.insert(locate, id);
        debug!(locate, symbol = id, "assigned symbol id");
        id
    }

    fn convert_price(&self, feed_price: u32) -> Price {
        feed_price as Price * self.price_scale
    }

    fn side_from_indicator(indicator: u8) -> Side {
        if indicator == b'B' {
            Side::Buy
        } else {
            Side::Sell
        }
    }

    /// Apply one record. Returns false when the record was rejected
    /// downstream (for adds, a duplicate reference number).
    pub fn apply(&mut self, message: &FeedMessage) -> bool {
        self.stats.total_messages += 1;

        match *message {
            FeedMessage::StockDirectory { locate } => {
                self.symbol_id(locate);
                true
            }
            FeedMessage::AddOrder {
                reference,
                side,
                shares,
                locate,
                price,
            } => {
                let symbol = self.symbol_id(locate);
                let price = self.convert_price(price);
                let side = Self::side_from_indicator(side);
                match self.registry.add_order(
                    symbol,
                    reference,
                    price,
                    shares,
                    side,
                    OrderType::Limit,
                ) {
                    Ok(()) => {
                        self.stats.add_orders += 1;
                        true
                    }
                    Err(error) => {
                        warn!(reference, symbol, %error, "feed add order rejected");
                        false
                    }
                }
            }
            FeedMessage::Trade {
                reference,
                side,
                shares,
                locate,
                price,
                ..
            } => {
                let symbol = self.symbol_id(locate);
                let price = self.convert_price(price);
                let side = Self::side_from_indicator(side);
                // Off-book trade reports update positions only; the book is
                // not touched.
                self.tracker.record_trade(symbol, price, shares, side, reference);
                self.stats.trades += 1;
                true
            }
            // Order lifecycle messages reference orders by a number the book
            // does not index yet; counters only, as a deliberate extension
            // point.
            FeedMessage::Executed { .. } => {
                self.stats.executions += 1;
                true
            }
            FeedMessage::Cancel { .. } => {
                self.stats.cancels += 1;
                true
            }
            FeedMessage::Delete { .. } => {
                self.stats.deletes += 1;
                true
            }
            FeedMessage::Replace { .. } => {
                self.stats.replaces += 1;
                true
            }
            FeedMessage::Other { .. } => true,
        }
    }

    /// Drain an already-decoded record stream.
    pub fn run<I>(&mut self, messages: I)
    where
        I: IntoIterator<Item = FeedMessage>,
    {
        for message in messages {
            if !self.apply(&message) {
                self.stats.errors += 1;
            }
        }
    }

    /// Decode and apply every frame in a raw buffer. Malformed frames bump
    /// the error counter and processing continues.
    pub fn process_buffer(&mut self, buffer: &[u8]) {
        for decoded in FrameIter::new(buffer) {
            match decoded {
                Ok(message) => {
                    if !self.apply(&message) {
                        self.stats.errors += 1;
                    }
                }
                Err(error) => {
                    warn!(%error, "dropping malformed feed frame");
                    self.stats.total_messages += 1;
                    self.stats.errors += 1;
                }
            }
        }
    }

    pub fn stats(&self) -> FeedStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = FeedStats::default();
    }

    /// The locate mapping assigned so far.
    pub fn symbol_map(&self) -> &HashMap<u8, SymbolId> {
        &self.symbol_map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::decode::testutil;

    fn harness() -> (BookRegistry, PositionTracker) {
        (BookRegistry::new(), PositionTracker::default())
    }

    #[test]
    fn test_add_order_routes_to_book() {
        let (registry, tracker) = harness();
        let mut adapter = FeedAdapter::new(&registry, &tracker);

        assert!(adapter.apply(&FeedMessage::AddOrder {
            reference: 42,
            side: b'B',
            shares: 500,
            locate: 7,
            price: 10_000,
        }));

        // Locate 7 became symbol 1; feed price x100
        let book = registry.book(1);
        assert_eq!(book.best_bid(), (1_000_000, 500));
        assert_eq!(adapter.stats().add_orders, 1);
    }

    #[test]
    fn test_duplicate_add_counts_as_rejected() {
        let (registry, tracker) = harness();
        let mut adapter = FeedAdapter::new(&registry, &tracker);
        let add = FeedMessage::AddOrder {
            reference: 42,
            side: b'B',
            shares: 500,
            locate: 7,
            price: 10_000,
        };

        assert!(adapter.apply(&add));
        assert!(!adapter.apply(&add));
        assert_eq!(adapter.stats().add_orders, 1);
        assert_eq!(adapter.stats().total_messages, 2);
    }

    #[test]
    fn test_trade_updates_tracker_not_book() {
        let (registry, tracker) = harness();
        let mut adapter = FeedAdapter::new(&registry, &tracker);

        assert!(adapter.apply(&FeedMessage::Trade {
            reference: 9,
            side: b'B',
            shares: 300,
            locate: 2,
            price: 10_000,
            match_number: 77,
        }));

        let position = tracker.position(1).unwrap();
        assert_eq!(position.long_quantity, 300);
        assert_eq!(position.avg_long_price, 1_000_000);
        assert!(registry.book(1).is_empty());
        assert_eq!(adapter.stats().trades, 1);
    }

    #[test]
    fn test_locate_mapping_is_stable_and_sequential() {
        let (registry, tracker) = harness();
        let mut adapter = FeedAdapter::new(&registry, &tracker);

        adapter.apply(&FeedMessage::StockDirectory { locate: 40 });
        adapter.apply(&FeedMessage::StockDirectory { locate: 10 });
        adapter.apply(&FeedMessage::StockDirectory { locate: 40 });

        assert_eq!(adapter.symbol_map()[&40], 1);
        assert_eq!(adapter.symbol_map()[&10], 2);
    }

    #[test]
    fn test_lifecycle_messages_bump_counters_only() {
        let (registry, tracker) = harness();
        let mut adapter = FeedAdapter::new(&registry, &tracker);

        adapter.run([
            FeedMessage::Executed { reference: 1, shares: 10, match_number: 1 },
            FeedMessage::Cancel { reference: 1, shares: 5 },
            FeedMessage::Delete { reference: 1 },
            FeedMessage::Replace { original: 1, replacement: 2, shares: 10, price: 100 },
            FeedMessage::Other { kind: b'S' },
        ]);

        let stats = adapter.stats();
        assert_eq!(stats.total_messages, 5);
        assert_eq!(stats.executions, 1);
        assert_eq!(stats.cancels, 1);
        assert_eq!(stats.deletes, 1);
        assert_eq!(stats.replaces, 1);
        assert_eq!(stats.errors, 0);
        assert_eq!(registry.book_count(), 0);
    }

    #[test]
    fn test_process_buffer_counts_malformed_frames() {
        let (registry, tracker) = harness();
        let mut adapter = FeedAdapter::new(&registry, &tracker);

        let mut buffer = Vec::new();
        buffer.extend_from_slice(&testutil::directory_frame(3));
        // Honest length below the cancel minimum
        let mut short = testutil::frame(b'X', &[0; 4]);
        let declared = short.len() as u16;
        short[0..2].copy_from_slice(&declared.to_be_bytes());
        buffer.extend_from_slice(&short);
        buffer.extend_from_slice(&testutil::add_order_frame(5, b'S', 100, 3, 20_000));

        adapter.process_buffer(&buffer);

        let stats = adapter.stats();
        assert_eq!(stats.total_messages, 3);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.add_orders, 1);
        assert_eq!(registry.book(1).best_ask(), (2_000_000, 100));
    }
}
