use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::orderbook::types::{OrderId, Pnl, Price, Quantity, Side, SymbolId, Timestamp};
use crate::utils::time::Clock;

/// Open inventory for one symbol.
///
/// Long and short legs are tracked independently; both can be positive at
/// once, and the net position is their difference. Realized P&L accrues when
/// a trade runs against the opposite leg's weighted-average price.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Position {
    pub symbol: SymbolId,
    pub long_quantity: Quantity,
    pub short_quantity: Quantity,
    pub avg_long_price: Price,
    pub avg_short_price: Price,
    pub realized_pnl: Pnl,
    pub unrealized_pnl: Pnl,
    pub last_update: Timestamp,
}

impl Position {
    /// Positive when net long, negative when net short.
    pub fn net_position(&self) -> i64 {
        self.long_quantity as i64 - self.short_quantity as i64
    }

    /// Gross open quantity across both legs.
    pub fn total_position(&self) -> Quantity {
        self.long_quantity + self.short_quantity
    }

    pub fn is_flat(&self) -> bool {
        self.long_quantity == 0 && self.short_quantity == 0
    }

    pub fn is_long(&self) -> bool {
        self.long_quantity > self.short_quantity
    }

    pub fn is_short(&self) -> bool {
        self.short_quantity > self.long_quantity
    }
}

/// One journaled fill.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TradeRecord {
    pub symbol: SymbolId,
    pub price: Price,
    pub quantity: Quantity,
    pub side: Side,
    pub timestamp: Timestamp,
    pub order_id: OrderId,
}

/// Pre-trade admission limits and loss thresholds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PositionLimits {
    pub max_position_size: Quantity,
    pub max_long_position: Quantity,
    pub max_short_position: Quantity,
    pub max_daily_loss: Pnl,
    pub max_drawdown: Pnl,
}

impl Default for PositionLimits {
    fn default() -> Self {
        Self {
            max_position_size: 1_000_000,
            max_long_position: 500_000,
            max_short_position: 500_000,
            max_daily_loss: 1_000_000,
            max_drawdown: 500_000,
        }
    }
}

/// Point-in-time tracker totals.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TrackerStats {
    pub total_symbols: usize,
    pub active_positions: usize,
    pub total_realized_pnl: Pnl,
    pub total_unrealized_pnl: Pnl,
    pub total_pnl: Pnl,
    pub max_position_size: Quantity,
    pub largest_position_symbol: SymbolId,
}

pub(crate) struct TrackerInner {
    pub(crate) positions: BTreeMap<SymbolId, Position>,
    pub(crate) journal: BTreeMap<SymbolId, Vec<TradeRecord>>,
}

impl TrackerInner {
    fn realized_pnl_for(&self, symbol: SymbolId, price: Price, quantity: Quantity, side: Side) -> Pnl {
        let Some(position) = self.positions.get(&symbol) else {
            return 0;
        };

        match side {
            // Buying covers an outstanding short at the short leg's average
            Side::Buy if position.short_quantity > 0 => {
                let cover = quantity.min(position.short_quantity);
                (position.avg_short_price - price) * cover as i64
            }
            // Selling closes an outstanding long at the long leg's average
            Side::Sell if position.long_quantity > 0 => {
                let close = quantity.min(position.long_quantity);
                (price - position.avg_long_price) * close as i64
            }
            _ => 0,
        }
    }

    fn apply_trade(&mut self, symbol: SymbolId, price: Price, quantity: Quantity, side: Side) {
        let position = self.positions.entry(symbol).or_default();
        position.symbol = symbol;
        position.last_update = Clock::nanos();

        // Fold into the traded side's weighted-average price; the opposite
        // leg is never reduced.
        match side {
            Side::Buy => {
                if position.long_quantity == 0 {
                    position.avg_long_price = price;
                } else {
                    let total_value = position.avg_long_price * position.long_quantity as i64
                        + price * quantity as i64;
                    position.avg_long_price =
                        total_value / (position.long_quantity + quantity) as i64;
                }
                position.long_quantity += quantity;
            }
            Side::Sell => {
                if position.short_quantity == 0 {
                    position.avg_short_price = price;
                } else {
                    let total_value = position.avg_short_price * position.short_quantity as i64
                        + price * quantity as i64;
                    position.avg_short_price =
                        total_value / (position.short_quantity + quantity) as i64;
                }
                position.short_quantity += quantity;
            }
        }
    }

    fn unrealized_pnl_for(position: &Position, mark: Price) -> Pnl {
        let mut pnl = 0;
        if position.long_quantity > 0 {
            pnl += (mark - position.avg_long_price) * position.long_quantity as i64;
        }
        if position.short_quantity > 0 {
            pnl += (position.avg_short_price - mark) * position.short_quantity as i64;
        }
        pnl
    }

    fn stats_locked(&self) -> TrackerStats {
        let mut stats = TrackerStats {
            total_symbols: self.positions.len(),
            ..TrackerStats::default()
        };

        for (&symbol, position) in &self.positions {
            if !position.is_flat() {
                stats.active_positions += 1;
            }
            stats.total_realized_pnl += position.realized_pnl;
            stats.total_unrealized_pnl += position.unrealized_pnl;

            let total = position.total_position();
            if total > stats.max_position_size {
                stats.max_position_size = total;
                stats.largest_position_symbol = symbol;
            }
        }

        stats.total_pnl = stats.total_realized_pnl + stats.total_unrealized_pnl;
        stats
    }
}

/// Per-symbol inventory and P&L accounting with a trade journal.
///
/// The tracker's mutex is independent of any book lock and is never held
/// while a book operation runs; fills are recorded after matching returns.
pub struct PositionTracker {
    pub(crate) inner: Mutex<TrackerInner>,
    limits: Mutex<PositionLimits>,
}

impl PositionTracker {
    pub fn new(limits: PositionLimits) -> Self {
        Self {
            inner: Mutex::new(TrackerInner {
                positions: BTreeMap::new(),
                journal: BTreeMap::new(),
            }),
            limits: Mutex::new(limits),
        }
    }

    /// Record a fill: journal it, realize P&L against the opposite leg as it
    /// stood before the trade, then fold the trade into the traded side's
    /// weighted average.
    pub fn record_trade(
        &self,
        symbol: SymbolId,
        price: Price,
        quantity: Quantity,
        side: Side,
        order_id: OrderId,
    ) -> bool {
        debug!(symbol, price, quantity, %side, order_id, "record trade");
        let mut inner = self.inner.lock();

        inner.journal.entry(symbol).or_default().push(TradeRecord {
            symbol,
            price,
            quantity,
            side,
            timestamp: Clock::nanos(),
            order_id,
        });

        let realized = inner.realized_pnl_for(symbol, price, quantity, side);
        inner.apply_trade(symbol, price, quantity, side);
        inner
            .positions
            .get_mut(&symbol)
            .expect("position created by apply_trade")
            .realized_pnl += realized;

        true
    }

    /// Mark one symbol's open legs to `mark`.
    pub fn update_unrealized_pnl(&self, symbol: SymbolId, mark: Price) {
        let mut inner = self.inner.lock();
        if let Some(position) = inner.positions.get_mut(&symbol) {
            position.unrealized_pnl = TrackerInner::unrealized_pnl_for(position, mark);
            position.last_update = Clock::nanos();
        }
    }

    /// Mark every symbol present in `marks`.
    pub fn update_all_unrealized_pnl(&self, marks: &BTreeMap<SymbolId, Price>) {
        let mut inner = self.inner.lock();
        for (symbol, position) in inner.positions.iter_mut() {
            if let Some(&mark) = marks.get(symbol) {
                position.unrealized_pnl = TrackerInner::unrealized_pnl_for(position, mark);
                position.last_update = Clock::nanos();
            }
        }
    }

    pub fn position(&self, symbol: SymbolId) -> Option<Position> {
        self.inner.lock().positions.get(&symbol).copied()
    }

    pub fn all_positions(&self) -> BTreeMap<SymbolId, Position> {
        self.inner.lock().positions.clone()
    }

    pub fn total_realized_pnl(&self) -> Pnl {
        self.inner
            .lock()
            .positions
            .values()
            .map(|p| p.realized_pnl)
            .sum()
    }

    pub fn total_unrealized_pnl(&self) -> Pnl {
        self.inner
            .lock()
            .positions
            .values()
            .map(|p| p.unrealized_pnl)
            .sum()
    }

    pub fn total_pnl(&self) -> Pnl {
        let inner = self.inner.lock();
        inner
            .positions
            .values()
            .map(|p| p.realized_pnl + p.unrealized_pnl)
            .sum()
    }

    /// Pre-trade admission check; advisory, the caller decides whether to
    /// proceed.
    pub fn check_position_limits(&self, symbol: SymbolId, quantity: Quantity, side: Side) -> bool {
        let limits = *self.limits.lock();
        let inner = self.inner.lock();

        let Some(position) = inner.positions.get(&symbol) else {
            return quantity <= limits.max_position_size;
        };

        let net = position.net_position();
        match side {
            Side::Buy => {
                if net + quantity as i64 > limits.max_long_position as i64 {
                    return false;
                }
            }
            Side::Sell => {
                if net - (quantity as i64) < -(limits.max_short_position as i64) {
                    return false;
                }
            }
        }

        position.total_position() + quantity <= limits.max_position_size
    }

    /// True while total P&L sits above both loss thresholds.
    pub fn check_risk_limits(&self) -> bool {
        let limits = *self.limits.lock();
        let total = self.total_pnl();
        total >= -limits.max_daily_loss && total >= -limits.max_drawdown
    }

    pub fn limits(&self) -> PositionLimits {
        *self.limits.lock()
    }

    pub fn set_limits(&self, limits: PositionLimits) {
        *self.limits.lock() = limits;
    }

    pub fn trade_history(&self, symbol: SymbolId) -> Vec<TradeRecord> {
        self.inner
            .lock()
            .journal
            .get(&symbol)
            .cloned()
            .unwrap_or_default()
    }

    /// Every journaled fill across all symbols, timestamp-sorted.
    pub fn all_trade_history(&self) -> Vec<TradeRecord> {
        let inner = self.inner.lock();
        let mut trades: Vec<TradeRecord> =
            inner.journal.values().flatten().copied().collect();
        trades.sort_by_key(|trade| trade.timestamp);
        trades
    }

    pub fn clear_trade_history(&self) {
        self.inner.lock().journal.clear();
    }

    pub fn stats(&self) -> TrackerStats {
        self.inner.lock().stats_locked()
    }

    /// Drop all positions and the journal.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.positions.clear();
        inner.journal.clear();
    }
}

impl Default for PositionTracker {
    fn default() -> Self {
        Self::new(PositionLimits::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orderbook::types::price_from_dollars;

    #[test]
    fn test_legs_tracked_independently() {
        let tracker = PositionTracker::default();
        assert!(tracker.record_trade(1, price_from_dollars(100.00), 1000, Side::Buy, 1));
        assert!(tracker.record_trade(1, price_from_dollars(100.10), 500, Side::Sell, 2));

        let position = tracker.position(1).unwrap();
        assert_eq!(position.long_quantity, 1000);
        assert_eq!(position.short_quantity, 500);
        assert_eq!(position.avg_long_price, price_from_dollars(100.00));
        assert_eq!(position.avg_short_price, price_from_dollars(100.10));
        assert_eq!(position.net_position(), 500);
        assert_eq!(position.total_position(), 1500);
        assert!(position.is_long());
    }

    #[test]
    fn test_pnl_round_trip() {
        let tracker = PositionTracker::default();
        tracker.record_trade(1, price_from_dollars(100.00), 1000, Side::Buy, 1);
        tracker.record_trade(1, price_from_dollars(100.10), 500, Side::Sell, 2);

        // Selling 500 against the $100.00 long leg realizes 10c x 500
        let expected = (price_from_dollars(100.10) - price_from_dollars(100.00)) * 500;
        assert_eq!(tracker.total_realized_pnl(), expected);
        assert_eq!(expected, 500_000);

        tracker.update_unrealized_pnl(1, price_from_dollars(100.05));
        // 5c x 1000 on the long leg + 5c x 500 on the short leg
        assert_eq!(tracker.total_unrealized_pnl(), 750_000);
        assert_eq!(tracker.total_pnl(), 1_250_000);
    }

    #[test]
    fn test_short_cover_realizes() {
        let tracker = PositionTracker::default();
        tracker.record_trade(1, price_from_dollars(50.00), 200, Side::Sell, 1);
        tracker.record_trade(1, price_from_dollars(49.00), 100, Side::Buy, 2);

        // Covering 100 of the short at $49 against a $50 average
        assert_eq!(
            tracker.total_realized_pnl(),
            (price_from_dollars(50.00) - price_from_dollars(49.00)) * 100
        );

        let position = tracker.position(1).unwrap();
        assert_eq!(position.short_quantity, 200);
        assert_eq!(position.long_quantity, 100);
    }

    #[test]
    fn test_weighted_average_integer_identity() {
        let tracker = PositionTracker::default();
        let (q0, p0) = (300u32, 1_000_000i64);
        let (q1, p1) = (200u32, 1_003_000i64);
        tracker.record_trade(1, p0, q0, Side::Buy, 1);
        tracker.record_trade(1, p1, q1, Side::Buy, 2);

        let position = tracker.position(1).unwrap();
        assert_eq!(position.long_quantity, q0 + q1);
        // Integer identity up to the truncating division
        let total_value = p0 * q0 as i64 + p1 * q1 as i64;
        assert_eq!(position.avg_long_price, total_value / (q0 + q1) as i64);
    }

    #[test]
    fn test_first_trade_sets_average() {
        let tracker = PositionTracker::default();
        tracker.record_trade(3, 777, 10, Side::Sell, 1);
        let position = tracker.position(3).unwrap();
        assert_eq!(position.avg_short_price, 777);
        assert_eq!(position.avg_long_price, 0);
    }

    #[test]
    fn test_position_limits() {
        let limits = PositionLimits {
            max_position_size: 10_000,
            max_long_position: 5_000,
            max_short_position: 5_000,
            ..PositionLimits::default()
        };
        let tracker = PositionTracker::new(limits);

        // New symbol: bounded by max_position_size
        assert!(tracker.check_position_limits(1, 10_000, Side::Buy));
        assert!(!tracker.check_position_limits(1, 10_001, Side::Buy));

        tracker.record_trade(1, 1_000_000, 4_000, Side::Buy, 1);

        // 4000 net long: 1000 more is fine, 1500 breaches the long cap
        assert!(tracker.check_position_limits(1, 1_000, Side::Buy));
        assert!(!tracker.check_position_limits(1, 1_500, Side::Buy));

        // Selling from +4000 net has the whole short band available
        assert!(tracker.check_position_limits(1, 6_000, Side::Sell));

        // Gross cap: 4000 held + 6001 would exceed max_position_size
        tracker.record_trade(1, 1_000_000, 2_000, Side::Sell, 2);
        assert!(!tracker.check_position_limits(1, 4_001, Side::Sell));
    }

    #[test]
    fn test_risk_limits() {
        let limits = PositionLimits {
            max_daily_loss: 1_000,
            max_drawdown: 500,
            ..PositionLimits::default()
        };
        let tracker = PositionTracker::new(limits);
        assert!(tracker.check_risk_limits());

        // Buy high, sell low: realize a 600-tick loss on one share
        tracker.record_trade(1, 1_000, 1, Side::Buy, 1);
        tracker.record_trade(1, 400, 1, Side::Sell, 2);
        assert_eq!(tracker.total_realized_pnl(), -600);
        assert!(!tracker.check_risk_limits());
    }

    #[test]
    fn test_stats_and_largest_position() {
        let tracker = PositionTracker::default();
        tracker.record_trade(1, 1_000_000, 100, Side::Buy, 1);
        tracker.record_trade(2, 1_000_000, 700, Side::Buy, 2);
        tracker.record_trade(2, 1_000_000, 300, Side::Sell, 3);

        let stats = tracker.stats();
        assert_eq!(stats.total_symbols, 2);
        assert_eq!(stats.active_positions, 2);
        assert_eq!(stats.max_position_size, 1_000);
        assert_eq!(stats.largest_position_symbol, 2);
    }

    #[test]
    fn test_journal_and_reset() {
        let tracker = PositionTracker::default();
        tracker.record_trade(1, 1_000_000, 100, Side::Buy, 11);
        tracker.record_trade(2, 2_000_000, 50, Side::Sell, 12);
        tracker.record_trade(1, 1_001_000, 25, Side::Sell, 13);

        assert_eq!(tracker.trade_history(1).len(), 2);
        assert_eq!(tracker.trade_history(2).len(), 1);

        let all = tracker.all_trade_history();
        assert_eq!(all.len(), 3);
        assert!(all.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));

        tracker.clear_trade_history();
        assert!(tracker.all_trade_history().is_empty());
        assert!(tracker.position(1).is_some());

        tracker.reset();
        assert!(tracker.position(1).is_none());
        assert_eq!(tracker.stats().total_symbols, 0);
    }

    #[test]
    fn test_legs_stay_non_negative() {
        let tracker = PositionTracker::default();
        // Sell more than ever bought: the long leg is untouched, the short
        // leg grows; neither can go negative.
        tracker.record_trade(1, 1_000_000, 100, Side::Buy, 1);
        tracker.record_trade(1, 1_000_000, 500, Side::Sell, 2);

        let position = tracker.position(1).unwrap();
        assert_eq!(position.long_quantity, 100);
        assert_eq!(position.short_quantity, 500);
        assert_eq!(position.net_position(), -400);
        assert!(position.is_short());
    }
}
