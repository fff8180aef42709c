//! Inventory and P&L accounting.
//!
//! The tracker consumes fills, maintains independent long/short legs per
//! symbol with weighted-average cost bases, and journals every trade.
//! Snapshot persistence lives in [`snapshot`].

pub mod snapshot;
pub mod tracker;

pub use snapshot::POSITION_RECORD_SIZE;
pub use tracker::{Position, PositionLimits, PositionTracker, TrackerStats, TradeRecord};
