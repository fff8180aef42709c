//! Flat-file persistence for positions.
//!
//! Positions serialize as a packed array of fixed-width little-endian
//! records, one per symbol, mirroring the in-memory field order. On load,
//! records whose symbol is zero are skipped (the reference format
//! zero-pads its file), and a trailing partial record is ignored.

use std::fs;
use std::io;
use std::path::Path;
use tracing::info;

use crate::position::tracker::{Position, PositionTracker};

/// symbol u16 | long u32 | short u32 | avg_long i64 | avg_short i64 |
/// realized i64 | unrealized i64 | last_update u64
pub const POSITION_RECORD_SIZE: usize = 50;

fn encode_position(position: &Position, out: &mut Vec<u8>) {
    out.extend_from_slice(&position.symbol.to_le_bytes());
    out.extend_from_slice(&position.long_quantity.to_le_bytes());
    out.extend_from_slice(&position.short_quantity.to_le_bytes());
    out.extend_from_slice(&position.avg_long_price.to_le_bytes());
    out.extend_from_slice(&position.avg_short_price.to_le_bytes());
    out.extend_from_slice(&position.realized_pnl.to_le_bytes());
    out.extend_from_slice(&position.unrealized_pnl.to_le_bytes());
    out.extend_from_slice(&position.last_update.to_le_bytes());
}

fn decode_position(record: &[u8]) -> Position {
    let u16_at = |at: usize| u16::from_le_bytes(record[at..at + 2].try_into().unwrap());
    let u32_at = |at: usize| u32::from_le_bytes(record[at..at + 4].try_into().unwrap());
    let i64_at = |at: usize| i64::from_le_bytes(record[at..at + 8].try_into().unwrap());
    let u64_at = |at: usize| u64::from_le_bytes(record[at..at + 8].try_into().unwrap());

    Position {
        symbol: u16_at(0),
        long_quantity: u32_at(2),
        short_quantity: u32_at(6),
        avg_long_price: i64_at(10),
        avg_short_price: i64_at(18),
        realized_pnl: i64_at(26),
        unrealized_pnl: i64_at(34),
        last_update: u64_at(42),
    }
}

impl PositionTracker {
    /// Write every position to `path` while holding the tracker lock.
    pub fn save_snapshot<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let inner = self.inner.lock();
        let mut buffer = Vec::with_capacity(inner.positions.len() * POSITION_RECORD_SIZE);
        for position in inner.positions.values() {
            encode_position(position, &mut buffer);
        }
        fs::write(&path, &buffer)?;
        info!(
            path = %path.as_ref().display(),
            positions = inner.positions.len(),
            "position snapshot written"
        );
        Ok(())
    }

    /// Rebuild the position map from `path`, replacing current contents.
    /// Returns the number of positions loaded.
    pub fn load_snapshot<P: AsRef<Path>>(&self, path: P) -> io::Result<usize> {
        let bytes = fs::read(&path)?;
        let mut inner = self.inner.lock();
        inner.positions.clear();

        for record in bytes.chunks_exact(POSITION_RECORD_SIZE) {
            let position = decode_position(record);
            if position.symbol == 0 {
                continue;
            }
            inner.positions.insert(position.symbol, position);
        }

        let loaded = inner.positions.len();
        info!(path = %path.as_ref().display(), positions = loaded, "position snapshot loaded");
        Ok(loaded)
    }
}
