use serde::{Deserialize, Serialize};

/// A typed market-data record, as delivered by the frame decoder.
///
/// Numeric fields are in host byte order; wire-format concerns stop at the
/// decoder. `side` carries the raw indicator byte (`b'B'` is a buy, anything
/// else a sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeedMessage {
    StockDirectory {
        locate: u8,
    },
    AddOrder {
        reference: u64,
        side: u8,
        shares: u32,
        locate: u8,
        price: u32,
    },
    Executed {
        reference: u64,
        shares: u32,
        match_number: u64,
    },
    Cancel {
        reference: u64,
        shares: u32,
    },
    Delete {
        reference: u64,
    },
    Replace {
        original: u64,
        replacement: u64,
        shares: u32,
        price: u32,
    },
    Trade {
        reference: u64,
        side: u8,
        shares: u32,
        locate: u8,
        price: u32,
        match_number: u64,
    },
    /// A recognized frame whose type the engine does not act on.
    Other {
        kind: u8,
    },
}
