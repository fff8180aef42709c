//! Market-data feed replay.
//!
//! [`decode`] turns length-prefixed binary frames into typed
//! [`FeedMessage`] records; [`adapter`] routes those records into the book
//! registry and the position tracker.

pub mod adapter;
pub mod decode;
pub mod messages;

pub use adapter::{FeedAdapter, FeedStats, DEFAULT_PRICE_SCALE};
pub use decode::{decode_frame, FeedDecodeError, FrameIter};
pub use messages::FeedMessage;
