//! Binary feed frame decoding.
//!
//! Frames carry a 2-byte big-endian length prefix counting the whole frame,
//! a 1-byte type discriminant, and big-endian type-specific fields. A frame
//! shorter than its type's minimum is a per-record error; the iterator skips
//! it and resumes at the next length boundary.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::trace;

use crate::feed::messages::FeedMessage;

pub const TYPE_ADD_ORDER: u8 = b'A';
pub const TYPE_ADD_ORDER_MPID: u8 = b'F';
pub const TYPE_EXECUTED: u8 = b'E';
pub const TYPE_EXECUTED_WITH_PRICE: u8 = b'C';
pub const TYPE_CANCEL: u8 = b'X';
pub const TYPE_DELETE: u8 = b'D';
pub const TYPE_REPLACE: u8 = b'U';
pub const TYPE_TRADE: u8 = b'P';
pub const TYPE_STOCK_DIRECTORY: u8 = b'R';

const MIN_ADD_ORDER: usize = 36;
const MIN_EXECUTED: usize = 32;
const MIN_CANCEL: usize = 20;
const MIN_DELETE: usize = 12;
const MIN_REPLACE: usize = 36;
const MIN_TRADE: usize = 44;
const MIN_STOCK_DIRECTORY: usize = 40;

/// Frame-level header: length prefix plus type byte.
const FRAME_HEADER: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeedDecodeError {
    /// Frame shorter than the minimum for its type
    Truncated { kind: u8, length: usize },
    /// Buffer too short to hold even a frame header
    ShortFrame { length: usize },
}

impl fmt::Display for FeedDecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedDecodeError::Truncated { kind, length } => {
                write!(f, "frame of type {:?} truncated at {} bytes", *kind as char, length)
            }
            FeedDecodeError::ShortFrame { length } => {
                write!(f, "frame of {length} bytes is shorter than a header")
            }
        }
    }
}

impl std::error::Error for FeedDecodeError {}

fn be_u32(frame: &[u8], at: usize) -> u32 {
    u32::from_be_bytes(frame[at..at + 4].try_into().unwrap())
}

fn be_u64(frame: &[u8], at: usize) -> u64 {
    u64::from_be_bytes(frame[at..at + 8].try_into().unwrap())
}

/// Decode one complete frame (length prefix included) into a typed record.
pub fn decode_frame(frame: &[u8]) -> Result<FeedMessage, FeedDecodeError> {
    if frame.len() < FRAME_HEADER {
        return Err(FeedDecodeError::ShortFrame { length: frame.len() });
    }

    let kind = frame[2];
    let require = |minimum: usize| {
        if frame.len() < minimum {
            Err(FeedDecodeError::Truncated { kind, length: frame.len() })
        } else {
            Ok(())
        }
    };

    let message = match kind {
        TYPE_ADD_ORDER | TYPE_ADD_ORDER_MPID => {
            require(MIN_ADD_ORDER)?;
            FeedMessage::AddOrder {
                reference: be_u64(frame, 3),
                side: frame[11],
                shares: be_u32(frame, 12),
                locate: frame[16],
                price: be_u32(frame, 17),
            }
        }
        TYPE_EXECUTED | TYPE_EXECUTED_WITH_PRICE => {
            require(MIN_EXECUTED)?;
            FeedMessage::Executed {
                reference: be_u64(frame, 3),
                shares: be_u32(frame, 11),
                match_number: be_u64(frame, 15),
            }
        }
        TYPE_CANCEL => {
            require(MIN_CANCEL)?;
            FeedMessage::Cancel {
                reference: be_u64(frame, 3),
                shares: be_u32(frame, 11),
            }
        }
        TYPE_DELETE => {
            require(MIN_DELETE)?;
            FeedMessage::Delete {
                reference: be_u64(frame, 3),
            }
        }
        TYPE_REPLACE => {
            require(MIN_REPLACE)?;
            FeedMessage::Replace {
                original: be_u64(frame, 3),
                replacement: be_u64(frame, 11),
                shares: be_u32(frame, 19),
                price: be_u32(frame, 23),
            }
        }
        TYPE_TRADE => {
            require(MIN_TRADE)?;
            FeedMessage::Trade {
                reference: be_u64(frame, 3),
                side: frame[11],
                shares: be_u32(frame, 12),
                locate: frame[16],
                price: be_u32(frame, 17),
                match_number: be_u64(frame, 21),
            }
        }
        TYPE_STOCK_DIRECTORY => {
            require(MIN_STOCK_DIRECTORY)?;
            FeedMessage::StockDirectory { locate: frame[3] }
        }
        other => FeedMessage::Other { kind: other },
    };

    Ok(message)
}

/// Iterator over length-prefixed frames in a contiguous buffer.
///
/// Each item is the decode result for one frame; decoding errors do not end
/// the iteration. The iterator stops at the first frame whose declared
/// length runs past the buffer (a torn tail).
pub struct FrameIter<'a> {
    buffer: &'a [u8],
    offset: usize,
}

impl<'a> FrameIter<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, offset: 0 }
    }
}

impl<'a> Iterator for FrameIter<'a> {
    type Item = Result<FeedMessage, FeedDecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        let remaining = &self.buffer[self.offset.min(self.buffer.len())..];
        if remaining.len() < 2 {
            return None;
        }

        let length = u16::from_be_bytes([remaining[0], remaining[1]]) as usize;
        if length < FRAME_HEADER {
            // A zero or sub-header length cannot frame anything; treat the
            // rest of the buffer as unrecoverable.
            self.offset = self.buffer.len();
            return Some(Err(FeedDecodeError::ShortFrame { length }));
        }
        if length > remaining.len() {
            trace!(length, available = remaining.len(), "torn frame at buffer tail");
            return None;
        }

        let frame = &remaining[..length];
        self.offset += length;
        Some(decode_frame(frame))
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;

    /// Build a frame with the declared length equal to the payload written.
    pub fn frame(kind: u8, body: &[u8]) -> Vec<u8> {
        let length = (FRAME_HEADER + body.len()) as u16;
        let mut out = Vec::with_capacity(length as usize);
        out.extend_from_slice(&length.to_be_bytes());
        out.push(kind);
        out.extend_from_slice(body);
        out
    }

    pub fn add_order_frame(reference: u64, side: u8, shares: u32, locate: u8, price: u32) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&reference.to_be_bytes());
        body.push(side);
        body.extend_from_slice(&shares.to_be_bytes());
        body.push(locate);
        body.extend_from_slice(&price.to_be_bytes());
        body.resize(MIN_ADD_ORDER - FRAME_HEADER, 0);
        frame(TYPE_ADD_ORDER, &body)
    }

    pub fn trade_frame(
        reference: u64,
        side: u8,
        shares: u32,
        locate: u8,
        price: u32,
        match_number: u64,
    ) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&reference.to_be_bytes());
        body.push(side);
        body.extend_from_slice(&shares.to_be_bytes());
        body.push(locate);
        body.extend_from_slice(&price.to_be_bytes());
        body.extend_from_slice(&match_number.to_be_bytes());
        body.resize(MIN_TRADE - FRAME_HEADER, 0);
        frame(TYPE_TRADE, &body)
    }

    pub fn directory_frame(locate: u8) -> Vec<u8> {
        let mut body = vec![locate];
        body.resize(MIN_STOCK_DIRECTORY - FRAME_HEADER, 0);
        frame(TYPE_STOCK_DIRECTORY, &body)
    }

    pub fn cancel_frame(reference: u64, shares: u32) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&reference.to_be_bytes());
        body.extend_from_slice(&shares.to_be_bytes());
        body.resize(MIN_CANCEL - FRAME_HEADER, 0);
        frame(TYPE_CANCEL, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::testutil::*;
    use super::*;

    #[test]
    fn test_decode_add_order() {
        let frame = add_order_frame(42, b'B', 500, 7, 1_000_000);
        let message = decode_frame(&frame).unwrap();
        assert_eq!(
            message,
            FeedMessage::AddOrder {
                reference: 42,
                side: b'B',
                shares: 500,
                locate: 7,
                price: 1_000_000,
            }
        );
    }

    #[test]
    fn test_decode_trade() {
        let frame = trade_frame(9, b'S', 250, 3, 995_000, 1234);
        let message = decode_frame(&frame).unwrap();
        assert_eq!(
            message,
            FeedMessage::Trade {
                reference: 9,
                side: b'S',
                shares: 250,
                locate: 3,
                price: 995_000,
                match_number: 1234,
            }
        );
    }

    #[test]
    fn test_truncated_frame_is_an_error() {
        let mut frame = add_order_frame(42, b'B', 500, 7, 1_000_000);
        frame.truncate(20);
        frame[0..2].copy_from_slice(&20u16.to_be_bytes());

        assert_eq!(
            decode_frame(&frame),
            Err(FeedDecodeError::Truncated {
                kind: TYPE_ADD_ORDER,
                length: 20
            })
        );
    }

    #[test]
    fn test_unknown_type_decodes_as_other() {
        let message = decode_frame(&frame(b'Z', &[0; 8])).unwrap();
        assert_eq!(message, FeedMessage::Other { kind: b'Z' });
    }

    #[test]
    fn test_frame_iter_walks_buffer() {
        let mut buffer = Vec::new();
        buffer.extend_from_slice(&directory_frame(5));
        buffer.extend_from_slice(&add_order_frame(1, b'B', 100, 5, 1_000_000));
        buffer.extend_from_slice(&cancel_frame(1, 50));

        let messages: Vec<_> = FrameIter::new(&buffer).collect();
        assert_eq!(messages.len(), 3);
        assert!(messages.iter().all(|m| m.is_ok()));
        assert_eq!(
            messages[0].as_ref().unwrap(),
            &FeedMessage::StockDirectory { locate: 5 }
        );
    }

    #[test]
    fn test_frame_iter_skips_bad_frame_and_continues() {
        let mut buffer = Vec::new();
        // Declared length is honest but below the type minimum
        let mut short = frame(TYPE_CANCEL, &[0; 5]);
        let declared = short.len() as u16;
        short[0..2].copy_from_slice(&declared.to_be_bytes());
        buffer.extend_from_slice(&short);
        buffer.extend_from_slice(&directory_frame(9));

        let messages: Vec<_> = FrameIter::new(&buffer).collect();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].is_err());
        assert_eq!(
            messages[1].as_ref().unwrap(),
            &FeedMessage::StockDirectory { locate: 9 }
        );
    }

    #[test]
    fn test_frame_iter_stops_at_torn_tail() {
        let mut buffer = directory_frame(1);
        buffer.extend_from_slice(&100u16.to_be_bytes());
        buffer.push(TYPE_ADD_ORDER);

        let messages: Vec<_> = FrameIter::new(&buffer).collect();
        assert_eq!(messages.len(), 1);
    }
}
