use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookError {
    /// Order not found in the book
    OrderNotFound,

    /// An order with this id already rests in the book
    DuplicateOrder,

    /// Order is not in a valid state for the operation
    InvalidOrderState,

    /// Invalid price (outside the permitted tick range)
    InvalidPrice,

    /// Invalid quantity (zero)
    InvalidQuantity,
}

impl fmt::Display for BookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookError::OrderNotFound => write!(f, "Order not found"),
            BookError::DuplicateOrder => write!(f, "Order already exists"),
            BookError::InvalidOrderState => write!(f, "Invalid order state"),
            BookError::InvalidPrice => write!(f, "Invalid price"),
            BookError::InvalidQuantity => write!(f, "Invalid quantity"),
        }
    }
}

impl std::error::Error for BookError {}

/// Result type for order book operations
pub type BookResult<T> = Result<T, BookError>;
