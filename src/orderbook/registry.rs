use dashmap::DashMap;
use std::sync::Arc;
use tracing::info;

use crate::orderbook::book::OrderBook;
use crate::orderbook::error::BookResult;
use crate::orderbook::types::{OrderId, OrderType, Price, Quantity, Side, SymbolId};

/// Symbol-keyed collection of order books.
///
/// Books are created lazily on first reference and never deleted for the
/// life of the process, so a returned `Arc<OrderBook>` stays valid
/// indefinitely. The registry-level operations are thin dispatchers.
pub struct BookRegistry {
    books: DashMap<SymbolId, Arc<OrderBook>>,
}

impl BookRegistry {
    pub fn new() -> Self {
        Self {
            books: DashMap::new(),
        }
    }

    /// Get the book for `symbol`, creating it atomically if absent.
    pub fn book(&self, symbol: SymbolId) -> Arc<OrderBook> {
        let entry = self.books.entry(symbol).or_insert_with(|| {
            info!(symbol, "registering order book");
            Arc::new(OrderBook::new(symbol))
        });
        Arc::clone(entry.value())
    }

    /// The book for `symbol` if one has been created.
    pub fn existing_book(&self, symbol: SymbolId) -> Option<Arc<OrderBook>> {
        self.books.get(&symbol).map(|entry| Arc::clone(entry.value()))
    }

    pub fn add_order(
        &self,
        symbol: SymbolId,
        order_id: OrderId,
        price: Price,
        quantity: Quantity,
        side: Side,
        kind: OrderType,
    ) -> BookResult<()> {
        self.book(symbol).add_order(order_id, price, quantity, side, kind)
    }

    pub fn cancel_order(
        &self,
        symbol: SymbolId,
        order_id: OrderId,
        quantity: Quantity,
    ) -> BookResult<()> {
        self.book(symbol).cancel_order(order_id, quantity)
    }

    pub fn modify_order(
        &self,
        symbol: SymbolId,
        order_id: OrderId,
        new_price: Price,
        new_quantity: Quantity,
    ) -> BookResult<()> {
        self.book(symbol).modify_order(order_id, new_price, new_quantity)
    }

    pub fn execute_trade(
        &self,
        symbol: SymbolId,
        price: Price,
        quantity: Quantity,
        aggressor: Side,
    ) -> bool {
        self.book(symbol).execute_trade(price, quantity, aggressor)
    }

    /// Snapshot of every symbol with a book.
    pub fn active_symbols(&self) -> Vec<SymbolId> {
        let mut symbols: Vec<SymbolId> = self.books.iter().map(|entry| *entry.key()).collect();
        symbols.sort_unstable();
        symbols
    }

    pub fn book_count(&self) -> usize {
        self.books.len()
    }
}

impl Default for BookRegistry {
    fn default() -> Self {
        Self::new()
    }
}
