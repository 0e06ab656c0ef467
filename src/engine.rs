//! Shared, lock-guarded facade over the order book.
//!
//! Sessions and the periodic matcher task all go through an [`Engine`]
//! behind an `Arc`. A single mutex serializes every book operation, so each
//! call is atomic with respect to the others; callers never hold the lock
//! across an await point because none of the methods are async.

use crate::order::book::{Book, BookError};
use crate::order::{ClientId, Id, Order, Price, Side};
use crate::trade::Trade;
use parking_lot::Mutex;

/// Thread-safe matching engine around a single-instrument [`Book`].
#[derive(Debug, Default)]
pub struct Engine {
    book: Mutex<Book>,
}

impl Engine {
    /// Create an engine with an empty book.
    pub fn new() -> Self {
        Engine::default()
    }

    /// Place a new resting order. Returns the id assigned by the book.
    pub fn add_order(
        &self,
        side: Side,
        quantity: i64,
        price: Price,
        client_id: ClientId,
    ) -> Result<Id, BookError> {
        self.book.lock().add(side, quantity, price, client_id)
    }

    /// Cancel a resting order by id.
    pub fn cancel_order(&self, id: Id) -> Result<Order, BookError> {
        self.book.lock().cancel(id)
    }

    /// Run one matching pass to quiescence, returning the trades produced
    /// and the orders that were fully filled by them.
    pub fn match_orders(&self) -> (Vec<Trade>, Vec<Order>) {
        self.book.lock().match_orders()
    }

    /// Textual book snapshot (levels and totals on both sides).
    pub fn snapshot(&self) -> String {
        self.book.lock().snapshot()
    }

    /// One-line order/level count summary.
    pub fn status(&self) -> String {
        self.book.lock().status()
    }
}
