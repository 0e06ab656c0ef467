//! Trade representation produced by the matching engine.
//!
//! A Trade links the bid and the ask order that were matched, along with the
//! execution price, volume, and a timestamp.

use crate::order;
use time::OffsetDateTime;

/// A single execution between a bid and an ask.
#[derive(Debug, Clone)]
pub struct Trade {
    /// The bid order involved in the trade.
    pub buy_order_id: order::Id,
    /// The ask order involved in the trade.
    pub sell_order_id: order::Id,
    /// Execution price of the trade. Always the ask level's price at the
    /// moment of the fill.
    pub price: order::Price,
    /// Executed volume for this trade.
    pub volume: order::Volume,
    /// UTC timestamp when the trade was generated.
    pub timestamp: OffsetDateTime,
}
