//! Limit order book with price-time priority.
//!
//! Two BTreeMaps hold the price levels (bids matched from the highest key,
//! asks from the lowest). Each price level maintains a FIFO queue of orders
//! via indices into a Slab, avoiding per-order allocations and allowing O(1)
//! insertion/removal within a level. Orders are addressable by id through a
//! side table, so cancels do not scan the book.
//!
//! Matching is not performed on insert: [`Book::match_orders`] crosses the
//! best bid and best ask while prices overlap and is driven externally, on a
//! fixed cadence, by the engine host.

use crate::order::{ClientId, Id, Order, Price, Side, Status, Volume};
use crate::trade::Trade;
use rust_decimal::Decimal;
use slab::Slab;
use std::cmp;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write;
use thiserror::Error;
use time::OffsetDateTime;

/// Order book errors surfaced to the session layer.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum BookError {
    /// Rejected order with a zero or negative quantity or price.
    #[error("quantity and price must be positive")]
    NonPositiveOrder,
    /// Tried to cancel an order that is not resting in the book.
    #[error("order #{0} not found")]
    OrderNotFound(Id),
}

/// Aggregated state for a single price level.
///
/// Keeps the head/tail of a doubly-linked list of orders (by slab index), as
/// well as cumulative volume and order count for quick depth queries.
#[derive(Debug, Default)]
struct PriceLevel {
    head: Option<usize>,
    tail: Option<usize>,
    total_volume: Volume,
    total_orders: usize,
}

impl PriceLevel {
    /// Append an order node to the back of the level's FIFO queue and update
    /// aggregates. The `order_idx` must reference a valid entry in `orders`.
    fn push(&mut self, orders: &mut Slab<OrderNode>, order_idx: usize) {
        match self.tail {
            Some(tail) => {
                orders[tail].next = Some(order_idx);
                orders[order_idx].prev = Some(tail);
                self.tail = Some(order_idx);
            }
            None => {
                self.head = Some(order_idx);
                self.tail = Some(order_idx);
                orders[order_idx].prev = None;
            }
        }

        self.total_volume += orders[order_idx].order.remaining_volume();
        self.total_orders += 1;
    }

    /// Remove a specific order node from the level's queue and update
    /// aggregates. The node must be currently linked in this level.
    fn remove(&mut self, orders: &mut Slab<OrderNode>, order_idx: usize) {
        let prev = orders[order_idx].prev;
        let next = orders[order_idx].next;

        if let Some(p) = prev {
            orders[p].next = next;
        } else {
            self.head = next;
        }
        if let Some(n) = next {
            orders[n].prev = prev;
        } else {
            self.tail = prev;
        }
        self.total_orders -= 1;
        self.total_volume -= orders[order_idx].order.remaining_volume();
        orders[order_idx].prev = None;
        orders[order_idx].next = None;
    }
}

/// Node representing an individual order stored in a slab and linked within a
/// price level's FIFO queue.
#[derive(Debug, Clone)]
struct OrderNode {
    order: Order,
    next: Option<usize>,
    prev: Option<usize>,
}

/// Single-instrument limit order book.
#[derive(Debug, Default)]
pub struct Book {
    bids: BTreeMap<Price, PriceLevel>,
    asks: BTreeMap<Price, PriceLevel>,
    orders: Slab<OrderNode>,
    order_indexes: HashMap<Id, usize>,
    last_id: Id,
}

impl Book {
    /// Create a new, empty book.
    pub fn new() -> Self {
        Book::default()
    }

    /// Insert a new order into the book at its price level.
    ///
    /// Assigns the next sequential order id and returns it. The order rests
    /// as-is; crossing prices are only resolved by [`Book::match_orders`].
    pub fn add(
        &mut self,
        side: Side,
        quantity: i64,
        price: Price,
        client_id: ClientId,
    ) -> Result<Id, BookError> {
        if quantity <= 0 || price <= Decimal::ZERO {
            return Err(BookError::NonPositiveOrder);
        }

        self.last_id += 1;
        let order = Order::new(self.last_id, client_id, side, price, quantity as Volume);

        let idx = self.orders.insert(OrderNode {
            order,
            next: None,
            prev: None,
        });
        self.order_indexes.insert(self.last_id, idx);
        let level = match side {
            Side::Bid => self.bids.entry(price).or_default(),
            Side::Ask => self.asks.entry(price).or_default(),
        };
        level.push(&mut self.orders, idx);

        Ok(self.last_id)
    }

    /// Cancel an existing order by id, returning it with its remaining
    /// volume intact.
    pub fn cancel(&mut self, id: Id) -> Result<Order, BookError> {
        let idx = match self.order_indexes.get(&id) {
            Some(idx) => *idx,
            None => return Err(BookError::OrderNotFound(id)),
        };

        let mut order = self.remove_order(idx);
        order.status = Status::Canceled;
        Ok(order)
    }

    /// Match the best bid and best ask while there is price overlap,
    /// producing trades and fully-filled (closed) orders.
    ///
    /// Each fill trades `min(remaining, remaining)` of the two queue heads at
    /// the ask level's price. On return either one side is empty or the best
    /// bid is strictly below the best ask.
    pub fn match_orders(&mut self) -> (Vec<Trade>, Vec<Order>) {
        let mut trades = Vec::new();
        let mut closed_orders = Vec::new();

        loop {
            let best_bid = match self.bids.keys().next_back() {
                Some(price) => *price,
                None => break,
            };
            let best_ask = match self.asks.keys().next() {
                Some(price) => *price,
                None => break,
            };
            if best_bid < best_ask {
                break;
            }

            let bid_idx = self.bids[&best_bid].head.unwrap();
            let ask_idx = self.asks[&best_ask].head.unwrap();
            let volume = cmp::min(
                self.orders[bid_idx].order.remaining_volume(),
                self.orders[ask_idx].order.remaining_volume(),
            );

            trades.push(Trade {
                buy_order_id: self.orders[bid_idx].order.id,
                sell_order_id: self.orders[ask_idx].order.id,
                price: best_ask,
                volume,
                timestamp: OffsetDateTime::now_utc(),
            });

            self.fill_order(bid_idx, volume, &mut closed_orders);
            self.fill_order(ask_idx, volume, &mut closed_orders);
        }

        (trades, closed_orders)
    }

    /// Render the book as text: bid levels in descending price order, ask
    /// levels ascending, one `price : total volume` line per level.
    pub fn snapshot(&self) -> String {
        let mut out = String::from("BIDS:\n");
        for (price, level) in self.bids.iter().rev() {
            let _ = writeln!(out, "  {} : {}", price, level.total_volume);
        }
        out.push_str("ASKS:\n");
        for (price, level) in self.asks.iter() {
            let _ = writeln!(out, "  {} : {}", price, level.total_volume);
        }
        out
    }

    /// One-line summary of live order and level counts.
    pub fn status(&self) -> String {
        format!(
            "Orders: {}, Bid levels: {}, Ask levels: {}",
            self.order_indexes.len(),
            self.bids.len(),
            self.asks.len()
        )
    }

    /// Gets a resting order by its id.
    pub fn lookup(&self, id: Id) -> Option<&Order> {
        let idx = self.order_indexes.get(&id)?;

        Some(&self.orders[*idx].order)
    }

    /// Number of resting orders.
    pub fn len(&self) -> usize {
        self.order_indexes.len()
    }

    /// True when no orders rest on either side.
    pub fn is_empty(&self) -> bool {
        self.order_indexes.is_empty()
    }

    /// Execute `volume` against the order at `idx`, updating its level's
    /// aggregate and removing the order (and an emptied level) when it is
    /// fully filled.
    fn fill_order(&mut self, idx: usize, volume: Volume, closed_orders: &mut Vec<Order>) {
        let side = self.orders[idx].order.side;
        let price = self.orders[idx].order.price;
        self.orders[idx].order.executed_volume += volume;

        let level = match side {
            Side::Bid => self.bids.get_mut(&price).unwrap(),
            Side::Ask => self.asks.get_mut(&price).unwrap(),
        };
        level.total_volume -= volume;

        if self.orders[idx].order.remaining_volume() == 0 {
            let mut closed_order = self.remove_order(idx);
            closed_order.status = Status::Executed;
            closed_orders.push(closed_order);
        }
    }

    /// Remove an order (by slab index) from its corresponding price level and
    /// delete it from the book, cleaning up empty price levels.
    fn remove_order(&mut self, idx: usize) -> Order {
        let side = self.orders[idx].order.side;
        let price = self.orders[idx].order.price;

        let level = match side {
            Side::Bid => self.bids.get_mut(&price).unwrap(),
            Side::Ask => self.asks.get_mut(&price).unwrap(),
        };
        level.remove(&mut self.orders, idx);
        if level.total_orders == 0 {
            match side {
                Side::Bid => self.bids.remove(&price),
                Side::Ask => self.asks.remove(&price),
            };
        }

        let node = self.orders.remove(idx);
        self.order_indexes.remove(&node.order.id);
        node.order
    }
}
