use rust_decimal::Decimal;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Side {
    Bid,
    Ask,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Status {
    Open,
    Executed,
    Canceled,
}

pub type Id = u64;
pub type ClientId = u64;
pub type Price = Decimal;
pub type Volume = u64;

#[derive(Debug, Clone)]
pub struct Order {
    pub id: Id,
    pub client_id: ClientId,
    pub side: Side,
    pub price: Price,
    pub volume: Volume,
    pub executed_volume: Volume,
    pub status: Status,
}

impl Order {
    pub fn new(id: Id, client_id: ClientId, side: Side, price: Price, volume: Volume) -> Self {
        Order {
            id,
            client_id,
            side,
            price,
            volume,
            executed_volume: 0,
            status: Status::Open,
        }
    }

    pub fn remaining_volume(&self) -> Volume {
        self.volume - self.executed_volume
    }
}

pub mod book;
