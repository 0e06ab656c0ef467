//! Text wire protocol spoken over the TCP front end.
//!
//! Requests are single whitespace-delimited commands with case-sensitive
//! keywords:
//!
//! - `BUY <quantity> <price>`
//! - `SELL <quantity> <price>`
//! - `CANCEL <order_id>`
//! - `STATUS`
//!
//! Replies are single text payloads (`ORDER_ACCEPTED <id>`,
//! `CANCEL_ACCEPTED <id>`, `STATUS <summary>`, `ERROR <message>`), written
//! without a trailing newline. Trade broadcasts use
//! `TRADE <buy_id> <sell_id> <quantity> <price>`.
//!
//! Tokens past the ones a command consumes are ignored.

use crate::order::{Id, Price};
use crate::trade::Trade;
use std::fmt;
use thiserror::Error;

/// A parsed client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Buy { quantity: i64, price: Price },
    Sell { quantity: i64, price: Price },
    Cancel { order_id: Id },
    Status,
}

/// Command parse failures, rendered into `ERROR` replies verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),
    #[error("{0} requires a quantity and a price")]
    MissingArguments(&'static str),
    #[error("CANCEL requires an order id")]
    MissingOrderId,
    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),
    #[error("invalid price: {0}")]
    InvalidPrice(String),
    #[error("invalid order id: {0}")]
    InvalidOrderId(String),
}

/// Parse one command out of a received text payload.
pub fn parse_command(input: &str) -> Result<Command, ParseError> {
    let mut tokens = input.split_whitespace();
    let keyword = tokens.next().unwrap_or("");

    match keyword {
        "BUY" => parse_order_args("BUY", &mut tokens)
            .map(|(quantity, price)| Command::Buy { quantity, price }),
        "SELL" => parse_order_args("SELL", &mut tokens)
            .map(|(quantity, price)| Command::Sell { quantity, price }),
        "CANCEL" => {
            let raw = tokens.next().ok_or(ParseError::MissingOrderId)?;
            let order_id = raw
                .parse::<Id>()
                .map_err(|_| ParseError::InvalidOrderId(raw.to_string()))?;
            Ok(Command::Cancel { order_id })
        }
        "STATUS" => Ok(Command::Status),
        other => Err(ParseError::UnknownCommand(other.to_string())),
    }
}

fn parse_order_args<'a>(
    keyword: &'static str,
    tokens: &mut impl Iterator<Item = &'a str>,
) -> Result<(i64, Price), ParseError> {
    let raw_quantity = tokens.next().ok_or(ParseError::MissingArguments(keyword))?;
    let raw_price = tokens.next().ok_or(ParseError::MissingArguments(keyword))?;

    let quantity = raw_quantity
        .parse::<i64>()
        .map_err(|_| ParseError::InvalidQuantity(raw_quantity.to_string()))?;
    // Normalized so "100.0" and "100" key the same price level and render
    // without trailing zeros.
    let price = raw_price
        .parse::<Price>()
        .map(|price| price.normalize())
        .map_err(|_| ParseError::InvalidPrice(raw_price.to_string()))?;

    Ok((quantity, price))
}

/// A reply to exactly one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    OrderAccepted(Id),
    CancelAccepted(Id),
    Status(String),
    Error(String),
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::OrderAccepted(id) => write!(f, "ORDER_ACCEPTED {}", id),
            Reply::CancelAccepted(id) => write!(f, "CANCEL_ACCEPTED {}", id),
            Reply::Status(summary) => write!(f, "STATUS {}", summary),
            Reply::Error(message) => write!(f, "ERROR {}", message),
        }
    }
}

/// Render a trade as its broadcast line.
pub fn trade_line(trade: &Trade) -> String {
    format!(
        "TRADE {} {} {} {}",
        trade.buy_order_id, trade.sell_order_id, trade.volume, trade.price
    )
}

#[cfg(test)]
mod tests {
    use super::{parse_command, trade_line, Command, ParseError, Reply};
    use crate::trade::Trade;
    use rust_decimal_macros::dec;
    use time::OffsetDateTime;

    #[test]
    fn test_parse_buy_and_sell() {
        assert_eq!(
            parse_command("BUY 10 100"),
            Ok(Command::Buy {
                quantity: 10,
                price: dec!(100)
            })
        );
        assert_eq!(
            parse_command("SELL 3 99.5"),
            Ok(Command::Sell {
                quantity: 3,
                price: dec!(99.5)
            })
        );
    }

    #[test]
    fn test_parse_normalizes_price() {
        let Ok(Command::Buy { price, .. }) = parse_command("BUY 1 100.0") else {
            panic!("BUY 1 100.0 should parse");
        };
        assert_eq!(price.to_string(), "100", "trailing zeros must be stripped");
    }

    #[test]
    fn test_parse_negative_quantity_reaches_book_validation() {
        // Sign errors are a domain concern; the parser only rejects
        // non-numeric text.
        assert_eq!(
            parse_command("BUY -5 100"),
            Ok(Command::Buy {
                quantity: -5,
                price: dec!(100)
            })
        );
    }

    #[test]
    fn test_parse_cancel_and_status() {
        assert_eq!(
            parse_command("CANCEL 42"),
            Ok(Command::Cancel { order_id: 42 })
        );
        assert_eq!(parse_command("STATUS"), Ok(Command::Status));
        // Surplus tokens are ignored.
        assert_eq!(parse_command("STATUS now please"), Ok(Command::Status));
    }

    #[test]
    fn test_parse_failures() {
        assert_eq!(
            parse_command("HOLD 10 100"),
            Err(ParseError::UnknownCommand("HOLD".to_string()))
        );
        assert_eq!(
            parse_command(""),
            Err(ParseError::UnknownCommand(String::new()))
        );
        assert_eq!(
            parse_command("BUY 10"),
            Err(ParseError::MissingArguments("BUY"))
        );
        assert_eq!(
            parse_command("BUY ten 100"),
            Err(ParseError::InvalidQuantity("ten".to_string()))
        );
        assert_eq!(
            parse_command("SELL 10 cheap"),
            Err(ParseError::InvalidPrice("cheap".to_string()))
        );
        assert_eq!(
            parse_command("CANCEL abc"),
            Err(ParseError::InvalidOrderId("abc".to_string()))
        );
        assert_eq!(parse_command("CANCEL"), Err(ParseError::MissingOrderId));
    }

    #[test]
    fn test_reply_rendering() {
        assert_eq!(Reply::OrderAccepted(7).to_string(), "ORDER_ACCEPTED 7");
        assert_eq!(Reply::CancelAccepted(7).to_string(), "CANCEL_ACCEPTED 7");
        assert_eq!(
            Reply::Status("Orders: 0, Bid levels: 0, Ask levels: 0".to_string()).to_string(),
            "STATUS Orders: 0, Bid levels: 0, Ask levels: 0"
        );
        assert_eq!(
            Reply::Error("Unknown command: HOLD".to_string()).to_string(),
            "ERROR Unknown command: HOLD"
        );
    }

    #[test]
    fn test_trade_line_rendering() {
        let trade = Trade {
            buy_order_id: 1,
            sell_order_id: 2,
            price: dec!(99.5),
            volume: 4,
            timestamp: OffsetDateTime::UNIX_EPOCH,
        };
        assert_eq!(trade_line(&trade), "TRADE 1 2 4 99.5");
    }
}
