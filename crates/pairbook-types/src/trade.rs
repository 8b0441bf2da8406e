//! Trade types produced by the matching loop.
//!
//! A [`Trade`] is the immutable record of one fill between the incoming
//! (taker) order and a resting (maker) order at the maker's price.

use std::collections::BTreeMap;

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

/// A single fill.
///
/// `price` is the resting order's price (price improvement goes to the
/// taker); `quantity` is the amount crossed in this fill. `taker` and
/// `maker` are the exchange addresses carried on the two orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    /// Book time at which the fill was made, monotonic seconds.
    pub timestamp: u64,
    pub price: U256,
    pub quantity: U256,
    pub taker: Address,
    pub maker: Address,
}

impl Trade {
    /// The legacy string-map shape emitted by the original ledger:
    /// `timestamp`, `price`, `quantity` as decimal strings, `time` as a
    /// duplicate of `timestamp`, and `taker_id`/`maker_id` as hex addresses.
    #[must_use]
    pub fn to_record(&self) -> BTreeMap<String, String> {
        let mut record = BTreeMap::new();
        record.insert("timestamp".to_owned(), self.timestamp.to_string());
        record.insert("price".to_owned(), self.price.to_string());
        record.insert("quantity".to_owned(), self.quantity.to_string());
        // Retained for compatibility with the historical record shape.
        record.insert("time".to_owned(), self.timestamp.to_string());
        record.insert("taker_id".to_owned(), self.taker.to_string());
        record.insert("maker_id".to_owned(), self.maker.to_string());
        record
    }
}

impl std::fmt::Display for Trade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Trade {} @ {} (t={}, maker={}, taker={})",
            self.quantity, self.price, self.timestamp, self.maker, self.taker,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_trade() -> Trade {
        Trade {
            timestamp: 1_700_000_000,
            price: U256::from(100),
            quantity: U256::from(7),
            taker: Address::repeat_byte(0x11),
            maker: Address::repeat_byte(0x22),
        }
    }

    #[test]
    fn record_shape() {
        let record = make_trade().to_record();
        assert_eq!(record["price"], "100");
        assert_eq!(record["quantity"], "7");
        assert_eq!(record["timestamp"], "1700000000");
        assert_eq!(record["time"], record["timestamp"]);
        assert!(record["taker_id"].starts_with("0x"));
        assert!(record["maker_id"].starts_with("0x"));
    }

    #[test]
    fn trade_serde_roundtrip() {
        let trade = make_trade();
        let json = serde_json::to_string(&trade).unwrap();
        let back: Trade = serde_json::from_str(&json).unwrap();
        assert_eq!(back, trade);
    }

    #[test]
    fn trade_display() {
        let s = format!("{}", make_trade());
        assert!(s.contains("7 @ 100"));
    }
}
