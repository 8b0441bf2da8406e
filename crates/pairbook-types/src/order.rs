//! Order types for the pairbook matching engine.
//!
//! Prices and quantities are scaled 256-bit unsigned integers
//! ([`U256`]); the engine compares and adds them as opaque integers and
//! never downcasts. Addresses, token references, signatures and fees are
//! carried through matching untouched.

use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

/// Which side of the book an order is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum Side {
    Bid,
    Ask,
}

impl Side {
    /// The side a resting order must be on to match this one.
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Self::Bid => Self::Ask,
            Self::Ask => Self::Bid,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bid => write!(f, "BUY"),
            Self::Ask => write!(f, "SELL"),
        }
    }
}

/// How an order interacts with resting liquidity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum OrderKind {
    Limit,
    Market,
}

impl std::fmt::Display for OrderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Limit => write!(f, "LIMIT"),
            Self::Market => write!(f, "MARKET"),
        }
    }
}

/// Lifecycle status of an order.
///
/// A resting order that has been partially consumed stays `Active` with a
/// reduced quantity; `PartiallyFilled` exists for callers that track fill
/// state outside the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum OrderStatus {
    New,
    Active,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::New => write!(f, "NEW"),
            Self::Active => write!(f, "ACTIVE"),
            Self::PartiallyFilled => write!(f, "PARTIALLY_FILLED"),
            Self::Filled => write!(f, "FILLED"),
            Self::Cancelled => write!(f, "CANCELLED"),
            Self::Rejected => write!(f, "REJECTED"),
        }
    }
}

/// Book-local order identifier.
///
/// Assigned by the book's monotonic counter when a limit remainder rests;
/// ids start at 1 and are never reused within a book's lifetime.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize,
)]
pub struct OrderId(pub u64);

impl OrderId {
    /// The id of an order the book has not (yet) assigned one to.
    pub const UNASSIGNED: Self = Self(0);

    #[must_use]
    pub fn is_assigned(self) -> bool {
        self.0 != 0
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Secp256k1 signature of the order payload. Never verified here;
/// signature checking happens before an order reaches the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub v: u8,
    pub r: B256,
    pub s: B256,
}

/// A single order, incoming or resting.
///
/// `quantity` is always the *remaining* unfilled amount. `price` is ignored
/// for market orders. Everything from `user_address` down is opaque to
/// matching and carried through verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub side: Side,
    pub kind: OrderKind,
    pub status: OrderStatus,
    pub price: U256,
    pub quantity: U256,
    pub user_address: Address,
    pub exchange_address: Address,
    pub base_token: Address,
    pub quote_token: Address,
    pub hash: B256,
    pub signature: Option<Signature>,
    pub filled_amount: U256,
    pub nonce: U256,
    pub make_fee: U256,
    pub take_fee: U256,
    pub pair_name: String,
    /// Monotonic seconds, stamped by the caller from the injected clock.
    pub created_at: u64,
    /// Monotonic seconds, stamped by the book on every mutation.
    pub updated_at: u64,
}

impl Order {
    #[must_use]
    pub fn is_limit(&self) -> bool {
        self.kind == OrderKind::Limit
    }

    #[must_use]
    pub fn is_market(&self) -> bool {
        self.kind == OrderKind::Market
    }
}

impl std::fmt::Display for Order {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Order[{}] {} {} {} {} @ {}",
            self.id, self.pair_name, self.side, self.kind, self.quantity, self.price,
        )
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl Order {
    pub fn dummy_limit(side: Side, price: U256, quantity: U256) -> Self {
        Self {
            id: OrderId::UNASSIGNED,
            side,
            kind: OrderKind::Limit,
            status: OrderStatus::New,
            price,
            quantity,
            user_address: Address::repeat_byte(0xaa),
            exchange_address: Address::repeat_byte(0xee),
            base_token: Address::repeat_byte(0x01),
            quote_token: Address::repeat_byte(0x02),
            hash: B256::ZERO,
            signature: None,
            filled_amount: U256::ZERO,
            nonce: U256::ZERO,
            make_fee: U256::ZERO,
            take_fee: U256::ZERO,
            pair_name: "BTC/USDT".to_owned(),
            created_at: 0,
            updated_at: 0,
        }
    }

    pub fn dummy_market(side: Side, quantity: U256) -> Self {
        let mut order = Self::dummy_limit(side, U256::ZERO, quantity);
        order.kind = OrderKind::Market;
        order
    }

    pub fn dummy_limit_for(user: Address, side: Side, price: U256, quantity: U256) -> Self {
        let mut order = Self::dummy_limit(side, price, quantity);
        order.user_address = user;
        order.exchange_address = user;
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_display() {
        assert_eq!(format!("{}", Side::Bid), "BUY");
        assert_eq!(format!("{}", Side::Ask), "SELL");
    }

    #[test]
    fn side_opposite() {
        assert_eq!(Side::Bid.opposite(), Side::Ask);
        assert_eq!(Side::Ask.opposite(), Side::Bid);
    }

    #[test]
    fn status_display() {
        assert_eq!(format!("{}", OrderStatus::PartiallyFilled), "PARTIALLY_FILLED");
        assert_eq!(format!("{}", OrderStatus::Cancelled), "CANCELLED");
    }

    #[test]
    fn order_id_assignment() {
        assert!(!OrderId::UNASSIGNED.is_assigned());
        assert!(OrderId(1).is_assigned());
        assert_eq!(format!("{}", OrderId(42)), "42");
    }

    #[test]
    fn dummy_limit_has_remaining_quantity() {
        let order = Order::dummy_limit(Side::Bid, U256::from(100), U256::from(5));
        assert!(order.is_limit());
        assert_eq!(order.quantity, U256::from(5));
        assert_eq!(order.status, OrderStatus::New);
    }

    #[test]
    fn market_order_ignores_price() {
        let order = Order::dummy_market(Side::Ask, U256::from(3));
        assert!(order.is_market());
        assert_eq!(order.price, U256::ZERO);
    }

    #[test]
    fn order_serde_roundtrip() {
        let order = Order::dummy_limit(Side::Bid, U256::from(100), U256::from(5));
        let json = serde_json::to_string(&order).unwrap();
        let back: Order = serde_json::from_str(&json).unwrap();
        assert_eq!(back.side, order.side);
        assert_eq!(back.price, order.price);
        assert_eq!(back.quantity, order.quantity);
        assert_eq!(back.user_address, order.user_address);
    }
}
