//! # pairbook-core
//!
//! Continuous price-time priority matching engine for a single trading pair.
//!
//! - [`OrderBook`]: bids + asks, `process`/`cancel`/`modify`, the matching loop
//! - [`SideBook`]: ordered price levels plus a flat order index per side
//! - [`PriceLevel`]: the FIFO queue of resting orders at one price
//! - [`Clock`]: injected monotonic time ([`SystemClock`], [`StepClock`])
//! - [`BookStore`]: opaque key/value persistence sink ([`NoopStore`], [`MemStore`])
//!
//! ## Determinism
//!
//! Given a deterministic clock and a fixed input sequence, the emitted trade
//! sequence and the resulting book state are fully reproducible. The book is
//! a single-threaded core: operations are atomic with respect to one another
//! and are serialized by the caller, one book per pair.
//!
//! ```
//! use std::sync::Arc;
//! use pairbook_core::{OrderBook, StepClock, NoopStore};
//! use pairbook_types::{Order, Side, U256};
//!
//! let mut book = OrderBook::with_parts(
//!     "BTC/USDT",
//!     Arc::new(StepClock::new(1)),
//!     Arc::new(NoopStore),
//! );
//!
//! # let maker = Order::dummy_limit(Side::Ask, U256::from(100), U256::from(3));
//! # let taker = Order::dummy_limit(Side::Bid, U256::from(105), U256::from(2));
//! book.process(maker, false)?;
//! let (trades, _) = book.process(taker, false)?;
//! assert_eq!(trades.len(), 1);
//! assert_eq!(trades[0].price, U256::from(100));
//! # Ok::<(), pairbook_types::BookError>(())
//! ```

mod book_order;
pub mod clock;
pub mod ledger;
pub mod order_book;
pub mod price_level;
pub mod side_book;

pub use clock::{Clock, StepClock, SystemClock};
pub use ledger::{BookRecord, BookStore, LevelRecord, MemStore, NoopStore, SideRecord};
pub use order_book::OrderBook;
pub use price_level::{LevelOrders, PriceLevel};
pub use side_book::SideBook;
