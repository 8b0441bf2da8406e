//! The order book for one trading pair: two side books plus the continuous
//! price-time priority matching loop.
//!
//! An incoming order is processed atomically: it walks the best levels of
//! the opposite side, draining resting orders oldest-first and emitting one
//! [`Trade`] per fill; any unmatched limit remainder rests on its own side
//! under a freshly assigned id. Market remainders are discarded; market
//! orders never rest.

use std::sync::Arc;

use alloy_primitives::U256;
use pairbook_types::{BookError, Order, OrderId, OrderKind, OrderStatus, Result, Side, Trade};

use crate::clock::{Clock, SystemClock};
use crate::ledger::{book_key, encode, BookRecord, BookStore, NoopStore};
use crate::price_level::PriceLevel;
use crate::side_book::SideBook;

/// Continuous matching engine for a single pair.
///
/// All operations are synchronous and totally ordered by their call order;
/// arrival order at equal prices is exactly time priority. One book per
/// pair, with callers serializing commands through their own queue.
pub struct OrderBook {
    pair: String,
    bids: SideBook,
    asks: SideBook,
    /// Last observed clock reading, stamped at the start of every operation.
    time: u64,
    /// Monotonic id counter; advanced once per processed order.
    next_order_id: u64,
    clock: Arc<dyn Clock>,
    store: Arc<dyn BookStore>,
    key: Vec<u8>,
}

impl std::fmt::Debug for OrderBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderBook")
            .field("pair", &self.pair)
            .field("bids", &self.bids)
            .field("asks", &self.asks)
            .field("time", &self.time)
            .field("next_order_id", &self.next_order_id)
            .finish_non_exhaustive()
    }
}

impl OrderBook {
    /// A book with the wall clock and no persistence.
    #[must_use]
    pub fn new(pair: impl Into<String>) -> Self {
        Self::with_parts(pair, Arc::new(SystemClock), Arc::new(NoopStore))
    }

    /// A book with an injected clock and persistence sink.
    #[must_use]
    pub fn with_parts(
        pair: impl Into<String>,
        clock: Arc<dyn Clock>,
        store: Arc<dyn BookStore>,
    ) -> Self {
        let pair = pair.into();
        let bids = SideBook::new(&pair, Side::Bid, Arc::clone(&store));
        let asks = SideBook::new(&pair, Side::Ask, Arc::clone(&store));
        let key = book_key(&pair);
        Self {
            pair,
            bids,
            asks,
            time: 0,
            next_order_id: 0,
            clock,
            store,
            key,
        }
    }

    // =================================================================
    // Queries
    // =================================================================

    #[must_use]
    pub fn pair(&self) -> &str {
        &self.pair
    }

    /// Last clock reading observed by the book.
    #[must_use]
    pub fn time(&self) -> u64 {
        self.time
    }

    #[must_use]
    pub fn bids(&self) -> &SideBook {
        &self.bids
    }

    #[must_use]
    pub fn asks(&self) -> &SideBook {
        &self.asks
    }

    /// Highest resting bid price, or zero if there are no bids.
    #[must_use]
    pub fn best_bid(&self) -> U256 {
        self.bids.max_price()
    }

    /// Lowest resting ask price, or zero if there are no asks.
    #[must_use]
    pub fn best_ask(&self) -> U256 {
        self.asks.min_price()
    }

    #[must_use]
    pub fn worst_bid(&self) -> U256 {
        self.bids.min_price()
    }

    #[must_use]
    pub fn worst_ask(&self) -> U256 {
        self.asks.max_price()
    }

    /// Resting volume at one price on one side, zero if no such level.
    #[must_use]
    pub fn volume_at_price(&self, side: Side, price: U256) -> U256 {
        self.book(side)
            .get_price_list(price)
            .map_or(U256::ZERO, PriceLevel::volume)
    }

    // =================================================================
    // Processing
    // =================================================================

    /// Process one incoming order.
    ///
    /// Returns the trades made and, for a limit order with unmatched
    /// remainder, a copy of the order as it now rests. The book stamps
    /// `updated_at` and assigns the resting id.
    pub fn process(&mut self, mut order: Order, verbose: bool) -> Result<(Vec<Trade>, Option<Order>)> {
        self.touch_time();
        order.updated_at = self.time;
        self.next_order_id += 1;

        let outcome = match order.kind {
            OrderKind::Market => (self.process_market(order, verbose)?, None),
            OrderKind::Limit => self.process_limit(order, verbose)?,
        };
        self.save_book()?;
        Ok(outcome)
    }

    /// Match a market order against the opposite side until it is filled or
    /// the side runs dry. Unfilled quantity vanishes.
    ///
    /// [`Self::process`] is the entry point that stamps time and advances
    /// the id counter; call this directly only when replaying pre-stamped
    /// input.
    pub fn process_market(&mut self, order: Order, verbose: bool) -> Result<Vec<Trade>> {
        let mut trades = Vec::new();
        let mut remaining = order.quantity;

        match order.side {
            Side::Bid => {
                while remaining > U256::ZERO && !self.asks.is_empty() {
                    let best = self.asks.min_price();
                    let (left, new_trades) =
                        self.match_level(Side::Ask, best, remaining, &order, verbose)?;
                    remaining = left;
                    trades.extend(new_trades);
                }
            }
            Side::Ask => {
                while remaining > U256::ZERO && !self.bids.is_empty() {
                    let best = self.bids.max_price();
                    let (left, new_trades) =
                        self.match_level(Side::Bid, best, remaining, &order, verbose)?;
                    remaining = left;
                    trades.extend(new_trades);
                }
            }
        }
        Ok(trades)
    }

    /// Match a limit order while it crosses, then rest any remainder on its
    /// own side under a fresh id.
    ///
    /// See [`Self::process_market`] for the direct-call caveat.
    pub fn process_limit(
        &mut self,
        mut order: Order,
        verbose: bool,
    ) -> Result<(Vec<Trade>, Option<Order>)> {
        let mut trades = Vec::new();
        let mut remaining = order.quantity;

        match order.side {
            Side::Bid => {
                while remaining > U256::ZERO
                    && !self.asks.is_empty()
                    && order.price >= self.asks.min_price()
                {
                    let best = self.asks.min_price();
                    let (left, new_trades) =
                        self.match_level(Side::Ask, best, remaining, &order, verbose)?;
                    remaining = left;
                    trades.extend(new_trades);
                }
            }
            Side::Ask => {
                while remaining > U256::ZERO
                    && !self.bids.is_empty()
                    && order.price <= self.bids.max_price()
                {
                    let best = self.bids.max_price();
                    let (left, new_trades) =
                        self.match_level(Side::Bid, best, remaining, &order, verbose)?;
                    remaining = left;
                    trades.extend(new_trades);
                }
            }
        }

        if remaining > U256::ZERO {
            order.id = OrderId(self.next_order_id);
            order.quantity = remaining;
            order.status = OrderStatus::Active;
            let resting = order.clone();
            self.book_mut(order.side).insert_order(order)?;
            return Ok((trades, Some(resting)));
        }
        Ok((trades, None))
    }

    /// Drain the level at `level_price` on the `maker_side` book, oldest
    /// order first, until it empties or `remaining` is used up.
    fn match_level(
        &mut self,
        maker_side: Side,
        level_price: U256,
        mut remaining: U256,
        taker: &Order,
        verbose: bool,
    ) -> Result<(U256, Vec<Trade>)> {
        let time = self.time;
        let taker_id = taker.exchange_address;
        let mut trades = Vec::new();

        while remaining > U256::ZERO {
            let book = self.book_mut(maker_side);
            let Some(level) = book.get_price_list(level_price) else {
                break;
            };
            let Some(head_id) = level.head_order() else {
                break;
            };
            let (traded_price, head_quantity, head_updated_at, maker_id) = {
                let head = book
                    .get_order(head_id)
                    .ok_or_else(|| BookError::Invariant {
                        reason: format!("level head {head_id} missing from order index"),
                    })?;
                (head.price, head.quantity, head.updated_at, head.exchange_address)
            };

            let traded_quantity = if remaining < head_quantity {
                // Partial fill of the maker: a decrease, so it keeps both
                // its queue position and its updated_at.
                let new_quantity = head_quantity - remaining;
                book.update_quantity(head_id, new_quantity, head_updated_at)?;
                std::mem::replace(&mut remaining, U256::ZERO)
            } else if remaining == head_quantity {
                book.remove_order_by_id(head_id)?;
                std::mem::replace(&mut remaining, U256::ZERO)
            } else {
                book.remove_order_by_id(head_id)?;
                remaining -= head_quantity;
                head_quantity
            };

            if verbose {
                tracing::debug!(
                    time,
                    price = %traded_price,
                    quantity = %traded_quantity,
                    maker = %maker_id,
                    taker = %taker_id,
                    "trade",
                );
            }
            trades.push(Trade {
                timestamp: time,
                price: traded_price,
                quantity: traded_quantity,
                taker: taker_id,
                maker: maker_id,
            });
        }
        Ok((remaining, trades))
    }

    // =================================================================
    // Cancel / modify
    // =================================================================

    /// Cancel a resting order, addressed by the side and id carried on
    /// `order`. Unknown ids (including a wrong side) are a silent no-op.
    pub fn cancel(&mut self, order: &Order) -> Result<Option<Order>> {
        self.touch_time();
        let time = self.time;

        let book = self.book_mut(order.side);
        if !book.order_exists(order.id) {
            tracing::debug!(id = %order.id, side = %order.side, "cancel: no such order");
            self.save_book()?;
            return Ok(None);
        }
        let mut removed = book.remove_order_by_id(order.id)?;
        removed.status = OrderStatus::Cancelled;
        removed.updated_at = time;

        self.save_book()?;
        Ok(Some(removed))
    }

    /// Modify the resting order `id` on the side carried by `update`.
    ///
    /// Unknown ids are a silent no-op; a modification cannot move an order
    /// across sides. Quantity increases and price changes forfeit time
    /// priority (see [`SideBook::update_order`]).
    pub fn modify(&mut self, mut update: Order, id: OrderId) -> Result<Option<Order>> {
        self.touch_time();
        update.id = id;
        update.updated_at = self.time;
        let side = update.side;

        let book = self.book_mut(side);
        if !book.order_exists(id) {
            tracing::debug!(id = %id, side = %side, "modify: no such order");
            self.save_book()?;
            return Ok(None);
        }
        book.update_order(update)?;

        let modified = self.book(side).get_order(id).cloned();
        self.save_book()?;
        Ok(modified)
    }

    // =================================================================
    // Internals
    // =================================================================

    fn book(&self, side: Side) -> &SideBook {
        match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        }
    }

    fn book_mut(&mut self, side: Side) -> &mut SideBook {
        match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        }
    }

    fn touch_time(&mut self) {
        self.time = self.clock.now();
    }

    fn save_book(&self) -> Result<()> {
        let record = BookRecord {
            pair: self.pair.clone(),
            time: self.time,
            next_order_id: self.next_order_id,
        };
        self.store.put(&self.key, &encode(&record)?)
    }
}

#[cfg(test)]
mod tests {
    use crate::clock::StepClock;

    use super::*;

    fn px(n: u64) -> U256 {
        U256::from(n)
    }

    fn qty(n: u64) -> U256 {
        U256::from(n)
    }

    fn make_book() -> OrderBook {
        OrderBook::with_parts("BTC/USDT", Arc::new(StepClock::new(1)), Arc::new(NoopStore))
    }

    fn limit(side: Side, price: u64, quantity: u64) -> Order {
        Order::dummy_limit(side, px(price), qty(quantity))
    }

    fn market(side: Side, quantity: u64) -> Order {
        Order::dummy_market(side, qty(quantity))
    }

    #[test]
    fn resting_ids_are_monotonic_from_one() {
        let mut book = make_book();
        let (_, first) = book.process(limit(Side::Bid, 100, 1), false).unwrap();
        let (_, second) = book.process(limit(Side::Bid, 101, 1), false).unwrap();
        assert_eq!(first.unwrap().id, OrderId(1));
        assert_eq!(second.unwrap().id, OrderId(2));
    }

    #[test]
    fn market_orders_advance_the_id_counter() {
        let mut book = make_book();
        // A market order against an empty book trades nothing but still
        // consumes an id.
        let (trades, _) = book.process(market(Side::Bid, 5), false).unwrap();
        assert!(trades.is_empty());
        let (_, resting) = book.process(limit(Side::Ask, 100, 1), false).unwrap();
        assert_eq!(resting.unwrap().id, OrderId(2));
    }

    #[test]
    fn time_advances_with_every_operation() {
        let mut book = make_book();
        book.process(limit(Side::Bid, 100, 1), false).unwrap();
        let t1 = book.time();
        book.process(limit(Side::Bid, 99, 1), false).unwrap();
        let t2 = book.time();
        assert!(t2 > t1);
    }

    #[test]
    fn best_and_worst_prices() {
        let mut book = make_book();
        book.process(limit(Side::Bid, 98, 1), false).unwrap();
        book.process(limit(Side::Bid, 100, 1), false).unwrap();
        book.process(limit(Side::Ask, 105, 1), false).unwrap();
        book.process(limit(Side::Ask, 103, 1), false).unwrap();

        assert_eq!(book.best_bid(), px(100));
        assert_eq!(book.worst_bid(), px(98));
        assert_eq!(book.best_ask(), px(103));
        assert_eq!(book.worst_ask(), px(105));
    }

    #[test]
    fn empty_sides_report_zero() {
        let book = make_book();
        assert_eq!(book.best_bid(), U256::ZERO);
        assert_eq!(book.best_ask(), U256::ZERO);
        assert_eq!(book.worst_bid(), U256::ZERO);
        assert_eq!(book.worst_ask(), U256::ZERO);
    }

    #[test]
    fn volume_at_price_reads_one_level() {
        let mut book = make_book();
        book.process(limit(Side::Ask, 100, 2), false).unwrap();
        book.process(limit(Side::Ask, 100, 3), false).unwrap();
        book.process(limit(Side::Ask, 101, 4), false).unwrap();

        assert_eq!(book.volume_at_price(Side::Ask, px(100)), qty(5));
        assert_eq!(book.volume_at_price(Side::Ask, px(101)), qty(4));
        assert_eq!(book.volume_at_price(Side::Ask, px(102)), U256::ZERO);
        assert_eq!(book.volume_at_price(Side::Bid, px(100)), U256::ZERO);
    }

    #[test]
    fn trade_timestamps_match_book_time() {
        let mut book = make_book();
        book.process(limit(Side::Ask, 100, 2), false).unwrap();
        let (trades, _) = book.process(limit(Side::Bid, 100, 2), false).unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].timestamp, book.time());
    }

    #[test]
    fn cancel_returns_the_cancelled_order() {
        let mut book = make_book();
        let (_, resting) = book.process(limit(Side::Bid, 99, 1), false).unwrap();
        let resting = resting.unwrap();

        let cancelled = book.cancel(&resting).unwrap().unwrap();
        assert_eq!(cancelled.id, resting.id);
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert!(book.bids().is_empty());
    }

    #[test]
    fn cancel_unknown_is_silent() {
        let mut book = make_book();
        let mut ghost = limit(Side::Bid, 99, 1);
        ghost.id = OrderId(42);
        assert!(book.cancel(&ghost).unwrap().is_none());
    }

    #[test]
    fn cancel_wrong_side_is_silent() {
        let mut book = make_book();
        let (_, resting) = book.process(limit(Side::Bid, 99, 1), false).unwrap();
        let mut wrong = resting.unwrap();
        wrong.side = Side::Ask;

        assert!(book.cancel(&wrong).unwrap().is_none());
        assert_eq!(book.bids().num_orders(), 1, "order must survive");
    }

    #[test]
    fn modify_unknown_is_silent() {
        let mut book = make_book();
        let outcome = book.modify(limit(Side::Bid, 100, 1), OrderId(9)).unwrap();
        assert!(outcome.is_none());
    }

    #[test]
    fn modify_cannot_cross_sides() {
        let mut book = make_book();
        let (_, resting) = book.process(limit(Side::Bid, 100, 1), false).unwrap();
        let id = resting.unwrap().id;

        // The update addresses the ask book, where the id does not exist.
        let update = limit(Side::Ask, 100, 5);
        assert!(book.modify(update, id).unwrap().is_none());
        assert_eq!(book.bids().get_order(id).unwrap().quantity, qty(1));
    }
}
