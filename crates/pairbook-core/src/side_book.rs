//! One side of the book: an ordered map of price levels plus a flat order
//! index.
//!
//! The `BTreeMap` is the single owner of every [`PriceLevel`]; the order
//! map owns every resting node. Aggregate volume, order count and depth are
//! maintained on every mutation and must stay equal to the sums over the
//! underlying structures at all times.

use std::collections::BTreeMap;
use std::sync::Arc;

use alloy_primitives::U256;
use pairbook_types::{BookError, Order, OrderId, Result, Side};

use crate::book_order::{BookOrder, OrderMap};
use crate::ledger::{encode, key_at, side_key, slot_of, BookStore, SideRecord};
use crate::price_level::{LevelOrders, PriceLevel};

fn corrupt(reason: &str) -> BookError {
    BookError::Invariant {
        reason: reason.to_owned(),
    }
}

/// All resting liquidity on one side of a pair.
pub struct SideBook {
    side: Side,
    /// Price → level, ordered by price. Sole owner of the levels.
    levels: BTreeMap<U256, PriceLevel>,
    /// Order id → resting node. Sole owner of the orders.
    orders: OrderMap,
    /// Sum of all resting quantities on this side.
    volume: U256,
    num_orders: usize,
    /// Number of distinct prices with liquidity.
    depth: usize,
    key: Vec<u8>,
    slot: U256,
    store: Arc<dyn BookStore>,
}

impl std::fmt::Debug for SideBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SideBook")
            .field("side", &self.side)
            .field("depth", &self.depth)
            .field("num_orders", &self.num_orders)
            .field("volume", &self.volume)
            .finish_non_exhaustive()
    }
}

impl SideBook {
    pub(crate) fn new(pair: &str, side: Side, store: Arc<dyn BookStore>) -> Self {
        let key = side_key(pair, side);
        let slot = slot_of(&key);
        Self {
            side,
            levels: BTreeMap::new(),
            orders: OrderMap::new(),
            volume: U256::ZERO,
            num_orders: 0,
            depth: 0,
            key,
            slot,
            store,
        }
    }

    // =================================================================
    // Queries
    // =================================================================

    #[must_use]
    pub fn side(&self) -> Side {
        self.side
    }

    /// Sum of every resting order's quantity on this side.
    #[must_use]
    pub fn volume(&self) -> U256 {
        self.volume
    }

    #[must_use]
    pub fn num_orders(&self) -> usize {
        self.num_orders
    }

    /// Number of distinct prices with resting liquidity.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.num_orders == 0
    }

    #[must_use]
    pub fn price_exists(&self, price: U256) -> bool {
        self.levels.contains_key(&price)
    }

    #[must_use]
    pub fn order_exists(&self, id: OrderId) -> bool {
        self.orders.contains_key(&id)
    }

    #[must_use]
    pub fn get_order(&self, id: OrderId) -> Option<&Order> {
        self.orders.get(&id).map(|node| &**node)
    }

    #[must_use]
    pub fn get_price_list(&self, price: U256) -> Option<&PriceLevel> {
        self.levels.get(&price)
    }

    /// Lowest price with liquidity, or zero if the side is empty.
    #[must_use]
    pub fn min_price(&self) -> U256 {
        self.levels
            .first_key_value()
            .map_or(U256::ZERO, |(price, _)| *price)
    }

    /// Highest price with liquidity, or zero if the side is empty.
    #[must_use]
    pub fn max_price(&self) -> U256 {
        self.levels
            .last_key_value()
            .map_or(U256::ZERO, |(price, _)| *price)
    }

    #[must_use]
    pub fn min_price_list(&self) -> Option<&PriceLevel> {
        self.levels.first_key_value().map(|(_, level)| level)
    }

    #[must_use]
    pub fn max_price_list(&self) -> Option<&PriceLevel> {
        self.levels.last_key_value().map(|(_, level)| level)
    }

    /// The level an incoming opposite-side order crosses first:
    /// the highest bid or the lowest ask.
    #[must_use]
    pub fn best_price_list(&self) -> Option<&PriceLevel> {
        match self.side {
            Side::Bid => self.max_price_list(),
            Side::Ask => self.min_price_list(),
        }
    }

    /// Price of [`Self::best_price_list`], or zero if the side is empty.
    #[must_use]
    pub fn best_price(&self) -> U256 {
        match self.side {
            Side::Bid => self.max_price(),
            Side::Ask => self.min_price(),
        }
    }

    /// Levels in ascending price order.
    pub fn levels(&self) -> impl Iterator<Item = &PriceLevel> {
        self.levels.values()
    }

    /// FIFO walk of the level at `price`, oldest order first.
    #[must_use]
    pub fn level_orders(&self, price: U256) -> Option<LevelOrders<'_>> {
        self.levels.get(&price).map(|level| level.iter(&self.orders))
    }

    // =================================================================
    // Mutation
    // =================================================================

    /// Create an empty level at `price`. Caller checks `!price_exists`.
    pub(crate) fn create_price(&mut self, price: U256) {
        debug_assert!(!self.price_exists(price));
        let key = key_at(self.slot, price);
        let slot = slot_of(&key);
        self.levels.insert(price, PriceLevel::new(price, key, slot));
        self.depth += 1;
    }

    /// Destroy the level at `price`. Caller guarantees it is empty.
    pub(crate) fn remove_price(&mut self, price: U256) -> Result<()> {
        let level = self
            .levels
            .remove(&price)
            .ok_or(BookError::PriceNotFound(price))?;
        debug_assert!(level.is_empty());
        self.depth = self
            .depth
            .checked_sub(1)
            .ok_or_else(|| corrupt("remove_price: depth underflow"))?;
        Ok(())
    }

    /// Rest `order` at its price, creating the level on first use.
    ///
    /// Re-inserting an id that is already resting replaces the old order
    /// (remove-then-insert, so the new arrival queues at the tail).
    pub(crate) fn insert_order(&mut self, order: Order) -> Result<()> {
        if self.order_exists(order.id) {
            self.remove_order_by_id(order.id)?;
        }
        let id = order.id;
        let price = order.price;
        let quantity = order.quantity;

        if !self.price_exists(price) {
            self.create_price(price);
        }
        self.orders.insert(id, BookOrder::new(order));
        let level = self
            .levels
            .get_mut(&price)
            .ok_or(BookError::PriceNotFound(price))?;
        level.append(&mut self.orders, id)?;

        self.num_orders += 1;
        self.volume = self
            .volume
            .checked_add(quantity)
            .ok_or_else(|| corrupt("insert_order: side volume overflow"))?;

        self.save_order(id)?;
        self.save_level(price)?;
        self.save_side()
    }

    /// Remove a resting order, destroying its level if it empties.
    pub(crate) fn remove_order_by_id(&mut self, id: OrderId) -> Result<Order> {
        let price = self
            .orders
            .get(&id)
            .ok_or(BookError::OrderNotFound(id))?
            .price;
        let level = self
            .levels
            .get_mut(&price)
            .ok_or(BookError::PriceNotFound(price))?;
        level.remove(&mut self.orders, id)?;
        let level_emptied = level.is_empty();

        let order = self
            .orders
            .remove(&id)
            .ok_or(BookError::OrderNotFound(id))?
            .into_order();

        if level_emptied {
            self.remove_price(price)?;
        } else {
            self.save_level(price)?;
        }
        self.num_orders = self
            .num_orders
            .checked_sub(1)
            .ok_or_else(|| corrupt("remove_order_by_id: order count underflow"))?;
        self.volume = self
            .volume
            .checked_sub(order.quantity)
            .ok_or_else(|| corrupt("remove_order_by_id: side volume underflow"))?;

        self.save_side()?;
        Ok(order)
    }

    /// Change a resting order's quantity in place.
    ///
    /// An increase forfeits time priority: the order re-queues at the tail
    /// (unless it already is the tail). A decrease keeps its position, which
    /// is what lets partial fills drain the head without reshuffling.
    pub(crate) fn update_quantity(
        &mut self,
        id: OrderId,
        new_quantity: U256,
        timestamp: u64,
    ) -> Result<()> {
        let (price, old_quantity) = {
            let node = self.orders.get(&id).ok_or(BookError::OrderNotFound(id))?;
            (node.price, node.quantity)
        };
        let level = self
            .levels
            .get_mut(&price)
            .ok_or(BookError::PriceNotFound(price))?;

        if new_quantity > old_quantity && level.tail_order() != Some(id) {
            level.move_to_tail(&mut self.orders, id)?;
        }
        level.update_volume(old_quantity, new_quantity)?;

        let node = self
            .orders
            .get_mut(&id)
            .ok_or(BookError::OrderNotFound(id))?;
        node.quantity = new_quantity;
        node.updated_at = timestamp;

        self.volume = self
            .volume
            .checked_sub(old_quantity)
            .and_then(|v| v.checked_add(new_quantity))
            .ok_or_else(|| corrupt("update_quantity: side volume out of range"))?;

        self.save_order(id)?;
        self.save_level(price)?;
        self.save_side()
    }

    /// Apply a modification to the resting order with `update.id`.
    ///
    /// A price change is a cancel-and-replace: the order re-enters the book
    /// as a fresh arrival at the new price. A same-price change goes through
    /// [`Self::update_quantity`].
    pub(crate) fn update_order(&mut self, update: Order) -> Result<()> {
        let resting_price = self
            .orders
            .get(&update.id)
            .ok_or(BookError::OrderNotFound(update.id))?
            .price;
        if update.price != resting_price {
            self.remove_order_by_id(update.id)?;
            self.insert_order(update)
        } else {
            self.update_quantity(update.id, update.quantity, update.updated_at)
        }
    }

    // =================================================================
    // Persistence
    // =================================================================

    fn save_order(&self, id: OrderId) -> Result<()> {
        let node = self.orders.get(&id).ok_or(BookError::OrderNotFound(id))?;
        let level = self
            .levels
            .get(&node.price)
            .ok_or(BookError::PriceNotFound(node.price))?;
        let key = key_at(level.slot(), U256::from(id.0));
        let value = encode(&**node)?;
        tracing::trace!(key = %hex::encode(key), id = %id, "save order record");
        self.store.put(&key, &value)
    }

    fn save_level(&self, price: U256) -> Result<()> {
        let level = self
            .levels
            .get(&price)
            .ok_or(BookError::PriceNotFound(price))?;
        let value = encode(&level.record())?;
        tracing::trace!(key = %hex::encode(level.key()), price = %price, "save level record");
        self.store.put(level.key(), &value)
    }

    fn save_side(&self) -> Result<()> {
        let record = SideRecord {
            side: self.side,
            volume: self.volume,
            num_orders: self.num_orders as u64,
            depth: self.depth as u64,
        };
        self.store.put(&self.key, &encode(&record)?)
    }
}

#[cfg(test)]
mod tests {
    use pairbook_types::OrderStatus;

    use super::*;
    use crate::ledger::NoopStore;

    fn px(n: u64) -> U256 {
        U256::from(n)
    }

    fn qty(n: u64) -> U256 {
        U256::from(n)
    }

    fn book(side: Side) -> SideBook {
        SideBook::new("BTC/USDT", side, Arc::new(NoopStore))
    }

    fn resting(id: u64, side: Side, price: u64, quantity: u64) -> Order {
        let mut order = Order::dummy_limit(side, px(price), qty(quantity));
        order.id = OrderId(id);
        order.status = OrderStatus::Active;
        order
    }

    fn queue(book: &SideBook, price: u64) -> Vec<u64> {
        book.level_orders(px(price))
            .map(|orders| orders.map(|o| o.id.0).collect())
            .unwrap_or_default()
    }

    #[test]
    fn insert_creates_level_and_tracks_aggregates() {
        let mut book = book(Side::Ask);
        book.insert_order(resting(1, Side::Ask, 100, 5)).unwrap();
        book.insert_order(resting(2, Side::Ask, 101, 3)).unwrap();
        book.insert_order(resting(3, Side::Ask, 100, 2)).unwrap();

        assert_eq!(book.depth(), 2);
        assert_eq!(book.num_orders(), 3);
        assert_eq!(book.volume(), qty(10));
        assert_eq!(book.min_price(), px(100));
        assert_eq!(book.max_price(), px(101));
        assert_eq!(queue(&book, 100), vec![1, 3]);
    }

    #[test]
    fn empty_side_uses_zero_sentinels() {
        let book = book(Side::Bid);
        assert_eq!(book.min_price(), U256::ZERO);
        assert_eq!(book.max_price(), U256::ZERO);
        assert!(book.min_price_list().is_none());
        assert!(book.best_price_list().is_none());
        assert!(book.is_empty());
    }

    #[test]
    fn best_price_depends_on_side() {
        let mut bids = book(Side::Bid);
        bids.insert_order(resting(1, Side::Bid, 99, 1)).unwrap();
        bids.insert_order(resting(2, Side::Bid, 101, 1)).unwrap();
        assert_eq!(bids.best_price(), px(101));

        let mut asks = book(Side::Ask);
        asks.insert_order(resting(1, Side::Ask, 99, 1)).unwrap();
        asks.insert_order(resting(2, Side::Ask, 101, 1)).unwrap();
        assert_eq!(asks.best_price(), px(99));
    }

    #[test]
    fn remove_last_order_destroys_level() {
        let mut book = book(Side::Bid);
        book.insert_order(resting(1, Side::Bid, 99, 1)).unwrap();
        assert_eq!(book.depth(), 1);

        let removed = book.remove_order_by_id(OrderId(1)).unwrap();
        assert_eq!(removed.id, OrderId(1));
        assert_eq!(book.depth(), 0);
        assert_eq!(book.num_orders(), 0);
        assert_eq!(book.volume(), U256::ZERO);
        assert!(!book.price_exists(px(99)));
    }

    #[test]
    fn remove_unknown_order_errors() {
        let mut book = book(Side::Bid);
        let err = book.remove_order_by_id(OrderId(7)).unwrap_err();
        assert!(matches!(err, BookError::OrderNotFound(OrderId(7))));
    }

    #[test]
    fn reinsert_same_id_replaces_and_requeues() {
        let mut book = book(Side::Ask);
        book.insert_order(resting(1, Side::Ask, 100, 5)).unwrap();
        book.insert_order(resting(2, Side::Ask, 100, 1)).unwrap();

        // Same id arrives again with a new quantity: old node is replaced
        // and the order queues at the tail like any new arrival.
        book.insert_order(resting(1, Side::Ask, 100, 2)).unwrap();

        assert_eq!(book.num_orders(), 2);
        assert_eq!(book.volume(), qty(3));
        assert_eq!(queue(&book, 100), vec![2, 1]);
    }

    #[test]
    fn quantity_increase_forfeits_priority() {
        let mut book = book(Side::Bid);
        book.insert_order(resting(1, Side::Bid, 100, 1)).unwrap();
        book.insert_order(resting(2, Side::Bid, 100, 1)).unwrap();
        book.insert_order(resting(3, Side::Bid, 100, 1)).unwrap();

        book.update_quantity(OrderId(1), qty(2), 10).unwrap();

        assert_eq!(queue(&book, 100), vec![2, 3, 1]);
        let level = book.get_price_list(px(100)).unwrap();
        assert_eq!(level.len(), 3);
        assert_eq!(level.volume(), qty(4));
        assert_eq!(book.volume(), qty(4));
        assert_eq!(book.get_order(OrderId(1)).unwrap().updated_at, 10);
    }

    #[test]
    fn quantity_decrease_keeps_priority() {
        let mut book = book(Side::Bid);
        book.insert_order(resting(1, Side::Bid, 100, 5)).unwrap();
        book.insert_order(resting(2, Side::Bid, 100, 1)).unwrap();

        book.update_quantity(OrderId(1), qty(2), 10).unwrap();

        assert_eq!(queue(&book, 100), vec![1, 2]);
        assert_eq!(book.volume(), qty(3));
    }

    #[test]
    fn increase_at_tail_stays_put() {
        let mut book = book(Side::Bid);
        book.insert_order(resting(1, Side::Bid, 100, 1)).unwrap();
        book.insert_order(resting(2, Side::Bid, 100, 1)).unwrap();

        book.update_quantity(OrderId(2), qty(5), 10).unwrap();

        assert_eq!(queue(&book, 100), vec![1, 2]);
        assert_eq!(book.volume(), qty(6));
    }

    #[test]
    fn price_change_requeues_at_new_level() {
        let mut book = book(Side::Ask);
        book.insert_order(resting(1, Side::Ask, 100, 2)).unwrap();
        book.insert_order(resting(2, Side::Ask, 105, 1)).unwrap();

        let mut update = resting(1, Side::Ask, 105, 2);
        update.updated_at = 20;
        book.update_order(update).unwrap();

        assert!(!book.price_exists(px(100)), "old level must be gone");
        assert_eq!(book.depth(), 1);
        assert_eq!(queue(&book, 105), vec![2, 1], "moved order is a fresh arrival");
        assert_eq!(book.volume(), qty(3));
    }

    #[test]
    fn update_unknown_order_errors() {
        let mut book = book(Side::Ask);
        let err = book.update_order(resting(9, Side::Ask, 100, 1)).unwrap_err();
        assert!(matches!(err, BookError::OrderNotFound(OrderId(9))));
    }
}
