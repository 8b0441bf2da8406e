//! A single price level: the FIFO queue of all resting orders at one price.
//!
//! The queue is a doubly linked list threaded through the side book's order
//! map by id, with cached head/tail pointers and aggregates, so append,
//! unsplice and move-to-tail are all O(1).

use alloy_primitives::U256;
use pairbook_types::{BookError, Order, OrderId, Result};

use crate::book_order::OrderMap;
use crate::ledger::{LevelRecord, KEY_LEN};

fn corrupt(reason: &str) -> BookError {
    BookError::Invariant {
        reason: reason.to_owned(),
    }
}

/// All resting orders at one price, oldest first.
#[derive(Debug, Clone)]
pub struct PriceLevel {
    price: U256,
    /// Oldest order, filled first.
    head: Option<OrderId>,
    /// Newest order, lowest time priority.
    tail: Option<OrderId>,
    length: usize,
    /// Sum of member quantities.
    volume: U256,
    key: [u8; KEY_LEN],
    slot: U256,
}

impl PriceLevel {
    pub(crate) fn new(price: U256, key: [u8; KEY_LEN], slot: U256) -> Self {
        Self {
            price,
            head: None,
            tail: None,
            length: 0,
            volume: U256::ZERO,
            key,
            slot,
        }
    }

    #[must_use]
    pub fn price(&self) -> U256 {
        self.price
    }

    /// Oldest order at this price, or `None` if the level is empty.
    #[must_use]
    pub fn head_order(&self) -> Option<OrderId> {
        self.head
    }

    /// Newest order at this price.
    #[must_use]
    pub fn tail_order(&self) -> Option<OrderId> {
        self.tail
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.length
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    #[must_use]
    pub fn volume(&self) -> U256 {
        self.volume
    }

    pub(crate) fn key(&self) -> &[u8; KEY_LEN] {
        &self.key
    }

    pub(crate) fn slot(&self) -> U256 {
        self.slot
    }

    pub(crate) fn record(&self) -> LevelRecord {
        LevelRecord {
            price: self.price,
            length: self.length as u64,
            volume: self.volume,
        }
    }

    /// Append `id` at the tail (lowest time priority).
    pub(crate) fn append(&mut self, orders: &mut OrderMap, id: OrderId) -> Result<()> {
        let quantity = {
            let node = orders.get_mut(&id).ok_or_else(|| corrupt("append: id not in order map"))?;
            node.set_prev(self.tail);
            node.set_next(None);
            node.quantity
        };
        match self.tail {
            Some(old_tail) => {
                orders
                    .get_mut(&old_tail)
                    .ok_or_else(|| corrupt("append: stale tail"))?
                    .set_next(Some(id));
            }
            None => self.head = Some(id),
        }
        self.tail = Some(id);
        self.length += 1;
        self.volume = self
            .volume
            .checked_add(quantity)
            .ok_or_else(|| corrupt("append: level volume overflow"))?;
        Ok(())
    }

    /// Unsplice `id` from the queue. Head/tail are cleared the moment the
    /// level empties.
    pub(crate) fn remove(&mut self, orders: &mut OrderMap, id: OrderId) -> Result<()> {
        let (prev, next, quantity) = {
            let node = orders.get(&id).ok_or_else(|| corrupt("remove: id not in order map"))?;
            (node.prev(), node.next(), node.quantity)
        };
        match (prev, next) {
            (Some(p), Some(n)) => {
                orders
                    .get_mut(&p)
                    .ok_or_else(|| corrupt("remove: stale prev link"))?
                    .set_next(Some(n));
                orders
                    .get_mut(&n)
                    .ok_or_else(|| corrupt("remove: stale next link"))?
                    .set_prev(Some(p));
            }
            (None, Some(n)) => {
                orders
                    .get_mut(&n)
                    .ok_or_else(|| corrupt("remove: stale next link"))?
                    .set_prev(None);
                self.head = Some(n);
            }
            (Some(p), None) => {
                orders
                    .get_mut(&p)
                    .ok_or_else(|| corrupt("remove: stale prev link"))?
                    .set_next(None);
                self.tail = Some(p);
            }
            (None, None) => {
                self.head = None;
                self.tail = None;
            }
        }
        self.length = self
            .length
            .checked_sub(1)
            .ok_or_else(|| corrupt("remove: length underflow"))?;
        self.volume = self
            .volume
            .checked_sub(quantity)
            .ok_or_else(|| corrupt("remove: level volume underflow"))?;
        Ok(())
    }

    /// Re-queue `id` at the tail without touching length or volume.
    ///
    /// Caller guarantees `id` is a member and is not already the tail.
    pub(crate) fn move_to_tail(&mut self, orders: &mut OrderMap, id: OrderId) -> Result<()> {
        debug_assert_ne!(self.tail, Some(id));
        let (prev, next) = {
            let node = orders.get(&id).ok_or_else(|| corrupt("move_to_tail: id not in order map"))?;
            (node.prev(), node.next())
        };
        let Some(next_id) = next else {
            // Already the tail; nothing to move.
            return Ok(());
        };
        match prev {
            Some(p) => {
                orders
                    .get_mut(&p)
                    .ok_or_else(|| corrupt("move_to_tail: stale prev link"))?
                    .set_next(Some(next_id));
            }
            None => self.head = Some(next_id),
        }
        orders
            .get_mut(&next_id)
            .ok_or_else(|| corrupt("move_to_tail: stale next link"))?
            .set_prev(prev);

        let old_tail = self.tail.ok_or_else(|| corrupt("move_to_tail: empty level"))?;
        orders
            .get_mut(&old_tail)
            .ok_or_else(|| corrupt("move_to_tail: stale tail"))?
            .set_next(Some(id));
        let node = orders
            .get_mut(&id)
            .ok_or_else(|| corrupt("move_to_tail: id vanished"))?;
        node.set_prev(Some(old_tail));
        node.set_next(None);
        self.tail = Some(id);
        Ok(())
    }

    /// Adjust the cached volume for an in-place quantity change.
    pub(crate) fn update_volume(&mut self, old_quantity: U256, new_quantity: U256) -> Result<()> {
        self.volume = self
            .volume
            .checked_sub(old_quantity)
            .and_then(|v| v.checked_add(new_quantity))
            .ok_or_else(|| corrupt("update_volume: level volume out of range"))?;
        Ok(())
    }

    /// Walk the queue head → tail.
    pub(crate) fn iter<'a>(&self, orders: &'a OrderMap) -> LevelOrders<'a> {
        LevelOrders {
            orders,
            cursor: self.head,
        }
    }
}

/// FIFO iterator over the orders of one price level.
pub struct LevelOrders<'a> {
    orders: &'a OrderMap,
    cursor: Option<OrderId>,
}

impl<'a> Iterator for LevelOrders<'a> {
    type Item = &'a Order;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.cursor.take()?;
        let node = self.orders.get(&id)?;
        self.cursor = node.next();
        Some(&**node)
    }
}
