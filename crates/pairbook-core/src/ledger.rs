//! Persistence sink and the slot/key scheme of the ledger.
//!
//! The book commits every transition in memory first, then hands opaque
//! records to a [`BookStore`]. Keys follow the historical slot layout:
//! each side derives a 256-bit slot from the hash of its key, each price
//! level lives at `side_slot + price` (truncated to a 20-byte key), and
//! each order lives at `level_slot + order_id`. Records are canonical JSON
//! documents of the entity's essential attributes; queue links are never
//! serialized and are rebuilt on replay.

use std::collections::HashMap;

use alloy_primitives::U256;
use parking_lot::RwLock;
use pairbook_types::{BookError, Result, Side};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Width of a ledger key in bytes.
pub const KEY_LEN: usize = 20;

/// Opaque key/value sink the book writes through.
///
/// Implementations must not block the matching path; the book's in-memory
/// state is already committed when `put` is invoked, so a failure surfaces
/// as [`BookError::Persistence`] without rolling anything back.
pub trait BookStore: Send + Sync {
    fn put(&self, key: &[u8], value: &[u8]) -> Result<()>;
}

/// Discards every record. The default sink.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStore;

impl BookStore for NoopStore {
    fn put(&self, _key: &[u8], _value: &[u8]) -> Result<()> {
        Ok(())
    }
}

/// In-memory sink for tests and replay experiments.
#[derive(Debug, Default)]
pub struct MemStore {
    entries: RwLock<HashMap<Vec<u8>, Vec<u8>>>,
}

impl MemStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.entries.read().get(key).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl BookStore for MemStore {
    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.entries.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Key derivation
// ---------------------------------------------------------------------------

/// The book's own ledger key: the raw pair name.
#[must_use]
pub fn book_key(pair: &str) -> Vec<u8> {
    pair.as_bytes().to_vec()
}

/// A side's ledger key, e.g. `BTC/USDT/BUY`.
#[must_use]
pub fn side_key(pair: &str, side: Side) -> Vec<u8> {
    format!("{pair}/{side}").into_bytes()
}

/// The 256-bit slot a key hashes to.
#[must_use]
pub fn slot_of(key: &[u8]) -> U256 {
    let digest = Sha256::digest(key);
    U256::from_be_slice(digest.as_slice())
}

/// The fixed-width key at `slot + offset`, big-endian, wrapping.
#[must_use]
pub fn key_at(slot: U256, offset: U256) -> [u8; KEY_LEN] {
    let sum = slot.wrapping_add(offset).to_be_bytes::<32>();
    let mut key = [0u8; KEY_LEN];
    key.copy_from_slice(&sum[32 - KEY_LEN..]);
    key
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Aggregate snapshot of one price level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelRecord {
    pub price: U256,
    pub length: u64,
    pub volume: U256,
}

/// Aggregate snapshot of one side of the book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideRecord {
    pub side: Side,
    pub volume: U256,
    pub num_orders: u64,
    pub depth: u64,
}

/// Aggregate snapshot of the whole book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookRecord {
    pub pair: String,
    pub time: u64,
    pub next_order_id: u64,
}

/// Canonical record encoding. Order records encode the [`pairbook_types::Order`]
/// itself, which carries no queue links.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(BookError::from)
}
