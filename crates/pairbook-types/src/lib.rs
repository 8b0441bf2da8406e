//! # pairbook-types
//!
//! Shared types and errors for the **pairbook** matching engine.
//!
//! This crate is the leaf dependency of the workspace. It defines:
//!
//! - **Order model**: [`Order`], [`OrderId`], [`Side`], [`OrderKind`],
//!   [`OrderStatus`], [`Signature`]
//! - **Trade model**: [`Trade`]
//! - **Errors**: [`BookError`] with `PB_ERR_` prefix codes, and the
//!   crate-wide [`Result`] alias
//!
//! Amount types come from `alloy_primitives` ([`U256`] prices and
//! quantities, [`Address`] participants) and are re-exported for
//! convenience.

pub mod error;
pub mod order;
pub mod trade;

pub use error::{BookError, Result};
pub use order::{Order, OrderId, OrderKind, OrderStatus, Side, Signature};
pub use trade::Trade;

// Re-export the primitive value types every consumer needs.
pub use alloy_primitives::{Address, B256, U256};
