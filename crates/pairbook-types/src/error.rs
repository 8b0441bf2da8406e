//! Error types for the pairbook matching engine.
//!
//! All errors use the `PB_ERR_` prefix convention for easy grepping in logs:
//! - 1xx: lookup errors
//! - 5xx: book integrity errors
//! - 9xx: serialization / persistence errors

use alloy_primitives::U256;
use thiserror::Error;

use crate::OrderId;

/// Central error enum for all pairbook operations.
#[derive(Debug, Error)]
pub enum BookError {
    /// No resting order with this id on the addressed side.
    ///
    /// Surfaced by the side-book lookups; the public `cancel`/`modify`
    /// entry points translate it into a silent no-op.
    #[error("PB_ERR_100: order not found: {0}")]
    OrderNotFound(OrderId),

    /// No price level at this price on the addressed side.
    #[error("PB_ERR_101: price level not found: {0}")]
    PriceNotFound(U256),

    /// Aggregate counters and the underlying structures disagree.
    /// The book cannot continue after this.
    #[error("PB_ERR_500: book invariant violated: {reason}")]
    Invariant { reason: String },

    /// A ledger record failed to encode.
    #[error("PB_ERR_900: record encoding failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The persistence sink rejected a write. The in-memory transition has
    /// already been committed when this surfaces.
    #[error("PB_ERR_901: persistence sink failed: {reason}")]
    Persistence { reason: String },
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, BookError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_contains_prefix() {
        let err = BookError::OrderNotFound(OrderId(7));
        let msg = format!("{err}");
        assert!(msg.starts_with("PB_ERR_100"), "got: {msg}");
        assert!(msg.contains('7'));
    }

    #[test]
    fn all_errors_have_pb_err_prefix() {
        let errors: Vec<BookError> = vec![
            BookError::OrderNotFound(OrderId(1)),
            BookError::PriceNotFound(U256::from(100)),
            BookError::Invariant {
                reason: "test".into(),
            },
            BookError::Persistence {
                reason: "test".into(),
            },
        ];
        for err in errors {
            let msg = format!("{err}");
            assert!(msg.starts_with("PB_ERR_"), "error missing prefix: {msg}");
        }
    }
}
