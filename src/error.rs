// ============================================================================
// Engine Errors
// Error taxonomy for order placement, cancellation and negotiation
// ============================================================================

use crate::domain::{MatchId, OrderId, OrderStatus};
use thiserror::Error;

/// Errors surfaced by the matching engine.
///
/// A failed match attempt is deliberately *not* represented here: an order
/// that finds no counterparty simply rests in the book. Disputes are terminal
/// from the engine's perspective; resolution happens outside.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Order failed validation and never entered the book.
    /// Carries every violated check, not just the first one.
    #[error("order rejected: {}", reasons.join("; "))]
    Rejected { reasons: Vec<String> },

    /// No order with this id is known to the engine.
    #[error("unknown order: {order_id}")]
    UnknownOrder { order_id: OrderId },

    /// No book exists for this asset.
    #[error("unknown asset: {asset}")]
    UnknownAsset { asset: String },

    /// Cancellation requested for an order that is terminal or mid-match.
    /// Reported as a no-op failure so a match already in settlement is
    /// never torn.
    #[error("cannot cancel order {order_id} in status {status:?}")]
    CancellationConflict {
        order_id: OrderId,
        status: OrderStatus,
    },

    /// Settlement gateway reported failure; the match moved to disputed and
    /// the orders were left in their pre-fill state for manual recovery.
    #[error("settlement failed for match {match_id}: {reason}")]
    SettlementFailed { match_id: MatchId, reason: String },

    /// No negotiation session is open for this match.
    #[error("no open negotiation for match {match_id}")]
    NegotiationClosed { match_id: MatchId },

    /// Offer or acceptance from a customer that is not a counterparty of
    /// the negotiated match.
    #[error("{party} is not a counterparty of match {match_id}")]
    UnknownParty { match_id: MatchId, party: String },
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_lists_every_reason() {
        let err = EngineError::Rejected {
            reasons: vec!["amount below minimum".to_string(), "over tier limit".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "order rejected: amount below minimum; over tier limit"
        );
    }

    #[test]
    fn test_error_equality() {
        let asset = EngineError::UnknownAsset {
            asset: "USDC".to_string(),
        };
        assert_eq!(
            asset,
            EngineError::UnknownAsset {
                asset: "USDC".to_string()
            }
        );
    }
}
