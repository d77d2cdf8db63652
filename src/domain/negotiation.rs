// ============================================================================
// Negotiation Session Domain Model
// ============================================================================

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::MatchId;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

// ============================================================================
// Session Status
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SessionStatus {
    Open,
    Agreed,
    Rejected,
    TimedOut,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::Open)
    }
}

// ============================================================================
// Offers
// ============================================================================

/// One entry in the append-only negotiation history.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Offer {
    pub party: String,
    pub price: Decimal,
    pub accepted: bool,
    pub timestamp: DateTime<Utc>,
}

// ============================================================================
// Negotiation Session
// ============================================================================

/// Multi-party negotiation attached to a block-trade match.
///
/// The session is a pure record: offers append, acceptance is derived from
/// the history, and the coordinator drives status transitions and the hard
/// deadline.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NegotiationSession {
    pub room_id: Uuid,
    pub match_id: MatchId,
    pub moderator: String,
    pub buyer_id: String,
    pub seller_id: String,
    pub offers: Vec<Offer>,
    pub status: SessionStatus,
    pub agreed_price: Option<Decimal>,
    pub opened_at: DateTime<Utc>,
    /// Hard deadline; the session force-closes to disputed past it.
    pub deadline: DateTime<Utc>,
}

impl NegotiationSession {
    pub fn open(
        match_id: MatchId,
        moderator: impl Into<String>,
        buyer_id: impl Into<String>,
        seller_id: impl Into<String>,
        deadline: DateTime<Utc>,
    ) -> Self {
        Self {
            room_id: Uuid::new_v4(),
            match_id,
            moderator: moderator.into(),
            buyer_id: buyer_id.into(),
            seller_id: seller_id.into(),
            offers: Vec::new(),
            status: SessionStatus::Open,
            agreed_price: None,
            opened_at: Utc::now(),
            deadline,
        }
    }

    pub fn is_counterparty(&self, party: &str) -> bool {
        self.buyer_id == party || self.seller_id == party
    }

    pub fn record_offer(&mut self, party: impl Into<String>, price: Decimal, accepted: bool) {
        self.offers.push(Offer {
            party: party.into(),
            price,
            accepted,
            timestamp: Utc::now(),
        });
    }

    /// Whether `party` has an accepted offer at exactly `price`.
    pub fn has_accepted(&self, party: &str, price: Decimal) -> bool {
        self.offers
            .iter()
            .any(|offer| offer.party == party && offer.price == price && offer.accepted)
    }

    /// Agreement requires both counterparties to have explicitly accepted
    /// the same price.
    pub fn is_agreed_at(&self, price: Decimal) -> bool {
        self.has_accepted(&self.buyer_id, price) && self.has_accepted(&self.seller_id, price)
    }

    pub fn is_past_deadline(&self, now: DateTime<Utc>) -> bool {
        now >= self.deadline
    }
}
