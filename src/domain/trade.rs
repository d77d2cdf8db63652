// ============================================================================
// Match Domain Model
// ============================================================================

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::{Order, OrderId};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MatchId(Uuid);

impl MatchId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for MatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// Match Status
// ============================================================================

/// Match lifecycle. Block trades pass through `Negotiating`; everything else
/// goes straight from `Proposed` to execution. `Disputed` is terminal and the
/// engine stops mutating a disputed match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MatchStatus {
    Proposed,
    Negotiating,
    Agreed,
    Executed,
    Settled,
    Disputed,
}

impl MatchStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, MatchStatus::Settled | MatchStatus::Disputed)
    }
}

// ============================================================================
// Match Record
// ============================================================================

/// Pairing of exactly one buy and one sell order.
///
/// Orders are referenced by id, never by pointer, so either side can be
/// independently cancelled and reconciled against the ledger afterwards.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Match {
    pub id: MatchId,
    pub asset: String,
    pub buy_order_id: OrderId,
    pub sell_order_id: OrderId,
    pub buyer_id: String,
    pub seller_id: String,

    pub amount: Decimal,
    pub price: Decimal,
    /// Signed distance from the prevailing market price, clamped to be
    /// non-negative in the taker's favor.
    pub price_improvement: Decimal,
    pub buyer_fee: Decimal,
    pub seller_fee: Decimal,

    pub status: MatchStatus,
    pub created_at: DateTime<Utc>,
    pub executed_at: Option<DateTime<Utc>>,
    pub settled_at: Option<DateTime<Utc>>,
    pub settlement_reference: Option<String>,
}

impl Match {
    pub fn proposed(
        buy: &Order,
        sell: &Order,
        amount: Decimal,
        price: Decimal,
        price_improvement: Decimal,
        buyer_fee: Decimal,
        seller_fee: Decimal,
    ) -> Self {
        Self {
            id: MatchId::new(),
            asset: (*buy.asset).clone(),
            buy_order_id: buy.id,
            sell_order_id: sell.id,
            buyer_id: (*buy.customer_id).clone(),
            seller_id: (*sell.customer_id).clone(),
            amount,
            price,
            price_improvement,
            buyer_fee,
            seller_fee,
            status: MatchStatus::Proposed,
            created_at: Utc::now(),
            executed_at: None,
            settled_at: None,
            settlement_reference: None,
        }
    }

    /// Total value changing hands, excluding fees.
    pub fn notional_value(&self) -> Decimal {
        self.price * self.amount
    }

    pub fn involves_order(&self, order_id: &OrderId) -> bool {
        self.buy_order_id == *order_id || self.sell_order_id == *order_id
    }

    pub fn is_counterparty(&self, customer_id: &str) -> bool {
        self.buyer_id == customer_id || self.seller_id == customer_id
    }

    pub fn mark_executed(&mut self) {
        self.status = MatchStatus::Executed;
        self.executed_at = Some(Utc::now());
    }

    pub fn mark_settled(&mut self, reference: impl Into<String>) {
        self.status = MatchStatus::Settled;
        self.settled_at = Some(Utc::now());
        self.settlement_reference = Some(reference.into());
    }

    pub fn mark_disputed(&mut self) {
        self.status = MatchStatus::Disputed;
    }
}
