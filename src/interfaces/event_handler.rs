// ============================================================================
// Event Handler Interface
// Defines the contract for handling order, match and negotiation events
// ============================================================================

use crate::domain::{MatchId, OrderId, Side};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use uuid::Uuid;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Events emitted by the matching engine.
///
/// The engine itself performs no notification or audit I/O; callers forward
/// these to their delivery and compliance sinks.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EngineEvent {
    /// Order accepted by the engine
    OrderPlaced {
        order_id: OrderId,
        asset: String,
        side: Side,
        amount: Decimal,
        timestamp: DateTime<Utc>,
    },

    /// Order rejected with every violated check
    OrderRejected {
        order_id: OrderId,
        reasons: Vec<String>,
        timestamp: DateTime<Utc>,
    },

    /// Order opened in its asset's book
    OrderOpened {
        order_id: OrderId,
        price: Option<Decimal>,
        quantity: Decimal,
        timestamp: DateTime<Utc>,
    },

    /// Order partially filled
    OrderPartiallyFilled {
        order_id: OrderId,
        filled_quantity: Decimal,
        remaining_quantity: Decimal,
        timestamp: DateTime<Utc>,
    },

    /// Order fully filled
    OrderFilled {
        order_id: OrderId,
        total_filled: Decimal,
        average_price: Option<Decimal>,
        timestamp: DateTime<Utc>,
    },

    /// Order cancelled
    OrderCancelled {
        order_id: OrderId,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// Order expired (GTD orders)
    OrderExpired {
        order_id: OrderId,
        timestamp: DateTime<Utc>,
    },

    /// Compatible buy/sell pair found
    MatchProposed {
        match_id: MatchId,
        buy_order_id: OrderId,
        sell_order_id: OrderId,
        amount: Decimal,
        price: Decimal,
        timestamp: DateTime<Utc>,
    },

    /// Match executed against the settlement gateway
    MatchExecuted {
        match_id: MatchId,
        amount: Decimal,
        price: Decimal,
        timestamp: DateTime<Utc>,
    },

    /// Settlement confirmed
    MatchSettled {
        match_id: MatchId,
        settlement_reference: String,
        timestamp: DateTime<Utc>,
    },

    /// Match moved to the disputed terminal state
    MatchDisputed {
        match_id: MatchId,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// Block-trade negotiation room opened, both counterparties invited
    NegotiationOpened {
        match_id: MatchId,
        room_id: Uuid,
        moderator: String,
        buyer_id: String,
        seller_id: String,
        deadline: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },

    /// Offer appended to a negotiation history
    OfferSubmitted {
        match_id: MatchId,
        party: String,
        price: Decimal,
        accepted: bool,
        timestamp: DateTime<Utc>,
    },

    /// Both counterparties accepted the same price
    NegotiationAgreed {
        match_id: MatchId,
        price: Decimal,
        timestamp: DateTime<Utc>,
    },

    /// A counterparty explicitly walked away
    NegotiationRejected {
        match_id: MatchId,
        party: String,
        timestamp: DateTime<Utc>,
    },

    /// Hard negotiation window elapsed without agreement
    NegotiationTimedOut {
        match_id: MatchId,
        buyer_id: String,
        seller_id: String,
        timestamp: DateTime<Utc>,
    },
}

/// Event handler trait for processing matching engine events
/// Implementations can handle notifications, audit logging, metrics, etc.
/// Handlers are fire-and-forget: they cannot fail or block the matching path.
pub trait EventHandler: Send + Sync {
    /// Handle an engine event
    fn on_event(&self, event: EngineEvent);

    /// Batch event handler (optional optimization)
    fn on_events(&self, events: Vec<EngineEvent>) {
        for event in events {
            self.on_event(event);
        }
    }
}

/// No-op event handler for testing
pub struct NoOpEventHandler;

impl EventHandler for NoOpEventHandler {
    fn on_event(&self, _event: EngineEvent) {
        // Do nothing
    }
}

/// Logging event handler
pub struct LoggingEventHandler;

impl EventHandler for LoggingEventHandler {
    fn on_event(&self, event: EngineEvent) {
        tracing::debug!("matching engine event: {:?}", event);
    }
}

/// Collecting event handler: records every event for sequence assertions in
/// tests and demos.
#[derive(Default)]
pub struct CollectingEventHandler {
    events: Mutex<Vec<EngineEvent>>,
}

impl CollectingEventHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventHandler for CollectingEventHandler {
    fn on_event(&self, event: EngineEvent) {
        self.events.lock().push(event);
    }
}
