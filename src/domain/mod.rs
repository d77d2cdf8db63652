// ============================================================================
// Domain Models Module
// Contains all core domain entities and value objects
// ============================================================================

use rust_decimal::Decimal;

pub mod config;
pub mod negotiation;
pub mod order;
pub mod order_book;
pub mod trade;

pub use config::{EngineConfig, FeeSchedule};
pub use negotiation::{NegotiationSession, Offer, SessionStatus};
pub use order::{
    AuditEntry, Order, OrderId, OrderRequest, OrderType, ServiceTier, Side, TimeInForce,
};
pub use order_book::{BookStats, OrderBook, OrderBookSnapshot};
pub use trade::{Match, MatchId, MatchStatus};

// Re-export state machine
pub use order::state::OrderStatus;

/// Micros scale used for atomic fill counters and book ordering keys.
const MICROS_SCALE: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

pub(crate) fn decimal_to_micros(value: Decimal) -> i64 {
    use rust_decimal::prelude::ToPrimitive;
    (value * MICROS_SCALE).to_i64().unwrap_or(0)
}

pub(crate) fn micros_to_decimal(micros: i64) -> Decimal {
    Decimal::from(micros) / MICROS_SCALE
}
