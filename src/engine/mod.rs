// ============================================================================
// Engine Module
// Contains the core matching engine business logic
// ============================================================================

mod fees;
mod matching_engine;
mod negotiation;
mod price_priority;
mod validator;

pub mod factory;

pub use factory::MatchingEngineBuilder;
pub use fees::FeeCalculator;
pub use matching_engine::MatchingEngine;
pub use negotiation::NegotiationCoordinator;
pub use price_priority::{
    can_match, is_triggered, matchable_amount, matched_price, price_improvement, priority_score,
    within_slippage, TIME_PRIORITY_BASE,
};
pub use validator::OrderValidator;
