// ============================================================================
// Interfaces Module
// Contains all trait definitions and contracts
// ============================================================================

mod event_handler;
mod gateways;

pub use event_handler::{
    CollectingEventHandler, EngineEvent, EventHandler, LoggingEventHandler, NoOpEventHandler,
};
pub use gateways::{
    ComplianceGateway, CustomerLimits, CustomerLimitsProvider, FailingSettlement,
    InstantSettlement, PermissiveCompliance, PriceFeed, SettlementError, SettlementGateway,
    SettlementReceipt, StaticLimits, StaticPriceFeed,
};
