// ============================================================================
// Engine Factory
// Builds matching engines with injected collaborators
// ============================================================================

use crate::domain::EngineConfig;
use crate::engine::MatchingEngine;
use crate::interfaces::{
    ComplianceGateway, CustomerLimitsProvider, EventHandler, InstantSettlement, NoOpEventHandler,
    PermissiveCompliance, PriceFeed, SettlementGateway, StaticLimits, StaticPriceFeed,
};
use std::sync::Arc;

/// Builder for matching engines with fluent collaborator injection.
///
/// Every collaborator defaults to a permissive in-memory implementation, so
/// tests and demos only override what they exercise.
///
/// # Example
/// ```
/// use otc_engine::prelude::*;
/// use std::sync::Arc;
///
/// let engine = MatchingEngineBuilder::new()
///     .with_config(EngineConfig::default())
///     .with_event_handler(Arc::new(LoggingEventHandler))
///     .build()
///     .unwrap();
/// ```
pub struct MatchingEngineBuilder {
    config: EngineConfig,
    settlement: Arc<dyn SettlementGateway>,
    compliance: Arc<dyn ComplianceGateway>,
    limits: Arc<dyn CustomerLimitsProvider>,
    price_feed: Arc<dyn PriceFeed>,
    event_handler: Arc<dyn EventHandler>,
}

impl MatchingEngineBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            settlement: Arc::new(InstantSettlement),
            compliance: Arc::new(PermissiveCompliance),
            limits: Arc::new(StaticLimits::default()),
            price_feed: Arc::new(StaticPriceFeed::new()),
            event_handler: Arc::new(NoOpEventHandler),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_settlement(mut self, settlement: Arc<dyn SettlementGateway>) -> Self {
        self.settlement = settlement;
        self
    }

    pub fn with_compliance(mut self, compliance: Arc<dyn ComplianceGateway>) -> Self {
        self.compliance = compliance;
        self
    }

    pub fn with_limits(mut self, limits: Arc<dyn CustomerLimitsProvider>) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_price_feed(mut self, price_feed: Arc<dyn PriceFeed>) -> Self {
        self.price_feed = price_feed;
        self
    }

    pub fn with_event_handler(mut self, event_handler: Arc<dyn EventHandler>) -> Self {
        self.event_handler = event_handler;
        self
    }

    /// Validate the configuration and build the engine.
    pub fn build(self) -> Result<Arc<MatchingEngine>, String> {
        self.config.validate()?;
        Ok(Arc::new(MatchingEngine::new(
            self.config,
            self.settlement,
            self.compliance,
            self.limits,
            self.price_feed,
            self.event_handler,
        )))
    }
}

impl Default for MatchingEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_defaults_build() {
        assert!(MatchingEngineBuilder::new().build().is_ok());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = EngineConfig::default().with_min_block_size(Decimal::ONE);
        let result = MatchingEngineBuilder::new().with_config(config).build();
        assert!(result.is_err());
    }
}
