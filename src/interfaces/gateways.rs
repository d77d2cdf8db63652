// ============================================================================
// Collaborator Gateways
// Trait seams for the external systems the engine consumes
// ============================================================================

use crate::domain::{Match, Order};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

// ============================================================================
// Settlement
// ============================================================================

/// Confirmation returned by a successful settlement.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SettlementReceipt {
    pub reference: String,
    pub settled_at: DateTime<Utc>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}")]
pub struct SettlementError {
    pub reason: String,
}

impl SettlementError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Performs the actual value transfer for an agreed match. The only engine
/// collaborator allowed to suspend for an unbounded time.
#[async_trait]
pub trait SettlementGateway: Send + Sync {
    async fn settle(&self, m: &Match) -> Result<SettlementReceipt, SettlementError>;

    /// Release funds reserved for a cancelled order. Failures are logged by
    /// the engine but never fail the cancellation.
    async fn release_funds(&self, _order: &Order) -> Result<(), SettlementError> {
        Ok(())
    }
}

/// Settlement stub that always succeeds with a fresh reference.
pub struct InstantSettlement;

#[async_trait]
impl SettlementGateway for InstantSettlement {
    async fn settle(&self, _m: &Match) -> Result<SettlementReceipt, SettlementError> {
        Ok(SettlementReceipt {
            reference: format!("stl-{}", Uuid::new_v4()),
            settled_at: Utc::now(),
        })
    }
}

/// Settlement stub that always fails, for dispute-path testing.
pub struct FailingSettlement {
    pub reason: String,
}

impl FailingSettlement {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl SettlementGateway for FailingSettlement {
    async fn settle(&self, _m: &Match) -> Result<SettlementReceipt, SettlementError> {
        Err(SettlementError::new(self.reason.clone()))
    }
}

// ============================================================================
// Compliance
// ============================================================================

/// Pre-trade compliance check over a candidate order pair.
/// Computationally bounded; must not perform blocking I/O.
pub trait ComplianceGateway: Send + Sync {
    fn check(&self, a: &Order, b: &Order) -> bool;
}

/// Default permissive check.
pub struct PermissiveCompliance;

impl ComplianceGateway for PermissiveCompliance {
    fn check(&self, _a: &Order, _b: &Order) -> bool {
        true
    }
}

// ============================================================================
// Customer Limits
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CustomerLimits {
    pub max_order_size: Decimal,
    pub daily_limit: Decimal,
}

impl CustomerLimits {
    pub fn new(max_order_size: Decimal, daily_limit: Decimal) -> Self {
        Self {
            max_order_size,
            daily_limit,
        }
    }
}

pub trait CustomerLimitsProvider: Send + Sync {
    fn limits(&self, customer_id: &str) -> CustomerLimits;
}

/// Fixed limits for every customer, with optional per-customer overrides.
pub struct StaticLimits {
    default: CustomerLimits,
    overrides: RwLock<HashMap<String, CustomerLimits>>,
}

impl StaticLimits {
    pub fn new(default: CustomerLimits) -> Self {
        Self {
            default,
            overrides: RwLock::new(HashMap::new()),
        }
    }

    pub fn set_override(&self, customer_id: impl Into<String>, limits: CustomerLimits) {
        self.overrides.write().insert(customer_id.into(), limits);
    }
}

impl Default for StaticLimits {
    fn default() -> Self {
        Self::new(CustomerLimits::new(
            Decimal::from(1_000_000),
            Decimal::from(10_000_000),
        ))
    }
}

impl CustomerLimitsProvider for StaticLimits {
    fn limits(&self, customer_id: &str) -> CustomerLimits {
        self.overrides
            .read()
            .get(customer_id)
            .copied()
            .unwrap_or(self.default)
    }
}

// ============================================================================
// Price Feed
// ============================================================================

/// Prevailing market price source. The engine never prices assets itself.
pub trait PriceFeed: Send + Sync {
    fn market_price(&self, asset: &str) -> Option<Decimal>;
}

/// In-memory price table.
pub struct StaticPriceFeed {
    prices: RwLock<HashMap<String, Decimal>>,
}

impl StaticPriceFeed {
    pub fn new() -> Self {
        Self {
            prices: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_price(self, asset: impl Into<String>, price: Decimal) -> Self {
        self.prices.write().insert(asset.into(), price);
        self
    }

    pub fn set_price(&self, asset: impl Into<String>, price: Decimal) {
        self.prices.write().insert(asset.into(), price);
    }
}

impl Default for StaticPriceFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl PriceFeed for StaticPriceFeed {
    fn market_price(&self, asset: &str) -> Option<Decimal> {
        self.prices.read().get(asset).copied()
    }
}
