// ============================================================================
// Engine Configuration
// ============================================================================

use rust_decimal::Decimal;
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

// ============================================================================
// Fee Schedule
// ============================================================================

/// Tiered fee schedule. The base rate is a step function of notional size
/// (larger notional, lower rate), reduced further by a service-tier discount,
/// with a fixed minimum fee applied after discount.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FeeSchedule {
    /// Base rate below the professional breakpoint.
    pub retail_rate: Decimal,
    /// Base rate from the professional breakpoint up.
    pub professional_rate: Decimal,
    /// Base rate from the institutional breakpoint up.
    pub institutional_rate: Decimal,
    pub professional_notional: Decimal,
    pub institutional_notional: Decimal,
    /// Discount for Premium customers (fraction of the base rate).
    pub premium_discount: Decimal,
    /// Discount for Institutional customers.
    pub institutional_discount: Decimal,
    /// Floor applied after discount.
    pub minimum_fee: Decimal,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            retail_rate: Decimal::new(50, 4),         // 0.50%
            professional_rate: Decimal::new(35, 4),   // 0.35%
            institutional_rate: Decimal::new(20, 4),  // 0.20%
            professional_notional: Decimal::from(100_000),
            institutional_notional: Decimal::from(1_000_000),
            premium_discount: Decimal::new(15, 2),        // 15%
            institutional_discount: Decimal::new(30, 2),  // 30%
            minimum_fee: Decimal::ONE,
        }
    }
}

impl FeeSchedule {
    pub fn validate(&self) -> Result<(), String> {
        for (name, rate) in [
            ("retail", self.retail_rate),
            ("professional", self.professional_rate),
            ("institutional", self.institutional_rate),
        ] {
            if rate <= Decimal::ZERO || rate >= Decimal::ONE {
                return Err(format!("{} rate must be between 0 and 1", name));
            }
        }
        if self.institutional_rate > self.professional_rate
            || self.professional_rate > self.retail_rate
        {
            return Err("base rates must not increase with notional".to_string());
        }
        if self.professional_notional <= Decimal::ZERO
            || self.institutional_notional <= self.professional_notional
        {
            return Err("notional breakpoints must be positive and ascending".to_string());
        }
        for (name, discount) in [
            ("premium", self.premium_discount),
            ("institutional", self.institutional_discount),
        ] {
            if discount < Decimal::ZERO || discount >= Decimal::ONE {
                return Err(format!("{} discount must be in [0, 1)", name));
            }
        }
        if self.premium_discount > self.institutional_discount {
            return Err("tier discounts must not decrease with tier".to_string());
        }
        if self.minimum_fee < Decimal::ZERO {
            return Err("minimum fee cannot be negative".to_string());
        }
        Ok(())
    }
}

// ============================================================================
// Engine Configuration
// ============================================================================

/// Complete configuration for a matching engine instance.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EngineConfig {
    /// Interval of the background matching sweep across all books.
    pub sweep_interval: Duration,
    /// Hard window after which an unagreed negotiation is forced to disputed.
    pub negotiation_timeout: Duration,
    /// Minimum amount for standard orders.
    pub min_order_size: Decimal,
    /// Minimum amount for OTC block orders; materially higher than the
    /// standard minimum since blocks are reserved for large notional.
    pub min_block_size: Decimal,
    /// Moderator assigned to newly opened negotiation rooms.
    pub moderator: String,
    pub fee_schedule: FeeSchedule,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(1),
            negotiation_timeout: Duration::from_secs(30 * 60),
            min_order_size: Decimal::ONE,
            min_block_size: Decimal::from(10_000),
            moderator: "desk-moderator".to_string(),
            fee_schedule: FeeSchedule::default(),
        }
    }
}

impl EngineConfig {
    /// Builder method: Set the background sweep interval
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Builder method: Set the negotiation timeout window
    pub fn with_negotiation_timeout(mut self, timeout: Duration) -> Self {
        self.negotiation_timeout = timeout;
        self
    }

    /// Builder method: Set the standard minimum order size
    pub fn with_min_order_size(mut self, size: Decimal) -> Self {
        self.min_order_size = size;
        self
    }

    /// Builder method: Set the OTC block minimum size
    pub fn with_min_block_size(mut self, size: Decimal) -> Self {
        self.min_block_size = size;
        self
    }

    /// Builder method: Set the negotiation room moderator
    pub fn with_moderator(mut self, moderator: impl Into<String>) -> Self {
        self.moderator = moderator.into();
        self
    }

    /// Builder method: Set the fee schedule
    pub fn with_fee_schedule(mut self, schedule: FeeSchedule) -> Self {
        self.fee_schedule = schedule;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.sweep_interval.is_zero() {
            return Err("sweep interval must be positive".to_string());
        }
        if self.negotiation_timeout.is_zero() {
            return Err("negotiation timeout must be positive".to_string());
        }
        if self.min_order_size <= Decimal::ZERO {
            return Err("minimum order size must be positive".to_string());
        }
        if self.min_block_size <= self.min_order_size {
            return Err("block minimum must exceed the standard minimum".to_string());
        }
        if self.moderator.is_empty() {
            return Err("moderator cannot be empty".to_string());
        }
        self.fee_schedule.validate()
    }
}

// ============================================================================
// Preset Configurations
// ============================================================================

impl EngineConfig {
    /// High-touch desk preset
    /// - Larger block minimum, longer negotiation window
    /// - Slower sweep, suited to low-frequency large-notional flow
    pub fn high_touch_desk() -> Self {
        Self::default()
            .with_min_block_size(Decimal::from(100_000))
            .with_negotiation_timeout(Duration::from_secs(45 * 60))
            .with_sweep_interval(Duration::from_secs(5))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
        assert!(EngineConfig::high_touch_desk().validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = EngineConfig::default()
            .with_sweep_interval(Duration::from_millis(250))
            .with_moderator("otc-desk-1");

        assert_eq!(config.sweep_interval, Duration::from_millis(250));
        assert_eq!(config.moderator, "otc-desk-1");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_block_minimum_must_exceed_standard() {
        let config = EngineConfig::default().with_min_block_size(Decimal::ONE);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_fee_schedule_rejects_inverted_rates() {
        let schedule = FeeSchedule {
            institutional_rate: Decimal::new(60, 4),
            ..FeeSchedule::default()
        };
        assert!(schedule.validate().is_err());
    }

    #[test]
    fn test_fee_schedule_rejects_inverted_breakpoints() {
        let schedule = FeeSchedule {
            institutional_notional: Decimal::from(50_000),
            ..FeeSchedule::default()
        };
        assert!(schedule.validate().is_err());
    }
}
