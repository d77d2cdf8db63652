// ============================================================================
// Fee Calculator
// Tiered commission computation for matched notional
// ============================================================================

use crate::domain::{FeeSchedule, ServiceTier};
use rust_decimal::Decimal;

/// Pure, deterministic fee computation over (notional, tier).
///
/// Determinism matters: audit replays must reproduce the exact fee that was
/// charged at match time.
pub struct FeeCalculator {
    schedule: FeeSchedule,
}

impl FeeCalculator {
    pub fn new(schedule: FeeSchedule) -> Self {
        Self { schedule }
    }

    /// Base rate as a step function of notional size: institutional,
    /// professional and retail breakpoints, larger notional paying less.
    pub fn base_rate(&self, notional: Decimal) -> Decimal {
        if notional >= self.schedule.institutional_notional {
            self.schedule.institutional_rate
        } else if notional >= self.schedule.professional_notional {
            self.schedule.professional_rate
        } else {
            self.schedule.retail_rate
        }
    }

    /// Service-tier discount applied to the base rate.
    pub fn tier_discount(&self, tier: ServiceTier) -> Decimal {
        match tier {
            ServiceTier::Standard => Decimal::ZERO,
            ServiceTier::Premium => self.schedule.premium_discount,
            ServiceTier::Institutional => self.schedule.institutional_discount,
        }
    }

    /// Effective commission rate after tier discount.
    pub fn commission_rate(&self, notional: Decimal, tier: ServiceTier) -> Decimal {
        self.base_rate(notional) * (Decimal::ONE - self.tier_discount(tier))
    }

    /// Fee for a notional at a tier, with the minimum-fee floor applied
    /// after the discount.
    pub fn compute_fee(&self, notional: Decimal, tier: ServiceTier) -> Decimal {
        let fee = notional * self.commission_rate(notional, tier);
        fee.max(self.schedule.minimum_fee)
    }
}
