// ============================================================================
// Order Validator
// Stateless pre-book checks on a proposed order
// ============================================================================

use crate::domain::{EngineConfig, OrderRequest, OrderType};
use crate::interfaces::CustomerLimits;
use rust_decimal::Decimal;
use smallvec::SmallVec;

/// Validates order requests before they enter a book.
///
/// Every check runs and every failure is accumulated, so the caller sees all
/// violations at once instead of fixing them one resubmission at a time.
pub struct OrderValidator {
    min_order_size: Decimal,
    min_block_size: Decimal,
}

impl OrderValidator {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            min_order_size: config.min_order_size,
            min_block_size: config.min_block_size,
        }
    }

    pub fn validate(
        &self,
        request: &OrderRequest,
        limits: &CustomerLimits,
    ) -> Result<(), Vec<String>> {
        let mut reasons: SmallVec<[String; 4]> = SmallVec::new();

        if request.amount <= Decimal::ZERO {
            reasons.push("amount must be positive".to_string());
        }

        match request.limit_price {
            Some(price) if price <= Decimal::ZERO => {
                reasons.push("limit price must be positive".to_string());
            },
            None if matches!(
                request.order_type,
                OrderType::Limit | OrderType::Iceberg { .. } | OrderType::StopLoss { .. }
            ) =>
            {
                reasons.push("limit orders must have a price".to_string());
            },
            _ => {},
        }

        // Blocks are reserved for large notional; their minimum is materially
        // higher than the standard one.
        let minimum = match request.order_type {
            OrderType::OtcBlock => self.min_block_size,
            _ => self.min_order_size,
        };
        if request.amount < minimum {
            reasons.push(format!(
                "amount {} below the minimum {} for this order type",
                request.amount, minimum
            ));
        }

        if request.amount > limits.max_order_size {
            reasons.push(format!(
                "amount {} exceeds the customer maximum order size {}",
                request.amount, limits.max_order_size
            ));
        }

        // Balance debits are a settlement concern; here only a sanity bound
        if request.amount > limits.daily_limit {
            reasons.push(format!(
                "amount {} exceeds the customer daily limit {}",
                request.amount, limits.daily_limit
            ));
        }

        if let OrderType::Iceberg { display_quantity } = request.order_type {
            if display_quantity <= Decimal::ZERO || display_quantity > request.amount {
                reasons.push("iceberg display quantity must be positive and at most the total amount".to_string());
            }
        }

        if let Some(min_fill) = request.min_fill_size {
            if min_fill <= Decimal::ZERO || min_fill > request.amount {
                reasons.push("minimum fill size must be positive and at most the amount".to_string());
            }
        }

        if let Some(slippage) = request.max_slippage {
            if slippage < Decimal::ZERO {
                reasons.push("maximum slippage cannot be negative".to_string());
            }
        }

        if reasons.is_empty() {
            Ok(())
        } else {
            Err(reasons.into_vec())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Side;

    fn validator() -> OrderValidator {
        OrderValidator::new(&EngineConfig::default())
    }

    fn limits() -> CustomerLimits {
        CustomerLimits::new(Decimal::from(100_000), Decimal::from(500_000))
    }

    #[test]
    fn test_valid_limit_order_passes() {
        let request = OrderRequest::new("c", "USDC", Side::Buy, OrderType::Limit, Decimal::from(100))
            .with_limit_price(Decimal::ONE);
        assert!(validator().validate(&request, &limits()).is_ok());
    }

    #[test]
    fn test_all_failures_accumulate() {
        // Negative amount, missing price: both reported at once
        let request =
            OrderRequest::new("c", "USDC", Side::Buy, OrderType::Limit, Decimal::from(-5));
        let reasons = validator().validate(&request, &limits()).unwrap_err();
        assert!(reasons.len() >= 3);
        assert!(reasons.iter().any(|r| r.contains("positive")));
        assert!(reasons.iter().any(|r| r.contains("must have a price")));
    }

    #[test]
    fn test_block_minimum_is_higher() {
        let small_block =
            OrderRequest::new("c", "USDC", Side::Buy, OrderType::OtcBlock, Decimal::from(500));
        let reasons = validator().validate(&small_block, &limits()).unwrap_err();
        assert!(reasons.iter().any(|r| r.contains("below the minimum")));

        // Same amount is fine as a plain limit order
        let limit = OrderRequest::new("c", "USDC", Side::Buy, OrderType::Limit, Decimal::from(500))
            .with_limit_price(Decimal::ONE);
        assert!(validator().validate(&limit, &limits()).is_ok());
    }

    #[test]
    fn test_tier_maximum_enforced() {
        let request =
            OrderRequest::new("c", "USDC", Side::Sell, OrderType::Limit, Decimal::from(200_000))
                .with_limit_price(Decimal::ONE);
        let reasons = validator().validate(&request, &limits()).unwrap_err();
        assert!(reasons.iter().any(|r| r.contains("maximum order size")));
    }

    #[test]
    fn test_market_order_needs_no_price() {
        let request =
            OrderRequest::new("c", "USDC", Side::Buy, OrderType::Market, Decimal::from(100));
        assert!(validator().validate(&request, &limits()).is_ok());
    }

    #[test]
    fn test_iceberg_display_bounds() {
        let request = OrderRequest::new(
            "c",
            "USDC",
            Side::Sell,
            OrderType::Iceberg {
                display_quantity: Decimal::from(500),
            },
            Decimal::from(100),
        )
        .with_limit_price(Decimal::ONE);
        let reasons = validator().validate(&request, &limits()).unwrap_err();
        assert!(reasons.iter().any(|r| r.contains("display quantity")));
    }

    #[test]
    fn test_min_fill_bounds() {
        let request = OrderRequest::new("c", "USDC", Side::Buy, OrderType::Limit, Decimal::from(100))
            .with_limit_price(Decimal::ONE)
            .with_min_fill_size(Decimal::from(200));
        let reasons = validator().validate(&request, &limits()).unwrap_err();
        assert!(reasons.iter().any(|r| r.contains("minimum fill size")));
    }
}
