// ============================================================================
// Price/Priority/Time Matching Policy
// Candidate compatibility and pricing for the OTC book
// ============================================================================

use crate::domain::{Order, Side};
use crate::interfaces::ComplianceGateway;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Fixed time-priority constant added to every score so small orders are
/// never starved outright.
pub const TIME_PRIORITY_BASE: i64 = 10;

/// Size divisor for the priority score's size component.
const SIZE_UNIT: i64 = 10_000;

/// Cap on the size component.
const SIZE_COMPONENT_CAP: i64 = 100;

/// Priority score: rewards service tier and order size, with a fixed base.
///
/// score = tier_weight * 100 + min(100, amount / 10_000) + 10
pub fn priority_score(tier: crate::domain::ServiceTier, amount: Decimal) -> i64 {
    let size_component = (amount / Decimal::from(SIZE_UNIT))
        .to_i64()
        .unwrap_or(0)
        .clamp(0, SIZE_COMPONENT_CAP);
    tier.weight() * 100 + size_component + TIME_PRIORITY_BASE
}

/// Whether the buy side's willingness covers the sell side's ask.
/// A missing price (market order) always crosses.
pub fn prices_cross(buy: &Order, sell: &Order) -> bool {
    match (buy.limit_price, sell.limit_price) {
        (Some(bid), Some(ask)) => bid >= ask,
        _ => true,
    }
}

/// The amount a pairing would execute: the smaller remaining side.
pub fn matchable_amount(a: &Order, b: &Order) -> Decimal {
    a.remaining_amount().min(b.remaining_amount())
}

/// Full compatibility check for a candidate pair.
///
/// Covers asset and side orientation, live statuses, the price cross,
/// both orders' partial-fill policy and minimum fill sizes, the wash-trade
/// guard, and the pluggable compliance hook.
pub fn can_match(a: &Order, b: &Order, compliance: &dyn ComplianceGateway) -> bool {
    if a.asset != b.asset || a.side == b.side {
        return false;
    }
    if !a.status().is_matchable() || !b.status().is_matchable() {
        return false;
    }

    let (buy, sell) = match a.side {
        Side::Buy => (a, b),
        Side::Sell => (b, a),
    };
    if !prices_cross(buy, sell) {
        return false;
    }

    let amount = matchable_amount(a, b);
    if amount <= Decimal::ZERO {
        return false;
    }
    // An order that disallows partial fills only matches when the
    // counterparty covers its full remaining amount.
    if !a.allows_partial_fill() && amount < a.remaining_amount() {
        return false;
    }
    if !b.allows_partial_fill() && amount < b.remaining_amount() {
        return false;
    }
    if let Some(min_fill) = a.min_fill_size {
        if amount < min_fill {
            return false;
        }
    }
    if let Some(min_fill) = b.min_fill_size {
        if amount < min_fill {
            return false;
        }
    }

    // Wash-trade guard: both legs from one customer never match
    if a.customer_id == b.customer_id {
        return false;
    }

    compliance.check(a, b)
}

/// Execution price for a compatible pair.
///
/// Market against limit executes at the limit side's price; limit against
/// limit at the midpoint of the two; market against market falls back to the
/// prevailing market price.
pub fn matched_price(a: &Order, b: &Order, market_price: Option<Decimal>) -> Option<Decimal> {
    match (a.limit_price, b.limit_price) {
        (Some(x), Some(y)) => Some((x + y) / Decimal::from(2)),
        (Some(p), None) | (None, Some(p)) => Some(p),
        (None, None) => market_price,
    }
}

/// Distance from the prevailing market price in the taker's favor, clamped
/// to zero when the execution is at or through the market.
pub fn price_improvement(
    taker_side: Side,
    execution_price: Decimal,
    market_price: Option<Decimal>,
) -> Decimal {
    let Some(market) = market_price else {
        return Decimal::ZERO;
    };
    let improvement = match taker_side {
        Side::Buy => market - execution_price,
        Side::Sell => execution_price - market,
    };
    improvement.max(Decimal::ZERO)
}

/// Whether a stop-loss order has been armed by the prevailing market price.
/// Non-stop orders are always active; a stop with no market price available
/// stays dormant.
pub fn is_triggered(order: &Order, market_price: Option<Decimal>) -> bool {
    let crate::domain::OrderType::StopLoss { trigger_price } = order.order_type else {
        return true;
    };
    let Some(market) = market_price else {
        return false;
    };
    match order.side {
        // A sell stop arms once the market falls to the trigger
        Side::Sell => market <= trigger_price,
        // A buy stop arms once the market rises to the trigger
        Side::Buy => market >= trigger_price,
    }
}

/// Whether an execution price honors an order's slippage bound against the
/// prevailing market price. Unbounded orders always pass.
pub fn within_slippage(order: &Order, execution_price: Decimal, market_price: Option<Decimal>) -> bool {
    let (Some(max_slippage), Some(market)) = (order.max_slippage, market_price) else {
        return true;
    };
    (execution_price - market).abs() <= max_slippage
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OrderRequest, OrderStatus, OrderType, ServiceTier};
    use crate::interfaces::PermissiveCompliance;

    fn open_order(customer: &str, side: Side, order_type: OrderType, amount: i64) -> Order {
        let request =
            OrderRequest::new(customer, "USDC", side, order_type, Decimal::from(amount));
        let order = Order::from_request(&request, 110, Decimal::ZERO, 0);
        order.set_status(OrderStatus::Open);
        order
    }

    fn open_limit(customer: &str, side: Side, amount: i64, price: i64) -> Order {
        let request =
            OrderRequest::new(customer, "USDC", side, OrderType::Limit, Decimal::from(amount))
                .with_limit_price(Decimal::from(price));
        let order = Order::from_request(&request, 110, Decimal::ZERO, 0);
        order.set_status(OrderStatus::Open);
        order
    }

    #[test]
    fn test_priority_score_components() {
        // Standard tier, negligible size: weight*100 + 0 + base
        assert_eq!(priority_score(ServiceTier::Standard, Decimal::from(100)), 110);
        // Institutional tier
        assert_eq!(
            priority_score(ServiceTier::Institutional, Decimal::from(100)),
            310
        );
        // Size component: 50_000 / 10_000 = 5
        assert_eq!(
            priority_score(ServiceTier::Standard, Decimal::from(50_000)),
            115
        );
        // Size component caps at 100
        assert_eq!(
            priority_score(ServiceTier::Standard, Decimal::from(100_000_000)),
            210
        );
    }

    #[test]
    fn test_limit_orders_cross_when_bid_covers_ask() {
        let compliance = PermissiveCompliance;
        let buy = open_limit("alice", Side::Buy, 100, 101);
        let sell = open_limit("bob", Side::Sell, 100, 100);
        assert!(can_match(&buy, &sell, &compliance));

        let cheap_buy = open_limit("alice", Side::Buy, 100, 99);
        assert!(!can_match(&cheap_buy, &sell, &compliance));
    }

    #[test]
    fn test_same_side_and_asset_mismatch_rejected() {
        let compliance = PermissiveCompliance;
        let a = open_limit("alice", Side::Buy, 100, 100);
        let b = open_limit("bob", Side::Buy, 100, 100);
        assert!(!can_match(&a, &b, &compliance));

        let mut request =
            OrderRequest::new("bob", "EURX", Side::Sell, OrderType::Limit, Decimal::from(100));
        request.limit_price = Some(Decimal::from(100));
        let other_asset = Order::from_request(&request, 110, Decimal::ZERO, 0);
        other_asset.set_status(OrderStatus::Open);
        assert!(!can_match(&a, &other_asset, &compliance));
    }

    #[test]
    fn test_wash_trade_guard() {
        // Two orders from one customer, opposite sides, crossing prices
        let compliance = PermissiveCompliance;
        let buy = open_limit("alice", Side::Buy, 100, 100);
        let sell = open_limit("alice", Side::Sell, 100, 100);
        assert!(!can_match(&buy, &sell, &compliance));
    }

    #[test]
    fn test_no_partial_fill_requires_full_cover() {
        let compliance = PermissiveCompliance;
        let all_or_nothing = open_order("alice", Side::Buy, OrderType::AllOrNothing, 100);
        let small_sell = open_limit("bob", Side::Sell, 40, 1);
        // market-style AON buy has no price; cross passes, size policy fails
        assert!(!can_match(&all_or_nothing, &small_sell, &compliance));

        let covering_sell = open_limit("bob", Side::Sell, 100, 1);
        assert!(can_match(&all_or_nothing, &covering_sell, &compliance));
    }

    #[test]
    fn test_min_fill_size_respected() {
        let compliance = PermissiveCompliance;
        let request =
            OrderRequest::new("alice", "USDC", Side::Buy, OrderType::Limit, Decimal::from(100))
                .with_limit_price(Decimal::ONE)
                .with_min_fill_size(Decimal::from(50));
        let buy = Order::from_request(&request, 110, Decimal::ZERO, 0);
        buy.set_status(OrderStatus::Open);

        let tiny_sell = open_limit("bob", Side::Sell, 10, 1);
        assert!(!can_match(&buy, &tiny_sell, &compliance));

        let big_sell = open_limit("bob", Side::Sell, 60, 1);
        assert!(can_match(&buy, &big_sell, &compliance));
    }

    #[test]
    fn test_matched_price_policy() {
        let buy = open_limit("alice", Side::Buy, 100, 102);
        let sell = open_limit("bob", Side::Sell, 100, 100);
        // Limit vs limit: midpoint
        assert_eq!(matched_price(&buy, &sell, None), Some(Decimal::from(101)));

        // Market vs limit: limit side's price
        let market_buy = open_order("alice", Side::Buy, OrderType::Market, 100);
        assert_eq!(
            matched_price(&market_buy, &sell, None),
            Some(Decimal::from(100))
        );

        // Market vs market: feed price
        let market_sell = open_order("bob", Side::Sell, OrderType::Market, 100);
        assert_eq!(
            matched_price(&market_buy, &market_sell, Some(Decimal::from(99))),
            Some(Decimal::from(99))
        );
        assert_eq!(matched_price(&market_buy, &market_sell, None), None);
    }

    #[test]
    fn test_price_improvement_clamped_non_negative() {
        let market = Some(Decimal::from(100));
        // Buyer executing below market gains the difference
        assert_eq!(
            price_improvement(Side::Buy, Decimal::from(98), market),
            Decimal::from(2)
        );
        // Buyer executing above market: clamped to zero
        assert_eq!(
            price_improvement(Side::Buy, Decimal::from(103), market),
            Decimal::ZERO
        );
        // Seller executing above market gains
        assert_eq!(
            price_improvement(Side::Sell, Decimal::from(103), market),
            Decimal::from(3)
        );
        assert_eq!(price_improvement(Side::Sell, Decimal::from(90), None), Decimal::ZERO);
    }

    #[test]
    fn test_stop_loss_trigger() {
        let request =
            OrderRequest::new("alice", "USDC", Side::Sell, OrderType::StopLoss {
                trigger_price: Decimal::from(95),
            }, Decimal::from(100))
            .with_limit_price(Decimal::from(94));
        let stop = Order::from_request(&request, 110, Decimal::ZERO, 0);
        stop.set_status(OrderStatus::Open);

        // Market above the trigger: dormant
        assert!(!is_triggered(&stop, Some(Decimal::from(100))));
        // Market at or below the trigger: armed
        assert!(is_triggered(&stop, Some(Decimal::from(95))));
        assert!(is_triggered(&stop, Some(Decimal::from(90))));
        // No market price: stays dormant
        assert!(!is_triggered(&stop, None));

        // Non-stop orders are always active
        let plain = open_limit("bob", Side::Buy, 100, 100);
        assert!(is_triggered(&plain, None));
    }

    #[test]
    fn test_slippage_bound() {
        let request =
            OrderRequest::new("alice", "USDC", Side::Buy, OrderType::Market, Decimal::from(100))
                .with_max_slippage(Decimal::from(2));
        let order = Order::from_request(&request, 110, Decimal::ZERO, 0);

        let market = Some(Decimal::from(100));
        assert!(within_slippage(&order, Decimal::from(101), market));
        assert!(!within_slippage(&order, Decimal::from(103), market));
        // No market price: bound cannot be evaluated, pass
        assert!(within_slippage(&order, Decimal::from(120), None));
    }
}
