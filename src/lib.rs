// ============================================================================
// OTC Matching Engine Library
// Order books, tiered fees and block-trade negotiation for an OTC desk
// ============================================================================

//! # OTC Matching Engine
//!
//! An order matching engine for over-the-counter desks: per-asset order
//! books under a price/priority/time policy, tiered fee computation, a
//! background matching sweep, and a negotiation state machine for block
//! trades that must not auto-execute against the open book.
//!
//! ## Features
//!
//! - **Per-asset order books** as independently lockable units
//! - **Multiple order semantics**: market, limit, iceberg, all-or-nothing,
//!   OTC block, with IOC/FOK/GTC/GTD time-in-force
//! - **Injected collaborators** for settlement, compliance, limits and
//!   pricing; the engine performs no I/O of its own
//! - **Domain events** for every lifecycle step, forwarded to pluggable
//!   handlers for notification and audit delivery
//! - **Block-trade negotiation** with a hard, cancellable timeout
//!
//! ## Example
//!
//! ```
//! use otc_engine::prelude::*;
//! use rust_decimal::Decimal;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! // Build an engine with default in-memory collaborators
//! let engine = MatchingEngineBuilder::new()
//!     .with_event_handler(Arc::new(LoggingEventHandler))
//!     .build()
//!     .unwrap();
//! engine.clone().startup();
//!
//! // Rest a sell order
//! let sell = OrderRequest::new("maker", "USDC", Side::Sell, OrderType::Limit, Decimal::from(100))
//!     .with_limit_price(Decimal::ONE);
//! engine.place_order(sell).await.unwrap();
//!
//! // A crossing buy matches and settles immediately
//! let buy = OrderRequest::new("taker", "USDC", Side::Buy, OrderType::Limit, Decimal::from(100))
//!     .with_limit_price(Decimal::ONE);
//! let order = engine.place_order(buy).await.unwrap();
//! assert_eq!(order.status(), OrderStatus::Filled);
//!
//! let snapshot = engine.get_order_book("USDC", 10).unwrap();
//! assert!(snapshot.asks.is_empty());
//! engine.shutdown().await;
//! # }
//! ```

pub mod domain;
pub mod engine;
pub mod error;
pub mod interfaces;

// Re-exports for convenience
pub mod prelude {
    pub use crate::domain::{
        AuditEntry, BookStats, EngineConfig, FeeSchedule, Match, MatchId, MatchStatus,
        NegotiationSession, Offer, Order, OrderBook, OrderBookSnapshot, OrderId, OrderRequest,
        OrderStatus, OrderType, ServiceTier, SessionStatus, Side, TimeInForce,
    };
    pub use crate::engine::{
        FeeCalculator, MatchingEngine, MatchingEngineBuilder, NegotiationCoordinator,
        OrderValidator,
    };
    pub use crate::error::{EngineError, EngineResult};
    pub use crate::interfaces::{
        CollectingEventHandler, ComplianceGateway, CustomerLimits, CustomerLimitsProvider,
        EngineEvent, EventHandler, InstantSettlement, LoggingEventHandler, NoOpEventHandler,
        PermissiveCompliance, PriceFeed, SettlementError, SettlementGateway, SettlementReceipt,
        StaticLimits, StaticPriceFeed,
    };
}

#[cfg(test)]
mod integration_tests {
    use super::prelude::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Settlement stub that counts calls, for asserting that negotiation
    /// defers settlement until agreement.
    struct CountingSettlement {
        calls: AtomicUsize,
    }

    impl CountingSettlement {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::Acquire)
        }
    }

    #[async_trait]
    impl SettlementGateway for CountingSettlement {
        async fn settle(&self, _m: &Match) -> Result<SettlementReceipt, SettlementError> {
            self.calls.fetch_add(1, Ordering::AcqRel);
            Ok(SettlementReceipt {
                reference: format!("ref-{}", self.calls.load(Ordering::Acquire)),
                settled_at: Utc::now(),
            })
        }
    }

    fn limit(customer: &str, side: Side, amount: i64, price: &str) -> OrderRequest {
        OrderRequest::new(customer, "USDC", side, OrderType::Limit, Decimal::from(amount))
            .with_limit_price(price.parse().unwrap())
    }

    #[tokio::test]
    async fn test_equal_limit_orders_fill_each_other() {
        let engine = MatchingEngineBuilder::new().build().unwrap();

        let buy = engine
            .place_order(limit("alice", Side::Buy, 100, "1.00"))
            .await
            .unwrap();
        let sell = engine
            .place_order(limit("bob", Side::Sell, 100, "1.00"))
            .await
            .unwrap();

        assert_eq!(buy.status(), OrderStatus::Filled);
        assert_eq!(sell.status(), OrderStatus::Filled);

        let matches = engine.matches_for_order(&buy.id);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].amount, Decimal::from(100));
        assert_eq!(matches[0].price, "1.00".parse::<Decimal>().unwrap());
        assert_eq!(matches[0].status, MatchStatus::Settled);
    }

    #[tokio::test]
    async fn test_larger_buy_partially_fills() {
        let engine = MatchingEngineBuilder::new().build().unwrap();

        let buy = engine
            .place_order(limit("alice", Side::Buy, 200, "1.00"))
            .await
            .unwrap();
        let sell = engine
            .place_order(limit("bob", Side::Sell, 120, "1.00"))
            .await
            .unwrap();

        assert_eq!(buy.status(), OrderStatus::PartiallyFilled);
        assert_eq!(buy.remaining_amount(), Decimal::from(80));
        assert_eq!(buy.filled_amount() + buy.remaining_amount(), buy.amount);
        assert_eq!(sell.status(), OrderStatus::Filled);

        // The buy remainder still rests
        let snapshot = engine.get_order_book("USDC", 10).unwrap();
        assert_eq!(snapshot.bids, vec![("1.00".parse().unwrap(), Decimal::from(80))]);
    }

    #[tokio::test]
    async fn test_block_trade_negotiates_then_settles() {
        let settlement = Arc::new(CountingSettlement::new());
        let engine = MatchingEngineBuilder::new()
            .with_settlement(settlement.clone())
            .build()
            .unwrap();

        let block = |customer: &str, side| {
            OrderRequest::new(customer, "USDC", side, OrderType::OtcBlock, Decimal::from(50_000))
                .with_limit_price(Decimal::ONE)
                .with_service_tier(ServiceTier::Institutional)
        };

        let buy = engine.place_order(block("alice", Side::Buy)).await.unwrap();
        let sell = engine.place_order(block("bob", Side::Sell)).await.unwrap();

        // Routed to negotiation, no settlement yet
        assert_eq!(buy.status(), OrderStatus::Negotiating);
        assert_eq!(sell.status(), OrderStatus::Negotiating);
        assert_eq!(settlement.calls(), 0);

        let matches = engine.matches_for_order(&buy.id);
        assert_eq!(matches.len(), 1);
        let match_id = matches[0].id;
        assert_eq!(matches[0].status, MatchStatus::Negotiating);

        let session = engine.negotiation_session(match_id).unwrap();
        assert_eq!(session.moderator, "desk-moderator");
        assert!(buy.negotiation_room().is_some());

        // Both counterparties accept the same price
        let agreed: Decimal = "0.995".parse().unwrap();
        engine.accept_offer(match_id, "alice", agreed).await.unwrap();
        let settled = engine.accept_offer(match_id, "bob", agreed).await.unwrap();

        assert_eq!(settled.status, MatchStatus::Settled);
        assert_eq!(settled.price, agreed);
        assert_eq!(settlement.calls(), 1);
        assert_eq!(buy.status(), OrderStatus::Filled);
        assert_eq!(buy.average_fill_price(), Some(agreed));
        assert_eq!(sell.status(), OrderStatus::Filled);

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_fill_or_kill_rejected_whole_when_underfilled() {
        let engine = MatchingEngineBuilder::new().build().unwrap();

        // Only 40 available at or under 1.05
        let sell = engine
            .place_order(limit("bob", Side::Sell, 40, "1.05"))
            .await
            .unwrap();

        let fok = limit("alice", Side::Buy, 100, "1.05")
            .with_time_in_force(TimeInForce::FillOrKill);
        let buy = engine.place_order(fok).await.unwrap();

        assert_eq!(buy.status(), OrderStatus::Cancelled);
        assert_eq!(buy.filled_amount(), Decimal::ZERO);

        // Book unchanged: the sell is untouched, the buy never rested
        assert_eq!(sell.remaining_amount(), Decimal::from(40));
        let snapshot = engine.get_order_book("USDC", 10).unwrap();
        assert!(snapshot.bids.is_empty());
        assert_eq!(snapshot.asks, vec![("1.05".parse().unwrap(), Decimal::from(40))]);
        assert!(engine.matches_for_order(&buy.id).is_empty());
    }

    #[tokio::test]
    async fn test_fill_or_kill_fills_when_covered() {
        let engine = MatchingEngineBuilder::new().build().unwrap();
        engine
            .place_order(limit("bob", Side::Sell, 60, "1.00"))
            .await
            .unwrap();
        engine
            .place_order(limit("carol", Side::Sell, 60, "1.05"))
            .await
            .unwrap();

        let fok = limit("alice", Side::Buy, 100, "1.05")
            .with_time_in_force(TimeInForce::FillOrKill);
        let buy = engine.place_order(fok).await.unwrap();

        assert_eq!(buy.status(), OrderStatus::Filled);
        assert_eq!(buy.filled_amount(), Decimal::from(100));
    }

    #[tokio::test]
    async fn test_immediate_or_cancel_cancels_remainder_in_call() {
        let engine = MatchingEngineBuilder::new().build().unwrap();
        engine
            .place_order(limit("bob", Side::Sell, 40, "1.00"))
            .await
            .unwrap();

        let ioc = limit("alice", Side::Buy, 100, "1.00")
            .with_time_in_force(TimeInForce::ImmediateOrCancel);
        let buy = engine.place_order(ioc).await.unwrap();

        // Fills what is there, cancels the rest within the placement call
        assert_eq!(buy.status(), OrderStatus::Cancelled);
        assert_eq!(buy.filled_amount(), Decimal::from(40));
        assert_eq!(buy.remaining_amount(), Decimal::from(60));
        assert!(engine.get_order_book("USDC", 10).unwrap().bids.is_empty());
    }

    #[tokio::test]
    async fn test_same_customer_orders_never_match() {
        let engine = MatchingEngineBuilder::new().build().unwrap();

        let buy = engine
            .place_order(limit("alice", Side::Buy, 100, "1.00"))
            .await
            .unwrap();
        let sell = engine
            .place_order(limit("alice", Side::Sell, 100, "1.00"))
            .await
            .unwrap();

        assert_eq!(buy.status(), OrderStatus::Open);
        assert_eq!(sell.status(), OrderStatus::Open);
        assert!(engine.matches_for_order(&buy.id).is_empty());

        // The sweep does not pair them either
        engine.sweep_once().await;
        assert_eq!(buy.status(), OrderStatus::Open);
        assert_eq!(sell.status(), OrderStatus::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_negotiation_times_out_to_disputed() {
        let settlement = Arc::new(CountingSettlement::new());
        let config = EngineConfig::default()
            .with_negotiation_timeout(Duration::from_secs(30 * 60));
        let engine = MatchingEngineBuilder::new()
            .with_config(config)
            .with_settlement(settlement.clone())
            .build()
            .unwrap();

        let block = |customer: &str, side| {
            OrderRequest::new(customer, "USDC", side, OrderType::OtcBlock, Decimal::from(50_000))
                .with_limit_price(Decimal::ONE)
        };
        let buy = engine.place_order(block("alice", Side::Buy)).await.unwrap();
        engine.place_order(block("bob", Side::Sell)).await.unwrap();

        let match_id = engine.matches_for_order(&buy.id)[0].id;

        // Let the spawned deadline timer register its sleep against the paused
        // clock before we advance past it.
        tokio::task::yield_now().await;
        tokio::time::advance(Duration::from_secs(30 * 60 + 1)).await;
        tokio::task::yield_now().await;

        assert_eq!(
            engine.negotiation_session(match_id).unwrap().status,
            SessionStatus::TimedOut
        );
        assert_eq!(
            engine.get_match(&match_id).unwrap().status,
            MatchStatus::Disputed
        );
        assert_eq!(settlement.calls(), 0);

        // A disputed negotiation takes no further offers
        let err = engine.submit_offer(match_id, "alice", Decimal::ONE).unwrap_err();
        assert!(matches!(err, EngineError::NegotiationClosed { .. }));
    }

    #[tokio::test]
    async fn test_price_then_priority_then_time_order() {
        let engine = MatchingEngineBuilder::new().build().unwrap();

        // Three sells: better price wins, then tier priority, then arrival
        let cheap = engine
            .place_order(limit("carol", Side::Sell, 50, "0.99"))
            .await
            .unwrap();
        let first_at_par = engine
            .place_order(limit("bob", Side::Sell, 50, "1.00"))
            .await
            .unwrap();
        let institutional_at_par = engine
            .place_order(
                limit("dave", Side::Sell, 50, "1.00")
                    .with_service_tier(ServiceTier::Institutional),
            )
            .await
            .unwrap();

        let buy = engine
            .place_order(limit("alice", Side::Buy, 100, "1.00"))
            .await
            .unwrap();

        assert_eq!(buy.status(), OrderStatus::Filled);
        // Best price matched first
        assert_eq!(cheap.status(), OrderStatus::Filled);
        // At equal price, the higher-priority institutional order beat the
        // earlier standard one
        assert_eq!(institutional_at_par.status(), OrderStatus::Filled);
        assert_eq!(first_at_par.status(), OrderStatus::Open);
    }

    #[tokio::test]
    async fn test_rejected_order_reports_every_reason() {
        let engine = MatchingEngineBuilder::new().build().unwrap();

        // Negative amount and missing limit price at once
        let bad = OrderRequest::new("alice", "USDC", Side::Buy, OrderType::Limit, Decimal::from(-1));
        let err = engine.place_order(bad).await.unwrap_err();

        let EngineError::Rejected { reasons } = err else {
            panic!("expected rejection");
        };
        assert!(reasons.len() >= 2);
        // Nothing entered the book; the asset book was never even created
        assert!(engine.get_order_book("USDC", 10).is_none());
    }
}
