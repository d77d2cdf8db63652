// ============================================================================
// Basic Usage Example
// ============================================================================

use otc_engine::prelude::*;
use rust_decimal::Decimal;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    println!("=== OTC Matching Engine Example ===\n");

    let events = Arc::new(CollectingEventHandler::new());
    let engine = MatchingEngineBuilder::new()
        .with_price_feed(Arc::new(
            StaticPriceFeed::new().with_price("USDC", Decimal::ONE),
        ))
        .with_event_handler(events.clone())
        .build()
        .unwrap();
    engine.clone().startup();

    println!("Created matching engine with a 1s background sweep\n");

    // Rest sell orders at ascending prices
    println!("Adding sell orders...");
    for i in 0i64..5 {
        let sell = OrderRequest::new(
            format!("seller_{}", i),
            "USDC",
            Side::Sell,
            OrderType::Limit,
            Decimal::from(100),
        )
        .with_limit_price(Decimal::ONE + Decimal::new(i, 3));
        engine.place_order(sell).await.unwrap();
    }

    // Rest buy orders below the spread
    println!("Adding buy orders...");
    for i in 0i64..5 {
        let buy = OrderRequest::new(
            format!("buyer_{}", i),
            "USDC",
            Side::Buy,
            OrderType::Limit,
            Decimal::from(100),
        )
        .with_limit_price(Decimal::new(995 - i, 3));
        engine.place_order(buy).await.unwrap();
    }

    println!("\n=== Order Book Snapshot ===");
    let snapshot = engine.get_order_book("USDC", 5).unwrap();
    println!("\nBids:");
    for (price, qty) in &snapshot.bids {
        println!("  {} @ {}", qty, price);
    }
    println!("\nAsks:");
    for (price, qty) in &snapshot.asks {
        println!("  {} @ {}", qty, price);
    }
    println!("\nSpread: {:?}", snapshot.spread);
    println!("Mid Price: {:?}", snapshot.mid_price);

    // An aggressive IOC buy crosses the first ask levels
    println!("\n=== Submitting IOC Order ===");
    let taker = OrderRequest::new("taker", "USDC", Side::Buy, OrderType::Limit, Decimal::from(250))
        .with_limit_price(Decimal::new(1002, 3))
        .with_time_in_force(TimeInForce::ImmediateOrCancel)
        .with_service_tier(ServiceTier::Premium);
    let order = engine.place_order(taker).await.unwrap();

    println!(
        "Taker order {:?}: filled {} at average {:?}",
        order.status(),
        order.filled_amount(),
        order.average_fill_price()
    );
    for m in engine.matches_for_order(&order.id) {
        println!(
            "  Match: {} {} @ {} (buyer fee {}, status {:?})",
            m.amount, m.asset, m.price, m.buyer_fee, m.status
        );
    }

    // A pair of OTC blocks routes to negotiation instead of auto-executing
    println!("\n=== OTC Block Negotiation ===");
    let block = |customer: &str, side| {
        OrderRequest::new(customer, "USDC", side, OrderType::OtcBlock, Decimal::from(50_000))
            .with_limit_price(Decimal::ONE)
            .with_service_tier(ServiceTier::Institutional)
    };
    let block_buy = engine.place_order(block("fund-a", Side::Buy)).await.unwrap();
    engine.place_order(block("fund-b", Side::Sell)).await.unwrap();

    let match_id = engine.matches_for_order(&block_buy.id)[0].id;
    let session = engine.negotiation_session(match_id).unwrap();
    println!(
        "Negotiation room {} opened, moderated by {}, deadline {}",
        session.room_id, session.moderator, session.deadline
    );

    let agreed: Decimal = "0.9985".parse().unwrap();
    engine.submit_offer(match_id, "fund-a", agreed).unwrap();
    engine.accept_offer(match_id, "fund-a", agreed).await.unwrap();
    let settled = engine.accept_offer(match_id, "fund-b", agreed).await.unwrap();
    println!(
        "Block settled: {} @ {} ({:?}, reference {:?})",
        settled.amount, settled.price, settled.status, settled.settlement_reference
    );

    println!("\n=== Final Order Book ===");
    let final_snapshot = engine.get_order_book("USDC", 10).unwrap();
    println!("Bids: {} levels", final_snapshot.bids.len());
    println!("Asks: {} levels", final_snapshot.asks.len());
    println!("Daily volume: {}", final_snapshot.daily_volume);
    println!("Events emitted: {}", events.events().len());

    engine.shutdown().await;
}
