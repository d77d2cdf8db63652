// ============================================================================
// Matching Engine Benchmarks
// ============================================================================
//
// Benchmark Categories:
// 1. Order Placement - End-to-end placement and matching through the engine
// 2. Book Depth - Snapshot construction over a populated book
// ============================================================================

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use otc_engine::prelude::*;
use rust_decimal::Decimal;
use tokio::runtime::Runtime;

fn limit(customer: String, side: Side, amount: i64, price: Decimal) -> OrderRequest {
    OrderRequest::new(customer, "USDC", side, OrderType::Limit, Decimal::from(amount))
        .with_limit_price(price)
}

// ============================================================================
// Order Placement Benchmarks
// End-to-end order submission and matching
// ============================================================================

fn benchmark_order_placement(c: &mut Criterion) {
    let mut group = c.benchmark_group("order_placement");
    let rt = Runtime::new().unwrap();

    for num_orders in [100, 1000].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(num_orders),
            num_orders,
            |b, &num_orders| {
                b.iter(|| {
                    rt.block_on(async {
                        let engine = MatchingEngineBuilder::new().build().unwrap();

                        // Rest sell orders at ascending prices
                        for i in 0..num_orders / 2 {
                            let price = Decimal::from(1000 + i);
                            let request =
                                limit(format!("seller_{}", i), Side::Sell, 10, price);
                            let _ = engine.place_order(request).await;
                        }

                        // Crossing buys take them out again
                        for i in 0..num_orders / 2 {
                            let price = Decimal::from(1000 + i);
                            let request = limit(format!("buyer_{}", i), Side::Buy, 10, price);
                            let _ = engine.place_order(request).await;
                        }

                        black_box(engine.get_order_book("USDC", 10))
                    })
                });
            },
        );
    }

    group.finish();
}

// ============================================================================
// Book Depth Benchmarks
// Snapshot construction over a resting book
// ============================================================================

fn benchmark_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("book_snapshot");
    let rt = Runtime::new().unwrap();

    for num_orders in [100, 1000].iter() {
        let engine = MatchingEngineBuilder::new().build().unwrap();
        rt.block_on(async {
            // Non-crossing orders on both sides
            for i in 0..num_orders / 2 {
                let _ = engine
                    .place_order(limit(
                        format!("buyer_{}", i),
                        Side::Buy,
                        10,
                        Decimal::from(900 - (i % 50)),
                    ))
                    .await;
                let _ = engine
                    .place_order(limit(
                        format!("seller_{}", i),
                        Side::Sell,
                        10,
                        Decimal::from(1100 + (i % 50)),
                    ))
                    .await;
            }
        });

        group.bench_with_input(
            BenchmarkId::from_parameter(num_orders),
            num_orders,
            |b, _| {
                b.iter(|| black_box(engine.get_order_book("USDC", 20)));
            },
        );
    }

    group.finish();
}

criterion_group!(benches, benchmark_order_placement, benchmark_snapshot);
criterion_main!(benches);
