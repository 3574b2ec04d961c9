//! Analytics aggregation over a driven order history: taxed spend,
//! reliability, supplier scores, the disruption heatmap, and the supplier
//! delivery feed.

mod common;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use restock_api::services::orders::PlaceOrderRequest;

use common::{coffee_request, test_env, TestEnv};

/// Drives one order from placement to delivery through the public service
/// API, accepted by `supplier`.
async fn deliver_order(
    env: &TestEnv,
    request: PlaceOrderRequest,
    supplier: Uuid,
) -> restock_api::models::Order {
    let order = env.orders.place(request).await.unwrap();
    env.orders.accept(order.id, supplier).await.unwrap();
    env.orders
        .advance_delivery(order.id, "DELIVERED")
        .await
        .unwrap()
}

#[tokio::test]
async fn vendor_spend_applies_the_tax_multiplier_exactly() {
    let env = test_env();
    let (vendor, supplier_a, _) = env.seed_marketplace();

    // 2 x 100 + 1 x 100 = 300 before tax
    deliver_order(&env, coffee_request(vendor, "RO-1"), supplier_a).await;
    let mut single = coffee_request(vendor, "RO-2");
    single.items[0].quantity = 1;
    deliver_order(&env, single, supplier_a).await;

    let analytics = env.analytics.vendor_analytics(vendor).await.unwrap();
    assert_eq!(analytics.total_spend, dec!(324));
    assert_eq!(analytics.reliability_percentage, 100.0);
    assert_eq!(analytics.stockouts_avoided, 0);
}

#[tokio::test]
async fn undelivered_orders_do_not_count_toward_spend() {
    let env = test_env();
    let (vendor, supplier_a, _) = env.seed_marketplace();

    deliver_order(&env, coffee_request(vendor, "RO-1"), supplier_a).await;
    // accepted but still in transit
    let pending = env.orders.place(coffee_request(vendor, "RO-2")).await.unwrap();
    env.orders.accept(pending.id, supplier_a).await.unwrap();

    let analytics = env.analytics.vendor_analytics(vendor).await.unwrap();
    assert_eq!(analytics.total_spend, dec!(216));
}

#[tokio::test]
async fn reliability_counts_delay_tainted_deliveries() {
    let env = test_env();
    let (vendor, supplier_a, _) = env.seed_marketplace();

    deliver_order(&env, coffee_request(vendor, "RO-1"), supplier_a).await;

    // second order is delayed before it finally arrives
    let delayed = env.orders.place(coffee_request(vendor, "RO-2")).await.unwrap();
    env.orders.accept(delayed.id, supplier_a).await.unwrap();
    env.orders
        .report_delay(delayed.id, Utc::now() + Duration::hours(12), "port congestion")
        .await
        .unwrap();
    env.orders
        .advance_delivery(delayed.id, "DELIVERED")
        .await
        .unwrap();

    let analytics = env.analytics.vendor_analytics(vendor).await.unwrap();
    assert_eq!(analytics.reliability_percentage, 50.0);
    assert_eq!(analytics.stockouts_avoided, 1);
}

#[tokio::test]
async fn vendor_with_no_history_gets_neutral_metrics() {
    let env = test_env();
    let (vendor, _, _) = env.seed_marketplace();

    let analytics = env.analytics.vendor_analytics(vendor).await.unwrap();
    assert_eq!(analytics.total_spend, Decimal::ZERO);
    assert_eq!(analytics.reliability_percentage, 100.0);
    assert_eq!(analytics.stockouts_avoided, 0);
    assert!(analytics.most_stable_supplier.is_none());
    assert!(analytics.supplier_breakdown.is_empty());
    assert_eq!(analytics.spend_trend, "+0.0%");
    assert_eq!(analytics.reliability_trend, "+0.0%");
}

#[tokio::test]
async fn most_stable_supplier_wins_on_average_rating() {
    let env = test_env();
    let (vendor, supplier_a, supplier_b) = env.seed_marketplace();

    let first = deliver_order(&env, coffee_request(vendor, "RO-1"), supplier_a).await;
    env.orders.rate_delivery(first.id, 5, None, true).await.unwrap();

    let second = deliver_order(&env, coffee_request(vendor, "RO-2"), supplier_b).await;
    env.orders.rate_delivery(second.id, 3, None, true).await.unwrap();

    let analytics = env.analytics.vendor_analytics(vendor).await.unwrap();
    let stable = analytics.most_stable_supplier.unwrap();
    assert_eq!(stable.supplier_id, supplier_a);
    assert_eq!(stable.name, "Atlas Wholesale");
    assert_eq!(stable.average_rating, 5.0);
}

#[tokio::test]
async fn supplier_breakdown_is_ranked_by_spend() {
    let env = test_env();
    let (vendor, supplier_a, supplier_b) = env.seed_marketplace();

    // supplier A fulfills two orders, supplier B one
    let first = deliver_order(&env, coffee_request(vendor, "RO-1"), supplier_a).await;
    env.orders.rate_delivery(first.id, 4, None, true).await.unwrap();
    deliver_order(&env, coffee_request(vendor, "RO-2"), supplier_a).await;
    deliver_order(&env, coffee_request(vendor, "RO-3"), supplier_b).await;

    let analytics = env.analytics.vendor_analytics(vendor).await.unwrap();
    assert_eq!(analytics.supplier_breakdown.len(), 2);

    let top = &analytics.supplier_breakdown[0];
    assert_eq!(top.supplier_id, supplier_a);
    assert_eq!(top.spend, dec!(432));
    assert_eq!(top.spend_pct_of_max, 100.0);
    assert_eq!(top.score_pct, 80.0);

    let runner_up = &analytics.supplier_breakdown[1];
    assert_eq!(runner_up.supplier_id, supplier_b);
    assert_eq!(runner_up.spend, dec!(216));
    assert_eq!(runner_up.spend_pct_of_max, 50.0);
    // unrated suppliers score zero rather than poisoning the average
    assert_eq!(runner_up.score_pct, 0.0);
}

#[tokio::test]
async fn heatmap_registers_recent_delays_over_the_baseline() {
    let env = test_env();
    let (vendor, supplier_a, _) = env.seed_marketplace();
    let baseline = env.config.analytics.heatmap_baseline;

    let order = env.orders.place(coffee_request(vendor, "RO-1")).await.unwrap();
    env.orders.accept(order.id, supplier_a).await.unwrap();
    env.orders
        .report_delay(order.id, Utc::now() + Duration::hours(6), "strike")
        .await
        .unwrap();

    let analytics = env.analytics.vendor_analytics(vendor).await.unwrap();
    assert_eq!(analytics.disruption_heatmap.len(), 4);
    assert!(analytics.disruption_heatmap.iter().all(|row| row.len() == 7));

    let total: u32 = analytics.disruption_heatmap.iter().flatten().sum();
    assert_eq!(total, baseline * 28 + 1);
    // the delay landed in the current week's row
    assert!(analytics.disruption_heatmap[0].iter().any(|c| *c > baseline));
}

#[tokio::test]
async fn trend_against_an_empty_previous_period_is_flat() {
    let env = test_env();
    let (vendor, supplier_a, _) = env.seed_marketplace();
    deliver_order(&env, coffee_request(vendor, "RO-1"), supplier_a).await;

    let analytics = env.analytics.vendor_analytics(vendor).await.unwrap();
    assert_eq!(analytics.spend_trend, "+0.0%");
    assert_eq!(analytics.reliability_trend, "+0.0%");
}

#[tokio::test]
async fn supplier_feed_lists_only_fulfilled_deliveries() {
    let env = test_env();
    let (vendor, supplier_a, _) = env.seed_marketplace();

    let delivered = deliver_order(&env, coffee_request(vendor, "RO-1"), supplier_a).await;
    env.orders
        .rate_delivery(delivered.id, 5, Some("great".into()), true)
        .await
        .unwrap();

    // accepted but not yet delivered: excluded from the feed
    let in_transit = env.orders.place(coffee_request(vendor, "RO-2")).await.unwrap();
    env.orders.accept(in_transit.id, supplier_a).await.unwrap();

    let feed = env.analytics.supplier_analytics(supplier_a).await.unwrap();
    assert_eq!(feed.len(), 1);

    let entry = &feed[0];
    assert_eq!(entry.order_id, delivered.id);
    assert_eq!(entry.order_number, "RO-1");
    assert_eq!(entry.retailer_name, "Corner Grocer");
    assert_eq!(entry.value_with_tax, dec!(216));
    assert_eq!(entry.rating, Some(5));
    assert!(entry.lead_time_days >= 0.0);
    assert!(entry.lead_time_days < 1.0);
}

#[tokio::test]
async fn supplier_with_no_deliveries_gets_an_empty_feed() {
    let env = test_env();
    let (_, supplier_a, _) = env.seed_marketplace();
    let feed = env.analytics.supplier_analytics(supplier_a).await.unwrap();
    assert!(feed.is_empty());
}
