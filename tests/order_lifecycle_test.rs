//! End-to-end order lifecycle over the in-memory backend: placement and
//! fan-out, exclusive acceptance, decline escalation, cancellation, delivery
//! progress, delay reporting, and rating.

mod common;

use chrono::{Duration, Utc};
use uuid::Uuid;

use restock_api::errors::ServiceError;
use restock_api::events::event_type;
use restock_api::models::{DeliveryState, OrderState, VisibilityStatus};
use restock_api::stores::{EventStore, OrderStore};

use common::{coffee_request, test_env};

#[tokio::test]
async fn placement_fans_out_to_every_eligible_supplier() {
    let env = test_env();
    let (vendor, supplier_a, supplier_b) = env.seed_marketplace();
    // a supplier in another area never sees the order
    let remote = Uuid::new_v4();
    env.eligibility.set_coverage(
        remote,
        vec!["SKU-COFFEE".to_string()],
        vec!["Durban".to_string()],
    );

    let order = env.orders.place(coffee_request(vendor, "RO-1")).await.unwrap();
    assert_eq!(order.order_state, OrderState::Pending);
    assert_eq!(order.delivery_state, DeliveryState::OnTrack);

    let visibilities = env.store.visibilities_for_order(order.id).await.unwrap();
    let suppliers: Vec<Uuid> = visibilities.iter().map(|v| v.supplier_id).collect();
    assert_eq!(visibilities.len(), 2);
    assert!(suppliers.contains(&supplier_a));
    assert!(suppliers.contains(&supplier_b));
    assert!(visibilities
        .iter()
        .all(|v| v.status == VisibilityStatus::Visible));

    let events = env.store.events_for_order(order.id).await.unwrap();
    assert!(events
        .iter()
        .any(|e| e.event_type == event_type::ORDER_DISTRIBUTED));
}

#[tokio::test]
async fn placement_rejects_unknown_skus() {
    let env = test_env();
    let (vendor, _, _) = env.seed_marketplace();

    let mut request = coffee_request(vendor, "RO-2");
    request.items[0].sku = "SKU-UNKNOWN".into();
    let err = env.orders.place(request).await.unwrap_err();
    assert!(matches!(err, ServiceError::ValidationError(ref msg) if msg.contains("SKU-UNKNOWN")));
}

#[tokio::test]
async fn placement_rejects_non_positive_quantities() {
    let env = test_env();
    let (vendor, _, _) = env.seed_marketplace();

    let mut request = coffee_request(vendor, "RO-3");
    request.items[0].quantity = 0;
    let err = env.orders.place(request).await.unwrap_err();
    assert!(matches!(err, ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn placement_without_eligible_suppliers_lands_at_risk() {
    let env = test_env();
    let vendor = Uuid::new_v4();
    env.store.seed_sku("SKU-COFFEE", "Coffee beans 1kg");
    // no coverage seeded at all

    let order = env.orders.place(coffee_request(vendor, "RO-4")).await.unwrap();
    assert_eq!(order.order_state, OrderState::Pending);
    assert_eq!(order.delivery_state, DeliveryState::AtRisk);
    assert!(env
        .store
        .visibilities_for_order(order.id)
        .await
        .unwrap()
        .is_empty());
    let events = env.store.events_for_order(order.id).await.unwrap();
    assert!(events
        .iter()
        .any(|e| e.event_type == event_type::NO_SUPPLIERS_FOUND));
}

#[tokio::test]
async fn acceptance_is_exclusive_and_leaves_the_loser_untouched() {
    let env = test_env();
    let (vendor, supplier_a, supplier_b) = env.seed_marketplace();
    let order = env.orders.place(coffee_request(vendor, "RO-5")).await.unwrap();

    let accepted = env.orders.accept(order.id, supplier_a).await.unwrap();
    assert_eq!(accepted.order_state, OrderState::Accepted);

    let err = env.orders.accept(order.id, supplier_b).await.unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));

    // the losing supplier's visibility stays VISIBLE, it was not consumed
    let visibility = env
        .store
        .visibility(order.id, supplier_b)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(visibility.status, VisibilityStatus::Visible);

    let events = env.store.events_for_order(order.id).await.unwrap();
    assert_eq!(
        events
            .iter()
            .filter(|e| e.event_type == event_type::ORDER_ACCEPTED)
            .count(),
        1
    );
}

#[tokio::test]
async fn acceptance_without_visibility_is_not_found() {
    let env = test_env();
    let (vendor, _, _) = env.seed_marketplace();
    let order = env.orders.place(coffee_request(vendor, "RO-6")).await.unwrap();

    let outsider = Uuid::new_v4();
    let err = env.orders.accept(order.id, outsider).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));

    let err = env.orders.accept(Uuid::new_v4(), outsider).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn declining_every_supplier_escalates_to_at_risk() {
    let env = test_env();
    let (vendor, supplier_a, supplier_b) = env.seed_marketplace();
    let order = env.orders.place(coffee_request(vendor, "RO-7")).await.unwrap();

    env.orders.decline(order.id, supplier_a).await.unwrap();
    let mid = env.store.order(order.id).await.unwrap().unwrap();
    assert_eq!(mid.delivery_state, DeliveryState::OnTrack);

    env.orders.decline(order.id, supplier_b).await.unwrap();
    let after = env.store.order(order.id).await.unwrap().unwrap();
    assert_eq!(after.order_state, OrderState::Pending);
    assert_eq!(after.delivery_state, DeliveryState::AtRisk);

    let events = env.store.events_for_order(order.id).await.unwrap();
    assert!(events
        .iter()
        .any(|e| e.event_type == event_type::ALL_SUPPLIERS_DECLINED));

    // a declined visibility cannot be accepted afterwards
    let err = env.orders.accept(order.id, supplier_a).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn cancellation_is_idempotent_and_blocks_acceptance() {
    let env = test_env();
    let (vendor, supplier_a, _) = env.seed_marketplace();
    let order = env.orders.place(coffee_request(vendor, "RO-8")).await.unwrap();

    let cancelled = env.orders.cancel(order.id).await.unwrap();
    assert_eq!(cancelled.order_state, OrderState::Cancelled);
    // repeat is a no-op, not an error
    env.orders.cancel(order.id).await.unwrap();

    let err = env.orders.accept(order.id, supplier_a).await.unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));

    let events = env.store.events_for_order(order.id).await.unwrap();
    assert_eq!(
        events
            .iter()
            .filter(|e| e.event_type == event_type::ORDER_CANCELLED)
            .count(),
        1
    );
}

#[tokio::test]
async fn delivery_states_advance_forward_only() {
    let env = test_env();
    let (vendor, supplier_a, _) = env.seed_marketplace();
    let order = env.orders.place(coffee_request(vendor, "RO-9")).await.unwrap();
    env.orders.accept(order.id, supplier_a).await.unwrap();

    let at_risk = env.orders.advance_delivery(order.id, "AT_RISK").await.unwrap();
    assert_eq!(at_risk.delivery_state, DeliveryState::AtRisk);

    // risk never downgrades back to on-track
    let err = env
        .orders
        .advance_delivery(order.id, "ON_TRACK")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));

    let delivered = env
        .orders
        .advance_delivery(order.id, "DELIVERED")
        .await
        .unwrap();
    assert_eq!(delivered.delivery_state, DeliveryState::Delivered);
    let stamped = delivered.delivered_at.unwrap();

    // idempotent carrier retry keeps the original delivered timestamp
    let retried = env
        .orders
        .advance_delivery(order.id, "DELIVERED")
        .await
        .unwrap();
    assert_eq!(retried.delivered_at, Some(stamped));

    let err = env
        .orders
        .advance_delivery(order.id, "FAILED")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));
}

#[tokio::test]
async fn non_canonical_carrier_statuses_only_extend_the_timeline() {
    let env = test_env();
    let (vendor, supplier_a, _) = env.seed_marketplace();
    let order = env.orders.place(coffee_request(vendor, "RO-10")).await.unwrap();
    env.orders.accept(order.id, supplier_a).await.unwrap();

    let unchanged = env
        .orders
        .advance_delivery(order.id, "OUT_FOR_DELIVERY")
        .await
        .unwrap();
    assert_eq!(unchanged.delivery_state, DeliveryState::OnTrack);

    let events = env.store.events_for_order(order.id).await.unwrap();
    assert!(events.iter().any(|e| e.event_type == "OUT_FOR_DELIVERY"));
}

#[tokio::test]
async fn reported_delay_escalates_and_feeds_the_risk_read() {
    let env = test_env();
    let (vendor, supplier_a, _) = env.seed_marketplace();
    let mut request = coffee_request(vendor, "RO-11");
    request.promised_delivery_at = Some(Utc::now() + Duration::hours(24));
    let order = env.orders.place(request).await.unwrap();
    env.orders.accept(order.id, supplier_a).await.unwrap();

    let revised = Utc::now() + Duration::hours(30);
    let delayed = env
        .orders
        .report_delay(order.id, revised, "truck breakdown")
        .await
        .unwrap();
    assert_eq!(delayed.delivery_state, DeliveryState::AtRisk);
    assert_eq!(delayed.predicted_delivery_at, Some(revised));

    // six hours of drift is over the one-hour threshold
    let view = env.orders.get_order(order.id).await.unwrap().unwrap();
    assert!(view.at_risk);

    let events = env.store.events_for_order(order.id).await.unwrap();
    assert!(events
        .iter()
        .any(|e| e.event_type == event_type::DELAY_REPORTED));

    // once delivered, further delay reports are rejected
    env.orders
        .advance_delivery(order.id, "DELIVERED")
        .await
        .unwrap();
    let err = env
        .orders
        .report_delay(order.id, revised, "late report")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));
}

#[tokio::test]
async fn delivered_orders_are_never_at_risk_on_read() {
    let env = test_env();
    let (vendor, supplier_a, _) = env.seed_marketplace();
    let mut request = coffee_request(vendor, "RO-12");
    request.required_by = Utc::now() - Duration::hours(1);
    let order = env.orders.place(request).await.unwrap();
    env.orders.accept(order.id, supplier_a).await.unwrap();
    env.orders
        .advance_delivery(order.id, "DELIVERED")
        .await
        .unwrap();

    let view = env.orders.get_order(order.id).await.unwrap().unwrap();
    assert!(!view.at_risk);
}

#[tokio::test]
async fn rating_requires_delivery_and_is_recorded_once() {
    let env = test_env();
    let (vendor, supplier_a, _) = env.seed_marketplace();
    let order = env.orders.place(coffee_request(vendor, "RO-13")).await.unwrap();
    env.orders.accept(order.id, supplier_a).await.unwrap();

    let err = env
        .orders
        .rate_delivery(order.id, 4, None, true)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidOperation(_)));

    env.orders
        .advance_delivery(order.id, "DELIVERED")
        .await
        .unwrap();

    let err = env
        .orders
        .rate_delivery(order.id, 6, None, true)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ValidationError(_)));

    let rating = env
        .orders
        .rate_delivery(order.id, 4, Some("on time".into()), true)
        .await
        .unwrap();
    assert_eq!(rating.supplier_id, supplier_a);
    assert_eq!(rating.vendor_id, vendor);
    assert_eq!(rating.score, 4);

    let err = env
        .orders
        .rate_delivery(order.id, 5, None, true)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));
}
