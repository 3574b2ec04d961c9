//! Delivery risk evaluation.
//!
//! A pure, recomputable classification. The persisted `AT_RISK` delivery
//! state is a hint only; readers call this on every read instead of trusting
//! a stored flag.

use chrono::{DateTime, Duration, Utc};

use crate::config::RiskConfig;
use crate::models::{DeliveryState, Order, OrderState};

/// Classifies the order as at risk or not, at `now`.
///
/// Rules, in order:
/// 1. Cancelled, delivered, or stamped with a delivered timestamp: never at
///    risk.
/// 2. When both promised and predicted timestamps are present: at risk iff
///    the drift `predicted - promised` reaches the threshold. This rule is
///    authoritative and can declare "not at risk" even when the required
///    date has passed.
/// 3. Fallback when either timestamp is missing: at risk iff `now` is past
///    the required delivery date.
pub fn is_at_risk(order: &Order, now: DateTime<Utc>, drift_threshold: Duration) -> bool {
    if order.order_state == OrderState::Cancelled
        || order.delivery_state == DeliveryState::Delivered
        || order.delivered_at.is_some()
    {
        return false;
    }

    if let (Some(promised), Some(predicted)) =
        (order.promised_delivery_at, order.predicted_delivery_at)
    {
        return predicted - promised >= drift_threshold;
    }

    now > order.required_by
}

/// [`is_at_risk`] with the threshold taken from configuration.
pub fn evaluate(order: &Order, now: DateTime<Utc>, config: &RiskConfig) -> bool {
    is_at_risk(order, now, Duration::minutes(config.drift_threshold_minutes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Address;
    use uuid::Uuid;

    fn order() -> Order {
        let now = Utc::now();
        Order {
            id: Uuid::new_v4(),
            vendor_id: Uuid::new_v4(),
            order_number: "RO-1".into(),
            items: vec![],
            partial_allowed: false,
            delivery_address: Address::new("12 Oak St", "Pretoria"),
            required_by: now + Duration::hours(24),
            promised_delivery_at: None,
            predicted_delivery_at: None,
            delivered_at: None,
            order_state: OrderState::Pending,
            delivery_state: DeliveryState::OnTrack,
            subtotal: None,
            created_at: now,
            updated_at: None,
        }
    }

    const THRESHOLD: i64 = 60;

    #[test]
    fn delivered_is_never_at_risk_regardless_of_timestamps() {
        let now = Utc::now();
        let mut o = order();
        o.delivery_state = DeliveryState::Delivered;
        o.delivered_at = Some(now);
        o.promised_delivery_at = Some(now);
        o.predicted_delivery_at = Some(now + Duration::hours(5));
        o.required_by = now - Duration::days(3);
        assert!(!is_at_risk(&o, now, Duration::minutes(THRESHOLD)));
    }

    #[test]
    fn cancelled_is_never_at_risk() {
        let now = Utc::now();
        let mut o = order();
        o.order_state = OrderState::Cancelled;
        o.required_by = now - Duration::days(1);
        assert!(!is_at_risk(&o, now, Duration::minutes(THRESHOLD)));
    }

    #[test]
    fn drift_under_threshold_overrides_passed_deadline() {
        let now = Utc::now();
        let promised = now + Duration::hours(2);
        let mut o = order();
        o.promised_delivery_at = Some(promised);
        o.predicted_delivery_at = Some(promised + Duration::minutes(59));
        o.required_by = now - Duration::hours(1);
        assert!(!is_at_risk(&o, now, Duration::minutes(THRESHOLD)));
    }

    #[test]
    fn drift_at_or_over_threshold_is_at_risk() {
        let now = Utc::now();
        let promised = now + Duration::hours(2);
        let mut o = order();
        o.promised_delivery_at = Some(promised);
        o.predicted_delivery_at = Some(promised + Duration::minutes(61));
        assert!(is_at_risk(&o, now, Duration::minutes(THRESHOLD)));

        o.predicted_delivery_at = Some(promised + Duration::minutes(60));
        assert!(is_at_risk(&o, now, Duration::minutes(THRESHOLD)));
    }

    #[test]
    fn deadline_fallback_applies_when_a_timestamp_is_missing() {
        let now = Utc::now();
        let mut o = order();
        o.required_by = now - Duration::minutes(1);
        assert!(is_at_risk(&o, now, Duration::minutes(THRESHOLD)));

        o.required_by = now + Duration::minutes(1);
        assert!(!is_at_risk(&o, now, Duration::minutes(THRESHOLD)));

        // one timestamp alone is not enough for the drift rule
        o.promised_delivery_at = Some(now);
        o.required_by = now - Duration::minutes(1);
        assert!(is_at_risk(&o, now, Duration::minutes(THRESHOLD)));
    }
}
