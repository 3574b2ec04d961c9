//! Audit event vocabulary.
//!
//! Events are append-only and are the sole source of historical truth for
//! analytics and the order timeline. Services construct a [`NewEvent`] after
//! their primary mutation commits and hand it to an
//! [`EventStore`](crate::stores::EventStore).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

/// Well-known event type tags. Carrier status updates are additionally
/// recorded under their raw status string (e.g. `OUT_FOR_DELIVERY`).
pub mod event_type {
    pub const ORDER_DISTRIBUTED: &str = "order_distributed";
    pub const NO_SUPPLIERS_FOUND: &str = "no_suppliers_found";
    pub const ORDER_ACCEPTED: &str = "order_accepted";
    pub const ORDER_DECLINED: &str = "order_declined";
    pub const ALL_SUPPLIERS_DECLINED: &str = "all_suppliers_declined";
    pub const ORDER_CANCELLED: &str = "order_cancelled";
    pub const DELAY_REPORTED: &str = "delay_reported";
    pub const AUTO_REORDER_TRIGGERED: &str = "auto_reorder_triggered";
    pub const DELIVERY_RATED: &str = "delivery_rated";
}

/// Whether an event tag marks the order as having been at risk at some point.
/// Used by analytics when computing reliability over delivered orders.
pub fn is_risk_tag(tag: &str) -> bool {
    matches!(
        tag,
        event_type::DELAY_REPORTED
            | event_type::NO_SUPPLIERS_FOUND
            | event_type::ALL_SUPPLIERS_DECLINED
    ) || tag == "AT_RISK"
}

/// A stored audit entry. Never mutated or deleted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: Uuid,
    pub event_type: String,
    pub order_id: Option<Uuid>,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// An event about to be appended. The store assigns id and timestamp.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewEvent {
    pub event_type: String,
    pub order_id: Option<Uuid>,
    pub details: serde_json::Value,
}

impl NewEvent {
    pub fn new(event_type: impl Into<String>, order_id: Option<Uuid>, details: serde_json::Value) -> Self {
        Self {
            event_type: event_type.into(),
            order_id,
            details,
        }
    }

    pub fn order_distributed(order_id: Uuid, supplier_count: usize) -> Self {
        Self::new(
            event_type::ORDER_DISTRIBUTED,
            Some(order_id),
            json!({ "supplier_count": supplier_count }),
        )
    }

    pub fn no_suppliers_found(order_id: Uuid) -> Self {
        Self::new(event_type::NO_SUPPLIERS_FOUND, Some(order_id), json!({}))
    }

    pub fn order_accepted(order_id: Uuid, supplier_id: Uuid) -> Self {
        Self::new(
            event_type::ORDER_ACCEPTED,
            Some(order_id),
            json!({ "supplier_id": supplier_id }),
        )
    }

    pub fn order_declined(order_id: Uuid, supplier_id: Uuid) -> Self {
        Self::new(
            event_type::ORDER_DECLINED,
            Some(order_id),
            json!({ "supplier_id": supplier_id }),
        )
    }

    pub fn all_suppliers_declined(order_id: Uuid) -> Self {
        Self::new(event_type::ALL_SUPPLIERS_DECLINED, Some(order_id), json!({}))
    }

    pub fn order_cancelled(order_id: Uuid) -> Self {
        Self::new(event_type::ORDER_CANCELLED, Some(order_id), json!({}))
    }

    pub fn delay_reported(order_id: Uuid, revised_eta: DateTime<Utc>, reason: &str) -> Self {
        Self::new(
            event_type::DELAY_REPORTED,
            Some(order_id),
            json!({ "revised_eta": revised_eta, "reason": reason }),
        )
    }

    /// Carrier status updates are appended under the raw status string so the
    /// timeline keeps full granularity even for statuses that do not move the
    /// delivery state machine.
    pub fn carrier_status(order_id: Uuid, raw_status: &str) -> Self {
        Self::new(raw_status, Some(order_id), json!({ "status": raw_status }))
    }

    pub fn auto_reorder_triggered(position_sku: &str, vendor_id: Uuid, new_order_id: Uuid) -> Self {
        Self::new(
            event_type::AUTO_REORDER_TRIGGERED,
            Some(new_order_id),
            json!({ "sku": position_sku, "vendor_id": vendor_id, "order_id": new_order_id }),
        )
    }

    pub fn delivery_rated(order_id: Uuid, supplier_id: Uuid, score: i16) -> Self {
        Self::new(
            event_type::DELIVERY_RATED,
            Some(order_id),
            json!({ "supplier_id": supplier_id, "score": score }),
        )
    }
}
