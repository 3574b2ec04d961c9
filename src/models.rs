use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Lifecycle state of an order itself, independent of delivery progress.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderState {
    Pending,
    Accepted,
    Cancelled,
}

impl OrderState {
    /// Legal forward transitions. Nothing leaves `Cancelled`.
    pub fn can_transition_to(self, next: OrderState) -> bool {
        matches!(
            (self, next),
            (OrderState::Pending, OrderState::Accepted)
                | (OrderState::Pending, OrderState::Cancelled)
                | (OrderState::Accepted, OrderState::Cancelled)
        )
    }
}

/// Delivery progress, orthogonal to [`OrderState`].
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryState {
    OnTrack,
    AtRisk,
    Delivered,
    Failed,
}

impl DeliveryState {
    pub fn is_terminal(self) -> bool {
        matches!(self, DeliveryState::Delivered | DeliveryState::Failed)
    }

    /// Legal transitions between delivery states. Same-state updates are
    /// allowed (idempotent carrier retries); risk never downgrades back to
    /// on-track, only delivery or failure resolves it.
    pub fn can_transition_to(self, next: DeliveryState) -> bool {
        if self == next {
            return true;
        }
        match self {
            DeliveryState::OnTrack => true,
            DeliveryState::AtRisk => {
                matches!(next, DeliveryState::Delivered | DeliveryState::Failed)
            }
            DeliveryState::Delivered | DeliveryState::Failed => false,
        }
    }
}

/// Offer state of one order toward one supplier.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VisibilityStatus {
    Visible,
    Accepted,
    Declined,
}

/// Which side of the marketplace owns an inventory position.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OwnerKind {
    Vendor,
    Supplier,
}

/// Structured delivery address. Captured as street + area so nothing
/// downstream has to re-parse free text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub area: String,
}

impl Address {
    pub fn new(street: impl Into<String>, area: impl Into<String>) -> Self {
        Self {
            street: street.into(),
            area: area.into(),
        }
    }

    /// Ingests a legacy single-line address at the capture boundary: the last
    /// comma-separated segment becomes the area, everything before it the
    /// street. A line without a comma yields an empty area; callers supply
    /// their configured default area in that case.
    pub fn from_free_form(line: &str) -> Self {
        let segments: Vec<&str> = line.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();
        match segments.as_slice() {
            [] => Self::new("", ""),
            [only] => Self::new(*only, ""),
            [street @ .., area] => Self::new(street.join(", "), *area),
        }
    }
}

/// One ordered line: SKU, quantity, optional unit price, display name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub sku: String,
    pub quantity: i32,
    pub unit_price: Option<Decimal>,
    pub display_name: String,
}

impl LineItem {
    /// Effective unit price: the recorded price, or the deterministic
    /// per-SKU fallback so totals stay reproducible when a price is missing.
    pub fn effective_unit_price(&self) -> Decimal {
        self.unit_price.unwrap_or_else(|| fallback_unit_price(&self.sku))
    }

    pub fn line_total(&self) -> Decimal {
        self.effective_unit_price() * Decimal::from(self.quantity)
    }
}

/// Deterministic simulated unit price for a SKU without a recorded price:
/// FNV-1a over the code, reduced into 5..=99 whole units. Stable across
/// processes so repeated aggregation of the same order agrees.
pub fn fallback_unit_price(sku: &str) -> Decimal {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut hash = FNV_OFFSET;
    for byte in sku.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    Decimal::from(5 + hash % 95)
}

/// A vendor's request for a set of line items, distributed to suppliers and
/// tracked through acceptance and delivery. Never physically deleted;
/// cancellation is a state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub vendor_id: Uuid,
    pub order_number: String,
    pub items: Vec<LineItem>,
    pub partial_allowed: bool,
    pub delivery_address: Address,
    pub required_by: DateTime<Utc>,
    pub promised_delivery_at: Option<DateTime<Utc>>,
    pub predicted_delivery_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub order_state: OrderState,
    pub delivery_state: DeliveryState,
    /// Cached subtotal; when absent the value is derived from the items.
    pub subtotal: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Cached subtotal when present, otherwise the sum of line totals.
    pub fn subtotal_value(&self) -> Decimal {
        self.subtotal
            .unwrap_or_else(|| self.items.iter().map(LineItem::line_total).sum())
    }

    pub fn is_delivered(&self) -> bool {
        self.delivery_state == DeliveryState::Delivered
    }
}

/// The relationship between one order and one supplier it was offered to.
/// Unique per (order, supplier); transitions exactly once away from
/// `Visible`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderVisibility {
    pub order_id: Uuid,
    pub supplier_id: Uuid,
    pub status: VisibilityStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl OrderVisibility {
    pub fn new(order_id: Uuid, supplier_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            order_id,
            supplier_id,
            status: VisibilityStatus::Visible,
            created_at: now,
            updated_at: None,
        }
    }
}

/// One supplier performance score per delivered order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rating {
    pub id: Uuid,
    pub order_id: Uuid,
    pub supplier_id: Uuid,
    pub vendor_id: Uuid,
    /// 1 to 5 inclusive.
    pub score: i16,
    pub comment: Option<String>,
    pub accuracy_ok: bool,
    pub created_at: DateTime<Utc>,
}

/// Stock position for one SKU on one owner, with the auto-reorder policy
/// attached to it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryPosition {
    pub owner_id: Uuid,
    pub owner_kind: OwnerKind,
    pub sku: String,
    pub quantity: i32,
    pub reorder_threshold: i32,
    pub reorder_quantity: Option<i32>,
    pub auto_reorder_enabled: bool,
    /// Stamped by the auto-reorder trigger; physical receipt is a separate,
    /// external event and does not flow through this field.
    pub last_ordered_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryPosition {
    /// Whether the position, as currently stored, satisfies the reorder
    /// trigger condition.
    pub fn below_threshold(&self) -> bool {
        self.quantity <= self.reorder_threshold
    }
}

/// Directory view of a vendor (retailer).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorProfile {
    pub id: Uuid,
    pub name: String,
    pub contact_email: Option<String>,
    pub address: Option<Address>,
}

/// Directory view of a supplier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierProfile {
    pub id: Uuid,
    pub name: String,
    pub contact_email: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn order_state_transitions() {
        assert!(OrderState::Pending.can_transition_to(OrderState::Accepted));
        assert!(OrderState::Pending.can_transition_to(OrderState::Cancelled));
        assert!(OrderState::Accepted.can_transition_to(OrderState::Cancelled));
        assert!(!OrderState::Accepted.can_transition_to(OrderState::Pending));
        assert!(!OrderState::Cancelled.can_transition_to(OrderState::Pending));
        assert!(!OrderState::Cancelled.can_transition_to(OrderState::Accepted));
    }

    #[test]
    fn delivery_state_transitions() {
        assert!(DeliveryState::OnTrack.can_transition_to(DeliveryState::AtRisk));
        assert!(DeliveryState::OnTrack.can_transition_to(DeliveryState::Delivered));
        assert!(DeliveryState::AtRisk.can_transition_to(DeliveryState::Delivered));
        assert!(DeliveryState::AtRisk.can_transition_to(DeliveryState::Failed));
        assert!(!DeliveryState::AtRisk.can_transition_to(DeliveryState::OnTrack));
        assert!(!DeliveryState::Delivered.can_transition_to(DeliveryState::AtRisk));
        assert!(!DeliveryState::Failed.can_transition_to(DeliveryState::OnTrack));
        // idempotent carrier retries
        assert!(DeliveryState::AtRisk.can_transition_to(DeliveryState::AtRisk));
    }

    #[test]
    fn state_strings_round_trip() {
        assert_eq!(DeliveryState::AtRisk.to_string(), "AT_RISK");
        assert_eq!("ON_TRACK".parse::<DeliveryState>().unwrap(), DeliveryState::OnTrack);
        assert_eq!("DELIVERED".parse::<DeliveryState>().unwrap(), DeliveryState::Delivered);
        assert!("OUT_FOR_DELIVERY".parse::<DeliveryState>().is_err());
        assert_eq!(VisibilityStatus::Visible.to_string(), "VISIBLE");
        assert_eq!(OrderState::Pending.to_string(), "PENDING");
    }

    #[test]
    fn address_from_free_form_splits_on_last_comma() {
        let addr = Address::from_free_form("12 Oak St, Pretoria");
        assert_eq!(addr.street, "12 Oak St");
        assert_eq!(addr.area, "Pretoria");

        let addr = Address::from_free_form("Unit 4, 12 Oak St, Pretoria");
        assert_eq!(addr.street, "Unit 4, 12 Oak St");
        assert_eq!(addr.area, "Pretoria");

        let addr = Address::from_free_form("12 Oak St");
        assert_eq!(addr.street, "12 Oak St");
        assert_eq!(addr.area, "");
    }

    #[test]
    fn fallback_price_is_deterministic_and_bounded() {
        let a = fallback_unit_price("SKU-COFFEE-01");
        let b = fallback_unit_price("SKU-COFFEE-01");
        assert_eq!(a, b);
        assert!(a >= dec!(5) && a <= dec!(99));
        // different SKUs should not all collapse to one value
        assert_ne!(
            fallback_unit_price("SKU-A"),
            fallback_unit_price("SKU-ZZZZZZ")
        );
    }

    #[test]
    fn subtotal_prefers_cache_then_derives() {
        let items = vec![
            LineItem {
                sku: "A".into(),
                quantity: 2,
                unit_price: Some(dec!(10)),
                display_name: "A".into(),
            },
            LineItem {
                sku: "B".into(),
                quantity: 1,
                unit_price: Some(dec!(5)),
                display_name: "B".into(),
            },
        ];
        let mut order = Order {
            id: Uuid::new_v4(),
            vendor_id: Uuid::new_v4(),
            order_number: "RO-1".into(),
            items,
            partial_allowed: false,
            delivery_address: Address::new("12 Oak St", "Pretoria"),
            required_by: Utc::now(),
            promised_delivery_at: None,
            predicted_delivery_at: None,
            delivered_at: None,
            order_state: OrderState::Pending,
            delivery_state: DeliveryState::OnTrack,
            subtotal: None,
            created_at: Utc::now(),
            updated_at: None,
        };
        assert_eq!(order.subtotal_value(), dec!(25));
        order.subtotal = Some(dec!(30));
        assert_eq!(order.subtotal_value(), dec!(30));
    }

    #[test]
    fn missing_unit_price_falls_back_deterministically() {
        let item = LineItem {
            sku: "SKU-NO-PRICE".into(),
            quantity: 3,
            unit_price: None,
            display_name: "unpriced".into(),
        };
        assert_eq!(
            item.line_total(),
            fallback_unit_price("SKU-NO-PRICE") * Decimal::from(3)
        );
    }
}
