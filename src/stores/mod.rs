//! Injected storage and directory interfaces.
//!
//! Every component receives its stores at construction; there is no ambient
//! database handle. Two backends ship with the crate: a dashmap-based
//! in-memory implementation ([`memory`]) and a sea-orm implementation
//! ([`sql`]).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::events::{EventRecord, NewEvent};
use crate::models::{
    InventoryPosition, Order, OrderVisibility, OwnerKind, Rating, SupplierProfile, VendorProfile,
};

pub mod memory;
pub mod sql;

/// Outcome of the atomic accept primitive. The backend performs the
/// visibility-status check and the order-state check in one read-modify-write
/// unit; the controller maps the outcome onto the error taxonomy.
#[derive(Clone, Debug, PartialEq)]
pub enum AcceptOutcome {
    /// Visibility flipped to `ACCEPTED` and the order moved to `ACCEPTED`.
    Accepted(Order),
    /// The order was already accepted (by this or another supplier).
    AlreadyAccepted,
    /// The order exists but is cancelled.
    OrderCancelled,
    /// No `VISIBLE` visibility exists for the (order, supplier) pair.
    NoVisibility,
    /// No such order.
    OrderNotFound,
}

/// Outcome of the decline primitive.
#[derive(Clone, Debug, PartialEq)]
pub enum DeclineOutcome {
    /// Visibility flipped to `DECLINED`. `none_visible_remaining` reports
    /// whether the order now has zero `VISIBLE` visibilities, so the
    /// controller can decide on escalation.
    Declined { none_visible_remaining: bool },
    /// No `VISIBLE` visibility exists for the (order, supplier) pair.
    NoVisibility,
    /// No such order.
    OrderNotFound,
}

/// Storage contract for orders and their per-supplier visibilities.
///
/// Visibilities live with the orders because acceptance mutates both in one
/// atomic unit.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert_order(&self, order: &Order) -> Result<(), ServiceError>;

    async fn order(&self, order_id: Uuid) -> Result<Option<Order>, ServiceError>;

    async fn orders_for_vendor(&self, vendor_id: Uuid) -> Result<Vec<Order>, ServiceError>;

    /// Whole-row write of mutable order fields. The row must exist.
    async fn update_order(&self, order: &Order) -> Result<(), ServiceError>;

    /// Bulk insert of fan-out rows, all `VISIBLE`.
    async fn insert_visibilities(&self, rows: &[OrderVisibility]) -> Result<(), ServiceError>;

    async fn visibility(
        &self,
        order_id: Uuid,
        supplier_id: Uuid,
    ) -> Result<Option<OrderVisibility>, ServiceError>;

    async fn visibilities_for_order(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<OrderVisibility>, ServiceError>;

    /// Ids of orders this supplier has accepted.
    async fn accepted_order_ids_for_supplier(
        &self,
        supplier_id: Uuid,
    ) -> Result<Vec<Uuid>, ServiceError>;

    /// Atomic accept: checks the pair's visibility is `VISIBLE` and the order
    /// is `PENDING`, then flips both, as a single read-modify-write unit.
    async fn try_accept(
        &self,
        order_id: Uuid,
        supplier_id: Uuid,
    ) -> Result<AcceptOutcome, ServiceError>;

    /// Flips the pair's visibility to `DECLINED` and reports whether any
    /// `VISIBLE` rows remain on the order.
    async fn try_decline(
        &self,
        order_id: Uuid,
        supplier_id: Uuid,
    ) -> Result<DeclineOutcome, ServiceError>;
}

/// Append-only audit log, queryable by order and by time range.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn append(&self, event: NewEvent) -> Result<EventRecord, ServiceError>;

    async fn events_for_order(&self, order_id: Uuid) -> Result<Vec<EventRecord>, ServiceError>;

    async fn events_in_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<EventRecord>, ServiceError>;
}

/// Typed update applied to an inventory position. Update-if-exists-else-create
/// semantics are an explicit two-branch operation on the backend; policy
/// fields left as `None` keep their stored values on the update branch.
#[derive(Clone, Debug, PartialEq)]
pub struct InventoryLevelUpdate {
    pub owner_id: Uuid,
    pub owner_kind: OwnerKind,
    pub sku: String,
    pub quantity: i32,
    pub reorder_threshold: Option<i32>,
    pub reorder_quantity: Option<i32>,
    pub auto_reorder_enabled: Option<bool>,
}

/// Storage contract for inventory positions.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    async fn position(
        &self,
        owner_id: Uuid,
        sku: &str,
    ) -> Result<Option<InventoryPosition>, ServiceError>;

    /// Applies the typed update, creating the position when absent.
    /// Returns the stored position after the write.
    async fn apply_level_update(
        &self,
        update: InventoryLevelUpdate,
    ) -> Result<InventoryPosition, ServiceError>;

    /// Stamps `last_ordered_at` without touching the quantity; physical
    /// receipt is a separate external event.
    async fn mark_ordered(
        &self,
        owner_id: Uuid,
        sku: &str,
        at: DateTime<Utc>,
    ) -> Result<(), ServiceError>;
}

/// Storage contract for supplier performance ratings.
#[async_trait]
pub trait RatingStore: Send + Sync {
    async fn insert_rating(&self, rating: &Rating) -> Result<(), ServiceError>;

    async fn rating_for_order(&self, order_id: Uuid) -> Result<Option<Rating>, ServiceError>;

    async fn ratings_for_supplier(&self, supplier_id: Uuid) -> Result<Vec<Rating>, ServiceError>;
}

/// SKU catalog used for order validation.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Returns the subset of `codes` that are unknown to the catalog,
    /// preserving input order.
    async fn missing_skus(&self, codes: &[String]) -> Result<Vec<String>, ServiceError>;
}

/// Read-only vendor/supplier directory.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn vendor(&self, vendor_id: Uuid) -> Result<Option<VendorProfile>, ServiceError>;

    async fn supplier(&self, supplier_id: Uuid) -> Result<Option<SupplierProfile>, ServiceError>;
}
