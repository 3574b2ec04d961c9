//! In-memory backend over dashmap.
//!
//! Used by the test suites and by wiring that runs without a database. The
//! accept race is serialized on the order's map entry: every accept for a
//! given order locks that entry first, so the visibility check and the order
//! state flip happen under one guard.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashSet;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::eligibility::EligibilityResolver;
use crate::errors::ServiceError;
use crate::events::{EventRecord, NewEvent};
use crate::models::{
    InventoryPosition, Order, OrderState, OrderVisibility, Rating, SupplierProfile, VendorProfile,
    VisibilityStatus,
};
use crate::stores::{
    AcceptOutcome, CatalogStore, DeclineOutcome, Directory, EventStore, InventoryLevelUpdate,
    InventoryStore, OrderStore, RatingStore,
};

/// One store backing every interface, so tests wire a single handle.
#[derive(Default)]
pub struct InMemoryStore {
    orders: DashMap<Uuid, Order>,
    visibilities: DashMap<(Uuid, Uuid), OrderVisibility>,
    events: RwLock<Vec<EventRecord>>,
    ratings: DashMap<Uuid, Rating>,
    inventory: DashMap<(Uuid, String), InventoryPosition>,
    skus: DashMap<String, String>,
    vendors: DashMap<Uuid, VendorProfile>,
    suppliers: DashMap<Uuid, SupplierProfile>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_sku(&self, code: impl Into<String>, display_name: impl Into<String>) {
        self.skus.insert(code.into(), display_name.into());
    }

    pub fn seed_vendor(&self, profile: VendorProfile) {
        self.vendors.insert(profile.id, profile);
    }

    pub fn seed_supplier(&self, profile: SupplierProfile) {
        self.suppliers.insert(profile.id, profile);
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn insert_order(&self, order: &Order) -> Result<(), ServiceError> {
        self.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn order(&self, order_id: Uuid) -> Result<Option<Order>, ServiceError> {
        Ok(self.orders.get(&order_id).map(|o| o.clone()))
    }

    async fn orders_for_vendor(&self, vendor_id: Uuid) -> Result<Vec<Order>, ServiceError> {
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .filter(|entry| entry.vendor_id == vendor_id)
            .map(|entry| entry.clone())
            .collect();
        orders.sort_by_key(|o| o.created_at);
        Ok(orders)
    }

    async fn update_order(&self, order: &Order) -> Result<(), ServiceError> {
        match self.orders.get_mut(&order.id) {
            Some(mut stored) => {
                *stored = order.clone();
                Ok(())
            }
            None => Err(ServiceError::not_found("Order", order.id)),
        }
    }

    async fn insert_visibilities(&self, rows: &[OrderVisibility]) -> Result<(), ServiceError> {
        for row in rows {
            self.visibilities
                .insert((row.order_id, row.supplier_id), row.clone());
        }
        Ok(())
    }

    async fn visibility(
        &self,
        order_id: Uuid,
        supplier_id: Uuid,
    ) -> Result<Option<OrderVisibility>, ServiceError> {
        Ok(self
            .visibilities
            .get(&(order_id, supplier_id))
            .map(|v| v.clone()))
    }

    async fn visibilities_for_order(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<OrderVisibility>, ServiceError> {
        Ok(self
            .visibilities
            .iter()
            .filter(|entry| entry.order_id == order_id)
            .map(|entry| entry.clone())
            .collect())
    }

    async fn accepted_order_ids_for_supplier(
        &self,
        supplier_id: Uuid,
    ) -> Result<Vec<Uuid>, ServiceError> {
        Ok(self
            .visibilities
            .iter()
            .filter(|entry| {
                entry.supplier_id == supplier_id && entry.status == VisibilityStatus::Accepted
            })
            .map(|entry| entry.order_id)
            .collect())
    }

    async fn try_accept(
        &self,
        order_id: Uuid,
        supplier_id: Uuid,
    ) -> Result<AcceptOutcome, ServiceError> {
        // Entry guard on the order serializes concurrent accepts for it.
        let Some(mut order) = self.orders.get_mut(&order_id) else {
            return Ok(AcceptOutcome::OrderNotFound);
        };
        match order.order_state {
            OrderState::Cancelled => return Ok(AcceptOutcome::OrderCancelled),
            OrderState::Accepted => return Ok(AcceptOutcome::AlreadyAccepted),
            OrderState::Pending => {}
        }
        let Some(mut visibility) = self.visibilities.get_mut(&(order_id, supplier_id)) else {
            return Ok(AcceptOutcome::NoVisibility);
        };
        if visibility.status != VisibilityStatus::Visible {
            return Ok(AcceptOutcome::NoVisibility);
        }

        let now = Utc::now();
        visibility.status = VisibilityStatus::Accepted;
        visibility.updated_at = Some(now);
        order.order_state = OrderState::Accepted;
        order.updated_at = Some(now);
        Ok(AcceptOutcome::Accepted(order.clone()))
    }

    async fn try_decline(
        &self,
        order_id: Uuid,
        supplier_id: Uuid,
    ) -> Result<DeclineOutcome, ServiceError> {
        if !self.orders.contains_key(&order_id) {
            return Ok(DeclineOutcome::OrderNotFound);
        }
        {
            let Some(mut visibility) = self.visibilities.get_mut(&(order_id, supplier_id)) else {
                return Ok(DeclineOutcome::NoVisibility);
            };
            if visibility.status != VisibilityStatus::Visible {
                return Ok(DeclineOutcome::NoVisibility);
            }
            visibility.status = VisibilityStatus::Declined;
            visibility.updated_at = Some(Utc::now());
        }
        let none_visible_remaining = !self
            .visibilities
            .iter()
            .any(|entry| entry.order_id == order_id && entry.status == VisibilityStatus::Visible);
        Ok(DeclineOutcome::Declined {
            none_visible_remaining,
        })
    }
}

#[async_trait]
impl EventStore for InMemoryStore {
    async fn append(&self, event: NewEvent) -> Result<EventRecord, ServiceError> {
        let record = EventRecord {
            id: Uuid::new_v4(),
            event_type: event.event_type,
            order_id: event.order_id,
            details: event.details,
            created_at: Utc::now(),
        };
        self.events.write().await.push(record.clone());
        Ok(record)
    }

    async fn events_for_order(&self, order_id: Uuid) -> Result<Vec<EventRecord>, ServiceError> {
        Ok(self
            .events
            .read()
            .await
            .iter()
            .filter(|e| e.order_id == Some(order_id))
            .cloned()
            .collect())
    }

    async fn events_in_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<EventRecord>, ServiceError> {
        Ok(self
            .events
            .read()
            .await
            .iter()
            .filter(|e| e.created_at >= from && e.created_at < to)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl InventoryStore for InMemoryStore {
    async fn position(
        &self,
        owner_id: Uuid,
        sku: &str,
    ) -> Result<Option<InventoryPosition>, ServiceError> {
        Ok(self
            .inventory
            .get(&(owner_id, sku.to_string()))
            .map(|p| p.clone()))
    }

    async fn apply_level_update(
        &self,
        update: InventoryLevelUpdate,
    ) -> Result<InventoryPosition, ServiceError> {
        let now = Utc::now();
        let key = (update.owner_id, update.sku.clone());
        let stored = match self.inventory.entry(key) {
            Entry::Occupied(mut occupied) => {
                let position = occupied.get_mut();
                position.quantity = update.quantity;
                if let Some(threshold) = update.reorder_threshold {
                    position.reorder_threshold = threshold;
                }
                if let Some(reorder_quantity) = update.reorder_quantity {
                    position.reorder_quantity = Some(reorder_quantity);
                }
                if let Some(enabled) = update.auto_reorder_enabled {
                    position.auto_reorder_enabled = enabled;
                }
                position.updated_at = now;
                position.clone()
            }
            Entry::Vacant(vacant) => {
                let position = InventoryPosition {
                    owner_id: update.owner_id,
                    owner_kind: update.owner_kind,
                    sku: update.sku,
                    quantity: update.quantity,
                    reorder_threshold: update.reorder_threshold.unwrap_or(0),
                    reorder_quantity: update.reorder_quantity,
                    auto_reorder_enabled: update.auto_reorder_enabled.unwrap_or(false),
                    last_ordered_at: None,
                    updated_at: now,
                };
                vacant.insert(position.clone());
                position
            }
        };
        Ok(stored)
    }

    async fn mark_ordered(
        &self,
        owner_id: Uuid,
        sku: &str,
        at: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        match self.inventory.get_mut(&(owner_id, sku.to_string())) {
            Some(mut position) => {
                position.last_ordered_at = Some(at);
                Ok(())
            }
            None => Err(ServiceError::not_found("Inventory position", sku)),
        }
    }
}

#[async_trait]
impl RatingStore for InMemoryStore {
    async fn insert_rating(&self, rating: &Rating) -> Result<(), ServiceError> {
        self.ratings.insert(rating.order_id, rating.clone());
        Ok(())
    }

    async fn rating_for_order(&self, order_id: Uuid) -> Result<Option<Rating>, ServiceError> {
        Ok(self.ratings.get(&order_id).map(|r| r.clone()))
    }

    async fn ratings_for_supplier(&self, supplier_id: Uuid) -> Result<Vec<Rating>, ServiceError> {
        Ok(self
            .ratings
            .iter()
            .filter(|entry| entry.supplier_id == supplier_id)
            .map(|entry| entry.clone())
            .collect())
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn missing_skus(&self, codes: &[String]) -> Result<Vec<String>, ServiceError> {
        let mut seen = HashSet::new();
        Ok(codes
            .iter()
            .filter(|code| !self.skus.contains_key(*code) && seen.insert((*code).clone()))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl Directory for InMemoryStore {
    async fn vendor(&self, vendor_id: Uuid) -> Result<Option<VendorProfile>, ServiceError> {
        Ok(self.vendors.get(&vendor_id).map(|v| v.clone()))
    }

    async fn supplier(&self, supplier_id: Uuid) -> Result<Option<SupplierProfile>, ServiceError> {
        Ok(self.suppliers.get(&supplier_id).map(|s| s.clone()))
    }
}

/// What one supplier can see: the SKUs it carries and the areas it serves.
#[derive(Clone, Debug, Default)]
pub struct SupplierCoverage {
    pub skus: HashSet<String>,
    pub service_areas: HashSet<String>,
}

/// Reference eligibility resolver over in-memory coverage data.
///
/// A supplier is eligible when it serves the order's delivery area and
/// carries every ordered SKU, or at least one when the order allows partial
/// fulfillment. The real resolver lives outside this core; this one exists
/// for tests and for wiring without it.
#[derive(Default)]
pub struct CatalogEligibility {
    coverage: DashMap<Uuid, SupplierCoverage>,
}

impl CatalogEligibility {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_coverage(
        &self,
        supplier_id: Uuid,
        skus: impl IntoIterator<Item = String>,
        service_areas: impl IntoIterator<Item = String>,
    ) {
        self.coverage.insert(
            supplier_id,
            SupplierCoverage {
                skus: skus.into_iter().collect(),
                service_areas: service_areas.into_iter().collect(),
            },
        );
    }
}

#[async_trait]
impl EligibilityResolver for CatalogEligibility {
    async fn resolve_eligible_suppliers(
        &self,
        order: &Order,
    ) -> Result<HashSet<Uuid>, ServiceError> {
        let eligible = self
            .coverage
            .iter()
            .filter(|entry| {
                let coverage = entry.value();
                if !coverage.service_areas.contains(&order.delivery_address.area) {
                    return false;
                }
                let carried = |item: &crate::models::LineItem| coverage.skus.contains(&item.sku);
                if order.partial_allowed {
                    order.items.iter().any(carried)
                } else {
                    order.items.iter().all(carried)
                }
            })
            .map(|entry| *entry.key())
            .collect();
        Ok(eligible)
    }
}
