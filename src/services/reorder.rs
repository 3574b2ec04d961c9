//! Auto-reorder trigger.
//!
//! Invoked synchronously by inventory updates. The inventory write commits
//! first; everything downstream is best-effort and is reported through a
//! structured outcome instead of an error, so a reorder failure can never
//! roll back a committed stock change.

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::events::NewEvent;
use crate::models::{Address, InventoryPosition, Order, OwnerKind};
use crate::services::orders::{LineItemRequest, OrderService, PlaceOrderRequest};
use crate::stores::{Directory, EventStore, InventoryLevelUpdate, InventoryStore};

/// Structured result of one trigger evaluation. `triggered` reports whether
/// the threshold condition fired; `success` whether an order was actually
/// placed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReorderOutcome {
    pub triggered: bool,
    pub success: bool,
    pub message: String,
    pub order: Option<Order>,
}

impl ReorderOutcome {
    fn not_triggered(message: impl Into<String>) -> Self {
        Self {
            triggered: false,
            success: false,
            message: message.into(),
            order: None,
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            triggered: true,
            success: false,
            message: message.into(),
            order: None,
        }
    }
}

/// The inventory write plus the trigger outcome it produced.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InventoryUpdateResult {
    pub position: InventoryPosition,
    pub reorder: ReorderOutcome,
}

/// Observes vendor-side inventory mutations and places replenishment orders
/// through the same lifecycle controller as manual placement.
#[derive(Clone)]
pub struct AutoReorderService {
    inventory: Arc<dyn InventoryStore>,
    directory: Arc<dyn Directory>,
    events: Arc<dyn EventStore>,
    orders: OrderService,
    config: Arc<AppConfig>,
}

impl AutoReorderService {
    pub fn new(
        inventory: Arc<dyn InventoryStore>,
        directory: Arc<dyn Directory>,
        events: Arc<dyn EventStore>,
        orders: OrderService,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            inventory,
            directory,
            events,
            orders,
            config,
        }
    }

    /// Applies the stock update, then evaluates the trigger against the
    /// stored position. The update is committed before the trigger runs and
    /// stays committed whatever the trigger reports.
    #[instrument(skip(self, update), fields(owner_id = %update.owner_id, sku = %update.sku, quantity = update.quantity))]
    pub async fn apply_inventory_update(
        &self,
        update: InventoryLevelUpdate,
    ) -> Result<InventoryUpdateResult, ServiceError> {
        let position = self.inventory.apply_level_update(update).await?;
        let reorder = self.evaluate_trigger(&position).await;
        Ok(InventoryUpdateResult { position, reorder })
    }

    async fn evaluate_trigger(&self, position: &InventoryPosition) -> ReorderOutcome {
        if position.owner_kind != OwnerKind::Vendor {
            return ReorderOutcome::not_triggered("Supplier stock does not auto-reorder");
        }
        if !position.auto_reorder_enabled {
            return ReorderOutcome::not_triggered("Auto-reorder is disabled for this position");
        }
        if !position.below_threshold() {
            return ReorderOutcome::not_triggered(format!(
                "Quantity {} is above the reorder threshold {}",
                position.quantity, position.reorder_threshold
            ));
        }

        let cooldown = Duration::hours(self.config.auto_reorder.cooldown_hours);
        if cooldown > Duration::zero() {
            if let Some(last_ordered) = position.last_ordered_at {
                if Utc::now() - last_ordered < cooldown {
                    info!(sku = %position.sku, owner_id = %position.owner_id, "Reorder suppressed by cooldown");
                    return ReorderOutcome::not_triggered(format!(
                        "Reorder suppressed: last ordered at {} is within the {}h cooldown",
                        last_ordered, self.config.auto_reorder.cooldown_hours
                    ));
                }
            }
        }

        match self.place_reorder(position).await {
            Ok(order) => {
                info!(sku = %position.sku, order_id = %order.id, "Auto-reorder placed");
                ReorderOutcome {
                    triggered: true,
                    success: true,
                    message: format!("Reorder {} placed for {}", order.order_number, position.sku),
                    order: Some(order),
                }
            }
            Err(message) => {
                warn!(sku = %position.sku, owner_id = %position.owner_id, message = %message, "Auto-reorder trigger fired but no order was placed");
                ReorderOutcome::failed(message)
            }
        }
    }

    /// Places the replenishment order. Returns a human-readable message on
    /// failure; the caller folds it into the outcome rather than propagating.
    async fn place_reorder(&self, position: &InventoryPosition) -> Result<Order, String> {
        let vendor = self
            .directory
            .vendor(position.owner_id)
            .await
            .map_err(|e| format!("Vendor lookup failed: {}", e))?
            .ok_or_else(|| format!("Vendor {} is not on file", position.owner_id))?;
        let address = vendor
            .address
            .ok_or_else(|| format!("Vendor {} has no delivery address on file", vendor.id))?;
        let area = if address.area.is_empty() {
            self.config.auto_reorder.default_delivery_area.clone()
        } else {
            address.area
        };

        let quantity = position
            .reorder_quantity
            .unwrap_or(self.config.auto_reorder.default_reorder_quantity);
        let now = Utc::now();
        let request = PlaceOrderRequest {
            vendor_id: vendor.id,
            order_number: format!("AUTO-{}", &Uuid::new_v4().simple().to_string()[..8]),
            items: vec![LineItemRequest {
                sku: position.sku.clone(),
                quantity,
                unit_price: None,
                display_name: position.sku.clone(),
            }],
            partial_allowed: false,
            delivery_address: Address::new(address.street, area),
            required_by: now + Duration::hours(self.config.auto_reorder.lead_time_hours),
            promised_delivery_at: None,
        };

        let order = self
            .orders
            .place(request)
            .await
            .map_err(|e| format!("Order placement failed: {}", e))?;

        if let Err(e) = self
            .inventory
            .mark_ordered(position.owner_id, &position.sku, now)
            .await
        {
            warn!(sku = %position.sku, error = %e, "Failed to stamp last_ordered_at");
        }
        if let Err(e) = self
            .events
            .append(NewEvent::auto_reorder_triggered(
                &position.sku,
                vendor.id,
                order.id,
            ))
            .await
        {
            warn!(order_id = %order.id, error = %e, "Failed to append auto-reorder event");
        }
        Ok(order)
    }
}
