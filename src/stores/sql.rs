//! sea-orm backend.
//!
//! The accept race is resolved inside one transaction: the order row is
//! re-checked with a conditional `UPDATE … WHERE order_state = 'PENDING'`,
//! so a second writer observes zero affected rows instead of overwriting the
//! winner.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::{
    catalog_sku, event_record, inventory_position, order, order_line_item, order_visibility,
    rating,
};
use crate::errors::ServiceError;
use crate::events::{EventRecord, NewEvent};
use crate::models::{
    Address, InventoryPosition, LineItem, Order, OrderState, OrderVisibility, OwnerKind, Rating,
    VisibilityStatus,
};
use crate::stores::{
    AcceptOutcome, CatalogStore, DeclineOutcome, EventStore, InventoryLevelUpdate, InventoryStore,
    OrderStore, RatingStore,
};

/// Store implementation over a sea-orm connection pool.
#[derive(Clone)]
pub struct SqlStore {
    db: Arc<DatabaseConnection>,
}

impl SqlStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> Arc<DatabaseConnection> {
        self.db.clone()
    }
}

fn parse_enum<T: FromStr>(raw: &str, what: &str) -> Result<T, ServiceError> {
    raw.parse::<T>()
        .map_err(|_| ServiceError::InternalError(format!("stored {} '{}' is not valid", what, raw)))
}

fn order_to_domain(
    model: order::Model,
    items: Vec<order_line_item::Model>,
) -> Result<Order, ServiceError> {
    Ok(Order {
        id: model.id,
        vendor_id: model.vendor_id,
        order_number: model.order_number,
        items: items
            .into_iter()
            .map(|item| LineItem {
                sku: item.sku,
                quantity: item.quantity,
                unit_price: item.unit_price,
                display_name: item.display_name,
            })
            .collect(),
        partial_allowed: model.partial_allowed,
        delivery_address: Address::new(model.delivery_street, model.delivery_area),
        required_by: model.required_by,
        promised_delivery_at: model.promised_delivery_at,
        predicted_delivery_at: model.predicted_delivery_at,
        delivered_at: model.delivered_at,
        order_state: parse_enum(&model.order_state, "order state")?,
        delivery_state: parse_enum(&model.delivery_state, "delivery state")?,
        subtotal: model.subtotal,
        created_at: model.created_at,
        updated_at: model.updated_at,
    })
}

fn visibility_to_domain(model: order_visibility::Model) -> Result<OrderVisibility, ServiceError> {
    Ok(OrderVisibility {
        order_id: model.order_id,
        supplier_id: model.supplier_id,
        status: parse_enum(&model.status, "visibility status")?,
        created_at: model.created_at,
        updated_at: model.updated_at,
    })
}

fn event_to_domain(model: event_record::Model) -> Result<EventRecord, ServiceError> {
    let details = serde_json::from_str(&model.details)
        .map_err(|e| ServiceError::EventError(format!("stored event details invalid: {}", e)))?;
    Ok(EventRecord {
        id: model.id,
        event_type: model.event_type,
        order_id: model.order_id,
        details,
        created_at: model.created_at,
    })
}

fn position_to_domain(model: inventory_position::Model) -> Result<InventoryPosition, ServiceError> {
    Ok(InventoryPosition {
        owner_id: model.owner_id,
        owner_kind: parse_enum(&model.owner_kind, "owner kind")?,
        sku: model.sku,
        quantity: model.quantity,
        reorder_threshold: model.reorder_threshold,
        reorder_quantity: model.reorder_quantity,
        auto_reorder_enabled: model.auto_reorder_enabled,
        last_ordered_at: model.last_ordered_at,
        updated_at: model.updated_at,
    })
}

fn rating_to_domain(model: rating::Model) -> Rating {
    Rating {
        id: model.id,
        order_id: model.order_id,
        supplier_id: model.supplier_id,
        vendor_id: model.vendor_id,
        score: model.score,
        comment: model.comment,
        accuracy_ok: model.accuracy_ok,
        created_at: model.created_at,
    }
}

#[async_trait]
impl OrderStore for SqlStore {
    async fn insert_order(&self, new_order: &Order) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        let row = order::ActiveModel {
            id: Set(new_order.id),
            vendor_id: Set(new_order.vendor_id),
            order_number: Set(new_order.order_number.clone()),
            partial_allowed: Set(new_order.partial_allowed),
            delivery_street: Set(new_order.delivery_address.street.clone()),
            delivery_area: Set(new_order.delivery_address.area.clone()),
            required_by: Set(new_order.required_by),
            promised_delivery_at: Set(new_order.promised_delivery_at),
            predicted_delivery_at: Set(new_order.predicted_delivery_at),
            delivered_at: Set(new_order.delivered_at),
            order_state: Set(new_order.order_state.to_string()),
            delivery_state: Set(new_order.delivery_state.to_string()),
            subtotal: Set(new_order.subtotal),
            created_at: Set(new_order.created_at),
            updated_at: Set(new_order.updated_at),
        };
        row.insert(&txn).await?;

        for item in &new_order.items {
            let item_row = order_line_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(new_order.id),
                sku: Set(item.sku.clone()),
                quantity: Set(item.quantity),
                unit_price: Set(item.unit_price),
                display_name: Set(item.display_name.clone()),
            };
            item_row.insert(&txn).await?;
        }

        txn.commit().await?;
        Ok(())
    }

    async fn order(&self, order_id: Uuid) -> Result<Option<Order>, ServiceError> {
        let Some(row) = order::Entity::find_by_id(order_id).one(&*self.db).await? else {
            return Ok(None);
        };
        let items = order_line_item::Entity::find()
            .filter(order_line_item::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await?;
        Ok(Some(order_to_domain(row, items)?))
    }

    async fn orders_for_vendor(&self, vendor_id: Uuid) -> Result<Vec<Order>, ServiceError> {
        let rows = order::Entity::find()
            .filter(order::Column::VendorId.eq(vendor_id))
            .order_by_asc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        let order_ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let items = order_line_item::Entity::find()
            .filter(order_line_item::Column::OrderId.is_in(order_ids))
            .all(&*self.db)
            .await?;

        let mut items_by_order: HashMap<Uuid, Vec<order_line_item::Model>> = HashMap::new();
        for item in items {
            items_by_order.entry(item.order_id).or_default().push(item);
        }
        rows.into_iter()
            .map(|row| {
                let items = items_by_order.remove(&row.id).unwrap_or_default();
                order_to_domain(row, items)
            })
            .collect()
    }

    async fn update_order(&self, updated: &Order) -> Result<(), ServiceError> {
        let existing = order::Entity::find_by_id(updated.id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Order", updated.id))?;

        let mut row: order::ActiveModel = existing.into();
        row.promised_delivery_at = Set(updated.promised_delivery_at);
        row.predicted_delivery_at = Set(updated.predicted_delivery_at);
        row.delivered_at = Set(updated.delivered_at);
        row.order_state = Set(updated.order_state.to_string());
        row.delivery_state = Set(updated.delivery_state.to_string());
        row.subtotal = Set(updated.subtotal);
        row.updated_at = Set(updated.updated_at);
        row.update(&*self.db).await?;
        Ok(())
    }

    async fn insert_visibilities(&self, rows: &[OrderVisibility]) -> Result<(), ServiceError> {
        if rows.is_empty() {
            return Ok(());
        }
        let models: Vec<order_visibility::ActiveModel> = rows
            .iter()
            .map(|row| order_visibility::ActiveModel {
                order_id: Set(row.order_id),
                supplier_id: Set(row.supplier_id),
                status: Set(row.status.to_string()),
                created_at: Set(row.created_at),
                updated_at: Set(row.updated_at),
            })
            .collect();
        order_visibility::Entity::insert_many(models)
            .exec(&*self.db)
            .await?;
        Ok(())
    }

    async fn visibility(
        &self,
        order_id: Uuid,
        supplier_id: Uuid,
    ) -> Result<Option<OrderVisibility>, ServiceError> {
        let row = order_visibility::Entity::find_by_id((order_id, supplier_id))
            .one(&*self.db)
            .await?;
        row.map(visibility_to_domain).transpose()
    }

    async fn visibilities_for_order(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<OrderVisibility>, ServiceError> {
        let rows = order_visibility::Entity::find()
            .filter(order_visibility::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await?;
        rows.into_iter().map(visibility_to_domain).collect()
    }

    async fn accepted_order_ids_for_supplier(
        &self,
        supplier_id: Uuid,
    ) -> Result<Vec<Uuid>, ServiceError> {
        let rows = order_visibility::Entity::find()
            .filter(order_visibility::Column::SupplierId.eq(supplier_id))
            .filter(order_visibility::Column::Status.eq(VisibilityStatus::Accepted.to_string()))
            .all(&*self.db)
            .await?;
        Ok(rows.into_iter().map(|row| row.order_id).collect())
    }

    async fn try_accept(
        &self,
        order_id: Uuid,
        supplier_id: Uuid,
    ) -> Result<AcceptOutcome, ServiceError> {
        let txn = self.db.begin().await?;

        let Some(order_row) = order::Entity::find_by_id(order_id).one(&txn).await? else {
            return Ok(AcceptOutcome::OrderNotFound);
        };
        let state: OrderState = parse_enum(&order_row.order_state, "order state")?;
        match state {
            OrderState::Cancelled => return Ok(AcceptOutcome::OrderCancelled),
            OrderState::Accepted => return Ok(AcceptOutcome::AlreadyAccepted),
            OrderState::Pending => {}
        }

        let Some(vis_row) = order_visibility::Entity::find_by_id((order_id, supplier_id))
            .one(&txn)
            .await?
        else {
            return Ok(AcceptOutcome::NoVisibility);
        };
        if vis_row.status != VisibilityStatus::Visible.to_string() {
            return Ok(AcceptOutcome::NoVisibility);
        }

        let now = Utc::now();
        // compare-and-set: only the first writer finds the row still PENDING
        let updated = order::Entity::update_many()
            .col_expr(
                order::Column::OrderState,
                Expr::value(OrderState::Accepted.to_string()),
            )
            .col_expr(order::Column::UpdatedAt, Expr::value(now))
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::OrderState.eq(OrderState::Pending.to_string()))
            .exec(&txn)
            .await?;
        if updated.rows_affected == 0 {
            return Ok(AcceptOutcome::AlreadyAccepted);
        }

        let mut vis_active: order_visibility::ActiveModel = vis_row.into();
        vis_active.status = Set(VisibilityStatus::Accepted.to_string());
        vis_active.updated_at = Set(Some(now));
        vis_active.update(&txn).await?;

        txn.commit().await?;

        let accepted = self
            .order(order_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Order", order_id))?;
        Ok(AcceptOutcome::Accepted(accepted))
    }

    async fn try_decline(
        &self,
        order_id: Uuid,
        supplier_id: Uuid,
    ) -> Result<DeclineOutcome, ServiceError> {
        let txn = self.db.begin().await?;

        if order::Entity::find_by_id(order_id).one(&txn).await?.is_none() {
            return Ok(DeclineOutcome::OrderNotFound);
        }
        let Some(vis_row) = order_visibility::Entity::find_by_id((order_id, supplier_id))
            .one(&txn)
            .await?
        else {
            return Ok(DeclineOutcome::NoVisibility);
        };
        if vis_row.status != VisibilityStatus::Visible.to_string() {
            return Ok(DeclineOutcome::NoVisibility);
        }

        let mut vis_active: order_visibility::ActiveModel = vis_row.into();
        vis_active.status = Set(VisibilityStatus::Declined.to_string());
        vis_active.updated_at = Set(Some(Utc::now()));
        vis_active.update(&txn).await?;

        let remaining_visible = order_visibility::Entity::find()
            .filter(order_visibility::Column::OrderId.eq(order_id))
            .filter(order_visibility::Column::Status.eq(VisibilityStatus::Visible.to_string()))
            .count(&txn)
            .await?;

        txn.commit().await?;
        Ok(DeclineOutcome::Declined {
            none_visible_remaining: remaining_visible == 0,
        })
    }
}

#[async_trait]
impl EventStore for SqlStore {
    async fn append(&self, event: NewEvent) -> Result<EventRecord, ServiceError> {
        let details = serde_json::to_string(&event.details)
            .map_err(|e| ServiceError::EventError(format!("event details not serializable: {}", e)))?;
        let row = event_record::ActiveModel {
            id: Set(Uuid::new_v4()),
            event_type: Set(event.event_type),
            order_id: Set(event.order_id),
            details: Set(details),
            created_at: Set(Utc::now()),
        };
        let stored = row.insert(&*self.db).await?;
        event_to_domain(stored)
    }

    async fn events_for_order(&self, order_id: Uuid) -> Result<Vec<EventRecord>, ServiceError> {
        let rows = event_record::Entity::find()
            .filter(event_record::Column::OrderId.eq(order_id))
            .order_by_asc(event_record::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        rows.into_iter().map(event_to_domain).collect()
    }

    async fn events_in_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<EventRecord>, ServiceError> {
        let rows = event_record::Entity::find()
            .filter(event_record::Column::CreatedAt.gte(from))
            .filter(event_record::Column::CreatedAt.lt(to))
            .order_by_asc(event_record::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        rows.into_iter().map(event_to_domain).collect()
    }
}

#[async_trait]
impl InventoryStore for SqlStore {
    async fn position(
        &self,
        owner_id: Uuid,
        sku: &str,
    ) -> Result<Option<InventoryPosition>, ServiceError> {
        let row = inventory_position::Entity::find_by_id((owner_id, sku.to_string()))
            .one(&*self.db)
            .await?;
        row.map(position_to_domain).transpose()
    }

    async fn apply_level_update(
        &self,
        update: InventoryLevelUpdate,
    ) -> Result<InventoryPosition, ServiceError> {
        let now = Utc::now();
        let txn = self.db.begin().await?;

        let existing = inventory_position::Entity::find_by_id((update.owner_id, update.sku.clone()))
            .one(&txn)
            .await?;

        let stored = match existing {
            Some(row) => {
                let mut active: inventory_position::ActiveModel = row.into();
                active.quantity = Set(update.quantity);
                if let Some(threshold) = update.reorder_threshold {
                    active.reorder_threshold = Set(threshold);
                }
                if let Some(reorder_quantity) = update.reorder_quantity {
                    active.reorder_quantity = Set(Some(reorder_quantity));
                }
                if let Some(enabled) = update.auto_reorder_enabled {
                    active.auto_reorder_enabled = Set(enabled);
                }
                active.updated_at = Set(now);
                active.update(&txn).await?
            }
            None => {
                let active = inventory_position::ActiveModel {
                    owner_id: Set(update.owner_id),
                    sku: Set(update.sku.clone()),
                    owner_kind: Set(update.owner_kind.to_string()),
                    quantity: Set(update.quantity),
                    reorder_threshold: Set(update.reorder_threshold.unwrap_or(0)),
                    reorder_quantity: Set(update.reorder_quantity),
                    auto_reorder_enabled: Set(update.auto_reorder_enabled.unwrap_or(false)),
                    last_ordered_at: Set(None),
                    updated_at: Set(now),
                };
                active.insert(&txn).await?
            }
        };

        txn.commit().await?;
        position_to_domain(stored)
    }

    async fn mark_ordered(
        &self,
        owner_id: Uuid,
        sku: &str,
        at: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        let row = inventory_position::Entity::find_by_id((owner_id, sku.to_string()))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Inventory position", sku))?;
        let mut active: inventory_position::ActiveModel = row.into();
        active.last_ordered_at = Set(Some(at));
        active.update(&*self.db).await?;
        Ok(())
    }
}

#[async_trait]
impl RatingStore for SqlStore {
    async fn insert_rating(&self, new_rating: &Rating) -> Result<(), ServiceError> {
        let row = rating::ActiveModel {
            id: Set(new_rating.id),
            order_id: Set(new_rating.order_id),
            supplier_id: Set(new_rating.supplier_id),
            vendor_id: Set(new_rating.vendor_id),
            score: Set(new_rating.score),
            comment: Set(new_rating.comment.clone()),
            accuracy_ok: Set(new_rating.accuracy_ok),
            created_at: Set(new_rating.created_at),
        };
        row.insert(&*self.db).await?;
        Ok(())
    }

    async fn rating_for_order(&self, order_id: Uuid) -> Result<Option<Rating>, ServiceError> {
        let row = rating::Entity::find()
            .filter(rating::Column::OrderId.eq(order_id))
            .one(&*self.db)
            .await?;
        Ok(row.map(rating_to_domain))
    }

    async fn ratings_for_supplier(&self, supplier_id: Uuid) -> Result<Vec<Rating>, ServiceError> {
        let rows = rating::Entity::find()
            .filter(rating::Column::SupplierId.eq(supplier_id))
            .all(&*self.db)
            .await?;
        Ok(rows.into_iter().map(rating_to_domain).collect())
    }
}

#[async_trait]
impl CatalogStore for SqlStore {
    async fn missing_skus(&self, codes: &[String]) -> Result<Vec<String>, ServiceError> {
        if codes.is_empty() {
            return Ok(Vec::new());
        }
        let known: HashSet<String> = catalog_sku::Entity::find()
            .filter(catalog_sku::Column::Sku.is_in(codes.to_vec()))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|row| row.sku)
            .collect();

        let mut seen = HashSet::new();
        Ok(codes
            .iter()
            .filter(|code| !known.contains(*code) && seen.insert((*code).clone()))
            .cloned()
            .collect())
    }
}
