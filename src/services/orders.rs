//! Order Lifecycle Controller and visibility fan-out.
//!
//! Owns the order state machine (PENDING/ACCEPTED/CANCELLED) and the delivery
//! state machine (ON_TRACK/AT_RISK/DELIVERED/FAILED), and is the only legal
//! mutation entry point for order and visibility state.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::config::AppConfig;
use crate::eligibility::EligibilityResolver;
use crate::errors::ServiceError;
use crate::events::NewEvent;
use crate::models::{
    Address, DeliveryState, LineItem, Order, OrderState, OrderVisibility, Rating,
    VisibilityStatus,
};
use crate::notifications::{DelayEmailSender, DelayNotifier};
use crate::services::risk;
use crate::stores::{AcceptOutcome, CatalogStore, DeclineOutcome, EventStore, OrderStore, RatingStore};

/// Draft submitted by a vendor action or by the auto-reorder trigger.
#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct PlaceOrderRequest {
    pub vendor_id: Uuid,
    #[validate(length(min = 1, message = "Order number is required"))]
    pub order_number: String,
    #[validate(length(min = 1, message = "At least one line item is required"))]
    pub items: Vec<LineItemRequest>,
    pub partial_allowed: bool,
    pub delivery_address: Address,
    pub required_by: DateTime<Utc>,
    pub promised_delivery_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LineItemRequest {
    pub sku: String,
    pub quantity: i32,
    pub unit_price: Option<Decimal>,
    pub display_name: String,
}

/// An order together with its recomputed risk classification. The `at_risk`
/// field is derived on read and must not be cached as ground truth.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrderWithRisk {
    pub order: Order,
    pub at_risk: bool,
}

/// Service owning order and visibility state transitions.
#[derive(Clone)]
pub struct OrderService {
    orders: Arc<dyn OrderStore>,
    events: Arc<dyn EventStore>,
    catalog: Arc<dyn CatalogStore>,
    eligibility: Arc<dyn EligibilityResolver>,
    ratings: Arc<dyn RatingStore>,
    notifier: Arc<dyn DelayNotifier>,
    emailer: Arc<dyn DelayEmailSender>,
    config: Arc<AppConfig>,
}

impl OrderService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        orders: Arc<dyn OrderStore>,
        events: Arc<dyn EventStore>,
        catalog: Arc<dyn CatalogStore>,
        eligibility: Arc<dyn EligibilityResolver>,
        ratings: Arc<dyn RatingStore>,
        notifier: Arc<dyn DelayNotifier>,
        emailer: Arc<dyn DelayEmailSender>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            orders,
            events,
            catalog,
            eligibility,
            ratings,
            notifier,
            emailer,
            config,
        }
    }

    /// Validates and persists the draft, then fans it out to every eligible
    /// supplier. An empty eligibility result is a successful placement that
    /// lands directly in `AT_RISK`; callers must not retry it.
    #[instrument(skip(self, request), fields(vendor_id = %request.vendor_id, order_number = %request.order_number))]
    pub async fn place(&self, request: PlaceOrderRequest) -> Result<Order, ServiceError> {
        request.validate()?;
        if let Some(bad) = request.items.iter().find(|item| item.quantity <= 0) {
            return Err(ServiceError::ValidationError(format!(
                "Line item {} must have a positive quantity",
                bad.sku
            )));
        }

        let skus: Vec<String> = request.items.iter().map(|item| item.sku.clone()).collect();
        let missing = self.catalog.missing_skus(&skus).await?;
        if !missing.is_empty() {
            return Err(ServiceError::ValidationError(format!(
                "Unknown SKUs: {}",
                missing.join(", ")
            )));
        }

        let now = Utc::now();
        let items: Vec<LineItem> = request
            .items
            .into_iter()
            .map(|item| LineItem {
                sku: item.sku,
                quantity: item.quantity,
                unit_price: item.unit_price,
                display_name: item.display_name,
            })
            .collect();
        let subtotal: Decimal = items.iter().map(LineItem::line_total).sum();

        let mut order = Order {
            id: Uuid::new_v4(),
            vendor_id: request.vendor_id,
            order_number: request.order_number,
            items,
            partial_allowed: request.partial_allowed,
            delivery_address: request.delivery_address,
            required_by: request.required_by,
            promised_delivery_at: request.promised_delivery_at,
            predicted_delivery_at: None,
            delivered_at: None,
            order_state: OrderState::Pending,
            delivery_state: DeliveryState::OnTrack,
            subtotal: Some(subtotal),
            created_at: now,
            updated_at: None,
        };
        self.orders.insert_order(&order).await?;

        let eligible = self.eligibility.resolve_eligible_suppliers(&order).await?;
        if eligible.is_empty() {
            order.delivery_state = DeliveryState::AtRisk;
            order.updated_at = Some(Utc::now());
            self.orders.update_order(&order).await?;
            self.events
                .append(NewEvent::no_suppliers_found(order.id))
                .await?;
            warn!(order_id = %order.id, "No eligible suppliers; order placed at risk");
            return Ok(order);
        }

        let rows: Vec<OrderVisibility> = eligible
            .iter()
            .map(|supplier_id| OrderVisibility::new(order.id, *supplier_id, now))
            .collect();
        self.orders.insert_visibilities(&rows).await?;
        self.events
            .append(NewEvent::order_distributed(order.id, rows.len()))
            .await?;
        info!(order_id = %order.id, supplier_count = rows.len(), "Order distributed");
        Ok(order)
    }

    /// Accepts the order on behalf of a supplier. At most one visibility per
    /// order ever reaches `ACCEPTED`; the check and both writes happen in one
    /// atomic unit inside the store.
    #[instrument(skip(self), fields(order_id = %order_id, supplier_id = %supplier_id))]
    pub async fn accept(&self, order_id: Uuid, supplier_id: Uuid) -> Result<Order, ServiceError> {
        match self.orders.try_accept(order_id, supplier_id).await? {
            AcceptOutcome::Accepted(order) => {
                self.events
                    .append(NewEvent::order_accepted(order_id, supplier_id))
                    .await?;
                info!(order_id = %order_id, supplier_id = %supplier_id, "Order accepted");
                Ok(order)
            }
            AcceptOutcome::AlreadyAccepted => Err(ServiceError::Conflict(format!(
                "Order {} is already accepted",
                order_id
            ))),
            AcceptOutcome::OrderCancelled => Err(ServiceError::Conflict(format!(
                "Order {} is cancelled",
                order_id
            ))),
            AcceptOutcome::NoVisibility => Err(ServiceError::NotFound(format!(
                "No visible offer of order {} to supplier {}",
                order_id, supplier_id
            ))),
            AcceptOutcome::OrderNotFound => Err(ServiceError::not_found("Order", order_id)),
        }
    }

    /// Declines the supplier's visibility. When the decline leaves no
    /// `VISIBLE` row on a still-pending order, the delivery state escalates
    /// to `AT_RISK`.
    #[instrument(skip(self), fields(order_id = %order_id, supplier_id = %supplier_id))]
    pub async fn decline(&self, order_id: Uuid, supplier_id: Uuid) -> Result<(), ServiceError> {
        match self.orders.try_decline(order_id, supplier_id).await? {
            DeclineOutcome::Declined {
                none_visible_remaining,
            } => {
                self.events
                    .append(NewEvent::order_declined(order_id, supplier_id))
                    .await?;
                info!(order_id = %order_id, supplier_id = %supplier_id, "Order declined");
                if none_visible_remaining {
                    self.escalate_all_declined(order_id).await?;
                }
                Ok(())
            }
            DeclineOutcome::NoVisibility => Err(ServiceError::NotFound(format!(
                "No visible offer of order {} to supplier {}",
                order_id, supplier_id
            ))),
            DeclineOutcome::OrderNotFound => Err(ServiceError::not_found("Order", order_id)),
        }
    }

    async fn escalate_all_declined(&self, order_id: Uuid) -> Result<(), ServiceError> {
        let Some(mut order) = self.orders.order(order_id).await? else {
            return Ok(());
        };
        // a concurrent accept may have resolved the order; only a pending
        // order with a live delivery state escalates
        if order.order_state != OrderState::Pending
            || !order
                .delivery_state
                .can_transition_to(DeliveryState::AtRisk)
        {
            return Ok(());
        }
        if order.delivery_state != DeliveryState::AtRisk {
            order.delivery_state = DeliveryState::AtRisk;
            order.updated_at = Some(Utc::now());
            self.orders.update_order(&order).await?;
        }
        self.events
            .append(NewEvent::all_suppliers_declined(order_id))
            .await?;
        warn!(order_id = %order_id, "All suppliers declined; order at risk");
        Ok(())
    }

    /// Cancels the order unconditionally. Visibilities and delivery state are
    /// untouched; cancellation is a state, not erasure.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn cancel(&self, order_id: Uuid) -> Result<Order, ServiceError> {
        let mut order = self
            .orders
            .order(order_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Order", order_id))?;
        if order.order_state == OrderState::Cancelled {
            return Ok(order);
        }
        order.order_state = OrderState::Cancelled;
        order.updated_at = Some(Utc::now());
        self.orders.update_order(&order).await?;
        self.events
            .append(NewEvent::order_cancelled(order_id))
            .await?;
        info!(order_id = %order_id, "Order cancelled");
        Ok(order)
    }

    /// Records a carrier status update. Every update is appended to the
    /// timeline under its raw status string; only the four canonical states
    /// move the delivery-state field, and `DELIVERED` stamps the delivered
    /// timestamp exactly once. Callers must not assume every call mutates
    /// state.
    #[instrument(skip(self), fields(order_id = %order_id, status = %raw_status))]
    pub async fn advance_delivery(
        &self,
        order_id: Uuid,
        raw_status: &str,
    ) -> Result<Order, ServiceError> {
        let mut order = self
            .orders
            .order(order_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Order", order_id))?;

        let Ok(next) = raw_status.parse::<DeliveryState>() else {
            // non-canonical statuses keep full timeline granularity but do
            // not move the state machine
            self.events
                .append(NewEvent::carrier_status(order_id, raw_status))
                .await?;
            info!(order_id = %order_id, status = %raw_status, "Carrier status recorded without state change");
            return Ok(order);
        };

        if order.delivery_state == next {
            self.events
                .append(NewEvent::carrier_status(order_id, raw_status))
                .await?;
            return Ok(order);
        }
        if !order.delivery_state.can_transition_to(next) {
            return Err(ServiceError::Conflict(format!(
                "Delivery state of order {} cannot move from {} to {}",
                order_id, order.delivery_state, next
            )));
        }

        order.delivery_state = next;
        if next == DeliveryState::Delivered && order.delivered_at.is_none() {
            order.delivered_at = Some(Utc::now());
        }
        order.updated_at = Some(Utc::now());
        self.orders.update_order(&order).await?;
        self.events
            .append(NewEvent::carrier_status(order_id, raw_status))
            .await?;
        info!(order_id = %order_id, status = %raw_status, "Delivery state advanced");
        Ok(order)
    }

    /// Marks the delivery at risk with a revised ETA, regardless of the
    /// current non-terminal state, then notifies the vendor best-effort.
    /// Notification failures are logged and never roll back the state change.
    #[instrument(skip(self, reason), fields(order_id = %order_id))]
    pub async fn report_delay(
        &self,
        order_id: Uuid,
        revised_eta: DateTime<Utc>,
        reason: &str,
    ) -> Result<Order, ServiceError> {
        let mut order = self
            .orders
            .order(order_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Order", order_id))?;
        if order.delivery_state.is_terminal() {
            return Err(ServiceError::Conflict(format!(
                "Order {} delivery is already {}",
                order_id, order.delivery_state
            )));
        }

        order.delivery_state = DeliveryState::AtRisk;
        order.predicted_delivery_at = Some(revised_eta);
        order.updated_at = Some(Utc::now());
        self.orders.update_order(&order).await?;
        self.events
            .append(NewEvent::delay_reported(order_id, revised_eta, reason))
            .await?;
        info!(order_id = %order_id, revised_eta = %revised_eta, "Delay reported");

        if let Err(e) = self
            .notifier
            .notify_delay(order.vendor_id, &order.order_number, revised_eta, reason)
            .await
        {
            warn!(order_id = %order_id, error = %e, "Delay notification failed");
        }
        if let Err(e) = self
            .emailer
            .send_delay_email(&order.order_number, &revised_eta.to_rfc3339(), reason)
            .await
        {
            warn!(order_id = %order_id, error = %e, "Delay email failed");
        }
        Ok(order)
    }

    /// Records the vendor's score for a completed delivery. One rating per
    /// order.
    #[instrument(skip(self, comment), fields(order_id = %order_id, score = score))]
    pub async fn rate_delivery(
        &self,
        order_id: Uuid,
        score: i16,
        comment: Option<String>,
        accuracy_ok: bool,
    ) -> Result<Rating, ServiceError> {
        if !(1..=5).contains(&score) {
            return Err(ServiceError::ValidationError(
                "Score must be between 1 and 5".into(),
            ));
        }
        let order = self
            .orders
            .order(order_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Order", order_id))?;
        if !order.is_delivered() {
            return Err(ServiceError::InvalidOperation(format!(
                "Order {} has not been delivered",
                order_id
            )));
        }
        let supplier_id = self
            .orders
            .visibilities_for_order(order_id)
            .await?
            .into_iter()
            .find(|v| v.status == VisibilityStatus::Accepted)
            .map(|v| v.supplier_id)
            .ok_or_else(|| {
                ServiceError::InvalidOperation(format!(
                    "Order {} has no accepting supplier",
                    order_id
                ))
            })?;
        if self.ratings.rating_for_order(order_id).await?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Order {} is already rated",
                order_id
            )));
        }

        let rating = Rating {
            id: Uuid::new_v4(),
            order_id,
            supplier_id,
            vendor_id: order.vendor_id,
            score,
            comment,
            accuracy_ok,
            created_at: Utc::now(),
        };
        self.ratings.insert_rating(&rating).await?;
        self.events
            .append(NewEvent::delivery_rated(order_id, supplier_id, score))
            .await?;
        Ok(rating)
    }

    /// Read view: the order plus its risk classification recomputed at call
    /// time.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<Option<OrderWithRisk>, ServiceError> {
        let Some(order) = self.orders.order(order_id).await? else {
            return Ok(None);
        };
        let at_risk = risk::evaluate(&order, Utc::now(), &self.config.risk);
        Ok(Some(OrderWithRisk { order, at_risk }))
    }
}
