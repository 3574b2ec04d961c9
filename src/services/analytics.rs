//! Analytics aggregator.
//!
//! Read-only: derives reliability, spend, and disruption metrics from the
//! accumulated order/event/rating history at query time. Outputs are
//! recomputed on every call and must not be cached as ground truth.

use chrono::{DateTime, Datelike, Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::events::{event_type, is_risk_tag, EventRecord};
use crate::models::{Order, VisibilityStatus};
use crate::stores::{Directory, EventStore, OrderStore, RatingStore};

const HEATMAP_WEEKS: usize = 4;
const HEATMAP_DAYS: usize = 7;

/// The vendor's most reliable supplier by mean rating.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SupplierScore {
    pub supplier_id: Uuid,
    pub name: String,
    pub average_rating: f64,
}

/// One row of the per-supplier spend/score breakdown.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SupplierBreakdown {
    pub supplier_id: Uuid,
    pub name: String,
    pub spend: Decimal,
    pub spend_pct_of_max: f64,
    pub score_pct: f64,
}

/// Dashboard metrics for one vendor.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VendorAnalytics {
    pub total_spend: Decimal,
    pub reliability_percentage: f64,
    pub stockouts_avoided: u64,
    pub most_stable_supplier: Option<SupplierScore>,
    /// Top 5 suppliers by spend.
    pub supplier_breakdown: Vec<SupplierBreakdown>,
    /// 4 week rows (most recent first) x 7 weekday columns (Monday first).
    pub disruption_heatmap: Vec<Vec<u32>>,
    pub spend_trend: String,
    pub reliability_trend: String,
    pub generated_at: DateTime<Utc>,
}

/// One delivered order from the supplier's point of view.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FulfilledDelivery {
    pub order_id: Uuid,
    pub order_number: String,
    pub retailer_name: String,
    pub lead_time_days: f64,
    pub value_with_tax: Decimal,
    pub rating: Option<i16>,
    pub delivered_at: DateTime<Utc>,
}

/// Read-only aggregation over the order/event/rating history.
#[derive(Clone)]
pub struct AnalyticsService {
    orders: Arc<dyn OrderStore>,
    events: Arc<dyn EventStore>,
    ratings: Arc<dyn RatingStore>,
    directory: Arc<dyn Directory>,
    config: Arc<AppConfig>,
}

impl AnalyticsService {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        events: Arc<dyn EventStore>,
        ratings: Arc<dyn RatingStore>,
        directory: Arc<dyn Directory>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            orders,
            events,
            ratings,
            directory,
            config,
        }
    }

    fn with_tax(&self, amount: Decimal) -> Decimal {
        amount * Decimal::from(100 + self.config.analytics.tax_percent) / Decimal::from(100)
    }

    /// Spend, reliability, disruption and supplier metrics for one vendor.
    #[instrument(skip(self), fields(vendor_id = %vendor_id))]
    pub async fn vendor_analytics(&self, vendor_id: Uuid) -> Result<VendorAnalytics, ServiceError> {
        let now = Utc::now();
        let orders = self.orders.orders_for_vendor(vendor_id).await?;
        let delivered: Vec<&Order> = orders.iter().filter(|o| o.is_delivered()).collect();

        // event history per delivered order, fetched once
        let mut events_by_order: HashMap<Uuid, Vec<EventRecord>> = HashMap::new();
        for order in &delivered {
            events_by_order.insert(order.id, self.events.events_for_order(order.id).await?);
        }
        let had_risk = |order_id: &Uuid| {
            events_by_order
                .get(order_id)
                .is_some_and(|events| events.iter().any(|e| is_risk_tag(&e.event_type)))
        };
        let had_delay = |order_id: &Uuid| {
            events_by_order.get(order_id).is_some_and(|events| {
                events
                    .iter()
                    .any(|e| e.event_type == event_type::DELAY_REPORTED)
            })
        };

        let subtotal_sum: Decimal = delivered.iter().map(|o| o.subtotal_value()).sum();
        let total_spend = self.with_tax(subtotal_sum);

        let reliability_percentage = if delivered.is_empty() {
            100.0
        } else {
            let clean = delivered.iter().filter(|o| !had_risk(&o.id)).count();
            clean as f64 / delivered.len() as f64 * 100.0
        };
        let stockouts_avoided = delivered.iter().filter(|o| had_delay(&o.id)).count() as u64;

        // attribute each delivered order to its accepting supplier
        let mut spend_by_supplier: HashMap<Uuid, Decimal> = HashMap::new();
        let mut scores_by_supplier: HashMap<Uuid, Vec<i16>> = HashMap::new();
        for order in &delivered {
            let accepted = self
                .orders
                .visibilities_for_order(order.id)
                .await?
                .into_iter()
                .find(|v| v.status == VisibilityStatus::Accepted);
            let Some(visibility) = accepted else { continue };
            *spend_by_supplier
                .entry(visibility.supplier_id)
                .or_insert(Decimal::ZERO) += self.with_tax(order.subtotal_value());
            if let Some(rating) = self.ratings.rating_for_order(order.id).await? {
                scores_by_supplier
                    .entry(visibility.supplier_id)
                    .or_default()
                    .push(rating.score);
            }
        }

        let mut supplier_names: HashMap<Uuid, String> = HashMap::new();
        for supplier_id in spend_by_supplier.keys() {
            let name = self
                .directory
                .supplier(*supplier_id)
                .await?
                .map(|s| s.name)
                .unwrap_or_else(|| format!("Supplier {}", supplier_id));
            supplier_names.insert(*supplier_id, name);
        }

        let average = |scores: &[i16]| {
            scores.iter().map(|s| f64::from(*s)).sum::<f64>() / scores.len() as f64
        };
        let most_stable_supplier = scores_by_supplier
            .iter()
            .map(|(supplier_id, scores)| (supplier_id, average(scores)))
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(supplier_id, average_rating)| SupplierScore {
                supplier_id: *supplier_id,
                name: supplier_names
                    .get(supplier_id)
                    .cloned()
                    .unwrap_or_default(),
                average_rating,
            });

        let max_spend = spend_by_supplier
            .values()
            .copied()
            .max()
            .unwrap_or(Decimal::ZERO);
        let mut supplier_breakdown: Vec<SupplierBreakdown> = spend_by_supplier
            .iter()
            .map(|(supplier_id, spend)| {
                let spend_pct_of_max = if max_spend.is_zero() {
                    0.0
                } else {
                    (spend / max_spend).to_f64().unwrap_or(0.0) * 100.0
                };
                let score_pct = scores_by_supplier
                    .get(supplier_id)
                    .map(|scores| average(scores) / 5.0 * 100.0)
                    .unwrap_or(0.0);
                SupplierBreakdown {
                    supplier_id: *supplier_id,
                    name: supplier_names
                        .get(supplier_id)
                        .cloned()
                        .unwrap_or_default(),
                    spend: *spend,
                    spend_pct_of_max,
                    score_pct,
                }
            })
            .collect();
        supplier_breakdown.sort_by(|a, b| b.spend.cmp(&a.spend));
        supplier_breakdown.truncate(5);

        let disruption_heatmap = self
            .disruption_heatmap(&orders, now)
            .await?;

        let window = Duration::days(self.config.analytics.trend_window_days);
        let (current_spend, current_reliability) =
            self.window_metrics(&delivered, &had_risk, now - window, now);
        let (previous_spend, previous_reliability) =
            self.window_metrics(&delivered, &had_risk, now - window - window, now - window);
        let spend_trend = format_trend(current_spend, previous_spend);
        let reliability_trend = format_trend(current_reliability, previous_reliability);

        Ok(VendorAnalytics {
            total_spend,
            reliability_percentage,
            stockouts_avoided,
            most_stable_supplier,
            supplier_breakdown,
            disruption_heatmap,
            spend_trend,
            reliability_trend,
            generated_at: now,
        })
    }

    /// Taxed spend and reliability share for orders delivered inside the
    /// window. An empty window reads as zero spend and zero reliability so
    /// trend formatting can treat it as "no previous period".
    fn window_metrics(
        &self,
        delivered: &[&Order],
        had_risk: &dyn Fn(&Uuid) -> bool,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> (f64, f64) {
        let in_window: Vec<&&Order> = delivered
            .iter()
            .filter(|o| {
                o.delivered_at
                    .map(|at| at >= from && at < to)
                    .unwrap_or(false)
            })
            .collect();
        if in_window.is_empty() {
            return (0.0, 0.0);
        }
        let spend: Decimal = in_window.iter().map(|o| o.subtotal_value()).sum();
        let spend = self.with_tax(spend).to_f64().unwrap_or(0.0);
        let clean = in_window.iter().filter(|o| !had_risk(&o.id)).count();
        let reliability = clean as f64 / in_window.len() as f64 * 100.0;
        (spend, reliability)
    }

    /// 4-week x 7-day grid of delay intensity for the vendor's orders,
    /// seeded at the configured baseline and capped at the configured
    /// maximum.
    async fn disruption_heatmap(
        &self,
        orders: &[Order],
        now: DateTime<Utc>,
    ) -> Result<Vec<Vec<u32>>, ServiceError> {
        let baseline = self.config.analytics.heatmap_baseline;
        let cap = self.config.analytics.heatmap_cap;
        let mut grid = vec![vec![baseline; HEATMAP_DAYS]; HEATMAP_WEEKS];

        let order_ids: HashSet<Uuid> = orders.iter().map(|o| o.id).collect();
        let span = Duration::days((HEATMAP_WEEKS * HEATMAP_DAYS) as i64);
        let events = self.events.events_in_range(now - span, now).await?;
        for event in events {
            if event.event_type != event_type::DELAY_REPORTED {
                continue;
            }
            let belongs = event.order_id.map(|id| order_ids.contains(&id)).unwrap_or(false);
            if !belongs {
                continue;
            }
            if let Some((week, day)) = heatmap_bucket(now, event.created_at) {
                let cell = &mut grid[week][day];
                *cell = (*cell + 1).min(cap);
            }
        }
        Ok(grid)
    }

    /// Every delivered order the supplier fulfilled, newest first.
    #[instrument(skip(self), fields(supplier_id = %supplier_id))]
    pub async fn supplier_analytics(
        &self,
        supplier_id: Uuid,
    ) -> Result<Vec<FulfilledDelivery>, ServiceError> {
        let order_ids = self
            .orders
            .accepted_order_ids_for_supplier(supplier_id)
            .await?;

        let mut deliveries = Vec::new();
        for order_id in order_ids {
            let Some(order) = self.orders.order(order_id).await? else {
                continue;
            };
            let Some(delivered_at) = order.delivered_at else {
                continue;
            };
            let retailer_name = self
                .directory
                .vendor(order.vendor_id)
                .await?
                .map(|v| v.name)
                .unwrap_or_else(|| format!("Vendor {}", order.vendor_id));
            let lead_time_days =
                (delivered_at - order.created_at).num_seconds() as f64 / 86_400.0;
            let rating = self
                .ratings
                .rating_for_order(order.id)
                .await?
                .map(|r| r.score);
            deliveries.push(FulfilledDelivery {
                order_id: order.id,
                order_number: order.order_number.clone(),
                retailer_name,
                lead_time_days,
                value_with_tax: self.with_tax(order.subtotal_value()),
                rating,
                delivered_at,
            });
        }
        deliveries.sort_by(|a, b| b.delivered_at.cmp(&a.delivered_at));
        Ok(deliveries)
    }
}

/// Maps an event timestamp to its (week row, weekday column) bucket, most
/// recent week first, Monday first. Timestamps outside the window yield
/// `None`.
fn heatmap_bucket(now: DateTime<Utc>, at: DateTime<Utc>) -> Option<(usize, usize)> {
    let days_ago = (now - at).num_days();
    if !(0..(HEATMAP_WEEKS * HEATMAP_DAYS) as i64).contains(&days_ago) {
        return None;
    }
    let week = (days_ago / HEATMAP_DAYS as i64) as usize;
    let day = at.weekday().num_days_from_monday() as usize;
    Some((week, day))
}

/// Period-over-period delta formatted as a signed percentage. A zero (or
/// missing) previous period reads as `"+0.0%"`, never a division error.
fn format_trend(current: f64, previous: f64) -> String {
    if previous == 0.0 {
        return "+0.0%".to_string();
    }
    let delta = (current - previous) / previous * 100.0;
    if delta < 0.0 {
        format!("-{:.1}%", delta.abs())
    } else {
        format!("+{:.1}%", delta)
    }
}
