//! Consumed contract for the eligibility resolver.
//!
//! Catalog and service-area logic lives outside this core; the core only
//! depends on this trait. An empty result is a valid, expected outcome, not
//! an error. For a fixed catalog/service-area state the resolver must be
//! deterministic.

use async_trait::async_trait;
use std::collections::HashSet;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::Order;

#[async_trait]
pub trait EligibilityResolver: Send + Sync {
    /// The set of suppliers permitted to see and fulfill the order.
    async fn resolve_eligible_suppliers(
        &self,
        order: &Order,
    ) -> Result<HashSet<Uuid>, ServiceError>;
}
