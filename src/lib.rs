//! Order distribution, lifecycle, and auto-reorder engine for B2B
//! replenishment.
//!
//! Vendors place replenishment orders that fan out to every eligible
//! supplier; exactly one supplier wins the order through an atomic accept.
//! Delivery progress is tracked through a small state machine, delivery risk
//! is recomputed on every read, low vendor stock triggers automatic
//! replenishment orders, and an append-only event log feeds the analytics
//! aggregations.
//!
//! The service layer is storage-agnostic: every component receives its
//! stores as trait objects at construction. [`stores::memory`] backs tests
//! and single-process deployments, [`stores::sql`] persists through sea-orm.

pub mod config;
pub mod db;
pub mod eligibility;
pub mod entities;
pub mod errors;
pub mod events;
pub mod models;
pub mod notifications;
pub mod services;
pub mod stores;

use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;

/// Installs the global tracing subscriber. `RUST_LOG` overrides the
/// configured level; repeated calls are harmless.
pub fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = if config.log_json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if let Err(e) = result {
        tracing::debug!("tracing subscriber already installed: {}", e);
    }
}
