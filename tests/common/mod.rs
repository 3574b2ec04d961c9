//! Shared wiring for the integration suites: every service over one
//! in-memory store.

#![allow(dead_code)]

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use restock_api::config::AppConfig;
use restock_api::models::{Address, SupplierProfile, VendorProfile};
use restock_api::notifications::LoggingDelaySender;
use restock_api::services::analytics::AnalyticsService;
use restock_api::services::orders::{LineItemRequest, OrderService, PlaceOrderRequest};
use restock_api::services::reorder::AutoReorderService;
use restock_api::stores::memory::{CatalogEligibility, InMemoryStore};

pub struct TestEnv {
    pub store: Arc<InMemoryStore>,
    pub eligibility: Arc<CatalogEligibility>,
    pub orders: OrderService,
    pub reorder: AutoReorderService,
    pub analytics: AnalyticsService,
    pub config: Arc<AppConfig>,
}

pub fn test_env() -> TestEnv {
    test_env_with(AppConfig::default())
}

pub fn test_env_with(config: AppConfig) -> TestEnv {
    let store = Arc::new(InMemoryStore::new());
    let eligibility = Arc::new(CatalogEligibility::new());
    let config = Arc::new(config);
    let sender = Arc::new(LoggingDelaySender);
    let orders = OrderService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        eligibility.clone(),
        store.clone(),
        sender.clone(),
        sender,
        config.clone(),
    );
    let reorder = AutoReorderService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        orders.clone(),
        config.clone(),
    );
    let analytics = AnalyticsService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        config.clone(),
    );
    TestEnv {
        store,
        eligibility,
        orders,
        reorder,
        analytics,
        config,
    }
}

impl TestEnv {
    /// Seeds a vendor in Pretoria, two suppliers covering `SKU-COFFEE` there,
    /// and the SKU itself. Returns (vendor, supplier_a, supplier_b).
    pub fn seed_marketplace(&self) -> (Uuid, Uuid, Uuid) {
        let vendor = Uuid::new_v4();
        let supplier_a = Uuid::new_v4();
        let supplier_b = Uuid::new_v4();
        self.store.seed_vendor(VendorProfile {
            id: vendor,
            name: "Corner Grocer".into(),
            contact_email: Some("owner@cornergrocer.test".into()),
            address: Some(Address::new("12 Oak St", "Pretoria")),
        });
        self.store.seed_supplier(SupplierProfile {
            id: supplier_a,
            name: "Atlas Wholesale".into(),
            contact_email: None,
        });
        self.store.seed_supplier(SupplierProfile {
            id: supplier_b,
            name: "Baobab Foods".into(),
            contact_email: None,
        });
        self.store.seed_sku("SKU-COFFEE", "Coffee beans 1kg");
        self.eligibility.set_coverage(
            supplier_a,
            vec!["SKU-COFFEE".to_string()],
            vec!["Pretoria".to_string()],
        );
        self.eligibility.set_coverage(
            supplier_b,
            vec!["SKU-COFFEE".to_string()],
            vec!["Pretoria".to_string()],
        );
        (vendor, supplier_a, supplier_b)
    }
}

pub fn coffee_request(vendor_id: Uuid, order_number: &str) -> PlaceOrderRequest {
    PlaceOrderRequest {
        vendor_id,
        order_number: order_number.to_string(),
        items: vec![LineItemRequest {
            sku: "SKU-COFFEE".into(),
            quantity: 2,
            unit_price: Some(Decimal::from(100)),
            display_name: "Coffee beans 1kg".into(),
        }],
        partial_allowed: false,
        delivery_address: Address::new("12 Oak St", "Pretoria"),
        required_by: Utc::now() + Duration::hours(48),
        promised_delivery_at: None,
    }
}
