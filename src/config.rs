use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use tracing::info;
use validator::Validate;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_DATABASE_URL: &str = "sqlite::memory:";
const CONFIG_DIR: &str = "config";
const DEFAULT_DRIFT_THRESHOLD_MINUTES: i64 = 60;
const DEFAULT_TAX_PERCENT: u32 = 8;
const DEFAULT_REORDER_QUANTITY: i32 = 50;
const DEFAULT_REORDER_LEAD_HOURS: i64 = 24;
const DEFAULT_REORDER_COOLDOWN_HOURS: i64 = 24;
const DEFAULT_DELIVERY_AREA: &str = "Pretoria";
const DEFAULT_HEATMAP_BASELINE: u32 = 1;
const DEFAULT_HEATMAP_CAP: u32 = 10;
const DEFAULT_TREND_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Invalid(#[from] validator::ValidationErrors),
}

/// Risk evaluation tuning.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct RiskConfig {
    /// Predicted-vs-promised drift, in minutes, at which a delivery counts
    /// as at risk.
    #[serde(default = "default_drift_threshold_minutes")]
    #[validate(range(min = 1))]
    pub drift_threshold_minutes: i64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            drift_threshold_minutes: default_drift_threshold_minutes(),
        }
    }
}

/// Auto-reorder policy applied when a vendor-side position crosses its
/// threshold.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AutoReorderConfig {
    /// Quantity ordered when the position has no configured reorder quantity.
    #[serde(default = "default_reorder_quantity")]
    #[validate(range(min = 1))]
    pub default_reorder_quantity: i32,

    /// Required-by window for auto-placed orders, in hours from trigger time.
    #[serde(default = "default_reorder_lead_hours")]
    #[validate(range(min = 1))]
    pub lead_time_hours: i64,

    /// Delivery area used when the vendor's address has none recorded.
    #[serde(default = "default_delivery_area")]
    pub default_delivery_area: String,

    /// Suppression window after a trigger fires for a position; 0 disables
    /// the cooldown and restores fire-on-every-edit behavior.
    #[serde(default = "default_reorder_cooldown_hours")]
    #[validate(range(min = 0))]
    pub cooldown_hours: i64,
}

impl Default for AutoReorderConfig {
    fn default() -> Self {
        Self {
            default_reorder_quantity: default_reorder_quantity(),
            lead_time_hours: default_reorder_lead_hours(),
            default_delivery_area: default_delivery_area(),
            cooldown_hours: default_reorder_cooldown_hours(),
        }
    }
}

/// Analytics aggregation tuning.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AnalyticsConfig {
    /// Tax applied to monetary aggregates, in whole percent.
    #[serde(default = "default_tax_percent")]
    #[validate(range(max = 100))]
    pub tax_percent: u32,

    /// Baseline intensity for untouched disruption heatmap cells.
    #[serde(default = "default_heatmap_baseline")]
    pub heatmap_baseline: u32,

    /// Maximum intensity a heatmap cell can reach.
    #[serde(default = "default_heatmap_cap")]
    #[validate(range(min = 1))]
    pub heatmap_cap: u32,

    /// Width of the trailing window compared against the prior window for
    /// spend/reliability trends.
    #[serde(default = "default_trend_window_days")]
    #[validate(range(min = 1))]
    pub trend_window_days: i64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            tax_percent: default_tax_percent(),
            heatmap_baseline: default_heatmap_baseline(),
            heatmap_cap: default_heatmap_cap(),
            trend_window_days: default_trend_window_days(),
        }
    }
}

/// Application configuration with validation.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL for the sea-orm backend.
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Application environment
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    #[serde(default)]
    #[validate]
    pub risk: RiskConfig,

    #[serde(default)]
    #[validate]
    pub auto_reorder: AutoReorderConfig,

    #[serde(default)]
    #[validate]
    pub analytics: AnalyticsConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            environment: default_environment(),
            log_level: default_log_level(),
            log_json: false,
            risk: RiskConfig::default(),
            auto_reorder: AutoReorderConfig::default(),
            analytics: AnalyticsConfig::default(),
        }
    }
}

fn default_database_url() -> String {
    DEFAULT_DATABASE_URL.to_string()
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_drift_threshold_minutes() -> i64 {
    DEFAULT_DRIFT_THRESHOLD_MINUTES
}

fn default_tax_percent() -> u32 {
    DEFAULT_TAX_PERCENT
}

fn default_reorder_quantity() -> i32 {
    DEFAULT_REORDER_QUANTITY
}

fn default_reorder_lead_hours() -> i64 {
    DEFAULT_REORDER_LEAD_HOURS
}

fn default_reorder_cooldown_hours() -> i64 {
    DEFAULT_REORDER_COOLDOWN_HOURS
}

fn default_delivery_area() -> String {
    DEFAULT_DELIVERY_AREA.to_string()
}

fn default_heatmap_baseline() -> u32 {
    DEFAULT_HEATMAP_BASELINE
}

fn default_heatmap_cap() -> u32 {
    DEFAULT_HEATMAP_CAP
}

fn default_trend_window_days() -> i64 {
    DEFAULT_TREND_WINDOW_DAYS
}

/// Loads configuration from layered sources: `config/default.toml`, an
/// environment-specific file, and `APP_`-prefixed environment variables
/// (e.g. `APP_AUTO_REORDER__COOLDOWN_HOURS=0`).
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let environment = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| DEFAULT_ENV.to_string());

    let mut builder = Config::builder();

    let default_path = Path::new(CONFIG_DIR).join("default.toml");
    if default_path.exists() {
        builder = builder.add_source(File::from(default_path));
    }
    let env_path = Path::new(CONFIG_DIR).join(format!("{}.toml", environment));
    if env_path.exists() {
        builder = builder.add_source(File::from(env_path));
    }

    let settings = builder
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let config: AppConfig = settings.try_deserialize()?;
    config.validate()?;

    info!(environment = %config.environment, "Configuration loaded");
    Ok(config)
}
