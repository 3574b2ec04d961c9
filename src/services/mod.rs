pub mod analytics;
pub mod orders;
pub mod reorder;
pub mod risk;
