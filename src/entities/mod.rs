//! sea-orm rows for the SQL backend. One file per table, in the same shape
//! the domain models carry; the store layer converts between the two.

pub mod catalog_sku;
pub mod event_record;
pub mod inventory_position;
pub mod order;
pub mod order_line_item;
pub mod order_visibility;
pub mod rating;
