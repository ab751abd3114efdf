//! Field filtering between portals.

mod field_filter;
mod tables;

pub use field_filter::{ExclusionTable, FieldFilter, SchemaIndex};
