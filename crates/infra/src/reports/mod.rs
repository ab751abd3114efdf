//! Persistence of run reports.

pub mod json_store;

pub use json_store::JsonReportStore;
