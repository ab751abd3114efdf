//! Shared test helpers for `portalsync-core` integration tests.
//!
//! An in-memory portal and report store stand in for the REST adapter and
//! the JSON report directory, so scenarios can assert on portal state.

#![allow(dead_code)]

pub mod fixtures;
pub mod portal;
pub mod reports;

pub use fixtures::*;
pub use portal::InMemoryPortal;
pub use reports::InMemoryReportStore;
