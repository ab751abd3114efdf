//! # portalsync Infrastructure
//!
//! Infrastructure implementations of core ports.
//!
//! This crate contains:
//! - The rate-limited, retrying HTTP client
//! - The HubSpot REST adapter implementing `CrmPortal`
//! - The JSON report store implementing `ReportStore`
//! - The run lock and the configuration loader
//!
//! ## Architecture
//! - Implements traits defined in `portalsync-core`
//! - Contains all "impure" code (network, filesystem, environment)

pub mod api;
pub mod config;
pub mod errors;
pub mod http;
pub mod hubspot;
pub mod reports;
pub mod run_lock;

// Re-export commonly used items
pub use api::{ApiError, ApiErrorCategory};
pub use errors::InfraError;
pub use http::{HttpClient, HttpClientBuilder};
pub use hubspot::HubSpotPortal;
pub use run_lock::RunLock;
pub use reports::JsonReportStore;
