//! # portalsync Domain
//!
//! Business domain types for CRM portal migration.
//!
//! This crate contains:
//! - Records, typed property values and object types
//! - Schema definitions (properties, pipelines, custom object schemas)
//! - Migration plans, ID mappings and audit records
//! - Configuration structures
//! - Domain error types and Result definitions
//!
//! ## Architecture
//! - No dependencies on other portalsync crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
