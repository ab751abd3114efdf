//! Error model for calls against the vendor REST API.

pub mod errors;

pub use errors::{ApiError, ApiErrorCategory};
