//! Configuration loading
//!
//! This module loads [`portalsync_domain::AppConfig`] from TOML/JSON files
//! and environment variables.

pub mod loader;

// Re-export commonly used items
pub use loader::{
    apply_env_overrides, load, load_from_file, discover_config_path, DEFAULT_CONFIG_FILE,
    DESTINATION_TOKEN_ENV, SOURCE_TOKEN_ENV,
};
