//! Application constants
//!
//! Centralized location for vendor API limits and migration defaults.

// Remote API

/// API root used when a portal config gives no `base_url`.
pub const DEFAULT_BASE_URL: &str = "https://api.hubapi.com";
/// Records per search page.
pub const SEARCH_PAGE_SIZE: usize = 100;
/// Values accepted by one `IN` filter.
pub const MAX_IN_FILTER_VALUES: usize = 100;
/// OR'ed filter groups accepted by one search.
pub const MAX_FILTER_GROUPS: usize = 5;
/// Inputs per association batch call.
pub const ASSOCIATION_BATCH_SIZE: usize = 100;

// Well-known record properties

/// Record id exposed as a searchable property.
pub const OBJECT_ID_PROPERTY: &str = "hs_object_id";
/// Creation timestamp on every standard type.
pub const CREATED_DATE_PROPERTY: &str = "createdate";
/// Contacts name their modification timestamp differently.
pub const CONTACT_MODIFIED_DATE_PROPERTY: &str = "lastmodifieddate";
/// Modification timestamp on every other type.
pub const MODIFIED_DATE_PROPERTY: &str = "hs_lastmodifieddate";

// Transport defaults

/// Minimum spacing between calls to one portal.
pub const DEFAULT_RATE_LIMIT_DELAY_MS: u64 = 300;
/// Attempts per call, including the first.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// First backoff delay; doubles per attempt.
pub const DEFAULT_BASE_BACKOFF_MS: u64 = 1_000;
/// Ceiling for the exponential backoff.
pub const DEFAULT_MAX_BACKOFF_SECS: u64 = 30;
/// Ceiling for `Retry-After` delays.
pub const DEFAULT_MAX_RETRY_AFTER_SECS: u64 = 300;
/// Per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

// Migration defaults

/// Records per batch.
pub const DEFAULT_BATCH_SIZE: usize = 100;
/// Association hops followed by a selective sync.
pub const DEFAULT_CLOSURE_DEPTH: u8 = 1;
/// Where run reports are written.
pub const DEFAULT_REPORTS_DIRECTORY: &str = "reports";
/// Prefix of the ids a dry-run destination hands out.
pub const DRY_RUN_ID_PREFIX: &str = "dry-run";

// Token validation

/// Shorter tokens are rejected outright.
pub const MIN_TOKEN_LENGTH: usize = 20;
/// Private app tokens start with this.
pub const PRIVATE_APP_TOKEN_PREFIX: &str = "pat-";
/// Fragments of template values left in a config file.
pub const TOKEN_PLACEHOLDERS: &[&str] = &["your_", "xxx", "changeme", "<token>"];
