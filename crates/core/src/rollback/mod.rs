//! Reversal of earlier runs from their reports.

pub mod history;
pub mod manager;
pub mod ports;

pub use history::{live_runs, prior_mappings, rollback_candidates, within_days};
pub use manager::{RollbackManager, RollbackSelection, RollbackSession};
pub use ports::ReportStore;
