//! Remote portal port and helpers layered on top of it.

pub mod dry_run;
pub mod paging;
pub mod ports;

pub use dry_run::DryRunPortal;
pub use paging::{collect_records, fetch_by_ids};
pub use ports::CrmPortal;
