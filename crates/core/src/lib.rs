//! # portalsync core
//!
//! Business logic for moving CRM data between two portals. No HTTP, no
//! filesystem: every remote effect goes through the [`CrmPortal`] and
//! [`ReportStore`] ports.
//!
//! ## Modules
//! - [`filter`]: which source properties may be written to the destination
//! - [`migration`]: schema, pipeline, record and association phases and the
//!   runner that sequences them
//! - [`sync`]: selective sync criteria resolved into a migration plan
//! - [`rollback`]: reversal of earlier runs from their reports
//! - [`portal`]: the portal port, paging helpers and the dry-run decorator

pub mod filter;
pub mod migration;
pub mod portal;
pub mod rollback;
pub mod sync;

pub use filter::{ExclusionTable, FieldFilter, SchemaIndex};
pub use migration::{
    AssociationMigrator, MigrateOptions, MigrationRunner, ObjectMigrator, PipelineMigrator,
    PropertyMigrator, RecordSelector, RunContext, RunOutcome, RunSettings,
};
pub use portal::{CrmPortal, DryRunPortal};
pub use rollback::{ReportStore, RollbackManager, RollbackSelection, RollbackSession};
pub use sync::SelectiveSyncResolver;
