//! Migration phases and the runner that sequences them.

pub mod association_migrator;
pub mod context;
pub mod natural_key;
pub mod object_migrator;
pub mod pipeline_migrator;
pub mod property_migrator;
pub mod runner;

pub use association_migrator::{default_pairs, AssociationMigrator};
pub use context::RunContext;
pub use natural_key::NaturalKey;
pub use object_migrator::{MigrateOptions, ObjectMigrator, RecordSelector};
pub use pipeline_migrator::PipelineMigrator;
pub use property_migrator::PropertyMigrator;
pub use runner::{MigrationRunner, RunOutcome, RunSettings};

use portalsync_domain::{MigrateError, Result};

/// Later phases depend on schemas and pipelines, so in those phases an
/// exhausted transient error ends the run like `Auth`/`Config` do. Anything
/// else comes back as a message to record against the object type.
pub(crate) fn schema_phase_error(err: MigrateError) -> Result<String> {
    if err.is_fatal() || err.is_transient() {
        Err(err)
    } else {
        Ok(err.to_string())
    }
}
