//! Domain types and models

pub mod association;
pub mod audit;
pub mod mapping;
pub mod object_type;
pub mod plan;
pub mod query;
pub mod record;
pub mod rollback;
pub mod schema;

pub use association::{
    Association, AssociationBatchOutcome, AssociationCategory, AssociationLabel, AssociationPair,
    ObjectRef,
};
pub use audit::{
    AssociationResult, AuditRecord, FailedAssociation, FailedRecord, ObjectResult, RunKind,
    SchemaChange, SchemaChangeKind,
};
pub use mapping::{IdMapping, IdMappingTable, PipelineMapping, PipelineMappings};
pub use object_type::ObjectType;
pub use plan::{MigrationPlan, SyncCriteria};
pub use query::{Filter, FilterGroup, RecordPage, RecordQuery, SortOrder};
pub use record::{PropertyKind, PropertyMap, PropertyValue, Record};
pub use rollback::{
    DeleteOutcome, ReversalFailure, ReversalSummary, RollbackMode, RollbackPhase, RollbackState,
};
pub use schema::{
    ObjectSchema, Pipeline, PropertyDefinition, PropertyGroup, PropertyOption, SchemaLabels, Stage,
};
