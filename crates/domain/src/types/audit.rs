//! Append-only audit record of one run.
//!
//! A record is created when a run starts, appended to by every phase, and
//! flushed as a report when the run ends (or aborts). Rollback reads flushed
//! records but never changes them; it writes a record of its own.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AssociationPair, IdMapping, MigrationPlan, ObjectType, ReversalSummary};
use crate::impl_domain_status_conversions;

/// What a run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunKind {
    /// `migrate`: every record of the selected types.
    Migration,
    /// `sync`: a resolved plan.
    SelectiveSync,
    /// Reversal of earlier runs.
    Rollback,
}

impl_domain_status_conversions!(RunKind {
    Migration => "migration",
    SelectiveSync => "selective_sync",
    Rollback => "rollback",
});

/// A record that could not be written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedRecord {
    /// Source id of the record.
    pub source_id: String,
    /// Why the write failed.
    pub reason: String,
}

/// Per object type outcome of the record phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectResult {
    /// Type the counts refer to.
    pub object_type: ObjectType,
    /// Mappings for records created in the destination by this run.
    pub created: Vec<IdMapping>,
    /// Mappings for existing destination records that were updated.
    pub updated: Vec<IdMapping>,
    /// Records skipped or rejected.
    pub failed: Vec<FailedRecord>,
}

impl ObjectResult {
    /// An empty result for `object_type`.
    pub fn new(object_type: ObjectType) -> Self {
        Self { object_type, created: Vec::new(), updated: Vec::new(), failed: Vec::new() }
    }

    /// Destination ids created by this run.
    pub fn created_ids(&self) -> impl Iterator<Item = &str> {
        self.created.iter().map(|m| m.destination_id.as_str())
    }

    /// Destination ids updated by this run.
    pub fn updated_ids(&self) -> impl Iterator<Item = &str> {
        self.updated.iter().map(|m| m.destination_id.as_str())
    }

    /// Record a failed source record.
    pub fn fail(&mut self, source_id: impl Into<String>, reason: impl Into<String>) {
        self.failed.push(FailedRecord { source_id: source_id.into(), reason: reason.into() });
    }

    /// Fold `other` into this result.
    pub fn merge(&mut self, other: ObjectResult) {
        self.created.extend(other.created);
        self.updated.extend(other.updated);
        self.failed.extend(other.failed);
    }
}

/// Kinds of schema entity a run can create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaChangeKind {
    /// A property definition.
    Property,
    /// A property group.
    PropertyGroup,
    /// A deal or ticket pipeline.
    Pipeline,
    /// A stage added to an existing pipeline.
    PipelineStage,
    /// A custom object schema.
    ObjectSchema,
}

impl_domain_status_conversions!(SchemaChangeKind {
    Property => "property",
    PropertyGroup => "property_group",
    Pipeline => "pipeline",
    PipelineStage => "pipeline_stage",
    ObjectSchema => "object_schema",
});

/// One attempted schema or pipeline change in the destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaChange {
    /// Type the change belongs to.
    pub object_type: ObjectType,
    /// What was changed.
    pub kind: SchemaChangeKind,
    /// Property, group, pipeline or stage name (label for pipelines).
    pub name: String,
    /// Destination id for pipelines and stages; property names are their ids.
    #[serde(default)]
    pub destination_id: Option<String>,
    /// Owning pipeline id for stages.
    #[serde(default)]
    pub parent_id: Option<String>,
    /// True when this run created the entity; only those are rolled back.
    pub created: bool,
    /// Why the change failed.
    #[serde(default)]
    pub error: Option<String>,
}

impl SchemaChange {
    /// A change this run made.
    pub fn created(object_type: ObjectType, kind: SchemaChangeKind, name: impl Into<String>) -> Self {
        Self {
            object_type,
            kind,
            name: name.into(),
            destination_id: None,
            parent_id: None,
            created: true,
            error: None,
        }
    }

    /// A change that failed with `error`.
    pub fn failed(
        object_type: ObjectType,
        kind: SchemaChangeKind,
        name: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            object_type,
            kind,
            name: name.into(),
            destination_id: None,
            parent_id: None,
            created: false,
            error: Some(error.into()),
        }
    }

    /// Set the destination id.
    pub fn with_destination_id(mut self, id: impl Into<String>) -> Self {
        self.destination_id = Some(id.into());
        self
    }

    /// Set the owning pipeline id.
    pub fn with_parent_id(mut self, id: impl Into<String>) -> Self {
        self.parent_id = Some(id.into());
        self
    }
}

/// An association that could not be written. Each end carries its
/// destination id when it was resolved, else its source id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedAssociation {
    /// The `from` end.
    pub from_id: String,
    /// The `to` end.
    pub to_id: String,
    /// Why the link was not written.
    pub reason: String,
}

/// Outcome of the association phase for one `(from, to)` type pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociationResult {
    /// Type links go from.
    pub from_type: ObjectType,
    /// Type links go to.
    pub to_type: ObjectType,
    /// Destination id pairs created by this run.
    pub created: Vec<AssociationPair>,
    /// Links that already existed in the destination.
    pub skipped_duplicates: usize,
    /// Links that could not be resolved or written.
    pub failed: Vec<FailedAssociation>,
}

impl AssociationResult {
    /// An empty result for one type pair.
    pub fn new(from_type: ObjectType, to_type: ObjectType) -> Self {
        Self { from_type, to_type, created: Vec::new(), skipped_duplicates: 0, failed: Vec::new() }
    }
}

/// Report of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Time-ordered (v7) id; names the report file.
    pub run_id: Uuid,
    /// What the run did.
    pub kind: RunKind,
    /// When the run began.
    pub started_at: DateTime<Utc>,
    /// When the report was closed.
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    /// Nothing was written to the destination.
    pub dry_run: bool,
    /// True when the run stopped on a fatal error.
    #[serde(default)]
    pub aborted: bool,
    /// Resolved plan of a selective sync.
    #[serde(default)]
    pub plan: Option<MigrationPlan>,
    /// Record outcomes per object type.
    #[serde(default)]
    pub object_results: Vec<ObjectResult>,
    /// Schema and pipeline changes, in the order attempted.
    #[serde(default)]
    pub schema_changes: Vec<SchemaChange>,
    /// Association outcomes per type pair.
    #[serde(default)]
    pub association_results: Vec<AssociationResult>,
    /// Human-readable problems that did not stop the run.
    #[serde(default)]
    pub errors: Vec<String>,
    /// Tally of a rollback run.
    #[serde(default)]
    pub rollback: Option<ReversalSummary>,
}

impl AuditRecord {
    /// Open a record for a run starting now.
    pub fn begin(kind: RunKind, dry_run: bool) -> Self {
        Self {
            run_id: Uuid::now_v7(),
            kind,
            started_at: Utc::now(),
            finished_at: None,
            dry_run,
            aborted: false,
            plan: None,
            object_results: Vec::new(),
            schema_changes: Vec::new(),
            association_results: Vec::new(),
            errors: Vec::new(),
            rollback: None,
        }
    }

    /// Append an object result, merging with an earlier entry for the type.
    pub fn record_object(&mut self, result: ObjectResult) {
        match self.object_results.iter_mut().find(|r| r.object_type == result.object_type) {
            Some(existing) => existing.merge(result),
            None => self.object_results.push(result),
        }
    }

    /// Append a schema change.
    pub fn record_schema_change(&mut self, change: SchemaChange) {
        self.schema_changes.push(change);
    }

    /// Append an association result.
    pub fn record_association(&mut self, result: AssociationResult) {
        self.association_results.push(result);
    }

    /// Append an error message.
    pub fn record_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    /// Stamp the finish time.
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Result for one object type, if any records were attempted.
    pub fn object_result(&self, object_type: &ObjectType) -> Option<&ObjectResult> {
        self.object_results.iter().find(|r| &r.object_type == object_type)
    }

    /// Records created across every type.
    pub fn created_total(&self) -> usize {
        self.object_results.iter().map(|r| r.created.len()).sum()
    }

    /// Records updated across every type.
    pub fn updated_total(&self) -> usize {
        self.object_results.iter().map(|r| r.updated.len()).sum()
    }

    /// Records failed across every type.
    pub fn failed_total(&self) -> usize {
        self.object_results.iter().map(|r| r.failed.len()).sum()
    }

    /// Links created across every pair.
    pub fn associations_created(&self) -> usize {
        self.association_results.iter().map(|r| r.created.len()).sum()
    }

    /// Every mapping established by this run, created or matched.
    pub fn id_mappings(&self) -> impl Iterator<Item = &IdMapping> {
        self.object_results.iter().flat_map(|r| r.created.iter().chain(r.updated.iter()))
    }

    /// Whether the run wrote anything that a rollback could reverse.
    pub fn has_reversible_changes(&self) -> bool {
        !self.dry_run
            && (self.created_total() > 0
                || self.associations_created() > 0
                || self.schema_changes.iter().any(|c| c.created))
    }
}
