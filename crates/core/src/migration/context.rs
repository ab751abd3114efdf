//! Run-scoped state threaded through every phase.

use std::collections::{BTreeMap, BTreeSet};

use portalsync_domain::{
    AuditRecord, IdMapping, IdMappingTable, MigrationPlan, ObjectType, PipelineMappings, RunKind,
};

/// Everything one run accumulates.
///
/// Passed by `&mut` through the migrators so separate runs never share state.
#[derive(Debug)]
pub struct RunContext {
    /// Report being built for this run.
    pub audit: AuditRecord,
    /// Mappings created or matched in this run, plus those seeded from earlier runs.
    pub mappings: IdMappingTable,
    /// Source to destination pipeline and stage ids.
    pub pipelines: PipelineMappings,
    invalid_types: BTreeMap<ObjectType, String>,
    /// Source ids migrated in this run, per type.
    migrated: BTreeMap<ObjectType, BTreeSet<String>>,
}

impl RunContext {
    /// Fresh context for a run of `kind`.
    pub fn new(kind: RunKind, dry_run: bool) -> Self {
        Self {
            audit: AuditRecord::begin(kind, dry_run),
            mappings: IdMappingTable::new(),
            pipelines: PipelineMappings::default(),
            invalid_types: BTreeMap::new(),
            migrated: BTreeMap::new(),
        }
    }

    /// Context for a selective sync of `plan`; the plan is kept in the report.
    pub fn for_plan(plan: MigrationPlan, dry_run: bool) -> Self {
        let mut context = Self::new(RunKind::SelectiveSync, dry_run);
        context.audit.plan = Some(plan);
        context
    }

    /// Seed mappings recovered from earlier reports without overriding this run's.
    pub fn seed_mappings(&mut self, mappings: impl IntoIterator<Item = IdMapping>) {
        for mapping in mappings {
            self.mappings.insert_if_absent(mapping);
        }
    }

    /// Skip record migration for `object_type`; the reason lands in `audit.errors`.
    pub fn mark_invalid(&mut self, object_type: ObjectType, reason: impl Into<String>) {
        let reason = reason.into();
        if !self.invalid_types.contains_key(&object_type) {
            self.audit.record_error(format!("{object_type}: {reason}"));
            self.invalid_types.insert(object_type, reason);
        }
    }

    /// Why record migration for `object_type` is skipped, if it is.
    pub fn invalid_reason(&self, object_type: &ObjectType) -> Option<&str> {
        self.invalid_types.get(object_type).map(String::as_str)
    }

    /// Record a mapping written in this run.
    pub fn record_mapping(&mut self, mapping: IdMapping) {
        self.migrated
            .entry(mapping.object_type.clone())
            .or_default()
            .insert(mapping.source_id.clone());
        self.mappings.insert(mapping);
    }

    /// Source ids of `object_type` written in this run.
    pub fn migrated_ids(&self, object_type: &ObjectType) -> Vec<String> {
        self.migrated.get(object_type).map(|ids| ids.iter().cloned().collect()).unwrap_or_default()
    }

    /// Types with at least one record written in this run.
    pub fn migrated_types(&self) -> Vec<ObjectType> {
        self.migrated.keys().cloned().collect()
    }

    /// Close the report.
    pub fn into_audit(mut self) -> AuditRecord {
        self.audit.finish();
        self.audit
    }
}
