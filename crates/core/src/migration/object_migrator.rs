//! Record phase: create-or-update of one object type.

use std::sync::Arc;

use portalsync_domain::constants::CREATED_DATE_PROPERTY;
use portalsync_domain::{
    IdMapping, MigrateError, ObjectResult, ObjectType, PropertyMap, PropertyValue, Record, RecordQuery,
    Result, SortOrder,
};
use tracing::{debug, info, warn};

use super::natural_key::{self, NaturalKey};
use super::RunContext;
use crate::filter::{FieldFilter, SchemaIndex};
use crate::portal::{collect_records, fetch_by_ids, CrmPortal};

/// Which source records to migrate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordSelector {
    /// Every record of the type.
    All,
    /// Only these source ids.
    Ids(Vec<String>),
}

/// Selection, cap and order for one `migrate` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrateOptions {
    /// Which records to read.
    pub selector: RecordSelector,
    /// Cap on records written; the newest win.
    pub limit: Option<usize>,
    /// Read order, newest first by default.
    pub sort: SortOrder,
}

impl Default for MigrateOptions {
    fn default() -> Self {
        Self { selector: RecordSelector::All, limit: None, sort: SortOrder::NewestFirst }
    }
}

impl MigrateOptions {
    /// Every record, no cap.
    pub fn all() -> Self {
        Self::default()
    }

    /// Only the given source ids.
    pub fn ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { selector: RecordSelector::Ids(ids.into_iter().map(Into::into).collect()), ..Self::default() }
    }

    /// Set the record cap.
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }
}

enum WriteOutcome {
    Created(IdMapping),
    Updated(IdMapping),
}

/// Migrates records of one type, deduplicating by prior mapping or natural key.
///
/// Running it twice over the same source selection never creates a second
/// destination record: the second pass finds the first pass's mapping or
/// key match and updates instead.
pub struct ObjectMigrator {
    source: Arc<dyn CrmPortal>,
    destination: Arc<dyn CrmPortal>,
    filter: Arc<FieldFilter>,
    skip_contacts_without_email: bool,
}

impl ObjectMigrator {
    /// A migrator reading from `source` and writing to `destination`.
    pub fn new(
        source: Arc<dyn CrmPortal>,
        destination: Arc<dyn CrmPortal>,
        filter: Arc<FieldFilter>,
    ) -> Self {
        Self { source, destination, filter, skip_contacts_without_email: true }
    }

    /// Fail contacts without an email instead of creating them.
    pub fn skip_contacts_without_email(mut self, skip: bool) -> Self {
        self.skip_contacts_without_email = skip;
        self
    }

    /// Migrate the selected records of `object_type`.
    ///
    /// Per-record failures land in the returned result; only `Auth`/`Config`
    /// errors end the call early. The result is merged into the audit record
    /// either way.
    pub async fn migrate(
        &self,
        context: &mut RunContext,
        object_type: &ObjectType,
        options: &MigrateOptions,
    ) -> Result<ObjectResult> {
        let mut result = ObjectResult::new(object_type.clone());
        if let Some(reason) = context.invalid_reason(object_type) {
            warn!(object_type = %object_type, reason, "object_migrator.type_skipped");
            context.audit.record_object(result.clone());
            return Ok(result);
        }

        let outcome = self.migrate_records(context, object_type, options, &mut result).await;
        context.audit.record_object(result.clone());
        outcome?;

        info!(
            object_type = %object_type,
            created = result.created.len(),
            updated = result.updated.len(),
            failed = result.failed.len(),
            "object_migrator.completed"
        );
        Ok(result)
    }

    async fn migrate_records(
        &self,
        context: &mut RunContext,
        object_type: &ObjectType,
        options: &MigrateOptions,
        result: &mut ObjectResult,
    ) -> Result<()> {
        let schema = SchemaIndex::new(self.destination.list_properties(object_type).await?);
        let records = self.fetch(object_type, options, &schema).await?;
        debug!(object_type = %object_type, fetched = records.len(), "object_migrator.fetched");

        for record in records {
            match self.migrate_one(context, &record, &schema).await {
                Ok(WriteOutcome::Created(mapping)) => {
                    context.record_mapping(mapping.clone());
                    result.created.push(mapping);
                }
                Ok(WriteOutcome::Updated(mapping)) => {
                    context.record_mapping(mapping.clone());
                    result.updated.push(mapping);
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    debug!(object_type = %object_type, source_id = %record.id, error = %err, "object_migrator.record_failed");
                    result.fail(&record.id, failure_reason(&err));
                }
            }
        }
        Ok(())
    }

    async fn fetch(
        &self,
        object_type: &ObjectType,
        options: &MigrateOptions,
        schema: &SchemaIndex,
    ) -> Result<Vec<Record>> {
        let mut properties = self.filter.writable_names(object_type, schema);
        properties.push(CREATED_DATE_PROPERTY.to_string());
        if let Some(key) = natural_key::key_property(object_type) {
            properties.push(key.to_string());
        }
        if let Some((pipeline, stage)) = object_type.pipeline_properties() {
            properties.extend([pipeline.to_string(), stage.to_string()]);
        }
        properties.sort();
        properties.dedup();

        let query = RecordQuery::new(object_type.clone()).with_properties(properties).with_sort(options.sort);
        match &options.selector {
            RecordSelector::All => collect_records(self.source.as_ref(), query, options.limit).await,
            RecordSelector::Ids(ids) if ids.is_empty() => Ok(Vec::new()),
            RecordSelector::Ids(ids) => fetch_by_ids(self.source.as_ref(), query, ids, options.limit).await,
        }
    }

    async fn migrate_one(
        &self,
        context: &mut RunContext,
        record: &Record,
        schema: &SchemaIndex,
    ) -> Result<WriteOutcome> {
        let object_type = &record.object_type;
        let key = natural_key::natural_key(record);
        if *object_type == ObjectType::Contact && key.is_none() && self.skip_contacts_without_email {
            return Err(MigrateError::Validation("contact has no email; skipped".into()));
        }

        let mut properties = self.filter.filter(object_type, &record.properties, schema);
        remap_pipeline(context, object_type, record, &mut properties)?;

        if let Some(destination_id) = context.mappings.get(object_type, &record.id).map(str::to_string) {
            match self.update(object_type, &destination_id, &properties, key.as_ref()).await {
                Ok(()) => {
                    return Ok(WriteOutcome::Updated(IdMapping::new(
                        object_type.clone(),
                        &record.id,
                        destination_id,
                    )))
                }
                Err(err) if err.is_not_found() => {
                    debug!(object_type = %object_type, source_id = %record.id, destination_id, "object_migrator.stale_mapping");
                    context.mappings.remove(object_type, &record.id);
                }
                Err(err) => return Err(err),
            }
        }

        if let Some(key) = &key {
            if let Some(existing) = natural_key::find_by_key(self.destination.as_ref(), object_type, key).await? {
                self.update(object_type, &existing.id, &properties, Some(key)).await?;
                return Ok(WriteOutcome::Updated(IdMapping::new(object_type.clone(), &record.id, existing.id)));
            }
        }

        let created = self.destination.create_record(object_type, &properties).await?;
        Ok(WriteOutcome::Created(IdMapping::new(object_type.clone(), &record.id, created.id)))
    }

    async fn update(
        &self,
        object_type: &ObjectType,
        destination_id: &str,
        properties: &PropertyMap,
        key: Option<&NaturalKey>,
    ) -> Result<()> {
        let mut payload = properties.clone();
        if let Some(key) = key {
            payload.remove(key.property);
        }
        if payload.is_empty() {
            return Ok(());
        }
        self.destination.update_record(object_type, destination_id, &payload).await?;
        Ok(())
    }
}

/// Rewrite pipeline and stage ids to their destination counterparts.
fn remap_pipeline(
    context: &RunContext,
    object_type: &ObjectType,
    record: &Record,
    properties: &mut PropertyMap,
) -> Result<()> {
    let Some((pipeline_property, stage_property)) = object_type.pipeline_properties() else {
        return Ok(());
    };

    if let Some(source_pipeline) = record.property(pipeline_property).and_then(PropertyValue::to_wire) {
        let mapping = context.pipelines.pipeline(object_type, &source_pipeline).ok_or_else(|| {
            MigrateError::Validation(format!("pipeline '{source_pipeline}' has no destination mapping"))
        })?;
        properties.insert(
            pipeline_property.to_string(),
            PropertyValue::String(mapping.destination_pipeline_id.clone()),
        );
    }

    if let Some(source_stage) = record.property(stage_property).and_then(PropertyValue::to_wire) {
        let stage = context.pipelines.stage(object_type, &source_stage).ok_or_else(|| {
            MigrateError::Validation(format!("stage '{source_stage}' has no destination mapping"))
        })?;
        properties.insert(stage_property.to_string(), PropertyValue::String(stage.to_string()));
    }
    Ok(())
}

fn failure_reason(err: &MigrateError) -> String {
    match err {
        MigrateError::Validation(message) => message.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use portalsync_domain::{PipelineMapping, RunKind};

    use super::*;

    fn deal(pipeline: &str, stage: &str) -> Record {
        Record::new("1", ObjectType::Deal).with_property("pipeline", pipeline).with_property("dealstage", stage)
    }

    fn context_with_pipeline() -> RunContext {
        let mut context = RunContext::new(RunKind::Migration, false);
        context.pipelines.insert(PipelineMapping {
            object_type: ObjectType::Deal,
            source_pipeline_id: "default".into(),
            destination_pipeline_id: "p-100".into(),
            stages: BTreeMap::from([("won".to_string(), "s-200".to_string())]),
        });
        context
    }

    #[test]
    fn pipeline_and_stage_are_remapped() {
        let context = context_with_pipeline();
        let mut properties = PropertyMap::new();

        remap_pipeline(&context, &ObjectType::Deal, &deal("default", "won"), &mut properties).unwrap();

        assert_eq!(properties.get("pipeline").and_then(PropertyValue::as_str), Some("p-100"));
        assert_eq!(properties.get("dealstage").and_then(PropertyValue::as_str), Some("s-200"));
    }

    #[test]
    fn unmapped_stage_fails_the_record() {
        let context = context_with_pipeline();
        let mut properties = PropertyMap::new();

        let err = remap_pipeline(&context, &ObjectType::Deal, &deal("default", "lost"), &mut properties)
            .unwrap_err();
        assert!(matches!(err, MigrateError::Validation(_)));
    }

    #[test]
    fn types_without_pipelines_pass_through() {
        let context = RunContext::new(RunKind::Migration, false);
        let mut properties = PropertyMap::new();
        let contact = Record::new("1", ObjectType::Contact).with_property("pipeline", "x");

        remap_pipeline(&context, &ObjectType::Contact, &contact, &mut properties).unwrap();
        assert!(properties.is_empty());
    }
}
