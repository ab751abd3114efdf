//! Destination decorator that simulates every write.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use portalsync_domain::constants::DRY_RUN_ID_PREFIX;
use portalsync_domain::{
    Association, AssociationBatchOutcome, AssociationPair, DeleteOutcome, ObjectSchema, ObjectType,
    Pipeline, PropertyDefinition, PropertyGroup, PropertyMap, Record, RecordPage, RecordQuery,
    Result, Stage,
};
use tracing::debug;

use super::CrmPortal;

/// Reads go to the wrapped portal; writes succeed locally with synthetic ids.
///
/// Simulated properties, groups, pipelines and schemas are remembered so the
/// later phases of a dry run see the destination as a real run would.
pub struct DryRunPortal {
    inner: Arc<dyn CrmPortal>,
    counter: AtomicUsize,
    simulated: Mutex<Simulated>,
}

#[derive(Default)]
struct Simulated {
    properties: HashMap<ObjectType, Vec<PropertyDefinition>>,
    groups: HashMap<ObjectType, Vec<PropertyGroup>>,
    pipelines: HashMap<ObjectType, Vec<Pipeline>>,
    schemas: Vec<ObjectSchema>,
}

impl DryRunPortal {
    /// Wrap `inner`; reads pass through, writes are simulated.
    pub fn new(inner: Arc<dyn CrmPortal>) -> Self {
        Self { inner, counter: AtomicUsize::new(0), simulated: Mutex::new(Simulated::default()) }
    }

    fn next_id(&self, kind: &str) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{DRY_RUN_ID_PREFIX}-{kind}-{n}")
    }

    fn kind_slug(object_type: &ObjectType) -> String {
        object_type.to_string().replace(':', "-")
    }
}

#[async_trait]
impl CrmPortal for DryRunPortal {
    fn label(&self) -> &str {
        self.inner.label()
    }

    fn requires_reverse_links(&self) -> bool {
        self.inner.requires_reverse_links()
    }

    async fn search_records(&self, query: &RecordQuery) -> Result<RecordPage> {
        self.inner.search_records(query).await
    }

    async fn get_record(
        &self,
        object_type: &ObjectType,
        id: &str,
        properties: &[String],
    ) -> Result<Option<Record>> {
        if id.starts_with(DRY_RUN_ID_PREFIX) {
            return Ok(None);
        }
        self.inner.get_record(object_type, id, properties).await
    }

    async fn create_record(&self, object_type: &ObjectType, properties: &PropertyMap) -> Result<Record> {
        let id = self.next_id(&Self::kind_slug(object_type));
        debug!(object_type = %object_type, id = %id, "dry_run.create_record");
        let mut record = Record::new(id, object_type.clone());
        record.properties = properties.clone();
        Ok(record)
    }

    async fn update_record(
        &self,
        object_type: &ObjectType,
        id: &str,
        properties: &PropertyMap,
    ) -> Result<Record> {
        debug!(object_type = %object_type, id, "dry_run.update_record");
        let mut record = Record::new(id, object_type.clone());
        record.properties = properties.clone();
        Ok(record)
    }

    async fn delete_record(&self, object_type: &ObjectType, id: &str) -> Result<DeleteOutcome> {
        debug!(object_type = %object_type, id, "dry_run.delete_record");
        Ok(DeleteOutcome::Deleted)
    }

    async fn list_properties(&self, object_type: &ObjectType) -> Result<Vec<PropertyDefinition>> {
        let mut properties = self.inner.list_properties(object_type).await?;
        if let Some(extra) = self.simulated.lock().properties.get(object_type) {
            properties.extend(extra.iter().cloned());
        }
        Ok(properties)
    }

    async fn create_property(
        &self,
        object_type: &ObjectType,
        definition: &PropertyDefinition,
    ) -> Result<PropertyDefinition> {
        debug!(object_type = %object_type, property = %definition.name, "dry_run.create_property");
        self.simulated
            .lock()
            .properties
            .entry(object_type.clone())
            .or_default()
            .push(definition.clone());
        Ok(definition.clone())
    }

    async fn delete_property(&self, _object_type: &ObjectType, _name: &str) -> Result<DeleteOutcome> {
        Ok(DeleteOutcome::Deleted)
    }

    async fn list_property_groups(&self, object_type: &ObjectType) -> Result<Vec<PropertyGroup>> {
        let mut groups = self.inner.list_property_groups(object_type).await?;
        if let Some(extra) = self.simulated.lock().groups.get(object_type) {
            groups.extend(extra.iter().cloned());
        }
        Ok(groups)
    }

    async fn create_property_group(
        &self,
        object_type: &ObjectType,
        group: &PropertyGroup,
    ) -> Result<PropertyGroup> {
        self.simulated.lock().groups.entry(object_type.clone()).or_default().push(group.clone());
        Ok(group.clone())
    }

    async fn delete_property_group(&self, _object_type: &ObjectType, _name: &str) -> Result<DeleteOutcome> {
        Ok(DeleteOutcome::Deleted)
    }

    async fn list_pipelines(&self, object_type: &ObjectType) -> Result<Vec<Pipeline>> {
        let mut pipelines = self.inner.list_pipelines(object_type).await?;
        let simulated = self.simulated.lock();
        let Some(extra) = simulated.pipelines.get(object_type) else {
            return Ok(pipelines);
        };
        for pipeline in extra {
            match pipelines.iter_mut().find(|p| p.id == pipeline.id) {
                Some(existing) => *existing = pipeline.clone(),
                None => pipelines.push(pipeline.clone()),
            }
        }
        Ok(pipelines)
    }

    async fn create_pipeline(&self, object_type: &ObjectType, pipeline: &Pipeline) -> Result<Pipeline> {
        let mut created = pipeline.clone();
        created.id = self.next_id("pipeline");
        for stage in &mut created.stages {
            stage.id = self.next_id("stage");
        }
        debug!(object_type = %object_type, pipeline = %created.label, id = %created.id, "dry_run.create_pipeline");
        self.simulated
            .lock()
            .pipelines
            .entry(object_type.clone())
            .or_default()
            .push(created.clone());
        Ok(created)
    }

    async fn create_pipeline_stage(
        &self,
        object_type: &ObjectType,
        pipeline_id: &str,
        stage: &Stage,
    ) -> Result<Stage> {
        let mut created = stage.clone();
        created.id = self.next_id("stage");
        let existing = {
            let simulated = self.simulated.lock();
            simulated
                .pipelines
                .get(object_type)
                .and_then(|pipelines| pipelines.iter().find(|p| p.id == pipeline_id))
                .cloned()
        };
        let mut pipeline = match existing {
            Some(pipeline) => pipeline,
            None => self
                .inner
                .list_pipelines(object_type)
                .await?
                .into_iter()
                .find(|p| p.id == pipeline_id)
                .unwrap_or_else(|| Pipeline {
                    id: pipeline_id.to_string(),
                    label: pipeline_id.to_string(),
                    display_order: 0,
                    stages: Vec::new(),
                }),
        };
        pipeline.stages.push(created.clone());

        let mut simulated = self.simulated.lock();
        let pipelines = simulated.pipelines.entry(object_type.clone()).or_default();
        pipelines.retain(|p| p.id != pipeline_id);
        pipelines.push(pipeline);
        Ok(created)
    }

    async fn delete_pipeline(&self, _object_type: &ObjectType, _pipeline_id: &str) -> Result<DeleteOutcome> {
        Ok(DeleteOutcome::Deleted)
    }

    async fn delete_pipeline_stage(
        &self,
        _object_type: &ObjectType,
        _pipeline_id: &str,
        _stage_id: &str,
    ) -> Result<DeleteOutcome> {
        Ok(DeleteOutcome::Deleted)
    }

    async fn list_object_schemas(&self) -> Result<Vec<ObjectSchema>> {
        let mut schemas = self.inner.list_object_schemas().await?;
        schemas.extend(self.simulated.lock().schemas.iter().cloned());
        Ok(schemas)
    }

    async fn create_object_schema(&self, schema: &ObjectSchema) -> Result<ObjectSchema> {
        let mut created = schema.clone();
        created.object_type_id = Some(self.next_id("schema"));
        self.simulated.lock().schemas.push(created.clone());
        Ok(created)
    }

    async fn delete_object_schema(&self, _name: &str) -> Result<DeleteOutcome> {
        Ok(DeleteOutcome::Deleted)
    }

    async fn list_associations(
        &self,
        from_type: &ObjectType,
        from_ids: &[String],
        to_type: &ObjectType,
    ) -> Result<Vec<Association>> {
        let real: Vec<String> =
            from_ids.iter().filter(|id| !id.starts_with(DRY_RUN_ID_PREFIX)).cloned().collect();
        if real.is_empty() {
            return Ok(Vec::new());
        }
        self.inner.list_associations(from_type, &real, to_type).await
    }

    async fn create_associations(
        &self,
        from_type: &ObjectType,
        to_type: &ObjectType,
        pairs: &[AssociationPair],
    ) -> Result<AssociationBatchOutcome> {
        debug!(from = %from_type, to = %to_type, count = pairs.len(), "dry_run.create_associations");
        Ok(AssociationBatchOutcome { created: pairs.to_vec(), ..Default::default() })
    }

    async fn delete_associations(
        &self,
        _from_type: &ObjectType,
        _to_type: &ObjectType,
        _pairs: &[AssociationPair],
    ) -> Result<()> {
        Ok(())
    }
}
