//! Pipeline phase for deals and tickets.

use std::collections::BTreeMap;
use std::sync::Arc;

use portalsync_domain::{
    ObjectType, Pipeline, PipelineMapping, Result, SchemaChange, SchemaChangeKind, Stage,
};
use tracing::{debug, info, warn};

use super::{schema_phase_error, RunContext};
use crate::portal::CrmPortal;

/// Matches source pipelines to destination pipelines by label, creating
/// whatever is missing, and records the id mapping in the run context.
pub struct PipelineMigrator {
    source: Arc<dyn CrmPortal>,
    destination: Arc<dyn CrmPortal>,
}

impl PipelineMigrator {
    /// A migrator copying pipelines from `source` to `destination`.
    pub fn new(source: Arc<dyn CrmPortal>, destination: Arc<dyn CrmPortal>) -> Self {
        Self { source, destination }
    }

    /// Map source pipelines and stages of `object_type` onto the destination,
    /// creating missing ones.
    pub async fn migrate(&self, context: &mut RunContext, object_type: &ObjectType) -> Result<()> {
        if !object_type.has_pipelines() {
            return Ok(());
        }

        let source_pipelines = self.source.list_pipelines(object_type).await?;
        let destination_pipelines = self.destination.list_pipelines(object_type).await?;

        for pipeline in &source_pipelines {
            let matched = destination_pipelines.iter().find(|candidate| candidate.has_label(&pipeline.label));
            let mapping = match matched {
                Some(existing) => self.sync_stages(context, object_type, pipeline, existing).await?,
                None => self.create_pipeline(context, object_type, pipeline).await?,
            };
            if let Some(mapping) = mapping {
                context.pipelines.insert(mapping);
            }
        }

        info!(object_type = %object_type, pipelines = source_pipelines.len(), "pipeline_migrator.completed");
        Ok(())
    }

    async fn create_pipeline(
        &self,
        context: &mut RunContext,
        object_type: &ObjectType,
        pipeline: &Pipeline,
    ) -> Result<Option<PipelineMapping>> {
        let mut request = pipeline.clone();
        request.id = String::new();
        request.stages.sort_by_key(|stage| stage.display_order);

        match self.destination.create_pipeline(object_type, &request).await {
            Ok(created) => {
                info!(object_type = %object_type, pipeline = %pipeline.label, id = %created.id, "pipeline_migrator.pipeline_created");
                context.audit.record_schema_change(
                    SchemaChange::created(object_type.clone(), SchemaChangeKind::Pipeline, &pipeline.label)
                        .with_destination_id(&created.id),
                );
                let stages = pipeline
                    .stages
                    .iter()
                    .filter_map(|stage| {
                        created.stage_by_label(&stage.label).map(|dest| (stage.id.clone(), dest.id.clone()))
                    })
                    .collect();
                Ok(Some(PipelineMapping {
                    object_type: object_type.clone(),
                    source_pipeline_id: pipeline.id.clone(),
                    destination_pipeline_id: created.id,
                    stages,
                }))
            }
            Err(err) => {
                let message = schema_phase_error(err)?;
                warn!(object_type = %object_type, pipeline = %pipeline.label, error = %message, "pipeline_migrator.pipeline_failed");
                context.audit.record_schema_change(SchemaChange::failed(
                    object_type.clone(),
                    SchemaChangeKind::Pipeline,
                    &pipeline.label,
                    &message,
                ));
                context.mark_invalid(
                    object_type.clone(),
                    format!("pipeline '{}' could not be created: {message}", pipeline.label),
                );
                Ok(None)
            }
        }
    }

    async fn sync_stages(
        &self,
        context: &mut RunContext,
        object_type: &ObjectType,
        source: &Pipeline,
        destination: &Pipeline,
    ) -> Result<Option<PipelineMapping>> {
        debug!(object_type = %object_type, pipeline = %source.label, "pipeline_migrator.pipeline_matched");
        let mut stages = BTreeMap::new();

        for stage in &source.stages {
            if let Some(existing) = destination.stage_by_label(&stage.label) {
                stages.insert(stage.id.clone(), existing.id.clone());
                continue;
            }

            let request = Stage { id: String::new(), ..stage.clone() };
            match self.destination.create_pipeline_stage(object_type, &destination.id, &request).await {
                Ok(created) => {
                    context.audit.record_schema_change(
                        SchemaChange::created(object_type.clone(), SchemaChangeKind::PipelineStage, &stage.label)
                            .with_destination_id(&created.id)
                            .with_parent_id(&destination.id),
                    );
                    stages.insert(stage.id.clone(), created.id);
                }
                Err(err) => {
                    let message = schema_phase_error(err)?;
                    warn!(object_type = %object_type, stage = %stage.label, error = %message, "pipeline_migrator.stage_failed");
                    context.audit.record_schema_change(
                        SchemaChange::failed(
                            object_type.clone(),
                            SchemaChangeKind::PipelineStage,
                            &stage.label,
                            message,
                        )
                        .with_parent_id(&destination.id),
                    );
                }
            }
        }

        Ok(Some(PipelineMapping {
            object_type: object_type.clone(),
            source_pipeline_id: source.id.clone(),
            destination_pipeline_id: destination.id.clone(),
            stages,
        }))
    }
}
