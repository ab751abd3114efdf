//! Port interface for one CRM portal

use async_trait::async_trait;
use portalsync_domain::{
    Association, AssociationBatchOutcome, AssociationPair, DeleteOutcome, ObjectSchema, ObjectType,
    Pipeline, PropertyDefinition, PropertyGroup, PropertyMap, Record, RecordPage, RecordQuery,
    Result, Stage,
};

/// Operations the migrators need from a remote portal.
///
/// Implementations share one rate limiter per portal and retry transient
/// failures themselves; errors reaching the caller are final.
#[async_trait]
pub trait CrmPortal: Send + Sync {
    /// Short name used in logs (`source`, `destination`).
    fn label(&self) -> &str;

    /// Whether associations must be written in both directions explicitly.
    fn requires_reverse_links(&self) -> bool {
        false
    }

    // Records ---------------------------------------------------------------

    /// Fetch one page of records matching the query.
    async fn search_records(&self, query: &RecordQuery) -> Result<RecordPage>;

    /// One record with the requested properties; `None` when absent.
    async fn get_record(
        &self,
        object_type: &ObjectType,
        id: &str,
        properties: &[String],
    ) -> Result<Option<Record>>;

    /// Create a record and return it with its new id.
    async fn create_record(&self, object_type: &ObjectType, properties: &PropertyMap) -> Result<Record>;

    /// Overwrite the given properties of a record.
    async fn update_record(
        &self,
        object_type: &ObjectType,
        id: &str,
        properties: &PropertyMap,
    ) -> Result<Record>;

    /// Delete a record; a missing one is [`DeleteOutcome::AlreadyAbsent`].
    async fn delete_record(&self, object_type: &ObjectType, id: &str) -> Result<DeleteOutcome>;

    // Properties ------------------------------------------------------------

    /// Property definitions of a type.
    async fn list_properties(&self, object_type: &ObjectType) -> Result<Vec<PropertyDefinition>>;

    /// Create a property definition.
    async fn create_property(
        &self,
        object_type: &ObjectType,
        definition: &PropertyDefinition,
    ) -> Result<PropertyDefinition>;

    /// Delete a property definition.
    async fn delete_property(&self, object_type: &ObjectType, name: &str) -> Result<DeleteOutcome>;

    /// Property groups of a type.
    async fn list_property_groups(&self, object_type: &ObjectType) -> Result<Vec<PropertyGroup>>;

    /// Create a property group.
    async fn create_property_group(
        &self,
        object_type: &ObjectType,
        group: &PropertyGroup,
    ) -> Result<PropertyGroup>;

    /// Delete a property group.
    async fn delete_property_group(&self, object_type: &ObjectType, name: &str) -> Result<DeleteOutcome>;

    // Pipelines -------------------------------------------------------------

    /// Pipelines of a type, with their stages.
    async fn list_pipelines(&self, object_type: &ObjectType) -> Result<Vec<Pipeline>>;

    /// Create a pipeline with its stages.
    async fn create_pipeline(&self, object_type: &ObjectType, pipeline: &Pipeline) -> Result<Pipeline>;

    /// Add a stage to an existing pipeline.
    async fn create_pipeline_stage(
        &self,
        object_type: &ObjectType,
        pipeline_id: &str,
        stage: &Stage,
    ) -> Result<Stage>;

    /// Delete a pipeline.
    async fn delete_pipeline(&self, object_type: &ObjectType, pipeline_id: &str) -> Result<DeleteOutcome>;

    /// Delete one stage of a pipeline.
    async fn delete_pipeline_stage(
        &self,
        object_type: &ObjectType,
        pipeline_id: &str,
        stage_id: &str,
    ) -> Result<DeleteOutcome>;

    // Custom object schemas -------------------------------------------------

    /// Custom object schemas.
    async fn list_object_schemas(&self) -> Result<Vec<ObjectSchema>>;

    /// Create a custom object schema.
    async fn create_object_schema(&self, schema: &ObjectSchema) -> Result<ObjectSchema>;

    /// Delete a custom object schema by name.
    async fn delete_object_schema(&self, name: &str) -> Result<DeleteOutcome>;

    // Associations ----------------------------------------------------------

    /// Associations from each of `from_ids` to records of `to_type`.
    async fn list_associations(
        &self,
        from_type: &ObjectType,
        from_ids: &[String],
        to_type: &ObjectType,
    ) -> Result<Vec<Association>>;

    /// Create links in batch; existing ones come back as duplicates.
    async fn create_associations(
        &self,
        from_type: &ObjectType,
        to_type: &ObjectType,
        pairs: &[AssociationPair],
    ) -> Result<AssociationBatchOutcome>;

    /// Remove links in batch.
    async fn delete_associations(
        &self,
        from_type: &ObjectType,
        to_type: &ObjectType,
        pairs: &[AssociationPair],
    ) -> Result<()>;
}
