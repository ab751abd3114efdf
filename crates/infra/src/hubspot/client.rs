//! REST adapter implementing the portal port against one HubSpot account.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use portalsync_common::{MinIntervalLimiter, RetryConfig};
use portalsync_core::CrmPortal;
use portalsync_domain::constants::{ASSOCIATION_BATCH_SIZE, DEFAULT_MAX_BACKOFF_SECS};
use portalsync_domain::{
    Association, AssociationBatchOutcome, AssociationPair, DeleteOutcome, MigrateError,
    MigrationSettings, ObjectRef, ObjectSchema, ObjectType, Pipeline, PortalConfig,
    PropertyDefinition, PropertyGroup, PropertyMap, Record, RecordPage, RecordQuery, Result, Stage,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::dto::{
    written_pair, ArchiveInputDto, AssociationTypeDto, BatchInputDto, BatchResponseDto, GroupDto,
    IdDto, LinkInputDto, PipelineCreateDto, PipelineDto, PropertyCreateDto, PropertyDto,
    ReadInputDto, ReadResultDto, RecordDto, RecordInputDto, ResultsDto, SchemaCreateDto, SchemaDto,
    SearchRequestDto, SearchResponseDto, StageCreateDto, StageDto,
};
use crate::api::ApiError;
use crate::http::HttpClient;

/// One HubSpot portal reached through its private-app token.
pub struct HubSpotPortal {
    label: String,
    http: HttpClient,
    /// Custom object name -> `objectTypeId` (`2-1234567`).
    schema_ids: Mutex<HashMap<String, String>>,
}

impl HubSpotPortal {
    /// An adapter over `http`; `label` names the portal in logs and errors.
    pub fn new(label: impl Into<String>, http: HttpClient) -> Self {
        Self { label: label.into(), http, schema_ids: Mutex::new(HashMap::new()) }
    }

    /// Build a portal client from configuration, with its own rate limiter.
    pub fn from_config(
        label: impl Into<String>,
        portal: &PortalConfig,
        settings: &MigrationSettings,
    ) -> Result<Self> {
        let retry = RetryConfig::builder()
            .max_attempts(settings.max_retries.saturating_add(1))
            .exponential_backoff(
                Duration::from_millis(settings.base_backoff_ms),
                2.0,
                Duration::from_secs(DEFAULT_MAX_BACKOFF_SECS),
            )
            .max_retry_after(Duration::from_secs(settings.max_retry_after_secs))
            .build();

        let http = HttpClient::builder()
            .base_url(portal.base_url.clone())
            .token(portal.token.clone())
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .retry(retry)
            .rate_limiter(Arc::new(MinIntervalLimiter::new(Duration::from_millis(
                settings.rate_limit_delay_ms,
            ))))
            .user_agent(concat!("portalsync/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self::new(label, http))
    }

    /// Path segment for an object type; custom types use their `objectTypeId`.
    async fn type_path(&self, object_type: &ObjectType) -> Result<String> {
        let ObjectType::Custom(name) = object_type else {
            return Ok(object_type.api_name().to_string());
        };

        let cached = self.schema_ids.lock().get(name).cloned();
        if let Some(id) = cached {
            return Ok(id);
        }

        self.list_object_schemas().await?;
        let resolved = self.schema_ids.lock().get(name).cloned();
        resolved.ok_or_else(|| {
            MigrateError::Schema(format!(
                "custom object '{name}' does not exist in the {} portal",
                self.label
            ))
        })
    }

    async fn delete_path(&self, path: &str) -> Result<DeleteOutcome> {
        match self.http.delete(path).await {
            Ok(()) => Ok(DeleteOutcome::Deleted),
            Err(err) if err.is_not_found() => {
                debug!(portal = %self.label, path, "hubspot.delete_already_absent");
                Ok(DeleteOutcome::AlreadyAbsent)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn write_links(
        &self,
        path: &str,
        pairs: &[AssociationPair],
        labeled: bool,
    ) -> Result<AssociationBatchOutcome> {
        let inputs = pairs
            .iter()
            .map(|pair| LinkInputDto {
                from: IdDto { id: pair.from_id.clone() },
                to: IdDto { id: pair.to_id.clone() },
                types: pair.label.map(AssociationTypeDto::from).into_iter().collect(),
            })
            .collect();
        let endpoint = if labeled { "batch/create" } else { "batch/associate/default" };

        let response = match self.http.post(&format!("{path}/{endpoint}"), &encode(&BatchInputDto { inputs })?).await {
            Ok(value) => value,
            Err(ApiError::Conflict(_)) => {
                return Ok(AssociationBatchOutcome { duplicates: pairs.to_vec(), ..Default::default() });
            }
            Err(err) => return Err(err.into()),
        };

        let batch: BatchResponseDto = if response.is_null() {
            BatchResponseDto::default()
        } else {
            decode(response, "association batch response")?
        };
        Ok(settle_batch(pairs, &batch))
    }
}

/// Split a batch write into confirmed and failed pairs.
fn settle_batch(pairs: &[AssociationPair], batch: &BatchResponseDto) -> AssociationBatchOutcome {
    let error = batch.error_message();
    if batch.results.is_empty() && error.is_none() {
        return AssociationBatchOutcome { created: pairs.to_vec(), ..Default::default() };
    }

    let confirmed: BTreeSet<(String, String)> = batch.results.iter().filter_map(written_pair).collect();
    let reason = error.unwrap_or_else(|| "not confirmed by the portal".to_string());

    let mut outcome = AssociationBatchOutcome::default();
    for pair in pairs {
        if confirmed.contains(&(pair.from_id.clone(), pair.to_id.clone())) {
            outcome.created.push(pair.clone());
        } else {
            outcome.failed.push((pair.clone(), reason.clone()));
        }
    }
    outcome
}

fn encode<T: Serialize>(body: &T) -> Result<Value> {
    serde_json::to_value(body)
        .map_err(|err| MigrateError::Internal(format!("failed to encode request body: {err}")))
}

fn decode<T: DeserializeOwned>(value: Value, what: &str) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|err| MigrateError::Internal(format!("unexpected {what}: {err}")))
}

#[async_trait]
impl CrmPortal for HubSpotPortal {
    fn label(&self) -> &str {
        &self.label
    }

    async fn search_records(&self, query: &RecordQuery) -> Result<RecordPage> {
        let path = self.type_path(&query.object_type).await?;
        let body = encode(&SearchRequestDto::from(query))?;
        let response: SearchResponseDto =
            decode(self.http.post(&format!("crm/v3/objects/{path}/search"), &body).await?, "search response")?;

        let next_after = response.next_after();
        let records = response
            .results
            .into_iter()
            .map(|dto| dto.into_record(query.object_type.clone()))
            .collect::<Vec<_>>();
        debug!(portal = %self.label, object_type = %query.object_type, fetched = records.len(), "hubspot.search");
        Ok(RecordPage { records, next_after })
    }

    async fn get_record(
        &self,
        object_type: &ObjectType,
        id: &str,
        properties: &[String],
    ) -> Result<Option<Record>> {
        let path = self.type_path(object_type).await?;
        let mut url = format!("crm/v3/objects/{path}/{id}");
        if !properties.is_empty() {
            let joined: String =
                url::form_urlencoded::byte_serialize(properties.join(",").as_bytes()).collect();
            url.push_str("?properties=");
            url.push_str(&joined);
        }

        match self.http.get(&url).await {
            Ok(value) => {
                let dto: RecordDto = decode(value, "record")?;
                Ok(Some(dto.into_record(object_type.clone())))
            }
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn create_record(&self, object_type: &ObjectType, properties: &PropertyMap) -> Result<Record> {
        let path = self.type_path(object_type).await?;
        let body = encode(&RecordInputDto::from(properties))?;
        let dto: RecordDto = decode(self.http.post(&format!("crm/v3/objects/{path}"), &body).await?, "record")?;
        Ok(dto.into_record(object_type.clone()))
    }

    async fn update_record(
        &self,
        object_type: &ObjectType,
        id: &str,
        properties: &PropertyMap,
    ) -> Result<Record> {
        let path = self.type_path(object_type).await?;
        let body = encode(&RecordInputDto::from(properties))?;
        let dto: RecordDto =
            decode(self.http.patch(&format!("crm/v3/objects/{path}/{id}"), &body).await?, "record")?;
        Ok(dto.into_record(object_type.clone()))
    }

    async fn delete_record(&self, object_type: &ObjectType, id: &str) -> Result<DeleteOutcome> {
        let path = self.type_path(object_type).await?;
        self.delete_path(&format!("crm/v3/objects/{path}/{id}")).await
    }

    async fn list_properties(&self, object_type: &ObjectType) -> Result<Vec<PropertyDefinition>> {
        let path = self.type_path(object_type).await?;
        let response: ResultsDto<PropertyDto> =
            decode(self.http.get(&format!("crm/v3/properties/{path}")).await?, "property list")?;
        Ok(response.results.into_iter().map(PropertyDefinition::from).collect())
    }

    async fn create_property(
        &self,
        object_type: &ObjectType,
        definition: &PropertyDefinition,
    ) -> Result<PropertyDefinition> {
        let path = self.type_path(object_type).await?;
        let body = encode(&PropertyCreateDto::from(definition))?;
        let dto: PropertyDto =
            decode(self.http.post(&format!("crm/v3/properties/{path}"), &body).await?, "property")?;
        Ok(dto.into())
    }

    async fn delete_property(&self, object_type: &ObjectType, name: &str) -> Result<DeleteOutcome> {
        let path = self.type_path(object_type).await?;
        self.delete_path(&format!("crm/v3/properties/{path}/{name}")).await
    }

    async fn list_property_groups(&self, object_type: &ObjectType) -> Result<Vec<PropertyGroup>> {
        let path = self.type_path(object_type).await?;
        let response: ResultsDto<GroupDto> =
            decode(self.http.get(&format!("crm/v3/properties/{path}/groups")).await?, "group list")?;
        Ok(response.results.into_iter().map(PropertyGroup::from).collect())
    }

    async fn create_property_group(
        &self,
        object_type: &ObjectType,
        group: &PropertyGroup,
    ) -> Result<PropertyGroup> {
        let path = self.type_path(object_type).await?;
        let body = encode(&GroupDto::from(group))?;
        let dto: GroupDto =
            decode(self.http.post(&format!("crm/v3/properties/{path}/groups"), &body).await?, "group")?;
        Ok(dto.into())
    }

    async fn delete_property_group(&self, object_type: &ObjectType, name: &str) -> Result<DeleteOutcome> {
        let path = self.type_path(object_type).await?;
        self.delete_path(&format!("crm/v3/properties/{path}/groups/{name}")).await
    }

    async fn list_pipelines(&self, object_type: &ObjectType) -> Result<Vec<Pipeline>> {
        let path = self.type_path(object_type).await?;
        let response: ResultsDto<PipelineDto> =
            decode(self.http.get(&format!("crm/v3/pipelines/{path}")).await?, "pipeline list")?;
        Ok(response.results.into_iter().map(Pipeline::from).collect())
    }

    async fn create_pipeline(&self, object_type: &ObjectType, pipeline: &Pipeline) -> Result<Pipeline> {
        let path = self.type_path(object_type).await?;
        let body = encode(&PipelineCreateDto::from(pipeline))?;
        let dto: PipelineDto =
            decode(self.http.post(&format!("crm/v3/pipelines/{path}"), &body).await?, "pipeline")?;
        Ok(dto.into())
    }

    async fn create_pipeline_stage(
        &self,
        object_type: &ObjectType,
        pipeline_id: &str,
        stage: &Stage,
    ) -> Result<Stage> {
        let path = self.type_path(object_type).await?;
        let body = encode(&StageCreateDto::from(stage))?;
        let dto: StageDto = decode(
            self.http.post(&format!("crm/v3/pipelines/{path}/{pipeline_id}/stages"), &body).await?,
            "pipeline stage",
        )?;
        Ok(dto.into())
    }

    async fn delete_pipeline(&self, object_type: &ObjectType, pipeline_id: &str) -> Result<DeleteOutcome> {
        let path = self.type_path(object_type).await?;
        self.delete_path(&format!("crm/v3/pipelines/{path}/{pipeline_id}")).await
    }

    async fn delete_pipeline_stage(
        &self,
        object_type: &ObjectType,
        pipeline_id: &str,
        stage_id: &str,
    ) -> Result<DeleteOutcome> {
        let path = self.type_path(object_type).await?;
        self.delete_path(&format!("crm/v3/pipelines/{path}/{pipeline_id}/stages/{stage_id}")).await
    }

    async fn list_object_schemas(&self) -> Result<Vec<ObjectSchema>> {
        let response: ResultsDto<SchemaDto> = decode(self.http.get("crm/v3/schemas").await?, "schema list")?;
        let schemas: Vec<ObjectSchema> = response.results.into_iter().map(ObjectSchema::from).collect();

        let mut ids = self.schema_ids.lock();
        for schema in &schemas {
            if let Some(id) = &schema.object_type_id {
                ids.insert(schema.name.clone(), id.clone());
            }
        }
        Ok(schemas)
    }

    async fn create_object_schema(&self, schema: &ObjectSchema) -> Result<ObjectSchema> {
        let body = encode(&SchemaCreateDto::from(schema))?;
        let dto: SchemaDto = decode(self.http.post("crm/v3/schemas", &body).await?, "schema")?;
        let created = ObjectSchema::from(dto);
        if let Some(id) = &created.object_type_id {
            self.schema_ids.lock().insert(created.name.clone(), id.clone());
        }
        Ok(created)
    }

    async fn delete_object_schema(&self, name: &str) -> Result<DeleteOutcome> {
        let target = self.schema_ids.lock().remove(name).unwrap_or_else(|| name.to_string());
        self.delete_path(&format!("crm/v3/schemas/{target}")).await
    }

    async fn list_associations(
        &self,
        from_type: &ObjectType,
        from_ids: &[String],
        to_type: &ObjectType,
    ) -> Result<Vec<Association>> {
        if from_ids.is_empty() {
            return Ok(Vec::new());
        }
        let from_path = self.type_path(from_type).await?;
        let to_path = self.type_path(to_type).await?;
        let url = format!("crm/v4/associations/{from_path}/{to_path}/batch/read");

        let mut associations = Vec::new();
        let mut pending: Vec<ReadInputDto> =
            from_ids.iter().map(|id| ReadInputDto { id: id.clone(), after: None }).collect();
        while !pending.is_empty() {
            let batch: Vec<ReadInputDto> = pending.drain(..pending.len().min(ASSOCIATION_BATCH_SIZE)).collect();
            let response: ResultsDto<ReadResultDto> =
                decode(self.http.post(&url, &encode(&BatchInputDto { inputs: batch })?).await?, "association read")?;

            for result in response.results {
                if let Some(after) = result.next_after() {
                    // More targets for this source; ask for its next page.
                    pending.push(ReadInputDto { id: result.from.id.clone(), after: Some(after) });
                }
                for target in result.to {
                    let mut association = Association::new(
                        ObjectRef::new(from_type.clone(), result.from.id.clone()),
                        ObjectRef::new(to_type.clone(), target.to_object_id),
                    );
                    if let Some(kind) = target.association_types.first() {
                        association = association.with_label((*kind).into());
                    }
                    associations.push(association);
                }
            }
        }
        debug!(portal = %self.label, %from_type, %to_type, found = associations.len(), "hubspot.associations_read");
        Ok(associations)
    }

    async fn create_associations(
        &self,
        from_type: &ObjectType,
        to_type: &ObjectType,
        pairs: &[AssociationPair],
    ) -> Result<AssociationBatchOutcome> {
        let from_path = self.type_path(from_type).await?;
        let to_path = self.type_path(to_type).await?;
        let path = format!("crm/v4/associations/{from_path}/{to_path}");

        let (labeled, unlabeled): (Vec<AssociationPair>, Vec<AssociationPair>) =
            pairs.iter().cloned().partition(|pair| pair.label.is_some());

        let mut outcome = AssociationBatchOutcome::default();
        for (group, is_labeled) in [(unlabeled, false), (labeled, true)] {
            for chunk in group.chunks(ASSOCIATION_BATCH_SIZE) {
                match self.write_links(&path, chunk, is_labeled).await {
                    Ok(batch) => outcome.merge(batch),
                    Err(err) if err.is_fatal() => return Err(err),
                    Err(err) => {
                        warn!(portal = %self.label, %from_type, %to_type, error = %err, "hubspot.association_batch_failed");
                        let reason = err.to_string();
                        outcome.failed.extend(chunk.iter().map(|pair| (pair.clone(), reason.clone())));
                    }
                }
            }
        }
        Ok(outcome)
    }

    async fn delete_associations(
        &self,
        from_type: &ObjectType,
        to_type: &ObjectType,
        pairs: &[AssociationPair],
    ) -> Result<()> {
        let from_path = self.type_path(from_type).await?;
        let to_path = self.type_path(to_type).await?;
        let url = format!("crm/v4/associations/{from_path}/{to_path}/batch/archive");

        let mut by_source: BTreeMap<&str, Vec<IdDto>> = BTreeMap::new();
        for pair in pairs {
            by_source.entry(pair.from_id.as_str()).or_default().push(IdDto { id: pair.to_id.clone() });
        }
        let inputs: Vec<ArchiveInputDto> = by_source
            .into_iter()
            .map(|(from, to)| ArchiveInputDto { from: IdDto { id: from.to_string() }, to })
            .collect();

        let mut remaining = inputs.into_iter().peekable();
        while remaining.peek().is_some() {
            let chunk: Vec<ArchiveInputDto> = remaining.by_ref().take(ASSOCIATION_BATCH_SIZE).collect();
            self.http.post(&url, &encode(&BatchInputDto { inputs: chunk })?).await?;
        }
        Ok(())
    }
}
