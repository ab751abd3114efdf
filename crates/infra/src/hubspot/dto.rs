//! Wire formats of the vendor REST API and their domain conversions.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use portalsync_domain::{
    AssociationCategory, AssociationLabel, Filter, FilterGroup, ObjectSchema, ObjectType,
    Pipeline, PropertyDefinition, PropertyGroup, PropertyKind, PropertyMap, PropertyOption,
    PropertyValue, Record, RecordQuery, SchemaLabels, SortOrder, Stage,
};
use portalsync_domain::constants::CREATED_DATE_PROPERTY;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Standard types every migrated custom object can be linked to.
const SCHEMA_ASSOCIATED_OBJECTS: [&str; 3] = ["CONTACT", "COMPANY", "DEAL"];

#[derive(Debug, Deserialize)]
pub struct ResultsDto<T> {
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}

/* -------------------------------------------------------------------------- */
/* Records */
/* -------------------------------------------------------------------------- */

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordDto {
    pub id: String,
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl RecordDto {
    pub fn into_record(self, object_type: ObjectType) -> Record {
        let properties = self
            .properties
            .into_iter()
            .map(|(name, value)| (name, json_to_value(value)))
            .collect();
        Record {
            id: self.id,
            object_type,
            properties,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

fn json_to_value(value: Value) -> PropertyValue {
    match value {
        Value::String(text) => PropertyValue::String(text),
        Value::Number(n) => n.as_f64().map(PropertyValue::Number).unwrap_or(PropertyValue::Null),
        Value::Bool(flag) => PropertyValue::Bool(flag),
        Value::Null => PropertyValue::Null,
        other => PropertyValue::String(other.to_string()),
    }
}

/// Request body for create and update calls; nulls are not sent.
#[derive(Debug, Serialize)]
pub struct RecordInputDto {
    pub properties: BTreeMap<String, String>,
}

impl From<&PropertyMap> for RecordInputDto {
    fn from(properties: &PropertyMap) -> Self {
        Self {
            properties: properties
                .iter()
                .filter_map(|(name, value)| value.to_wire().map(|wire| (name.clone(), wire)))
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequestDto {
    pub filter_groups: Vec<FilterGroupDto>,
    pub sorts: Vec<SortDto>,
    pub properties: Vec<String>,
    pub limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FilterGroupDto {
    pub filters: Vec<FilterDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterDto {
    pub property_name: String,
    pub operator: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SortDto {
    pub property_name: &'static str,
    pub direction: &'static str,
}

impl From<&RecordQuery> for SearchRequestDto {
    fn from(query: &RecordQuery) -> Self {
        let direction = match query.sort {
            SortOrder::NewestFirst => "DESCENDING",
            SortOrder::OldestFirst => "ASCENDING",
        };
        Self {
            filter_groups: query.filter_groups.iter().map(FilterGroupDto::from).collect(),
            sorts: vec![SortDto { property_name: CREATED_DATE_PROPERTY, direction }],
            properties: query.properties.clone(),
            limit: query.page_size,
            after: query.after.clone(),
        }
    }
}

impl From<&FilterGroup> for FilterGroupDto {
    fn from(group: &FilterGroup) -> Self {
        Self { filters: group.filters.iter().map(FilterDto::from).collect() }
    }
}

impl From<&Filter> for FilterDto {
    fn from(filter: &Filter) -> Self {
        let property_name = filter.property().to_string();
        match filter {
            Filter::Eq { value, .. } => {
                Self { property_name, operator: "EQ", value: Some(value.clone()), values: None }
            }
            Filter::Gte { value, .. } => {
                Self { property_name, operator: "GTE", value: Some(value.clone()), values: None }
            }
            Filter::In { values, .. } => {
                Self { property_name, operator: "IN", value: None, values: Some(values.clone()) }
            }
            Filter::ContainsToken { value, .. } => Self {
                property_name,
                operator: "CONTAINS_TOKEN",
                value: Some(value.clone()),
                values: None,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchResponseDto {
    #[serde(default)]
    pub results: Vec<RecordDto>,
    #[serde(default)]
    pub paging: Option<PagingDto>,
}

#[derive(Debug, Deserialize)]
pub struct PagingDto {
    #[serde(default)]
    pub next: Option<NextPageDto>,
}

#[derive(Debug, Deserialize)]
pub struct NextPageDto {
    pub after: String,
}

impl SearchResponseDto {
    pub fn next_after(&self) -> Option<String> {
        self.paging.as_ref().and_then(|p| p.next.as_ref()).map(|next| next.after.clone())
    }
}

/* -------------------------------------------------------------------------- */
/* Properties and groups */
/* -------------------------------------------------------------------------- */

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionDto {
    pub label: String,
    pub value: String,
    #[serde(default)]
    pub display_order: i32,
    #[serde(default)]
    pub hidden: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModificationMetadataDto {
    #[serde(default)]
    pub read_only_value: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDto {
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub field_type: String,
    #[serde(default)]
    pub group_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub options: Vec<OptionDto>,
    #[serde(default)]
    pub modification_metadata: Option<ModificationMetadataDto>,
    #[serde(default)]
    pub calculated: bool,
    #[serde(default)]
    pub hubspot_defined: Option<bool>,
}

impl From<PropertyDto> for PropertyDefinition {
    fn from(dto: PropertyDto) -> Self {
        Self {
            kind: parse_kind(&dto.kind),
            label: if dto.label.is_empty() { dto.name.clone() } else { dto.label },
            name: dto.name,
            field_type: dto.field_type,
            group_name: dto.group_name,
            description: dto.description.filter(|d| !d.trim().is_empty()),
            options: dto
                .options
                .into_iter()
                .map(|o| PropertyOption {
                    label: o.label,
                    value: o.value,
                    display_order: o.display_order,
                    hidden: o.hidden,
                })
                .collect(),
            read_only: dto.modification_metadata.map(|m| m.read_only_value).unwrap_or(false),
            calculated: dto.calculated,
            vendor_defined: dto.hubspot_defined.unwrap_or(false),
        }
    }
}

/// Unknown vendor types (`phone_number`, `object_coordinates`) behave as text.
fn parse_kind(raw: &str) -> PropertyKind {
    raw.parse().unwrap_or(PropertyKind::String)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyCreateDto {
    pub name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub field_type: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub group_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<OptionDto>,
}

impl From<&PropertyDefinition> for PropertyCreateDto {
    fn from(definition: &PropertyDefinition) -> Self {
        Self {
            name: definition.name.clone(),
            label: definition.label.clone(),
            kind: definition.kind.to_string(),
            field_type: definition.field_type.clone(),
            group_name: definition.group_name.clone(),
            description: definition.description.clone(),
            options: definition
                .options
                .iter()
                .map(|o| OptionDto {
                    label: o.label.clone(),
                    value: o.value.clone(),
                    display_order: o.display_order,
                    hidden: o.hidden,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupDto {
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub display_order: i32,
}

impl From<GroupDto> for PropertyGroup {
    fn from(dto: GroupDto) -> Self {
        Self { name: dto.name, label: dto.label, display_order: dto.display_order }
    }
}

impl From<&PropertyGroup> for GroupDto {
    fn from(group: &PropertyGroup) -> Self {
        Self { name: group.name.clone(), label: group.label.clone(), display_order: group.display_order }
    }
}

/* -------------------------------------------------------------------------- */
/* Pipelines */
/* -------------------------------------------------------------------------- */

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageDto {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub display_order: i32,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

impl From<StageDto> for Stage {
    fn from(dto: StageDto) -> Self {
        Self {
            id: dto.id,
            label: dto.label,
            display_order: dto.display_order,
            metadata: dto
                .metadata
                .into_iter()
                .filter_map(|(key, value)| match value {
                    Value::Null => None,
                    Value::String(text) => Some((key, text)),
                    other => Some((key, other.to_string())),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineDto {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub display_order: i32,
    #[serde(default)]
    pub stages: Vec<StageDto>,
}

impl From<PipelineDto> for Pipeline {
    fn from(dto: PipelineDto) -> Self {
        let mut stages: Vec<Stage> = dto.stages.into_iter().map(Stage::from).collect();
        stages.sort_by_key(|stage| stage.display_order);
        Self { id: dto.id, label: dto.label, display_order: dto.display_order, stages }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageCreateDto {
    pub label: String,
    pub display_order: i32,
    pub metadata: BTreeMap<String, String>,
}

impl From<&Stage> for StageCreateDto {
    fn from(stage: &Stage) -> Self {
        Self {
            label: stage.label.clone(),
            display_order: stage.display_order,
            metadata: stage.metadata.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineCreateDto {
    pub label: String,
    pub display_order: i32,
    pub stages: Vec<StageCreateDto>,
}

impl From<&Pipeline> for PipelineCreateDto {
    fn from(pipeline: &Pipeline) -> Self {
        Self {
            label: pipeline.label.clone(),
            display_order: pipeline.display_order,
            stages: pipeline.stages.iter().map(StageCreateDto::from).collect(),
        }
    }
}

/* -------------------------------------------------------------------------- */
/* Custom object schemas */
/* -------------------------------------------------------------------------- */

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LabelsDto {
    #[serde(default)]
    pub singular: String,
    #[serde(default)]
    pub plural: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaDto {
    pub name: String,
    #[serde(default)]
    pub object_type_id: Option<String>,
    #[serde(default)]
    pub labels: LabelsDto,
    #[serde(default)]
    pub primary_display_property: Option<String>,
    #[serde(default)]
    pub secondary_display_properties: Vec<String>,
    #[serde(default)]
    pub required_properties: Vec<String>,
    #[serde(default)]
    pub searchable_properties: Vec<String>,
    #[serde(default)]
    pub properties: Vec<PropertyDto>,
}

impl From<SchemaDto> for ObjectSchema {
    fn from(dto: SchemaDto) -> Self {
        Self {
            name: dto.name,
            object_type_id: dto.object_type_id,
            labels: SchemaLabels { singular: dto.labels.singular, plural: dto.labels.plural },
            primary_display_property: dto.primary_display_property,
            secondary_display_properties: dto.secondary_display_properties,
            required_properties: dto.required_properties,
            searchable_properties: dto.searchable_properties,
            properties: dto.properties.into_iter().map(PropertyDefinition::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaCreateDto {
    pub name: String,
    pub labels: LabelsDto,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_display_property: Option<String>,
    pub secondary_display_properties: Vec<String>,
    pub required_properties: Vec<String>,
    pub searchable_properties: Vec<String>,
    pub properties: Vec<PropertyCreateDto>,
    pub associated_objects: Vec<&'static str>,
}

impl From<&ObjectSchema> for SchemaCreateDto {
    fn from(schema: &ObjectSchema) -> Self {
        Self {
            name: schema.name.clone(),
            labels: LabelsDto {
                singular: schema.labels.singular.clone(),
                plural: schema.labels.plural.clone(),
            },
            primary_display_property: schema.primary_display_property.clone(),
            secondary_display_properties: schema.secondary_display_properties.clone(),
            required_properties: schema.required_properties.clone(),
            searchable_properties: schema.searchable_properties.clone(),
            properties: schema.properties.iter().map(PropertyCreateDto::from).collect(),
            associated_objects: SCHEMA_ASSOCIATED_OBJECTS.to_vec(),
        }
    }
}

/* -------------------------------------------------------------------------- */
/* Associations (v4) */
/* -------------------------------------------------------------------------- */

#[derive(Debug, Serialize)]
pub struct IdDto {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct BatchInputDto<T> {
    pub inputs: Vec<T>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociationTypeDto {
    #[serde(alias = "category")]
    pub association_category: AssociationCategory,
    #[serde(alias = "typeId")]
    pub association_type_id: u32,
}

impl From<AssociationTypeDto> for AssociationLabel {
    fn from(dto: AssociationTypeDto) -> Self {
        Self { category: dto.association_category, type_id: dto.association_type_id }
    }
}

impl From<AssociationLabel> for AssociationTypeDto {
    fn from(label: AssociationLabel) -> Self {
        Self { association_category: label.category, association_type_id: label.type_id }
    }
}

#[derive(Debug, Serialize)]
pub struct LinkInputDto {
    pub from: IdDto,
    pub to: IdDto,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<AssociationTypeDto>,
}

#[derive(Debug, Serialize)]
pub struct ArchiveInputDto {
    pub from: IdDto,
    pub to: Vec<IdDto>,
}

/// One `batch/read` input; `after` continues a source whose targets were paged.
#[derive(Debug, Clone, Serialize)]
pub struct ReadInputDto {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReadResultDto {
    pub from: ObjectIdDto,
    #[serde(default)]
    pub to: Vec<ReadTargetDto>,
    /// Set when this source has more targets than one page holds.
    #[serde(default)]
    pub paging: Option<PagingDto>,
}

impl ReadResultDto {
    pub fn next_after(&self) -> Option<String> {
        self.paging.as_ref().and_then(|p| p.next.as_ref()).map(|next| next.after.clone())
    }
}

#[derive(Debug, Deserialize)]
pub struct ObjectIdDto {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadTargetDto {
    #[serde(deserialize_with = "id_string")]
    pub to_object_id: String,
    #[serde(default)]
    pub association_types: Vec<AssociationTypeDto>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BatchResponseDto {
    #[serde(default)]
    pub results: Vec<Value>,
    #[serde(default)]
    pub errors: Vec<BatchErrorDto>,
}

#[derive(Debug, Deserialize)]
pub struct BatchErrorDto {
    #[serde(default)]
    pub message: String,
}

impl BatchResponseDto {
    pub fn error_message(&self) -> Option<String> {
        if self.errors.is_empty() {
            return None;
        }
        Some(
            self.errors
                .iter()
                .map(|e| e.message.as_str())
                .filter(|m| !m.is_empty())
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

/// `(from_id, to_id)` of one batch write result; the two endpoints report
/// ids in different shapes.
pub fn written_pair(result: &Value) -> Option<(String, String)> {
    let from = result.get("fromObjectId").or_else(|| result.pointer("/from/id"))?;
    let to = result.get("toObjectId").or_else(|| result.pointer("/to/id"))?;
    Some((value_id(from)?, value_id(to)?))
}

fn value_id(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    value_id(&value).ok_or_else(|| serde::de::Error::custom("expected a string or numeric id"))
}
