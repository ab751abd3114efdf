//! Cross-portal identifier mappings.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::ObjectType;

/// Correspondence between a source record and its destination counterpart.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdMapping {
    /// Type of both records.
    pub object_type: ObjectType,
    /// Id in the source portal.
    pub source_id: String,
    /// Id in the destination portal.
    pub destination_id: String,
}

impl IdMapping {
    /// Map `source_id` to `destination_id`.
    pub fn new(
        object_type: ObjectType,
        source_id: impl Into<String>,
        destination_id: impl Into<String>,
    ) -> Self {
        Self { object_type, source_id: source_id.into(), destination_id: destination_id.into() }
    }
}

/// Lookup table of source id to destination id, per object type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdMappingTable {
    entries: HashMap<ObjectType, HashMap<String, String>>,
}

impl IdMappingTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the mapping for one source record.
    pub fn insert(&mut self, mapping: IdMapping) {
        self.entries
            .entry(mapping.object_type)
            .or_default()
            .insert(mapping.source_id, mapping.destination_id);
    }

    /// Insert only when no mapping exists yet for the source record.
    pub fn insert_if_absent(&mut self, mapping: IdMapping) {
        self.entries
            .entry(mapping.object_type)
            .or_default()
            .entry(mapping.source_id)
            .or_insert(mapping.destination_id);
    }

    /// Destination id for a source record.
    pub fn get(&self, object_type: &ObjectType, source_id: &str) -> Option<&str> {
        self.entries.get(object_type).and_then(|ids| ids.get(source_id)).map(String::as_str)
    }

    /// Forget a mapping, returning its destination id.
    pub fn remove(&mut self, object_type: &ObjectType, source_id: &str) -> Option<String> {
        self.entries.get_mut(object_type).and_then(|ids| ids.remove(source_id))
    }

    /// Number of mappings across all types.
    pub fn len(&self) -> usize {
        self.entries.values().map(HashMap::len).sum()
    }

    /// True when no mapping is held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Destination ids for one source pipeline and its stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineMapping {
    /// Type the pipeline belongs to.
    pub object_type: ObjectType,
    /// Pipeline id in the source portal.
    pub source_pipeline_id: String,
    /// Pipeline id in the destination portal.
    pub destination_pipeline_id: String,
    /// Source stage id to destination stage id.
    pub stages: BTreeMap<String, String>,
}

/// Pipeline mappings established during the pipeline phase of a run.
#[derive(Debug, Clone, Default)]
pub struct PipelineMappings {
    by_type: HashMap<ObjectType, HashMap<String, PipelineMapping>>,
}

impl PipelineMappings {
    /// Insert or replace the mapping for a source pipeline.
    pub fn insert(&mut self, mapping: PipelineMapping) {
        self.by_type
            .entry(mapping.object_type.clone())
            .or_default()
            .insert(mapping.source_pipeline_id.clone(), mapping);
    }

    /// Mapping for a source pipeline.
    pub fn pipeline(&self, object_type: &ObjectType, source_pipeline_id: &str) -> Option<&PipelineMapping> {
        self.by_type.get(object_type).and_then(|pipelines| pipelines.get(source_pipeline_id))
    }

    /// Destination stage id for a source stage id, searching every pipeline
    /// of the type.
    pub fn stage(&self, object_type: &ObjectType, source_stage_id: &str) -> Option<&str> {
        self.by_type
            .get(object_type)?
            .values()
            .find_map(|mapping| mapping.stages.get(source_stage_id))
            .map(String::as_str)
    }

    /// Whether any pipeline of the type is mapped.
    pub fn has_type(&self, object_type: &ObjectType) -> bool {
        self.by_type.get(object_type).is_some_and(|pipelines| !pipelines.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_keeps_types_apart() {
        let mut table = IdMappingTable::new();
        table.insert(IdMapping::new(ObjectType::Contact, "1", "100"));
        table.insert(IdMapping::new(ObjectType::Deal, "1", "900"));

        assert_eq!(table.get(&ObjectType::Contact, "1"), Some("100"));
        assert_eq!(table.get(&ObjectType::Deal, "1"), Some("900"));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn insert_if_absent_does_not_overwrite() {
        let mut table = IdMappingTable::new();
        table.insert(IdMapping::new(ObjectType::Contact, "1", "new"));
        table.insert_if_absent(IdMapping::new(ObjectType::Contact, "1", "old"));

        assert_eq!(table.get(&ObjectType::Contact, "1"), Some("new"));
        assert_eq!(table.remove(&ObjectType::Contact, "1").as_deref(), Some("new"));
        assert!(table.is_empty());
    }

    #[test]
    fn stage_lookup_spans_pipelines() {
        let mut mappings = PipelineMappings::default();
        mappings.insert(PipelineMapping {
            object_type: ObjectType::Deal,
            source_pipeline_id: "default".into(),
            destination_pipeline_id: "default".into(),
            stages: BTreeMap::from([("appointmentscheduled".to_string(), "12345".to_string())]),
        });

        assert_eq!(mappings.stage(&ObjectType::Deal, "appointmentscheduled"), Some("12345"));
        assert!(mappings.stage(&ObjectType::Ticket, "appointmentscheduled").is_none());
        assert!(mappings.has_type(&ObjectType::Deal));
    }
}
