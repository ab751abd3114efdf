//! In-memory `CrmPortal`.
//!
//! Behaves like the vendor API where it matters to the migrators: search
//! honours filter groups and the creation-date sort, creating a contact with
//! an email that already exists is a conflict, duplicate associations are
//! reported as duplicates and deleting something absent is `AlreadyAbsent`.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use portalsync_core::portal::paging::sort_records;
use portalsync_core::CrmPortal;
use portalsync_domain::{
    Association, AssociationBatchOutcome, AssociationPair, DeleteOutcome, MigrateError, ObjectRef,
    ObjectSchema, ObjectType, Pipeline, PropertyDefinition, PropertyGroup, PropertyMap, Record,
    RecordPage, RecordQuery, Result, Stage,
};

use super::fixtures::standard_properties;

type Link = (ObjectType, String, ObjectType, String);

#[derive(Default)]
struct State {
    records: BTreeMap<ObjectType, BTreeMap<String, Record>>,
    properties: HashMap<ObjectType, Vec<PropertyDefinition>>,
    groups: HashMap<ObjectType, Vec<PropertyGroup>>,
    pipelines: HashMap<ObjectType, Vec<Pipeline>>,
    schemas: Vec<ObjectSchema>,
    links: BTreeSet<Link>,
    next_id: u64,
    failures: HashMap<String, MigrateError>,
    calls: Vec<String>,
}

impl State {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}{}", self.next_id)
    }

    fn check(&mut self, call: String) -> Result<()> {
        let failure = self.failures.get(&call).cloned();
        self.calls.push(call);
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

pub struct InMemoryPortal {
    label: String,
    id_prefix: String,
    reverse_links: bool,
    state: Mutex<State>,
}

impl InMemoryPortal {
    /// A portal declaring the standard vendor properties for every standard type.
    pub fn new(label: &str, id_prefix: &str) -> Self {
        let mut state = State::default();
        for object_type in ObjectType::STANDARD {
            state.properties.insert(object_type.clone(), standard_properties(&object_type));
        }
        Self {
            label: label.to_string(),
            id_prefix: id_prefix.to_string(),
            reverse_links: false,
            state: Mutex::new(state),
        }
    }

    pub fn with_reverse_links(mut self) -> Self {
        self.reverse_links = true;
        self
    }

    pub fn insert_record(&self, record: Record) {
        self.state
            .lock()
            .records
            .entry(record.object_type.clone())
            .or_default()
            .insert(record.id.clone(), record);
    }

    pub fn add_property(&self, object_type: &ObjectType, definition: PropertyDefinition) {
        self.state.lock().properties.entry(object_type.clone()).or_default().push(definition);
    }

    pub fn add_pipeline(&self, object_type: &ObjectType, pipeline: Pipeline) {
        self.state.lock().pipelines.entry(object_type.clone()).or_default().push(pipeline);
    }

    pub fn add_schema(&self, schema: ObjectSchema) {
        let mut state = self.state.lock();
        let object_type = ObjectType::custom(schema.name.clone());
        let mut properties = standard_properties(&object_type);
        properties.extend(schema.properties.iter().cloned());
        state.properties.insert(object_type, properties);
        state.schemas.push(schema);
    }

    pub fn link(&self, from: (ObjectType, &str), to: (ObjectType, &str)) {
        self.state.lock().links.insert((from.0, from.1.to_string(), to.0, to.1.to_string()));
    }

    /// Make a call fail, e.g. `fail_on("create_object_schema:pets", ...)`.
    pub fn fail_on(&self, call: &str, err: MigrateError) {
        self.state.lock().failures.insert(call.to_string(), err);
    }

    pub fn clear_failures(&self) {
        self.state.lock().failures.clear();
    }

    pub fn records(&self, object_type: &ObjectType) -> Vec<Record> {
        self.state
            .lock()
            .records
            .get(object_type)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn record(&self, object_type: &ObjectType, id: &str) -> Option<Record> {
        self.state.lock().records.get(object_type).and_then(|records| records.get(id)).cloned()
    }

    pub fn has_property(&self, object_type: &ObjectType, name: &str) -> bool {
        self.state
            .lock()
            .properties
            .get(object_type)
            .is_some_and(|defs| defs.iter().any(|d| d.name == name))
    }

    pub fn has_schema(&self, name: &str) -> bool {
        self.state.lock().schemas.iter().any(|s| s.name == name)
    }

    pub fn pipelines(&self, object_type: &ObjectType) -> Vec<Pipeline> {
        self.state.lock().pipelines.get(object_type).cloned().unwrap_or_default()
    }

    pub fn links(&self) -> Vec<Link> {
        self.state.lock().links.iter().cloned().collect()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub fn write_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with("create") || c.starts_with("update") || c.starts_with("delete"))
            .collect()
    }
}

fn not_found(what: String) -> MigrateError {
    MigrateError::NotFound(what)
}

#[async_trait]
impl CrmPortal for InMemoryPortal {
    fn label(&self) -> &str {
        &self.label
    }

    fn requires_reverse_links(&self) -> bool {
        self.reverse_links
    }

    async fn search_records(&self, query: &RecordQuery) -> Result<RecordPage> {
        let mut state = self.state.lock();
        state.check(format!("search_records:{}", query.object_type))?;
        let mut matches: Vec<Record> = state
            .records
            .get(&query.object_type)
            .map(|records| records.values().filter(|r| query.matches(r)).cloned().collect())
            .unwrap_or_default();
        sort_records(&mut matches, query.sort);

        let offset: usize = query.after.as_deref().and_then(|a| a.parse().ok()).unwrap_or(0);
        let end = (offset + query.page_size).min(matches.len());
        let records = matches.get(offset..end).map(<[Record]>::to_vec).unwrap_or_default();
        let next_after = (end < matches.len()).then(|| end.to_string());
        Ok(RecordPage { records, next_after })
    }

    async fn get_record(
        &self,
        object_type: &ObjectType,
        id: &str,
        _properties: &[String],
    ) -> Result<Option<Record>> {
        let mut state = self.state.lock();
        state.check(format!("get_record:{object_type}:{id}"))?;
        Ok(state.records.get(object_type).and_then(|records| records.get(id)).cloned())
    }

    async fn create_record(&self, object_type: &ObjectType, properties: &PropertyMap) -> Result<Record> {
        let mut state = self.state.lock();
        state.check(format!("create_record:{object_type}"))?;
        if *object_type == ObjectType::Contact {
            let email = properties.get("email").and_then(|v| v.to_wire());
            let taken = state.records.get(object_type).is_some_and(|records| {
                records.values().any(|r| r.property("email").and_then(|v| v.to_wire()) == email && email.is_some())
            });
            if taken {
                return Err(MigrateError::Conflict("contact already exists".into()));
            }
        }
        let prefix = self.id_prefix.clone();
        let id = state.next_id(&prefix);
        let mut record = Record::new(id.clone(), object_type.clone()).with_created_at(Utc::now());
        record.properties = properties.clone();
        state.records.entry(object_type.clone()).or_default().insert(id, record.clone());
        Ok(record)
    }

    async fn update_record(
        &self,
        object_type: &ObjectType,
        id: &str,
        properties: &PropertyMap,
    ) -> Result<Record> {
        let mut state = self.state.lock();
        state.check(format!("update_record:{object_type}:{id}"))?;
        let record = state
            .records
            .get_mut(object_type)
            .and_then(|records| records.get_mut(id))
            .ok_or_else(|| not_found(format!("{object_type} {id}")))?;
        record.properties.extend(properties.clone());
        Ok(record.clone())
    }

    async fn delete_record(&self, object_type: &ObjectType, id: &str) -> Result<DeleteOutcome> {
        let mut state = self.state.lock();
        state.check(format!("delete_record:{object_type}:{id}"))?;
        let removed = state.records.get_mut(object_type).and_then(|records| records.remove(id));
        state.links.retain(|(ft, fi, tt, ti)| !((ft == object_type && fi == id) || (tt == object_type && ti == id)));
        Ok(if removed.is_some() { DeleteOutcome::Deleted } else { DeleteOutcome::AlreadyAbsent })
    }

    async fn list_properties(&self, object_type: &ObjectType) -> Result<Vec<PropertyDefinition>> {
        let mut state = self.state.lock();
        state.check(format!("list_properties:{object_type}"))?;
        Ok(state.properties.get(object_type).cloned().unwrap_or_default())
    }

    async fn create_property(
        &self,
        object_type: &ObjectType,
        definition: &PropertyDefinition,
    ) -> Result<PropertyDefinition> {
        let mut state = self.state.lock();
        state.check(format!("create_property:{object_type}:{}", definition.name))?;
        let properties = state.properties.entry(object_type.clone()).or_default();
        if properties.iter().any(|d| d.name == definition.name) {
            return Err(MigrateError::Conflict(format!("property {} already exists", definition.name)));
        }
        properties.push(definition.clone());
        Ok(definition.clone())
    }

    async fn delete_property(&self, object_type: &ObjectType, name: &str) -> Result<DeleteOutcome> {
        let mut state = self.state.lock();
        state.check(format!("delete_property:{object_type}:{name}"))?;
        let properties = state.properties.entry(object_type.clone()).or_default();
        let before = properties.len();
        properties.retain(|d| d.name != name);
        Ok(if properties.len() < before { DeleteOutcome::Deleted } else { DeleteOutcome::AlreadyAbsent })
    }

    async fn list_property_groups(&self, object_type: &ObjectType) -> Result<Vec<PropertyGroup>> {
        let mut state = self.state.lock();
        state.check(format!("list_property_groups:{object_type}"))?;
        Ok(state.groups.get(object_type).cloned().unwrap_or_default())
    }

    async fn create_property_group(
        &self,
        object_type: &ObjectType,
        group: &PropertyGroup,
    ) -> Result<PropertyGroup> {
        let mut state = self.state.lock();
        state.check(format!("create_property_group:{object_type}:{}", group.name))?;
        state.groups.entry(object_type.clone()).or_default().push(group.clone());
        Ok(group.clone())
    }

    async fn delete_property_group(&self, object_type: &ObjectType, name: &str) -> Result<DeleteOutcome> {
        let mut state = self.state.lock();
        state.check(format!("delete_property_group:{object_type}:{name}"))?;
        let groups = state.groups.entry(object_type.clone()).or_default();
        let before = groups.len();
        groups.retain(|g| g.name != name);
        Ok(if groups.len() < before { DeleteOutcome::Deleted } else { DeleteOutcome::AlreadyAbsent })
    }

    async fn list_pipelines(&self, object_type: &ObjectType) -> Result<Vec<Pipeline>> {
        let mut state = self.state.lock();
        state.check(format!("list_pipelines:{object_type}"))?;
        Ok(state.pipelines.get(object_type).cloned().unwrap_or_default())
    }

    async fn create_pipeline(&self, object_type: &ObjectType, pipeline: &Pipeline) -> Result<Pipeline> {
        let mut state = self.state.lock();
        state.check(format!("create_pipeline:{object_type}:{}", pipeline.label))?;
        let prefix = self.id_prefix.clone();
        let mut created = pipeline.clone();
        created.id = state.next_id(&format!("{prefix}p"));
        for stage in &mut created.stages {
            stage.id = state.next_id(&format!("{prefix}s"));
        }
        state.pipelines.entry(object_type.clone()).or_default().push(created.clone());
        Ok(created)
    }

    async fn create_pipeline_stage(
        &self,
        object_type: &ObjectType,
        pipeline_id: &str,
        stage: &Stage,
    ) -> Result<Stage> {
        let mut state = self.state.lock();
        state.check(format!("create_pipeline_stage:{object_type}:{}", stage.label))?;
        let prefix = self.id_prefix.clone();
        let mut created = stage.clone();
        created.id = state.next_id(&format!("{prefix}s"));
        let pipeline = state
            .pipelines
            .get_mut(object_type)
            .and_then(|pipelines| pipelines.iter_mut().find(|p| p.id == pipeline_id))
            .ok_or_else(|| not_found(format!("pipeline {pipeline_id}")))?;
        pipeline.stages.push(created.clone());
        Ok(created)
    }

    async fn delete_pipeline(&self, object_type: &ObjectType, pipeline_id: &str) -> Result<DeleteOutcome> {
        let mut state = self.state.lock();
        state.check(format!("delete_pipeline:{object_type}:{pipeline_id}"))?;
        let pipelines = state.pipelines.entry(object_type.clone()).or_default();
        let before = pipelines.len();
        pipelines.retain(|p| p.id != pipeline_id);
        Ok(if pipelines.len() < before { DeleteOutcome::Deleted } else { DeleteOutcome::AlreadyAbsent })
    }

    async fn delete_pipeline_stage(
        &self,
        object_type: &ObjectType,
        pipeline_id: &str,
        stage_id: &str,
    ) -> Result<DeleteOutcome> {
        let mut state = self.state.lock();
        state.check(format!("delete_pipeline_stage:{object_type}:{stage_id}"))?;
        let Some(pipeline) = state
            .pipelines
            .get_mut(object_type)
            .and_then(|pipelines| pipelines.iter_mut().find(|p| p.id == pipeline_id))
        else {
            return Ok(DeleteOutcome::AlreadyAbsent);
        };
        let before = pipeline.stages.len();
        pipeline.stages.retain(|s| s.id != stage_id);
        Ok(if pipeline.stages.len() < before { DeleteOutcome::Deleted } else { DeleteOutcome::AlreadyAbsent })
    }

    async fn list_object_schemas(&self) -> Result<Vec<ObjectSchema>> {
        let mut state = self.state.lock();
        state.check("list_object_schemas".to_string())?;
        Ok(state.schemas.clone())
    }

    async fn create_object_schema(&self, schema: &ObjectSchema) -> Result<ObjectSchema> {
        let mut state = self.state.lock();
        state.check(format!("create_object_schema:{}", schema.name))?;
        let prefix = self.id_prefix.clone();
        let mut created = schema.clone();
        created.object_type_id = Some(state.next_id(&format!("2-{prefix}")));
        let object_type = ObjectType::custom(schema.name.clone());
        let mut properties = standard_properties(&object_type);
        properties.extend(schema.properties.iter().cloned());
        state.properties.insert(object_type, properties);
        state.schemas.push(created.clone());
        Ok(created)
    }

    async fn delete_object_schema(&self, name: &str) -> Result<DeleteOutcome> {
        let mut state = self.state.lock();
        state.check(format!("delete_object_schema:{name}"))?;
        let before = state.schemas.len();
        state.schemas.retain(|s| s.name != name);
        Ok(if state.schemas.len() < before { DeleteOutcome::Deleted } else { DeleteOutcome::AlreadyAbsent })
    }

    async fn list_associations(
        &self,
        from_type: &ObjectType,
        from_ids: &[String],
        to_type: &ObjectType,
    ) -> Result<Vec<Association>> {
        let mut state = self.state.lock();
        state.check(format!("list_associations:{from_type}:{to_type}"))?;
        let wanted: BTreeSet<&String> = from_ids.iter().collect();
        let mut found = BTreeSet::new();
        for (ft, fi, tt, ti) in &state.links {
            if ft == from_type && tt == to_type && wanted.contains(fi) {
                found.insert((fi.clone(), ti.clone()));
            }
            if tt == from_type && ft == to_type && wanted.contains(ti) {
                found.insert((ti.clone(), fi.clone()));
            }
        }
        Ok(found
            .into_iter()
            .map(|(from, to)| {
                Association::new(ObjectRef::new(from_type.clone(), from), ObjectRef::new(to_type.clone(), to))
            })
            .collect())
    }

    async fn create_associations(
        &self,
        from_type: &ObjectType,
        to_type: &ObjectType,
        pairs: &[AssociationPair],
    ) -> Result<AssociationBatchOutcome> {
        let mut state = self.state.lock();
        state.check(format!("create_associations:{from_type}:{to_type}"))?;
        let mut outcome = AssociationBatchOutcome::default();
        for pair in pairs {
            let link = (from_type.clone(), pair.from_id.clone(), to_type.clone(), pair.to_id.clone());
            let reverse = (to_type.clone(), pair.to_id.clone(), from_type.clone(), pair.from_id.clone());
            if state.links.contains(&link) || (!self.reverse_links && state.links.contains(&reverse)) {
                outcome.duplicates.push(pair.clone());
            } else {
                state.links.insert(link);
                outcome.created.push(pair.clone());
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
        let mut state = self.state.lock();
        state.check(format!("delete_associations:{from_type}:{to_type}"))?;
        for pair in pairs {
            state.links.remove(&(from_type.clone(), pair.from_id.clone(), to_type.clone(), pair.to_id.clone()));
            state.links.remove(&(to_type.clone(), pair.to_id.clone(), from_type.clone(), pair.from_id.clone()));
        }
        Ok(())
    }
}
