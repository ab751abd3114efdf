//! Schema phase: custom object schemas, property groups and properties.

use std::collections::BTreeSet;
use std::sync::Arc;

use portalsync_domain::{
    MigrateError, ObjectSchema, ObjectType, PropertyDefinition, PropertyGroup, Result, SchemaChange,
    SchemaChangeKind,
};
use tracing::{debug, info, warn};

use super::{schema_phase_error, RunContext};
use crate::filter::FieldFilter;
use crate::portal::CrmPortal;

/// Creates custom schemas and properties the destination is missing.
pub struct PropertyMigrator {
    source: Arc<dyn CrmPortal>,
    destination: Arc<dyn CrmPortal>,
    filter: Arc<FieldFilter>,
}

impl PropertyMigrator {
    /// A migrator copying definitions from `source` to `destination`.
    pub fn new(
        source: Arc<dyn CrmPortal>,
        destination: Arc<dyn CrmPortal>,
        filter: Arc<FieldFilter>,
    ) -> Self {
        Self { source, destination, filter }
    }

    /// Create missing custom object schemas and return the custom types
    /// handled. `wanted` narrows the source schemas considered.
    ///
    /// A schema without a primary display property is still sent to the
    /// destination, but its type is marked invalid so no records follow.
    pub async fn migrate_schemas(
        &self,
        context: &mut RunContext,
        wanted: Option<&[ObjectType]>,
    ) -> Result<Vec<ObjectType>> {
        let source_schemas: Vec<ObjectSchema> = self
            .source
            .list_object_schemas()
            .await?
            .into_iter()
            .filter(|schema| {
                wanted.map_or(true, |types| types.contains(&ObjectType::custom(schema.name.clone())))
            })
            .collect();
        if source_schemas.is_empty() {
            return Ok(Vec::new());
        }
        let existing: BTreeSet<String> = self
            .destination
            .list_object_schemas()
            .await?
            .into_iter()
            .map(|schema| schema.name)
            .collect();

        let mut types = Vec::with_capacity(source_schemas.len());
        for schema in source_schemas {
            let object_type = ObjectType::custom(schema.name.clone());
            types.push(object_type.clone());
            let invalid = schema.validate().err();

            if existing.contains(&schema.name) {
                debug!(schema = %schema.name, "property_migrator.schema_exists");
                if let Some(err) = invalid {
                    context.audit.record_schema_change(SchemaChange::failed(
                        object_type.clone(),
                        SchemaChangeKind::ObjectSchema,
                        &schema.name,
                        err.to_string(),
                    ));
                    context.mark_invalid(object_type, err.to_string());
                }
                continue;
            }

            self.create_schema(context, &object_type, &schema, invalid).await?;
        }
        Ok(types)
    }

    async fn create_schema(
        &self,
        context: &mut RunContext,
        object_type: &ObjectType,
        schema: &ObjectSchema,
        invalid: Option<MigrateError>,
    ) -> Result<()> {
        let mut request = schema.clone();
        request.object_type_id = None;
        request.properties.retain(|definition| {
            self.filter.is_writable(object_type, definition)
                || schema.primary_display_property.as_deref() == Some(definition.name.as_str())
                || schema.required_properties.contains(&definition.name)
        });

        match self.destination.create_object_schema(&request).await {
            Ok(created) => {
                info!(schema = %schema.name, "property_migrator.schema_created");
                let mut change =
                    SchemaChange::created(object_type.clone(), SchemaChangeKind::ObjectSchema, &schema.name)
                        .with_destination_id(created.object_type_id.unwrap_or_else(|| schema.name.clone()));
                if let Some(err) = &invalid {
                    change.error = Some(err.to_string());
                }
                context.audit.record_schema_change(change);
            }
            Err(err) if err.is_conflict() => {
                debug!(schema = %schema.name, "property_migrator.schema_already_exists");
            }
            Err(err) => {
                let message = schema_phase_error(err)?;
                let reason = match &invalid {
                    Some(invalid) => format!("{invalid}; {message}"),
                    None => message,
                };
                warn!(schema = %schema.name, error = %reason, "property_migrator.schema_failed");
                context.audit.record_schema_change(SchemaChange::failed(
                    object_type.clone(),
                    SchemaChangeKind::ObjectSchema,
                    &schema.name,
                    &reason,
                ));
                if invalid.is_none() {
                    context.mark_invalid(object_type.clone(), reason);
                }
            }
        }

        if let Some(err) = invalid {
            context.mark_invalid(object_type.clone(), err.to_string());
        }
        Ok(())
    }

    /// Create the custom properties of one type that the destination lacks.
    pub async fn migrate_properties(&self, context: &mut RunContext, object_type: &ObjectType) -> Result<()> {
        if context.invalid_reason(object_type).is_some() {
            return Ok(());
        }

        let table = self.filter.table(object_type);
        let candidates: Vec<PropertyDefinition> = self
            .source
            .list_properties(object_type)
            .await?
            .into_iter()
            .filter(|definition| definition.is_custom() && !table.is_excluded(&definition.name))
            .collect();
        if candidates.is_empty() {
            return Ok(());
        }

        let existing: BTreeSet<String> = self
            .destination
            .list_properties(object_type)
            .await?
            .into_iter()
            .map(|definition| definition.name)
            .collect();
        let missing: Vec<PropertyDefinition> =
            candidates.into_iter().filter(|definition| !existing.contains(&definition.name)).collect();
        if missing.is_empty() {
            debug!(object_type = %object_type, "property_migrator.properties_in_sync");
            return Ok(());
        }

        self.ensure_groups(context, object_type, &missing).await?;

        let mut created = 0usize;
        for definition in &missing {
            match self.destination.create_property(object_type, definition).await {
                Ok(_) => {
                    created += 1;
                    context.audit.record_schema_change(
                        SchemaChange::created(object_type.clone(), SchemaChangeKind::Property, &definition.name)
                            .with_destination_id(&definition.name),
                    );
                }
                Err(err) if err.is_conflict() => {
                    debug!(object_type = %object_type, property = %definition.name, "property_migrator.property_exists");
                }
                Err(err) => {
                    let message = schema_phase_error(err)?;
                    warn!(object_type = %object_type, property = %definition.name, error = %message, "property_migrator.property_failed");
                    context.audit.record_schema_change(SchemaChange::failed(
                        object_type.clone(),
                        SchemaChangeKind::Property,
                        &definition.name,
                        &message,
                    ));
                    context.mark_invalid(
                        object_type.clone(),
                        format!("property '{}' could not be created: {message}", definition.name),
                    );
                }
            }
        }

        info!(object_type = %object_type, created, missing = missing.len(), "property_migrator.completed");
        Ok(())
    }

    async fn ensure_groups(
        &self,
        context: &mut RunContext,
        object_type: &ObjectType,
        missing: &[PropertyDefinition],
    ) -> Result<()> {
        let needed: BTreeSet<&str> = missing
            .iter()
            .map(|definition| definition.group_name.as_str())
            .filter(|name| !name.is_empty())
            .collect();
        if needed.is_empty() {
            return Ok(());
        }

        let existing: BTreeSet<String> = self
            .destination
            .list_property_groups(object_type)
            .await?
            .into_iter()
            .map(|group| group.name)
            .collect();
        if needed.iter().all(|name| existing.contains(*name)) {
            return Ok(());
        }
        let source_groups = self.source.list_property_groups(object_type).await?;

        for name in needed.into_iter().filter(|name| !existing.contains(*name)) {
            let group = source_groups.iter().find(|group| group.name == name).cloned().unwrap_or_else(|| {
                PropertyGroup { name: name.to_string(), label: name.to_string(), display_order: -1 }
            });
            match self.destination.create_property_group(object_type, &group).await {
                Ok(_) => context.audit.record_schema_change(
                    SchemaChange::created(object_type.clone(), SchemaChangeKind::PropertyGroup, &group.name)
                        .with_destination_id(&group.name),
                ),
                Err(err) if err.is_conflict() => {}
                Err(err) => {
                    let message = schema_phase_error(err)?;
                    context.audit.record_schema_change(SchemaChange::failed(
                        object_type.clone(),
                        SchemaChangeKind::PropertyGroup,
                        &group.name,
                        message,
                    ));
                }
            }
        }
        Ok(())
    }
}
