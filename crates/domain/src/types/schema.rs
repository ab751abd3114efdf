//! Portal schema: property definitions, pipelines and custom object schemas.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::PropertyKind;
use crate::{MigrateError, Result};

/// One option of an enumeration property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyOption {
    /// Text shown in the UI.
    pub label: String,
    /// Value stored on records.
    pub value: String,
    /// Position in the option list.
    #[serde(default)]
    pub display_order: i32,
    /// Hidden from forms.
    #[serde(default)]
    pub hidden: bool,
}

/// Declared property of an object type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDefinition {
    /// Internal name; also the property's id.
    pub name: String,
    /// Display label.
    pub label: String,
    /// Value type.
    pub kind: PropertyKind,
    /// UI control (`text`, `select`, `number`, ...).
    pub field_type: String,
    /// Group the property is listed under.
    pub group_name: String,
    /// Help text.
    #[serde(default)]
    pub description: Option<String>,
    /// Options of an enumeration.
    #[serde(default)]
    pub options: Vec<PropertyOption>,
    /// Values cannot be written.
    #[serde(default)]
    pub read_only: bool,
    /// Computed by the portal.
    #[serde(default)]
    pub calculated: bool,
    /// Shipped by the vendor rather than defined by the portal owner.
    #[serde(default)]
    pub vendor_defined: bool,
}

impl PropertyDefinition {
    /// A writable, owner-defined property labelled with its name.
    pub fn new(name: impl Into<String>, kind: PropertyKind) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
            kind,
            field_type: default_field_type(kind).to_string(),
            group_name: String::new(),
            description: None,
            options: Vec::new(),
            read_only: false,
            calculated: false,
            vendor_defined: false,
        }
    }

    /// Set the group name.
    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.group_name = group.into();
        self
    }

    /// Mark as read-only.
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Mark as shipped by the vendor.
    pub fn vendor_defined(mut self) -> Self {
        self.vendor_defined = true;
        self
    }

    /// Values written to this property are accepted by the portal.
    pub fn is_writable(&self) -> bool {
        !self.read_only && !self.calculated
    }

    /// Defined by the portal owner and safe to recreate elsewhere.
    pub fn is_custom(&self) -> bool {
        self.is_writable() && !self.vendor_defined
    }
}

fn default_field_type(kind: PropertyKind) -> &'static str {
    match kind {
        PropertyKind::String => "text",
        PropertyKind::Number => "number",
        PropertyKind::Date | PropertyKind::Datetime => "date",
        PropertyKind::Enumeration => "select",
        PropertyKind::Bool => "booleancheckbox",
    }
}

/// Property group used to organise properties in the portal UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyGroup {
    /// Internal name.
    pub name: String,
    /// Display label.
    pub label: String,
    /// Position in the UI.
    #[serde(default)]
    pub display_order: i32,
}

/// One step of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    /// Portal-specific id.
    pub id: String,
    /// Display label; matched case-insensitively across portals.
    pub label: String,
    /// Position within the pipeline.
    pub display_order: i32,
    /// Vendor metadata such as `probability` or `isClosed`.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// Ordered workflow for deals or tickets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    /// Portal-specific id.
    pub id: String,
    /// Display label; matched case-insensitively across portals.
    pub label: String,
    /// Position among the type's pipelines.
    #[serde(default)]
    pub display_order: i32,
    /// Stages in order.
    pub stages: Vec<Stage>,
}

impl Pipeline {
    /// Stage whose label matches `label`, ignoring case.
    pub fn stage_by_label(&self, label: &str) -> Option<&Stage> {
        self.stages.iter().find(|stage| stage.label.eq_ignore_ascii_case(label.trim()))
    }

    /// Whether the pipeline is labelled `label`, ignoring case.
    pub fn has_label(&self, label: &str) -> bool {
        self.label.trim().eq_ignore_ascii_case(label.trim())
    }
}

/// Display names of a custom object type.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SchemaLabels {
    /// Name of one record.
    pub singular: String,
    /// Name of several records.
    pub plural: String,
}

/// Definition of a custom object type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectSchema {
    /// Internal name, as used in `custom:<name>`.
    pub name: String,
    /// Portal-specific identifier (e.g. `2-1234567`); absent until created.
    #[serde(default)]
    pub object_type_id: Option<String>,
    /// Display names.
    #[serde(default)]
    pub labels: SchemaLabels,
    /// Property shown as the record title; required to hold records.
    #[serde(default)]
    pub primary_display_property: Option<String>,
    /// Properties shown under the title.
    #[serde(default)]
    pub secondary_display_properties: Vec<String>,
    /// Properties every record must set.
    #[serde(default)]
    pub required_properties: Vec<String>,
    /// Properties indexed for search.
    #[serde(default)]
    pub searchable_properties: Vec<String>,
    /// Properties declared with the schema.
    #[serde(default)]
    pub properties: Vec<PropertyDefinition>,
}

impl ObjectSchema {
    /// A custom type without a primary display property cannot hold records.
    pub fn validate(&self) -> Result<()> {
        match self.primary_display_property.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => Ok(()),
            _ => Err(MigrateError::Schema(format!(
                "custom object '{}' has no primary display property",
                self.name
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema(primary: Option<&str>) -> ObjectSchema {
        ObjectSchema {
            name: "vehicles".into(),
            object_type_id: None,
            labels: SchemaLabels { singular: "Vehicle".into(), plural: "Vehicles".into() },
            primary_display_property: primary.map(str::to_string),
            secondary_display_properties: vec![],
            required_properties: vec!["vin".into()],
            searchable_properties: vec![],
            properties: vec![PropertyDefinition::new("vin", PropertyKind::String)],
        }
    }

    #[test]
    fn schema_without_primary_display_property_is_invalid() {
        assert!(schema(Some("vin")).validate().is_ok());
        assert!(matches!(schema(None).validate(), Err(MigrateError::Schema(_))));
        assert!(schema(Some("  ")).validate().is_err());
    }

    #[test]
    fn custom_properties_exclude_vendor_and_read_only() {
        assert!(PropertyDefinition::new("favorite_color", PropertyKind::String).is_custom());
        assert!(!PropertyDefinition::new("email", PropertyKind::String).vendor_defined().is_custom());
        assert!(!PropertyDefinition::new("score", PropertyKind::Number).read_only().is_writable());
    }

    #[test]
    fn stage_lookup_ignores_case() {
        let pipeline = Pipeline {
            id: "p1".into(),
            label: "Sales".into(),
            display_order: 0,
            stages: vec![Stage {
                id: "s1".into(),
                label: "Closed Won".into(),
                display_order: 0,
                metadata: BTreeMap::new(),
            }],
        };
        assert_eq!(pipeline.stage_by_label("closed won").map(|s| s.id.as_str()), Some("s1"));
        assert!(pipeline.has_label(" sales "));
    }
}
