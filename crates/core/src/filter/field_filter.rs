//! Maps a source property bag to the subset a destination portal accepts.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use portalsync_domain::{
    FieldFilterOverrides, MigrateError, ObjectType, PropertyDefinition, PropertyMap, Result,
};

use super::tables::{
    ANALYTICS_FIELDS, COMPANY_CORE_FIELDS, CONTACT_CORE_FIELDS, DEAL_CORE_FIELDS,
    DEAL_READONLY_EXACT_FIELDS, DEAL_READONLY_PREFIXES, PRODUCTION_IDENTIFIERS,
    READONLY_EXACT_FIELDS, READONLY_PREFIXES, SYSTEM_PREFIXES, TICKET_CORE_FIELDS,
};

/// Destination property definitions indexed by name.
#[derive(Debug, Clone, Default)]
pub struct SchemaIndex {
    by_name: HashMap<String, PropertyDefinition>,
}

impl SchemaIndex {
    /// Index `definitions` by name.
    pub fn new(definitions: Vec<PropertyDefinition>) -> Self {
        Self { by_name: definitions.into_iter().map(|d| (d.name.clone(), d)).collect() }
    }

    /// Definition of `name`, if declared.
    pub fn get(&self, name: &str) -> Option<&PropertyDefinition> {
        self.by_name.get(name)
    }

    /// Whether `name` is declared.
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Declared property names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }

    /// Number of declared properties.
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// True when nothing is declared.
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Exclusion rules for one object type.
#[derive(Debug, Clone, Default)]
pub struct ExclusionTable {
    always_allowed: BTreeSet<String>,
    exact: BTreeSet<String>,
    prefixes: Vec<String>,
}

impl ExclusionTable {
    fn build(core: &[&str], exact: &[&[&str]], prefixes: &[&[&str]]) -> Self {
        Self {
            always_allowed: core.iter().map(|s| (*s).to_string()).collect(),
            exact: exact.iter().flat_map(|set| set.iter()).map(|s| (*s).to_string()).collect(),
            prefixes: prefixes.iter().flat_map(|set| set.iter()).map(|s| (*s).to_string()).collect(),
        }
    }

    fn standard(core: &[&str]) -> Self {
        Self::build(
            core,
            &[READONLY_EXACT_FIELDS, PRODUCTION_IDENTIFIERS, ANALYTICS_FIELDS],
            &[SYSTEM_PREFIXES, READONLY_PREFIXES],
        )
    }

    fn deal() -> Self {
        Self::build(
            DEAL_CORE_FIELDS,
            &[READONLY_EXACT_FIELDS, DEAL_READONLY_EXACT_FIELDS, PRODUCTION_IDENTIFIERS, ANALYTICS_FIELDS],
            &[SYSTEM_PREFIXES, READONLY_PREFIXES, DEAL_READONLY_PREFIXES],
        )
    }

    fn apply(&mut self, overrides: &FieldFilterOverrides) {
        self.exact.extend(overrides.excluded.iter().map(|s| s.trim().to_lowercase()));
        self.always_allowed.extend(overrides.always_allowed.iter().map(|s| s.trim().to_lowercase()));
    }

    /// Whether `name` is allow-listed past the exclusion rules.
    pub fn is_always_allowed(&self, name: &str) -> bool {
        self.always_allowed.contains(&name.to_lowercase())
    }

    /// Name-based exclusion: exact names, prefixes and the `_id` suffix.
    pub fn is_excluded(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        if self.always_allowed.contains(&name) {
            return false;
        }
        self.exact.contains(&name)
            || self.prefixes.iter().any(|prefix| name.starts_with(prefix.as_str()))
            || name.ends_with("_id")
    }
}

/// Per object type field filter.
///
/// Pure: no I/O, no errors for unknown properties. Properties the
/// destination does not declare are dropped silently.
#[derive(Debug, Clone)]
pub struct FieldFilter {
    tables: HashMap<ObjectType, ExclusionTable>,
    custom_overrides: BTreeMap<String, FieldFilterOverrides>,
}

impl Default for FieldFilter {
    fn default() -> Self {
        let tables = HashMap::from([
            (ObjectType::Contact, ExclusionTable::standard(CONTACT_CORE_FIELDS)),
            (ObjectType::Company, ExclusionTable::standard(COMPANY_CORE_FIELDS)),
            (ObjectType::Deal, ExclusionTable::deal()),
            (ObjectType::Ticket, ExclusionTable::standard(TICKET_CORE_FIELDS)),
        ]);
        Self { tables, custom_overrides: BTreeMap::new() }
    }
}

impl FieldFilter {
    /// The built-in tables with no overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Extend the built-in tables with configured overrides.
    ///
    /// Keys are object type names as accepted by [`ObjectType`]'s `FromStr`.
    pub fn with_overrides(overrides: &BTreeMap<String, FieldFilterOverrides>) -> Result<Self> {
        let mut filter = Self::default();
        for (key, rules) in overrides {
            let object_type: ObjectType = key.parse().map_err(|err: String| {
                MigrateError::Config(format!("field_filters.{key}: {err}"))
            })?;
            if object_type.is_custom() {
                filter.custom_overrides.insert(object_type.to_string(), rules.clone());
            } else {
                filter.tables.entry(object_type).or_default().apply(rules);
            }
        }
        Ok(filter)
    }

    /// Exclusion table for a type; custom types share the standard rules.
    pub fn table(&self, object_type: &ObjectType) -> ExclusionTable {
        if let Some(table) = self.tables.get(object_type) {
            return table.clone();
        }
        let mut table = ExclusionTable::standard(&[]);
        if let Some(rules) = self.custom_overrides.get(&object_type.to_string()) {
            table.apply(rules);
        }
        table
    }

    /// Whether a declared property may be written for this type.
    ///
    /// Core fields pass as long as they exist; everything else must be a
    /// portal-defined, writable property that no exclusion rule names.
    pub fn is_writable(&self, object_type: &ObjectType, definition: &PropertyDefinition) -> bool {
        let table = self.table(object_type);
        if table.is_always_allowed(&definition.name) {
            return true;
        }
        definition.is_custom() && !table.is_excluded(&definition.name)
    }

    /// Names of the destination properties a record of this type may carry.
    pub fn writable_names(&self, object_type: &ObjectType, destination: &SchemaIndex) -> Vec<String> {
        let mut names: Vec<String> = destination
            .names()
            .filter_map(|name| destination.get(name))
            .filter(|definition| self.is_writable(object_type, definition))
            .map(|definition| definition.name.clone())
            .collect();
        names.sort();
        names
    }

    /// Reduce `raw` to the properties the destination accepts, cleaned and
    /// coerced to each property's declared kind.
    pub fn filter(&self, object_type: &ObjectType, raw: &PropertyMap, destination: &SchemaIndex) -> PropertyMap {
        let table = self.table(object_type);
        raw.iter()
            .filter_map(|(name, value)| {
                let definition = destination.get(name)?;
                let allowed = table.is_always_allowed(name)
                    || (definition.is_custom() && !table.is_excluded(name));
                if !allowed {
                    return None;
                }
                let cleaned = value.clone().clean()?;
                Some((name.clone(), cleaned.coerce(definition.kind)))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use portalsync_domain::{PropertyKind, PropertyValue};

    use super::*;

    fn destination() -> SchemaIndex {
        SchemaIndex::new(vec![
            PropertyDefinition::new("email", PropertyKind::String).vendor_defined(),
            PropertyDefinition::new("firstname", PropertyKind::String).vendor_defined(),
            PropertyDefinition::new("hs_lead_status", PropertyKind::Enumeration).vendor_defined(),
            PropertyDefinition::new("favorite_color", PropertyKind::String),
            PropertyDefinition::new("shoe_size", PropertyKind::Number),
            PropertyDefinition::new("num_visits", PropertyKind::Number),
            PropertyDefinition::new("legacy_crm_id", PropertyKind::String),
            PropertyDefinition::new("score", PropertyKind::Number).read_only(),
            PropertyDefinition::new("createdate", PropertyKind::Datetime).vendor_defined().read_only(),
        ])
    }

    fn raw() -> PropertyMap {
        [
            ("email", "ada@example.com"),
            ("firstname", "  Ada "),
            ("hs_lead_status", "NEW"),
            ("favorite_color", "none"),
            ("shoe_size", "38"),
            ("num_visits", "12"),
            ("legacy_crm_id", "L-1"),
            ("score", "99"),
            ("createdate", "2024-01-01T00:00:00Z"),
            ("not_in_destination", "drift"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), PropertyValue::from(v)))
        .collect()
    }

    #[test]
    fn keeps_core_and_custom_writable_properties() {
        let filtered = FieldFilter::new().filter(&ObjectType::Contact, &raw(), &destination());

        assert_eq!(filtered.get("email"), Some(&PropertyValue::from("ada@example.com")));
        assert_eq!(filtered.get("firstname"), Some(&PropertyValue::from("Ada")));
        assert_eq!(filtered.get("shoe_size"), Some(&PropertyValue::Number(38.0)));
        assert_eq!(filtered.len(), 3);
    }

    #[test]
    fn drops_vendor_readonly_prefixed_and_unknown_properties() {
        let filtered = FieldFilter::new().filter(&ObjectType::Contact, &raw(), &destination());

        for dropped in [
            "hs_lead_status",
            "favorite_color",
            "num_visits",
            "legacy_crm_id",
            "score",
            "createdate",
            "not_in_destination",
        ] {
            assert!(!filtered.contains_key(dropped), "{dropped} should be filtered");
        }
    }

    #[test]
    fn deal_table_adds_deal_prefixes() {
        let filter = FieldFilter::new();
        let deal_table = filter.table(&ObjectType::Deal);
        let contact_table = filter.table(&ObjectType::Contact);

        assert!(deal_table.is_excluded("days_in_stage"));
        assert!(!contact_table.is_excluded("days_in_stage"));
        assert!(!deal_table.is_excluded("pipeline"));
        assert!(!deal_table.is_excluded("dealstage"));
    }

    #[test]
    fn ticket_core_fields_override_system_prefixes() {
        let table = FieldFilter::new().table(&ObjectType::Ticket);
        assert!(!table.is_excluded("hs_pipeline_stage"));
        assert!(table.is_excluded("hs_pipeline_probability"));
    }

    #[test]
    fn overrides_extend_tables() {
        let overrides = BTreeMap::from([
            (
                "contact".to_string(),
                FieldFilterOverrides {
                    excluded: vec!["shoe_size".into()],
                    always_allowed: vec!["hs_lead_status".into()],
                },
            ),
            (
                "custom:pets".to_string(),
                FieldFilterOverrides { excluded: vec!["chip_number".into()], always_allowed: vec![] },
            ),
        ]);
        let filter = FieldFilter::with_overrides(&overrides).unwrap();
        let filtered = filter.filter(&ObjectType::Contact, &raw(), &destination());

        assert!(!filtered.contains_key("shoe_size"));
        assert!(filtered.contains_key("hs_lead_status"));
        assert!(filter.table(&ObjectType::custom("pets")).is_excluded("chip_number"));
        assert!(!filter.table(&ObjectType::custom("cars")).is_excluded("chip_number"));
    }

    #[test]
    fn rejects_unknown_override_keys() {
        let overrides = BTreeMap::from([("invoice".to_string(), FieldFilterOverrides::default())]);
        assert!(matches!(FieldFilter::with_overrides(&overrides), Err(MigrateError::Config(_))));
    }

    #[test]
    fn writable_names_follow_the_same_rules() {
        let names = FieldFilter::new().writable_names(&ObjectType::Contact, &destination());
        assert_eq!(names, vec!["email", "favorite_color", "firstname", "shoe_size"]);
    }
}
