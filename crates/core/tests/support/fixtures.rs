//! Record and schema builders.

use chrono::{DateTime, Duration, Utc};
use portalsync_domain::{ObjectType, PropertyDefinition, PropertyKind, Record};

pub fn contact(id: &str, email: &str, created_at: DateTime<Utc>) -> Record {
    Record::new(id, ObjectType::Contact)
        .with_property("email", email)
        .with_property("firstname", format!("Contact {id}"))
        .with_created_at(created_at)
}

pub fn company(id: &str, domain: &str, created_at: DateTime<Utc>) -> Record {
    Record::new(id, ObjectType::Company)
        .with_property("domain", domain)
        .with_property("name", format!("Company {id}"))
        .with_created_at(created_at)
}

pub fn deal(id: &str, created_at: DateTime<Utc>) -> Record {
    Record::new(id, ObjectType::Deal).with_property("dealname", format!("Deal {id}")).with_created_at(created_at)
}

pub fn days_ago(days: i64) -> DateTime<Utc> {
    Utc::now() - Duration::days(days)
}

/// Vendor-defined properties every portal carries for the standard types.
pub fn standard_properties(object_type: &ObjectType) -> Vec<PropertyDefinition> {
    let names: &[&str] = match object_type {
        ObjectType::Contact => &["email", "firstname", "lastname"],
        ObjectType::Company => &["domain", "name"],
        ObjectType::Deal => &["dealname", "amount", "pipeline", "dealstage"],
        ObjectType::Ticket => &["subject", "hs_pipeline", "hs_pipeline_stage"],
        ObjectType::Custom(_) => &["name"],
    };
    let mut definitions: Vec<PropertyDefinition> = names
        .iter()
        .map(|name| PropertyDefinition::new(*name, PropertyKind::String).vendor_defined())
        .collect();
    definitions.push(
        PropertyDefinition::new("createdate", PropertyKind::Datetime).vendor_defined().read_only(),
    );
    definitions
}

pub fn custom_property(name: &str) -> PropertyDefinition {
    PropertyDefinition::new(name, PropertyKind::String).in_group("migrated")
}
