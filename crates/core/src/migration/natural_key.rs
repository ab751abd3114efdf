//! Natural-key lookup per object type.
//!
//! Contacts key on email and companies on their web domain. Deals, tickets
//! and custom objects have no reliable business key and are matched through
//! an [`IdMapping`](portalsync_domain::IdMapping) only.

use portalsync_domain::{Filter, FilterGroup, ObjectType, Record, RecordQuery, Result};

use crate::portal::CrmPortal;

/// A normalised business key of one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NaturalKey {
    /// Property the key was read from.
    pub property: &'static str,
    /// Normalised value.
    pub value: String,
}

/// Property carrying the natural key, if the type has one.
pub fn key_property(object_type: &ObjectType) -> Option<&'static str> {
    match object_type {
        ObjectType::Contact => Some("email"),
        ObjectType::Company => Some("domain"),
        _ => None,
    }
}

/// Normalise a raw key value for comparison.
pub fn normalize(object_type: &ObjectType, raw: &str) -> Option<String> {
    match object_type {
        ObjectType::Contact => normalize_email(raw),
        ObjectType::Company => normalize_domain(raw),
        _ => None,
    }
}

/// Trimmed, lowercased email; `None` when it has no `@`.
pub fn normalize_email(raw: &str) -> Option<String> {
    let email = raw.trim().to_lowercase();
    (!email.is_empty() && email.contains('@')).then_some(email)
}

/// `https://www.Example.com/about` -> `example.com`
pub fn normalize_domain(raw: &str) -> Option<String> {
    let lowered = raw.trim().to_lowercase();
    let without_scheme = lowered.split_once("://").map_or(lowered.as_str(), |(_, rest)| rest);
    let host = without_scheme.split(['/', '?', '#']).next().unwrap_or_default();
    let host = host.strip_prefix("www.").unwrap_or(host).trim_end_matches('.');
    (!host.is_empty()).then(|| host.to_string())
}

/// Key of a source record, when the type has one and the record carries it.
pub fn natural_key(record: &Record) -> Option<NaturalKey> {
    let property = key_property(&record.object_type)?;
    let raw = record.property(property)?.to_wire()?;
    let value = normalize(&record.object_type, &raw)?;
    Some(NaturalKey { property, value })
}

/// Look up a destination record by natural key.
pub async fn find_by_key(
    portal: &dyn CrmPortal,
    object_type: &ObjectType,
    key: &NaturalKey,
) -> Result<Option<Record>> {
    let query = RecordQuery::new(object_type.clone())
        .with_group(FilterGroup::new(vec![Filter::eq(key.property, key.value.clone())]))
        .with_properties(vec![key.property.to_string()])
        .with_page_size(1);
    let page = portal.search_records(&query).await?;
    Ok(page.records.into_iter().next())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contacts_key_on_lowercased_email() {
        let record = Record::new("1", ObjectType::Contact).with_property("email", "  Ada@Example.COM ");
        let key = natural_key(&record).unwrap();
        assert_eq!(key.property, "email");
        assert_eq!(key.value, "ada@example.com");
    }

    #[test]
    fn company_domains_are_normalised() {
        assert_eq!(normalize_domain("https://www.Example.com/about").as_deref(), Some("example.com"));
        assert_eq!(normalize_domain("example.org").as_deref(), Some("example.org"));
        assert_eq!(normalize_domain("http://sub.example.net?x=1").as_deref(), Some("sub.example.net"));
        assert_eq!(normalize_domain("   "), None);
    }

    #[test]
    fn deals_and_custom_objects_have_no_key() {
        let deal = Record::new("1", ObjectType::Deal).with_property("dealname", "Big");
        assert!(natural_key(&deal).is_none());
        assert!(key_property(&ObjectType::custom("pets")).is_none());
    }

    #[test]
    fn missing_or_malformed_email_has_no_key() {
        assert!(natural_key(&Record::new("1", ObjectType::Contact)).is_none());
        let bad = Record::new("1", ObjectType::Contact).with_property("email", "not-an-email");
        assert!(natural_key(&bad).is_none());
    }
}
