//! End-to-end migration runs against in-memory portals.

mod support;

use std::collections::BTreeSet;
use std::sync::Arc;

use portalsync_core::{CrmPortal, DryRunPortal, FieldFilter, MigrationRunner, RunSettings};
use portalsync_domain::{
    MigrateError, ObjectSchema, ObjectType, Pipeline, Record, SchemaChangeKind, SchemaLabels, Stage,
};
use support::*;

fn runner(
    source: &Arc<InMemoryPortal>,
    destination: Arc<dyn CrmPortal>,
    store: &Arc<InMemoryReportStore>,
    settings: RunSettings,
) -> MigrationRunner {
    MigrationRunner::new(source.clone(), destination, store.clone(), FieldFilter::new(), settings)
}

fn portals() -> (Arc<InMemoryPortal>, Arc<InMemoryPortal>, Arc<InMemoryReportStore>) {
    (
        Arc::new(InMemoryPortal::new("source", "s")),
        Arc::new(InMemoryPortal::new("destination", "d")),
        Arc::new(InMemoryReportStore::new()),
    )
}

fn contacts_only() -> RunSettings {
    RunSettings { types: Some(vec![ObjectType::Contact]), ..RunSettings::default() }
}

#[tokio::test]
async fn capped_run_migrates_the_newest_records() {
    let (source, destination, store) = portals();
    for i in 0..10 {
        source.insert_record(contact(&format!("new{i}"), &format!("new{i}@example.com"), days_ago(0)));
    }
    for i in 0..15 {
        source.insert_record(contact(&format!("old{i}"), &format!("old{i}@example.com"), days_ago(30 + i)));
    }

    let settings = RunSettings { limit: Some(10), ..contacts_only() };
    let outcome = runner(&source, destination.clone(), &store, settings).run_all().await.unwrap();

    let result = outcome.audit.object_result(&ObjectType::Contact).unwrap();
    assert_eq!(result.created.len(), 10);
    assert!(result.created.iter().all(|m| m.source_id.starts_with("new")));
    assert_eq!(destination.records(&ObjectType::Contact).len(), 10);
}

#[tokio::test]
async fn running_twice_does_not_duplicate_records() {
    let (source, destination, store) = portals();
    for i in 0..5 {
        source.insert_record(contact(&i.to_string(), &format!("c{i}@example.com"), days_ago(i)));
    }

    let first = runner(&source, destination.clone(), &store, contacts_only()).run_all().await.unwrap();
    let second = runner(&source, destination.clone(), &store, contacts_only()).run_all().await.unwrap();

    assert_eq!(first.audit.created_total(), 5);
    assert_eq!(second.audit.created_total(), 0);
    assert_eq!(second.audit.updated_total(), 5);
    assert_eq!(destination.records(&ObjectType::Contact).len(), 5);
}

#[tokio::test]
async fn existing_destination_contact_is_matched_by_email() {
    let (source, destination, store) = portals();
    source.insert_record(contact("1", "Ada@Example.com", days_ago(1)));
    destination.insert_record(contact("d-existing", "ada@example.com", days_ago(100)));

    let outcome = runner(&source, destination.clone(), &store, contacts_only()).run_all().await.unwrap();

    let result = outcome.audit.object_result(&ObjectType::Contact).unwrap();
    assert_eq!(result.updated_ids().collect::<Vec<_>>(), vec!["d-existing"]);
    assert_eq!(destination.records(&ObjectType::Contact).len(), 1);
    let existing = destination.record(&ObjectType::Contact, "d-existing").unwrap();
    assert_eq!(existing.property_str("email"), Some("ada@example.com"));
    assert_eq!(existing.property_str("firstname"), Some("Contact 1"));
}

#[tokio::test]
async fn stale_mapping_recreates_the_record() {
    let (source, destination, store) = portals();
    source.insert_record(deal("1", days_ago(1)));
    let settings = RunSettings { types: Some(vec![ObjectType::Deal]), ..RunSettings::default() };

    let first = runner(&source, destination.clone(), &store, settings.clone()).run_all().await.unwrap();
    let original = first.audit.object_result(&ObjectType::Deal).unwrap().created[0].destination_id.clone();
    destination.delete_record(&ObjectType::Deal, &original).await.unwrap();

    let second = runner(&source, destination.clone(), &store, settings).run_all().await.unwrap();
    let result = second.audit.object_result(&ObjectType::Deal).unwrap();
    assert_eq!(result.created.len(), 1);
    assert_ne!(result.created[0].destination_id, original);
}

#[tokio::test]
async fn contacts_without_email_fail_individually() {
    let (source, destination, store) = portals();
    source.insert_record(contact("1", "a@example.com", days_ago(1)));
    source.insert_record(Record::new("2", ObjectType::Contact).with_created_at(days_ago(2)));

    let outcome = runner(&source, destination, &store, contacts_only()).run_all().await.unwrap();

    let result = outcome.audit.object_result(&ObjectType::Contact).unwrap();
    assert_eq!(result.created.len(), 1);
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].source_id, "2");
    assert!(outcome.error.is_none());
}

#[tokio::test]
async fn invalid_custom_schema_is_isolated_from_other_types() {
    let (source, destination, store) = portals();
    source.add_schema(ObjectSchema {
        name: "pets".into(),
        object_type_id: Some("2-100".into()),
        labels: SchemaLabels { singular: "Pet".into(), plural: "Pets".into() },
        primary_display_property: None,
        secondary_display_properties: Vec::new(),
        required_properties: Vec::new(),
        searchable_properties: Vec::new(),
        properties: vec![custom_property("pet_name")],
    });
    source.insert_record(Record::new("p1", ObjectType::custom("pets")).with_property("pet_name", "Rex"));
    source.insert_record(contact("1", "a@example.com", days_ago(1)));
    destination.fail_on(
        "create_object_schema:pets",
        MigrateError::Validation("primaryDisplayProperty is required".into()),
    );

    let outcome = runner(&source, destination.clone(), &store, RunSettings::default()).run_all().await.unwrap();
    let audit = &outcome.audit;

    let change = audit.schema_changes.iter().find(|c| c.kind == SchemaChangeKind::ObjectSchema).unwrap();
    assert!(!change.created);
    assert!(change.error.is_some());
    assert!(audit.errors.iter().any(|e| e.starts_with("custom:pets")));

    let pets = audit.object_result(&ObjectType::custom("pets")).unwrap();
    assert!(pets.created.is_empty() && pets.updated.is_empty() && pets.failed.is_empty());
    assert_eq!(audit.object_result(&ObjectType::Contact).unwrap().created.len(), 1);
    assert!(destination.records(&ObjectType::custom("pets")).is_empty());
    assert!(outcome.error.is_none());
}

#[tokio::test]
async fn auth_failure_aborts_and_still_saves_the_report() {
    let (source, destination, store) = portals();
    source.insert_record(contact("1", "a@example.com", days_ago(1)));
    destination.fail_on("create_record:contact", MigrateError::Auth("401 Unauthorized".into()));

    let outcome = runner(&source, destination, &store, contacts_only()).run_all().await.unwrap();

    assert!(matches!(outcome.error, Some(MigrateError::Auth(_))));
    let saved = store.latest().unwrap();
    assert!(saved.aborted);
    assert_eq!(saved.run_id, outcome.audit.run_id);
}

#[tokio::test]
async fn transient_failure_in_pipeline_phase_is_fatal() {
    let (source, destination, store) = portals();
    destination.fail_on("list_pipelines:deal", MigrateError::Transient("503".into()));
    let settings = RunSettings { types: Some(vec![ObjectType::Deal]), ..RunSettings::default() };

    let outcome = runner(&source, destination, &store, settings).run_all().await.unwrap();
    assert!(matches!(outcome.error, Some(MigrateError::Transient(_))));
    assert!(outcome.audit.aborted);
}

#[tokio::test]
async fn deal_stages_are_remapped_and_missing_stages_created() {
    let (source, destination, store) = portals();
    let stage = |id: &str, label: &str, order: i32| Stage {
        id: id.into(),
        label: label.into(),
        display_order: order,
        metadata: Default::default(),
    };
    source.add_pipeline(
        &ObjectType::Deal,
        Pipeline {
            id: "default".into(),
            label: "Sales".into(),
            display_order: 0,
            stages: vec![stage("won", "Won", 0), stage("lost", "Lost", 1)],
        },
    );
    destination.add_pipeline(
        &ObjectType::Deal,
        Pipeline { id: "d-sales".into(), label: "sales".into(), display_order: 0, stages: vec![stage("d-won", "won", 0)] },
    );
    source.insert_record(deal("1", days_ago(1)).with_property("pipeline", "default").with_property("dealstage", "lost"));
    source.insert_record(deal("2", days_ago(2)).with_property("pipeline", "default").with_property("dealstage", "won"));

    let settings = RunSettings { types: Some(vec![ObjectType::Deal]), ..RunSettings::default() };
    let outcome = runner(&source, destination.clone(), &store, settings).run_all().await.unwrap();

    let created_stage = outcome
        .audit
        .schema_changes
        .iter()
        .find(|c| c.kind == SchemaChangeKind::PipelineStage)
        .unwrap();
    assert_eq!(created_stage.parent_id.as_deref(), Some("d-sales"));
    let new_stage_id = created_stage.destination_id.clone().unwrap();

    let stages: BTreeSet<String> = destination
        .records(&ObjectType::Deal)
        .iter()
        .filter_map(|r| r.property_str("dealstage").map(str::to_string))
        .collect();
    assert_eq!(stages, BTreeSet::from(["d-won".to_string(), new_stage_id]));
    assert!(destination.records(&ObjectType::Deal).iter().all(|r| r.property_str("pipeline") == Some("d-sales")));
}

#[tokio::test]
async fn associations_are_created_once() {
    let (source, destination, store) = portals();
    source.insert_record(contact("c1", "a@example.com", days_ago(1)));
    source.insert_record(contact("c2", "b@example.com", days_ago(2)));
    source.insert_record(company("co1", "example.com", days_ago(3)));
    source.link((ObjectType::Contact, "c1"), (ObjectType::Company, "co1"));
    source.link((ObjectType::Contact, "c2"), (ObjectType::Company, "co1"));
    let settings = RunSettings { types: Some(vec![ObjectType::Contact, ObjectType::Company]), ..RunSettings::default() };

    let first = runner(&source, destination.clone(), &store, settings.clone()).run_all().await.unwrap();
    let second = runner(&source, destination.clone(), &store, settings).run_all().await.unwrap();

    assert_eq!(first.audit.associations_created(), 2);
    assert_eq!(second.audit.associations_created(), 0);
    let result = &second.audit.association_results[0];
    assert_eq!(result.skipped_duplicates, 2);
    assert!(result.failed.is_empty());
    assert_eq!(destination.links().len(), 2);
}

#[tokio::test]
async fn association_to_unmigrated_record_is_rederived_by_key() {
    let (source, destination, store) = portals();
    source.insert_record(contact("c1", "a@example.com", days_ago(1)));
    source.insert_record(company("co1", "https://www.example.com", days_ago(3)));
    source.insert_record(company("co2", "nowhere.io", days_ago(3)));
    source.link((ObjectType::Contact, "c1"), (ObjectType::Company, "co1"));
    source.link((ObjectType::Contact, "c1"), (ObjectType::Company, "co2"));
    destination.insert_record(company("d-co", "example.com", days_ago(50)));

    let outcome = runner(&source, destination.clone(), &store, contacts_only()).run_all().await.unwrap();

    let result = &outcome.audit.association_results[0];
    assert_eq!(result.created.len(), 1);
    assert_eq!(result.created[0].to_id, "d-co");
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].to_id, "co2");
}

#[tokio::test]
async fn links_to_records_from_an_earlier_run_are_recreated() {
    let (source, destination, store) = portals();
    source.insert_record(contact("A", "a@example.com", days_ago(1)));
    source.insert_record(deal("D1", days_ago(2)));
    source.insert_record(deal("D2", days_ago(2)));
    source.link((ObjectType::Contact, "A"), (ObjectType::Deal, "D1"));
    source.link((ObjectType::Contact, "A"), (ObjectType::Deal, "D2"));

    let contacts = runner(&source, destination.clone(), &store, contacts_only()).run_all().await.unwrap();
    let contact_id = contacts.audit.object_result(&ObjectType::Contact).unwrap().created[0].destination_id.clone();
    // Deals do not exist in the destination yet and have no natural key.
    let early = contacts.audit.association_results.iter().find(|r| r.to_type == ObjectType::Deal).unwrap();
    assert_eq!(early.failed.len(), 2);

    let deals_only = RunSettings { types: Some(vec![ObjectType::Deal]), ..RunSettings::default() };
    let deals = runner(&source, destination.clone(), &store, deals_only).run_all().await.unwrap();

    let result = &deals.audit.association_results[0];
    assert_eq!((&result.from_type, &result.to_type), (&ObjectType::Contact, &ObjectType::Deal));
    assert_eq!(result.created.len(), 2);
    assert!(result.created.iter().all(|pair| pair.from_id == contact_id));
    assert_eq!(destination.links().len(), 2);
}

#[tokio::test]
async fn reverse_links_are_written_when_required() {
    let source = Arc::new(InMemoryPortal::new("source", "s"));
    let destination = Arc::new(InMemoryPortal::new("destination", "d").with_reverse_links());
    let store = Arc::new(InMemoryReportStore::new());
    source.insert_record(contact("c1", "a@example.com", days_ago(1)));
    source.insert_record(company("co1", "example.com", days_ago(3)));
    source.link((ObjectType::Contact, "c1"), (ObjectType::Company, "co1"));
    let settings = RunSettings { types: Some(vec![ObjectType::Contact, ObjectType::Company]), ..RunSettings::default() };

    runner(&source, destination.clone(), &store, settings).run_all().await.unwrap();

    let links = destination.links();
    assert_eq!(links.len(), 2);
    assert!(links.iter().any(|(from, _, to, _)| *from == ObjectType::Company && *to == ObjectType::Contact));
}

#[tokio::test]
async fn custom_properties_are_created_before_records() {
    let (source, destination, store) = portals();
    source.add_property(&ObjectType::Contact, custom_property("favorite_color"));
    source.insert_record(contact("1", "a@example.com", days_ago(1)).with_property("favorite_color", "teal"));

    let outcome = runner(&source, destination.clone(), &store, contacts_only()).run_all().await.unwrap();

    assert!(destination.has_property(&ObjectType::Contact, "favorite_color"));
    let kinds: Vec<SchemaChangeKind> = outcome.audit.schema_changes.iter().map(|c| c.kind).collect();
    assert_eq!(kinds, vec![SchemaChangeKind::PropertyGroup, SchemaChangeKind::Property]);
    let record = &destination.records(&ObjectType::Contact)[0];
    assert_eq!(record.property_str("favorite_color"), Some("teal"));
}

#[tokio::test]
async fn dry_run_writes_nothing_but_reports_intended_changes() {
    let (source, destination, store) = portals();
    source.add_property(&ObjectType::Contact, custom_property("favorite_color"));
    for i in 0..3 {
        source.insert_record(
            contact(&i.to_string(), &format!("c{i}@example.com"), days_ago(i)).with_property("favorite_color", "red"),
        );
    }
    let dry: Arc<dyn CrmPortal> = Arc::new(DryRunPortal::new(destination.clone()));
    let settings = RunSettings { dry_run: true, ..contacts_only() };

    let outcome = runner(&source, dry, &store, settings).run_all().await.unwrap();

    assert!(outcome.audit.dry_run);
    assert_eq!(outcome.audit.created_total(), 3);
    assert!(outcome.audit.id_mappings().all(|m| m.destination_id.starts_with("dry-run-contact-")));
    assert!(outcome.audit.schema_changes.iter().any(|c| c.name == "favorite_color" && c.created));
    assert!(destination.write_calls().is_empty());
    assert!(destination.records(&ObjectType::Contact).is_empty());
    assert!(!outcome.audit.has_reversible_changes());
}
