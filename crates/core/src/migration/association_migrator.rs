//! Association phase: re-create links between migrated records.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use portalsync_domain::constants::ASSOCIATION_BATCH_SIZE;
use portalsync_domain::{
    Association, AssociationBatchOutcome, AssociationLabel, AssociationPair, AssociationResult,
    FailedAssociation, IdMapping, ObjectType, Result,
};
use tracing::{debug, info, warn};

use super::natural_key;
use super::RunContext;
use crate::portal::CrmPortal;

/// Standard association pairs, plus each custom type linked to contacts,
/// companies and deals.
pub fn default_pairs(custom_types: &[ObjectType]) -> Vec<(ObjectType, ObjectType)> {
    let mut pairs = vec![
        (ObjectType::Contact, ObjectType::Company),
        (ObjectType::Contact, ObjectType::Deal),
        (ObjectType::Contact, ObjectType::Ticket),
        (ObjectType::Company, ObjectType::Deal),
        (ObjectType::Company, ObjectType::Ticket),
        (ObjectType::Deal, ObjectType::Ticket),
    ];
    for custom in custom_types.iter().filter(|t| t.is_custom()) {
        for standard in [ObjectType::Contact, ObjectType::Company, ObjectType::Deal] {
            pairs.push((custom.clone(), standard));
        }
    }
    pairs
}

/// Re-creates source associations between records that exist in the
/// destination.
pub struct AssociationMigrator {
    source: Arc<dyn CrmPortal>,
    destination: Arc<dyn CrmPortal>,
    batch_size: usize,
}

impl AssociationMigrator {
    /// A migrator reading links from `source` and writing them to `destination`.
    pub fn new(source: Arc<dyn CrmPortal>, destination: Arc<dyn CrmPortal>) -> Self {
        Self { source, destination, batch_size: ASSOCIATION_BATCH_SIZE }
    }

    /// Pairs per create call, clamped to the vendor maximum.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.clamp(1, ASSOCIATION_BATCH_SIZE);
        self
    }

    /// Migrate associations for every pair with at least one side written in
    /// this run. The other end may come from an earlier run (seeded mappings)
    /// or be re-derived by natural key. Returns the number of associations
    /// created.
    pub async fn migrate(&self, context: &mut RunContext, pairs: &[(ObjectType, ObjectType)]) -> Result<usize> {
        let mut total = 0;
        for (from_type, to_type) in pairs {
            let from_ids = context.migrated_ids(from_type);
            let to_ids = context.migrated_ids(to_type);
            if from_ids.is_empty() && to_ids.is_empty() {
                continue;
            }
            let result = self.migrate_pair(context, from_type, to_type, &from_ids, &to_ids).await?;
            total += result.created.len();
            if !result.created.is_empty() || !result.failed.is_empty() || result.skipped_duplicates > 0 {
                context.audit.record_association(result);
            }
        }
        info!(created = total, "association_migrator.completed");
        Ok(total)
    }

    async fn migrate_pair(
        &self,
        context: &mut RunContext,
        from_type: &ObjectType,
        to_type: &ObjectType,
        from_ids: &[String],
        to_ids: &[String],
    ) -> Result<AssociationResult> {
        let mut result = AssociationResult::new(from_type.clone(), to_type.clone());

        // Source-side links keyed by (from, to) source ids.
        let mut links: BTreeMap<(String, String), Option<AssociationLabel>> = BTreeMap::new();
        if !from_ids.is_empty() {
            for association in self.read(context, from_type, from_ids, to_type).await? {
                links.insert((association.from.id, association.to.id), association.label);
            }
        }
        if !to_ids.is_empty() {
            // Labels are direction-specific, so links seen only from the
            // `to` side are written with the default type.
            for association in self.read(context, to_type, to_ids, from_type).await? {
                links.entry((association.to.id, association.from.id)).or_insert(None);
            }
        }

        let mut pairs = BTreeSet::new();
        let mut unresolved = BTreeSet::new();
        for ((from_source, to_source), label) in links {
            let from_id = self.resolve(context, from_type, &from_source, &mut unresolved).await?;
            let to_id = self.resolve(context, to_type, &to_source, &mut unresolved).await?;
            match (from_id, to_id) {
                (Some(from_id), Some(to_id)) => {
                    let mut pair = AssociationPair::new(from_id, to_id);
                    pair.label = label;
                    pairs.insert(pair);
                }
                (None, to_id) => result.failed.push(FailedAssociation {
                    from_id: from_source.clone(),
                    to_id: to_id.unwrap_or(to_source),
                    reason: format!("{from_type} {from_source} has no destination record"),
                }),
                (Some(from_id), None) => result.failed.push(FailedAssociation {
                    from_id,
                    to_id: to_source.clone(),
                    reason: format!("{to_type} {to_source} has no destination record"),
                }),
            }
        }

        if pairs.is_empty() {
            return Ok(result);
        }
        let pairs: Vec<AssociationPair> = pairs.into_iter().collect();
        let outcome = self.write(from_type, to_type, &pairs).await?;
        result.created = outcome.created;
        result.skipped_duplicates = outcome.duplicates.len();
        result.failed.extend(outcome.failed.into_iter().map(|(pair, reason)| FailedAssociation {
            from_id: pair.from_id,
            to_id: pair.to_id,
            reason,
        }));

        if self.destination.requires_reverse_links() {
            let reversed: Vec<AssociationPair> = pairs.iter().map(AssociationPair::reversed).collect();
            let outcome = self.write(to_type, from_type, &reversed).await?;
            result.failed.extend(outcome.failed.into_iter().map(|(pair, reason)| FailedAssociation {
                from_id: pair.to_id,
                to_id: pair.from_id,
                reason: format!("reverse link: {reason}"),
            }));
        }

        debug!(
            from = %from_type,
            to = %to_type,
            created = result.created.len(),
            duplicates = result.skipped_duplicates,
            failed = result.failed.len(),
            "association_migrator.pair_completed"
        );
        Ok(result)
    }

    /// Links from `ids` to records of `other`; a failed read is logged and
    /// contributes nothing.
    async fn read(
        &self,
        context: &mut RunContext,
        object_type: &ObjectType,
        ids: &[String],
        other: &ObjectType,
    ) -> Result<Vec<Association>> {
        match self.source.list_associations(object_type, ids, other).await {
            Ok(associations) => Ok(associations),
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => {
                warn!(from = %object_type, to = %other, error = %err, "association_migrator.read_failed");
                context.audit.record_error(format!("associations {object_type} -> {other}: {err}"));
                Ok(Vec::new())
            }
        }
    }

    /// Destination id for one end of a link: this run's or an earlier run's
    /// mapping, else a natural-key lookup. Misses are remembered per run.
    async fn resolve(
        &self,
        context: &mut RunContext,
        object_type: &ObjectType,
        source_id: &str,
        unresolved: &mut BTreeSet<(ObjectType, String)>,
    ) -> Result<Option<String>> {
        if let Some(id) = context.mappings.get(object_type, source_id) {
            return Ok(Some(id.to_string()));
        }
        let key = (object_type.clone(), source_id.to_string());
        if unresolved.contains(&key) {
            return Ok(None);
        }
        let found = self.rederive(context, object_type, source_id).await?;
        if found.is_none() {
            unresolved.insert(key);
        }
        Ok(found)
    }

    /// Batch create; a failed batch fails its own pairs only.
    async fn write(
        &self,
        from_type: &ObjectType,
        to_type: &ObjectType,
        pairs: &[AssociationPair],
    ) -> Result<AssociationBatchOutcome> {
        let mut outcome = AssociationBatchOutcome::default();
        for chunk in pairs.chunks(self.batch_size) {
            match self.destination.create_associations(from_type, to_type, chunk).await {
                Ok(batch) => outcome.merge(batch),
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    let reason = err.to_string();
                    outcome.failed.extend(chunk.iter().cloned().map(|pair| (pair, reason.clone())));
                }
            }
        }
        Ok(outcome)
    }

    /// Find the destination record for a source id that was not migrated in
    /// this run, through its natural key.
    async fn rederive(
        &self,
        context: &mut RunContext,
        object_type: &ObjectType,
        source_id: &str,
    ) -> Result<Option<String>> {
        let Some(property) = natural_key::key_property(object_type) else {
            return Ok(None);
        };
        let record = match self.source.get_record(object_type, source_id, &[property.to_string()]).await {
            Ok(Some(record)) => record,
            Ok(None) => return Ok(None),
            Err(err) if err.is_fatal() => return Err(err),
            Err(_) => return Ok(None),
        };
        let Some(key) = natural_key::natural_key(&record) else {
            return Ok(None);
        };
        let found = match natural_key::find_by_key(self.destination.as_ref(), object_type, &key).await {
            Ok(found) => found,
            Err(err) if err.is_fatal() => return Err(err),
            Err(_) => None,
        };
        Ok(found.map(|existing| {
            debug!(object_type = %object_type, source_id, destination_id = %existing.id, "association_migrator.rederived");
            context.mappings.insert_if_absent(IdMapping::new(object_type.clone(), source_id, &existing.id));
            existing.id
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_types_link_to_contacts_companies_and_deals() {
        let pets = ObjectType::custom("pets");
        let pairs = default_pairs(&[pets.clone(), ObjectType::Contact]);

        assert_eq!(pairs.len(), 9);
        assert!(pairs.contains(&(pets.clone(), ObjectType::Deal)));
        assert!(!pairs.contains(&(pets, ObjectType::Ticket)));
    }
}
