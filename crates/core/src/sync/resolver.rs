//! Selective Sync Resolver
//!
//! Turns [`SyncCriteria`] into a [`MigrationPlan`]: the primary records that
//! match every predicate, newest first and capped, plus the records of other
//! types directly associated with them.
//!
//! Expansion is one hop by default. A larger `depth` expands the records
//! found at each hop in turn; records already in the plan are not revisited.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use portalsync_domain::constants::{CREATED_DATE_PROPERTY, MAX_FILTER_GROUPS};
use portalsync_domain::{
    Filter, FilterGroup, MigrateError, MigrationPlan, ObjectType, RecordQuery, Result, SyncCriteria,
};
use tracing::{debug, info};

use crate::migration::natural_key::normalize_domain;
use crate::portal::{collect_records, fetch_by_ids, CrmPortal};

/// Turns sync criteria into a [`MigrationPlan`] by querying the source portal.
pub struct SelectiveSyncResolver {
    source: Arc<dyn CrmPortal>,
}

impl SelectiveSyncResolver {
    /// A resolver reading from `source`.
    pub fn new(source: Arc<dyn CrmPortal>) -> Self {
        Self { source }
    }

    /// Find the primary records matching `criteria` and their related closure.
    ///
    /// No match yields an empty plan, not an error.
    pub async fn resolve(&self, criteria: &SyncCriteria) -> Result<MigrationPlan> {
        self.resolve_at(criteria, Utc::now()).await
    }

    /// Resolve with an explicit clock for the relative date predicates.
    pub async fn resolve_at(&self, criteria: &SyncCriteria, now: DateTime<Utc>) -> Result<MigrationPlan> {
        let query = build_query(criteria, now)?;
        let ids: Vec<String> = criteria
            .ids
            .iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let primary = if ids.is_empty() {
            collect_records(self.source.as_ref(), query, criteria.limit).await?
        } else {
            fetch_by_ids(self.source.as_ref(), query, &ids, criteria.limit).await?
        };

        let mut plan = MigrationPlan::empty(criteria.clone(), now);
        plan.primary_ids = primary.into_iter().map(|record| record.id).collect();
        if plan.is_empty() {
            info!(primary = %criteria.primary, "selective_sync.no_matches");
            return Ok(plan);
        }

        self.expand(criteria, &mut plan).await?;

        info!(
            primary = %criteria.primary,
            primary_records = plan.primary_ids.len(),
            related_records = plan.total_records() - plan.primary_ids.len(),
            depth = criteria.depth,
            "selective_sync.resolved"
        );
        Ok(plan)
    }

    async fn expand(&self, criteria: &SyncCriteria, plan: &mut MigrationPlan) -> Result<()> {
        let related_types = criteria.effective_related_types();
        let mut frontier: BTreeMap<ObjectType, BTreeSet<String>> =
            BTreeMap::from([(criteria.primary.clone(), plan.primary_ids.clone())]);

        for hop in 1..=criteria.depth {
            let mut discovered: BTreeMap<ObjectType, BTreeSet<String>> = BTreeMap::new();

            for (from_type, ids) in &frontier {
                let from_ids: Vec<String> = ids.iter().cloned().collect();
                for to_type in related_types.iter().filter(|t| *t != from_type) {
                    let associations = self.source.list_associations(from_type, &from_ids, to_type).await?;
                    for association in associations {
                        let known = plan.related.get(to_type).is_some_and(|set| set.contains(&association.to.id));
                        if !known {
                            discovered.entry(to_type.clone()).or_default().insert(association.to.id);
                        }
                    }
                }
            }

            debug!(hop, discovered = discovered.values().map(BTreeSet::len).sum::<usize>(), "selective_sync.hop");
            if discovered.is_empty() {
                break;
            }
            for (object_type, ids) in &discovered {
                plan.related.entry(object_type.clone()).or_default().extend(ids.iter().cloned());
            }
            frontier = discovered;
        }
        Ok(())
    }
}

/// Translate criteria into a search query. The id list is applied later,
/// chunked, by [`fetch_by_ids`].
pub fn build_query(criteria: &SyncCriteria, now: DateTime<Utc>) -> Result<RecordQuery> {
    let mut base = Vec::new();
    if let Some(days) = criteria.created_within_days {
        let cutoff = now - Duration::days(i64::from(days));
        base.push(Filter::gte(CREATED_DATE_PROPERTY, cutoff.timestamp_millis().to_string()));
    }
    if let Some(days) = criteria.modified_within_days {
        let cutoff = now - Duration::days(i64::from(days));
        base.push(Filter::gte(criteria.primary.modified_date_property(), cutoff.timestamp_millis().to_string()));
    }
    for (property, value) in &criteria.property_equals {
        base.push(Filter::eq(property.clone(), value.clone()));
    }

    let domains: Vec<String> = criteria.domains.iter().filter_map(|d| normalize_domain(d)).collect();
    let mut query = RecordQuery::new(criteria.primary.clone()).with_properties(vec![CREATED_DATE_PROPERTY.to_string()]);

    if domains.is_empty() {
        if !base.is_empty() {
            query = query.with_group(FilterGroup::new(base));
        }
        return Ok(query);
    }

    if domains.len() > MAX_FILTER_GROUPS {
        return Err(MigrateError::InvalidInput(format!(
            "at most {MAX_FILTER_GROUPS} domains can be matched in one sync, got {}",
            domains.len()
        )));
    }
    for domain in domains {
        let mut filters = base.clone();
        filters.push(domain_filter(criteria, &domain)?);
        query = query.with_group(FilterGroup::new(filters));
    }
    Ok(query)
}

fn domain_filter(criteria: &SyncCriteria, domain: &str) -> Result<Filter> {
    if let Some(property) = &criteria.domain_property {
        return Ok(Filter::contains_token(property.clone(), domain));
    }
    match criteria.primary {
        ObjectType::Contact => Ok(Filter::contains_token("email", format!("@{domain}"))),
        ObjectType::Company => Ok(Filter::eq("domain", domain)),
        ref other => Err(MigrateError::InvalidInput(format!(
            "domain matching on {other} needs an explicit domain property"
        ))),
    }
}
