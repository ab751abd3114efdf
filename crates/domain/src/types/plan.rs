//! Selective sync criteria and the migration plan they resolve to.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ObjectType;
use crate::constants::DEFAULT_CLOSURE_DEPTH;

/// Predicates over one primary object type. All predicates are AND'ed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCriteria {
    /// Object type the selection starts from.
    pub primary: ObjectType,
    /// Explicit source ids; when set, filters are not used.
    #[serde(default)]
    pub ids: Vec<String>,
    /// Only records created in the last N days.
    #[serde(default)]
    pub created_within_days: Option<u32>,
    /// Only records modified in the last N days.
    #[serde(default)]
    pub modified_within_days: Option<u32>,
    /// Any of these domains may match (OR inside the predicate).
    #[serde(default)]
    pub domains: Vec<String>,
    /// Property the domain predicate applies to; defaults per object type.
    #[serde(default)]
    pub domain_property: Option<String>,
    /// Exact-match property filters.
    #[serde(default)]
    pub property_equals: BTreeMap<String, String>,
    /// Upper bound on primary records.
    #[serde(default)]
    pub limit: Option<usize>,
    /// Object types to expand into; empty means every other standard type.
    #[serde(default)]
    pub related_types: Vec<ObjectType>,
    /// Association hops followed from the primary set.
    #[serde(default = "default_depth")]
    pub depth: u8,
}

fn default_depth() -> u8 {
    DEFAULT_CLOSURE_DEPTH
}

impl SyncCriteria {
    /// Criteria for `primary` with default expansion.
    pub fn new(primary: ObjectType) -> Self {
        Self {
            primary,
            ids: Vec::new(),
            created_within_days: None,
            modified_within_days: None,
            domains: Vec::new(),
            domain_property: None,
            property_equals: BTreeMap::new(),
            limit: None,
            related_types: Vec::new(),
            depth: DEFAULT_CLOSURE_DEPTH,
        }
    }

    /// Select these source ids.
    pub fn with_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ids = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Keep records created within `days`.
    pub fn created_within_days(mut self, days: u32) -> Self {
        self.created_within_days = Some(days);
        self
    }

    /// Keep records modified within `days`.
    pub fn modified_within_days(mut self, days: u32) -> Self {
        self.modified_within_days = Some(days);
        self
    }

    /// Restrict companies to these domains.
    pub fn with_domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.domains = domains.into_iter().map(Into::into).collect();
        self
    }

    /// Add an exact-match property filter.
    pub fn where_equals(mut self, property: impl Into<String>, value: impl Into<String>) -> Self {
        self.property_equals.insert(property.into(), value.into());
        self
    }

    /// Cap the number of primary records.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Expand only into these types.
    pub fn with_related_types(mut self, types: Vec<ObjectType>) -> Self {
        self.related_types = types;
        self
    }

    /// Set how many association hops to follow.
    pub fn with_depth(mut self, depth: u8) -> Self {
        self.depth = depth;
        self
    }

    /// Related types to expand into, excluding the primary type.
    pub fn effective_related_types(&self) -> Vec<ObjectType> {
        let candidates: Vec<ObjectType> = if self.related_types.is_empty() {
            ObjectType::STANDARD.to_vec()
        } else {
            self.related_types.clone()
        };
        let mut seen = BTreeSet::new();
        candidates
            .into_iter()
            .filter(|object_type| *object_type != self.primary)
            .filter(|object_type| seen.insert(object_type.clone()))
            .collect()
    }
}

/// Output of the selective sync resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationPlan {
    /// Type of the primary selection.
    pub primary_object_type: ObjectType,
    /// Source ids of the primary selection.
    pub primary_ids: BTreeSet<String>,
    /// Related source ids per object type.
    pub related: BTreeMap<ObjectType, BTreeSet<String>>,
    /// Criteria the plan was resolved from.
    pub criteria_snapshot: SyncCriteria,
    /// When the plan was resolved.
    pub resolved_at: DateTime<Utc>,
}

impl MigrationPlan {
    /// A plan with nothing selected.
    pub fn empty(criteria: SyncCriteria, resolved_at: DateTime<Utc>) -> Self {
        Self {
            primary_object_type: criteria.primary.clone(),
            primary_ids: BTreeSet::new(),
            related: BTreeMap::new(),
            criteria_snapshot: criteria,
            resolved_at,
        }
    }

    /// True when nothing is selected.
    pub fn is_empty(&self) -> bool {
        self.primary_ids.is_empty()
    }

    /// Ids selected for one object type, primary or related.
    pub fn ids_for(&self, object_type: &ObjectType) -> Option<&BTreeSet<String>> {
        if *object_type == self.primary_object_type {
            Some(&self.primary_ids)
        } else {
            self.related.get(object_type)
        }
    }

    /// Every object type in the plan, in migration order.
    pub fn object_types(&self) -> Vec<ObjectType> {
        let mut types: Vec<ObjectType> = std::iter::once(self.primary_object_type.clone())
            .chain(self.related.iter().filter(|(_, ids)| !ids.is_empty()).map(|(t, _)| t.clone()))
            .collect();
        types.sort_by(|a, b| a.migration_rank().cmp(&b.migration_rank()).then_with(|| a.cmp(b)));
        types.dedup();
        types
    }

    /// Number of records across all types.
    pub fn total_records(&self) -> usize {
        self.primary_ids.len() + self.related.values().map(BTreeSet::len).sum::<usize>()
    }
}
