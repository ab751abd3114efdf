//! Record search queries and result pages.
//!
//! Filter groups are OR'ed; filters inside a group are AND'ed, matching the
//! vendor search API.

use serde::{Deserialize, Serialize};

use super::{ObjectType, PropertyValue, Record};
use crate::constants::{CREATED_DATE_PROPERTY, OBJECT_ID_PROPERTY, SEARCH_PAGE_SIZE};

/// A single search predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operator", rename_all = "snake_case")]
pub enum Filter {
    /// Exact match.
    Eq {
        /// Property compared.
        property: String,
        /// Expected value.
        value: String,
    },
    /// Greater than or equal; dates are epoch milliseconds.
    Gte {
        /// Property compared.
        property: String,
        /// Lower bound, inclusive.
        value: String,
    },
    /// Any of `values`; at most
    /// [`MAX_IN_FILTER_VALUES`](crate::constants::MAX_IN_FILTER_VALUES) per filter.
    In {
        /// Property compared.
        property: String,
        /// Accepted values.
        values: Vec<String>,
    },
    /// Whole-token match, e.g. `@example.com` inside an email address.
    ContainsToken {
        /// Property searched.
        property: String,
        /// Token to find.
        value: String,
    },
}

impl Filter {
    /// `property == value`.
    pub fn eq(property: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Eq { property: property.into(), value: value.into() }
    }

    /// `property >= value`.
    pub fn gte(property: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Gte { property: property.into(), value: value.into() }
    }

    /// `property` is one of `values`.
    pub fn in_list(property: impl Into<String>, values: Vec<String>) -> Self {
        Self::In { property: property.into(), values }
    }

    /// `property` contains the whole token `value`.
    pub fn contains_token(property: impl Into<String>, value: impl Into<String>) -> Self {
        Self::ContainsToken { property: property.into(), value: value.into() }
    }

    /// Property the filter applies to.
    pub fn property(&self) -> &str {
        match self {
            Self::Eq { property, .. }
            | Self::Gte { property, .. }
            | Self::In { property, .. }
            | Self::ContainsToken { property, .. } => property,
        }
    }

    /// Evaluate the predicate locally against a record.
    ///
    /// `hs_object_id` addresses the record id itself.
    pub fn matches(&self, record: &Record) -> bool {
        let actual = match self.property() {
            OBJECT_ID_PROPERTY => Some(PropertyValue::String(record.id.clone())),
            CREATED_DATE_PROPERTY => record.created().map(PropertyValue::Date),
            name => record.property(name).cloned(),
        };
        let Some(actual) = actual.filter(|value| !value.is_null()) else {
            return false;
        };

        match self {
            Self::Eq { value, .. } => wire_eq(&actual, value),
            Self::In { values, .. } => values.iter().any(|value| wire_eq(&actual, value)),
            Self::Gte { value, .. } => {
                let expected = PropertyValue::from(value.as_str());
                match (actual.as_timestamp(), expected.as_timestamp()) {
                    (Some(actual), Some(expected)) => actual >= expected,
                    _ => match (actual.to_wire(), value.parse::<f64>()) {
                        (Some(actual), Ok(expected)) => {
                            actual.parse::<f64>().map(|n| n >= expected).unwrap_or(false)
                        }
                        _ => false,
                    },
                }
            }
            Self::ContainsToken { value, .. } => actual
                .to_wire()
                .map(|text| text.to_lowercase().contains(&value.trim_matches('*').to_lowercase()))
                .unwrap_or(false),
        }
    }
}

fn wire_eq(actual: &PropertyValue, expected: &str) -> bool {
    actual.to_wire().map(|text| text.trim().eq_ignore_ascii_case(expected.trim())).unwrap_or(false)
}

/// Conjunction of filters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterGroup {
    /// Predicates that must all hold.
    pub filters: Vec<Filter>,
}

impl FilterGroup {
    /// A group of AND'ed `filters`.
    pub fn new(filters: Vec<Filter>) -> Self {
        Self { filters }
    }

    /// Evaluate the group against a record already in memory.
    pub fn matches(&self, record: &Record) -> bool {
        self.filters.iter().all(|filter| filter.matches(record))
    }
}

/// Ordering of search results by creation date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Most recently created first; the default for capped runs.
    #[default]
    NewestFirst,
    /// Oldest created first.
    OldestFirst,
}

/// One page request against a portal's search endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordQuery {
    /// Type searched.
    pub object_type: ObjectType,
    /// OR'ed filter groups; empty matches every record.
    pub filter_groups: Vec<FilterGroup>,
    /// Order by creation date.
    pub sort: SortOrder,
    /// Properties to return with each record.
    pub properties: Vec<String>,
    /// Records per page.
    pub page_size: usize,
    /// Cursor from the previous page.
    pub after: Option<String>,
}

impl RecordQuery {
    /// All records of `object_type`, newest first, one default-sized page.
    pub fn new(object_type: ObjectType) -> Self {
        Self {
            object_type,
            filter_groups: Vec::new(),
            sort: SortOrder::NewestFirst,
            properties: Vec::new(),
            page_size: SEARCH_PAGE_SIZE,
            after: None,
        }
    }

    /// Add a filter group, OR'ed with any existing group.
    pub fn with_group(mut self, group: FilterGroup) -> Self {
        self.filter_groups.push(group);
        self
    }

    /// Set the returned properties.
    pub fn with_properties(mut self, properties: Vec<String>) -> Self {
        self.properties = properties;
        self
    }

    /// Set the order.
    pub fn with_sort(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    /// Set the page size.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.clamp(1, SEARCH_PAGE_SIZE);
        self
    }

    /// Continue from `cursor`.
    pub fn after(mut self, cursor: Option<String>) -> Self {
        self.after = cursor;
        self
    }

    /// No groups means every record matches.
    pub fn matches(&self, record: &Record) -> bool {
        self.filter_groups.is_empty() || self.filter_groups.iter().any(|group| group.matches(record))
    }
}

/// One page of search results with the cursor for the next page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordPage {
    /// Records on this page.
    pub records: Vec<Record>,
    /// Cursor for the next page; `None` on the last one.
    pub next_after: Option<String>,
}
