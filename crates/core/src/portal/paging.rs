//! Cursor paging over the search port.

use std::cmp::Ordering;

use portalsync_domain::constants::{MAX_IN_FILTER_VALUES, OBJECT_ID_PROPERTY};
use portalsync_domain::{Filter, FilterGroup, Record, RecordQuery, Result, SortOrder};
use tracing::debug;

use super::CrmPortal;

/// Follow the page cursor until `limit` records are collected or the
/// portal runs out of pages.
pub async fn collect_records(
    portal: &dyn CrmPortal,
    mut query: RecordQuery,
    limit: Option<usize>,
) -> Result<Vec<Record>> {
    let mut records = Vec::new();
    let mut pages = 0usize;

    loop {
        if let Some(limit) = limit {
            if records.len() >= limit {
                break;
            }
            query.page_size = query.page_size.min(limit - records.len()).max(1);
        }

        let page = portal.search_records(&query).await?;
        pages += 1;
        let fetched = page.records.len();
        records.extend(page.records);
        debug!(
            portal = portal.label(),
            object_type = %query.object_type,
            page = pages,
            fetched,
            total = records.len(),
            "paging.page_fetched"
        );

        match page.next_after {
            Some(cursor) if fetched > 0 => query.after = Some(cursor),
            _ => break,
        }
    }

    sort_records(&mut records, query.sort);
    if let Some(limit) = limit {
        records.truncate(limit);
    }
    Ok(records)
}

/// Fetch records by id, honouring the filters already on `base`.
///
/// Ids are split into `IN` chunks the search API accepts; results from all
/// chunks are merged, re-sorted and capped.
pub async fn fetch_by_ids(
    portal: &dyn CrmPortal,
    base: RecordQuery,
    ids: &[String],
    limit: Option<usize>,
) -> Result<Vec<Record>> {
    let mut records = Vec::new();
    for chunk in ids.chunks(MAX_IN_FILTER_VALUES) {
        let id_filter = Filter::in_list(OBJECT_ID_PROPERTY, chunk.to_vec());
        let mut query = base.clone();
        if query.filter_groups.is_empty() {
            query.filter_groups.push(FilterGroup::default());
        }
        for group in &mut query.filter_groups {
            group.filters.push(id_filter.clone());
        }
        records.extend(collect_records(portal, query, None).await?);
    }

    sort_records(&mut records, base.sort);
    records.dedup_by(|a, b| a.id == b.id);
    if let Some(limit) = limit {
        records.truncate(limit);
    }
    Ok(records)
}

/// Order by creation time; records without one go last.
pub fn sort_records(records: &mut [Record], order: SortOrder) {
    records.sort_by(|a, b| {
        let by_created = match (a.created(), b.created()) {
            (Some(x), Some(y)) => match order {
                SortOrder::NewestFirst => y.cmp(&x),
                SortOrder::OldestFirst => x.cmp(&y),
            },
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_created.then_with(|| a.id.cmp(&b.id))
    });
}
