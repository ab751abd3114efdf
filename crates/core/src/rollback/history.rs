//! Reading earlier runs back out of their reports.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};
use portalsync_domain::{AuditRecord, IdMapping, IdMappingTable, RollbackMode, RollbackPhase, RunKind};
use uuid::Uuid;

/// Phases each run has had reversed cleanly, across every real rollback.
///
/// A phase that recorded a failure or was cut short by an abort is not
/// listed, so the run stays eligible for another attempt.
pub fn reversed_phases(reports: &[AuditRecord]) -> BTreeMap<Uuid, BTreeSet<RollbackPhase>> {
    let mut reversed: BTreeMap<Uuid, BTreeSet<RollbackPhase>> = BTreeMap::new();
    let summaries = reports
        .iter()
        .filter(|report| report.kind == RunKind::Rollback && !report.dry_run)
        .filter_map(|report| report.rollback.as_ref());
    for summary in summaries {
        for run_id in &summary.runs {
            reversed.entry(*run_id).or_default().extend(summary.completed_phases.iter().copied());
        }
    }
    reversed
}

fn is_covered(reversed: &BTreeMap<Uuid, BTreeSet<RollbackPhase>>, run_id: &Uuid, mode: RollbackMode) -> bool {
    reversed.get(run_id).is_some_and(|done| mode.is_covered_by(done))
}

/// Whether a rollback in `mode` has nothing left to do for `run_id`.
pub fn already_reversed(reports: &[AuditRecord], run_id: &Uuid, mode: RollbackMode) -> bool {
    is_covered(&reversed_phases(reports), run_id, mode)
}

/// Real migration and sync runs whose records are still in place, newest first.
pub fn live_runs(reports: &[AuditRecord]) -> Vec<AuditRecord> {
    let reversed = reversed_phases(reports);
    let mut runs: Vec<AuditRecord> = reports
        .iter()
        .filter(|report| report.kind != RunKind::Rollback && !report.dry_run)
        .filter(|report| !is_covered(&reversed, &report.run_id, RollbackMode::RecordsOnly))
        .cloned()
        .collect();
    runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
    runs
}

/// Runs a rollback in `mode` still has work for, newest first.
pub fn rollback_candidates(reports: &[AuditRecord], mode: RollbackMode) -> Vec<AuditRecord> {
    let reversed = reversed_phases(reports);
    let mut runs: Vec<AuditRecord> = reports
        .iter()
        .filter(|report| report.kind != RunKind::Rollback && !report.dry_run)
        .filter(|report| report.has_reversible_changes())
        .filter(|report| !is_covered(&reversed, &report.run_id, mode))
        .cloned()
        .collect();
    runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
    runs
}

/// Keep reports started within `days` of `now`.
pub fn within_days(reports: Vec<AuditRecord>, days: u32, now: DateTime<Utc>) -> Vec<AuditRecord> {
    let cutoff = now - Duration::days(i64::from(days));
    reports.into_iter().filter(|report| report.started_at >= cutoff).collect()
}

/// Id mappings recovered from earlier runs; the newest run wins a conflict.
pub fn prior_mappings(reports: &[AuditRecord]) -> Vec<IdMapping> {
    let mut table = IdMappingTable::new();
    let mut mappings = Vec::new();
    for report in live_runs(reports) {
        for mapping in report.id_mappings() {
            if table.get(&mapping.object_type, &mapping.source_id).is_none() {
                table.insert(mapping.clone());
                mappings.push(mapping.clone());
            }
        }
    }
    mappings
}
