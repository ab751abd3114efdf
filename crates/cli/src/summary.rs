//! Human and JSON renderings of run results.

use std::fmt::Write as _;

use anyhow::Context;
use portalsync_domain::{AuditRecord, MigrationPlan, RunKind};
use serde::Serialize;

pub fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("Failed to render JSON summary")?;
    println!("{rendered}");
    Ok(())
}

/// Print an audit record, as JSON or as a short text summary.
pub fn print_audit(audit: &AuditRecord, json: bool) -> anyhow::Result<()> {
    if json {
        print_json(audit)
    } else {
        print!("{}", render_audit(audit));
        Ok(())
    }
}

pub fn render_audit(audit: &AuditRecord) -> String {
    let mut out = String::new();
    let title = match audit.kind {
        RunKind::Migration => "Migration",
        RunKind::SelectiveSync => "Selective sync",
        RunKind::Rollback => "Rollback",
    };
    let mut flags = Vec::new();
    if audit.dry_run {
        flags.push("dry run");
    }
    if audit.aborted {
        flags.push("aborted");
    }
    let suffix = if flags.is_empty() { String::new() } else { format!(" ({})", flags.join(", ")) };
    let _ = writeln!(out, "{title} {}{suffix}", audit.run_id);

    if let Some(summary) = &audit.rollback {
        let _ = writeln!(
            out,
            "  mode {}, state {}: {} reversed, {} already absent, {} failed",
            summary.mode,
            summary.state,
            summary.reversed,
            summary.already_absent,
            summary.failed.len()
        );
        for failure in &summary.failed {
            let _ = writeln!(
                out,
                "    {} {} {}: {}",
                failure.phase, failure.object_type, failure.id, failure.reason
            );
        }
    }

    if let Some(plan) = &audit.plan {
        out.push_str(&render_plan(plan));
    }

    let schema_created = audit.schema_changes.iter().filter(|c| c.created).count();
    let schema_failed = audit.schema_changes.iter().filter(|c| c.error.is_some()).count();
    if schema_created + schema_failed > 0 {
        let _ = writeln!(out, "  schema: {schema_created} created, {schema_failed} failed");
    }

    for result in &audit.object_results {
        let _ = writeln!(
            out,
            "  {}: {} created, {} updated, {} failed",
            result.object_type,
            result.created.len(),
            result.updated.len(),
            result.failed.len()
        );
    }

    for result in &audit.association_results {
        let _ = writeln!(
            out,
            "  {} -> {}: {} linked, {} duplicates, {} failed",
            result.from_type,
            result.to_type,
            result.created.len(),
            result.skipped_duplicates,
            result.failed.len()
        );
    }

    for error in &audit.errors {
        let _ = writeln!(out, "  error: {error}");
    }
    out
}

pub fn render_plan(plan: &MigrationPlan) -> String {
    let mut out = String::new();
    for object_type in plan.object_types() {
        let count = plan.ids_for(&object_type).map_or(0, |ids| ids.len());
        let role = if object_type == plan.primary_object_type { "primary" } else { "related" };
        let _ = writeln!(out, "  plan {object_type} ({role}): {count} records");
    }
    out
}

/// One line per reversible run, newest first.
pub fn render_candidates(runs: &[AuditRecord]) -> String {
    if runs.is_empty() {
        return "No runs to roll back.\n".to_string();
    }
    let mut out = String::new();
    for run in runs {
        let _ = writeln!(
            out,
            "{}  {}  {}  created {}, updated {}, links {}",
            run.run_id,
            run.started_at.format("%Y-%m-%d %H:%M:%S"),
            run.kind,
            run.created_total(),
            run.updated_total(),
            run.associations_created()
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use portalsync_domain::{
        IdMapping, ObjectResult, ObjectType, ReversalSummary, RollbackMode,
    };

    use super::*;

    #[test]
    fn migration_summary_lists_counts_per_type() {
        let mut audit = AuditRecord::begin(RunKind::Migration, true);
        let mut contacts = ObjectResult::new(ObjectType::Contact);
        contacts.created.push(IdMapping::new(ObjectType::Contact, "1", "dryrun-1"));
        contacts.fail("2", "INVALID_EMAIL");
        audit.record_object(contacts);

        let text = render_audit(&audit);
        assert!(text.starts_with("Migration "));
        assert!(text.contains("(dry run)"));
        assert!(text.contains("contact: 1 created, 0 updated, 1 failed"));
    }

    #[test]
    fn rollback_summary_shows_tally() {
        let mut audit = AuditRecord::begin(RunKind::Rollback, false);
        let mut summary = ReversalSummary::new(RollbackMode::RecordsOnly, vec![]);
        summary.reversed = 4;
        summary.settle();
        audit.rollback = Some(summary);

        let text = render_audit(&audit);
        assert!(text.contains("mode records-only, state reversed: 4 reversed"));
    }

    #[test]
    fn empty_candidate_list_says_so() {
        assert_eq!(render_candidates(&[]), "No runs to roll back.\n");
    }
}
