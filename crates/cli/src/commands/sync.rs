use anyhow::Context;
use portalsync_core::{MigrationRunner, RunSettings, SelectiveSyncResolver};
use portalsync_domain::SyncCriteria;

use super::finish;
use crate::cli::SyncArgs;
use crate::context::AppContext;

pub async fn execute(args: &SyncArgs, ctx: &AppContext) -> anyhow::Result<()> {
    let _lock = ctx.lock()?;

    let criteria = criteria_from_args(args);
    let source = ctx.source()?;
    let plan = SelectiveSyncResolver::new(source.clone())
        .resolve(&criteria)
        .await
        .context("Failed to resolve sync criteria")?;
    tracing::info!(
        primary = %plan.primary_object_type,
        records = plan.total_records(),
        dry_run = ctx.dry_run,
        "cli.sync_plan_resolved"
    );

    let mut settings = RunSettings::from_config(&ctx.config.migration);
    settings.dry_run = ctx.dry_run;
    let runner = MigrationRunner::new(
        source,
        ctx.destination()?,
        ctx.reports(),
        ctx.field_filter()?,
        settings,
    );
    let outcome = runner.run_plan(plan).await.context("Selective sync could not start")?;
    finish(outcome, ctx.json)
}

fn criteria_from_args(args: &SyncArgs) -> SyncCriteria {
    let mut criteria = SyncCriteria::new(args.object.clone())
        .with_ids(args.ids.iter().cloned())
        .with_domains(args.domains.iter().cloned())
        .with_related_types(args.related.clone())
        .with_depth(args.depth);
    if let Some(days) = args.days_since_created {
        criteria = criteria.created_within_days(days);
    }
    if let Some(days) = args.days_since_modified {
        criteria = criteria.modified_within_days(days);
    }
    if let Some(limit) = args.limit {
        criteria = criteria.with_limit(limit);
    }
    criteria.domain_property = args.domain_property.clone();
    for (property, value) in &args.filters {
        criteria = criteria.where_equals(property.clone(), value.clone());
    }
    criteria
}
