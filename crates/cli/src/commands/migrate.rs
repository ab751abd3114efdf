use anyhow::Context;
use portalsync_core::{MigrationRunner, RunSettings};

use super::finish;
use crate::cli::MigrateArgs;
use crate::context::AppContext;

pub async fn execute(args: &MigrateArgs, ctx: &AppContext) -> anyhow::Result<()> {
    let _lock = ctx.lock()?;

    let mut settings = RunSettings::from_config(&ctx.config.migration);
    if !args.types.is_empty() {
        settings.types = Some(args.types.clone());
    }
    if args.limit.is_some() {
        settings.limit = args.limit;
    }
    settings.skip_properties = args.skip_properties;
    settings.skip_associations = args.skip_associations;
    settings.dry_run = ctx.dry_run;

    tracing::info!(
        types = ?settings.types,
        limit = ?settings.limit,
        dry_run = settings.dry_run,
        "cli.migrate"
    );

    let runner = MigrationRunner::new(
        ctx.source()?,
        ctx.destination()?,
        ctx.reports(),
        ctx.field_filter()?,
        settings,
    );
    let outcome = runner.run_all().await.context("Migration could not start")?;
    finish(outcome, ctx.json)
}
