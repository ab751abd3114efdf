use std::io::{BufRead, Write};

use anyhow::{bail, Context};
use portalsync_core::{RollbackManager, RollbackSelection};
use portalsync_domain::RollbackMode;

use crate::cli::{ResetArgs, RollbackRunArgs};
use crate::context::AppContext;
use crate::summary;

fn manager(ctx: &AppContext) -> anyhow::Result<RollbackManager> {
    Ok(RollbackManager::new(ctx.destination()?, ctx.reports()).dry_run(ctx.dry_run))
}

pub async fn list(days_back: Option<u32>, limit: usize, ctx: &AppContext) -> anyhow::Result<()> {
    let runs = manager(ctx)?
        .list_candidates(days_back, Some(limit))
        .await
        .context("Failed to read reports")?;
    if ctx.json {
        summary::print_json(&runs)
    } else {
        print!("{}", summary::render_candidates(&runs));
        Ok(())
    }
}

pub async fn run(args: &RollbackRunArgs, ctx: &AppContext) -> anyhow::Result<()> {
    let selection = match (args.run_id, args.last_n) {
        (Some(run_id), _) => RollbackSelection::RunId(run_id),
        (None, Some(n)) => RollbackSelection::LastN(n),
        (None, None) => RollbackSelection::Last,
    };
    reverse(selection, args.mode, args.days_back, args.yes, ctx).await
}

pub async fn reset(args: &ResetArgs, ctx: &AppContext) -> anyhow::Result<()> {
    if !args.yes && !ctx.dry_run {
        bail!("reset reverses every recorded run; pass --yes to confirm or --dry-run to preview");
    }
    reverse(RollbackSelection::All, args.mode, args.days_back, true, ctx).await
}

async fn reverse(
    selection: RollbackSelection,
    mode: RollbackMode,
    days_back: Option<u32>,
    assume_yes: bool,
    ctx: &AppContext,
) -> anyhow::Result<()> {
    let _lock = ctx.lock()?;
    let manager = manager(ctx)?;

    let mut session = manager
        .identify(selection, mode, days_back)
        .await
        .context("Failed to identify runs to roll back")?;
    if session.is_empty() {
        if ctx.json {
            return summary::print_json(&session.runs());
        }
        println!("No runs to roll back.");
        return Ok(());
    }

    if !ctx.json {
        println!("Rolling back ({mode}):");
        print!("{}", summary::render_candidates(session.runs()));
    }

    if !assume_yes && !ctx.dry_run && !confirm(session.runs().len())? {
        println!("Rollback cancelled.");
        return Ok(());
    }

    session.confirm()?;
    let audit = manager.execute(&mut session).await.context("Rollback stopped on a fatal error")?;
    summary::print_audit(&audit, ctx.json)
}

fn confirm(runs: usize) -> anyhow::Result<bool> {
    eprint!("Delete everything created by {runs} run(s) from the destination portal? [y/N] ");
    std::io::stderr().flush().context("Failed to write prompt")?;

    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer).context("Failed to read confirmation")?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}
