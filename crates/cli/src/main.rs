//! `portalsync` command line entry point.
//!
//! Exit codes: 0 when a command completes (including runs with per-record
//! failures and rollbacks that end partially reversed), 1 on fatal errors,
//! 2 on usage errors reported by clap.

mod cli;
mod commands;
mod context;
mod logging;
mod summary;

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Commands, RollbackCommand};
use context::AppContext;
use portalsync_infra::config;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "cli.failed");
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let _log_guard = logging::init(&config.logging, cli.verbose)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let ctx = AppContext::new(config, cli.dry_run, cli.json);
    if ctx.dry_run {
        tracing::info!("cli.dry_run_enabled");
    }

    runtime.block_on(async {
        match &cli.command {
            Commands::Migrate(args) => commands::migrate(args, &ctx).await,
            Commands::Sync(args) => commands::sync(args, &ctx).await,
            Commands::Rollback(RollbackCommand::List { days_back, limit }) => {
                commands::rollback_list(*days_back, *limit, &ctx).await
            }
            Commands::Rollback(RollbackCommand::Run(args)) => commands::rollback_run(args, &ctx).await,
            Commands::Reset(args) => commands::reset(args, &ctx).await,
        }
    })
}
