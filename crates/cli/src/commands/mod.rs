//! Subcommand implementations.
//!
//! Each command returns `Ok` once its report is written, even when single
//! records failed. A run that aborted on a fatal error still prints its
//! summary and then returns the error so the process exits non-zero.

mod migrate;
mod rollback;
mod sync;

use anyhow::anyhow;
use portalsync_core::RunOutcome;

pub use migrate::execute as migrate;
pub use rollback::{list as rollback_list, reset, run as rollback_run};
pub use sync::execute as sync;

use crate::summary;

fn finish(outcome: RunOutcome, json: bool) -> anyhow::Result<()> {
    summary::print_audit(&outcome.audit, json)?;
    match outcome.error {
        Some(err) => Err(anyhow!(err).context(format!("Run {} aborted", outcome.audit.run_id))),
        None => Ok(()),
    }
}
