//! Rollback Manager
//!
//! Reverses earlier runs from their reports. A session moves through
//! `Identified -> Confirmed -> Reversing -> Reversed | ReversalFailed`.
//! Deletion is best-effort: a 404 counts as reversed, any other failure is
//! tallied and the remaining deletions still run. Only phases that finish
//! without failures are recorded as reversed, so a partial rollback can be
//! retried and a records-only rollback can be followed by a properties-only one.

use std::sync::Arc;

use chrono::Utc;
use portalsync_domain::constants::ASSOCIATION_BATCH_SIZE;
use portalsync_domain::{
    AuditRecord, DeleteOutcome, MigrateError, ObjectType, ReversalFailure, ReversalSummary,
    RollbackMode, RollbackPhase, RollbackState, Result, RunKind, SchemaChange, SchemaChangeKind,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::history::{already_reversed, rollback_candidates, within_days};
use super::ReportStore;
use crate::portal::CrmPortal;

/// Which reports a rollback acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackSelection {
    /// A single run by id.
    RunId(Uuid),
    /// The most recent reversible run.
    Last,
    /// The N most recent reversible runs.
    LastN(usize),
    /// Every reversible run (reset).
    All,
}

/// One rollback, from identification to its terminal state.
#[derive(Debug, Clone)]
pub struct RollbackSession {
    state: RollbackState,
    mode: RollbackMode,
    runs: Vec<AuditRecord>,
}

impl RollbackSession {
    fn identified(mode: RollbackMode, runs: Vec<AuditRecord>) -> Self {
        Self { state: RollbackState::Identified, mode, runs }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RollbackState {
        self.state
    }

    /// Which phases the session runs.
    pub fn mode(&self) -> RollbackMode {
        self.mode
    }

    /// Reports of the runs being reversed.
    pub fn runs(&self) -> &[AuditRecord] {
        &self.runs
    }

    /// Ids of the runs being reversed.
    pub fn run_ids(&self) -> Vec<Uuid> {
        self.runs.iter().map(|run| run.run_id).collect()
    }

    /// True when the selection matched no runs.
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Operator approval; only an identified session can be confirmed.
    pub fn confirm(&mut self) -> Result<()> {
        match self.state {
            RollbackState::Identified => {
                self.state = RollbackState::Confirmed;
                Ok(())
            }
            other => Err(MigrateError::InvalidInput(format!("cannot confirm a rollback in state {other}"))),
        }
    }
}

/// Identifies and reverses earlier runs against the destination portal.
pub struct RollbackManager {
    destination: Arc<dyn CrmPortal>,
    reports: Arc<dyn ReportStore>,
    dry_run: bool,
}

impl RollbackManager {
    /// A manager deleting from `destination` and reading and writing `reports`.
    pub fn new(destination: Arc<dyn CrmPortal>, reports: Arc<dyn ReportStore>) -> Self {
        Self { destination, reports, dry_run: false }
    }

    /// Mark the rollback report as a dry run; pair with a dry-run destination.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Runs a full rollback still has work for, newest first, optionally
    /// limited to a days-back window.
    pub async fn list_candidates(&self, days_back: Option<u32>, limit: Option<usize>) -> Result<Vec<AuditRecord>> {
        self.candidates(RollbackMode::Full, days_back, limit).await
    }

    async fn candidates(
        &self,
        mode: RollbackMode,
        days_back: Option<u32>,
        limit: Option<usize>,
    ) -> Result<Vec<AuditRecord>> {
        let reports = self.reports.list(None).await?;
        let mut candidates = rollback_candidates(&reports, mode);
        if let Some(days) = days_back {
            candidates = within_days(candidates, days, Utc::now());
        }
        if let Some(limit) = limit {
            candidates.truncate(limit);
        }
        Ok(candidates)
    }

    /// Resolve a selection into an identified session.
    pub async fn identify(
        &self,
        selection: RollbackSelection,
        mode: RollbackMode,
        days_back: Option<u32>,
    ) -> Result<RollbackSession> {
        let runs = match selection {
            RollbackSelection::RunId(run_id) => vec![self.load_reversible(run_id, mode).await?],
            RollbackSelection::Last => self.candidates(mode, days_back, Some(1)).await?,
            RollbackSelection::LastN(0) => {
                return Err(MigrateError::InvalidInput("number of runs must be at least 1".into()))
            }
            RollbackSelection::LastN(n) => self.candidates(mode, days_back, Some(n)).await?,
            RollbackSelection::All => self.candidates(mode, days_back, None).await?,
        };
        info!(runs = runs.len(), mode = %mode, "rollback.identified");
        Ok(RollbackSession::identified(mode, runs))
    }

    async fn load_reversible(&self, run_id: Uuid, mode: RollbackMode) -> Result<AuditRecord> {
        let report = self
            .reports
            .load(&run_id)
            .await?
            .ok_or_else(|| MigrateError::NotFound(format!("no report for run {run_id}")))?;
        if report.kind == RunKind::Rollback {
            return Err(MigrateError::InvalidInput(format!("run {run_id} is itself a rollback")));
        }
        if report.dry_run {
            return Err(MigrateError::InvalidInput(format!("run {run_id} was a dry run; nothing to reverse")));
        }
        let history = self.reports.list(None).await?;
        if already_reversed(&history, &run_id, mode) {
            return Err(MigrateError::InvalidInput(format!(
                "run {run_id} has already been rolled back ({mode})"
            )));
        }
        Ok(report)
    }

    /// Reverse a confirmed session and persist the rollback's own report.
    ///
    /// Returns the rollback audit record; its summary carries the terminal
    /// state. An `Auth`/`Config` error stops the deletions, saves the partial
    /// report and is returned as the error.
    pub async fn execute(&self, session: &mut RollbackSession) -> Result<AuditRecord> {
        if session.state != RollbackState::Confirmed {
            return Err(MigrateError::InvalidInput(format!(
                "rollback must be confirmed before it runs (state: {})",
                session.state
            )));
        }
        session.state = RollbackState::Reversing;

        let mut audit = AuditRecord::begin(RunKind::Rollback, self.dry_run);
        let mut summary = ReversalSummary::new(session.mode, session.run_ids());
        info!(run_id = %audit.run_id, runs = session.runs.len(), mode = %session.mode, "rollback.started");

        let mut fatal = None;
        for &phase in session.mode.phases() {
            let result = match phase {
                RollbackPhase::Associations => self.reverse_associations(&session.runs, &mut summary).await,
                RollbackPhase::Records => self.reverse_records(&session.runs, &mut summary).await,
                RollbackPhase::Pipelines => self.reverse_pipelines(&session.runs, &mut summary).await,
                RollbackPhase::Properties => self.reverse_properties(&session.runs, &mut summary).await,
            };
            if let Err(err) = result {
                warn!(phase = %phase, error = %err, "rollback.aborted");
                audit.aborted = true;
                audit.record_error(format!("rollback aborted during {phase}: {err}"));
                fatal = Some(err);
                break;
            }
            if summary.failures_in(phase) == 0 {
                summary.complete_phase(phase);
            }
        }

        session.state = summary.settle();
        info!(
            run_id = %audit.run_id,
            state = %session.state,
            reversed = summary.reversed,
            already_absent = summary.already_absent,
            failed = summary.failed.len(),
            "rollback.completed"
        );
        for failure in &summary.failed {
            audit.record_error(format!(
                "{} {} {}: {}",
                failure.phase, failure.object_type, failure.id, failure.reason
            ));
        }
        audit.rollback = Some(summary);
        audit.finish();
        self.reports.save(&audit).await?;

        match fatal {
            Some(err) => Err(err),
            None => Ok(audit),
        }
    }

    async fn reverse_associations(&self, runs: &[AuditRecord], summary: &mut ReversalSummary) -> Result<()> {
        for result in runs.iter().flat_map(|run| run.association_results.iter()) {
            for chunk in result.created.chunks(ASSOCIATION_BATCH_SIZE) {
                match self.destination.delete_associations(&result.from_type, &result.to_type, chunk).await {
                    Ok(()) => chunk.iter().for_each(|_| summary.record(DeleteOutcome::Deleted)),
                    Err(err) if err.is_not_found() => {
                        chunk.iter().for_each(|_| summary.record(DeleteOutcome::AlreadyAbsent))
                    }
                    Err(err) if err.is_fatal() => return Err(err),
                    Err(err) => {
                        for pair in chunk {
                            summary.record_failure(ReversalFailure {
                                phase: RollbackPhase::Associations,
                                object_type: result.from_type.clone(),
                                id: format!("{} -> {}:{}", pair.from_id, result.to_type, pair.to_id),
                                reason: err.to_string(),
                            });
                        }
                    }
                }
            }
        }
        Ok(())
    }

    async fn reverse_records(&self, runs: &[AuditRecord], summary: &mut ReversalSummary) -> Result<()> {
        let mut results: Vec<_> = runs.iter().flat_map(|run| run.object_results.iter()).collect();
        // Dependents first: custom objects, tickets and deals before contacts.
        results.sort_by(|a, b| b.object_type.migration_rank().cmp(&a.object_type.migration_rank()));

        for result in results {
            for id in result.created_ids() {
                let outcome = self.destination.delete_record(&result.object_type, id).await;
                tally(summary, RollbackPhase::Records, &result.object_type, id, outcome)?;
            }
            debug!(object_type = %result.object_type, count = result.created.len(), "rollback.records_reversed");
        }
        Ok(())
    }

    async fn reverse_pipelines(&self, runs: &[AuditRecord], summary: &mut ReversalSummary) -> Result<()> {
        let changes = created_changes(runs);
        for change in changes.iter().filter(|c| c.kind == SchemaChangeKind::PipelineStage) {
            let stage_id = destination_id(change);
            let Some(pipeline_id) = change.parent_id.as_deref() else {
                summary.record_failure(ReversalFailure {
                    phase: RollbackPhase::Pipelines,
                    object_type: change.object_type.clone(),
                    id: stage_id.to_string(),
                    reason: "stage has no recorded pipeline".into(),
                });
                continue;
            };
            let outcome = self.destination.delete_pipeline_stage(&change.object_type, pipeline_id, stage_id).await;
            tally(summary, RollbackPhase::Pipelines, &change.object_type, stage_id, outcome)?;
        }
        for change in changes.iter().filter(|c| c.kind == SchemaChangeKind::Pipeline) {
            let id = destination_id(change);
            let outcome = self.destination.delete_pipeline(&change.object_type, id).await;
            tally(summary, RollbackPhase::Pipelines, &change.object_type, id, outcome)?;
        }
        Ok(())
    }

    async fn reverse_properties(&self, runs: &[AuditRecord], summary: &mut ReversalSummary) -> Result<()> {
        let changes = created_changes(runs);
        for change in changes.iter().filter(|c| c.kind == SchemaChangeKind::Property) {
            let outcome = self.destination.delete_property(&change.object_type, &change.name).await;
            tally(summary, RollbackPhase::Properties, &change.object_type, &change.name, outcome)?;
        }
        for change in changes.iter().filter(|c| c.kind == SchemaChangeKind::PropertyGroup) {
            let outcome = self.destination.delete_property_group(&change.object_type, &change.name).await;
            tally(summary, RollbackPhase::Properties, &change.object_type, &change.name, outcome)?;
        }
        for change in changes.iter().filter(|c| c.kind == SchemaChangeKind::ObjectSchema) {
            let outcome = self.destination.delete_object_schema(&change.name).await;
            tally(summary, RollbackPhase::Properties, &change.object_type, &change.name, outcome)?;
        }
        Ok(())
    }
}

fn tally(
    summary: &mut ReversalSummary,
    phase: RollbackPhase,
    object_type: &ObjectType,
    id: &str,
    outcome: Result<DeleteOutcome>,
) -> Result<()> {
    match outcome {
        Ok(outcome) => summary.record(outcome),
        Err(err) if err.is_not_found() => summary.record(DeleteOutcome::AlreadyAbsent),
        Err(err) if err.is_fatal() => return Err(err),
        Err(err) => {
            debug!(phase = %phase, object_type = %object_type, id, error = %err, "rollback.delete_failed");
            summary.record_failure(ReversalFailure {
                phase,
                object_type: object_type.clone(),
                id: id.to_string(),
                reason: err.to_string(),
            });
        }
    }
    Ok(())
}

fn created_changes(runs: &[AuditRecord]) -> Vec<&SchemaChange> {
    runs.iter().flat_map(|run| run.schema_changes.iter()).filter(|change| change.created).collect()
}

fn destination_id(change: &SchemaChange) -> &str {
    change.destination_id.as_deref().unwrap_or(&change.name)
}
