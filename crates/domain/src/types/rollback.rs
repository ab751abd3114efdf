//! Rollback modes, states and the tally written to rollback reports.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ObjectType;
use crate::impl_domain_status_conversions;

/// Which phases of a reversal run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RollbackMode {
    /// Every phase.
    #[default]
    Full,
    /// Skip pipeline and property deletion.
    RecordsOnly,
    /// Skip association and record deletion.
    PropertiesOnly,
}

impl_domain_status_conversions!(RollbackMode {
    Full => "full",
    RecordsOnly => "records-only",
    PropertiesOnly => "properties-only",
});

/// Reversal phases, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackPhase {
    /// Delete created associations.
    Associations,
    /// Delete created records.
    Records,
    /// Delete created pipelines.
    Pipelines,
    /// Delete created properties.
    Properties,
}

impl_domain_status_conversions!(RollbackPhase {
    Associations => "associations",
    Records => "records",
    Pipelines => "pipelines",
    Properties => "properties",
});

impl RollbackMode {
    /// Phases this mode runs, in order.
    pub fn phases(self) -> &'static [RollbackPhase] {
        match self {
            Self::Full => &[
                RollbackPhase::Associations,
                RollbackPhase::Records,
                RollbackPhase::Pipelines,
                RollbackPhase::Properties,
            ],
            Self::RecordsOnly => &[RollbackPhase::Associations, RollbackPhase::Records],
            Self::PropertiesOnly => &[RollbackPhase::Pipelines, RollbackPhase::Properties],
        }
    }

    /// Whether this mode includes `phase`.
    pub fn runs(self, phase: RollbackPhase) -> bool {
        self.phases().contains(&phase)
    }

    /// Whether every phase of this mode is among `done`.
    pub fn is_covered_by(self, done: &BTreeSet<RollbackPhase>) -> bool {
        self.phases().iter().all(|phase| done.contains(phase))
    }
}

/// Lifecycle of one rollback session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackState {
    /// Runs selected, nothing deleted yet.
    Identified,
    /// Confirmed by the operator.
    Confirmed,
    /// Deletions in progress.
    Reversing,
    /// Every deletion succeeded.
    Reversed,
    /// At least one deletion failed.
    ReversalFailed,
}

impl_domain_status_conversions!(RollbackState {
    Identified => "identified",
    Confirmed => "confirmed",
    Reversing => "reversing",
    Reversed => "reversed",
    ReversalFailed => "reversal_failed",
});

impl RollbackState {
    /// True once the session has settled.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Reversed | Self::ReversalFailed)
    }
}

/// Result of a single delete call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The entity was removed.
    Deleted,
    /// The entity was already gone (404); counts as reversed.
    AlreadyAbsent,
}

/// A deletion that failed for a reason other than "not found".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReversalFailure {
    /// Phase the deletion belonged to.
    pub phase: RollbackPhase,
    /// Type of the entity.
    pub object_type: ObjectType,
    /// Destination id of the entity.
    pub id: String,
    /// Error text.
    pub reason: String,
}

/// Tally attached to the audit record of a rollback run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReversalSummary {
    /// Mode the session ran with.
    pub mode: RollbackMode,
    /// Final or current state.
    pub state: RollbackState,
    /// Runs the session acted on.
    pub runs: Vec<Uuid>,
    /// Phases that finished with no failures; only these count as reversed
    /// for `runs` when later sessions are identified.
    #[serde(default)]
    pub completed_phases: Vec<RollbackPhase>,
    /// Entities deleted.
    pub reversed: usize,
    /// Entities that were already gone.
    pub already_absent: usize,
    /// Deletions that failed.
    pub failed: Vec<ReversalFailure>,
}

impl ReversalSummary {
    /// An empty tally in the reversing state.
    pub fn new(mode: RollbackMode, runs: Vec<Uuid>) -> Self {
        Self {
            mode,
            state: RollbackState::Reversing,
            runs,
            completed_phases: Vec::new(),
            reversed: 0,
            already_absent: 0,
            failed: Vec::new(),
        }
    }

    /// Count one delete outcome.
    pub fn record(&mut self, outcome: DeleteOutcome) {
        match outcome {
            DeleteOutcome::Deleted => self.reversed += 1,
            DeleteOutcome::AlreadyAbsent => self.already_absent += 1,
        }
    }

    /// Keep a failed deletion.
    pub fn record_failure(&mut self, failure: ReversalFailure) {
        self.failed.push(failure);
    }

    /// Failures recorded during `phase`.
    pub fn failures_in(&self, phase: RollbackPhase) -> usize {
        self.failed.iter().filter(|failure| failure.phase == phase).count()
    }

    /// Mark `phase` as finished without failures.
    pub fn complete_phase(&mut self, phase: RollbackPhase) {
        if !self.completed_phases.contains(&phase) {
            self.completed_phases.push(phase);
        }
    }

    /// Settle the terminal state from the failures seen so far.
    pub fn settle(&mut self) -> RollbackState {
        self.state = if self.failed.is_empty() {
            RollbackState::Reversed
        } else {
            RollbackState::ReversalFailed
        };
        self.state
    }
}
