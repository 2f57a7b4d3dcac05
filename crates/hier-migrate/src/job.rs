//! Job, move-log and report records

use crate::error::IllegalTransition;
use crate::state_machine;
use chrono::{DateTime, Utc};
use hier_model::{ActorId, JobId, TenantId, WorkItemId};
use hier_scan::{Issue, RecommendedMove, ReviewEntry};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Whether a migration mutates anything
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobMode {
    /// Scan and report only
    DryRun,
    /// Apply HIGH-confidence moves
    Apply,
}

impl fmt::Display for JobMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            JobMode::DryRun => "DRY_RUN",
            JobMode::Apply => "APPLY",
        })
    }
}

impl FromStr for JobMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "dry_run" | "dryrun" => Ok(JobMode::DryRun),
            "apply" => Ok(JobMode::Apply),
            other => Err(format!("unknown job mode: {other}")),
        }
    }
}

/// Job lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
    RolledBack,
}

impl JobStatus {
    /// Every status
    pub const ALL: [JobStatus; 4] = [
        JobStatus::Running,
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::RolledBack,
    ];

    /// No further transition is possible
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        state_machine::allowed_transitions(self).is_empty()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            JobStatus::Running => "RUNNING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
            JobStatus::RolledBack => "ROLLED_BACK",
        })
    }
}

/// Move counters, persisted while a job runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgress {
    /// HIGH-confidence moves selected for this run
    pub planned_moves: usize,
    /// Moves committed
    pub applied_moves: usize,
    /// Moves dropped because the item vanished or was already in place
    pub skipped_moves: usize,
}

/// Outcome counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub moved_items: usize,
    pub flagged_for_review: usize,
    pub invalid_items: usize,
}

/// Durable record of one migrate invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationJob {
    pub id: JobId,
    pub tenant_id: TenantId,
    /// Tenant's active preset when the job started (label only)
    pub from_preset_key: Option<String>,
    /// Requested preset (label only)
    pub to_preset_key: String,
    pub mode: JobMode,
    pub status: JobStatus,
    pub actor_id: ActorId,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub rolled_back_at: Option<DateTime<Utc>>,
    pub rolled_back_by: Option<ActorId>,
    pub progress: JobProgress,
    pub summary: JobSummary,
    /// Failure message of a FAILED job
    pub error: Option<String>,
}

impl MigrationJob {
    /// New RUNNING job with zeroed counters
    #[must_use]
    pub fn start(
        tenant_id: TenantId,
        from_preset_key: Option<String>,
        to_preset_key: impl Into<String>,
        mode: JobMode,
        actor_id: ActorId,
    ) -> Self {
        Self {
            id: JobId::new(),
            tenant_id,
            from_preset_key,
            to_preset_key: to_preset_key.into(),
            mode,
            status: JobStatus::Running,
            actor_id,
            started_at: Utc::now(),
            finished_at: None,
            rolled_back_at: None,
            rolled_back_by: None,
            progress: JobProgress::default(),
            summary: JobSummary::default(),
            error: None,
        }
    }

    /// Move to `to` if the state machine allows it
    ///
    /// # Errors
    /// `IllegalTransition` leaves the job untouched.
    pub fn transition(&mut self, to: JobStatus) -> Result<(), IllegalTransition> {
        state_machine::validate_transition(self.status, to)?;
        self.status = to;
        Ok(())
    }

    /// Bounded caller-facing view
    #[must_use]
    pub fn outcome(&self) -> MigrationOutcome {
        MigrationOutcome {
            job_id: self.id,
            tenant_id: self.tenant_id.clone(),
            status: self.status,
            summary: self.summary,
        }
    }
}

/// One logged reparent, owned by its job; never mutated after commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRecord {
    /// Append index, assigned by the store on commit
    pub seq: u64,
    pub job_id: JobId,
    pub item_id: WorkItemId,
    pub prev_parent_id: Option<WorkItemId>,
    pub next_parent_id: Option<WorkItemId>,
    /// Index the item held in the previous parent's `children_ids`
    pub prev_position: Option<usize>,
    /// Whether the move put the item into the next parent's `children_ids`;
    /// false when it was already listed there
    #[serde(default = "listed_by_move")]
    pub added_to_next: bool,
    pub moved_at: DateTime<Utc>,
    pub actor_id: ActorId,
}

// Move logs written before the flag existed always added the child
const fn listed_by_move() -> bool {
    true
}

/// Reparent applied during a run, as listed in the report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedMove {
    pub item_id: WorkItemId,
    pub from_parent_id: Option<WorkItemId>,
    pub to_parent_id: WorkItemId,
    pub moved_at: DateTime<Utc>,
}

/// Report persisted for every finished job, dry runs included
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    pub job_id: JobId,
    pub tenant_id: TenantId,
    pub mode: JobMode,
    pub issues: Vec<Issue>,
    pub review_queue: Vec<ReviewEntry>,
    /// Every recommendation of the scan, HIGH and LOW
    pub recommended_moves: Vec<RecommendedMove>,
    pub moved_items: Vec<AppliedMove>,
    pub generated_at: DateTime<Utc>,
}

/// What `migrate` returns: ids, status and counters only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationOutcome {
    pub job_id: JobId,
    pub tenant_id: TenantId,
    pub status: JobStatus,
    pub summary: JobSummary,
}

/// What `rollback` returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackOutcome {
    pub job_id: JobId,
    /// Moves reverted
    pub restored_moves: usize,
    /// Moves whose item no longer exists
    pub skipped_moves: usize,
}
