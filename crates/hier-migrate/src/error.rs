//! Error types for migrations
//!
//! Provides the error taxonomy callers see:
//! - Validation failures (no job created)
//! - Authorization failures (no job created)
//! - Rollback precondition failures (no mutation)
//! - Execution failures (job marked FAILED, committed moves retained)
//!
//! Scan findings are never errors; they travel in the report.

use crate::job::JobStatus;
use hier_model::{ActorId, JobId, ModelError, TenantId, WorkItemId};

/// Main migration error type
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    /// Malformed or missing input
    #[error("invalid input: {0}")]
    Validation(String),

    /// Actor lacks tenant-admin rights
    #[error("actor '{actor}' is not an administrator of tenant '{tenant}'")]
    Unauthorized {
        /// Tenant the operation targeted
        tenant: TenantId,
        /// Rejected actor
        actor: ActorId,
    },

    /// Rollback target missing or not in a rollback-able state
    #[error("precondition failed: {0}")]
    Precondition(#[from] PreconditionError),

    /// Unexpected failure after the job was created
    #[error("migration job {job_id} failed: {message}")]
    Execution {
        /// Job that failed
        job_id: JobId,
        /// Failure message, without internal detail
        message: String,
    },

    /// Another migration or rollback is running for the tenant
    #[error("tenant '{0}' already has a migration or rollback in flight")]
    Busy(TenantId),

    /// Store failure outside a job
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Illegal job status change
    #[error("state machine error: {0}")]
    StateMachine(#[from] IllegalTransition),
}

impl MigrationError {
    /// Classify into the caller-facing taxonomy
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Unauthorized { .. } => ErrorKind::Authorization,
            Self::Precondition(_) => ErrorKind::Precondition,
            Self::Execution { .. } => ErrorKind::Execution,
            Self::Busy(_) => ErrorKind::Conflict,
            Self::Store(_) | Self::StateMachine(_) => ErrorKind::Internal,
        }
    }

    /// Whether the caller may simply try again later.
    ///
    /// Nothing inside the engine retries.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Busy(_))
    }

    /// Create validation error
    #[inline]
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }
}

impl From<ModelError> for MigrationError {
    fn from(value: ModelError) -> Self {
        Self::Validation(value.to_string())
    }
}

/// Caller-facing error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input, nothing happened
    Validation,
    /// Not allowed, nothing happened
    Authorization,
    /// Wrong state, nothing happened
    Precondition,
    /// Job failed part way
    Execution,
    /// Concurrent operation on the same tenant
    Conflict,
    /// Store or invariant failure
    Internal,
}

/// Rollback precondition failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PreconditionError {
    /// No such job for the tenant
    #[error("job {0} not found")]
    JobNotFound(JobId),

    /// Job exists but is not COMPLETED
    #[error("job {job_id} is {status}, only COMPLETED jobs can be rolled back")]
    NotCompleted {
        /// Job id
        job_id: JobId,
        /// Current status
        status: JobStatus,
    },
}

/// Repository and job-store errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Job missing
    #[error("job not found: {0}")]
    JobNotFound(JobId),

    /// Report missing
    #[error("report not found for job {0}")]
    ReportNotFound(JobId),

    /// Write crossed a tenant boundary
    #[error("work item '{item}' does not belong to tenant '{tenant}'")]
    TenantMismatch {
        /// Tenant of the transaction
        tenant: TenantId,
        /// Offending item
        item: WorkItemId,
    },

    /// Job id already used
    #[error("job already exists: {0}")]
    DuplicateJob(JobId),

    /// Underlying storage failure
    #[error("backend failure: {0}")]
    Backend(String),
}

/// Illegal job status change
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal job transition: {from} -> {to}")]
pub struct IllegalTransition {
    /// Current status
    pub from: JobStatus,
    /// Requested status
    pub to: JobStatus,
}
