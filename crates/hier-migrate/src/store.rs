//! Collaborator contracts
//!
//! The engine never owns storage. It is handed:
//! - a [`WorkItemRepository`] with a transactional read-modify-write primitive
//! - a [`JobStore`] for job records, move logs and reports
//! - a [`TenantDirectory`] for the tenant's active preset key
//! - an [`AccessPolicy`] deciding who administers a tenant
//!
//! Every call is tenant-scoped.

use crate::error::StoreError;
use crate::job::{MigrationJob, MigrationReport, MoveRecord};
use async_trait::async_trait;
use hier_model::{ActorId, JobId, TenantId, WorkItem, WorkItemId};

/// View handed to a transaction body.
///
/// Reads observe the transaction's own writes. Nothing is visible to other
/// readers until the body returns `Ok`; an `Err` discards every write and
/// every appended move.
pub trait ItemTransaction {
    /// Read an item of the transaction's tenant
    fn get_item(&self, id: &WorkItemId) -> Option<WorkItem>;

    /// Stage a write of a whole item
    ///
    /// # Errors
    /// `StoreError::TenantMismatch` if the item belongs to another tenant.
    fn put_item(&mut self, item: WorkItem) -> Result<(), StoreError>;

    /// Stage a move-log entry; `seq` is assigned on commit
    fn append_move(&mut self, record: MoveRecord);
}

/// Transaction body
pub type TransactionFn<'a> =
    dyn FnMut(&mut dyn ItemTransaction) -> Result<(), StoreError> + Send + 'a;

/// Tenant-scoped work-item access
#[async_trait]
pub trait WorkItemRepository: Send + Sync {
    /// Every item of the tenant, in a stable order
    async fn list_items(&self, tenant: &TenantId) -> Result<Vec<WorkItem>, StoreError>;

    /// One item, if it exists
    async fn get_item(
        &self,
        tenant: &TenantId,
        id: &WorkItemId,
    ) -> Result<Option<WorkItem>, StoreError>;

    /// Run `work` atomically: all of its writes commit together or not at all
    async fn run_transaction(
        &self,
        tenant: &TenantId,
        work: &mut TransactionFn<'_>,
    ) -> Result<(), StoreError>;
}

/// Durable job, move-log and report records
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new job
    async fn create_job(&self, job: &MigrationJob) -> Result<(), StoreError>;

    /// Overwrite an existing job
    async fn update_job(&self, job: &MigrationJob) -> Result<(), StoreError>;

    /// Job by tenant and id
    async fn get_job(
        &self,
        tenant: &TenantId,
        job_id: JobId,
    ) -> Result<Option<MigrationJob>, StoreError>;

    /// Tenant's jobs, newest first
    async fn list_jobs(&self, tenant: &TenantId) -> Result<Vec<MigrationJob>, StoreError>;

    /// Move log of a job, in append order
    async fn list_moves(&self, tenant: &TenantId, job_id: JobId)
        -> Result<Vec<MoveRecord>, StoreError>;

    /// Insert or replace a job's report
    async fn save_report(&self, report: &MigrationReport) -> Result<(), StoreError>;

    /// Report of a job
    async fn get_report(
        &self,
        tenant: &TenantId,
        job_id: JobId,
    ) -> Result<Option<MigrationReport>, StoreError>;
}

/// Tenant preset bookkeeping
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    /// Preset key currently active for the tenant
    async fn active_preset_key(&self, tenant: &TenantId) -> Result<Option<String>, StoreError>;

    /// Record a new active preset key
    async fn set_active_preset_key(&self, tenant: &TenantId, key: &str)
        -> Result<(), StoreError>;
}

/// Tenant-admin check performed before any job is created
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccessPolicy: Send + Sync {
    /// Whether `actor` may migrate or roll back `tenant`
    async fn is_tenant_admin(&self, tenant: &TenantId, actor: &ActorId)
        -> Result<bool, StoreError>;
}
