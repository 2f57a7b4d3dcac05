//! Caller-facing facade
//!
//! Validates input, checks tenant-admin rights and serializes migrate and
//! rollback per tenant before delegating to the orchestrator or the rollback
//! executor. Read operations share the same admin check.

use crate::config::MigratorConfig;
use crate::error::{MigrationError, PreconditionError, StoreError};
use crate::job::{JobMode, MigrationJob, MigrationOutcome, MigrationReport, MoveRecord, RollbackOutcome};
use crate::memory::MemoryStore;
use crate::orchestrator::{MigrationOrchestrator, MigrationRequest};
use crate::rollback::RollbackExecutor;
use crate::store::{AccessPolicy, JobStore, TenantDirectory, WorkItemRepository};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use hier_model::{ActorId, JobId, ModelError, Preset, TenantId};
use hier_scan::ScanResult;
use std::fmt;
use std::sync::Arc;

/// Operation holding a tenant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Migrate,
    Rollback,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Migrate => "migrate",
            Operation::Rollback => "rollback",
        })
    }
}

/// Releases the tenant when dropped
struct TenantGuard<'a> {
    in_flight: &'a DashMap<TenantId, Operation>,
    tenant: TenantId,
}

impl Drop for TenantGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.remove(&self.tenant);
    }
}

/// Migration service
pub struct MigrationService {
    orchestrator: MigrationOrchestrator,
    rollback: RollbackExecutor,
    jobs: Arc<dyn JobStore>,
    access: Arc<dyn AccessPolicy>,
    in_flight: DashMap<TenantId, Operation>,
}

impl fmt::Debug for MigrationService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationService")
            .field("orchestrator", &self.orchestrator)
            .field("in_flight", &self.in_flight.len())
            .finish_non_exhaustive()
    }
}

impl MigrationService {
    /// Create service from its collaborators
    #[must_use]
    pub fn new(
        items: Arc<dyn WorkItemRepository>,
        jobs: Arc<dyn JobStore>,
        tenants: Arc<dyn TenantDirectory>,
        access: Arc<dyn AccessPolicy>,
        config: MigratorConfig,
    ) -> Self {
        Self {
            orchestrator: MigrationOrchestrator::new(items.clone(), jobs.clone(), tenants, config),
            rollback: RollbackExecutor::new(items, jobs.clone()),
            jobs,
            access,
            in_flight: DashMap::new(),
        }
    }

    /// Service whose every collaborator is one [`MemoryStore`]
    #[must_use]
    pub fn in_memory(store: Arc<MemoryStore>, config: MigratorConfig) -> Self {
        Self::new(store.clone(), store.clone(), store.clone(), store, config)
    }

    /// Get configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &MigratorConfig {
        self.orchestrator.config()
    }

    /// Run a migration.
    ///
    /// # Errors
    /// - `Validation`: blank ids or malformed preset payload; no job created
    /// - `Unauthorized`: actor is not a tenant admin; no job created
    /// - `Busy`: another migrate or rollback holds the tenant
    /// - `Execution`: the job was created and ended FAILED
    pub async fn migrate(
        &self,
        tenant: &TenantId,
        to_preset_key: &str,
        mode: JobMode,
        preset_payload: &serde_json::Value,
        actor: &ActorId,
    ) -> Result<MigrationOutcome, MigrationError> {
        require_id(tenant.is_blank(), "tenantId")?;
        require_id(to_preset_key.trim().is_empty(), "toPresetKey")?;
        require_id(actor.is_blank(), "actorId")?;
        let preset = parse_preset(preset_payload)?;

        self.authorize(tenant, actor).await?;
        let _guard = self.acquire(tenant, Operation::Migrate)?;

        let request = MigrationRequest {
            tenant_id: tenant.clone(),
            to_preset_key: to_preset_key.trim().to_string(),
            mode,
            preset,
            actor_id: actor.clone(),
        };
        self.orchestrator.migrate(&request).await
    }

    /// Roll back a COMPLETED job.
    ///
    /// # Errors
    /// - `Validation` / `Unauthorized` / `Busy` as for [`Self::migrate`]
    /// - `Precondition`: job missing or not COMPLETED; nothing mutated
    /// - `Execution`: a revert failed part way
    pub async fn rollback(
        &self,
        tenant: &TenantId,
        job_id: JobId,
        actor: &ActorId,
    ) -> Result<RollbackOutcome, MigrationError> {
        require_id(tenant.is_blank(), "tenantId")?;
        require_id(actor.is_blank(), "actorId")?;

        self.authorize(tenant, actor).await?;
        let _guard = self.acquire(tenant, Operation::Rollback)?;

        self.rollback.rollback(tenant, job_id, actor).await
    }

    /// Scan the tenant against a preset without creating a job
    ///
    /// # Errors
    /// `Validation`, `Unauthorized` or `Store`.
    pub async fn scan_preview(
        &self,
        tenant: &TenantId,
        preset_payload: &serde_json::Value,
        actor: &ActorId,
    ) -> Result<ScanResult, MigrationError> {
        require_id(tenant.is_blank(), "tenantId")?;
        let preset = parse_preset(preset_payload)?;
        self.authorize(tenant, actor).await?;
        self.orchestrator.preview(tenant, &preset).await
    }

    /// Load one job
    ///
    /// # Errors
    /// `Precondition(JobNotFound)` if the tenant has no such job.
    pub async fn job(
        &self,
        tenant: &TenantId,
        job_id: JobId,
        actor: &ActorId,
    ) -> Result<MigrationJob, MigrationError> {
        self.authorize(tenant, actor).await?;
        self.load_job(tenant, job_id).await
    }

    /// Tenant's jobs, newest first
    ///
    /// # Errors
    /// `Unauthorized` or `Store`.
    pub async fn jobs(
        &self,
        tenant: &TenantId,
        actor: &ActorId,
    ) -> Result<Vec<MigrationJob>, MigrationError> {
        self.authorize(tenant, actor).await?;
        Ok(self.jobs.list_jobs(tenant).await?)
    }

    /// Report of a finished job
    ///
    /// # Errors
    /// `Store(ReportNotFound)` for jobs that never produced a report.
    pub async fn report(
        &self,
        tenant: &TenantId,
        job_id: JobId,
        actor: &ActorId,
    ) -> Result<MigrationReport, MigrationError> {
        self.authorize(tenant, actor).await?;
        self.load_job(tenant, job_id).await?;
        self.jobs
            .get_report(tenant, job_id)
            .await?
            .ok_or(MigrationError::Store(StoreError::ReportNotFound(job_id)))
    }

    /// Move log of a job, in append order
    ///
    /// # Errors
    /// `Precondition(JobNotFound)` if the tenant has no such job.
    pub async fn moves(
        &self,
        tenant: &TenantId,
        job_id: JobId,
        actor: &ActorId,
    ) -> Result<Vec<MoveRecord>, MigrationError> {
        self.authorize(tenant, actor).await?;
        self.load_job(tenant, job_id).await?;
        Ok(self.jobs.list_moves(tenant, job_id).await?)
    }

    async fn authorize(&self, tenant: &TenantId, actor: &ActorId) -> Result<(), MigrationError> {
        if self.access.is_tenant_admin(tenant, actor).await? {
            Ok(())
        } else {
            tracing::warn!(%tenant, %actor, "tenant-admin check rejected actor");
            Err(MigrationError::Unauthorized {
                tenant: tenant.clone(),
                actor: actor.clone(),
            })
        }
    }

    fn acquire(
        &self,
        tenant: &TenantId,
        operation: Operation,
    ) -> Result<TenantGuard<'_>, MigrationError> {
        match self.in_flight.entry(tenant.clone()) {
            Entry::Occupied(held) => {
                tracing::warn!(%tenant, held_by = %held.get(), requested = %operation, "tenant busy");
                Err(MigrationError::Busy(tenant.clone()))
            }
            Entry::Vacant(slot) => {
                slot.insert(operation);
                Ok(TenantGuard {
                    in_flight: &self.in_flight,
                    tenant: tenant.clone(),
                })
            }
        }
    }

    async fn load_job(&self, tenant: &TenantId, job_id: JobId) -> Result<MigrationJob, MigrationError> {
        self.jobs
            .get_job(tenant, job_id)
            .await?
            .ok_or_else(|| PreconditionError::JobNotFound(job_id).into())
    }
}

fn require_id(blank: bool, field: &'static str) -> Result<(), MigrationError> {
    if blank {
        Err(ModelError::EmptyField(field).into())
    } else {
        Ok(())
    }
}

fn parse_preset(payload: &serde_json::Value) -> Result<Preset, MigrationError> {
    if payload.is_null() {
        return Err(ModelError::EmptyField("presetPayload").into());
    }
    Ok(Preset::from_json(payload)?)
}
