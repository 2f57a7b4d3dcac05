//! In-memory store
//!
//! Implements every collaborator contract behind a single lock, so a
//! transaction's item writes and move-log appends commit together. The whole
//! state can be exported to and restored from a serde [`StoreSnapshot`].

use crate::error::StoreError;
use crate::job::{MigrationJob, MigrationReport, MoveRecord};
use crate::store::{
    AccessPolicy, ItemTransaction, JobStore, TenantDirectory, TransactionFn, WorkItemRepository,
};
use async_trait::async_trait;
use hier_model::{ActorId, JobId, TenantId, WorkItem, WorkItemId};
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Per-tenant settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantRecord {
    #[serde(default)]
    pub active_preset_key: Option<String>,
    #[serde(default)]
    pub admins: BTreeSet<ActorId>,
}

/// Serializable image of a [`MemoryStore`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    #[serde(default)]
    pub tenants: BTreeMap<TenantId, TenantRecord>,
    #[serde(default)]
    pub items: Vec<WorkItem>,
    #[serde(default)]
    pub jobs: Vec<MigrationJob>,
    #[serde(default)]
    pub moves: Vec<MoveRecord>,
    #[serde(default)]
    pub reports: Vec<MigrationReport>,
}

#[derive(Debug, Default)]
struct Inner {
    tenants: BTreeMap<TenantId, TenantRecord>,
    items: HashMap<TenantId, IndexMap<WorkItemId, WorkItem>>,
    jobs: IndexMap<JobId, MigrationJob>,
    moves: Vec<MoveRecord>,
    reports: HashMap<JobId, MigrationReport>,
    last_seq: u64,
}

/// Store backed by process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore a store from a snapshot
    #[must_use]
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let mut inner = Inner {
            tenants: snapshot.tenants,
            last_seq: snapshot.moves.iter().map(|m| m.seq).max().unwrap_or(0),
            moves: snapshot.moves,
            ..Inner::default()
        };
        for item in snapshot.items {
            inner
                .items
                .entry(item.tenant_id.clone())
                .or_default()
                .insert(item.id.clone(), item);
        }
        for job in snapshot.jobs {
            inner.jobs.insert(job.id, job);
        }
        for report in snapshot.reports {
            inner.reports.insert(report.job_id, report);
        }
        Self {
            inner: Mutex::new(inner),
        }
    }

    /// Export the full state; items grouped by tenant, in insertion order
    #[must_use]
    pub fn snapshot(&self) -> StoreSnapshot {
        let inner = self.inner.lock();
        let mut tenant_ids: Vec<&TenantId> = inner.items.keys().collect();
        tenant_ids.sort();

        let mut reports: Vec<MigrationReport> = inner.reports.values().cloned().collect();
        reports.sort_by_key(|r| r.job_id);

        StoreSnapshot {
            tenants: inner.tenants.clone(),
            items: tenant_ids
                .into_iter()
                .flat_map(|t| inner.items[t].values().cloned())
                .collect(),
            jobs: inner.jobs.values().cloned().collect(),
            moves: inner.moves.clone(),
            reports,
        }
    }

    /// Insert or replace items, keyed by tenant and id
    pub fn upsert_items(&self, items: impl IntoIterator<Item = WorkItem>) {
        let mut inner = self.inner.lock();
        for item in items {
            inner
                .items
                .entry(item.tenant_id.clone())
                .or_default()
                .insert(item.id.clone(), item);
        }
    }

    /// Remove an item without touching its relatives
    pub fn remove_item(&self, tenant: &TenantId, id: &WorkItemId) -> Option<WorkItem> {
        self.inner
            .lock()
            .items
            .get_mut(tenant)
            .and_then(|items| items.shift_remove(id))
    }

    /// Make `actor` an administrator of `tenant`
    pub fn grant_admin(&self, tenant: &TenantId, actor: ActorId) {
        self.inner
            .lock()
            .tenants
            .entry(tenant.clone())
            .or_default()
            .admins
            .insert(actor);
    }

    /// Overwrite a stored job, bypassing the state machine
    pub fn put_job(&self, job: MigrationJob) {
        self.inner.lock().jobs.insert(job.id, job);
    }
}

struct MemoryTransaction<'a> {
    tenant: &'a TenantId,
    base: Option<&'a IndexMap<WorkItemId, WorkItem>>,
    staged: IndexMap<WorkItemId, WorkItem>,
    moves: Vec<MoveRecord>,
}

impl ItemTransaction for MemoryTransaction<'_> {
    fn get_item(&self, id: &WorkItemId) -> Option<WorkItem> {
        self.staged
            .get(id)
            .or_else(|| self.base.and_then(|items| items.get(id)))
            .cloned()
    }

    fn put_item(&mut self, item: WorkItem) -> Result<(), StoreError> {
        if &item.tenant_id != self.tenant {
            return Err(StoreError::TenantMismatch {
                tenant: self.tenant.clone(),
                item: item.id,
            });
        }
        self.staged.insert(item.id.clone(), item);
        Ok(())
    }

    fn append_move(&mut self, record: MoveRecord) {
        self.moves.push(record);
    }
}

#[async_trait]
impl WorkItemRepository for MemoryStore {
    async fn list_items(&self, tenant: &TenantId) -> Result<Vec<WorkItem>, StoreError> {
        Ok(self
            .inner
            .lock()
            .items
            .get(tenant)
            .map(|items| items.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn get_item(
        &self,
        tenant: &TenantId,
        id: &WorkItemId,
    ) -> Result<Option<WorkItem>, StoreError> {
        Ok(self
            .inner
            .lock()
            .items
            .get(tenant)
            .and_then(|items| items.get(id))
            .cloned())
    }

    async fn run_transaction(
        &self,
        tenant: &TenantId,
        work: &mut TransactionFn<'_>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();

        let (staged, moves) = {
            let mut tx = MemoryTransaction {
                tenant,
                base: inner.items.get(tenant),
                staged: IndexMap::new(),
                moves: Vec::new(),
            };
            work(&mut tx)?;
            (tx.staged, tx.moves)
        };

        let Inner {
            items,
            moves: log,
            last_seq,
            ..
        } = &mut *inner;
        let tenant_items = items.entry(tenant.clone()).or_default();
        for (id, item) in staged {
            tenant_items.insert(id, item);
        }
        for mut record in moves {
            *last_seq += 1;
            record.seq = *last_seq;
            log.push(record);
        }
        Ok(())
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn create_job(&self, job: &MigrationJob) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if inner.jobs.contains_key(&job.id) {
            return Err(StoreError::DuplicateJob(job.id));
        }
        inner.jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn update_job(&self, job: &MigrationJob) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        match inner.jobs.get_mut(&job.id) {
            Some(stored) if stored.tenant_id == job.tenant_id => {
                *stored = job.clone();
                Ok(())
            }
            _ => Err(StoreError::JobNotFound(job.id)),
        }
    }

    async fn get_job(
        &self,
        tenant: &TenantId,
        job_id: JobId,
    ) -> Result<Option<MigrationJob>, StoreError> {
        Ok(self
            .inner
            .lock()
            .jobs
            .get(&job_id)
            .filter(|job| &job.tenant_id == tenant)
            .cloned())
    }

    async fn list_jobs(&self, tenant: &TenantId) -> Result<Vec<MigrationJob>, StoreError> {
        let mut jobs: Vec<MigrationJob> = self
            .inner
            .lock()
            .jobs
            .values()
            .filter(|job| &job.tenant_id == tenant)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.started_at.cmp(&a.started_at).then(b.id.cmp(&a.id)));
        Ok(jobs)
    }

    async fn list_moves(
        &self,
        tenant: &TenantId,
        job_id: JobId,
    ) -> Result<Vec<MoveRecord>, StoreError> {
        let inner = self.inner.lock();
        match inner.jobs.get(&job_id) {
            Some(job) if &job.tenant_id == tenant => Ok(inner
                .moves
                .iter()
                .filter(|m| m.job_id == job_id)
                .cloned()
                .collect()),
            _ => Err(StoreError::JobNotFound(job_id)),
        }
    }

    async fn save_report(&self, report: &MigrationReport) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        match inner.jobs.get(&report.job_id) {
            Some(job) if job.tenant_id == report.tenant_id => {
                inner.reports.insert(report.job_id, report.clone());
                Ok(())
            }
            _ => Err(StoreError::JobNotFound(report.job_id)),
        }
    }

    async fn get_report(
        &self,
        tenant: &TenantId,
        job_id: JobId,
    ) -> Result<Option<MigrationReport>, StoreError> {
        Ok(self
            .inner
            .lock()
            .reports
            .get(&job_id)
            .filter(|report| &report.tenant_id == tenant)
            .cloned())
    }
}

#[async_trait]
impl TenantDirectory for MemoryStore {
    async fn active_preset_key(&self, tenant: &TenantId) -> Result<Option<String>, StoreError> {
        Ok(self
            .inner
            .lock()
            .tenants
            .get(tenant)
            .and_then(|t| t.active_preset_key.clone()))
    }

    async fn set_active_preset_key(
        &self,
        tenant: &TenantId,
        key: &str,
    ) -> Result<(), StoreError> {
        self.inner
            .lock()
            .tenants
            .entry(tenant.clone())
            .or_default()
            .active_preset_key = Some(key.to_string());
        Ok(())
    }
}

#[async_trait]
impl AccessPolicy for MemoryStore {
    async fn is_tenant_admin(
        &self,
        tenant: &TenantId,
        actor: &ActorId,
    ) -> Result<bool, StoreError> {
        Ok(self
            .inner
            .lock()
            .tenants
            .get(tenant)
            .is_some_and(|t| t.admins.contains(actor)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{JobMode, MigrationJob};
    use chrono::Utc;
    use hier_model::WorkItemType;
    use pretty_assertions::assert_eq;

    fn acme() -> TenantId {
        TenantId::from("acme")
    }

    fn store_with(items: &[(&str, WorkItemType)]) -> MemoryStore {
        let store = MemoryStore::new();
        store.upsert_items(
            items
                .iter()
                .map(|(id, t)| WorkItem::new(acme(), WorkItemId::from(*id), *t)),
        );
        store
    }

    fn record(job_id: JobId, item: &str) -> MoveRecord {
        MoveRecord {
            seq: 0,
            job_id,
            item_id: WorkItemId::from(item),
            prev_parent_id: None,
            next_parent_id: None,
            prev_position: None,
            added_to_next: true,
            moved_at: Utc::now(),
            actor_id: ActorId::from("ada"),
        }
    }

    #[tokio::test]
    async fn failed_transaction_commits_nothing() {
        let store = store_with(&[("e1", WorkItemType::Epic), ("s1", WorkItemType::Story)]);
        let job_id = JobId::new();

        let result = store
            .run_transaction(&acme(), &mut |tx: &mut dyn ItemTransaction| {
                let mut epic = tx.get_item(&WorkItemId::from("e1")).unwrap();
                epic.add_child(WorkItemId::from("s1"));
                tx.put_item(epic)?;
                tx.append_move(record(job_id, "s1"));
                Err(StoreError::Backend("disk full".to_string()))
            })
            .await;

        assert_eq!(result, Err(StoreError::Backend("disk full".to_string())));
        let epic = store.get_item(&acme(), &WorkItemId::from("e1")).await.unwrap().unwrap();
        assert!(epic.children_ids.is_empty());
        assert!(store.snapshot().moves.is_empty());
    }

    #[tokio::test]
    async fn committed_transaction_assigns_sequence() {
        let store = store_with(&[("e1", WorkItemType::Epic)]);
        let job_id = JobId::new();

        for item in ["s1", "s2"] {
            store
                .run_transaction(&acme(), &mut |tx: &mut dyn ItemTransaction| {
                    let staged = tx.get_item(&WorkItemId::from("e1"));
                    assert!(staged.is_some());
                    tx.append_move(record(job_id, item));
                    Ok(())
                })
                .await
                .unwrap();
        }

        let seqs: Vec<u64> = store.snapshot().moves.iter().map(|m| m.seq).collect();
        assert_eq!(seqs, vec![1, 2]);
    }

    #[tokio::test]
    async fn transaction_reads_its_own_writes() {
        let store = store_with(&[("e1", WorkItemType::Epic)]);

        store
            .run_transaction(&acme(), &mut |tx: &mut dyn ItemTransaction| {
                let mut epic = tx.get_item(&WorkItemId::from("e1")).unwrap();
                epic.add_child(WorkItemId::from("s1"));
                tx.put_item(epic)?;
                let again = tx.get_item(&WorkItemId::from("e1")).unwrap();
                assert!(again.has_child(&WorkItemId::from("s1")));
                Ok(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn cross_tenant_writes_are_rejected() {
        let store = store_with(&[("e1", WorkItemType::Epic)]);
        let foreign = WorkItem::new(TenantId::from("globex"), WorkItemId::from("x"), WorkItemType::Epic);

        let result = store
            .run_transaction(&acme(), &mut |tx: &mut dyn ItemTransaction| {
                tx.put_item(foreign.clone())
            })
            .await;

        assert!(matches!(result, Err(StoreError::TenantMismatch { .. })));
    }

    #[tokio::test]
    async fn jobs_are_tenant_scoped() {
        let store = MemoryStore::new();
        let job = MigrationJob::start(acme(), None, "scaled", JobMode::DryRun, ActorId::from("ada"));
        store.create_job(&job).await.unwrap();

        assert!(store.get_job(&acme(), job.id).await.unwrap().is_some());
        assert!(store.get_job(&TenantId::from("globex"), job.id).await.unwrap().is_none());
        assert_eq!(
            store.list_moves(&TenantId::from("globex"), job.id).await,
            Err(StoreError::JobNotFound(job.id))
        );
        assert_eq!(store.create_job(&job).await, Err(StoreError::DuplicateJob(job.id)));
    }

    #[tokio::test]
    async fn snapshot_round_trip_preserves_state() {
        let store = store_with(&[("p1", WorkItemType::Product), ("e1", WorkItemType::Epic)]);
        store.grant_admin(&acme(), ActorId::from("ada"));
        store.set_active_preset_key(&acme(), "classic").await.unwrap();

        let json = serde_json::to_string(&store.snapshot()).unwrap();
        let restored = MemoryStore::from_snapshot(serde_json::from_str(&json).unwrap());

        assert_eq!(restored.snapshot(), store.snapshot());
        assert!(restored.is_tenant_admin(&acme(), &ActorId::from("ada")).await.unwrap());
        assert_eq!(
            restored.active_preset_key(&acme()).await.unwrap().as_deref(),
            Some("classic")
        );
    }
}
