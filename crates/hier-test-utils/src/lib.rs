//! Testing utilities for the hierarchy migration workspace
//!
//! Shared fixtures and a fault-injecting repository.

#![allow(missing_docs)]

use async_trait::async_trait;
use hier_migrate::{
    MemoryStore, MigrationService, MigratorConfig, StoreError, TransactionFn, WorkItemRepository,
};
use hier_model::{ActorId, Preset, TenantId, WorkItem, WorkItemId, WorkItemType};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const TENANT: &str = "acme";
pub const ADMIN: &str = "ada";

pub fn tenant() -> TenantId {
    TenantId::from(TENANT)
}

pub fn admin() -> ActorId {
    ActorId::from(ADMIN)
}

pub fn item(id: &str, item_type: WorkItemType) -> WorkItem {
    WorkItem::new(tenant(), WorkItemId::from(id), item_type)
}

/// Items described as `(id, type, parent)`, with every parent's
/// `children_ids` filled in snapshot order
pub fn tree(nodes: &[(&str, WorkItemType, Option<&str>)]) -> Vec<WorkItem> {
    let mut items: Vec<WorkItem> = nodes
        .iter()
        .map(|(id, item_type, parent)| {
            let mut it = item(id, *item_type);
            it.parent_id = parent.map(WorkItemId::from);
            it
        })
        .collect();

    let positions: BTreeMap<WorkItemId, usize> = items
        .iter()
        .enumerate()
        .map(|(pos, it)| (it.id.clone(), pos))
        .collect();
    for pos in 0..items.len() {
        let child = items[pos].id.clone();
        if let Some(parent_pos) = items[pos].parent_id.as_ref().and_then(|p| positions.get(p)) {
            items[*parent_pos].add_child(child);
        }
    }
    items
}

/// product -> epic -> story, plus tasks and bugs under stories
pub fn agile_preset() -> Preset {
    use WorkItemType::*;
    Preset::new(
        [Product, Epic, Story, Task, Bug],
        [(Product, vec![Epic]), (Epic, vec![Story]), (Story, vec![Task, Bug])],
    )
}

pub fn agile_preset_json() -> serde_json::Value {
    serde_json::json!({
        "enabledTypes": ["product", "epic", "story", "task", "bug"],
        "hierarchy": {
            "product": ["epic"],
            "epic": ["story"],
            "story": ["task", "bug"]
        }
    })
}

/// Store holding `items`, with [`admin`] as tenant admin
pub fn seeded_store(items: Vec<WorkItem>) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.upsert_items(items);
    store.grant_admin(&tenant(), admin());
    store
}

pub fn service(store: &Arc<MemoryStore>) -> MigrationService {
    MigrationService::in_memory(store.clone(), MigratorConfig::default())
}

/// Item rows of a store, for before/after comparisons
pub fn items_of(store: &MemoryStore) -> Vec<WorkItem> {
    store.snapshot().items
}

/// Repository that lets the first `budget` transactions through, then fails
/// every later one with a backend error
pub struct FlakyRepository {
    inner: Arc<MemoryStore>,
    remaining: Mutex<usize>,
}

impl FlakyRepository {
    pub fn new(inner: Arc<MemoryStore>, budget: usize) -> Self {
        Self {
            inner,
            remaining: Mutex::new(budget),
        }
    }
}

#[async_trait]
impl WorkItemRepository for FlakyRepository {
    async fn list_items(&self, tenant: &TenantId) -> Result<Vec<WorkItem>, StoreError> {
        self.inner.list_items(tenant).await
    }

    async fn get_item(
        &self,
        tenant: &TenantId,
        id: &WorkItemId,
    ) -> Result<Option<WorkItem>, StoreError> {
        self.inner.get_item(tenant, id).await
    }

    async fn run_transaction(
        &self,
        tenant: &TenantId,
        work: &mut TransactionFn<'_>,
    ) -> Result<(), StoreError> {
        {
            let mut remaining = self.remaining.lock();
            if *remaining == 0 {
                return Err(StoreError::Backend("connection reset".to_string()));
            }
            *remaining -= 1;
        }
        self.inner.run_transaction(tenant, work).await
    }
}

/// Service whose repository is a [`FlakyRepository`] over `store`
pub fn flaky_service(store: &Arc<MemoryStore>, budget: usize) -> MigrationService {
    MigrationService::new(
        Arc::new(FlakyRepository::new(store.clone(), budget)),
        store.clone(),
        store.clone(),
        store.clone(),
        MigratorConfig::default(),
    )
}

/// Repository that deletes `victim` right before its first transaction, as
/// a concurrent writer would between scan and apply
pub struct VanishingRepository {
    inner: Arc<MemoryStore>,
    victim: Mutex<Option<WorkItemId>>,
}

impl VanishingRepository {
    pub fn new(inner: Arc<MemoryStore>, victim: impl Into<WorkItemId>) -> Self {
        Self {
            inner,
            victim: Mutex::new(Some(victim.into())),
        }
    }
}

#[async_trait]
impl WorkItemRepository for VanishingRepository {
    async fn list_items(&self, tenant: &TenantId) -> Result<Vec<WorkItem>, StoreError> {
        self.inner.list_items(tenant).await
    }

    async fn get_item(
        &self,
        tenant: &TenantId,
        id: &WorkItemId,
    ) -> Result<Option<WorkItem>, StoreError> {
        self.inner.get_item(tenant, id).await
    }

    async fn run_transaction(
        &self,
        tenant: &TenantId,
        work: &mut TransactionFn<'_>,
    ) -> Result<(), StoreError> {
        let victim = self.victim.lock().take();
        if let Some(victim) = victim {
            self.inner.remove_item(tenant, &victim);
        }
        self.inner.run_transaction(tenant, work).await
    }
}

/// Service whose repository is a [`VanishingRepository`] over `store`
pub fn vanishing_service(store: &Arc<MemoryStore>, victim: &str) -> MigrationService {
    MigrationService::new(
        Arc::new(VanishingRepository::new(store.clone(), victim)),
        store.clone(),
        store.clone(),
        store.clone(),
        MigratorConfig::default(),
    )
}
