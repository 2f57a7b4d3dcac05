//! Hierarchy migration engine
//!
//! Moves a tenant's work-item tree onto a new preset and can undo the move:
//! - **MigrationOrchestrator**: scan, then apply HIGH-confidence moves one
//!   transaction at a time, logging each
//! - **RollbackExecutor**: replay a COMPLETED job's move log backwards
//! - **MigrationService**: validation, tenant-admin check and per-tenant
//!   serialization in front of both
//! - **MemoryStore**: in-process implementation of every storage contract
//!
//! # Example
//!
//! ```rust
//! use hier_migrate::prelude::*;
//! use hier_model::{WorkItem, WorkItemType::*};
//! use std::sync::Arc;
//!
//! # tokio_test_block(async {
//! let tenant = TenantId::from("acme");
//! let admin = ActorId::from("ada");
//! let store = Arc::new(MemoryStore::new());
//! store.grant_admin(&tenant, admin.clone());
//! store.upsert_items([
//!     WorkItem::new(tenant.clone(), "p1".into(), Product).with_children(["e1", "s1"]),
//!     WorkItem::new(tenant.clone(), "e1".into(), Epic).with_parent("p1"),
//!     WorkItem::new(tenant.clone(), "s1".into(), Story).with_parent("p1"),
//! ]);
//!
//! let service = MigrationService::in_memory(store, MigratorConfig::default());
//! let preset = serde_json::json!({
//!     "enabledTypes": ["product", "epic", "story"],
//!     "hierarchy": { "product": ["epic"], "epic": ["story"] }
//! });
//!
//! let outcome = service
//!     .migrate(&tenant, "scaled", JobMode::Apply, &preset, &admin)
//!     .await
//!     .unwrap();
//! assert_eq!(outcome.summary.moved_items, 1);
//!
//! let undone = service.rollback(&tenant, outcome.job_id, &admin).await.unwrap();
//! assert_eq!(undone.restored_moves, 1);
//! # });
//! # fn tokio_test_block(f: impl std::future::Future<Output = ()>) {
//! #     tokio::runtime::Runtime::new().unwrap().block_on(f)
//! # }
//! ```

#![allow(missing_docs)]

pub mod config;
pub mod error;
pub mod job;
pub mod memory;
pub mod orchestrator;
pub mod rollback;
pub mod service;
pub mod state_machine;
pub mod store;

pub use config::{ConfigError, MigratorConfig};
pub use error::{ErrorKind, IllegalTransition, MigrationError, PreconditionError, StoreError};
pub use job::{
    AppliedMove, JobMode, JobProgress, JobStatus, JobSummary, MigrationJob, MigrationOutcome,
    MigrationReport, MoveRecord, RollbackOutcome,
};
pub use memory::{MemoryStore, StoreSnapshot, TenantRecord};
pub use orchestrator::{MigrationOrchestrator, MigrationRequest};
pub use rollback::RollbackExecutor;
pub use service::MigrationService;
pub use store::{
    AccessPolicy, ItemTransaction, JobStore, TenantDirectory, TransactionFn, WorkItemRepository,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for driving migrations
    pub use crate::{
        JobMode, JobStatus, MemoryStore, MigrationError, MigrationService, MigratorConfig,
    };
    pub use hier_model::{ActorId, JobId, TenantId};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
