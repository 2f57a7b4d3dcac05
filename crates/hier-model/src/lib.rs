//! Hierarchy model
//!
//! Typed building blocks shared by the scanner and the migration engine:
//! - **WorkItemType**: the closed set of work-item kinds
//! - **WorkItem**: a node in a tenant's organizational tree
//! - **Preset**: enabled types plus the legal parent -> child pairings
//! - **PresetPayload**: the loosely-typed wire form, converted at the boundary
//!
//! # Example
//!
//! ```rust
//! use hier_model::{Preset, WorkItemType};
//!
//! let preset = Preset::from_json(&serde_json::json!({
//!     "enabledTypes": ["product", "epic", "story"],
//!     "hierarchy": { "product": ["epic"], "epic": ["story"] }
//! }))
//! .unwrap();
//!
//! assert!(preset.allows(WorkItemType::Epic, WorkItemType::Story));
//! assert!(!preset.allows(WorkItemType::Product, WorkItemType::Story));
//! ```

pub mod error;
pub mod ids;
pub mod item_type;
pub mod preset;
pub mod work_item;

pub use error::ModelError;
pub use ids::{ActorId, JobId, TenantId, WorkItemId};
pub use item_type::WorkItemType;
pub use preset::{Preset, PresetPayload};
pub use work_item::WorkItem;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with work-item trees
    pub use crate::{
        ActorId, JobId, ModelError, Preset, PresetPayload, TenantId, WorkItem, WorkItemId,
        WorkItemType,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
