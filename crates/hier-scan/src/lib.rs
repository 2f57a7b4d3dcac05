//! Hierarchy compatibility scanner
//!
//! Classifies every item of a tenant snapshot against a target preset:
//! - **compliant**: nothing reported
//! - **fixable**: an ERROR issue plus a [`RecommendedMove`] tagged HIGH or LOW
//! - **ambiguous**: an ERROR issue plus a [`ReviewEntry`] for a human
//!
//! Scanning is pure. The same snapshot and preset always produce the same
//! [`ScanResult`], in snapshot order.
//!
//! # Example
//!
//! ```rust
//! use hier_model::{Preset, TenantId, WorkItem, WorkItemId, WorkItemType::*};
//! use hier_scan::scan;
//!
//! let tenant = TenantId::from("acme");
//! let items = vec![
//!     WorkItem::new(tenant.clone(), WorkItemId::from("p1"), Product),
//!     WorkItem::new(tenant.clone(), WorkItemId::from("e1"), Epic).with_parent("p1"),
//!     WorkItem::new(tenant.clone(), WorkItemId::from("f1"), Feature).with_parent("e1"),
//! ];
//! let preset = Preset::new([Product, Epic, Story], [(Product, [Epic]), (Epic, [Story])]);
//!
//! let result = scan(&items, &preset);
//! assert_eq!(result.error_count(), 1);
//! assert_eq!(result.review_queue.len(), 1);
//! assert!(result.recommended_moves.is_empty());
//! ```

#![allow(missing_docs)]

pub mod findings;
pub mod index;
pub mod scanner;

pub use findings::{
    Confidence, Issue, IssueCode, RecommendedMove, ReviewEntry, ReviewReason, ScanResult, Severity,
};
pub use index::ItemIndex;
pub use scanner::{scan, CompatibilityScanner};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
