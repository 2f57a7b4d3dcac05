//! Closed work-item type enumeration

use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of a work item
///
/// The ordering is the conventional top-down nesting and is used wherever a
/// deterministic iteration order over types is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkItemType {
    /// Top-level organization
    Company,
    /// Product line; the default anchor for candidate-parent scoping
    Product,
    /// Large body of work
    Epic,
    /// Deliverable capability
    Feature,
    /// User-facing increment
    Story,
    /// Unit of work
    Task,
    /// Defect
    Bug,
}

impl WorkItemType {
    /// Every type, in declaration order
    pub const ALL: [WorkItemType; 7] = [
        WorkItemType::Company,
        WorkItemType::Product,
        WorkItemType::Epic,
        WorkItemType::Feature,
        WorkItemType::Story,
        WorkItemType::Task,
        WorkItemType::Bug,
    ];

    /// Wire name
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            WorkItemType::Company => "company",
            WorkItemType::Product => "product",
            WorkItemType::Epic => "epic",
            WorkItemType::Feature => "feature",
            WorkItemType::Story => "story",
            WorkItemType::Task => "task",
            WorkItemType::Bug => "bug",
        }
    }
}

impl fmt::Display for WorkItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkItemType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        WorkItemType::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| ModelError::UnknownType(s.to_string()))
    }
}
