//! Work items
//!
//! `parent_id` is the source of truth for ancestry. `children_ids` is an
//! ordered index kept in sync by writers; it is a set, so re-adding a child
//! that is already listed never duplicates it.

use crate::ids::{TenantId, WorkItemId};
use crate::item_type::WorkItemType;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// A node in a tenant's organizational tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkItem {
    /// Item id
    pub id: WorkItemId,
    /// Owning tenant
    pub tenant_id: TenantId,
    /// Item kind
    #[serde(rename = "type")]
    pub item_type: WorkItemType,
    /// Parent item, same tenant
    #[serde(default)]
    pub parent_id: Option<WorkItemId>,
    /// Ordered child index
    #[serde(default)]
    pub children_ids: IndexSet<WorkItemId>,
}

impl WorkItem {
    /// Create a root item with no children
    #[inline]
    #[must_use]
    pub fn new(tenant_id: TenantId, id: WorkItemId, item_type: WorkItemType) -> Self {
        Self {
            id,
            tenant_id,
            item_type,
            parent_id: None,
            children_ids: IndexSet::new(),
        }
    }

    /// With parent
    #[inline]
    #[must_use]
    pub fn with_parent(mut self, parent_id: impl Into<WorkItemId>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// With children, in order
    #[inline]
    #[must_use]
    pub fn with_children<I, C>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<WorkItemId>,
    {
        self.children_ids = children.into_iter().map(Into::into).collect();
        self
    }

    /// Append a child id; returns false if it was already listed
    #[inline]
    pub fn add_child(&mut self, child: WorkItemId) -> bool {
        self.children_ids.insert(child)
    }

    /// Insert a child id at `position` (clamped to the end of the list).
    ///
    /// Returns false, leaving the order untouched, if it was already listed.
    pub fn insert_child_at(&mut self, position: usize, child: WorkItemId) -> bool {
        if self.children_ids.contains(&child) {
            return false;
        }
        let position = position.min(self.children_ids.len());
        self.children_ids.shift_insert(position, child)
    }

    /// Remove a child id, preserving the order of the rest.
    ///
    /// Returns the position it held.
    #[inline]
    pub fn remove_child(&mut self, child: &WorkItemId) -> Option<usize> {
        self.children_ids
            .shift_remove_full(child)
            .map(|(position, _)| position)
    }

    /// Check whether `child` is listed
    #[inline]
    #[must_use]
    pub fn has_child(&self, child: &WorkItemId) -> bool {
        self.children_ids.contains(child)
    }
}
