//! Per-scan item index
//!
//! Built once per scan so parent resolution, anchor lookup and candidate
//! enumeration are map lookups instead of repeated passes over the snapshot.
//! Positions refer to the snapshot slice; every list is kept in snapshot
//! order so scan output stays deterministic.

use hier_model::{WorkItem, WorkItemId, WorkItemType};
use std::collections::{BTreeMap, HashMap};

/// Lookup structure over one snapshot
#[derive(Debug)]
pub struct ItemIndex<'a> {
    items: &'a [WorkItem],
    /// id -> position; first occurrence wins
    by_id: HashMap<&'a WorkItemId, usize>,
    /// position -> position of nearest anchor-typed ancestor (inclusive)
    anchors: Vec<Option<usize>>,
    /// type -> positions
    by_type: BTreeMap<WorkItemType, Vec<usize>>,
    /// (type, anchor position) -> positions
    by_type_and_anchor: HashMap<(WorkItemType, Option<usize>), Vec<usize>>,
}

impl<'a> ItemIndex<'a> {
    /// Index a snapshot, resolving anchors of type `anchor`
    #[must_use]
    pub fn build(items: &'a [WorkItem], anchor: WorkItemType) -> Self {
        let mut by_id = HashMap::with_capacity(items.len());
        let mut by_type: BTreeMap<WorkItemType, Vec<usize>> = BTreeMap::new();
        for (pos, item) in items.iter().enumerate() {
            by_id.entry(&item.id).or_insert(pos);
            by_type.entry(item.item_type).or_default().push(pos);
        }

        let mut index = Self {
            items,
            by_id,
            anchors: Vec::new(),
            by_type,
            by_type_and_anchor: HashMap::new(),
        };

        index.anchors = index.resolve_anchors(anchor);
        for (pos, item) in items.iter().enumerate() {
            index
                .by_type_and_anchor
                .entry((item.item_type, index.anchors[pos]))
                .or_default()
                .push(pos);
        }
        index
    }

    /// Item at a snapshot position
    #[inline]
    #[must_use]
    pub fn item(&self, pos: usize) -> &'a WorkItem {
        &self.items[pos]
    }

    /// Position of an item id
    #[inline]
    #[must_use]
    pub fn position(&self, id: &WorkItemId) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    /// Position of the item's parent, if set and present in the snapshot
    #[inline]
    #[must_use]
    pub fn parent_of(&self, pos: usize) -> Option<usize> {
        self.items[pos]
            .parent_id
            .as_ref()
            .and_then(|id| self.position(id))
    }

    /// Nearest anchor-typed ancestor, counting the item itself
    #[inline]
    #[must_use]
    pub fn anchor_of(&self, pos: usize) -> Option<usize> {
        self.anchors[pos]
    }

    /// Positions of every item of `item_type`
    #[must_use]
    pub fn of_type(&self, item_type: WorkItemType) -> &[usize] {
        self.by_type.get(&item_type).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Positions of items of `item_type` sharing the anchor `anchor`
    #[must_use]
    pub fn of_type_under(&self, item_type: WorkItemType, anchor: Option<usize>) -> &[usize] {
        self.by_type_and_anchor
            .get(&(item_type, anchor))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of indexed items
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True for an empty snapshot
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Walk every parent chain once, memoising results along the way.
    ///
    /// A chain that loops back on itself without reaching an anchor resolves
    /// to no anchor.
    fn resolve_anchors(&self, anchor: WorkItemType) -> Vec<Option<usize>> {
        let mut memo: Vec<Option<Option<usize>>> = vec![None; self.items.len()];
        let mut path = Vec::new();

        for start in 0..self.items.len() {
            if memo[start].is_some() {
                continue;
            }
            path.clear();
            let mut cursor = Some(start);
            let resolved = loop {
                let Some(pos) = cursor else { break None };
                if let Some(known) = memo[pos] {
                    break known;
                }
                if self.items[pos].item_type == anchor {
                    memo[pos] = Some(Some(pos));
                    break Some(pos);
                }
                if path.contains(&pos) {
                    break None;
                }
                path.push(pos);
                cursor = self.parent_of(pos);
            };
            for &pos in &path {
                memo[pos] = Some(resolved);
            }
        }

        memo.into_iter().map(Option::flatten).collect()
    }
}
