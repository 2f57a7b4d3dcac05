//! Compatibility scanner
//!
//! Per item:
//! 1. a type outside `enabled_types` yields a WARN issue and nothing else
//! 2. a dangling `parent_id` yields an ERROR issue and a review entry
//! 3. a parent that may not contain the item yields an ERROR issue, then a
//!    replacement parent is searched for:
//!    - unique legal parent sharing the item's anchor ancestor: HIGH move
//!    - otherwise, unique legal parent tenant-wide: LOW move
//!    - otherwise: review entry with the candidate counts

use crate::findings::{Confidence, Issue, RecommendedMove, ReviewEntry, ReviewReason, ScanResult};
use crate::index::ItemIndex;
use hier_model::{Preset, WorkItem, WorkItemId, WorkItemType};

/// Scan a snapshot against a preset, anchoring on `product`
#[must_use]
pub fn scan(items: &[WorkItem], preset: &Preset) -> ScanResult {
    CompatibilityScanner::new().scan(items, preset)
}

/// Stateless scanner; holds only the anchor type used to scope candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompatibilityScanner {
    anchor: WorkItemType,
}

impl CompatibilityScanner {
    /// Create scanner anchored on `product`
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            anchor: WorkItemType::Product,
        }
    }

    /// With a different anchor type
    #[inline]
    #[must_use]
    pub fn with_anchor(mut self, anchor: WorkItemType) -> Self {
        self.anchor = anchor;
        self
    }

    /// Anchor type
    #[inline]
    #[must_use]
    pub fn anchor(&self) -> WorkItemType {
        self.anchor
    }

    /// Classify every item of `items` against `preset`
    #[must_use]
    pub fn scan(&self, items: &[WorkItem], preset: &Preset) -> ScanResult {
        let index = ItemIndex::build(items, self.anchor);
        let mut result = ScanResult::default();

        for pos in 0..index.len() {
            let item = index.item(pos);

            if !preset.is_enabled(item.item_type) {
                result
                    .issues
                    .push(Issue::disabled_type(&item.id, item.item_type));
            }

            let Some(parent_id) = &item.parent_id else {
                continue;
            };

            let Some(parent_pos) = index.position(parent_id) else {
                result
                    .issues
                    .push(Issue::missing_parent(&item.id, item.item_type, parent_id));
                result
                    .review_queue
                    .push(review_entry(item, ReviewReason::MissingParent, 0, 0, Vec::new()));
                continue;
            };

            let parent = index.item(parent_pos);
            if preset.allows(parent.item_type, item.item_type) {
                continue;
            }

            result.issues.push(Issue::illegal_parent(
                &item.id,
                item.item_type,
                parent_id,
                parent.item_type,
            ));
            self.resolve(&index, pos, preset, &mut result);
        }

        tracing::debug!(
            items = items.len(),
            issues = result.issues.len(),
            review = result.review_queue.len(),
            moves = result.recommended_moves.len(),
            "scan finished"
        );

        result
    }

    /// Look for a replacement parent for the item at `pos`
    fn resolve(&self, index: &ItemIndex<'_>, pos: usize, preset: &Preset, result: &mut ScanResult) {
        let item = index.item(pos);
        let parent_types: Vec<WorkItemType> = preset
            .parent_types_for(item.item_type)
            .into_iter()
            .filter(|t| preset.is_enabled(*t))
            .collect();

        let eligible = |candidate: &usize| {
            *candidate != pos && index.item(*candidate).tenant_id == item.tenant_id
        };

        let mut tenant_wide: Vec<usize> = parent_types
            .iter()
            .flat_map(|t| index.of_type(*t))
            .copied()
            .filter(eligible)
            .collect();
        tenant_wide.sort_unstable();

        let anchor = index.anchor_of(pos);
        let mut scoped: Vec<usize> = parent_types
            .iter()
            .flat_map(|t| index.of_type_under(*t, anchor))
            .copied()
            .filter(eligible)
            .collect();
        scoped.sort_unstable();

        let chosen = match (scoped.as_slice(), tenant_wide.as_slice()) {
            ([only], _) => Some((*only, Confidence::High)),
            (_, [only]) => Some((*only, Confidence::Low)),
            _ => None,
        };

        if let Some((target, confidence)) = chosen {
            result.recommended_moves.push(RecommendedMove {
                item_id: item.id.clone(),
                from_parent_id: item.parent_id.clone(),
                to_parent_id: index.item(target).id.clone(),
                confidence,
            });
            return;
        }

        let (reason, shown) = if tenant_wide.is_empty() {
            (ReviewReason::NoCandidateParents, Vec::new())
        } else if scoped.len() > 1 {
            (ReviewReason::AmbiguousCandidates, scoped.clone())
        } else {
            (ReviewReason::AmbiguousCandidates, tenant_wide.clone())
        };
        let candidates = shown
            .into_iter()
            .map(|c| index.item(c).id.clone())
            .collect();

        result.review_queue.push(review_entry(
            item,
            reason,
            tenant_wide.len(),
            scoped.len(),
            candidates,
        ));
    }
}

impl Default for CompatibilityScanner {
    fn default() -> Self {
        Self::new()
    }
}

fn review_entry(
    item: &WorkItem,
    reason: ReviewReason,
    candidate_count: usize,
    scoped_candidate_count: usize,
    candidates: Vec<WorkItemId>,
) -> ReviewEntry {
    ReviewEntry {
        item_id: item.id.clone(),
        item_type: item.item_type,
        current_parent_id: item.parent_id.clone(),
        reason,
        candidate_count,
        scoped_candidate_count,
        candidates,
        suggested_action: reason.suggested_action().to_string(),
    }
}
