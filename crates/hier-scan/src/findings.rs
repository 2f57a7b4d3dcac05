//! Scan findings
//!
//! Findings are advisory data. Nothing here is an error in the Rust sense;
//! a scan never fails.

use hier_model::{WorkItemId, WorkItemType};
use serde::{Deserialize, Serialize};

/// Issue severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    /// Informational, never blocks
    Warn,
    /// Structural violation of the target hierarchy
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(match self {
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
        })
    }
}

/// Issue classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueCode {
    /// Item type is not enabled by the preset
    DisabledType,
    /// Parent is missing or may not contain this item's type
    InvalidParent,
}

/// Typed, severity-tagged diagnostic for one item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub item_id: WorkItemId,
    pub item_type: WorkItemType,
    pub code: IssueCode,
    pub severity: Severity,
    pub parent_id: Option<WorkItemId>,
    pub message: String,
}

impl Issue {
    pub(crate) fn disabled_type(item_id: &WorkItemId, item_type: WorkItemType) -> Self {
        Self {
            item_id: item_id.clone(),
            item_type,
            code: IssueCode::DisabledType,
            severity: Severity::Warn,
            parent_id: None,
            message: format!("type '{item_type}' is not enabled in the target preset"),
        }
    }

    pub(crate) fn missing_parent(
        item_id: &WorkItemId,
        item_type: WorkItemType,
        parent_id: &WorkItemId,
    ) -> Self {
        Self {
            item_id: item_id.clone(),
            item_type,
            code: IssueCode::InvalidParent,
            severity: Severity::Error,
            parent_id: Some(parent_id.clone()),
            message: format!("parent '{parent_id}' does not exist"),
        }
    }

    pub(crate) fn illegal_parent(
        item_id: &WorkItemId,
        item_type: WorkItemType,
        parent_id: &WorkItemId,
        parent_type: WorkItemType,
    ) -> Self {
        Self {
            item_id: item_id.clone(),
            item_type,
            code: IssueCode::InvalidParent,
            severity: Severity::Error,
            parent_id: Some(parent_id.clone()),
            message: format!("'{parent_type}' cannot contain '{item_type}'"),
        }
    }
}

/// Why an item needs a human decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewReason {
    /// `parent_id` points at an item that is not in the snapshot
    MissingParent,
    /// No item can legally contain this one
    NoCandidateParents,
    /// More than one item could contain this one
    AmbiguousCandidates,
}

impl ReviewReason {
    /// Human-readable reason
    #[must_use]
    pub fn describe(self) -> &'static str {
        match self {
            ReviewReason::MissingParent => "missing parent",
            ReviewReason::NoCandidateParents => "no candidate new parents",
            ReviewReason::AmbiguousCandidates => "multiple candidate new parents",
        }
    }

    /// Suggested manual action
    #[must_use]
    pub fn suggested_action(self) -> &'static str {
        match self {
            ReviewReason::MissingParent => "restore the parent or reparent the item manually",
            ReviewReason::NoCandidateParents => {
                "enable or create a legal parent type, then reparent the item manually"
            }
            ReviewReason::AmbiguousCandidates => "choose one of the candidate parents",
        }
    }
}

/// Item the scanner could not resolve on its own
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewEntry {
    pub item_id: WorkItemId,
    pub item_type: WorkItemType,
    pub current_parent_id: Option<WorkItemId>,
    pub reason: ReviewReason,
    /// Legal parents tenant-wide
    pub candidate_count: usize,
    /// Legal parents sharing the item's product ancestor
    pub scoped_candidate_count: usize,
    /// Candidates at the scope that proved ambiguous, snapshot order
    pub candidates: Vec<WorkItemId>,
    pub suggested_action: String,
}

/// Certainty that an automatically chosen parent is correct
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Confidence {
    /// Unique within the item's product subtree; applied automatically
    High,
    /// Unique tenant-wide only; reported, never applied
    Low,
}

/// Proposed reparent of one item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendedMove {
    pub item_id: WorkItemId,
    pub from_parent_id: Option<WorkItemId>,
    pub to_parent_id: WorkItemId,
    pub confidence: Confidence,
}

/// Output of one scan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub issues: Vec<Issue>,
    pub review_queue: Vec<ReviewEntry>,
    pub recommended_moves: Vec<RecommendedMove>,
}

impl ScanResult {
    /// Number of ERROR-severity issues
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .count()
    }

    /// Moves safe to apply without a human
    pub fn high_confidence_moves(&self) -> impl Iterator<Item = &RecommendedMove> {
        self.recommended_moves
            .iter()
            .filter(|m| m.confidence == Confidence::High)
    }

    /// Moves reported for information only
    pub fn low_confidence_moves(&self) -> impl Iterator<Item = &RecommendedMove> {
        self.recommended_moves
            .iter()
            .filter(|m| m.confidence == Confidence::Low)
    }

    /// True when the snapshot already satisfies the preset structurally
    #[inline]
    #[must_use]
    pub fn is_compliant(&self) -> bool {
        self.error_count() == 0
    }
}
