//! Error types for the hierarchy model

/// Errors raised while converting caller input into model types
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// Type name outside the closed work-item enumeration
    #[error("unknown work item type: {0}")]
    UnknownType(String),

    /// Preset payload has the wrong shape or content
    #[error("malformed preset: {0}")]
    MalformedPreset(String),

    /// Required field is missing or blank
    #[error("missing required field: {0}")]
    EmptyField(&'static str),
}

impl ModelError {
    /// Create malformed preset error
    #[inline]
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedPreset(reason.into())
    }
}
