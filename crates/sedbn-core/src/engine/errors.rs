//! Error types for model construction and inference.

use thiserror::Error;

/// Errors that can occur while building a model, validating a query, or
/// running inference.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// without breaking changes.
///
/// Construction errors (`Structure`, `Config`) are fatal for the model in
/// question: no [`Model`](crate::engine::model::Model) value exists to query.
/// Every other variant is scoped to a single query and leaves the model and
/// other queries untouched.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BnError {
    /// Malformed model: cycle, missing or duplicate CPT, dangling parent,
    /// non-normalized distribution.
    #[error("structure error: {0}")]
    Structure(String),

    /// A query or evidence entry names a variable the model does not have.
    #[error("unknown variable '{0}'")]
    UnknownVariable(String),

    /// An evidence entry names a state its variable does not have.
    #[error("invalid state '{state}' for variable '{variable}'")]
    InvalidState { variable: String, state: String },

    /// Query shape is invalid (empty, duplicated, or overlapping with evidence).
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Evidence has zero joint probability under the model.
    #[error("inconsistent evidence: {0}")]
    InconsistentEvidence(String),

    /// An intermediate factor would exceed the configured cell budget.
    #[error("model too large: factor of {cells} cells exceeds limit of {limit}")]
    ModelTooLarge { cells: u128, limit: usize },

    /// Two scenarios in one batch share a name.
    #[error("duplicate scenario '{0}'")]
    DuplicateScenario(String),

    /// A model or scenario definition file could not be read or parsed.
    #[error("config error: {0}")]
    Config(String),

    /// An external feature value could not be mapped to a variable state.
    #[error("feature error: {0}")]
    Feature(String),

    /// Internal engine error (programmer error, not user error).
    #[error("internal error: {0}")]
    Internal(String),
}

impl BnError {
    /// Stable lowercase category name, used for structured logging and the
    /// machine-readable CLI output.
    pub fn kind(&self) -> &'static str {
        match self {
            BnError::Structure(_) => "structure",
            BnError::UnknownVariable(_) => "unknown_variable",
            BnError::InvalidState { .. } => "invalid_state",
            BnError::InvalidQuery(_) => "invalid_query",
            BnError::InconsistentEvidence(_) => "inconsistent_evidence",
            BnError::ModelTooLarge { .. } => "model_too_large",
            BnError::DuplicateScenario(_) => "duplicate_scenario",
            BnError::Config(_) => "config",
            BnError::Feature(_) => "feature",
            BnError::Internal(_) => "internal",
        }
    }

    /// True for errors caused by the shape of a single request rather than the
    /// model itself.
    pub fn is_query_error(&self) -> bool {
        matches!(
            self,
            BnError::UnknownVariable(_)
                | BnError::InvalidState { .. }
                | BnError::InvalidQuery(_)
                | BnError::Feature(_)
        )
    }
}
