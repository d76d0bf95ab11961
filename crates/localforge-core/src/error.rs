//! Error types for localforge.

use thiserror::Error;

/// Main error type for search operations.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The neighborhood contains no moves from the given state.
    #[error("the neighborhood is empty")]
    EmptyNeighborhood,

    /// A required parameter was not provided.
    #[error("parameter `{0}` was not set")]
    ParameterNotSet(String),

    /// A parameter failed its validator.
    #[error("parameter `{name}` has an incorrect value: {reason}")]
    IncorrectParameterValue { name: String, reason: String },

    /// An optional user operation required by the selected algorithm was
    /// not supplied.
    #[error("operation `{0}` is not implemented")]
    NotImplemented(&'static str),

    /// The search was cancelled cooperatively; the best state found so far
    /// remains valid.
    #[error("the search was cancelled")]
    Cancelled,

    /// The search hit its deadline; the best state found so far remains
    /// valid.
    #[error("the search timed out")]
    TimedOut,

    /// A state failed its consistency check.
    #[error("inconsistent state: {0}")]
    Inconsistent(String),
}

impl SearchError {
    /// Convenience constructor for [`SearchError::IncorrectParameterValue`].
    pub fn incorrect_parameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        SearchError::IncorrectParameterValue {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for search operations.
pub type Result<T> = std::result::Result<T, SearchError>;
