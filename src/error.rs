use thiserror::Error;

/// Rejected request parameters. Never coerced into a valid request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("window must be between 1 and {max} days, got {got}")]
    InvalidWindow { got: i64, max: usize },
    #[error("malformed date '{0}', expected YYYY-MM-DD")]
    MalformedDate(String),
    #[error("unknown user '{0}'")]
    UnknownUser(String),
    #[error("invalid query parameters: {0}")]
    InvalidQuery(String),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Input(#[from] InputError),
    /// The record store could not be reached at all
    #[error("record store unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
