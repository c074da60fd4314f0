use dealflow_core::error::CoreError;

/// Error returned by workflow operations.
///
/// Domain failures carry a [`CoreError`]; anything the store rejected is a
/// persistence failure and is surfaced generically at the HTTP boundary.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Persistence failure: {0}")]
    Persistence(#[from] sqlx::Error),
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

impl WorkflowError {
    /// The domain error, if this is one.
    pub fn as_core(&self) -> Option<&CoreError> {
        match self {
            WorkflowError::Core(core) => Some(core),
            WorkflowError::Persistence(_) => None,
        }
    }
}
