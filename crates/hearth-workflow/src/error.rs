use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Bad input, caught before any write.
    #[error("{0}")]
    Validation(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("not found: {0}")]
    NotFound(String),
    /// The document is not in a state that allows this transition.
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("there are no payment proofs to approve")]
    NoProofs,
    #[error("username is already taken")]
    UsernameTaken,
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl WorkflowError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Stable machine-readable code, used in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::InvalidState(_) => "invalid_state",
            Self::NoProofs => "no_proofs",
            Self::UsernameTaken => "username_taken",
            Self::Store(_) => "internal",
        }
    }
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;
