use crate::storage::PathError;
use uuid::Uuid;

/// Failures raised by a tree store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("document {0} not found")]
    NotFound(Uuid),
    #[error("access grant {0} not found")]
    GrantNotFound(Uuid),
    #[error("cannot move document {id} below itself (target {target})")]
    InvalidMove { id: Uuid, target: Uuid },
    #[error("inconsistent tree: {0}")]
    Inconsistent(String),
    #[error(transparent)]
    Path(#[from] PathError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Failures of an access-checked operation.
#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    #[error("authentication credentials were not provided")]
    Unauthenticated,
    #[error("you do not have permission to perform this action")]
    Forbidden,
    #[error("not found")]
    NotFound,
    #[error("cannot move a document into its own subtree")]
    InvalidMove,
    #[error("invalid pagination cursor")]
    InvalidCursor,
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for AccessError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) | StoreError::GrantNotFound(_) => AccessError::NotFound,
            StoreError::InvalidMove { .. } => AccessError::InvalidMove,
            other => AccessError::Store(other),
        }
    }
}
