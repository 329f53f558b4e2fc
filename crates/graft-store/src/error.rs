/// Errors reported by storage adapters.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend could not be reached or refused the operation.
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),

    /// I/O error from the underlying backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backend is read-only.
    #[error("store is read-only")]
    ReadOnly,
}

/// Result alias for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;
