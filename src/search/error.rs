use thiserror::Error;

/// The index collaborator could not serve a request.
#[derive(Debug, Error)]
pub enum SearchServiceError {
    #[error("index error: {0}")]
    Index(#[from] tantivy::TantivyError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("index reset is not allowed for this instance")]
    ResetNotAllowed,
    #[error("stored document is corrupt: {0}")]
    Corrupt(String),
}

/// Failure of a whole search call. Empty results are never an error.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error(transparent)]
    Service(#[from] SearchServiceError),
    /// The store collaborator failed while reconstructing a hit.
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}
