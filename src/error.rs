use thiserror::Error;

/// Library error type for gallery operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The configured photo directory is missing or not a directory.
    #[error("invalid photo directory: {0}")]
    BadDir(String),

    /// Underlying IO error while listing or stating entries.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A metadata task panicked or was aborted before joining.
    #[error("scan task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Self {
        Self::Io(err.into())
    }
}
