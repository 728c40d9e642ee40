use thiserror::Error;

#[derive(Debug, Error)]
pub enum MinixError {
    #[error("Invalid filesystem format: {0}")]
    Format(String),

    #[error("No such file or directory: {0}")]
    NotFound(String),

    #[error("Is a directory: {0}")]
    IsADirectory(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("I/O operation on closed file")]
    ClosedHandle,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl MinixError {
    /// True for the failures that mean "nothing usable lives at this path"
    /// rather than "the image or the backing source is broken".
    pub fn is_lookup_failure(&self) -> bool {
        matches!(
            self,
            MinixError::NotFound(_) | MinixError::NotADirectory(_) | MinixError::NotSupported(_)
        )
    }
}
