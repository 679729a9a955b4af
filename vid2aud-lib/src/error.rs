use thiserror::Error;

/// Main error type for the conversion library
#[derive(Error, Debug)]
pub enum ConvertError {
    /// Malformed caller input: missing file, disallowed media type, oversize
    /// payload, or an out-of-range numeric parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The requested target format token is not in the catalog
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// The source container could not be parsed or contains no audio stream
    #[error("Unreadable source: {0}")]
    UnreadableSource(String),

    /// The encoding backend rejected a frame or failed to finalize the output
    #[error("Encode failure: {0}")]
    EncodeFailure(String),

    /// Catch-all for I/O errors during staging, decode, or encode that are
    /// not classified more specifically
    #[error("Conversion failed: {0}")]
    Conversion(String),

    /// A standard I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Anything unanticipated; callers receive a deliberately generic message
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConvertError {
    /// Validation-class errors are detected before any resource is opened and
    /// must never be wrapped as a conversion failure.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ConvertError::InvalidInput(_) | ConvertError::UnsupportedFormat(_)
        )
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, ConvertError>;
