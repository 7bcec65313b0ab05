//! Error types for storage backend operations.

/// Errors that can occur while talking to a storage node.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The bucket does not exist on this node.
    #[error("no such bucket: {bucket}")]
    NoSuchBucket {
        /// Bucket name.
        bucket: String,
    },

    /// The object does not exist in the bucket.
    #[error("no such key: {bucket}/{key}")]
    NoSuchKey {
        /// Bucket name.
        bucket: String,
        /// Object key.
        key: String,
    },

    /// The node refused the request.
    #[error("access denied: {message}")]
    AccessDenied {
        /// Message reported by the node.
        message: String,
    },

    /// Bucket creation raced with another creator.
    #[error("bucket already exists: {bucket}")]
    BucketAlreadyOwned {
        /// Bucket name.
        bucket: String,
    },

    /// Any other error response from the node.
    #[error("backend error {status} {code}: {message}")]
    Backend {
        /// HTTP status returned by the node.
        status: u16,
        /// Error code (S3 `<Code>`), or the status reason when absent.
        code: String,
        /// Error message (S3 `<Message>`).
        message: String,
    },

    /// Connection-level failure talking to the node.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// An I/O error occurred.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The node answered with something we could not interpret.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The upload body did not match its declared length.
    #[error("body length mismatch: declared {expected} bytes, received {actual}")]
    LengthMismatch {
        /// Declared length.
        expected: u64,
        /// Bytes actually received.
        actual: u64,
    },
}

impl StoreError {
    /// S3-style error code for this error.
    pub fn code(&self) -> &str {
        match self {
            Self::NoSuchBucket { .. } => "NoSuchBucket",
            Self::NoSuchKey { .. } => "NoSuchKey",
            Self::AccessDenied { .. } => "AccessDenied",
            Self::BucketAlreadyOwned { .. } => "BucketAlreadyOwnedByYou",
            Self::Backend { code, .. } => code,
            Self::Transport(_) | Self::Io(_) => "InternalError",
            Self::InvalidResponse(_) => "InvalidResponse",
            Self::LengthMismatch { .. } => "IncompleteBody",
        }
    }

    /// Whether this error means the object does not exist.
    pub fn is_object_not_found(&self) -> bool {
        matches!(self.code(), "NoSuchKey" | "NotFoundObject")
    }

    /// Whether this error means the node denied access.
    pub fn is_access_denied(&self) -> bool {
        self.code() == "AccessDenied"
    }
}
