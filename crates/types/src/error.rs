//! Error kinds crossing the core service boundary.

/// Service-wide error type.
///
/// `Clone` so that a failed batch can deliver the first error to every
/// queued promise.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The authorization oracle denied the request.
    #[error("not authorized")]
    NotAuthorized,

    /// Malformed name, missing required field, or wrong object kind.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Requested tree size is out of range for the object.
    #[error("invalid tree range")]
    InvalidTreeRange,

    /// Entry, key or object absent.
    #[error("not found")]
    NotFound,

    /// `MapUpdate` precondition failed: the current leaf does not match
    /// the supplied previous leaf hash.
    #[error("conflicting previous leaf")]
    ConflictingPreviousLeaf,

    /// Create on a name that exists (or existed) within the account.
    #[error("object already exists")]
    AlreadyExists,

    /// The caller's request was abandoned before completion.
    #[error("cancelled")]
    Cancelled,

    /// Substrate failure; the caller may retry.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Invariant violation in persisted state. Non-retryable; operators
    /// should treat this as an integrity failure.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;
