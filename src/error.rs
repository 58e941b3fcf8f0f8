use std::time::Duration;
use thiserror::Error;

/// Why an authenticated operation was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    /// The caller does not own the resource.
    Forbidden,
    InvalidToken,
    Expired,
    /// A revoked refresh token was presented again. Every session of the
    /// owning user has been revoked by the time this is returned.
    ReuseDetected,
    UserInactive,
}

impl std::fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            AuthFailure::Forbidden => "caller does not own this resource",
            AuthFailure::InvalidToken => "invalid token",
            AuthFailure::Expired => "token expired",
            AuthFailure::ReuseDetected => "refresh token reuse detected",
            AuthFailure::UserInactive => "user not allowed",
        };
        f.write_str(msg)
    }
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(&'static str),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Auth error: {0}")]
    Auth(AuthFailure),
    #[error("Signature error: invalid {0} signature")]
    Signature(&'static str),
    #[error("Store call timed out after {0:?}")]
    Timeout(Duration),
    #[error("Serializable transaction aborted, retry the operation")]
    SerializationFailure,
    #[error("Internal error: {0}")]
    InternalError(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl EngineError {
    /// Storage outcomes that say nothing about the request itself. A caller
    /// may run the whole operation again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::Timeout(_) | EngineError::SerializationFailure
        )
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        EngineError::InternalError(Box::new(std::io::Error::other(msg.into())))
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::InternalError(Box::new(err))
    }
}

impl From<csv::Error> for EngineError {
    fn from(err: csv::Error) -> Self {
        EngineError::InternalError(Box::new(err))
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::InternalError(Box::new(err))
    }
}

impl From<jsonwebtoken::errors::Error> for EngineError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        EngineError::InternalError(Box::new(err))
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for EngineError {
    fn from(err: rocksdb::Error) -> Self {
        if matches!(err.kind(), rocksdb::ErrorKind::Busy | rocksdb::ErrorKind::TryAgain) {
            EngineError::SerializationFailure
        } else {
            EngineError::InternalError(Box::new(err))
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
