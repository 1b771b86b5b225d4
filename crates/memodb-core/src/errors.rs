use crate::args::ArgError;
use thiserror::Error;

/// Boxed source error carried across the storage and codec boundaries.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by the cache layer itself.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("no database connection configured")]
    MissingConnection,

    #[error("failed to connect to {target}: {source}")]
    Connection {
        target: String,
        #[source]
        source: BoxError,
    },

    #[error("invalid connection target: {0}")]
    InvalidTarget(String),

    #[error("storage operation failed: {0}")]
    Storage(#[source] BoxError),

    #[error("codec error: {0}")]
    Codec(#[source] BoxError),

    #[error("invalid call arguments: {0}")]
    Arguments(#[from] ArgError),

    #[error("invalid namespace name: {0:?}")]
    InvalidNamespace(String),

    #[error("cache state lock poisoned")]
    LockPoisoned,
}

impl CacheError {
    pub fn storage(err: impl Into<BoxError>) -> Self {
        CacheError::Storage(err.into())
    }

    pub fn codec(err: impl Into<BoxError>) -> Self {
        CacheError::Codec(err.into())
    }

    pub fn is_missing_connection(&self) -> bool {
        matches!(self, CacheError::MissingConnection)
    }
}

impl From<rusqlite::Error> for CacheError {
    fn from(e: rusqlite::Error) -> Self {
        CacheError::Storage(Box::new(e))
    }
}

impl<T> From<std::sync::PoisonError<T>> for CacheError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        CacheError::LockPoisoned
    }
}

/// Outcome of a failed memoized call.
///
/// `Function` carries the wrapped function's own error untouched; such
/// failures are never written to the cache.
#[derive(Debug, Error)]
pub enum MemoError<E> {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("wrapped function failed: {0}")]
    Function(E),
}

impl<E> MemoError<E> {
    pub fn into_function_error(self) -> Option<E> {
        match self {
            MemoError::Function(e) => Some(e),
            MemoError::Cache(_) => None,
        }
    }

    pub fn as_cache_error(&self) -> Option<&CacheError> {
        match self {
            MemoError::Cache(e) => Some(e),
            MemoError::Function(_) => None,
        }
    }
}
