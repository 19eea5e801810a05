//! Loader error types

use std::sync::Arc;

use thiserror::Error;

/// Type-erased, shareable error from a batch function.
///
/// One failure is fanned out to every handle that joined the failing slot, so
/// it has to be cheap to clone.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Result type settled into every load handle.
pub type LoadResult<V> = Result<V, LoadError>;

/// Why a load did not produce a value.
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    /// The batch function's key validation rejected the key.
    #[error("invalid key: {reason}")]
    InvalidKey { reason: String },

    /// The batch function returned a result list of the wrong length.
    #[error("batch function returned {actual} results for {expected} keys")]
    BatchContract { expected: usize, actual: usize },

    /// The batch call itself failed; no per-key results exist.
    #[error("batch fetch failed: {0}")]
    BatchFetch(SharedError),

    /// The batch call succeeded but this key's entry was an error.
    #[error("{0}")]
    Key(SharedError),

    /// The loader was dropped (or its flush task died) before the key was
    /// dispatched.
    #[error("loader dropped before the key was dispatched")]
    Abandoned,
}

impl LoadError {
    /// The underlying batch-function error, for `BatchFetch` and `Key`.
    pub fn source_error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            LoadError::BatchFetch(err) | LoadError::Key(err) => Some(err.as_ref()),
            _ => None,
        }
    }

    /// Downcast the underlying batch-function error.
    pub fn downcast_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        self.source_error().and_then(|err| err.downcast_ref::<E>())
    }

    /// True for failures that affected a whole batch call.
    pub fn is_batch_failure(&self) -> bool {
        matches!(
            self,
            LoadError::BatchContract { .. } | LoadError::BatchFetch(_)
        )
    }
}
