//! The batch function seam between the loader and whatever backs it.

use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;

use async_trait::async_trait;

/// Bounds every loader key must satisfy.
///
/// Keys are compared by value; equal keys share one slot per loader.
pub trait Key: Eq + Hash + Clone + Debug + Send + Sync + 'static {}

impl<T> Key for T where T: Eq + Hash + Clone + Debug + Send + Sync + 'static {}

/// Bounds every loaded value must satisfy.
///
/// Values are cloned out to every handle that joined the same slot.
pub trait Value: Clone + Send + Sync + 'static {}

impl<T> Value for T where T: Clone + Send + Sync + 'static {}

/// A function that resolves many keys in one round trip.
///
/// # Contract
///
/// `load` receives a non-empty slice of unique keys and must return exactly
/// one result per key, index-aligned with the input. A length mismatch fails
/// every key in the call with [`LoadError::BatchContract`]; an outer `Err`
/// fails every key with [`LoadError::BatchFetch`]. Per-key `Err` entries only
/// fail their own key.
///
/// [`LoadError::BatchContract`]: crate::LoadError::BatchContract
/// [`LoadError::BatchFetch`]: crate::LoadError::BatchFetch
#[async_trait]
pub trait BatchFn<K, V>: Send + Sync + 'static
where
    K: Key,
    V: Value,
{
    /// Error type for both whole-batch and per-key failures.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Resolve `keys`, returning one result per key in the same order.
    async fn load(&self, keys: &[K]) -> Result<Vec<Result<V, Self::Error>>, Self::Error>;

    /// Reject keys that can never be resolved.
    ///
    /// Rejected keys settle immediately with [`LoadError::InvalidKey`] and are
    /// never memoized or dispatched.
    ///
    /// [`LoadError::InvalidKey`]: crate::LoadError::InvalidKey
    fn validate_key(&self, _key: &K) -> Result<(), String> {
        Ok(())
    }
}

/// Adapter turning an async closure into a [`BatchFn`].
///
/// Built with [`batch_fn`].
#[derive(Clone)]
pub struct FnBatch<F> {
    f: F,
}

/// Wrap an async closure `Fn(Vec<K>) -> Future<Output = Result<Vec<Result<V, E>>, E>>`.
pub fn batch_fn<F>(f: F) -> FnBatch<F> {
    FnBatch { f }
}

impl<F> Debug for FnBatch<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnBatch").finish_non_exhaustive()
    }
}

#[async_trait]
impl<K, V, E, F, Fut> BatchFn<K, V> for FnBatch<F>
where
    K: Key,
    V: Value,
    E: std::error::Error + Send + Sync + 'static,
    F: Fn(Vec<K>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<Result<V, E>>, E>> + Send + 'static,
{
    type Error = E;

    async fn load(&self, keys: &[K]) -> Result<Vec<Result<V, E>>, E> {
        (self.f)(keys.to_vec()).await
    }
}
