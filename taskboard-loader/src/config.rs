use std::num::NonZeroUsize;
use std::time::Duration;

/// When a loader dispatches its accumulated batch window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dispatch {
    /// Spawn a flush task on the first load of a window; the task yields once
    /// before dispatching, so every load issued before the issuing task next
    /// yields to the scheduler joins the batch.
    ///
    /// On a multi-threaded runtime another worker would pick the flush task
    /// up while the issuing task is still loading, so there the task waits
    /// [`MULTI_THREAD_WINDOW`] instead.
    #[default]
    Yield,
    /// Like `Yield`, but wait this long before dispatching. Widens the window
    /// to loads coming from other tasks.
    Delay(Duration),
    /// Never schedule anything; the owner calls [`Loader::flush`].
    ///
    /// [`Loader::flush`]: crate::Loader::flush
    Manual,
}

/// How long a [`Dispatch::Yield`] window stays open on a multi-threaded
/// runtime.
pub const MULTI_THREAD_WINDOW: Duration = Duration::from_millis(1);

/// Configuration for a [`Loader`](crate::Loader).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Upper bound on keys per batch call. `None` sends the whole window.
    pub max_batch_size: Option<NonZeroUsize>,
    /// Memoize results for the lifetime of the loader.
    pub cache: bool,
    /// Flush scheduling policy.
    pub dispatch: Dispatch,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_batch_size: None,
            cache: true,
            dispatch: Dispatch::Yield,
        }
    }
}

impl LoaderConfig {
    /// Create a new loader config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum batch size. Zero means unlimited.
    pub fn with_max_batch_size(mut self, max: usize) -> Self {
        self.max_batch_size = NonZeroUsize::new(max);
        self
    }

    /// Enable or disable memoization.
    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache = enabled;
        self
    }

    /// Set the dispatch policy.
    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = dispatch;
        self
    }

    /// Shorthand for `with_dispatch(Dispatch::Manual)`.
    pub fn manual(self) -> Self {
        self.with_dispatch(Dispatch::Manual)
    }

    pub(crate) fn chunk_size(&self, window_len: usize) -> usize {
        self.max_batch_size
            .map_or(window_len, NonZeroUsize::get)
            .max(1)
    }
}
