//! Taskboard Loader - Request-Scoped Batching
//!
//! Coalesces many independent key lookups issued during one unit of work into
//! as few calls as possible to a single batch function, memoizing the results
//! for the lifetime of the loader.
//!
//! A loader is meant to be created per request and dropped with it:
//!
//! ```ignore
//! let users = Loader::new(UserBatch::new(store));
//!
//! // Both handles are backed by one slot; one batch call serves all three.
//! let a = users.load(alice);
//! let b = users.load(bob);
//! let a_again = users.load(alice);
//!
//! let (a, b, a_again) = tokio::join!(a, b, a_again);
//! ```
//!
//! Dispatch happens at the next quiescent point of the issuing task, or after
//! [`MULTI_THREAD_WINDOW`] on a multi-threaded runtime (see [`Dispatch`]);
//! callers that manage their own unit-of-work boundary can use
//! [`Dispatch::Manual`] together with [`Loader::flush`].

mod batch;
mod config;
mod error;
mod handle;
mod loader;
mod stats;

pub use batch::{batch_fn, BatchFn, FnBatch, Key, Value};
pub use config::{Dispatch, LoaderConfig, MULTI_THREAD_WINDOW};
pub use error::{LoadError, LoadResult, SharedError};
pub use handle::LoadHandle;
pub use loader::Loader;
pub use stats::LoaderStats;
