//! The batching loader.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::future::join_all;
use tokio::runtime::RuntimeFlavor;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::batch::{BatchFn, Key, Value};
use crate::config::{Dispatch, LoaderConfig, MULTI_THREAD_WINDOW};
use crate::error::{LoadError, SharedError};
use crate::handle::{LoadHandle, Slot};
use crate::stats::{LoaderStats, StatsCounters};

/// Request-scoped batching loader.
///
/// `Loader` is a cheap handle; clones share the same memo table and batch
/// window. Create one per unit of work and drop it at the end: nothing is
/// shared between instances.
pub struct Loader<K, V, F> {
    inner: Arc<Inner<K, V, F>>,
}

struct Inner<K, V, F> {
    batch_fn: F,
    config: LoaderConfig,
    state: Mutex<State<K, V>>,
    /// Held for a whole flush cycle so the next cycle's window is only taken
    /// once the previous one has settled.
    cycle: tokio::sync::Mutex<()>,
    stats: StatsCounters,
}

struct State<K, V> {
    memo: HashMap<K, watch::Receiver<Slot<V>>>,
    window: Window<K, V>,
    scheduled: bool,
}

/// Keys accumulated since the last flush, deduplicated, in first-seen order.
struct Window<K, V> {
    order: Vec<K>,
    pending: HashMap<K, watch::Sender<Slot<V>>>,
}

type Pending<K, V> = (K, watch::Sender<Slot<V>>);

impl<K: Key, V: Value> Window<K, V> {
    fn new() -> Self {
        Self {
            order: Vec::new(),
            pending: HashMap::new(),
        }
    }

    fn len(&self) -> usize {
        self.order.len()
    }

    /// Subscribe to the slot for `key`, creating it if this window has not
    /// seen the key yet.
    fn join(&mut self, key: K) -> watch::Receiver<Slot<V>> {
        if let Some(tx) = self.pending.get(&key) {
            return tx.subscribe();
        }
        let (tx, rx) = watch::channel(None);
        self.order.push(key.clone());
        self.pending.insert(key, tx);
        rx
    }

    fn take(&mut self) -> Vec<Pending<K, V>> {
        let mut pending = std::mem::take(&mut self.pending);
        std::mem::take(&mut self.order)
            .into_iter()
            .filter_map(|key| pending.remove(&key).map(|tx| (key, tx)))
            .collect()
    }
}

impl<K, V, F> Loader<K, V, F>
where
    K: Key,
    V: Value,
    F: BatchFn<K, V>,
{
    /// Create a loader with the default configuration.
    pub fn new(batch_fn: F) -> Self {
        Self::with_config(batch_fn, LoaderConfig::default())
    }

    /// Create a loader with an explicit configuration.
    pub fn with_config(batch_fn: F, config: LoaderConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                batch_fn,
                config,
                state: Mutex::new(State {
                    memo: HashMap::new(),
                    window: Window::new(),
                    scheduled: false,
                }),
                cycle: tokio::sync::Mutex::new(()),
                stats: StatsCounters::default(),
            }),
        }
    }

    /// Request the value for `key`.
    ///
    /// Never blocks and never calls the batch function directly. With caching
    /// enabled, a key already loaded (or in flight) on this loader returns a
    /// handle to the existing slot.
    pub fn load(&self, key: K) -> LoadHandle<V> {
        if let Err(reason) = self.inner.batch_fn.validate_key(&key) {
            debug!(?key, %reason, "rejected loader key");
            return LoadHandle::settled(Err(LoadError::InvalidKey { reason }));
        }

        let cache = self.inner.config.cache;
        let (rx, schedule) = {
            let mut state = self.inner.lock_state();
            if cache {
                if let Some(rx) = state.memo.get(&key) {
                    self.inner.stats.record_memo_hit();
                    return LoadHandle::new(rx.clone());
                }
            }

            let rx = if cache {
                let rx = state.window.join(key.clone());
                state.memo.insert(key, rx.clone());
                rx
            } else {
                state.window.join(key)
            };

            let schedule = !state.scheduled && self.inner.config.dispatch != Dispatch::Manual;
            if schedule {
                state.scheduled = true;
            }
            (rx, schedule)
        };

        if schedule {
            self.schedule_flush();
        }
        LoadHandle::new(rx)
    }

    /// Request many keys at once. Handles come back in input order, duplicates
    /// included; equal keys share one slot.
    pub fn load_many<I>(&self, keys: I) -> Vec<LoadHandle<V>>
    where
        I: IntoIterator<Item = K>,
    {
        keys.into_iter().map(|key| self.load(key)).collect()
    }

    /// Drop the memoized entry for `key`. Returns whether an entry existed.
    ///
    /// Slots already queued or in flight still settle; only later loads are
    /// affected.
    pub fn clear(&self, key: &K) -> bool {
        self.inner.lock_state().memo.remove(key).is_some()
    }

    /// Drop every memoized entry.
    pub fn clear_all(&self) {
        self.inner.lock_state().memo.clear();
    }

    /// Seed the memo table with a known value.
    ///
    /// Skipped (returns `false`) when the key already has an entry or caching
    /// is disabled.
    pub fn prime(&self, key: K, value: V) -> bool {
        if !self.inner.config.cache {
            return false;
        }
        let mut state = self.inner.lock_state();
        if state.memo.contains_key(&key) {
            return false;
        }
        state.memo.insert(key, settled_slot(value));
        true
    }

    /// Seed the memo table, replacing any existing entry.
    ///
    /// Handles returned before the call keep their original slot.
    pub fn prime_force(&self, key: K, value: V) {
        if !self.inner.config.cache {
            return;
        }
        self.inner
            .lock_state()
            .memo
            .insert(key, settled_slot(value));
    }

    /// Run one flush cycle now.
    ///
    /// Waits for any in-progress cycle first. A no-op when the window is
    /// empty.
    pub async fn flush(&self) {
        self.inner.flush().await;
    }

    /// Number of keys waiting for the next flush.
    pub fn pending_len(&self) -> usize {
        self.inner.lock_state().window.len()
    }

    /// Number of memoized keys.
    pub fn memo_len(&self) -> usize {
        self.inner.lock_state().memo.len()
    }

    /// The configuration this loader was built with.
    pub fn config(&self) -> &LoaderConfig {
        &self.inner.config
    }

    /// Counters accumulated since the loader was created.
    pub fn stats(&self) -> LoaderStats {
        self.inner.stats.snapshot()
    }

    fn schedule_flush(&self) {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                warn!("no tokio runtime to schedule the loader flush on; call flush() instead");
                self.inner.lock_state().scheduled = false;
                return;
            }
        };

        let wait = match self.inner.config.dispatch {
            Dispatch::Delay(delay) => Some(delay),
            Dispatch::Yield if runtime.runtime_flavor() != RuntimeFlavor::CurrentThread => {
                Some(MULTI_THREAD_WINDOW)
            }
            Dispatch::Yield | Dispatch::Manual => None,
        };

        let inner = Arc::clone(&self.inner);
        runtime.spawn(async move {
            match wait {
                Some(delay) => tokio::time::sleep(delay).await,
                None => tokio::task::yield_now().await,
            }
            inner.flush().await;
        });
    }
}

impl<K, V, F> Inner<K, V, F>
where
    K: Key,
    V: Value,
    F: BatchFn<K, V>,
{
    fn lock_state(&self) -> MutexGuard<'_, State<K, V>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn flush(&self) {
        let _cycle = self.cycle.lock().await;

        let window = {
            let mut state = self.lock_state();
            state.scheduled = false;
            state.window.take()
        };
        if window.is_empty() {
            return;
        }

        self.stats.record_cycle();
        let chunk_size = self.config.chunk_size(window.len());
        let total = window.len();

        let mut entries = window.into_iter();
        let mut chunks = Vec::with_capacity(total.div_ceil(chunk_size));
        loop {
            let chunk: Vec<_> = entries.by_ref().take(chunk_size).collect();
            if chunk.is_empty() {
                break;
            }
            chunks.push(chunk);
        }

        debug!(keys = total, chunks = chunks.len(), "dispatching loader batch");
        join_all(chunks.into_iter().map(|chunk| self.dispatch_chunk(chunk))).await;
    }

    async fn dispatch_chunk(&self, chunk: Vec<Pending<K, V>>) {
        let (keys, senders): (Vec<K>, Vec<_>) = chunk.into_iter().unzip();
        self.stats.record_batch(keys.len());

        match self.batch_fn.load(&keys).await {
            Ok(results) if results.len() == keys.len() => {
                for (tx, result) in senders.iter().zip(results) {
                    tx.send_replace(Some(result.map_err(|err| LoadError::Key(Arc::new(err)))));
                }
            }
            Ok(results) => {
                warn!(
                    expected = keys.len(),
                    actual = results.len(),
                    "batch function returned a misaligned result list"
                );
                let err = LoadError::BatchContract {
                    expected: keys.len(),
                    actual: results.len(),
                };
                settle_all(&senders, err);
            }
            Err(err) => {
                let shared: SharedError = Arc::new(err);
                warn!(keys = keys.len(), error = %shared, "batch fetch failed");
                settle_all(&senders, LoadError::BatchFetch(shared));
            }
        }
    }
}

fn settle_all<V: Value>(senders: &[watch::Sender<Slot<V>>], err: LoadError) {
    for tx in senders {
        tx.send_replace(Some(Err(err.clone())));
    }
}

fn settled_slot<V: Value>(value: V) -> watch::Receiver<Slot<V>> {
    let (_tx, rx) = watch::channel(Some(Ok(value)));
    rx
}

impl<K, V, F> Clone for Loader<K, V, F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V, F> fmt::Debug for Loader<K, V, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loader")
            .field("config", &self.inner.config)
            .field("stats", &self.inner.stats.snapshot())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::batch_fn;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use thiserror::Error;

    #[derive(Debug, Error, Clone, PartialEq)]
    enum FetchError {
        #[error("user {0} not found")]
        NotFound(u32),
        #[error("connection reset")]
        Transport,
    }

    type Calls = Arc<Mutex<Vec<Vec<u32>>>>;

    fn recorded(calls: &Calls) -> Vec<Vec<u32>> {
        calls.lock().unwrap().clone()
    }

    /// Resolves 1 => alice, 2 => bob, anything else => NotFound.
    fn users(
        calls: Calls,
        config: LoaderConfig,
    ) -> Loader<u32, String, impl BatchFn<u32, String, Error = FetchError>> {
        let f = batch_fn(move |keys: Vec<u32>| {
            calls.lock().unwrap().push(keys.clone());
            async move {
                let results: Vec<Result<String, FetchError>> = keys
                    .into_iter()
                    .map(|k| match k {
                        1 => Ok("alice".to_string()),
                        2 => Ok("bob".to_string()),
                        other => Err(FetchError::NotFound(other)),
                    })
                    .collect();
                Ok::<_, FetchError>(results)
            }
        });
        Loader::with_config(f, config)
    }

    #[tokio::test]
    async fn test_coalesces_and_dedupes_within_turn() {
        let calls = Calls::default();
        let loader = users(calls.clone(), LoaderConfig::default());

        let handles = vec![
            loader.load(1),
            loader.load(2),
            loader.load(3),
            loader.load(1),
        ];
        let results = join_all(handles).await;

        assert_eq!(recorded(&calls), vec![vec![1, 2, 3]]);
        assert_eq!(results[0].as_ref().ok().map(String::as_str), Some("alice"));
        assert_eq!(results[1].as_ref().ok().map(String::as_str), Some("bob"));
        assert_eq!(
            results[2].as_ref().err().and_then(|e| e.downcast_ref::<FetchError>()),
            Some(&FetchError::NotFound(3))
        );
        assert_eq!(results[3].as_ref().ok().map(String::as_str), Some("alice"));
    }

    #[tokio::test]
    async fn test_load_many_keeps_duplicates() {
        let calls = Calls::default();
        let loader = users(calls.clone(), LoaderConfig::default());

        let handles = loader.load_many([1, 2, 1]);
        assert_eq!(handles.len(), 3);
        let results = join_all(handles).await;

        assert_eq!(recorded(&calls), vec![vec![1, 2]]);
        assert_eq!(results[0].as_ref().ok(), results[2].as_ref().ok());
        assert_eq!(results[1].as_ref().ok().map(String::as_str), Some("bob"));
    }

    #[tokio::test]
    async fn test_memoized_across_cycles() {
        let calls = Calls::default();
        let loader = users(calls.clone(), LoaderConfig::default());

        assert!(loader.load(1).await.is_ok());
        assert!(loader.load(1).await.is_ok());
        assert_eq!(recorded(&calls), vec![vec![1]]);
        assert_eq!(loader.stats().memo_hits, 1);
    }

    #[tokio::test]
    async fn test_failed_key_stays_failed() {
        let calls = Calls::default();
        let loader = users(calls.clone(), LoaderConfig::default());

        assert!(loader.load(9).await.is_err());
        assert!(loader.load(9).await.is_err());
        assert_eq!(recorded(&calls).len(), 1);
    }

    #[tokio::test]
    async fn test_clear_refetches() {
        let calls = Calls::default();
        let loader = users(calls.clone(), LoaderConfig::default());

        assert!(loader.load(1).await.is_ok());
        assert!(loader.clear(&1));
        assert!(!loader.clear(&1));
        assert!(loader.load(1).await.is_ok());
        assert_eq!(recorded(&calls), vec![vec![1], vec![1]]);
    }

    #[tokio::test]
    async fn test_clear_all_refetches_everything() {
        let calls = Calls::default();
        let loader = users(calls.clone(), LoaderConfig::default());

        let _ = join_all(loader.load_many([1, 2])).await;
        loader.clear_all();
        assert_eq!(loader.memo_len(), 0);
        let _ = join_all(loader.load_many([2, 1])).await;
        assert_eq!(recorded(&calls), vec![vec![1, 2], vec![2, 1]]);
    }

    #[tokio::test]
    async fn test_prime_skips_fetch() {
        let calls = Calls::default();
        let loader = users(calls.clone(), LoaderConfig::default());

        assert!(loader.prime(5, "eve".to_string()));
        assert!(!loader.prime(5, "mallory".to_string()));
        assert_eq!(loader.load(5).await.ok().as_deref(), Some("eve"));

        loader.prime_force(5, "mallory".to_string());
        assert_eq!(loader.load(5).await.ok().as_deref(), Some("mallory"));
        assert!(recorded(&calls).is_empty());
    }

    #[tokio::test]
    async fn test_prime_force_leaves_existing_handles() {
        let calls = Calls::default();
        let loader = users(calls.clone(), LoaderConfig::default().manual());

        let before = loader.load(1);
        loader.prime_force(1, "override".to_string());
        loader.flush().await;

        assert_eq!(before.await.ok().as_deref(), Some("alice"));
        assert_eq!(loader.load(1).await.ok().as_deref(), Some("override"));
    }

    #[tokio::test]
    async fn test_manual_dispatch_waits_for_flush() {
        let calls = Calls::default();
        let loader = users(calls.clone(), LoaderConfig::default().manual());

        let handle = loader.load(2);
        tokio::task::yield_now().await;
        assert!(!handle.is_settled());
        assert_eq!(loader.pending_len(), 1);

        loader.flush().await;
        assert_eq!(handle.await.ok().as_deref(), Some("bob"));
        assert_eq!(loader.pending_len(), 0);
    }

    #[tokio::test]
    async fn test_dropped_manual_loader_abandons_handles() {
        let loader = users(Calls::default(), LoaderConfig::default().manual());
        let handle = loader.load(1);
        drop(loader);
        assert!(matches!(handle.await, Err(LoadError::Abandoned)));
    }

    #[tokio::test]
    async fn test_chunks_respect_max_batch_size() {
        let calls = Calls::default();
        let loader = users(calls.clone(), LoaderConfig::default().with_max_batch_size(2));

        let _ = join_all(loader.load_many([1, 2, 3, 4, 5])).await;
        let mut seen = recorded(&calls);
        seen.sort();
        assert_eq!(seen, vec![vec![1, 2], vec![3, 4], vec![5]]);
        let stats = loader.stats();
        assert_eq!(stats.cycles, 1);
        assert_eq!(stats.batch_calls, 3);
        assert_eq!(stats.keys_dispatched, 5);
    }

    #[tokio::test]
    async fn test_contract_violation_is_per_chunk() {
        let f = batch_fn(|keys: Vec<u32>| async move {
            let results: Vec<Result<u32, FetchError>> = if keys.contains(&3) {
                // second chunk drops an entry
                vec![Ok(keys[0])]
            } else {
                keys.into_iter().map(Ok).collect()
            };
            Ok::<_, FetchError>(results)
        });
        let loader: Loader<u32, u32, _> =
            Loader::with_config(f, LoaderConfig::default().with_max_batch_size(2));

        let results = join_all(loader.load_many([1, 2, 3, 4, 5])).await;
        assert_eq!(results[0].as_ref().ok(), Some(&1));
        assert_eq!(results[1].as_ref().ok(), Some(&2));
        for result in &results[2..4] {
            assert!(matches!(
                result,
                Err(LoadError::BatchContract {
                    expected: 2,
                    actual: 1
                })
            ));
        }
        assert_eq!(results[4].as_ref().ok(), Some(&5));
    }

    #[tokio::test]
    async fn test_fetch_failure_fails_whole_chunk() {
        let f = batch_fn(|_keys: Vec<u32>| async move {
            Err::<Vec<Result<u32, FetchError>>, _>(FetchError::Transport)
        });
        let loader = Loader::new(f);

        let results = join_all(loader.load_many([1, 2])).await;
        for result in results {
            match result {
                Err(err @ LoadError::BatchFetch(_)) => {
                    assert_eq!(err.downcast_ref::<FetchError>(), Some(&FetchError::Transport));
                }
                other => panic!("expected BatchFetch, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_invalid_key_is_rejected_without_fetch() {
        struct Positive(Arc<AtomicUsize>);

        #[async_trait::async_trait]
        impl BatchFn<i64, i64> for Positive {
            type Error = FetchError;

            async fn load(&self, keys: &[i64]) -> Result<Vec<Result<i64, FetchError>>, FetchError> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(keys.iter().map(|k| Ok(k * 10)).collect())
            }

            fn validate_key(&self, key: &i64) -> Result<(), String> {
                if *key > 0 {
                    Ok(())
                } else {
                    Err(format!("{} is not a positive id", key))
                }
            }
        }

        let calls = Arc::new(AtomicUsize::new(0));
        let loader = Loader::new(Positive(calls.clone()));

        let bad = loader.load(-1);
        assert!(bad.is_settled());
        assert!(matches!(bad.await, Err(LoadError::InvalidKey { .. })));
        assert_eq!(loader.memo_len(), 0);
        assert_eq!(loader.load(4).await.ok(), Some(40));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cache_disabled_still_dedupes_window() {
        let calls = Calls::default();
        let loader = users(calls.clone(), LoaderConfig::default().with_cache(false));

        let _ = join_all(loader.load_many([1, 1, 2])).await;
        let _ = loader.load(1).await;
        assert_eq!(recorded(&calls), vec![vec![1, 2], vec![1]]);
        assert_eq!(loader.memo_len(), 0);
        assert!(!loader.prime(1, "ignored".to_string()));
    }

    #[tokio::test]
    async fn test_load_during_flight_joins_next_cycle() {
        let calls = Calls::default();
        let gate = Arc::new(tokio::sync::Notify::new());
        let f = {
            let calls = calls.clone();
            let gate = gate.clone();
            batch_fn(move |keys: Vec<u32>| {
                calls.lock().unwrap().push(keys.clone());
                let gate = gate.clone();
                async move {
                    if keys == vec![1] {
                        gate.notified().await;
                    }
                    let results: Vec<Result<u32, FetchError>> = keys.into_iter().map(Ok).collect();
                    Ok::<_, FetchError>(results)
                }
            })
        };
        let loader: Loader<u32, u32, _> = Loader::new(f);

        let first = loader.load(1);
        // let the first cycle start and block inside the batch function
        while recorded(&calls).is_empty() {
            tokio::task::yield_now().await;
        }
        let second = loader.load(2);
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        assert_eq!(recorded(&calls), vec![vec![1]]);
        assert!(!second.is_settled());

        gate.notify_one();
        assert_eq!(first.await.ok(), Some(1));
        assert_eq!(second.await.ok(), Some(2));
        assert_eq!(recorded(&calls), vec![vec![1], vec![2]]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_dispatch_coalesces_across_tasks() {
        let calls = Calls::default();
        let loader = users(
            calls.clone(),
            LoaderConfig::default().with_dispatch(Dispatch::Delay(std::time::Duration::from_millis(5))),
        );

        let first = loader.load(1);
        let other = loader.clone();
        let spawned = tokio::spawn(async move { other.load(2).await });

        assert!(first.await.is_ok());
        assert!(spawned.await.map(|r| r.is_ok()).unwrap_or(false));
        assert_eq!(recorded(&calls), vec![vec![1, 2]]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_yield_window_spans_turn_on_multi_thread() {
        let calls = Calls::default();
        let loader = users(calls.clone(), LoaderConfig::default());

        let mut handles = Vec::with_capacity(200);
        let mut checksum = 0u64;
        for key in 0..200u32 {
            handles.push(loader.load(key));
            // A little synchronous work between loads, as a resolver would do.
            checksum = checksum.wrapping_add(std::hint::black_box(u64::from(key) * 31));
        }
        assert!(checksum > 0);
        let results = join_all(handles).await;

        assert_eq!(results.len(), 200);
        assert_eq!(recorded(&calls), vec![(0..200).collect::<Vec<u32>>()]);
        assert_eq!(results[1].as_ref().ok().map(String::as_str), Some("alice"));
    }
}
