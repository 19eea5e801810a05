use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of loader activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoaderStats {
    /// Flush cycles that dispatched at least one key.
    pub cycles: u64,
    /// Calls made to the batch function.
    pub batch_calls: u64,
    /// Keys sent to the batch function, summed over all calls.
    pub keys_dispatched: u64,
    /// Loads answered from the memo table.
    pub memo_hits: u64,
}

#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    cycles: AtomicU64,
    batch_calls: AtomicU64,
    keys_dispatched: AtomicU64,
    memo_hits: AtomicU64,
}

impl StatsCounters {
    pub(crate) fn record_cycle(&self) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_batch(&self, keys: usize) {
        self.batch_calls.fetch_add(1, Ordering::Relaxed);
        self.keys_dispatched
            .fetch_add(keys as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_memo_hit(&self) {
        self.memo_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> LoaderStats {
        LoaderStats {
            cycles: self.cycles.load(Ordering::Relaxed),
            batch_calls: self.batch_calls.load(Ordering::Relaxed),
            keys_dispatched: self.keys_dispatched.load(Ordering::Relaxed),
            memo_hits: self.memo_hits.load(Ordering::Relaxed),
        }
    }
}
