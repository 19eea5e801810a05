use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::future::BoxFuture;
use tokio::sync::watch;

use crate::batch::Value;
use crate::error::{LoadError, LoadResult};

/// Contents of one slot: `None` until the slot is settled.
pub(crate) type Slot<V> = Option<LoadResult<V>>;

/// A not-yet-settled result for one `load` call.
///
/// The handle is a future resolving to the slot's result, so it can be
/// awaited directly or handed to combinators such as `join_all`. Handles for
/// the same key on the same loader share one slot, so they all see the same
/// value or the same failure.
pub struct LoadHandle<V> {
    rx: watch::Receiver<Slot<V>>,
    /// Created on first poll.
    wait: Option<BoxFuture<'static, LoadResult<V>>>,
}

impl<V: Value> LoadHandle<V> {
    pub(crate) fn new(rx: watch::Receiver<Slot<V>>) -> Self {
        Self { rx, wait: None }
    }

    /// A handle that is already settled.
    pub(crate) fn settled(result: LoadResult<V>) -> Self {
        let (_tx, rx) = watch::channel(Some(result));
        Self::new(rx)
    }

    /// The settled result, if the slot has been settled.
    pub fn try_get(&self) -> Option<LoadResult<V>> {
        (*self.rx.borrow()).clone()
    }

    /// Whether the slot has been settled.
    pub fn is_settled(&self) -> bool {
        self.rx.borrow().is_some()
    }

    /// Wait for the slot to settle.
    pub async fn resolve(self) -> LoadResult<V> {
        self.await
    }
}

async fn wait_settled<V: Value>(mut rx: watch::Receiver<Slot<V>>) -> LoadResult<V> {
    if let Some(result) = (*rx.borrow()).clone() {
        return result;
    }
    match rx.wait_for(Option::is_some).await {
        Ok(slot) => (*slot).clone().unwrap_or(Err(LoadError::Abandoned)),
        Err(_) => Err(LoadError::Abandoned),
    }
}

impl<V: Value> Future for LoadHandle<V> {
    type Output = LoadResult<V>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let rx = &this.rx;
        this.wait
            .get_or_insert_with(|| Box::pin(wait_settled(rx.clone())))
            .as_mut()
            .poll(cx)
    }
}

impl<V> Clone for LoadHandle<V> {
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.clone(),
            wait: None,
        }
    }
}

impl<V> fmt::Debug for LoadHandle<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadHandle")
            .field("settled", &self.rx.borrow().is_some())
            .finish()
    }
}
