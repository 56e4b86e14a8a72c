//! Live queries: store snapshots mapped to typed, ordered collections

use futures::{Stream, StreamExt};
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::task::JoinHandle;

use super::{materialize, Entity};
use crate::store::Subscription;

pub(crate) type Filter<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

enum LiveState {
    /// Store could not be reached: one empty collection, then the stream ends.
    Offline { delivered: bool },
    Online(Subscription),
}

/// Stream of the full current collection, re-emitted on every change.
pub struct LiveCollection<E> {
    state: LiveState,
    filter: Option<Filter<E>>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> LiveCollection<E> {
    pub(crate) fn online(subscription: Subscription, filter: Option<Filter<E>>) -> Self {
        Self { state: LiveState::Online(subscription), filter, _entity: PhantomData }
    }

    pub(crate) fn offline() -> Self {
        Self { state: LiveState::Offline { delivered: false }, filter: None, _entity: PhantomData }
    }

    pub fn is_live(&self) -> bool { matches!(self.state, LiveState::Online(_)) }

    /// Drives the stream on a tokio task, invoking `callback` for every collection.
    /// When the store is offline the callback runs once with `[]` before this returns
    /// and the returned handle does nothing.
    pub fn spawn<F>(mut self, mut callback: F) -> SubscriptionHandle
    where
        F: FnMut(Vec<E>) + Send + 'static,
    {
        if let LiveState::Offline { .. } = self.state {
            callback(Vec::new());
            return SubscriptionHandle { task: None };
        }
        let task = tokio::spawn(async move {
            while let Some(items) = self.next().await {
                callback(items);
            }
        });
        SubscriptionHandle { task: Some(task) }
    }
}

impl<E: Entity> Stream for LiveCollection<E> {
    type Item = Vec<E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Vec<E>>> {
        let this = self.get_mut();
        match &mut this.state {
            LiveState::Offline { delivered } if !*delivered => {
                *delivered = true;
                Poll::Ready(Some(Vec::new()))
            }
            LiveState::Offline { .. } => Poll::Ready(None),
            LiveState::Online(subscription) => match Pin::new(subscription).poll_next(cx) {
                Poll::Ready(Some(snapshot)) => Poll::Ready(Some(materialize(&snapshot, this.filter.as_ref()))),
                Poll::Ready(None) => Poll::Ready(None),
                Poll::Pending => Poll::Pending,
            },
        }
    }
}

/// Keeps a spawned live query running. Dropping it or calling [`unsubscribe`](Self::unsubscribe) stops delivery.
#[must_use = "dropping the handle unsubscribes immediately"]
pub struct SubscriptionHandle {
    task: Option<JoinHandle<()>>,
}

impl SubscriptionHandle {
    pub fn unsubscribe(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_active(&self) -> bool { self.task.as_ref().is_some_and(|t| !t.is_finished()) }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
