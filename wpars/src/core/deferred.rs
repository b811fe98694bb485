//! Shareable handle to a result produced on the reactor.

use futures::future::{BoxFuture, FutureExt, Shared};
use futures::channel::oneshot;
use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::Result;
use crate::api::models::WpaError;

/// The eventual outcome of work scheduled on the reactor.
///
/// A `Deferred` can be cloned and awaited from several places; every clone
/// observes the same value or error. Once completed the outcome is recorded
/// and can be read with [`peek`](Self::peek) without polling again.
pub struct Deferred<T> {
    inner: Shared<BoxFuture<'static, Result<T>>>,
}

impl<T> Deferred<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn new<F>(fut: F) -> Self
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        Self {
            inner: fut.boxed().shared(),
        }
    }

    /// A deferred that is already called with `result`.
    pub fn resolved(result: Result<T>) -> Self {
        let deferred = Self::new(futures::future::ready(result));
        let _ = deferred.poll_in_place();
        deferred
    }

    /// Completes with whatever is sent on `rx`.
    ///
    /// If the sender goes away first, the work was dropped together with the
    /// reactor.
    pub(crate) fn from_receiver(rx: oneshot::Receiver<Result<T>>) -> Self {
        Self::new(async move {
            rx.await.unwrap_or_else(|_| {
                Err(WpaError::ReactorNotRunning(
                    "reactor stopped before the call completed".into(),
                ))
            })
        })
    }

    /// Whether the outcome is already recorded.
    pub fn is_called(&self) -> bool {
        self.inner.peek().is_some()
    }

    /// The recorded outcome, if any.
    pub fn peek(&self) -> Option<Result<T>> {
        self.inner.peek().cloned()
    }

    /// Polls once on the current thread.
    pub(crate) fn poll_in_place(&self) -> Option<Result<T>> {
        self.inner.clone().now_or_never()
    }
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Debug for Deferred<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.inner.peek() {
            Some(result) => write!(f, "Deferred(called: {result:?})"),
            None => write!(f, "Deferred(pending)"),
        }
    }
}

impl<T> Future for Deferred<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.inner).poll(cx)
    }
}
