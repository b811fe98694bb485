//! A single-consumer queue of signal values with timed waits.
//!
//! Each [`TimedSignalQueue::get`] either receives a value or times out, never
//! both. Values pushed while nobody waits are buffered, so a signal that
//! arrives between subscribing and waiting is not lost.

use futures::channel::oneshot;
use futures::future::{self, Either};
use log::{debug, trace};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use crate::Result;
use crate::api::models::WpaError;
use crate::core::bridge::evaluate;
use crate::core::deferred::Deferred;
use crate::core::reactor::{DelayedCall, ReactorHandle};

struct Waiter<T> {
    id: u64,
    tx: oneshot::Sender<Result<T>>,
    timer: Option<DelayedCall>,
}

struct QueueState<T> {
    buffered: VecDeque<T>,
    waiting: VecDeque<Waiter<T>>,
    next_id: u64,
}

/// Queue of values delivered by signal callbacks.
pub struct TimedSignalQueue<T> {
    state: Arc<Mutex<QueueState<T>>>,
    reactor: ReactorHandle,
}

impl<T> Clone for TimedSignalQueue<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            reactor: self.reactor.clone(),
        }
    }
}

impl<T> TimedSignalQueue<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(reactor: ReactorHandle) -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState {
                buffered: VecDeque::new(),
                waiting: VecDeque::new(),
                next_id: 0,
            })),
            reactor,
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hands `value` to the oldest waiter, or buffers it.
    pub fn put(&self, value: T) {
        let mut state = self.lock();
        let mut value = value;

        while let Some(waiter) = state.waiting.pop_front() {
            if let Some(timer) = &waiter.timer {
                timer.cancel();
            }
            // A dropped receiver hands the value back for the next waiter.
            let Err(Ok(returned)) = waiter.tx.send(Ok(value)) else {
                trace!("Delivered value to waiter {}", waiter.id);
                return;
            };
            value = returned;
        }

        trace!("No waiter, buffering value");
        state.buffered.push_back(value);
    }

    /// Registers a wait and returns its result as a [`Deferred`].
    ///
    /// With `Some(timeout)` the wait fails with [`WpaError::MethodTimeout`]
    /// unless a value arrives first. If the reactor stops before either
    /// happens, the wait fails with [`WpaError::ReactorNotRunning`].
    pub fn get_deferred(&self, timeout: Option<Duration>) -> Result<Deferred<T>> {
        self.reactor.ensure_running()?;

        let mut state = self.lock();
        if let Some(value) = state.buffered.pop_front() {
            return Ok(Deferred::resolved(Ok(value)));
        }

        let id = state.next_id;
        state.next_id += 1;

        // The timer may fire on the reactor before this returns; it blocks on
        // the lock until the waiter is registered.
        let timer = match timeout {
            Some(timeout) => {
                let weak = Arc::downgrade(&self.state);
                Some(
                    self.reactor
                        .call_later(timeout, move || expire(&weak, id, timeout))?,
                )
            }
            None => None,
        };

        let (tx, rx) = oneshot::channel();
        state.waiting.push_back(Waiter { id, tx, timer });

        // The sender lives in the queue, not on the reactor, so shutdown has
        // to be observed separately.
        let stopped = self.reactor.stopped();
        Ok(Deferred::new(async move {
            match future::select(rx, stopped).await {
                Either::Left((Ok(result), _)) => result,
                Either::Left((Err(_), _)) | Either::Right(_) => {
                    debug!("Wait {id} abandoned, the reactor stopped");
                    Err(WpaError::ReactorNotRunning(
                        "reactor stopped while waiting for a signal".into(),
                    ))
                }
            }
        }))
    }

    /// Waits for the next value, blocking the calling thread.
    ///
    /// `None` waits forever. On the reactor thread only an already buffered
    /// value can be returned.
    pub fn get(&self, timeout: Option<Duration>) -> Result<T> {
        if self.reactor.is_reactor_thread() {
            return self.lock().buffered.pop_front().ok_or_else(|| {
                WpaError::Reentrant("cannot wait for a signal on the reactor thread".into())
            });
        }

        let deferred = self.get_deferred(timeout)?;
        evaluate(&deferred, &self.reactor)
    }

    /// Number of buffered values.
    pub fn buffered(&self) -> usize {
        self.lock().buffered.len()
    }

    /// Number of registered waits that have not completed.
    pub fn pending(&self) -> usize {
        self.lock().waiting.len()
    }
}

fn expire<T>(state: &Weak<Mutex<QueueState<T>>>, id: u64, timeout: Duration) {
    let Some(state) = state.upgrade() else {
        return;
    };
    let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);

    let Some(pos) = state.waiting.iter().position(|w| w.id == id) else {
        trace!("Timer for waiter {id} fired after delivery");
        return;
    };
    if let Some(waiter) = state.waiting.remove(pos) {
        debug!("Wait {id} timed out after {timeout:?}");
        let _ = waiter.tx.send(Err(WpaError::MethodTimeout(format!(
            "timed out after {timeout:?} waiting for response"
        ))));
    }
}
