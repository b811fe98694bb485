//! Signal subscriptions on remote objects.
//!
//! [`RemoteSignal`] delivers every occurrence of a signal to a callback until
//! cancelled. [`PendingSignalWait`] is the single-shot form used by blocking
//! operations: it buffers the first occurrence in a [`TimedSignalQueue`] and
//! unsubscribes itself.

use log::{debug, trace, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;

use crate::Result;
use crate::core::bridge::evaluate;
use crate::core::deferred::Deferred;
use crate::core::error_translation::RemoteErrorTranslator;
use crate::core::reactor::ReactorHandle;
use crate::core::signal_queue::TimedSignalQueue;
use crate::dbus::transport::{Payload, RemoteObject, SignalCallback, SubscriptionId};

/// Whether a subscription still delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalState {
    Active,
    Cancelled,
}

struct SignalInner {
    name: String,
    interface: &'static str,
    remote: Arc<dyn RemoteObject>,
    reactor: ReactorHandle,
    translator: RemoteErrorTranslator,
    subscription: Deferred<SubscriptionId>,
    state: Arc<Mutex<SignalState>>,
}

fn lock_state(state: &Mutex<SignalState>) -> MutexGuard<'_, SignalState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A live subscription to a remote signal.
///
/// Cancellation is idempotent and may be requested from any thread; it is
/// carried out on the reactor, so it is ordered with respect to deliveries.
#[derive(Clone)]
pub struct RemoteSignal {
    inner: Arc<SignalInner>,
}

impl std::fmt::Debug for RemoteSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteSignal")
            .field("interface", &self.inner.interface)
            .field("name", &self.inner.name)
            .field("state", &self.state())
            .finish()
    }
}

impl RemoteSignal {
    /// Subscribes `callback` to `interface.name` on `remote`.
    ///
    /// From a foreign thread this waits for the subscription to be in place.
    /// On the reactor thread the subscription completes in the background.
    pub(crate) fn register(
        remote: Arc<dyn RemoteObject>,
        interface: &'static str,
        name: &str,
        reactor: ReactorHandle,
        translator: RemoteErrorTranslator,
        callback: SignalCallback,
    ) -> Result<Self> {
        let state = Arc::new(Mutex::new(SignalState::Active));

        let gate = state.clone();
        let signal_name = name.to_string();
        let gated: SignalCallback = Arc::new(move |payload: Payload| {
            let active = *lock_state(&gate) == SignalState::Active;
            if active {
                callback(payload);
            } else {
                trace!("Dropping {signal_name} delivered after cancellation");
            }
        });

        let subscription = {
            let remote = remote.clone();
            let translator = translator.clone();
            let name = name.to_string();
            reactor.run_on(move || async move {
                translator
                    .wrap(remote.notify_on_signal(interface, &name, gated))
                    .await
            })?
        };

        let signal = Self {
            inner: Arc::new(SignalInner {
                name: name.to_string(),
                interface,
                remote,
                reactor,
                translator,
                subscription,
                state,
            }),
        };

        if !signal.inner.reactor.is_reactor_thread() {
            evaluate(&signal.inner.subscription, &signal.inner.reactor)?;
        }
        debug!("Registered signal {interface}.{name}");
        Ok(signal)
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn state(&self) -> SignalState {
        *lock_state(&self.inner.state)
    }

    fn schedule_cancel(&self) -> Result<Deferred<()>> {
        let inner = self.inner.clone();
        self.inner.reactor.run_on(move || async move {
            {
                let mut state = lock_state(&inner.state);
                if *state == SignalState::Cancelled {
                    return Ok(());
                }
                *state = SignalState::Cancelled;
            }

            let id = inner.subscription.clone().await?;
            inner
                .translator
                .wrap(inner.remote.cancel_signal_notification(id))
                .await?;
            debug!("Cancelled signal {}.{}", inner.interface, inner.name);
            Ok(())
        })
    }

    /// Stops delivery and removes the subscription.
    ///
    /// A second call is a no-op. On the reactor thread the unsubscription
    /// finishes in the background; deliveries stop immediately.
    pub fn cancel(&self) -> Result<()> {
        if self.state() == SignalState::Cancelled {
            return Ok(());
        }

        let done = self.schedule_cancel()?;
        if self.inner.reactor.is_reactor_thread() {
            return done.peek().unwrap_or(Ok(()));
        }
        evaluate(&done, &self.inner.reactor)
    }

    /// Requests cancellation without waiting for it.
    pub(crate) fn cancel_detached(&self) {
        if self.state() == SignalState::Cancelled {
            return;
        }
        if let Err(e) = self.schedule_cancel() {
            debug!("Could not cancel signal {}: {e}", self.inner.name);
        }
    }
}

/// One pending "wait for the next occurrence of a signal".
///
/// At most one value is ever delivered. The subscription is cancelled when
/// the signal fires, when [`get`](Self::get) returns, or when the wait is
/// dropped, whichever comes first.
pub struct PendingSignalWait {
    name: String,
    queue: TimedSignalQueue<Payload>,
    signal: Arc<OnceLock<RemoteSignal>>,
}

impl PendingSignalWait {
    pub(crate) fn register(
        remote: Arc<dyn RemoteObject>,
        interface: &'static str,
        name: &str,
        reactor: ReactorHandle,
        translator: RemoteErrorTranslator,
    ) -> Result<Self> {
        let queue = TimedSignalQueue::new(reactor.clone());
        let slot: Arc<OnceLock<RemoteSignal>> = Arc::new(OnceLock::new());
        let delivered = Arc::new(AtomicBool::new(false));

        let callback: SignalCallback = {
            let queue = queue.clone();
            let slot = Arc::downgrade(&slot);
            Arc::new(move |payload: Payload| {
                if delivered.swap(true, Ordering::AcqRel) {
                    return;
                }
                queue.put(payload);
                if let Some(signal) = slot.upgrade().and_then(|s| s.get().cloned()) {
                    if let Err(e) = signal.cancel() {
                        warn!("Failed to cancel {} after delivery: {e}", signal.name());
                    }
                }
            })
        };

        let signal = RemoteSignal::register(remote, interface, name, reactor, translator, callback)?;
        let _ = slot.set(signal);

        Ok(Self {
            name: name.to_string(),
            queue,
            signal: slot,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The underlying subscription.
    pub fn signal(&self) -> Option<&RemoteSignal> {
        self.signal.get()
    }

    /// Waits for the signal. `None` waits forever.
    ///
    /// The subscription is cancelled before returning, whatever the outcome.
    pub fn get(&self, timeout: Option<Duration>) -> Result<Payload> {
        let result = self.queue.get(timeout);
        if let Some(signal) = self.signal.get() {
            if let Err(e) = signal.cancel() {
                debug!("Cancelling {} after wait failed: {e}", self.name);
            }
        }
        result
    }
}

impl Drop for PendingSignalWait {
    fn drop(&mut self) {
        if let Some(signal) = self.signal.get() {
            signal.cancel_detached();
        }
    }
}

impl std::fmt::Debug for PendingSignalWait {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingSignalWait")
            .field("name", &self.name)
            .field("buffered", &self.queue.buffered())
            .finish()
    }
}
