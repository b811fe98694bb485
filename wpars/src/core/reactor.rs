//! The reactor: a dedicated thread owning all bus I/O.
//!
//! The reactor runs a current-thread tokio runtime on a named thread. Bus
//! calls, signal subscriptions and delivery, and timers all execute there.
//! Other threads hand work over with [`ReactorHandle::run_on`] and get a
//! [`Deferred`] back.

use futures::channel::oneshot;
use futures::future::{AbortHandle, Abortable, FutureExt, Shared};
use futures_timer::Delay;
use log::{debug, info, trace, warn};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};
use tokio::runtime::Handle;

use crate::Result;
use crate::api::models::WpaError;
use crate::core::deferred::Deferred;
use crate::types::constants::REACTOR_THREAD_NAME;

struct ReactorShared {
    runtime: Handle,
    thread_id: ThreadId,
    running: AtomicBool,
    stopped: Shared<oneshot::Receiver<()>>,
}

/// Cheap, cloneable access to a running [`Reactor`].
#[derive(Clone)]
pub struct ReactorHandle {
    shared: Arc<ReactorShared>,
}

impl std::fmt::Debug for ReactorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReactorHandle")
            .field("thread_id", &self.shared.thread_id)
            .field("running", &self.is_running())
            .finish()
    }
}

impl ReactorHandle {
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Whether the calling thread is the reactor thread.
    pub fn is_reactor_thread(&self) -> bool {
        thread::current().id() == self.shared.thread_id
    }

    pub(crate) fn ensure_running(&self) -> Result<()> {
        if self.is_running() {
            Ok(())
        } else {
            Err(WpaError::ReactorNotRunning(
                "the reactor must be running before talking to the bus".into(),
            ))
        }
    }

    /// Completes once the reactor has been stopped.
    pub(crate) fn stopped(&self) -> Shared<oneshot::Receiver<()>> {
        self.shared.stopped.clone()
    }

    /// Runs `thunk` on the reactor and returns a handle to its result.
    ///
    /// On the reactor thread the future is started in place; whatever is
    /// left after the first poll is driven by the reactor.
    pub fn run_on<T, F, Fut>(&self, thunk: F) -> Result<Deferred<T>>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        self.ensure_running()?;

        if self.is_reactor_thread() {
            let work = Deferred::new(thunk());
            if work.poll_in_place().is_some() {
                return Ok(work);
            }
            let (tx, rx) = oneshot::channel();
            self.shared.runtime.spawn(async move {
                let _ = tx.send(work.await);
            });
            return Ok(Deferred::from_receiver(rx));
        }

        let (tx, rx) = oneshot::channel();
        self.shared.runtime.spawn(async move {
            let _ = tx.send(thunk().await);
        });
        Ok(Deferred::from_receiver(rx))
    }

    /// Schedules `f` to run on the reactor after `delay`.
    ///
    /// A delay too large to be represented as a deadline never fires.
    pub fn call_later<F>(&self, delay: Duration, f: F) -> Result<DelayedCall>
    where
        F: FnOnce() + Send + 'static,
    {
        self.ensure_running()?;

        let fires = Instant::now().checked_add(delay).is_some();
        if !fires {
            debug!("Delay of {delay:?} is out of range, the call will never fire");
        }

        let (handle, registration) = AbortHandle::new_pair();
        let timer = Abortable::new(
            async move {
                if !fires {
                    return futures::future::pending().await;
                }
                Delay::new(delay).await;
                f();
            },
            registration,
        );
        self.shared.runtime.spawn(async move {
            if timer.await.is_err() {
                trace!("Delayed call cancelled");
            }
        });
        Ok(DelayedCall { handle })
    }
}

/// A callback scheduled with [`ReactorHandle::call_later`].
#[derive(Debug, Clone)]
pub struct DelayedCall {
    handle: AbortHandle,
}

impl DelayedCall {
    /// Prevents the callback from running if it has not run yet.
    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_cancelled(&self) -> bool {
        self.handle.is_aborted()
    }
}

/// Owns the reactor thread.
///
/// Stopping (or dropping) the reactor shuts the runtime down; work that has
/// not completed by then resolves to [`WpaError::ReactorNotRunning`]. This
/// includes signal waits that have no reactor task of their own.
///
/// ```no_run
/// use wpars::Reactor;
///
/// # fn main() -> wpars::Result<()> {
/// let mut reactor = Reactor::start()?;
/// assert!(reactor.handle().is_running());
/// reactor.stop();
/// # Ok(())
/// # }
/// ```
pub struct Reactor {
    handle: ReactorHandle,
    shutdown: Option<oneshot::Sender<()>>,
    stopped: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl Reactor {
    /// Spawns the reactor thread and waits until it is ready.
    pub fn start() -> Result<Self> {
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let (stopped_tx, stopped_rx) = oneshot::channel::<()>();

        let thread = thread::Builder::new()
            .name(REACTOR_THREAD_NAME.into())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };

                let shared = Arc::new(ReactorShared {
                    runtime: runtime.handle().clone(),
                    thread_id: thread::current().id(),
                    running: AtomicBool::new(true),
                    stopped: stopped_rx.shared(),
                });
                if ready_tx.send(Ok(shared.clone())).is_err() {
                    return;
                }

                runtime.block_on(async {
                    let _ = shutdown_rx.await;
                });
                shared.running.store(false, Ordering::Release);
                debug!("Reactor thread exiting");
            })
            .map_err(|e| {
                WpaError::ReactorNotRunning(format!("failed to spawn reactor thread: {e}"))
            })?;

        let shared = ready_rx
            .recv()
            .map_err(|_| WpaError::ReactorNotRunning("reactor thread died during startup".into()))?
            .map_err(|e| WpaError::ReactorNotRunning(format!("failed to build runtime: {e}")))?;

        info!("Reactor started on thread `{REACTOR_THREAD_NAME}`");
        Ok(Self {
            handle: ReactorHandle { shared },
            shutdown: Some(shutdown_tx),
            stopped: Some(stopped_tx),
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> ReactorHandle {
        self.handle.clone()
    }

    /// Stops the reactor and joins its thread. Calling it again is a no-op.
    pub fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            self.handle.shared.running.store(false, Ordering::Release);
            let _ = shutdown.send(());
        }
        // Wakes everything waiting on `ReactorHandle::stopped`.
        self.stopped.take();

        if let Some(thread) = self.thread.take() {
            if thread.thread().id() == thread::current().id() {
                warn!("Reactor stopped from its own thread, not joining");
                return;
            }
            if thread.join().is_err() {
                warn!("Reactor thread panicked");
            }
            info!("Reactor stopped");
        }
    }
}

impl Drop for Reactor {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;

    #[test]
    fn run_on_executes_on_the_reactor_thread() {
        let reactor = Reactor::start().unwrap();
        let handle = reactor.handle();
        assert!(!handle.is_reactor_thread());

        let observer = handle.clone();
        let deferred = handle
            .run_on(move || async move { Ok(observer.is_reactor_thread()) })
            .unwrap();
        assert_eq!(futures::executor::block_on(deferred), Ok(true));
    }

    #[test]
    fn run_on_starts_in_place_on_the_reactor_thread() {
        let reactor = Reactor::start().unwrap();
        let handle = reactor.handle();

        let inner = handle.clone();
        let outer = handle
            .run_on(move || async move {
                let nested = inner.run_on(|| async { Ok(5u32) })?;
                Ok(nested.is_called())
            })
            .unwrap();
        assert_eq!(futures::executor::block_on(outer), Ok(true));
    }

    #[test]
    fn stopped_reactor_refuses_work() {
        let mut reactor = Reactor::start().unwrap();
        let handle = reactor.handle();
        reactor.stop();
        reactor.stop();

        assert!(!handle.is_running());
        assert!(matches!(
            handle.run_on(|| async { Ok(()) }),
            Err(WpaError::ReactorNotRunning(_))
        ));
        assert!(matches!(
            handle.call_later(Duration::ZERO, || {}),
            Err(WpaError::ReactorNotRunning(_))
        ));
    }

    #[test]
    fn pending_work_fails_when_the_reactor_stops() {
        let mut reactor = Reactor::start().unwrap();
        let deferred = reactor
            .handle()
            .run_on(|| futures::future::pending::<Result<u32>>())
            .unwrap();
        reactor.stop();
        assert!(matches!(
            futures::executor::block_on(deferred),
            Err(WpaError::ReactorNotRunning(_))
        ));
    }

    #[test]
    fn call_later_fires_unless_cancelled() {
        let reactor = Reactor::start().unwrap();
        let handle = reactor.handle();

        let (tx, rx) = channel();
        let fired = tx.clone();
        handle
            .call_later(Duration::from_millis(10), move || {
                let _ = fired.send("fired");
            })
            .unwrap();

        let cancelled = handle
            .call_later(Duration::from_millis(50), move || {
                let _ = tx.send("cancelled");
            })
            .unwrap();
        cancelled.cancel();
        assert!(cancelled.is_cancelled());

        assert_eq!(rx.recv_timeout(Duration::from_secs(2)), Ok("fired"));
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    }

    #[test]
    fn stopping_completes_the_stopped_future() {
        let mut reactor = Reactor::start().unwrap();
        let stopped = reactor.handle().stopped();
        assert!(stopped.clone().now_or_never().is_none());

        reactor.stop();
        assert!(futures::executor::block_on(stopped).is_err());
    }

    #[test]
    fn out_of_range_delay_never_fires() {
        let reactor = Reactor::start().unwrap();
        let handle = reactor.handle();

        let (tx, rx) = channel();
        let never = handle
            .call_later(Duration::MAX, move || {
                let _ = tx.send(());
            })
            .unwrap();
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert!(!never.is_cancelled());

        let still_working = handle.run_on(|| async { Ok(1u8) }).unwrap();
        assert_eq!(futures::executor::block_on(still_working), Ok(1));
    }

    #[test]
    fn reactor_thread_is_named() {
        let reactor = Reactor::start().unwrap();
        let deferred = reactor
            .handle()
            .run_on(|| async { Ok(thread::current().name().map(str::to_owned)) })
            .unwrap();
        assert_eq!(
            futures::executor::block_on(deferred),
            Ok(Some(REACTOR_THREAD_NAME.to_string()))
        );
    }
}
