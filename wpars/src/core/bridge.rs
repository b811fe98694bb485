//! Hands reactor results back to the calling thread.

use log::trace;

use crate::Result;
use crate::api::models::WpaError;
use crate::core::deferred::Deferred;
use crate::core::reactor::ReactorHandle;

/// Returns the outcome of `deferred` on the calling thread.
///
/// An already called deferred yields its recorded outcome right away, on any
/// thread. Otherwise a foreign thread blocks until the reactor completes it.
/// The reactor thread itself cannot block on its own work: if the deferred
/// does not complete in place there, [`WpaError::Reentrant`] is returned.
pub fn evaluate<T>(deferred: &Deferred<T>, reactor: &ReactorHandle) -> Result<T>
where
    T: Clone + Send + Sync + 'static,
{
    if let Some(result) = deferred.peek() {
        return result;
    }

    if reactor.is_reactor_thread() {
        return deferred.poll_in_place().unwrap_or_else(|| {
            Err(WpaError::Reentrant(
                "result is not available yet and the reactor thread cannot wait for it".into(),
            ))
        });
    }

    trace!("Blocking until the reactor delivers a result");
    futures::executor::block_on(deferred.clone())
}
