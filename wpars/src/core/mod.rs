//! Core machinery bridging callers and the bus.
//!
//! This module contains the reactor that owns all bus I/O, the deferred
//! results it hands out and the bridge that evaluates them on caller
//! threads, the timed signal queue, error translation, signal subscriptions,
//! and the object core shared by all proxies.

pub mod bridge;
pub mod deferred;
pub mod error_translation;
pub mod object;
pub mod reactor;
pub mod signal;
pub mod signal_queue;
