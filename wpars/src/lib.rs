//! A Rust client for wpa_supplicant over D-Bus.
//!
//! wpa_supplicant exposes its control interface on the system bus under
//! `fi.w1.wpa_supplicant1`. This crate wraps that interface in plain,
//! blocking-friendly proxies:
//!
//! - [`WpaSupplicant`] for the root object (interfaces, debug settings)
//! - [`Interface`] for scanning and managing network blocks
//! - [`Bss`] for scan results (SSID, channel, signal, security)
//! - [`Network`] for configured network blocks
//!
//! All bus traffic runs on a dedicated [`Reactor`] thread. Proxy methods can
//! be called from any other thread; they hand their work to the reactor and
//! wait for the result.
//!
//! # Example
//!
//! ```no_run
//! use wpars::{BusObject, Reactor, ScanOptions, ScanType, WpaSupplicantDriver};
//!
//! # fn main() -> wpars::Result<()> {
//! let reactor = Reactor::start()?;
//! let supplicant = WpaSupplicantDriver::new(reactor.handle()).connect()?;
//!
//! let wlan0 = supplicant.get_interface("wlan0")?;
//! let bsss = wlan0
//!     .scan(&ScanOptions::new(ScanType::Active), true)?
//!     .unwrap_or_default();
//! for bss in &bsss {
//!     println!("{}", bss.summary());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! All operations return `Result<T, WpaError>`. Errors raised by
//! wpa_supplicant are translated by name into specific variants such as
//! [`WpaError::InterfaceExists`] or [`WpaError::NotConnected`]. Unknown
//! remote errors keep their name in [`WpaError::UnknownRemoteError`]. The
//! table used for the translation can be replaced through
//! [`DriverConfig::with_error_table`].
//!
//! # Signals
//!
//! Signals can be observed with [`BusObject::register_signal`], which calls
//! a callback for every emission until the returned [`RemoteSignal`] is
//! cancelled, or awaited once with [`BusObject::register_signal_once`]:
//!
//! ```no_run
//! use std::time::Duration;
//! use wpars::{BusObject, DriverConfig, Reactor, WpaSupplicantDriver};
//!
//! # fn main() -> wpars::Result<()> {
//! let reactor = Reactor::start()?;
//! let config = DriverConfig::new().with_scan_timeout(Duration::from_secs(10));
//! let supplicant = WpaSupplicantDriver::with_config(reactor.handle(), config).connect()?;
//!
//! let wait = supplicant.register_signal_once("InterfaceAdded")?;
//! let payload = wait.get(Some(Duration::from_secs(30)))?;
//! println!("{} argument(s)", payload.len());
//! # Ok(())
//! # }
//! ```
//!
//! # Logging
//!
//! This crate uses the [`log`](https://docs.rs/log) facade for logging. To see
//! log output, add a logging implementation like `env_logger`. For example:

//! ```no_run,ignore
//! env_logger::init();
//! // ...
//! ```

// Internal implementation modules
mod types;
mod util;

// Public API modules
pub mod api;
pub mod core;
pub mod dbus;

// Re-exported public API
pub use api::bss::Bss;
pub use api::driver::WpaSupplicantDriver;
pub use api::interface::Interface;
pub use api::models::{
    BssSummary, BusAddress, CreateInterfaceArgs, DriverConfig, InterfaceState, NetworkConfig,
    NetworkType, ScanOptions, ScanType, SecurityInfo, WpaError,
};
pub use api::network::Network;
pub use api::supplicant::WpaSupplicant;
pub use crate::core::bridge::evaluate;
pub use crate::core::deferred::Deferred;
pub use crate::core::error_translation::{ErrorConstructor, ErrorTable, RemoteErrorTranslator};
pub use crate::core::object::{BusObject, ObjectCore};
pub use crate::core::reactor::{DelayedCall, Reactor, ReactorHandle};
pub use crate::core::signal::{PendingSignalWait, RemoteSignal, SignalState};
pub use crate::core::signal_queue::TimedSignalQueue;
pub use dbus::transport::Payload;

/// A specialized `Result` type for wpa_supplicant operations.
pub type Result<T> = std::result::Result<T, WpaError>;
