//! D-Bus plumbing for wpa_supplicant.
//!
//! This module contains the transport traits the rest of the crate talks
//! through, the declared interface schemas, the low-level `zbus` proxy
//! definitions and the `zbus`-backed transport.

mod interface;
pub mod schema;
mod supplicant;
pub mod transport;
pub mod zbus_transport;

pub(crate) use interface::WpasInterfaceProxy;
pub(crate) use supplicant::WpasProxy;
