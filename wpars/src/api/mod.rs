//! Public API module.
//!
//! This module contains the high-level user-facing API for the `wpars` crate:
//! the driver, the proxies for each wpa_supplicant object, and the models they
//! exchange.

pub mod bss;
pub mod driver;
pub mod interface;
pub mod models;
pub mod network;
pub mod supplicant;
