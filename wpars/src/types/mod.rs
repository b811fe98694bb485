//! Type definitions and constants.
//!
//! This module contains wpa_supplicant D-Bus names and numeric constants.

pub(crate) mod constants;
