//! Constants for wpa_supplicant D-Bus names and values.
//!
//! These correspond to the service, object paths, interface names and error
//! names published by wpa_supplicant's D-Bus API, plus the numeric bounds used
//! by the derived BSS values.

/// Well-known bus names and object paths.
pub mod bus {
    /// Service name claimed by wpa_supplicant on the bus.
    pub const SERVICE: &str = "fi.w1.wpa_supplicant1";

    /// Object path of the root wpa_supplicant object.
    pub const ROOT_PATH: &str = "/fi/w1/wpa_supplicant1";

    /// Path used by wpa_supplicant to mean "no object".
    pub const NO_OBJECT: &str = "/";
}

/// D-Bus interface names.
pub mod interfaces {
    pub const ROOT: &str = "fi.w1.wpa_supplicant1";
    pub const INTERFACE: &str = "fi.w1.wpa_supplicant1.Interface";
    pub const BSS: &str = "fi.w1.wpa_supplicant1.BSS";
    pub const NETWORK: &str = "fi.w1.wpa_supplicant1.Network";
    pub const PROPERTIES: &str = "org.freedesktop.DBus.Properties";
}

/// Named errors returned by the daemon.
pub mod remote_errors {
    pub const UNKNOWN_ERROR: &str = "fi.w1.wpa_supplicant1.UnknownError";
    pub const INVALID_ARGS: &str = "fi.w1.wpa_supplicant1.InvalidArgs";
    pub const INTERFACE_EXISTS: &str = "fi.w1.wpa_supplicant1.InterfaceExists";
    pub const INTERFACE_UNKNOWN: &str = "fi.w1.wpa_supplicant1.InterfaceUnknown";
    pub const NOT_CONNECTED: &str = "fi.w1.wpa_supplicant1.NotConnected";
    pub const NETWORK_UNKNOWN: &str = "fi.w1.wpa_supplicant1.NetworkUnknown";

    /// Raised by the bus itself when a call carries the wrong signature.
    pub const DBUS_INVALID_ARGS: &str = "org.freedesktop.DBus.Error.InvalidArgs";
    pub const DBUS_UNKNOWN_METHOD: &str = "org.freedesktop.DBus.Error.UnknownMethod";
}

/// Names of the signals this crate subscribes to.
pub mod signals {
    pub const SCAN_DONE: &str = "ScanDone";
    pub const INTERFACE_ADDED: &str = "InterfaceAdded";
    pub const INTERFACE_REMOVED: &str = "InterfaceRemoved";
    pub const PROPERTIES_CHANGED: &str = "PropertiesChanged";
}

/// Timeouts for signal-based waiting.
pub mod timeouts {
    use std::time::Duration;

    /// How long a blocking scan waits for `ScanDone` (10 seconds).
    const SCAN_TIMEOUT_SECS: u64 = 10;

    /// Returns the default blocking-scan timeout.
    pub fn scan_timeout() -> Duration {
        Duration::from_secs(SCAN_TIMEOUT_SECS)
    }
}

/// 2.4GHz frequency constants (MHz)
pub mod frequency {
    pub const BAND_2_4_START: u32 = 2412;
    pub const BAND_2_4_END: u32 = 2472;
    pub const BAND_2_4_CH14: u32 = 2484;
    pub const CHANNEL_SPACING: u32 = 5;
}

/// Signal level thresholds for the dBm to percentage conversion
pub mod signal_quality {
    pub const FLOOR_DBM: i32 = -100;
    pub const CEILING_DBM: i32 = -50;
}

/// Thread name given to the reactor thread.
pub const REACTOR_THREAD_NAME: &str = "wpars-reactor";
