use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use thiserror::Error;
use zvariant::Value;

use crate::core::error_translation::ErrorTable;
use crate::types::constants::timeouts;

/// Errors that can occur while talking to wpa_supplicant.
///
/// Every variant carries a human-readable message. Remote-side failures are
/// translated into the matching variant by the crate's error translator;
/// names the translator does not know end up as [`WpaError::UnknownRemoteError`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WpaError {
    /// Something failed for an unknown reason.
    #[error("unknown error: {0}")]
    UnknownError(String),

    /// A wait on a signal queue timed out (e.g. a blocking scan).
    #[error("method timed out: {0}")]
    MethodTimeout(String),

    /// wpa_supplicant already controls this interface.
    #[error("interface already exists: {0}")]
    InterfaceExists(String),

    /// Invalid entries were found in the passed arguments.
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    /// The path does not exist or does not represent an interface.
    #[error("interface unknown: {0}")]
    InterfaceUnknown(String),

    /// The interface is not connected to any network.
    #[error("not connected: {0}")]
    NotConnected(String),

    /// The path does not point to any network object.
    #[error("network unknown: {0}")]
    NetworkUnknown(String),

    /// The reactor must be running before talking to the bus.
    #[error("reactor not running: {0}")]
    ReactorNotRunning(String),

    /// The daemon returned an error name this crate does not recognize.
    #[error("unrecognized remote error {name}: {message}")]
    UnknownRemoteError {
        /// Fully qualified D-Bus error name.
        name: String,
        /// Message sent along with the error.
        message: String,
    },

    /// A BSS reported a frequency outside the 2.4GHz channel plan.
    #[error("unexpected frequency in Wi-Fi connection: {0} MHz")]
    UnexpectedFrequency(u32),

    /// A property or signal argument had an unexpected type or shape.
    #[error("unexpected value for {name}: {reason}")]
    UnexpectedValue {
        /// Property or argument name.
        name: String,
        /// Why the value could not be used.
        reason: String,
    },

    /// A blocking wait was attempted on the reactor thread itself.
    #[error("cannot block the reactor thread: {0}")]
    Reentrant(String),

    /// The bus connection failed below the level of named remote errors.
    #[error("D-Bus transport error: {0}")]
    Transport(String),
}

/// Which message bus to connect to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BusAddress {
    /// The system bus, where wpa_supplicant normally lives.
    #[default]
    System,
    /// The session bus of the current user (useful for test daemons).
    Session,
}

impl Display for BusAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::Session => write!(f, "session"),
        }
    }
}

/// Configuration for a [`WpaSupplicantDriver`](crate::WpaSupplicantDriver).
///
/// ```
/// use std::time::Duration;
/// use wpars::{BusAddress, DriverConfig};
///
/// let config = DriverConfig::new()
///     .with_bus(BusAddress::Session)
///     .with_scan_timeout(Duration::from_secs(30));
/// assert_eq!(config.scan_timeout, Duration::from_secs(30));
/// ```
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Bus the driver connects to.
    pub bus: BusAddress,
    /// How long a blocking scan waits for the `ScanDone` signal.
    pub scan_timeout: Duration,
    /// Replacement for the built-in remote error table.
    pub error_table: Option<ErrorTable>,
}

impl DriverConfig {
    /// Creates a configuration with the default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the bus to connect to.
    pub fn with_bus(mut self, bus: BusAddress) -> Self {
        self.bus = bus;
        self
    }

    /// Sets the blocking-scan timeout.
    pub fn with_scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }

    /// Replaces the table used to translate remote error names.
    pub fn with_error_table(mut self, table: ErrorTable) -> Self {
        self.error_table = Some(table);
        self
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            bus: BusAddress::System,
            scan_timeout: timeouts::scan_timeout(),
            error_table: None,
        }
    }
}

/// State of a wpa_supplicant interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterfaceState {
    Disconnected,
    Inactive,
    Scanning,
    Authenticating,
    Associating,
    Associated,
    FourWayHandshake,
    GroupHandshake,
    Completed,
    Unknown,
}

impl From<&str> for InterfaceState {
    fn from(s: &str) -> Self {
        match s {
            "disconnected" => Self::Disconnected,
            "inactive" => Self::Inactive,
            "scanning" => Self::Scanning,
            "authenticating" => Self::Authenticating,
            "associating" => Self::Associating,
            "associated" => Self::Associated,
            "4way_handshake" => Self::FourWayHandshake,
            "group_handshake" => Self::GroupHandshake,
            "completed" => Self::Completed,
            _ => Self::Unknown,
        }
    }
}

impl Display for InterfaceState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Inactive => write!(f, "inactive"),
            Self::Scanning => write!(f, "scanning"),
            Self::Authenticating => write!(f, "authenticating"),
            Self::Associating => write!(f, "associating"),
            Self::Associated => write!(f, "associated"),
            Self::FourWayHandshake => write!(f, "4way_handshake"),
            Self::GroupHandshake => write!(f, "group_handshake"),
            Self::Completed => write!(f, "completed"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Kind of scan to request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanType {
    #[default]
    Active,
    Passive,
}

impl Display for ScanType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Passive => write!(f, "passive"),
        }
    }
}

impl std::str::FromStr for ScanType {
    type Err = WpaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "passive" => Ok(Self::Passive),
            other => Err(WpaError::InvalidArgs(format!("unknown scan type `{other}`"))),
        }
    }
}

/// Options for `Interface::scan`.
///
/// Maps onto the `a{sv}` dictionary accepted by the `Scan` method. Empty
/// lists and unset flags are left out of the request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanOptions {
    /// Active or passive scan.
    pub scan_type: ScanType,
    /// SSIDs to probe for (active scans only).
    pub ssids: Vec<Vec<u8>>,
    /// Information elements to add to probe requests.
    pub ies: Vec<Vec<u8>>,
    /// Whether the scan may trigger roaming.
    pub allow_roam: Option<bool>,
}

impl ScanOptions {
    pub fn new(scan_type: ScanType) -> Self {
        Self {
            scan_type,
            ..Self::default()
        }
    }

    /// Adds an SSID to probe for.
    pub fn with_ssid(mut self, ssid: impl Into<Vec<u8>>) -> Self {
        self.ssids.push(ssid.into());
        self
    }

    /// Adds a raw information element.
    pub fn with_ie(mut self, ie: impl Into<Vec<u8>>) -> Self {
        self.ies.push(ie.into());
        self
    }

    pub fn with_allow_roam(mut self, allow: bool) -> Self {
        self.allow_roam = Some(allow);
        self
    }
}

/// Arguments for `WpaSupplicant::create_interface`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateInterfaceArgs {
    /// Name of the network interface to control, e.g. `wlan0`.
    pub ifname: String,
    /// Bridge interface to control, e.g. `br0`.
    pub bridge_ifname: Option<String>,
    /// Driver backend, e.g. `nl80211`.
    pub driver: Option<String>,
    /// Configuration file for the new interface.
    pub config_file: Option<String>,
}

impl CreateInterfaceArgs {
    pub fn new(ifname: impl Into<String>) -> Self {
        Self {
            ifname: ifname.into(),
            ..Self::default()
        }
    }

    pub fn with_bridge_ifname(mut self, bridge: impl Into<String>) -> Self {
        self.bridge_ifname = Some(bridge.into());
        self
    }

    pub fn with_driver(mut self, driver: impl Into<String>) -> Self {
        self.driver = Some(driver.into());
        self
    }

    pub fn with_config_file(mut self, path: impl Into<String>) -> Self {
        self.config_file = Some(path.into());
        self
    }
}

/// A network block to hand to `Interface::add_network`.
///
/// Keys are the ones used in the `network` block of `wpa_supplicant.conf`.
///
/// ```
/// use wpars::NetworkConfig;
///
/// let cfg = NetworkConfig::new()
///     .ssid("HomeNet")
///     .psk("correct horse")
///     .key_mgmt("WPA-PSK");
/// assert_eq!(cfg.len(), 3);
/// ```
#[derive(Debug, Default)]
pub struct NetworkConfig {
    entries: BTreeMap<String, Value<'static>>,
}

impl NetworkConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an arbitrary key.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value<'static>>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    pub fn ssid(self, ssid: impl Into<String>) -> Self {
        self.set("ssid", ssid.into())
    }

    pub fn psk(self, psk: impl Into<String>) -> Self {
        self.set("psk", psk.into())
    }

    pub fn key_mgmt(self, key_mgmt: impl Into<String>) -> Self {
        self.set("key_mgmt", key_mgmt.into())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn entries(&self) -> &BTreeMap<String, Value<'static>> {
        &self.entries
    }
}

/// Security type advertised by a BSS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkType {
    Wpa2,
    Wpa,
    Wep,
    Open,
}

impl Display for NetworkType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Wpa2 => write!(f, "WPA2"),
            Self::Wpa => write!(f, "WPA"),
            Self::Wep => write!(f, "WEP"),
            Self::Open => write!(f, "OPEN"),
        }
    }
}

/// WPA or RSN information of a BSS.
///
/// An empty `key_mgmt` list means the BSS does not support this protocol.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityInfo {
    /// Key management suites, e.g. `wpa-psk`, `wpa-eap`.
    pub key_mgmt: Vec<String>,
    /// Pairwise ciphers, e.g. `ccmp`, `tkip`.
    pub pairwise: Vec<String>,
    /// Group cipher.
    pub group: String,
    /// Management group cipher, if advertised.
    pub mgmt_group: Option<String>,
}

impl SecurityInfo {
    pub fn is_supported(&self) -> bool {
        !self.key_mgmt.is_empty()
    }
}

/// Best-effort summary of a BSS.
///
/// Produced by `Bss::summary`; fields that could not be read are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BssSummary {
    pub ssid: Option<String>,
    pub bssid: Option<String>,
    pub channel: Option<u32>,
    pub privacy: Option<bool>,
    pub wpa: Option<SecurityInfo>,
    pub rsn: Option<SecurityInfo>,
    pub signal_dbm: Option<i16>,
    pub signal_quality: Option<u8>,
    pub network_type: Option<NetworkType>,
}

impl Display for BssSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let ssid = self.ssid.as_deref().unwrap_or("<unknown>");
        let bssid = self.bssid.as_deref().unwrap_or("??");
        write!(f, "{ssid} [{bssid}]")?;
        if let Some(channel) = self.channel {
            write!(f, " ch {channel}")?;
        }
        if let Some(dbm) = self.signal_dbm {
            write!(f, " {dbm}dBm")?;
        }
        if let Some(quality) = self.signal_quality {
            write!(f, " ({quality}%)")?;
        }
        if let Some(kind) = self.network_type {
            write!(f, " {kind}")?;
        }
        Ok(())
    }
}
