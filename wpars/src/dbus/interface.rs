//! wpa_supplicant interface proxy.

use std::collections::HashMap;
use zbus::{Result, proxy};
use zvariant::{ObjectPath, OwnedObjectPath, Value};

/// Proxy for `fi.w1.wpa_supplicant1.Interface`.
///
/// Scanning and network block management for one controlled interface.
#[proxy(
    interface = "fi.w1.wpa_supplicant1.Interface",
    default_service = "fi.w1.wpa_supplicant1",
    gen_blocking = false
)]
pub trait WpasInterface {
    /// Triggers a scan. Completion is reported by the `ScanDone` signal.
    fn scan(&self, args: HashMap<&str, &Value<'_>>) -> Result<()>;

    /// Adds a network block and returns its path.
    fn add_network(&self, args: HashMap<&str, &Value<'_>>) -> Result<OwnedObjectPath>;

    fn remove_network(&self, path: &ObjectPath<'_>) -> Result<()>;

    fn select_network(&self, path: &ObjectPath<'_>) -> Result<()>;

    /// Disconnects from the current network.
    fn disconnect(&self) -> Result<()>;
}
