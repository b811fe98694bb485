//! wpa_supplicant root object proxy.

use std::collections::HashMap;
use zbus::{Result, proxy};
use zvariant::{ObjectPath, OwnedObjectPath, Value};

/// Proxy for the root `fi.w1.wpa_supplicant1` interface.
///
/// Manages the set of network interfaces wpa_supplicant controls.
#[proxy(
    interface = "fi.w1.wpa_supplicant1",
    default_service = "fi.w1.wpa_supplicant1",
    default_path = "/fi/w1/wpa_supplicant1",
    gen_blocking = false
)]
pub trait Wpas {
    /// Registers a network interface. Returns the new interface's path.
    fn create_interface(&self, args: HashMap<&str, &Value<'_>>) -> Result<OwnedObjectPath>;

    /// Looks up an already controlled interface by name.
    fn get_interface(&self, ifname: &str) -> Result<OwnedObjectPath>;

    /// Deregisters the interface at `path`.
    fn remove_interface(&self, path: &ObjectPath<'_>) -> Result<()>;
}
