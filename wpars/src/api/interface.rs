//! A network interface controlled by wpa_supplicant.

use log::{debug, warn};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use zvariant::{ObjectPath, OwnedObjectPath, OwnedValue, Value};

use crate::Result;
use crate::api::bss::Bss;
use crate::api::models::{InterfaceState, NetworkConfig, ScanOptions, WpaError};
use crate::api::network::Network;
use crate::core::object::{BusContext, BusObject, ObjectCore};
use crate::core::signal::RemoteSignal;
use crate::dbus::schema::{INTERFACE_SCHEMA, InterfaceSchema};
use crate::dbus::transport::Payload;
use crate::types::constants::signals;
use crate::util::utils::{non_root_path, owned_value, payload_arg};

/// Proxy for `fi.w1.wpa_supplicant1.Interface`.
#[derive(Debug, Clone)]
pub struct Interface {
    core: ObjectCore,
}

impl BusObject for Interface {
    const SCHEMA: &'static InterfaceSchema = &INTERFACE_SCHEMA;

    fn core(&self) -> &ObjectCore {
        &self.core
    }
}

/// Builds the `a{sv}` argument of `Scan`.
fn scan_args(options: &ScanOptions) -> Result<OwnedValue> {
    let mut dict: HashMap<&str, Value<'_>> = HashMap::new();
    dict.insert("Type", Value::from(options.scan_type.to_string()));
    if !options.ssids.is_empty() {
        dict.insert("SSIDs", Value::from(options.ssids.clone()));
    }
    if !options.ies.is_empty() {
        dict.insert("IEs", Value::from(options.ies.clone()));
    }
    if let Some(allow) = options.allow_roam {
        dict.insert("AllowRoam", Value::from(allow));
    }
    owned_value(dict)
}

/// Builds the `a{sv}` argument of `AddNetwork`.
fn network_args(config: &NetworkConfig) -> Result<OwnedValue> {
    let mut dict: HashMap<&str, Value<'_>> = HashMap::new();
    for (key, value) in config.entries() {
        let value = value
            .try_clone()
            .map_err(|e| WpaError::InvalidArgs(format!("network entry `{key}`: {e}")))?;
        dict.insert(key.as_str(), value);
    }
    owned_value(dict)
}

impl Interface {
    pub(crate) fn new(ctx: &BusContext, path: OwnedObjectPath) -> Result<Self> {
        Ok(Self {
            core: ObjectCore::resolve(ctx, path, Self::SCHEMA)?,
        })
    }

    /// Triggers a scan.
    ///
    /// Without `block` this returns `None` as soon as the request is
    /// accepted. With `block` it waits for `ScanDone` (up to the configured
    /// scan timeout) and returns the BSSs found.
    pub fn scan(&self, options: &ScanOptions, block: bool) -> Result<Option<Vec<Bss>>> {
        let args = vec![scan_args(options)?];

        if !block {
            self.core.call_remote("Scan", args)?;
            return Ok(None);
        }

        // Subscribe before triggering so a fast ScanDone is not missed
        let wait = self.register_signal_once(signals::SCAN_DONE)?;
        self.core.call_remote("Scan", args)?;
        debug!("Scan requested on {}, waiting for ScanDone", self.path());

        let timeout = self.core.context().config.scan_timeout;
        let payload = wait.get(Some(timeout))?;
        let success: bool = payload_arg(&payload, 0, signals::SCAN_DONE)?;
        if !success {
            return Err(WpaError::UnknownError(
                "ScanDone signal received without success".into(),
            ));
        }

        Ok(Some(self.bsss()?))
    }

    /// Adds a network block and returns its proxy.
    pub fn add_network(&self, config: &NetworkConfig) -> Result<Network> {
        let reply = self
            .core
            .call_remote("AddNetwork", vec![network_args(config)?])?;
        let path: OwnedObjectPath = payload_arg(&reply, 0, "AddNetwork")?;
        debug!("Added network {path}");
        Network::new(self.core.context(), path)
    }

    /// Removes the network block at `path`.
    ///
    /// Fails with [`WpaError::NetworkUnknown`] if there is no such network.
    pub fn remove_network(&self, path: &ObjectPath<'_>) -> Result<()> {
        self.core
            .call_remote("RemoveNetwork", vec![owned_value(path.clone())?])?;
        Ok(())
    }

    /// Selects the network block at `path`, disabling all others.
    pub fn select_network(&self, path: &ObjectPath<'_>) -> Result<()> {
        self.core
            .call_remote("SelectNetwork", vec![owned_value(path.clone())?])?;
        Ok(())
    }

    /// Disconnects from the current network.
    ///
    /// Fails with [`WpaError::NotConnected`] when not connected.
    pub fn disconnect(&self) -> Result<()> {
        self.core.call_remote("Disconnect", Vec::new())?;
        Ok(())
    }

    /// Name of the network interface, e.g. `wlan0`.
    pub fn ifname(&self) -> Result<String> {
        self.core.property("Ifname")
    }

    pub fn state(&self) -> Result<InterfaceState> {
        let state: String = self.core.property("State")?;
        Ok(InterfaceState::from(state.as_str()))
    }

    pub fn scanning(&self) -> Result<bool> {
        self.core.property("Scanning")
    }

    /// Seconds between scans when looking for a network.
    pub fn scan_interval(&self) -> Result<i32> {
        self.core.property("ScanInterval")
    }

    pub fn set_scan_interval(&self, seconds: i32) -> Result<()> {
        self.set("ScanInterval", seconds)
    }

    pub fn fast_reauth(&self) -> Result<bool> {
        self.core.property("FastReauth")
    }

    /// Paths of the BSSs seen by the last scans.
    pub fn bss_paths(&self) -> Result<Vec<OwnedObjectPath>> {
        self.core.property("BSSs")
    }

    /// Proxies for the BSSs seen by the last scans.
    pub fn bsss(&self) -> Result<Vec<Bss>> {
        self.bss_paths()?
            .into_iter()
            .map(|path| Bss::new(self.core.context(), path))
            .collect()
    }

    /// The BSS the interface is associated with, if any.
    pub fn current_bss(&self) -> Result<Option<Bss>> {
        let path: OwnedObjectPath = self.core.property("CurrentBSS")?;
        non_root_path(path)
            .map(|path| Bss::new(self.core.context(), path))
            .transpose()
    }

    /// The network the interface is associated with, if any.
    pub fn current_network(&self) -> Result<Option<Network>> {
        let path: OwnedObjectPath = self.core.property("CurrentNetwork")?;
        non_root_path(path)
            .map(|path| Network::new(self.core.context(), path))
            .transpose()
    }

    /// Proxies for the configured networks.
    pub fn networks(&self) -> Result<Vec<Network>> {
        let paths: Vec<OwnedObjectPath> = self.core.property("Networks")?;
        paths
            .into_iter()
            .filter_map(non_root_path)
            .map(|path| Network::new(self.core.context(), path))
            .collect()
    }

    /// Driver backend, e.g. `nl80211`.
    pub fn driver(&self) -> Result<String> {
        self.core.property("Driver")
    }

    /// Two-letter regulatory country code.
    pub fn country(&self) -> Result<String> {
        self.core.property("Country")
    }

    pub fn set_country(&self, country_code: &str) -> Result<()> {
        self.set("Country", country_code)
    }

    pub fn bridge_ifname(&self) -> Result<String> {
        self.core.property("BridgeIfname")
    }

    /// Seconds after which an unseen BSS is dropped.
    pub fn bss_expire_age(&self) -> Result<u32> {
        self.core.property("BSSExpireAge")
    }

    /// Number of scans after which an unseen BSS is dropped.
    pub fn bss_expire_count(&self) -> Result<u32> {
        self.core.property("BSSExpireCount")
    }

    pub fn ap_scan(&self) -> Result<u32> {
        self.core.property("ApScan")
    }

    pub fn set_ap_scan(&self, mode: u32) -> Result<()> {
        self.set("ApScan", mode)
    }

    /// Capabilities of the interface, keyed by kind (`Pairwise`, `KeyMgmt`, ...).
    pub fn capabilities(&self) -> Result<HashMap<String, OwnedValue>> {
        self.core.property("Capabilities")
    }

    /// Calls `callback` with the success flag of every completed scan.
    pub fn on_scan_done<F>(&self, callback: F) -> Result<RemoteSignal>
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.register_signal(signals::SCAN_DONE, move |payload: Payload| {
            match payload_arg::<bool>(&payload, 0, signals::SCAN_DONE) {
                Ok(success) => callback(success),
                Err(e) => warn!("Ignoring malformed ScanDone: {e}"),
            }
        })
    }
}

impl Display for Interface {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = self.ifname().unwrap_or_else(|_| "?".into());
        let state = self
            .state()
            .map(|s| s.to_string())
            .unwrap_or_else(|_| "?".into());
        write!(
            f,
            "Interface(Path: {}, Name: {name}, State: {state})",
            self.path()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::ScanType;
    use crate::util::utils::value_as;

    fn as_dict(value: &OwnedValue) -> HashMap<String, OwnedValue> {
        value_as("args", value).unwrap()
    }

    #[test]
    fn scan_args_only_carry_set_options() {
        let args = as_dict(&scan_args(&ScanOptions::new(ScanType::Passive)).unwrap());
        assert_eq!(args.len(), 1);
        assert_eq!(value_as::<String>("Type", &args["Type"]), Ok("passive".into()));
    }

    #[test]
    fn scan_args_with_everything() {
        let options = ScanOptions::new(ScanType::Active)
            .with_ssid("cafe")
            .with_ie(vec![0xdd, 0x01, 0x00])
            .with_allow_roam(false);
        let args = as_dict(&scan_args(&options).unwrap());
        assert_eq!(
            value_as::<Vec<Vec<u8>>>("SSIDs", &args["SSIDs"]),
            Ok(vec![b"cafe".to_vec()])
        );
        assert_eq!(value_as::<bool>("AllowRoam", &args["AllowRoam"]), Ok(false));
        assert!(args.contains_key("IEs"));
    }

    #[test]
    fn network_args_keep_every_entry() {
        let cfg = NetworkConfig::new()
            .ssid("HomeNet")
            .psk("secret")
            .set("priority", 5i32);
        let args = as_dict(&network_args(&cfg).unwrap());
        assert_eq!(args.len(), 3);
        assert_eq!(value_as::<String>("ssid", &args["ssid"]), Ok("HomeNet".into()));
        assert_eq!(value_as::<i32>("priority", &args["priority"]), Ok(5));
    }
}
