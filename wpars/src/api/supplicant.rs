//! The root wpa_supplicant object.

use log::{debug, warn};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use zvariant::{ObjectPath, OwnedObjectPath, OwnedValue, Value};

use crate::Result;
use crate::api::bss::Bss;
use crate::api::interface::Interface;
use crate::api::models::CreateInterfaceArgs;
use crate::api::network::Network;
use crate::core::object::{BusContext, BusObject, ObjectCore};
use crate::core::signal::RemoteSignal;
use crate::dbus::schema::{InterfaceSchema, ROOT_SCHEMA};
use crate::dbus::transport::Payload;
use crate::types::constants::{bus, signals};
use crate::util::utils::{owned_value, payload_arg};

/// Proxy for the root `fi.w1.wpa_supplicant1` object.
///
/// Interfaces looked up with [`get_interface`](Self::get_interface) are
/// cached by object path until removed with
/// [`remove_interface`](Self::remove_interface).
#[derive(Debug, Clone)]
pub struct WpaSupplicant {
    core: ObjectCore,
    interfaces: Arc<Mutex<HashMap<OwnedObjectPath, Interface>>>,
}

impl BusObject for WpaSupplicant {
    const SCHEMA: &'static InterfaceSchema = &ROOT_SCHEMA;

    fn core(&self) -> &ObjectCore {
        &self.core
    }
}

impl WpaSupplicant {
    pub(crate) fn new(ctx: &BusContext) -> Result<Self> {
        let path = OwnedObjectPath::from(ObjectPath::from_static_str_unchecked(bus::ROOT_PATH));
        Ok(Self {
            core: ObjectCore::resolve(ctx, path, Self::SCHEMA)?,
            interfaces: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    fn cache(&self) -> MutexGuard<'_, HashMap<OwnedObjectPath, Interface>> {
        self.interfaces
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn interface_at(&self, path: OwnedObjectPath) -> Result<Interface> {
        if let Some(iface) = self.cache().get(&path) {
            return Ok(iface.clone());
        }

        let iface = Interface::new(self.core.context(), path.clone())?;
        Ok(self.cache().entry(path).or_insert(iface).clone())
    }

    /// Returns the interface wpa_supplicant already controls under `ifname`.
    ///
    /// Fails with [`WpaError::InterfaceUnknown`](crate::WpaError::InterfaceUnknown)
    /// if there is none.
    pub fn get_interface(&self, ifname: &str) -> Result<Interface> {
        let reply = self
            .core
            .call_remote_direct("GetInterface", vec![owned_value(ifname)?])?;
        let path: OwnedObjectPath = payload_arg(&reply, 0, "GetInterface")?;
        debug!("Interface {ifname} is at {path}");
        self.interface_at(path)
    }

    /// Registers a network interface with wpa_supplicant.
    ///
    /// Fails with [`WpaError::InterfaceExists`](crate::WpaError::InterfaceExists)
    /// if it is already registered.
    pub fn create_interface(&self, args: &CreateInterfaceArgs) -> Result<Interface> {
        let mut dict: HashMap<&str, Value<'_>> = HashMap::new();
        dict.insert("Ifname", Value::from(args.ifname.as_str()));
        if let Some(bridge) = &args.bridge_ifname {
            dict.insert("BridgeIfname", Value::from(bridge.as_str()));
        }
        if let Some(driver) = &args.driver {
            dict.insert("Driver", Value::from(driver.as_str()));
        }
        if let Some(config) = &args.config_file {
            dict.insert("ConfigFile", Value::from(config.as_str()));
        }

        let reply = self
            .core
            .call_remote_direct("CreateInterface", vec![owned_value(dict)?])?;
        let path: OwnedObjectPath = payload_arg(&reply, 0, "CreateInterface")?;
        debug!("Created interface {} at {path}", args.ifname);
        Interface::new(self.core.context(), path)
    }

    /// Deregisters the interface at `path` and forgets its cached proxy.
    pub fn remove_interface(&self, path: &ObjectPath<'_>) -> Result<()> {
        let owned = OwnedObjectPath::from(path.to_owned());
        self.core
            .call_remote_direct("RemoveInterface", vec![owned_value(path.clone())?])?;
        self.cache().remove(&owned);
        debug!("Removed interface {owned}");
        Ok(())
    }

    /// Proxy for the BSS at `path`.
    pub fn bss(&self, path: &ObjectPath<'_>) -> Result<Bss> {
        Bss::new(self.core.context(), OwnedObjectPath::from(path.to_owned()))
    }

    /// Proxy for the network block at `path`.
    pub fn network(&self, path: &ObjectPath<'_>) -> Result<Network> {
        Network::new(self.core.context(), OwnedObjectPath::from(path.to_owned()))
    }

    /// Global debug level: `msgdump`, `debug`, `info`, `warning` or `error`.
    pub fn debug_level(&self) -> Result<String> {
        self.core.property("DebugLevel")
    }

    pub fn set_debug_level(&self, level: &str) -> Result<()> {
        self.set("DebugLevel", level)
    }

    /// Whether timestamps are shown in debug logs.
    pub fn debug_timestamp(&self) -> Result<bool> {
        self.core.property("DebugTimestamp")
    }

    pub fn set_debug_timestamp(&self, enabled: bool) -> Result<()> {
        self.set("DebugTimestamp", enabled)
    }

    /// Whether secrets are shown in debug logs.
    pub fn debug_show_keys(&self) -> Result<bool> {
        self.core.property("DebugShowKeys")
    }

    pub fn set_debug_show_keys(&self, enabled: bool) -> Result<()> {
        self.set("DebugShowKeys", enabled)
    }

    /// Paths of the controlled interfaces.
    pub fn interfaces(&self) -> Result<Vec<OwnedObjectPath>> {
        self.core.property("Interfaces")
    }

    /// Names of the supported EAP methods.
    pub fn eap_methods(&self) -> Result<Vec<String>> {
        self.core.property("EapMethods")
    }

    /// Optional features compiled into wpa_supplicant, e.g. `ap`, `p2p`.
    pub fn capabilities(&self) -> Result<Vec<String>> {
        self.core.property("Capabilities")
    }

    /// Calls `callback` with the path and properties of every new interface.
    pub fn on_interface_added<F>(&self, callback: F) -> Result<RemoteSignal>
    where
        F: Fn(OwnedObjectPath, HashMap<String, OwnedValue>) + Send + Sync + 'static,
    {
        self.register_signal(signals::INTERFACE_ADDED, move |payload: Payload| {
            match (
                payload_arg::<OwnedObjectPath>(&payload, 0, signals::INTERFACE_ADDED),
                payload_arg::<HashMap<String, OwnedValue>>(&payload, 1, signals::INTERFACE_ADDED),
            ) {
                (Ok(path), Ok(props)) => callback(path, props),
                (Err(e), _) | (_, Err(e)) => warn!("Ignoring malformed InterfaceAdded: {e}"),
            }
        })
    }

    /// Calls `callback` with the path of every removed interface.
    pub fn on_interface_removed<F>(&self, callback: F) -> Result<RemoteSignal>
    where
        F: Fn(OwnedObjectPath) + Send + Sync + 'static,
    {
        self.register_signal(signals::INTERFACE_REMOVED, move |payload: Payload| {
            match payload_arg::<OwnedObjectPath>(&payload, 0, signals::INTERFACE_REMOVED) {
                Ok(path) => callback(path),
                Err(e) => warn!("Ignoring malformed InterfaceRemoved: {e}"),
            }
        })
    }
}

impl Display for WpaSupplicant {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.interfaces() {
            Ok(paths) => {
                let paths: Vec<&str> = paths.iter().map(|p| p.as_str()).collect();
                write!(f, "WpaSupplicant(Interfaces: [{}])", paths.join(", "))
            }
            Err(_) => write!(f, "WpaSupplicant(Interfaces: ?)"),
        }
    }
}
