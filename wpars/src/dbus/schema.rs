//! Declared shape of the wpa_supplicant D-Bus interfaces.
//!
//! Used for direct dispatch, where the remote object is addressed without
//! introspecting it first. Signatures use D-Bus type notation; a signal with
//! several arguments lists them separated by commas.

use crate::types::constants::{interfaces, signals};

/// A method exposed by a remote interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodSpec {
    pub name: &'static str,
    pub arguments: &'static str,
    pub returns: &'static str,
}

/// A signal emitted by a remote interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalSpec {
    pub name: &'static str,
    pub signature: &'static str,
}

/// Methods and signals of one remote interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceSchema {
    pub name: &'static str,
    pub methods: &'static [MethodSpec],
    pub signals: &'static [SignalSpec],
}

impl InterfaceSchema {
    pub fn method(&self, name: &str) -> Option<&'static MethodSpec> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn signal(&self, name: &str) -> Option<&'static SignalSpec> {
        self.signals.iter().find(|s| s.name == name)
    }
}

const fn method(
    name: &'static str,
    arguments: &'static str,
    returns: &'static str,
) -> MethodSpec {
    MethodSpec {
        name,
        arguments,
        returns,
    }
}

const fn signal(name: &'static str, signature: &'static str) -> SignalSpec {
    SignalSpec { name, signature }
}

/// `fi.w1.wpa_supplicant1`
pub static ROOT_SCHEMA: InterfaceSchema = InterfaceSchema {
    name: interfaces::ROOT,
    methods: &[
        method("CreateInterface", "a{sv}", "o"),
        method("GetInterface", "s", "o"),
        method("RemoveInterface", "o", ""),
    ],
    signals: &[
        signal(signals::INTERFACE_ADDED, "o,a{sv}"),
        signal(signals::INTERFACE_REMOVED, "o"),
        signal(signals::PROPERTIES_CHANGED, "a{sv}"),
    ],
};

/// `fi.w1.wpa_supplicant1.Interface`
pub static INTERFACE_SCHEMA: InterfaceSchema = InterfaceSchema {
    name: interfaces::INTERFACE,
    methods: &[
        method("Scan", "a{sv}", ""),
        method("AddNetwork", "a{sv}", "o"),
        method("RemoveNetwork", "o", ""),
        method("SelectNetwork", "o", ""),
        method("Disconnect", "", ""),
    ],
    signals: &[
        signal(signals::SCAN_DONE, "b"),
        signal("BSSAdded", "o,a{sv}"),
        signal("BSSRemoved", "o"),
        signal("NetworkAdded", "o,a{sv}"),
        signal("NetworkRemoved", "o"),
        signal("NetworkSelected", "o"),
        signal(signals::PROPERTIES_CHANGED, "a{sv}"),
    ],
};

/// `fi.w1.wpa_supplicant1.BSS`
pub static BSS_SCHEMA: InterfaceSchema = InterfaceSchema {
    name: interfaces::BSS,
    methods: &[],
    signals: &[signal(signals::PROPERTIES_CHANGED, "a{sv}")],
};

/// `fi.w1.wpa_supplicant1.Network`
pub static NETWORK_SCHEMA: InterfaceSchema = InterfaceSchema {
    name: interfaces::NETWORK,
    methods: &[],
    signals: &[signal(signals::PROPERTIES_CHANGED, "a{sv}")],
};

/// Returns the declared schema for a wpa_supplicant interface name.
pub fn for_interface(name: &str) -> Option<&'static InterfaceSchema> {
    [&ROOT_SCHEMA, &INTERFACE_SCHEMA, &BSS_SCHEMA, &NETWORK_SCHEMA]
        .into_iter()
        .find(|s| s.name == name)
}
