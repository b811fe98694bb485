//! A configured network block.

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use zvariant::{OwnedObjectPath, OwnedValue};

use crate::Result;
use crate::core::object::{BusContext, BusObject, ObjectCore};
use crate::dbus::schema::{InterfaceSchema, NETWORK_SCHEMA};
use crate::util::utils::{strip_ssid_quotes, value_as};

/// Proxy for `fi.w1.wpa_supplicant1.Network`.
#[derive(Debug, Clone)]
pub struct Network {
    core: ObjectCore,
}

impl BusObject for Network {
    const SCHEMA: &'static InterfaceSchema = &NETWORK_SCHEMA;

    fn core(&self) -> &ObjectCore {
        &self.core
    }
}

impl Network {
    pub(crate) fn new(ctx: &BusContext, path: OwnedObjectPath) -> Result<Self> {
        Ok(Self {
            core: ObjectCore::resolve(ctx, path, Self::SCHEMA)?,
        })
    }

    /// Entries of the `network` block, all as strings.
    ///
    /// The quotes wpa_supplicant keeps around `ssid` are removed. A block
    /// without an SSID reports it as an empty string.
    pub fn properties(&self) -> Result<HashMap<String, String>> {
        let raw: HashMap<String, OwnedValue> = self.core.property("Properties")?;
        let mut props = raw
            .iter()
            .map(|(key, value)| Ok((key.clone(), value_as::<String>(key, value)?)))
            .collect::<Result<HashMap<_, _>>>()?;

        let ssid = props.entry("ssid".to_string()).or_default();
        *ssid = strip_ssid_quotes(ssid).to_string();
        Ok(props)
    }

    pub fn enabled(&self) -> Result<bool> {
        self.core.property("Enabled")
    }

    pub fn set_enabled(&self, enabled: bool) -> Result<()> {
        self.set("Enabled", enabled)
    }
}

impl Display for Network {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Network(Path: {}", self.path())?;
        if let Ok(props) = self.properties() {
            let mut keys: Vec<_> = props.iter().collect();
            keys.sort();
            let rendered: Vec<String> = keys.iter().map(|(k, v)| format!("{k}={v}")).collect();
            write!(f, ", Properties: {{{}}}", rendered.join(", "))?;
        }
        write!(f, ")")
    }
}
