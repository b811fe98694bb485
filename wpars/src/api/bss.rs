//! A BSS found by scanning.

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use zvariant::{OwnedObjectPath, OwnedValue};

use crate::Result;
use crate::api::models::{BssSummary, NetworkType, SecurityInfo};
use crate::core::object::{BusContext, BusObject, ObjectCore};
use crate::dbus::schema::{BSS_SCHEMA, InterfaceSchema};
use crate::util::utils::{
    channel_from_freq, decode_ssid, dict_entry, format_bssid, signal_quality_from_dbm, try_log,
};

/// Proxy for `fi.w1.wpa_supplicant1.BSS`.
#[derive(Debug, Clone)]
pub struct Bss {
    core: ObjectCore,
}

impl BusObject for Bss {
    const SCHEMA: &'static InterfaceSchema = &BSS_SCHEMA;

    fn core(&self) -> &ObjectCore {
        &self.core
    }
}

fn security_info(dict: &HashMap<String, OwnedValue>) -> Result<SecurityInfo> {
    Ok(SecurityInfo {
        key_mgmt: dict_entry(dict, "KeyMgmt")?.unwrap_or_default(),
        pairwise: dict_entry(dict, "Pairwise")?.unwrap_or_default(),
        group: dict_entry(dict, "Group")?.unwrap_or_default(),
        mgmt_group: dict_entry(dict, "MgmtGroup")?,
    })
}

impl Bss {
    pub(crate) fn new(ctx: &BusContext, path: OwnedObjectPath) -> Result<Self> {
        Ok(Self {
            core: ObjectCore::resolve(ctx, path, Self::SCHEMA)?,
        })
    }

    /// SSID decoded as text.
    pub fn ssid(&self) -> Result<String> {
        Ok(decode_ssid(&self.ssid_bytes()?))
    }

    pub fn ssid_bytes(&self) -> Result<Vec<u8>> {
        self.core.property("SSID")
    }

    /// BSSID as upper-case hex bytes separated by colons.
    pub fn bssid(&self) -> Result<String> {
        let bytes: Vec<u8> = self.core.property("BSSID")?;
        Ok(format_bssid(&bytes))
    }

    /// Frequency in MHz.
    pub fn frequency(&self) -> Result<u16> {
        self.core.property("Frequency")
    }

    /// Wi-Fi channel (1-14).
    ///
    /// Fails with [`WpaError::UnexpectedFrequency`](crate::WpaError::UnexpectedFrequency)
    /// outside the 2.4GHz band.
    pub fn channel(&self) -> Result<u32> {
        channel_from_freq(u32::from(self.frequency()?))
    }

    /// WPA information; an empty `key_mgmt` means no WPA support.
    pub fn wpa(&self) -> Result<SecurityInfo> {
        let dict: HashMap<String, OwnedValue> = self.core.property("WPA")?;
        security_info(&dict)
    }

    /// RSN (WPA2) information; an empty `key_mgmt` means no RSN support.
    pub fn rsn(&self) -> Result<SecurityInfo> {
        let dict: HashMap<String, OwnedValue> = self.core.property("RSN")?;
        security_info(&dict)
    }

    /// All information elements as a chain of TLVs.
    pub fn ies(&self) -> Result<Vec<u8>> {
        self.core.property("IEs")
    }

    pub fn privacy(&self) -> Result<bool> {
        self.core.property("Privacy")
    }

    /// `ad-hoc` or `infrastructure`.
    pub fn mode(&self) -> Result<String> {
        self.core.property("Mode")
    }

    /// Supported rates in bits per second, highest first.
    pub fn rates(&self) -> Result<Vec<u32>> {
        self.core.property("Rates")
    }

    /// Signal level in dBm.
    pub fn signal_dbm(&self) -> Result<i16> {
        self.core.property("Signal")
    }

    /// Signal level as a percentage (0-100).
    pub fn signal_quality(&self) -> Result<u8> {
        Ok(signal_quality_from_dbm(i32::from(self.signal_dbm()?)))
    }

    pub fn network_type(&self) -> Result<NetworkType> {
        if !self.privacy()? {
            return Ok(NetworkType::Open);
        }
        if self.rsn()?.is_supported() {
            return Ok(NetworkType::Wpa2);
        }
        if self.wpa()?.is_supported() {
            return Ok(NetworkType::Wpa);
        }
        Ok(NetworkType::Wep)
    }

    /// Reads every field it can. Fields that fail are logged and left empty.
    pub fn summary(&self) -> BssSummary {
        fn field<T>(name: &str, result: Result<T>) -> Option<T> {
            Some(try_log!(result, format!("Error while fetching BSS {name}")))
        }

        BssSummary {
            ssid: field("ssid", self.ssid()),
            bssid: field("bssid", self.bssid()),
            channel: field("channel", self.channel()),
            privacy: field("privacy", self.privacy()),
            wpa: field("wpa", self.wpa()),
            rsn: field("rsn", self.rsn()),
            signal_dbm: field("signal_dbm", self.signal_dbm()),
            signal_quality: field("signal_quality", self.signal_quality()),
            network_type: field("network_type", self.network_type()),
        }
    }
}

impl Display for Bss {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let ssid = self.ssid().unwrap_or_else(|_| "?".into());
        let bssid = self.bssid().unwrap_or_else(|_| "?".into());
        write!(f, "BSS(Path: {}, SSID: {ssid}, BSSID: {bssid}", self.path())?;
        match self.signal_dbm() {
            Ok(dbm) => write!(f, ", Signal: {dbm}dBm)"),
            Err(_) => write!(f, ")"),
        }
    }
}
