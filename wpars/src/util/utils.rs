//! Utility functions for BSS data conversion and display.
//!
//! Provides helpers for converting between the representations wpa_supplicant
//! publishes and the ones callers want: frequency to channel, dBm to a
//! percentage, raw SSID/BSSID bytes to strings.

use log::warn;
use std::collections::HashMap;
use zvariant::{OwnedObjectPath, OwnedValue, Value};

use crate::Result;
use crate::api::models::WpaError;
use crate::dbus::transport::Payload;
use crate::types::constants::{bus, frequency, signal_quality};

/// Converts a 2.4GHz frequency in MHz to a channel number.
///
/// 2484 MHz is channel 14. Anything else outside 2412..=2472 is reported
/// as [`WpaError::UnexpectedFrequency`].
pub(crate) fn channel_from_freq(mhz: u32) -> Result<u32> {
    match mhz {
        frequency::BAND_2_4_CH14 => Ok(14),
        frequency::BAND_2_4_START..=frequency::BAND_2_4_END => {
            Ok((mhz - frequency::BAND_2_4_START) / frequency::CHANNEL_SPACING + 1)
        }
        _ => {
            warn!("Unexpected frequency in Wi-Fi connection: {mhz} MHz");
            Err(WpaError::UnexpectedFrequency(mhz))
        }
    }
}

/// Converts a signal level in dBm to a quality percentage (0-100).
///
/// At or below -100 dBm the quality is 0, at or above -50 dBm it is 100,
/// and it scales linearly in between.
pub(crate) fn signal_quality_from_dbm(dbm: i32) -> u8 {
    if dbm <= signal_quality::FLOOR_DBM {
        0
    } else if dbm >= signal_quality::CEILING_DBM {
        100
    } else {
        (2 * (dbm - signal_quality::FLOOR_DBM)) as u8
    }
}

/// Formats BSSID bytes as upper-case, colon separated hex.
pub(crate) fn format_bssid(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(":")
}

/// Decodes SSID bytes into a string, replacing invalid UTF-8.
pub(crate) fn decode_ssid(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Strips a leading and a trailing quote character (`"` or `'`), as found
/// in the `ssid` entry of a network's `Properties`.
pub(crate) fn strip_ssid_quotes(ssid: &str) -> &str {
    let is_quote = |c: char| c == '"' || c == '\'';
    let ssid = ssid.strip_prefix(is_quote).unwrap_or(ssid);
    ssid.strip_suffix(is_quote).unwrap_or(ssid)
}

/// Returns `None` for wpa_supplicant's "no object" path (`/`).
pub(crate) fn non_root_path(path: OwnedObjectPath) -> Option<OwnedObjectPath> {
    if path.as_str() == bus::NO_OBJECT {
        None
    } else {
        Some(path)
    }
}

/// Converts anything that becomes a [`Value`] into an [`OwnedValue`] suitable
/// for a remote call.
pub(crate) fn owned_value<'a>(value: impl Into<Value<'a>>) -> Result<OwnedValue> {
    value
        .into()
        .try_to_owned()
        .map_err(|e| WpaError::InvalidArgs(format!("cannot encode argument: {e}")))
}

/// Extracts a typed value out of a property or dictionary entry.
///
/// Values nested in a variant (`v`) are unwrapped first.
pub(crate) fn value_as<T>(name: &str, value: &OwnedValue) -> Result<T>
where
    T: TryFrom<OwnedValue>,
    T::Error: Into<zvariant::Error>,
{
    let unexpected = |reason: String| WpaError::UnexpectedValue {
        name: name.to_string(),
        reason,
    };

    let owned = match &**value {
        Value::Value(inner) => inner.try_to_owned(),
        _ => value.try_clone(),
    }
    .map_err(|e| unexpected(e.to_string()))?;

    T::try_from(owned).map_err(|e| unexpected(e.into().to_string()))
}

/// Extracts argument `index` of a method reply or signal.
pub(crate) fn payload_arg<T>(payload: &Payload, index: usize, name: &str) -> Result<T>
where
    T: TryFrom<OwnedValue>,
    T::Error: Into<zvariant::Error>,
{
    let value = payload
        .get(index)
        .ok_or_else(|| WpaError::UnexpectedValue {
            name: name.to_string(),
            reason: format!("missing argument {index}"),
        })?;
    value_as(name, value)
}

/// Reads an optional entry of an `a{sv}` dictionary.
pub(crate) fn dict_entry<T>(dict: &HashMap<String, OwnedValue>, key: &str) -> Result<Option<T>>
where
    T: TryFrom<OwnedValue>,
    T::Error: Into<zvariant::Error>,
{
    dict.get(key).map(|value| value_as(key, value)).transpose()
}

/// Macro to convert Result to Option with error logging.
/// Usage: `try_log!(result, "context message")?`
macro_rules! try_log {
    ($result:expr, $context:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => {
                log::warn!("{}: {}", $context, e);
                return None;
            }
        }
    };
}

pub(crate) use try_log;
