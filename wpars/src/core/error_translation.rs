//! Translation of named remote errors into [`WpaError`].

use log::warn;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use crate::Result;
use crate::api::models::WpaError;
use crate::dbus::transport::BusError;
use crate::types::constants::remote_errors;

/// Builds a local error from the remote message.
pub type ErrorConstructor = fn(String) -> WpaError;

/// Remote error name to constructor.
pub type ErrorTable = HashMap<String, ErrorConstructor>;

/// Maps failures reported by the bus onto [`WpaError`].
///
/// The table is fixed at construction. Names missing from it become
/// [`WpaError::UnknownRemoteError`] and are logged.
#[derive(Debug, Clone)]
pub struct RemoteErrorTranslator {
    table: Arc<ErrorTable>,
}

impl RemoteErrorTranslator {
    pub fn new(table: ErrorTable) -> Self {
        Self {
            table: Arc::new(table),
        }
    }

    /// The errors documented by wpa_supplicant's D-Bus API.
    pub fn default_table() -> ErrorTable {
        let entries: [(&str, ErrorConstructor); 7] = [
            (remote_errors::UNKNOWN_ERROR, WpaError::UnknownError),
            (remote_errors::INVALID_ARGS, WpaError::InvalidArgs),
            (remote_errors::INTERFACE_EXISTS, WpaError::InterfaceExists),
            (remote_errors::INTERFACE_UNKNOWN, WpaError::InterfaceUnknown),
            (remote_errors::NOT_CONNECTED, WpaError::NotConnected),
            (remote_errors::NETWORK_UNKNOWN, WpaError::NetworkUnknown),
            (remote_errors::DBUS_INVALID_ARGS, WpaError::InvalidArgs),
        ];
        entries
            .into_iter()
            .map(|(name, ctor)| (name.to_string(), ctor))
            .collect()
    }

    pub fn translate(&self, err: BusError) -> WpaError {
        match err {
            BusError::Remote { name, message } => match self.table.get(&name) {
                Some(ctor) => ctor(message),
                None => {
                    warn!("Unrecognized remote error {name}: {message}");
                    WpaError::UnknownRemoteError { name, message }
                }
            },
            BusError::Transport(message) => WpaError::Transport(message),
        }
    }

    /// Awaits `fut`, translating its error.
    pub async fn wrap<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, BusError>>,
    {
        fut.await.map_err(|e| self.translate(e))
    }
}

impl Default for RemoteErrorTranslator {
    fn default() -> Self {
        Self::new(Self::default_table())
    }
}
