//! Entry point: connecting to wpa_supplicant.

use log::info;
use std::sync::Arc;

use crate::Result;
use crate::api::models::{DriverConfig, WpaError};
use crate::api::supplicant::WpaSupplicant;
use crate::core::bridge::evaluate;
use crate::core::error_translation::RemoteErrorTranslator;
use crate::core::object::BusContext;
use crate::core::reactor::ReactorHandle;
use crate::dbus::transport::BusConnector;
use crate::dbus::zbus_transport::ZbusConnector;

/// Connects to wpa_supplicant through a running [`Reactor`](crate::Reactor).
///
/// # Example
///
/// ```no_run
/// use wpars::{Reactor, WpaSupplicantDriver};
///
/// # fn main() -> wpars::Result<()> {
/// let reactor = Reactor::start()?;
/// let driver = WpaSupplicantDriver::new(reactor.handle());
/// let supplicant = driver.connect()?;
/// let wlan0 = supplicant.get_interface("wlan0")?;
/// println!("{}", wlan0.state()?);
/// # Ok(())
/// # }
/// ```
pub struct WpaSupplicantDriver {
    reactor: ReactorHandle,
    config: DriverConfig,
    connector: Arc<dyn BusConnector>,
}

impl WpaSupplicantDriver {
    /// A driver using the default configuration and the real system bus.
    pub fn new(reactor: ReactorHandle) -> Self {
        Self::with_config(reactor, DriverConfig::default())
    }

    pub fn with_config(reactor: ReactorHandle, config: DriverConfig) -> Self {
        Self::with_connector(reactor, config, Arc::new(ZbusConnector))
    }

    /// A driver that opens its bus connection through `connector`.
    pub fn with_connector(
        reactor: ReactorHandle,
        config: DriverConfig,
        connector: Arc<dyn BusConnector>,
    ) -> Self {
        Self {
            reactor,
            config,
            connector,
        }
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Connects to the bus and returns the root wpa_supplicant proxy.
    ///
    /// Fails with [`WpaError::ReactorNotRunning`] if the reactor is not
    /// running.
    pub fn connect(&self) -> Result<WpaSupplicant> {
        if !self.reactor.is_running() {
            return Err(WpaError::ReactorNotRunning(
                "the reactor must be started before connecting".into(),
            ));
        }

        let translator = self
            .config
            .error_table
            .clone()
            .map(RemoteErrorTranslator::new)
            .unwrap_or_default();

        let address = self.config.bus;
        let pending = {
            let connector = self.connector.clone();
            let translator = translator.clone();
            self.reactor.run_on(move || async move {
                translator.wrap(connector.connect(&address)).await
            })?
        };
        let connection = evaluate(&pending, &self.reactor)?;
        info!("Connected to wpa_supplicant on the {address} bus");

        let ctx = BusContext {
            connection,
            reactor: self.reactor.clone(),
            translator,
            config: self.config.clone(),
        };
        WpaSupplicant::new(&ctx)
    }
}
