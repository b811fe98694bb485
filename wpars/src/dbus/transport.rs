//! Narrow interface to the message bus.
//!
//! Everything above this module talks to the bus through the three traits
//! defined here. The production implementation lives in
//! [`zbus_transport`](super::zbus_transport); tests substitute an in-memory
//! bus.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use zbus::DBusError;
use zvariant::{ObjectPath, OwnedValue};

use crate::api::models::BusAddress;
use crate::dbus::schema::InterfaceSchema;

/// Failure reported by the bus layer, before translation.
///
/// This type deliberately has no conversion into [`WpaError`](crate::WpaError);
/// every failure has to pass through the error translator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// The remote side answered with a named error.
    #[error("{name}: {message}")]
    Remote { name: String, message: String },

    /// The call never produced a remote answer.
    #[error("{0}")]
    Transport(String),
}

impl BusError {
    /// Builds a remote error, using the error name as message when none was
    /// sent along.
    pub fn remote(name: impl Into<String>, message: Option<String>) -> Self {
        let name = name.into();
        let message = message.unwrap_or_else(|| name.clone());
        Self::Remote { name, message }
    }
}

impl From<zbus::Error> for BusError {
    fn from(e: zbus::Error) -> Self {
        match e {
            zbus::Error::MethodError(name, message, _) => Self::remote(name.to_string(), message),
            zbus::Error::FDO(fdo) => Self::from(*fdo),
            other => Self::Transport(other.to_string()),
        }
    }
}

impl From<zbus::fdo::Error> for BusError {
    fn from(e: zbus::fdo::Error) -> Self {
        match e {
            zbus::fdo::Error::ZBus(inner) => Self::from(inner),
            other => Self::remote(
                other.name().to_string(),
                other.description().map(str::to_owned),
            ),
        }
    }
}

impl From<zvariant::Error> for BusError {
    fn from(e: zvariant::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

/// Identifies one signal subscription on a [`RemoteObject`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Body of a method reply or signal, one value per argument.
///
/// Cheap to clone so it can be handed to several waiters.
#[derive(Debug, Clone, Default)]
pub struct Payload(Arc<Vec<OwnedValue>>);

impl Payload {
    pub fn new(values: Vec<OwnedValue>) -> Self {
        Self(Arc::new(values))
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Raw access to argument `index`.
    pub fn get(&self, index: usize) -> Option<&OwnedValue> {
        self.0.get(index)
    }

    pub fn values(&self) -> &[OwnedValue] {
        &self.0
    }
}

/// Called on the reactor thread for every matching signal.
pub type SignalCallback = Arc<dyn Fn(Payload) + Send + Sync>;

/// Opens connections to a bus.
#[async_trait]
pub trait BusConnector: Send + Sync {
    async fn connect(&self, address: &BusAddress) -> Result<Arc<dyn BusConnection>, BusError>;
}

/// An open bus connection.
#[async_trait]
pub trait BusConnection: Send + Sync {
    /// Resolves a handle to the object at `path` owned by `service`.
    ///
    /// With `Some(schema)` the handle dispatches according to the declared
    /// schema and skips introspection. With `None` it introspects the remote
    /// object first.
    async fn remote_object(
        &self,
        service: &str,
        path: &ObjectPath<'_>,
        schema: Option<&'static InterfaceSchema>,
    ) -> Result<Arc<dyn RemoteObject>, BusError>;
}

/// A handle to one remote object.
#[async_trait]
pub trait RemoteObject: Send + Sync {
    async fn call_remote(
        &self,
        interface: &str,
        method: &str,
        args: Vec<OwnedValue>,
    ) -> Result<Payload, BusError>;

    async fn notify_on_signal(
        &self,
        interface: &str,
        signal: &str,
        callback: SignalCallback,
    ) -> Result<SubscriptionId, BusError>;

    async fn cancel_signal_notification(&self, id: SubscriptionId) -> Result<(), BusError>;
}
