//! Shared plumbing behind every proxy.
//!
//! An [`ObjectCore`] resolves two handles to the same remote object: one
//! dispatching by introspection, one by the declared schema. Every call it
//! makes is scheduled on the reactor, translated, and evaluated back on the
//! caller's thread.

use log::info;
use std::sync::Arc;
use zvariant::{OwnedObjectPath, OwnedValue, Value};

use crate::Result;
use crate::api::models::{DriverConfig, WpaError};
use crate::core::bridge::evaluate;
use crate::core::error_translation::RemoteErrorTranslator;
use crate::core::reactor::ReactorHandle;
use crate::core::signal::{PendingSignalWait, RemoteSignal};
use crate::dbus::schema::InterfaceSchema;
use crate::dbus::transport::{BusConnection, Payload, RemoteObject, SignalCallback};
use crate::types::constants::{bus, interfaces};
use crate::util::utils::{owned_value, value_as};

/// Everything a proxy needs to reach the bus.
#[derive(Clone)]
pub(crate) struct BusContext {
    pub(crate) connection: Arc<dyn BusConnection>,
    pub(crate) reactor: ReactorHandle,
    pub(crate) translator: RemoteErrorTranslator,
    pub(crate) config: DriverConfig,
}

/// Path plus resolved remote handles for one object.
#[derive(Clone)]
pub struct ObjectCore {
    path: OwnedObjectPath,
    schema: &'static InterfaceSchema,
    introspected: Arc<dyn RemoteObject>,
    direct: Arc<dyn RemoteObject>,
    ctx: BusContext,
}

impl std::fmt::Debug for ObjectCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectCore")
            .field("path", &self.path.as_str())
            .field("interface", &self.schema.name)
            .finish()
    }
}

impl ObjectCore {
    pub(crate) fn resolve(
        ctx: &BusContext,
        path: OwnedObjectPath,
        schema: &'static InterfaceSchema,
    ) -> Result<Self> {
        let handles = {
            let connection = ctx.connection.clone();
            let translator = ctx.translator.clone();
            let path = path.clone();
            ctx.reactor.run_on(move || async move {
                let introspected = translator
                    .wrap(connection.remote_object(bus::SERVICE, &path, None))
                    .await?;
                let direct = translator
                    .wrap(connection.remote_object(bus::SERVICE, &path, Some(schema)))
                    .await?;
                Ok((introspected, direct))
            })?
        };
        let (introspected, direct) = evaluate(&handles, &ctx.reactor)?;

        Ok(Self {
            path,
            schema,
            introspected,
            direct,
            ctx: ctx.clone(),
        })
    }

    pub fn path(&self) -> &OwnedObjectPath {
        &self.path
    }

    pub fn interface(&self) -> &'static str {
        self.schema.name
    }

    pub(crate) fn context(&self) -> &BusContext {
        &self.ctx
    }

    fn dispatch(
        &self,
        remote: Arc<dyn RemoteObject>,
        interface: &'static str,
        method: &str,
        args: Vec<OwnedValue>,
    ) -> Result<Payload> {
        let translator = self.ctx.translator.clone();
        let method = method.to_string();
        let reply = self.ctx.reactor.run_on(move || async move {
            translator
                .wrap(remote.call_remote(interface, &method, args))
                .await
        })?;
        evaluate(&reply, &self.ctx.reactor)
    }

    /// Calls `method` on this object's interface using introspection.
    pub(crate) fn call_remote(&self, method: &str, args: Vec<OwnedValue>) -> Result<Payload> {
        self.dispatch(self.introspected.clone(), self.schema.name, method, args)
    }

    /// Calls `method` using the declared schema only.
    pub(crate) fn call_remote_direct(
        &self,
        method: &str,
        args: Vec<OwnedValue>,
    ) -> Result<Payload> {
        self.dispatch(self.direct.clone(), self.schema.name, method, args)
    }

    pub(crate) fn get_property(&self, name: &str) -> Result<OwnedValue> {
        let args = vec![owned_value(self.schema.name)?, owned_value(name)?];
        let reply = self.dispatch(
            self.introspected.clone(),
            interfaces::PROPERTIES,
            "Get",
            args,
        )?;
        let value = reply.get(0).ok_or_else(|| WpaError::UnexpectedValue {
            name: name.to_string(),
            reason: "Get returned no value".into(),
        })?;
        value.try_clone().map_err(|e| WpaError::UnexpectedValue {
            name: name.to_string(),
            reason: e.to_string(),
        })
    }

    /// Reads a property and converts it to `T`.
    pub(crate) fn property<T>(&self, name: &str) -> Result<T>
    where
        T: TryFrom<OwnedValue>,
        T::Error: Into<zvariant::Error>,
    {
        value_as(name, &self.get_property(name)?)
    }

    pub(crate) fn set_property(&self, name: &str, value: Value<'_>) -> Result<()> {
        info!("Setting `{name}` -> `{value}`");
        let args = vec![
            owned_value(self.schema.name)?,
            owned_value(name)?,
            owned_value(value)?,
        ];
        self.dispatch(
            self.introspected.clone(),
            interfaces::PROPERTIES,
            "Set",
            args,
        )?;
        Ok(())
    }

    pub(crate) fn register_signal(
        &self,
        name: &str,
        callback: SignalCallback,
    ) -> Result<RemoteSignal> {
        RemoteSignal::register(
            self.introspected.clone(),
            self.schema.name,
            name,
            self.ctx.reactor.clone(),
            self.ctx.translator.clone(),
            callback,
        )
    }

    pub(crate) fn register_signal_once(&self, name: &str) -> Result<PendingSignalWait> {
        PendingSignalWait::register(
            self.introspected.clone(),
            self.schema.name,
            name,
            self.ctx.reactor.clone(),
            self.ctx.translator.clone(),
        )
    }
}

/// Behaviour shared by all wpa_supplicant proxies.
///
/// Implementors only provide their schema and core; property access and
/// signal registration come for free.
pub trait BusObject {
    /// Declared interface of the remote object.
    const SCHEMA: &'static InterfaceSchema;

    fn core(&self) -> &ObjectCore;

    /// Object path of the remote object.
    fn path(&self) -> &OwnedObjectPath {
        self.core().path()
    }

    /// Reads a property of this object's interface.
    fn get(&self, property: &str) -> Result<OwnedValue> {
        self.core().get_property(property)
    }

    /// Writes a property of this object's interface.
    fn set<'a>(&self, property: &str, value: impl Into<Value<'a>>) -> Result<()>
    where
        Self: Sized,
    {
        self.core().set_property(property, value.into())
    }

    /// Calls `callback` on the reactor thread for every occurrence of the
    /// signal, until the returned handle is cancelled.
    fn register_signal<F>(&self, name: &str, callback: F) -> Result<RemoteSignal>
    where
        Self: Sized,
        F: Fn(Payload) + Send + Sync + 'static,
    {
        self.core().register_signal(name, Arc::new(callback))
    }

    /// Registers for a single occurrence of the signal.
    fn register_signal_once(&self, name: &str) -> Result<PendingSignalWait> {
        self.core().register_signal_once(name)
    }
}
