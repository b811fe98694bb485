//! Bus transport backed by `zbus`.
//!
//! Properties go through `org.freedesktop.DBus.Properties`, methods through
//! the generated [`WpasProxy`] and [`WpasInterfaceProxy`], and signals
//! through a plain [`zbus::Proxy`] signal stream whose messages are decoded
//! according to the signal's declared signature.
//!
//! Everything here must run on the reactor: signal streams are drained by
//! tasks spawned onto the current tokio runtime.

use async_trait::async_trait;
use futures::StreamExt;
use log::{debug, trace, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::AbortHandle;
use zbus::Connection;
use zbus::fdo::{IntrospectableProxy, PropertiesProxy};
use zbus::message::Body;
use zbus::names::InterfaceName;
use zvariant::{ObjectPath, OwnedObjectPath, OwnedValue, Value};

use crate::api::models::BusAddress;
use crate::dbus::schema::{self, InterfaceSchema};
use crate::dbus::transport::{
    BusConnection, BusConnector, BusError, Payload, RemoteObject, SignalCallback, SubscriptionId,
};
use crate::dbus::{WpasInterfaceProxy, WpasProxy};
use crate::types::constants::{interfaces, remote_errors};

/// Opens real D-Bus connections.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZbusConnector;

#[async_trait]
impl BusConnector for ZbusConnector {
    async fn connect(&self, address: &BusAddress) -> Result<Arc<dyn BusConnection>, BusError> {
        let conn = match address {
            BusAddress::System => Connection::system().await?,
            BusAddress::Session => Connection::session().await?,
        };
        debug!("Connected to the {address} bus");
        Ok(Arc::new(ZbusConnection { conn }))
    }
}

/// A `zbus` connection shared by every remote object resolved from it.
#[derive(Debug, Clone)]
pub struct ZbusConnection {
    conn: Connection,
}

impl ZbusConnection {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl BusConnection for ZbusConnection {
    async fn remote_object(
        &self,
        service: &str,
        path: &ObjectPath<'_>,
        schema: Option<&'static InterfaceSchema>,
    ) -> Result<Arc<dyn RemoteObject>, BusError> {
        let path = OwnedObjectPath::from(path.to_owned());

        let dispatch = match schema {
            Some(schema) => Dispatch::Declared(schema),
            None => {
                let introspectable = IntrospectableProxy::builder(&self.conn)
                    .destination(service.to_owned())?
                    .path(path.clone())?
                    .build()
                    .await?;
                let xml = introspectable.introspect().await?;
                trace!("Introspected {path}: {} bytes", xml.len());
                Dispatch::Introspected(xml)
            }
        };

        Ok(Arc::new(ZbusObject {
            conn: self.conn.clone(),
            service: service.to_owned(),
            path,
            dispatch,
            subscriptions: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }))
    }
}

#[derive(Debug)]
enum Dispatch {
    /// Dispatch by the declared schema.
    Declared(&'static InterfaceSchema),
    /// Dispatch by the object's introspection data.
    Introspected(String),
}

impl Dispatch {
    fn advertises(&self, interface: &str, method: &str) -> bool {
        if interface == interfaces::PROPERTIES {
            return true;
        }
        match self {
            Self::Declared(schema) => schema.name == interface && schema.method(method).is_some(),
            Self::Introspected(xml) => {
                xml.contains(&format!("<interface name=\"{interface}\""))
                    && xml.contains(&format!("<method name=\"{method}\""))
            }
        }
    }

    fn signal_signature(&self, interface: &str, signal: &str) -> Option<&'static str> {
        let schema = match self {
            Self::Declared(schema) if schema.name == interface => Some(*schema),
            _ => schema::for_interface(interface),
        };
        schema.and_then(|s| s.signal(signal)).map(|s| s.signature)
    }
}

/// One remote object on a `zbus` connection.
pub struct ZbusObject {
    conn: Connection,
    service: String,
    path: OwnedObjectPath,
    dispatch: Dispatch,
    subscriptions: Mutex<HashMap<SubscriptionId, AbortHandle>>,
    next_id: AtomicU64,
}

impl ZbusObject {
    async fn properties(&self) -> Result<PropertiesProxy<'static>, BusError> {
        Ok(PropertiesProxy::builder(&self.conn)
            .destination(self.service.clone())?
            .path(self.path.clone())?
            .build()
            .await?)
    }

    async fn root(&self) -> Result<WpasProxy<'static>, BusError> {
        Ok(WpasProxy::builder(&self.conn)
            .destination(self.service.clone())?
            .path(self.path.clone())?
            .build()
            .await?)
    }

    async fn interface(&self) -> Result<WpasInterfaceProxy<'static>, BusError> {
        Ok(WpasInterfaceProxy::builder(&self.conn)
            .destination(self.service.clone())?
            .path(self.path.clone())?
            .build()
            .await?)
    }

    async fn call_properties(&self, method: &str, args: &[OwnedValue]) -> Result<Payload, BusError> {
        let props = self.properties().await?;
        let iface: String = arg(args, 0)?;
        let iface = InterfaceName::try_from(iface.as_str())
            .map_err(|e| BusError::remote(remote_errors::DBUS_INVALID_ARGS, Some(e.to_string())))?;

        match method {
            "Get" => {
                let name: String = arg(args, 1)?;
                let value = props.get(iface, &name).await?;
                Ok(Payload::new(vec![value]))
            }
            "Set" => {
                let name: String = arg(args, 1)?;
                let value = args.get(2).ok_or_else(|| missing(2))?;
                props.set(iface, &name, property_value(value)).await?;
                Ok(Payload::empty())
            }
            "GetAll" => {
                let all = props.get_all(iface).await?;
                Ok(Payload::new(vec![owned(all)?]))
            }
            other => Err(unknown_method(interfaces::PROPERTIES, other)),
        }
    }

    async fn call_root(&self, method: &str, args: &[OwnedValue]) -> Result<Payload, BusError> {
        let proxy = self.root().await?;
        match method {
            "CreateInterface" => {
                let dict: HashMap<String, OwnedValue> = arg(args, 0)?;
                let path = proxy.create_interface(borrow_dict(&dict)).await?;
                Ok(Payload::new(vec![owned(path.into_inner())?]))
            }
            "GetInterface" => {
                let ifname: String = arg(args, 0)?;
                let path = proxy.get_interface(&ifname).await?;
                Ok(Payload::new(vec![owned(path.into_inner())?]))
            }
            "RemoveInterface" => {
                let path: OwnedObjectPath = arg(args, 0)?;
                proxy.remove_interface(&path).await?;
                Ok(Payload::empty())
            }
            other => Err(unknown_method(interfaces::ROOT, other)),
        }
    }

    async fn call_interface(&self, method: &str, args: &[OwnedValue]) -> Result<Payload, BusError> {
        let proxy = self.interface().await?;
        match method {
            "Scan" => {
                let dict: HashMap<String, OwnedValue> = arg(args, 0)?;
                proxy.scan(borrow_dict(&dict)).await?;
                Ok(Payload::empty())
            }
            "AddNetwork" => {
                let dict: HashMap<String, OwnedValue> = arg(args, 0)?;
                let path = proxy.add_network(borrow_dict(&dict)).await?;
                Ok(Payload::new(vec![owned(path.into_inner())?]))
            }
            "RemoveNetwork" => {
                let path: OwnedObjectPath = arg(args, 0)?;
                proxy.remove_network(&path).await?;
                Ok(Payload::empty())
            }
            "SelectNetwork" => {
                let path: OwnedObjectPath = arg(args, 0)?;
                proxy.select_network(&path).await?;
                Ok(Payload::empty())
            }
            "Disconnect" => {
                proxy.disconnect().await?;
                Ok(Payload::empty())
            }
            other => Err(unknown_method(interfaces::INTERFACE, other)),
        }
    }
}

#[async_trait]
impl RemoteObject for ZbusObject {
    async fn call_remote(
        &self,
        interface: &str,
        method: &str,
        args: Vec<OwnedValue>,
    ) -> Result<Payload, BusError> {
        if !self.dispatch.advertises(interface, method) {
            return Err(unknown_method(interface, method));
        }
        trace!("Calling {interface}.{method} on {}", self.path);

        match interface {
            interfaces::PROPERTIES => self.call_properties(method, &args).await,
            interfaces::ROOT => self.call_root(method, &args).await,
            interfaces::INTERFACE => self.call_interface(method, &args).await,
            other => Err(unknown_method(other, method)),
        }
    }

    async fn notify_on_signal(
        &self,
        interface: &str,
        signal: &str,
        callback: SignalCallback,
    ) -> Result<SubscriptionId, BusError> {
        let signature = self.dispatch.signal_signature(interface, signal);
        if signature.is_none() {
            warn!("No declared signature for {interface}.{signal}, arguments will be dropped");
        }

        let proxy = zbus::Proxy::new(
            &self.conn,
            self.service.clone(),
            self.path.clone(),
            interface.to_owned(),
        )
        .await?;
        let mut stream = proxy.receive_signal(signal.to_owned()).await?;

        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let name = format!("{interface}.{signal}");
        let task = tokio::spawn(async move {
            // Keep the proxy alive for as long as the stream is drained.
            let _proxy = proxy;
            while let Some(msg) = stream.next().await {
                let payload = match signature {
                    Some(sig) => match decode_signal(sig, &msg.body()) {
                        Ok(payload) => payload,
                        Err(e) => {
                            warn!("Failed to decode {name} arguments: {e}");
                            continue;
                        }
                    },
                    None => Payload::empty(),
                };
                trace!("Signal {name} received");
                callback(payload);
            }
            debug!("Signal stream for {name} ended");
        });

        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, task.abort_handle());
        debug!("Subscribed to {interface}.{signal} on {} as {id:?}", self.path);
        Ok(id)
    }

    async fn cancel_signal_notification(&self, id: SubscriptionId) -> Result<(), BusError> {
        let handle = self
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        match handle {
            Some(handle) => {
                handle.abort();
                debug!("Cancelled subscription {id:?} on {}", self.path);
            }
            None => trace!("Subscription {id:?} already cancelled"),
        }
        Ok(())
    }
}

impl Drop for ZbusObject {
    fn drop(&mut self) {
        let subscriptions = self
            .subscriptions
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        for (_, handle) in subscriptions.drain() {
            handle.abort();
        }
    }
}

/// Decodes a signal body into one value per argument.
fn decode_signal(signature: &str, body: &Body) -> Result<Payload, BusError> {
    let values = match signature {
        "" => Vec::new(),
        "b" => vec![owned(body.deserialize::<bool>()?)?],
        "o" => vec![owned(body.deserialize::<OwnedObjectPath>()?.into_inner())?],
        "a{sv}" => vec![owned(body.deserialize::<HashMap<String, OwnedValue>>()?)?],
        "o,a{sv}" => {
            let (path, props) = body.deserialize::<(OwnedObjectPath, HashMap<String, OwnedValue>)>()?;
            vec![owned(path.into_inner())?, owned(props)?]
        }
        other => {
            return Err(BusError::Transport(format!(
                "unsupported signal signature `{other}`"
            )));
        }
    };
    Ok(Payload::new(values))
}

fn owned<'a>(value: impl Into<Value<'a>>) -> Result<OwnedValue, BusError> {
    Ok(value.into().try_to_owned()?)
}

fn arg<T>(args: &[OwnedValue], index: usize) -> Result<T, BusError>
where
    T: TryFrom<OwnedValue>,
    T::Error: Into<zvariant::Error>,
{
    let value = args.get(index).ok_or_else(|| missing(index))?;
    let value = match &**value {
        Value::Value(inner) => inner.try_to_owned()?,
        _ => value.try_clone()?,
    };
    T::try_from(value).map_err(|e| {
        BusError::remote(
            remote_errors::DBUS_INVALID_ARGS,
            Some(format!("argument {index}: {}", e.into())),
        )
    })
}

/// Borrows an `a{sv}` dictionary in the shape the generated proxies take.
fn borrow_dict(dict: &HashMap<String, OwnedValue>) -> HashMap<&str, &Value<'static>> {
    dict.iter()
        .map(|(k, v)| (k.as_str(), unwrap_variant(v)))
        .collect()
}

fn unwrap_variant(value: &OwnedValue) -> &Value<'static> {
    match &**value {
        Value::Value(inner) => inner,
        other => other,
    }
}

/// The value `Properties.Set` sends, with any outer variant removed.
fn property_value(value: &OwnedValue) -> Value<'static> {
    unwrap_variant(value).clone()
}

fn missing(index: usize) -> BusError {
    BusError::remote(
        remote_errors::DBUS_INVALID_ARGS,
        Some(format!("missing argument {index}")),
    )
}

fn unknown_method(interface: &str, method: &str) -> BusError {
    BusError::remote(
        remote_errors::DBUS_UNKNOWN_METHOD,
        Some(format!("{interface}.{method} is not available")),
    )
}
