//! In-memory wpa_supplicant used by the integration tests.
//!
//! The mock implements the bus traits directly, so the full stack above the
//! transport (reactor, bridge, error translation, proxies) runs unchanged.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use zvariant::{ObjectPath, OwnedObjectPath, OwnedValue, Value};

use wpars::dbus::schema::InterfaceSchema;
use wpars::dbus::transport::{
    BusConnection, BusConnector, BusError, Payload, RemoteObject, SignalCallback, SubscriptionId,
};
use wpars::{BusAddress, DriverConfig, Reactor, WpaSupplicant, WpaSupplicantDriver, evaluate};

pub const SERVICE: &str = "fi.w1.wpa_supplicant1";
pub const ROOT_PATH: &str = "/fi/w1/wpa_supplicant1";
pub const WLAN0_PATH: &str = "/fi/w1/wpa_supplicant1/Interfaces/3";
pub const STA0_PATH: &str = "/fi/w1/wpa_supplicant1/Interfaces/4";
pub const BSS_PATH: &str = "/fi/w1/wpa_supplicant1/Interfaces/3/BSSs/1234";

pub const ROOT_IFACE: &str = "fi.w1.wpa_supplicant1";
pub const INTERFACE_IFACE: &str = "fi.w1.wpa_supplicant1.Interface";
pub const BSS_IFACE: &str = "fi.w1.wpa_supplicant1.BSS";
pub const NETWORK_IFACE: &str = "fi.w1.wpa_supplicant1.Network";
pub const PROPERTIES_IFACE: &str = "org.freedesktop.DBus.Properties";

const ERR_UNKNOWN: &str = "fi.w1.wpa_supplicant1.UnknownError";
const ERR_INVALID_ARGS: &str = "fi.w1.wpa_supplicant1.InvalidArgs";
const ERR_INTERFACE_EXISTS: &str = "fi.w1.wpa_supplicant1.InterfaceExists";
const ERR_INTERFACE_UNKNOWN: &str = "fi.w1.wpa_supplicant1.InterfaceUnknown";
const ERR_NOT_CONNECTED: &str = "fi.w1.wpa_supplicant1.NotConnected";
const ERR_NETWORK_UNKNOWN: &str = "fi.w1.wpa_supplicant1.NetworkUnknown";
const ERR_DBUS_INVALID_ARGS: &str = "org.freedesktop.DBus.Error.InvalidArgs";
const ERR_DBUS_UNKNOWN_METHOD: &str = "org.freedesktop.DBus.Error.UnknownMethod";

/// Builds an [`OwnedValue`] for fixtures and assertions.
pub fn ov<'a>(value: impl Into<Value<'a>>) -> OwnedValue {
    value
        .into()
        .try_to_owned()
        .expect("fixture value is encodable")
}

pub fn path(p: &str) -> ObjectPath<'_> {
    ObjectPath::try_from(p).expect("valid object path")
}

/// Polls `cond` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}

/// What the mock does when asked to scan.
#[derive(Debug, Clone, Copy)]
pub enum ScanBehaviour {
    /// Emits `ScanDone(success)` after `delay`, from a reactor task.
    After(Duration, bool),
    /// Emits `ScanDone(success)` before the `Scan` reply is sent.
    BeforeReply(bool),
    /// Never emits `ScanDone`.
    Silent,
}

/// One method call seen by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub path: String,
    pub interface: String,
    pub method: String,
    pub introspected: bool,
}

struct Subscription {
    path: String,
    interface: String,
    signal: String,
    callback: SignalCallback,
}

struct Emission {
    path: String,
    interface: &'static str,
    signal: &'static str,
    args: Vec<OwnedValue>,
}

struct MockState {
    registered: BTreeMap<String, String>,
    devices: BTreeMap<String, String>,
    networks: BTreeMap<String, (String, BTreeMap<String, String>)>,
    next_network: u32,
    current_network: Option<String>,
    overrides: HashMap<(String, String), OwnedValue>,
    subscriptions: HashMap<u64, Subscription>,
    next_subscription: u64,
    calls: Vec<Call>,
    resolutions: Vec<String>,
    scan: ScanBehaviour,
}

/// Shared handle to the in-memory daemon.
#[derive(Clone)]
pub struct MockBus {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBus {
    /// `wlan0` is already controlled; `sta0` can be added.
    pub fn new() -> Self {
        let devices = [("wlan0", WLAN0_PATH), ("sta0", STA0_PATH)]
            .into_iter()
            .map(|(name, p)| (name.to_string(), p.to_string()))
            .collect();
        let mut registered = BTreeMap::new();
        registered.insert("wlan0".to_string(), WLAN0_PATH.to_string());

        Self {
            state: Arc::new(Mutex::new(MockState {
                registered,
                devices,
                networks: BTreeMap::new(),
                next_network: 0,
                current_network: None,
                overrides: HashMap::new(),
                subscriptions: HashMap::new(),
                next_subscription: 0,
                calls: Vec::new(),
                resolutions: Vec::new(),
                scan: ScanBehaviour::After(Duration::from_millis(20), true),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn connector(&self) -> Arc<dyn BusConnector> {
        Arc::new(MockConnector {
            bus: self.clone(),
            failure: None,
        })
    }

    pub fn failing_connector(&self, failure: BusError) -> Arc<dyn BusConnector> {
        Arc::new(MockConnector {
            bus: self.clone(),
            failure: Some(failure),
        })
    }

    pub fn set_scan(&self, scan: ScanBehaviour) {
        self.lock().scan = scan;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn calls_to(&self, method: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.method == method)
            .collect()
    }

    /// How many remote handles were resolved for `p`.
    pub fn resolutions_of(&self, p: &str) -> usize {
        self.lock().resolutions.iter().filter(|r| r.as_str() == p).count()
    }

    pub fn active_subscriptions(&self) -> usize {
        self.lock().subscriptions.len()
    }

    /// Delivers a signal to every matching subscriber. Must run on the
    /// reactor thread.
    pub fn emit(&self, path: &str, interface: &str, signal: &str, payload: Payload) {
        let callbacks: Vec<SignalCallback> = self
            .lock()
            .subscriptions
            .values()
            .filter(|s| s.path == path && s.interface == interface && s.signal == signal)
            .map(|s| s.callback.clone())
            .collect();
        for callback in callbacks {
            callback(payload.clone());
        }
    }

    fn deliver(&self, emissions: Vec<Emission>) {
        for e in emissions {
            self.emit(&e.path, e.interface, e.signal, Payload::new(e.args));
        }
    }

    fn scan_done(&self, iface: &str, success: bool) -> Emission {
        Emission {
            path: iface.to_string(),
            interface: INTERFACE_IFACE,
            signal: "ScanDone",
            args: vec![ov(success)],
        }
    }
}

struct MockConnector {
    bus: MockBus,
    failure: Option<BusError>,
}

#[async_trait]
impl BusConnector for MockConnector {
    async fn connect(&self, _address: &BusAddress) -> Result<Arc<dyn BusConnection>, BusError> {
        match &self.failure {
            Some(failure) => Err(failure.clone()),
            None => Ok(Arc::new(MockConnection {
                bus: self.bus.clone(),
            })),
        }
    }
}

struct MockConnection {
    bus: MockBus,
}

#[async_trait]
impl BusConnection for MockConnection {
    async fn remote_object(
        &self,
        service: &str,
        path: &ObjectPath<'_>,
        schema: Option<&'static InterfaceSchema>,
    ) -> Result<Arc<dyn RemoteObject>, BusError> {
        if service != SERVICE {
            return Err(BusError::remote(
                "org.freedesktop.DBus.Error.ServiceUnknown",
                Some(format!("no such service {service}")),
            ));
        }
        self.bus.lock().resolutions.push(path.to_string());
        Ok(Arc::new(MockObject {
            bus: self.bus.clone(),
            path: path.to_string(),
            introspected: schema.is_none(),
        }))
    }
}

struct MockObject {
    bus: MockBus,
    path: String,
    introspected: bool,
}

fn remote(name: &str, message: &str) -> BusError {
    BusError::remote(name, Some(message.to_string()))
}

fn unwrap_variant(value: &OwnedValue) -> Result<OwnedValue, BusError> {
    let owned = match &**value {
        Value::Value(inner) => inner.try_to_owned(),
        _ => value.try_clone(),
    };
    owned.map_err(|e| BusError::Transport(e.to_string()))
}

fn arg<T>(args: &[OwnedValue], index: usize) -> Result<T, BusError>
where
    T: TryFrom<OwnedValue>,
    T::Error: std::fmt::Display,
{
    let value = args
        .get(index)
        .ok_or_else(|| remote(ERR_DBUS_INVALID_ARGS, &format!("missing argument {index}")))?;
    T::try_from(unwrap_variant(value)?).map_err(|e| remote(ERR_DBUS_INVALID_ARGS, &e.to_string()))
}

fn entry_text(value: &OwnedValue) -> Option<String> {
    let value = unwrap_variant(value).ok()?;
    match &*value {
        Value::Str(s) => Some(s.as_str().to_string()),
        Value::I32(n) => Some(n.to_string()),
        Value::U32(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn paths(list: &[&str]) -> OwnedValue {
    ov(list.iter().map(|p| path(p)).collect::<Vec<_>>())
}

fn security(key_mgmt: &[&str], pairwise: &[&str], group: &str) -> OwnedValue {
    let mut dict: HashMap<&str, Value<'_>> = HashMap::new();
    dict.insert(
        "KeyMgmt",
        Value::from(key_mgmt.iter().map(|s| s.to_string()).collect::<Vec<_>>()),
    );
    dict.insert(
        "Pairwise",
        Value::from(pairwise.iter().map(|s| s.to_string()).collect::<Vec<_>>()),
    );
    dict.insert("Group", Value::from(group));
    ov(dict)
}

impl MockState {
    fn ifname_at(&self, p: &str) -> Option<String> {
        self.registered
            .iter()
            .find(|(_, registered)| registered.as_str() == p)
            .map(|(name, _)| name.clone())
    }

    fn property(&self, p: &str, interface: &str, name: &str) -> Option<OwnedValue> {
        if let Some(value) = self.overrides.get(&(p.to_string(), name.to_string())) {
            return value.try_clone().ok();
        }

        match interface {
            ROOT_IFACE if p == ROOT_PATH => self.root_property(name),
            INTERFACE_IFACE => self.interface_property(p, name),
            BSS_IFACE if p == BSS_PATH => bss_property(name),
            NETWORK_IFACE => self.network_property(p, name),
            _ => None,
        }
    }

    fn root_property(&self, name: &str) -> Option<OwnedValue> {
        Some(match name {
            "Interfaces" => {
                let registered: Vec<&str> = self.registered.values().map(String::as_str).collect();
                paths(&registered)
            }
            "DebugLevel" => ov("info"),
            "DebugTimestamp" => ov(false),
            "DebugShowKeys" => ov(false),
            "EapMethods" => ov(["MD5", "TLS", "MSCHAPV2", "PEAP", "TTLS", "GTC", "OTP", "LEAP"]
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>()),
            "Capabilities" => ov(["ap", "ibss-rsn", "p2p", "interworking"]
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>()),
            _ => return None,
        })
    }

    fn interface_property(&self, p: &str, name: &str) -> Option<OwnedValue> {
        let ifname = self.ifname_at(p)?;
        let has_bss = p == WLAN0_PATH;
        Some(match name {
            "Ifname" => ov(ifname),
            "State" => ov("inactive"),
            "Scanning" => ov(false),
            "ScanInterval" => ov(5i32),
            "FastReauth" => ov(true),
            "BSSs" if has_bss => paths(&[BSS_PATH]),
            "BSSs" => paths(&[]),
            "CurrentBSS" if has_bss => ov(path(BSS_PATH)),
            "CurrentBSS" => ov(path("/")),
            "CurrentNetwork" => match &self.current_network {
                Some(network) => ov(path(network)),
                None => ov(path("/")),
            },
            "Networks" => {
                let owned: Vec<&str> = self
                    .networks
                    .iter()
                    .filter(|(_, (owner, _))| owner == p)
                    .map(|(network, _)| network.as_str())
                    .collect();
                paths(&owned)
            }
            "ApScan" => ov(1u32),
            "Country" => ov("US"),
            "BSSExpireAge" => ov(180u32),
            "BSSExpireCount" => ov(2u32),
            "BridgeIfname" => ov(""),
            "Driver" => ov("nl80211"),
            "Capabilities" => {
                let mut dict: HashMap<&str, Value<'_>> = HashMap::new();
                dict.insert(
                    "Pairwise",
                    Value::from(vec!["ccmp".to_string(), "tkip".to_string()]),
                );
                dict.insert(
                    "KeyMgmt",
                    Value::from(vec!["wpa-psk".to_string(), "wpa-eap".to_string()]),
                );
                ov(dict)
            }
            _ => return None,
        })
    }

    fn network_property(&self, p: &str, name: &str) -> Option<OwnedValue> {
        let (_, entries) = self.networks.get(p)?;
        Some(match name {
            "Properties" => {
                let dict: HashMap<&str, Value<'_>> = entries
                    .iter()
                    .map(|(k, v)| (k.as_str(), Value::from(v.as_str())))
                    .collect();
                ov(dict)
            }
            "Enabled" => ov(true),
            _ => return None,
        })
    }
}

fn bss_property(name: &str) -> Option<OwnedValue> {
    Some(match name {
        "SSID" => ov(vec![70u8, 71, 72, 73]),
        "BSSID" => ov(vec![70u8, 71, 72, 73]),
        "Frequency" => ov(2462u16),
        "Signal" => ov(-60i16),
        "Privacy" => ov(true),
        "Mode" => ov("infrastructure"),
        "Rates" => ov(vec![54_000_000u32, 48_000_000, 6_000_000]),
        "IEs" => ov(vec![0u8, 4, 70, 71, 72, 73]),
        "WPA" => security(&["wpa-psk"], &["tkip"], "tkip"),
        "RSN" => security(&[], &[], ""),
        _ => return None,
    })
}

impl MockObject {
    fn handle(
        &self,
        state: &mut MockState,
        interface: &str,
        method: &str,
        args: &[OwnedValue],
    ) -> Result<(Payload, Vec<Emission>), BusError> {
        let reply = |values: Vec<OwnedValue>| Ok((Payload::new(values), Vec::new()));

        match (interface, method) {
            (PROPERTIES_IFACE, "Get") => {
                let target: String = arg(args, 0)?;
                let name: String = arg(args, 1)?;
                match state.property(&self.path, &target, &name) {
                    Some(value) => reply(vec![value]),
                    None => Err(remote(
                        ERR_DBUS_INVALID_ARGS,
                        &format!("no property {target}.{name}"),
                    )),
                }
            }
            (PROPERTIES_IFACE, "Set") => {
                let target: String = arg(args, 0)?;
                let name: String = arg(args, 1)?;
                if state.property(&self.path, &target, &name).is_none() {
                    return Err(remote(
                        ERR_DBUS_INVALID_ARGS,
                        &format!("no property {target}.{name}"),
                    ));
                }
                let value = args
                    .get(2)
                    .ok_or_else(|| remote(ERR_DBUS_INVALID_ARGS, "missing value"))
                    .and_then(unwrap_variant)?;
                state.overrides.insert((self.path.clone(), name), value);
                reply(Vec::new())
            }

            (ROOT_IFACE, "CreateInterface") => {
                let dict: HashMap<String, OwnedValue> = arg(args, 0)?;
                let Some(ifname) = dict.get("Ifname").and_then(entry_text) else {
                    return Err(remote(ERR_INVALID_ARGS, "Ifname is required"));
                };
                if state.registered.contains_key(&ifname) {
                    return Err(remote(
                        ERR_INTERFACE_EXISTS,
                        "wpa_supplicant already controls this interface.",
                    ));
                }
                let Some(p) = state.devices.get(&ifname).cloned() else {
                    return Err(remote(
                        ERR_UNKNOWN,
                        "wpa_supplicant couldn't grab this interface.",
                    ));
                };
                state.registered.insert(ifname.clone(), p.clone());

                let mut props: HashMap<&str, Value<'_>> = HashMap::new();
                props.insert("Ifname", Value::from(ifname.as_str()));
                let added = Emission {
                    path: ROOT_PATH.to_string(),
                    interface: ROOT_IFACE,
                    signal: "InterfaceAdded",
                    args: vec![ov(path(&p)), ov(props)],
                };
                Ok((Payload::new(vec![ov(path(&p))]), vec![added]))
            }
            (ROOT_IFACE, "GetInterface") => {
                let ifname: String = arg(args, 0)?;
                match state.registered.get(&ifname) {
                    Some(p) => reply(vec![ov(path(p))]),
                    None => Err(remote(
                        ERR_INTERFACE_UNKNOWN,
                        "wpa_supplicant knows nothing about this interface.",
                    )),
                }
            }
            (ROOT_IFACE, "RemoveInterface") => {
                let target: OwnedObjectPath = arg(args, 0)?;
                let Some(ifname) = state.ifname_at(target.as_str()) else {
                    return Err(remote(
                        ERR_INTERFACE_UNKNOWN,
                        "wpa_supplicant knows nothing about this interface.",
                    ));
                };
                state.registered.remove(&ifname);
                let removed = Emission {
                    path: ROOT_PATH.to_string(),
                    interface: ROOT_IFACE,
                    signal: "InterfaceRemoved",
                    args: vec![ov(path(target.as_str()))],
                };
                Ok((Payload::empty(), vec![removed]))
            }

            (INTERFACE_IFACE, _) if state.ifname_at(&self.path).is_none() => Err(remote(
                ERR_INTERFACE_UNKNOWN,
                "wpa_supplicant knows nothing about this interface.",
            )),
            (INTERFACE_IFACE, "Scan") => {
                let dict: HashMap<String, OwnedValue> = arg(args, 0)?;
                match dict.get("Type").and_then(entry_text).as_deref() {
                    Some("active") | Some("passive") => {}
                    _ => return Err(remote(ERR_INVALID_ARGS, "Wrong Type value type.")),
                }
                match state.scan {
                    ScanBehaviour::BeforeReply(success) => Ok((
                        Payload::empty(),
                        vec![self.bus.scan_done(&self.path, success)],
                    )),
                    ScanBehaviour::After(delay, success) => {
                        let bus = self.bus.clone();
                        let iface = self.path.clone();
                        tokio::spawn(async move {
                            tokio::time::sleep(delay).await;
                            let done = bus.scan_done(&iface, success);
                            bus.deliver(vec![done]);
                        });
                        reply(Vec::new())
                    }
                    ScanBehaviour::Silent => reply(Vec::new()),
                }
            }
            (INTERFACE_IFACE, "AddNetwork") => {
                let dict: HashMap<String, OwnedValue> = arg(args, 0)?;
                let mut entries = BTreeMap::new();
                for (key, value) in &dict {
                    let Some(text) = entry_text(value) else {
                        return Err(remote(ERR_INVALID_ARGS, &format!("bad value for {key}")));
                    };
                    let text = match key.as_str() {
                        "ssid" | "psk" => format!("\"{text}\""),
                        _ => text,
                    };
                    entries.insert(key.clone(), text);
                }
                let network = format!("{}/Networks/{}", self.path, state.next_network);
                state.next_network += 1;
                state
                    .networks
                    .insert(network.clone(), (self.path.clone(), entries));
                reply(vec![ov(path(&network))])
            }
            (INTERFACE_IFACE, "RemoveNetwork") => {
                let network: OwnedObjectPath = arg(args, 0)?;
                if state.networks.remove(network.as_str()).is_none() {
                    return Err(remote(
                        ERR_NETWORK_UNKNOWN,
                        "There is no such a network in this interface.",
                    ));
                }
                if state.current_network.as_deref() == Some(network.as_str()) {
                    state.current_network = None;
                }
                reply(Vec::new())
            }
            (INTERFACE_IFACE, "SelectNetwork") => {
                let network: OwnedObjectPath = arg(args, 0)?;
                if !state.networks.contains_key(network.as_str()) {
                    return Err(remote(
                        ERR_NETWORK_UNKNOWN,
                        "There is no such a network in this interface.",
                    ));
                }
                state.current_network = Some(network.to_string());
                reply(Vec::new())
            }
            (INTERFACE_IFACE, "Disconnect") => {
                if state.current_network.take().is_none() {
                    return Err(remote(
                        ERR_NOT_CONNECTED,
                        "This interface is not connected",
                    ));
                }
                reply(Vec::new())
            }

            _ => Err(remote(
                ERR_DBUS_UNKNOWN_METHOD,
                &format!("no method {interface}.{method}"),
            )),
        }
    }
}

#[async_trait]
impl RemoteObject for MockObject {
    async fn call_remote(
        &self,
        interface: &str,
        method: &str,
        args: Vec<OwnedValue>,
    ) -> Result<Payload, BusError> {
        let outcome = {
            let mut state = self.bus.lock();
            state.calls.push(Call {
                path: self.path.clone(),
                interface: interface.to_string(),
                method: method.to_string(),
                introspected: self.introspected,
            });
            self.handle(&mut state, interface, method, &args)
        };
        let (payload, emissions) = outcome?;
        self.bus.deliver(emissions);
        Ok(payload)
    }

    async fn notify_on_signal(
        &self,
        interface: &str,
        signal: &str,
        callback: SignalCallback,
    ) -> Result<SubscriptionId, BusError> {
        let mut state = self.bus.lock();
        let id = state.next_subscription;
        state.next_subscription += 1;
        state.subscriptions.insert(
            id,
            Subscription {
                path: self.path.clone(),
                interface: interface.to_string(),
                signal: signal.to_string(),
                callback,
            },
        );
        Ok(SubscriptionId(id))
    }

    async fn cancel_signal_notification(&self, id: SubscriptionId) -> Result<(), BusError> {
        self.bus.lock().subscriptions.remove(&id.0);
        Ok(())
    }
}

/// A running reactor plus a supplicant proxy connected to a fresh mock.
pub struct Harness {
    pub reactor: Reactor,
    pub bus: MockBus,
    pub supplicant: WpaSupplicant,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(DriverConfig::new())
    }

    pub fn with_config(config: DriverConfig) -> Self {
        let reactor = Reactor::start().expect("reactor starts");
        let bus = MockBus::new();
        let driver = WpaSupplicantDriver::with_connector(reactor.handle(), config, bus.connector());
        let supplicant = driver.connect().expect("connects to the mock bus");
        Self {
            reactor,
            bus,
            supplicant,
        }
    }

    /// Emits a signal from the reactor thread and waits until it has been
    /// delivered.
    pub fn emit(&self, p: &str, interface: &str, signal: &str, args: Vec<OwnedValue>) {
        let bus = self.bus.clone();
        let (p, interface, signal) = (p.to_string(), interface.to_string(), signal.to_string());
        let handle = self.reactor.handle();
        let done = handle
            .run_on(move || async move {
                bus.emit(&p, &interface, &signal, Payload::new(args));
                Ok(())
            })
            .expect("reactor is running");
        evaluate(&done, &handle).expect("emission completes");
    }
}
