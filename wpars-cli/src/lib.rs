//! Command line interface for wpa_supplicant over D-Bus.
//!
//! Commands follow the hierarchy of wpa_supplicant's D-Bus objects: top-level
//! commands act on `fi.w1.wpa_supplicant1`, `interface` commands on
//! `fi.w1.wpa_supplicant1.Interface` and `bss` commands on
//! `fi.w1.wpa_supplicant1.BSS`.

use anyhow::Context;
use clap::{Parser, Subcommand};
use log::{LevelFilter, debug};
use std::time::Duration;
use zvariant::ObjectPath;

use wpars::{
    BusAddress, BusObject, CreateInterfaceArgs, DriverConfig, Reactor, ScanOptions, ScanType,
    WpaSupplicant, WpaSupplicantDriver,
};

/// Longest blocking scan wait accepted on the command line, one day.
const MAX_SCAN_TIMEOUT_SECS: u64 = 24 * 60 * 60;

#[derive(Parser, Debug)]
#[command(name = "wpa-cli-rs")]
#[command(version, about = "Command line interface for wpa_supplicant D-Bus")]
struct Args {
    /// Show debug logs
    #[arg(long, global = true)]
    debug: bool,

    /// Talk to wpa_supplicant on the session bus instead of the system bus
    #[arg(long, global = true)]
    session: bool,

    /// Seconds a blocking scan waits for results
    #[arg(
        long,
        global = true,
        value_name = "SECS",
        value_parser = clap::value_parser!(u64).range(1..=MAX_SCAN_TIMEOUT_SECS)
    )]
    scan_timeout: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Method: registers a wireless interface in wpa_supplicant
    CreateInterface {
        /// e.g. wlan0
        ifname: String,
        /// Bridge to control, e.g. br0
        #[arg(long)]
        bridge_if_name: Option<String>,
        /// e.g. nl80211
        #[arg(long)]
        driver: Option<String>,
        /// Config file path
        #[arg(long)]
        config_file: Option<String>,
    },

    /// Method: deregisters a wireless interface from wpa_supplicant
    RemoveInterface {
        /// e.g. wlan0
        ifname: String,
    },

    /// Method: returns the object of an interface wpa_supplicant already controls
    GetInterface {
        /// e.g. wlan0
        ifname: String,
    },

    /// Get a property of the root object (case sensitive)
    Get {
        /// e.g. DebugLevel
        name: String,
    },

    /// Set a property of the root object (case sensitive)
    Set {
        /// e.g. DebugLevel
        name: String,
        /// `true` and `false` are sent as booleans, anything else as a string
        value: String,
    },

    /// Access fi.w1.wpa_supplicant1.Interface objects
    #[command(subcommand)]
    Interface(InterfaceCommand),

    /// Access fi.w1.wpa_supplicant1.BSS objects
    #[command(subcommand)]
    Bss(BssCommand),
}

#[derive(Subcommand, Debug)]
enum InterfaceCommand {
    /// Scan and list the BSSs found
    Scan {
        /// e.g. wlan0
        ifname: String,
        /// active or passive
        #[arg(long, default_value = "active")]
        scan_type: ScanType,
    },

    /// Disconnect from the current network
    Disconnect {
        /// e.g. wlan0
        ifname: String,
    },

    /// List configured networks
    Networks {
        /// e.g. wlan0
        ifname: String,
    },
}

#[derive(Subcommand, Debug)]
enum BssCommand {
    /// Show everything known about a BSS
    Show {
        /// e.g. /fi/w1/wpa_supplicant1/Interfaces/3/BSSs/12
        path: String,
    },
}

fn init_logging(debug: bool) {
    let level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn driver_config(args: &Args) -> DriverConfig {
    let mut config = DriverConfig::new();
    if args.session {
        config = config.with_bus(BusAddress::Session);
    }
    if let Some(secs) = args.scan_timeout {
        config = config.with_scan_timeout(Duration::from_secs(secs));
    }
    config
}

fn object_path(raw: &str) -> anyhow::Result<ObjectPath<'_>> {
    ObjectPath::try_from(raw).with_context(|| format!("`{raw}` is not an object path"))
}

fn execute(supplicant: &WpaSupplicant, command: &Command) -> anyhow::Result<()> {
    match command {
        Command::CreateInterface {
            ifname,
            bridge_if_name,
            driver,
            config_file,
        } => {
            let mut args = CreateInterfaceArgs::new(ifname);
            if let Some(bridge) = bridge_if_name {
                args = args.with_bridge_ifname(bridge);
            }
            if let Some(driver) = driver {
                args = args.with_driver(driver);
            }
            if let Some(config_file) = config_file {
                args = args.with_config_file(config_file);
            }
            println!("{}", supplicant.create_interface(&args)?);
        }
        Command::RemoveInterface { ifname } => {
            let iface = supplicant.get_interface(ifname)?;
            supplicant.remove_interface(iface.path())?;
        }
        Command::GetInterface { ifname } => {
            println!("{}", supplicant.get_interface(ifname)?);
        }
        Command::Get { name } => {
            println!("{:?}", supplicant.get(name)?);
        }
        Command::Set { name, value } => match value.as_str() {
            "true" => supplicant.set(name, true)?,
            "false" => supplicant.set(name, false)?,
            other => supplicant.set(name, other)?,
        },
        Command::Interface(InterfaceCommand::Scan { ifname, scan_type }) => {
            let iface = supplicant.get_interface(ifname)?;
            let bsss = iface
                .scan(&ScanOptions::new(*scan_type), true)?
                .unwrap_or_default();
            for bss in &bsss {
                println!("{}  {}", bss.path(), bss.summary());
            }
        }
        Command::Interface(InterfaceCommand::Disconnect { ifname }) => {
            supplicant.get_interface(ifname)?.disconnect()?;
        }
        Command::Interface(InterfaceCommand::Networks { ifname }) => {
            for network in supplicant.get_interface(ifname)?.networks()? {
                println!("{network}");
            }
        }
        Command::Bss(BssCommand::Show { path }) => {
            let bss = supplicant.bss(&object_path(path)?)?;
            println!("{bss}");
            println!("{:#?}", bss.summary());
        }
    }
    Ok(())
}

/// Parses the command line, runs one command against wpa_supplicant and
/// prints `OK` or `FAIL - <error>`.
pub fn run() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.debug);
    debug!("Running {:?}", args.command);

    let mut reactor = Reactor::start().context("failed to start the reactor")?;
    let outcome = WpaSupplicantDriver::with_config(reactor.handle(), driver_config(&args))
        .connect()
        .context("failed to connect to wpa_supplicant")
        .and_then(|supplicant| execute(&supplicant, &args.command));
    reactor.stop();

    match outcome {
        Ok(()) => {
            println!("OK");
            Ok(())
        }
        Err(e) => {
            println!("FAIL - {e:#}");
            std::process::exit(1);
        }
    }
}
