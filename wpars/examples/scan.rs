use wpars::{Reactor, ScanOptions, ScanType, WpaSupplicantDriver};

fn main() -> wpars::Result<()> {
    let ifname = std::env::args().nth(1).unwrap_or_else(|| "wlan0".to_string());

    let mut reactor = Reactor::start()?;
    let supplicant = WpaSupplicantDriver::new(reactor.handle()).connect()?;
    let iface = supplicant.get_interface(&ifname)?;

    println!("Scanning on {ifname}...");
    let bsss = iface
        .scan(&ScanOptions::new(ScanType::Active), true)?
        .unwrap_or_default();
    for bss in &bsss {
        println!("{}", bss.summary());
    }

    reactor.stop();
    Ok(())
}
