//! Startup listing of the addresses a phone on the LAN can reach.

use std::io;
use std::net::{IpAddr, Ipv4Addr};

use tracing::{info, warn};

const RULE: &str = "----------------------------------------------------------";

/// A non-loopback IPv4 address on a local interface.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Endpoint {
    pub interface: String,
    pub ip: Ipv4Addr,
    pub port: u16,
}

impl Endpoint {
    pub fn url(&self) -> String {
        format!("http://{}:{}/notify", self.ip, self.port)
    }
}

/// Every non-loopback IPv4 address on this host, in interface order.
pub fn local_endpoints(port: u16) -> io::Result<Vec<Endpoint>> {
    let interfaces = if_addrs::get_if_addrs()?;
    Ok(endpoints(interfaces.into_iter().map(|iface| {
        let ip = iface.ip();
        (iface.name, ip)
    }), port))
}

fn endpoints(addrs: impl IntoIterator<Item = (String, IpAddr)>, port: u16) -> Vec<Endpoint> {
    addrs
        .into_iter()
        .filter_map(|(interface, ip)| match ip {
            IpAddr::V4(ip) if !ip.is_loopback() => Some(Endpoint { interface, ip, port }),
            _ => None,
        })
        .collect()
}

/// Logs the `/notify` URL for each local address.
pub fn announce(port: u16) {
    let endpoints = match local_endpoints(port) {
        Ok(endpoints) => endpoints,
        Err(e) => {
            warn!("Failed to get network interfaces: {e}");
            return;
        }
    };

    info!("Available local IP addresses to use in your iOS shortcut:");
    info!("{RULE}");
    for ep in &endpoints {
        info!(
            "Interface: {:<10}  IP: {:<15}  URL: {}",
            ep.interface,
            ep.ip.to_string(),
            ep.url()
        );
    }
    info!("{RULE}");
    info!("USE ONE OF THESE IPs IN YOUR iOS SHORTCUT");
}
