// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use std::net::{IpAddr, SocketAddrV4};

use crate::{
    error::{Error, Result},
    exec::{Cmd, CommandRunner, SystemRunner},
};

/// Facts about the local machine that configuration defaults are derived from.
pub trait HostProbe {
    /// The name this node registers under: the lowercased system hostname.
    fn hostname(&self) -> Result<String>;

    /// The egress interface of the default IPv4 route.
    fn default_route_interface(&self) -> Result<String>;

    /// The first usable IPv4 address bound to `interface`.
    fn interface_address(&self, interface: &str) -> Result<IpAddr>;

    /// The address the node uses to reach the outside world.
    fn default_route_address(&self) -> Result<IpAddr> {
        let interface = self.default_route_interface()?;
        self.interface_address(&interface)
    }
}

/// Probes the machine nodeadm is running on.
#[derive(Debug, Default)]
pub struct SystemProbe {
    runner: SystemRunner,
}

impl HostProbe for SystemProbe {
    fn hostname(&self) -> Result<String> {
        let name = nix::unistd::gethostname().map_err(|e| Error::Hostname(e.to_string()))?;
        let name = name
            .into_string()
            .map_err(|raw| Error::Hostname(format!("hostname {raw:?} is not valid UTF-8")))?;
        let name = name.trim().to_lowercase();
        if name.is_empty() {
            return Err(Error::Hostname("hostname is empty".to_string()));
        }
        Ok(name)
    }

    fn default_route_interface(&self) -> Result<String> {
        let cmd = Cmd::new("ip").args(["-4", "route", "show", "default"]);
        let output = self
            .runner
            .run(&cmd)
            .map_err(|e| Error::DefaultRoute(e.to_string()))?;
        parse_default_route(&output.stdout)
    }

    fn interface_address(&self, interface: &str) -> Result<IpAddr> {
        let addr_err = |reason: String| Error::InterfaceAddress {
            interface: interface.to_string(),
            reason,
        };

        let addrs = nix::ifaddrs::getifaddrs().map_err(|e| addr_err(e.to_string()))?;
        addrs
            .filter(|ifaddr| ifaddr.interface_name == interface)
            .filter_map(|ifaddr| {
                let sin = ifaddr.address?.as_sockaddr_in().copied()?;
                Some(*SocketAddrV4::from(sin).ip())
            })
            .find(|ip| !ip.is_loopback() && !ip.is_link_local() && !ip.is_unspecified())
            .map(IpAddr::V4)
            .ok_or_else(|| addr_err("no usable IPv4 address".to_string()))
    }
}

/// Extract the interface name from `ip route show default` output, e.g.
/// `default via 10.0.0.1 dev eth0 proto dhcp metric 100`.
pub fn parse_default_route(output: &str) -> Result<String> {
    for line in output.lines() {
        let mut tokens = line.split_whitespace();
        if tokens.next() != Some("default") {
            continue;
        }
        while let Some(token) = tokens.next() {
            if token == "dev" {
                if let Some(dev) = tokens.next() {
                    return Ok(dev.to_string());
                }
            }
        }
    }
    Err(Error::DefaultRoute(
        "no default route in routing table".to_string(),
    ))
}
