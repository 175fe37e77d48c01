// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use cidr::IpInet;

use crate::{
    constants::DNS_IP_OFFSET,
    error::{Error, Result},
};

/// The cluster DNS service address: the tenth address of the service subnet, following kubeadm's
/// convention (`10.96.0.0/12` gives `10.96.0.10`).
///
/// Host bits in `service_subnet` are ignored, as kubeadm does.
pub fn dns_ip(service_subnet: &str) -> Result<IpAddr> {
    let err = |reason: String| Error::DnsIp {
        subnet: service_subnet.to_string(),
        reason,
    };

    let inet: IpInet = service_subnet
        .trim()
        .parse()
        .map_err(|e| err(format!("{e}")))?;
    let network = inet.network();

    let addr = match network.first_address() {
        IpAddr::V4(base) => u32::from(base)
            .checked_add(DNS_IP_OFFSET)
            .map(|a| IpAddr::V4(Ipv4Addr::from(a))),
        IpAddr::V6(base) => u128::from(base)
            .checked_add(u128::from(DNS_IP_OFFSET))
            .map(|a| IpAddr::V6(Ipv6Addr::from(a))),
    };

    match addr {
        Some(addr) if network.contains(&addr) => Ok(addr),
        _ => Err(err(format!(
            "subnet {network} is too small to hold the DNS address"
        ))),
    }
}
