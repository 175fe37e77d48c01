// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! Virtual IP failover for the API servers, provided by keepalived running in a container.

use std::collections::BTreeMap;

use log::{debug, info};
use minijinja::context;

use crate::{
    config::{Api, VipConfiguration},
    constants::*,
    error::Result,
    host::HostProbe,
    layout::HostLayout,
    template::TemplateRenderer,
};

const KEEPALIVED_CONF_TEMPLATE: &str = r#"global_defs {
	enable_script_security
}

vrrp_script chk_apiserver {
	script "/usr/bin/wget -T {{ script.timeout }} -qO /dev/null https://127.0.0.1:{{ api.bindPort }}/healthz"
	interval {{ script.interval }}
	fall {{ script.fall }}
	rise {{ script.rise }}
}

vrrp_instance K8S_APISERVER {
	interface {{ vip.networkInterface }}
	state BACKUP
	virtual_router_id {{ vip.routerID }}
	nopreempt
	virtual_ipaddress {
		{{ vip.ip }}
	}
	track_script {
		chk_apiserver
	}
}
"#;

const KEEPALIVED_SERVICE_TEMPLATE: &str = r#"[Unit]
Description=Keepalived service
After=network.target docker.service
Requires=docker.service

[Service]
Type=simple
ExecStartPre=-/usr/bin/docker kill vip
ExecStartPre=-/usr/bin/docker rm vip
ExecStart=/usr/bin/docker run --cap-add=NET_ADMIN \
	--net=host --name vip \
	-v {{ config_file }}:/usr/local/etc/keepalived/keepalived.conf \
	{{ image }}
ExecStop=/usr/bin/docker stop vip
ExecStop=/usr/bin/docker rm vip
Restart=on-failure
MemoryLow=10M

[Install]
WantedBy=multi-user.target
"#;

/// Fill in whatever the operator left unset.
///
/// The host is only queried for fields that are empty, so a fully specified VIP never touches the
/// routing table.
pub fn derive(vip: &mut VipConfiguration, probe: &dyn HostProbe) -> Result<()> {
    if vip.ip.is_empty() {
        vip.ip = probe.default_route_address()?.to_string();
        debug!("derived virtual IP {}", vip.ip);
    }
    if vip.network_interface.is_empty() {
        vip.network_interface = probe.default_route_interface()?;
        debug!("derived VIP interface {}", vip.network_interface);
    }
    if vip.router_id == 0 {
        vip.router_id = DEFAULT_ROUTER_ID;
    }
    Ok(())
}

/// The keepalived container image, overridable through the `keepAlived` configuration map.
pub fn keepalived_image(params: &BTreeMap<String, String>) -> &str {
    params
        .get(KEEPALIVED_IMAGE_KEY)
        .map(String::as_str)
        .filter(|image| !image.is_empty())
        .unwrap_or(KEEPALIVED_IMAGE)
}

/// Write keepalived.conf and keepalived.service for `vip`, deriving any missing VIP fields first.
pub fn write_failover_files(
    layout: &HostLayout,
    renderer: &TemplateRenderer,
    probe: &dyn HostProbe,
    vip: &mut VipConfiguration,
    api: &Api,
    params: &BTreeMap<String, String>,
) -> Result<()> {
    derive(vip, probe)?;
    info!(
        "configuring virtual IP {} on {} (router id {})",
        vip.ip, vip.network_interface, vip.router_id
    );

    let config_file = layout.keepalived_config();
    renderer.render(
        KEEPALIVED_CONF_TEMPLATE,
        "keepalived.conf",
        &config_file,
        context! {
            vip => &*vip,
            api => api,
            script => context! {
                interval => VRRP_SCRIPT_INTERVAL,
                rise => VRRP_SCRIPT_RISE,
                fall => VRRP_SCRIPT_FALL,
                timeout => WGET_TIMEOUT,
            },
        },
    )?;

    renderer.render(
        KEEPALIVED_SERVICE_TEMPLATE,
        "keepalived.service",
        &layout.keepalived_unit(),
        context! {
            config_file => layout.host_path(&config_file).display().to_string(),
            image => keepalived_image(params),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_env::{FakeProbe, TestEnvironment};

    fn vip(ip: &str, iface: &str, router_id: u32) -> VipConfiguration {
        VipConfiguration {
            ip: ip.to_string(),
            router_id,
            network_interface: iface.to_string(),
        }
    }

    #[test]
    fn explicit_vip_is_passed_through() {
        let probe = FakeProbe::new("m1", "eth0", "192.168.1.10");
        let mut v = vip("10.0.0.100", "bond0", 7);
        derive(&mut v, &probe).unwrap();
        assert_eq!(v, vip("10.0.0.100", "bond0", 7));
        assert_eq!(probe.route_queries(), 0);
        assert_eq!(probe.address_queries(), 0);
    }

    #[test]
    fn empty_vip_is_derived_from_default_route() {
        let probe = FakeProbe::new("m1", "eth0", "192.168.1.10");
        let mut v = VipConfiguration::default();
        derive(&mut v, &probe).unwrap();
        assert!(v.ip.parse::<std::net::IpAddr>().is_ok());
        assert_eq!(v.ip, "192.168.1.10");
        assert_eq!(v.network_interface, "eth0");
        assert_eq!(v.router_id, DEFAULT_ROUTER_ID);
    }

    #[test]
    fn route_lookup_failure_is_fatal() {
        let probe = FakeProbe::without_route("m1");
        let mut v = vip("", "", 0);
        assert!(derive(&mut v, &probe).is_err());

        let mut v = vip("10.0.0.100", "", 0);
        assert!(derive(&mut v, &probe).is_err());
        assert_eq!(v.network_interface, "");
    }

    #[test]
    fn image_override() {
        let mut params = BTreeMap::new();
        assert_eq!(keepalived_image(&params), KEEPALIVED_IMAGE);
        params.insert("image".to_string(), String::new());
        assert_eq!(keepalived_image(&params), KEEPALIVED_IMAGE);
        params.insert("image".to_string(), "local/keepalived:2".to_string());
        assert_eq!(keepalived_image(&params), "local/keepalived:2");
    }

    #[test]
    fn writes_config_and_unit() {
        let env = TestEnvironment::new("vip_files");
        let layout = env.layout();
        let probe = FakeProbe::new("m1", "eth0", "192.168.1.10");
        let mut v = vip("10.0.0.100", "", 0);
        let api = Api {
            bind_port: 8443,
            ..Api::default()
        };

        write_failover_files(
            &layout,
            &TemplateRenderer::new(),
            &probe,
            &mut v,
            &api,
            &BTreeMap::new(),
        )
        .unwrap();

        let conf = std::fs::read_to_string(layout.keepalived_config()).unwrap();
        assert!(conf.contains("https://127.0.0.1:8443/healthz"), "{conf}");
        assert!(conf.contains("interface eth0"), "{conf}");
        assert!(conf.contains(&format!("virtual_router_id {DEFAULT_ROUTER_ID}")));
        assert!(conf.contains("\t\t10.0.0.100\n"), "{conf}");
        assert!(conf.contains("nopreempt"));
        assert!(conf.contains("state BACKUP"));
        assert!(conf.contains(&format!("interval {VRRP_SCRIPT_INTERVAL}")));

        let unit = std::fs::read_to_string(layout.keepalived_unit()).unwrap();
        assert!(unit.contains("-v /etc/keepalived/keepalived.conf:/usr/local/etc/keepalived/keepalived.conf"), "{unit}");
        assert!(unit.contains(KEEPALIVED_IMAGE));
        assert!(unit.contains("Restart=on-failure"));
        assert!(unit.contains("MemoryLow=10M"));
    }
}
