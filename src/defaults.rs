// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! Static and host-derived defaults for init and join configurations.

use std::fmt;

use log::debug;

use crate::{
    config::{ExtraArgs, InitConfiguration, JoinConfiguration},
    constants::*,
    error::Result,
    host::HostProbe,
    vip,
};

/// An ordered, duplicate-free set of `name=value` feature-gate tokens.
///
/// Written out as the comma-separated string the Kubernetes components accept. Merging is a set
/// union that keeps first-seen order, so applying the same defaults twice changes nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureGates {
    tokens: Vec<String>,
}

impl FeatureGates {
    pub fn parse(s: &str) -> Self {
        let mut gates = FeatureGates::default();
        for token in s.split(',') {
            gates.insert(token);
        }
        gates
    }

    pub fn insert(&mut self, token: &str) {
        let token = token.trim();
        if !token.is_empty() && !self.tokens.iter().any(|t| t == token) {
            self.tokens.push(token.to_string());
        }
    }

    pub fn merge(&mut self, other: &FeatureGates) {
        for token in other.tokens.iter() {
            self.insert(token);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl fmt::Display for FeatureGates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tokens.join(","))
    }
}

/// Merge comma-separated `value` into `key` of the (possibly absent) extra-args map.
///
/// The map is created if needed. A missing key is set outright; an existing key gets the union of
/// its tokens and the new ones.
pub fn merge_extra_arg(args: &mut Option<ExtraArgs>, key: &str, value: &str) {
    let args = args.get_or_insert_with(ExtraArgs::new);
    match args.get_mut(key) {
        None => {
            args.insert(key.to_string(), FeatureGates::parse(value).to_string());
        }
        Some(existing) => {
            let mut merged = FeatureGates::parse(existing);
            merged.merge(&FeatureGates::parse(value));
            *existing = merged.to_string();
        }
    }
}

pub fn set_init_defaults(config: &mut InitConfiguration) {
    let master = &mut config.master_configuration;
    master.api_version = KUBEADM_API_VERSION.to_string();
    master.kind = MASTER_CONFIGURATION_KIND.to_string();
    master.kubernetes_version = KUBERNETES_VERSION.to_string();
    master.node_registration.taints = Some(Vec::new());

    merge_extra_arg(&mut master.api_server_extra_args, FEATURE_GATES_KEY, FEATURE_GATES);
    merge_extra_arg(
        &mut master.controller_manager_extra_args,
        FEATURE_GATES_KEY,
        FEATURE_GATES,
    );
    merge_extra_arg(&mut master.scheduler_extra_args, FEATURE_GATES_KEY, FEATURE_GATES);
}

pub fn set_join_defaults(config: &mut JoinConfiguration) {
    let node = &mut config.node_configuration;
    node.api_version = KUBEADM_API_VERSION.to_string();
    node.kind = NODE_CONFIGURATION_KIND.to_string();
}

/// Resolve the hostname override and use it as the node name unless one was given.
///
/// On error, `name` is left as it was.
fn set_node_name(name: &mut String, probe: &dyn HostProbe) -> Result<()> {
    let hostname = probe.hostname()?;
    if name.is_empty() {
        debug!("using hostname override '{hostname}' as node name");
        *name = hostname;
    }
    Ok(())
}

pub fn set_init_dynamic_defaults(config: &mut InitConfiguration, probe: &dyn HostProbe) -> Result<()> {
    set_node_name(
        &mut config.master_configuration.node_registration.name,
        probe,
    )?;
    if let Some(vip_config) = config.vip_configuration.as_mut() {
        vip::derive(vip_config, probe)?;
    }
    Ok(())
}

pub fn set_join_dynamic_defaults(config: &mut JoinConfiguration, probe: &dyn HostProbe) -> Result<()> {
    set_node_name(
        &mut config.node_configuration.node_registration.name,
        probe,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::VipConfiguration, test_env::FakeProbe};

    #[test]
    fn feature_gates_merge_without_duplicates() {
        let mut gates = FeatureGates::parse("A=true, B=false");
        gates.merge(&FeatureGates::parse("B=false,C=true"));
        assert_eq!(gates.to_string(), "A=true,B=false,C=true");
        assert!(FeatureGates::parse(" , ").is_empty());
    }

    #[test]
    fn extra_arg_merge_creates_map() {
        let mut args = None;
        merge_extra_arg(&mut args, FEATURE_GATES_KEY, FEATURE_GATES);
        assert_eq!(args.unwrap().get(FEATURE_GATES_KEY).unwrap(), FEATURE_GATES);
    }

    #[test]
    fn extra_arg_merge_keeps_user_flags() {
        let mut args = Some(ExtraArgs::from([(
            FEATURE_GATES_KEY.to_string(),
            "CustomGate=true".to_string(),
        )]));
        merge_extra_arg(&mut args, FEATURE_GATES_KEY, FEATURE_GATES);
        assert_eq!(
            args.unwrap().get(FEATURE_GATES_KEY).unwrap(),
            &format!("CustomGate=true,{FEATURE_GATES}")
        );
    }

    #[test]
    fn init_defaults_are_idempotent() {
        let mut config = InitConfiguration::default();
        set_init_defaults(&mut config);
        let once = config.clone();
        set_init_defaults(&mut config);
        assert_eq!(once, config);

        let master = &config.master_configuration;
        assert_eq!(master.kind, MASTER_CONFIGURATION_KIND);
        assert_eq!(master.kubernetes_version, KUBERNETES_VERSION);
        assert_eq!(master.node_registration.taints, Some(vec![]));
        for args in [
            &master.api_server_extra_args,
            &master.controller_manager_extra_args,
            &master.scheduler_extra_args,
        ] {
            assert_eq!(
                args.as_ref().unwrap().get(FEATURE_GATES_KEY).unwrap(),
                FEATURE_GATES
            );
        }
    }

    #[test]
    fn join_defaults_tag_node_configuration() {
        let mut config = JoinConfiguration::default();
        set_join_defaults(&mut config);
        assert_eq!(config.node_configuration.api_version, KUBEADM_API_VERSION);
        assert_eq!(config.node_configuration.kind, NODE_CONFIGURATION_KIND);
    }

    #[test]
    fn node_name_comes_from_hostname() {
        let probe = FakeProbe::new("node-1", "eth0", "192.168.10.5");
        let mut config = InitConfiguration::default();
        set_init_dynamic_defaults(&mut config, &probe).unwrap();
        assert_eq!(config.node_name(), "node-1");
    }

    #[test]
    fn explicit_node_name_is_kept() {
        let probe = FakeProbe::new("node-1", "eth0", "192.168.10.5");
        let mut config = JoinConfiguration::default();
        config.node_configuration.node_registration.name = "worker-a".to_string();
        set_join_dynamic_defaults(&mut config, &probe).unwrap();
        assert_eq!(config.node_name(), "worker-a");
    }

    #[test]
    fn missing_hostname_is_an_error_and_changes_nothing() {
        let probe = FakeProbe::without_hostname();

        let mut config = InitConfiguration::default();
        assert!(set_init_dynamic_defaults(&mut config, &probe).is_err());
        assert_eq!(config.node_name(), "");

        let mut config = JoinConfiguration::default();
        config.node_configuration.node_registration.name = "worker-a".to_string();
        assert!(set_join_dynamic_defaults(&mut config, &probe).is_err());
        assert_eq!(config.node_name(), "worker-a");
    }

    #[test]
    fn vip_is_derived_only_when_present() {
        let probe = FakeProbe::new("node-1", "eth0", "192.168.10.5");
        let mut config = InitConfiguration::default();
        set_init_dynamic_defaults(&mut config, &probe).unwrap();
        assert!(config.vip_configuration.is_none());
        assert_eq!(probe.route_queries(), 0);

        config.vip_configuration = Some(VipConfiguration::default());
        set_init_dynamic_defaults(&mut config, &probe).unwrap();
        let vip = config.vip_configuration.unwrap();
        assert_eq!(vip.ip, "192.168.10.5");
        assert_eq!(vip.network_interface, "eth0");
        assert_eq!(vip.router_id, DEFAULT_ROUTER_ID);
    }
}
