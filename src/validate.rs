// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! Checks run on a fully defaulted configuration before anything on the node is touched.
//!
//! Validation collects every problem rather than stopping at the first, so the operator can fix
//! the whole file in one pass.

use std::{fmt, net::IpAddr};

use crate::{
    config::{InitConfiguration, JoinConfiguration, Networking, VipConfiguration},
    constants::MAX_ROUTER_ID,
    network,
};

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Dotted path of the offending field, as written in the config file.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        ValidationError {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

fn validate_networking(prefix: &str, networking: &Networking, errors: &mut Vec<ValidationError>) {
    if let Err(e) = network::dns_ip(&networking.service_subnet) {
        errors.push(ValidationError::new(
            &format!("{prefix}.serviceSubnet"),
            e.to_string(),
        ));
    }
    if networking.dns_domain.is_empty() {
        errors.push(ValidationError::new(
            &format!("{prefix}.dnsDomain"),
            "must not be empty",
        ));
    }
}

fn validate_vip(vip: &VipConfiguration, errors: &mut Vec<ValidationError>) {
    if !vip.ip.is_empty() && vip.ip.parse::<IpAddr>().is_err() {
        errors.push(ValidationError::new(
            "vipConfiguration.ip",
            format!("{:?} is not a valid IP address", vip.ip),
        ));
    }
    if vip.router_id > MAX_ROUTER_ID {
        errors.push(ValidationError::new(
            "vipConfiguration.routerID",
            format!("{} is outside the range [0, {MAX_ROUTER_ID}]", vip.router_id),
        ));
    }
}

fn validate_node_name(field: &str, name: &str, errors: &mut Vec<ValidationError>) {
    if name.is_empty() {
        errors.push(ValidationError::new(field, "must not be empty"));
    }
}

pub fn validate_init(config: &InitConfiguration) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let master = &config.master_configuration;

    if master.api.bind_port == 0 {
        errors.push(ValidationError::new(
            "masterConfiguration.api.bindPort",
            "must not be 0",
        ));
    }
    validate_networking("masterConfiguration.networking", &master.networking, &mut errors);
    validate_node_name(
        "masterConfiguration.nodeRegistration.name",
        &master.node_registration.name,
        &mut errors,
    );
    if let Some(vip) = &config.vip_configuration {
        validate_vip(vip, &mut errors);
    }

    errors
}

pub fn validate_join(config: &JoinConfiguration) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let node = &config.node_configuration;

    validate_networking("networking", &config.networking, &mut errors);
    validate_node_name(
        "nodeConfiguration.nodeRegistration.name",
        &node.node_registration.name,
        &mut errors,
    );
    if node.discovery_token_api_servers.is_empty() {
        errors.push(ValidationError::new(
            "nodeConfiguration.discoveryTokenAPIServers",
            "at least one API server is required",
        ));
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_init() -> InitConfiguration {
        let mut config = InitConfiguration::default();
        config.master_configuration.node_registration.name = "m1".to_string();
        config
    }

    #[test]
    fn defaulted_init_is_valid() {
        assert_eq!(validate_init(&valid_init()), vec![]);
    }

    #[test]
    fn all_errors_are_reported_in_order() {
        let mut config = valid_init();
        config.master_configuration.api.bind_port = 0;
        config.master_configuration.networking.service_subnet = "10.0.0.0/30".to_string();
        config.vip_configuration = Some(VipConfiguration {
            ip: "10.0.0.300".to_string(),
            router_id: 255,
            network_interface: String::new(),
        });
        let fields: Vec<String> = validate_init(&config)
            .into_iter()
            .map(|e| e.field)
            .collect();
        assert_eq!(
            fields,
            vec![
                "masterConfiguration.api.bindPort",
                "masterConfiguration.networking.serviceSubnet",
                "vipConfiguration.ip",
                "vipConfiguration.routerID",
            ]
        );
    }

    #[test]
    fn router_id_bounds() {
        let mut config = valid_init();
        config.vip_configuration = Some(VipConfiguration {
            router_id: MAX_ROUTER_ID,
            ..VipConfiguration::default()
        });
        assert!(validate_init(&config).is_empty());
    }

    #[test]
    fn join_requires_discovery_and_name() {
        let errors = validate_join(&JoinConfiguration::default());
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].to_string(), "nodeConfiguration.nodeRegistration.name: must not be empty");

        let mut config = JoinConfiguration::default();
        config.node_configuration.node_registration.name = "w1".to_string();
        config.node_configuration.discovery_token_api_servers = vec!["10.0.0.1:6443".to_string()];
        assert!(validate_join(&config).is_empty());
    }
}
