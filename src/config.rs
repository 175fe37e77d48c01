// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use std::{collections::BTreeMap, path::Path};

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{
    constants::*,
    error::{Error, Result},
};

/// Extra command-line flags for one control-plane component, keyed by flag name.
pub type ExtraArgs = BTreeMap<String, String>;

/// InitConfiguration is the model read from the file given to `nodeadm init`.
///
/// Only `masterConfiguration` is handed to kubeadm; everything else is consumed by nodeadm itself
/// while installing the node.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InitConfiguration {
    #[serde(default)]
    pub master_configuration: MasterConfiguration,

    /// Present when the control plane should be fronted by a keepalived-managed virtual IP.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vip_configuration: Option<VipConfiguration>,

    #[serde(default)]
    pub kubelet: KubeletConfiguration,

    #[serde(default)]
    pub network_backend: BTreeMap<String, String>,

    #[serde(default)]
    pub keep_alived: BTreeMap<String, String>,
}

impl InitConfiguration {
    pub fn from_file(path: &Path) -> Result<Self> {
        from_file(path)
    }

    pub fn networking(&self) -> &Networking {
        &self.master_configuration.networking
    }

    pub fn node_name(&self) -> &str {
        &self.master_configuration.node_registration.name
    }
}

/// JoinConfiguration is the model read from the file given to `nodeadm join`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JoinConfiguration {
    #[serde(default)]
    pub node_configuration: NodeConfiguration,

    #[serde(default)]
    pub networking: Networking,

    #[serde(default)]
    pub kubelet: KubeletConfiguration,
}

impl JoinConfiguration {
    pub fn from_file(path: &Path) -> Result<Self> {
        from_file(path)
    }

    pub fn node_name(&self) -> &str {
        &self.node_configuration.node_registration.name
    }
}

fn from_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&contents).map_err(|source| Error::ConfigParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Parameters for the virtual IP that API servers advertise and accept requests on.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VipConfiguration {
    /// The virtual IP. Empty means "use the address on the default route".
    #[serde(default)]
    pub ip: String,

    /// The virtual router ID, in [0, 254]; 0 selects the default. Must be unique within a
    /// single L2 network domain. Nothing here can check that, so it is left to the operator.
    #[serde(default, rename = "routerID")]
    pub router_id: u32,

    /// Interface to create the virtual IP on. Empty means "the default gateway's interface".
    #[serde(default)]
    pub network_interface: String,
}

/// The subset of kubeadm's MasterConfiguration that nodeadm reads or defaults. Any other field
/// in the input is carried through to kubeadm untouched.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MasterConfiguration {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,

    #[serde(default)]
    pub api: Api,

    #[serde(default)]
    pub networking: Networking,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kubernetes_version: String,

    #[serde(default)]
    pub node_registration: NodeRegistration,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_server_extra_args: Option<ExtraArgs>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller_manager_extra_args: Option<ExtraArgs>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduler_extra_args: Option<ExtraArgs>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Api {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub advertise_address: String,
    pub bind_port: u16,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub control_plane_endpoint: String,
}

impl Default for Api {
    fn default() -> Self {
        Api {
            advertise_address: String::new(),
            bind_port: DEFAULT_BIND_PORT,
            control_plane_endpoint: String::new(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Networking {
    pub service_subnet: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub pod_subnet: String,
    pub dns_domain: String,
}

impl Default for Networking {
    fn default() -> Self {
        Networking {
            service_subnet: DEFAULT_SERVICE_SUBNET.to_string(),
            pod_subnet: String::new(),
            dns_domain: DEFAULT_DNS_DOMAIN.to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NodeRegistration {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cri_socket: String,

    /// `None` lets kubeadm apply its own default taint; `Some(vec![])` means "no taints".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taints: Option<Vec<Taint>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubelet_extra_args: Option<ExtraArgs>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Taint {
    pub key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub value: String,
    pub effect: String,
}

/// The subset of kubeadm's NodeConfiguration that nodeadm reads or defaults.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NodeConfiguration {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,

    #[serde(default)]
    pub node_registration: NodeRegistration,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub token: String,

    #[serde(
        default,
        rename = "discoveryTokenAPIServers",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub discovery_token_api_servers: Vec<String>,

    #[serde(
        default,
        rename = "discoveryTokenCACertHashes",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub discovery_token_ca_cert_hashes: Vec<String>,

    #[serde(
        default,
        rename = "discoveryTokenUnsafeSkipCAVerification",
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub discovery_token_unsafe_skip_ca_verification: bool,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// Kubelet settings that nodeadm writes into the kubelet's systemd drop-in.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct KubeletConfiguration {
    pub fail_swap_on: bool,
    pub max_pods: i32,
    #[serde(rename = "kubeAPIQPS")]
    pub kube_api_qps: i32,
    #[serde(rename = "kubeAPIBurst")]
    pub kube_api_burst: i32,
    pub cpu_manager_policy: String,
    pub kube_reserved: BTreeMap<String, String>,
}

impl Default for KubeletConfiguration {
    fn default() -> Self {
        KubeletConfiguration {
            fail_swap_on: true,
            max_pods: 110,
            kube_api_qps: 5,
            kube_api_burst: 10,
            cpu_manager_policy: "none".to_string(),
            kube_reserved: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_camel_case_field_names() {
        let yaml = r#"
vipConfiguration:
  ip: 10.0.0.100
  routerID: 42
  networkInterface: eth1
masterConfiguration:
  api:
    bindPort: 8443
  networking:
    serviceSubnet: 10.100.0.0/16
  apiServerCertSANs:
    - k8s.example.com
kubelet:
  maxPods: 200
  kubeAPIQPS: 20
  kubeReserved:
    cpu: 500m
keepAlived:
  image: registry.local/keepalived:2
"#;
        let config: InitConfiguration = serde_yaml::from_str(yaml).unwrap();
        let vip = config.vip_configuration.as_ref().unwrap();
        assert_eq!(vip.router_id, 42);
        assert_eq!(vip.network_interface, "eth1");
        assert_eq!(config.master_configuration.api.bind_port, 8443);
        assert_eq!(config.networking().service_subnet, "10.100.0.0/16");
        assert_eq!(config.networking().dns_domain, DEFAULT_DNS_DOMAIN);
        assert_eq!(config.kubelet.max_pods, 200);
        assert_eq!(config.kubelet.kube_api_qps, 20);
        assert_eq!(config.kubelet.kube_api_burst, 10);
        assert!(config.kubelet.fail_swap_on);
        assert_eq!(config.keep_alived.get("image").unwrap(), "registry.local/keepalived:2");
        assert!(config
            .master_configuration
            .extra
            .contains_key("apiServerCertSANs"));
    }

    #[test]
    fn absent_vip_section_stays_absent() {
        let config: InitConfiguration = serde_yaml::from_str("kubelet: {}").unwrap();
        assert!(config.vip_configuration.is_none());
        assert_eq!(config.master_configuration.api.bind_port, DEFAULT_BIND_PORT);
    }

    #[test]
    fn empty_taints_are_written_out() {
        let mut master = MasterConfiguration::default();
        master.node_registration.taints = Some(vec![]);
        let yaml = serde_yaml::to_string(&master).unwrap();
        assert!(yaml.contains("taints: []"), "{yaml}");
    }

    #[test]
    fn unknown_node_configuration_fields_pass_through() {
        let yaml = "discoveryTokenAPIServers: [10.0.0.1:6443]\ntlsBootstrapToken: abc.def\n";
        let node: NodeConfiguration = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(node.discovery_token_api_servers, vec!["10.0.0.1:6443"]);
        let out = serde_yaml::to_string(&node).unwrap();
        assert!(out.contains("tlsBootstrapToken: abc.def"), "{out}");
        assert!(out.contains("discoveryTokenAPIServers"), "{out}");
    }
}
