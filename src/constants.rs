// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! Fixed versions, names and tunables baked into a nodeadm release.

/// Kubernetes release installed by this build. Also used as the versioned install root name.
pub const KUBERNETES_VERSION: &str = "v1.11.1";

pub const CNI_VERSION: &str = "v0.6.0";

pub const KUBEADM_API_VERSION: &str = "kubeadm.k8s.io/v1alpha2";
pub const MASTER_CONFIGURATION_KIND: &str = "MasterConfiguration";
pub const NODE_CONFIGURATION_KIND: &str = "NodeConfiguration";

/// Feature gates enabled on every control-plane component and on the kubelet.
pub const FEATURE_GATES: &str = "PodPriority=true";
pub const FEATURE_GATES_KEY: &str = "feature-gates";

pub const KUBELET_EVICTION_HARD: &str = "memory.available<600Mi,nodefs.available<10%";
pub const KUBE_RESERVED_CPU_KEY: &str = "cpu";

pub const KUBELET_SERVICE: &str = "kubelet.service";
pub const KEEPALIVED_SERVICE: &str = "keepalived.service";
pub const KUBEADM_KUBELET_DROPIN: &str = "10-kubeadm.conf";
pub const NODEADM_KUBELET_DROPIN: &str = "20-nodeadm.conf";

pub const KUBE_BINARIES: [&str; 3] = ["kubeadm", "kubectl", "kubelet"];

/// Path the upstream unit files expect binaries under; rewritten to the install directory.
pub const UPSTREAM_BIN_DIR: &str = "/usr/bin";

pub const FLANNEL_MANIFEST: &str = "kube-flannel.yml";

pub const KEEPALIVED_IMAGE: &str = "osixia/keepalived:1.4.5";
pub const KEEPALIVED_IMAGE_KEY: &str = "image";
pub const DEFAULT_ROUTER_ID: u32 = 51;
pub const MAX_ROUTER_ID: u32 = 254;
pub const VRRP_SCRIPT_INTERVAL: u32 = 5;
pub const VRRP_SCRIPT_RISE: u32 = 2;
pub const VRRP_SCRIPT_FALL: u32 = 2;
pub const WGET_TIMEOUT: u32 = 3;

pub const DEFAULT_SERVICE_SUBNET: &str = "10.96.0.0/12";
pub const DEFAULT_DNS_DOMAIN: &str = "cluster.local";
pub const DEFAULT_BIND_PORT: u16 = 6443;

/// Offset of the cluster DNS service within the service subnet.
pub const DNS_IP_OFFSET: u32 = 10;

pub fn cni_archive_name() -> String {
    format!("cni-plugins-amd64-{CNI_VERSION}.tgz")
}
