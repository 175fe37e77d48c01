// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use std::path::{Path, PathBuf};

use crate::constants::*;

/// Every fixed filesystem location nodeadm reads or writes, resolved against a root directory.
///
/// On a real node the root is `/`. Tests (and `--root`) point it at a scratch directory so that
/// the whole pipeline can run without touching the host.
#[derive(Debug, Clone)]
pub struct HostLayout {
    root: PathBuf,
}

impl HostLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The layout rooted at `NODEADM_ROOT`, or `/` if unset.
    pub fn from_env() -> Self {
        Self::new(crate::default_root())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn at(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }

    /// The path as the running system will see it, i.e. with the layout root replaced by `/`.
    /// Used for paths written into unit files and configs.
    pub fn host_path(&self, path: &Path) -> PathBuf {
        match path.strip_prefix(&self.root) {
            Ok(rel) => Path::new("/").join(rel),
            Err(_) => path.to_path_buf(),
        }
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.at("/var/cache/nodeadm")
    }

    pub fn kube_cache_dir(&self) -> PathBuf {
        self.cache_dir().join("kubernetes").join(KUBERNETES_VERSION)
    }

    pub fn cni_archive(&self) -> PathBuf {
        self.cache_dir()
            .join("cni")
            .join(CNI_VERSION)
            .join(cni_archive_name())
    }

    pub fn flannel_manifest(&self) -> PathBuf {
        self.cache_dir().join("flannel").join(FLANNEL_MANIFEST)
    }

    /// The versioned install root. `reset` removes this directory wholesale.
    pub fn install_root(&self) -> PathBuf {
        self.at("/opt/bin").join(KUBERNETES_VERSION)
    }

    /// Where kubeadm, kubectl and kubelet are placed.
    pub fn install_dir(&self) -> PathBuf {
        self.install_root()
    }

    pub fn kubeadm(&self) -> PathBuf {
        self.install_dir().join("kubeadm")
    }

    pub fn kubectl(&self) -> PathBuf {
        self.install_dir().join("kubectl")
    }

    pub fn cni_base_dir(&self) -> PathBuf {
        self.at("/opt/cni")
    }

    pub fn cni_version_dir(&self) -> PathBuf {
        self.cni_base_dir().join(CNI_VERSION)
    }

    pub fn cni_bin_dir(&self) -> PathBuf {
        self.cni_base_dir().join("bin")
    }

    pub fn systemd_dir(&self) -> PathBuf {
        self.at("/etc/systemd/system")
    }

    pub fn kubelet_unit(&self) -> PathBuf {
        self.systemd_dir().join(KUBELET_SERVICE)
    }

    pub fn kubelet_dropin_dir(&self) -> PathBuf {
        self.systemd_dir().join(format!("{KUBELET_SERVICE}.d"))
    }

    pub fn keepalived_unit(&self) -> PathBuf {
        self.systemd_dir().join(KEEPALIVED_SERVICE)
    }

    pub fn keepalived_config(&self) -> PathBuf {
        self.at("/etc/keepalived/keepalived.conf")
    }

    pub fn state_dir(&self) -> PathBuf {
        self.at("/var/lib/nodeadm")
    }

    /// The role-specific configuration handed to kubeadm.
    pub fn kubeadm_config(&self) -> PathBuf {
        self.state_dir().join("kubeadm.yaml")
    }

    pub fn admin_kubeconfig(&self) -> PathBuf {
        self.at("/etc/kubernetes/admin.conf")
    }

    /// Paths removed by `reset`, in removal order.
    pub fn reset_paths(&self) -> Vec<PathBuf> {
        vec![
            self.install_root(),
            self.kubelet_unit(),
            self.kubelet_dropin_dir(),
            self.cni_base_dir(),
        ]
    }
}

impl Default for HostLayout {
    fn default() -> Self {
        Self::from_env()
    }
}
