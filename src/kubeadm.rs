// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! Hand-off to kubeadm and kubectl once the node's own components are installed.

use std::{fs, io, os::unix::fs::PermissionsExt, path::Path};

use log::{info, warn};
use serde::Serialize;
use serde_json::json;

use crate::{
    error::{Error, IoContext, Result},
    exec::Cmd,
    layout::HostLayout,
    node::Node,
};

/// Write the role-specific kubeadm configuration as YAML to `layout.kubeadm_config()`.
pub fn persist_config<T: Serialize>(layout: &HostLayout, what: &'static str, config: &T) -> Result<()> {
    let yaml = serde_yaml::to_string(config).map_err(|source| Error::Marshal { what, source })?;
    let path = layout.kubeadm_config();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_path("create directory", parent)?;
    }
    fs::write(&path, yaml).with_path("write", &path)?;
    fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).with_path("set permissions on", &path)
}

fn kubeadm(node: &Node, subcommand: &str) -> Cmd {
    Cmd::new(node.layout.kubeadm()).arg(subcommand).passthrough()
}

fn config_flag(node: &Node) -> String {
    format!(
        "--config={}",
        node.layout.host_path(&node.layout.kubeadm_config()).display()
    )
}

pub fn init(node: &Node) -> Result<()> {
    let cmd = kubeadm(node, "init")
        .arg("--ignore-preflight-errors=all")
        .arg(config_flag(node));
    info!("running '{cmd}'");
    node.runner.run(&cmd)?;
    Ok(())
}

pub fn join(node: &Node) -> Result<()> {
    let cmd = kubeadm(node, "join")
        .arg("--ignore-preflight-errors=all")
        .arg(config_flag(node));
    info!("running '{cmd}'");
    node.runner.run(&cmd)?;
    Ok(())
}

fn kubectl(node: &Node) -> Cmd {
    Cmd::new(node.layout.kubectl()).arg(format!(
        "--kubeconfig={}",
        node.layout.host_path(&node.layout.admin_kubeconfig()).display()
    ))
}

/// Enable bridged traffic filtering and apply the network backend's manifest.
pub fn network_init(node: &Node) -> Result<()> {
    node.runner
        .run(&Cmd::new("sysctl").arg("net.bridge.bridge-nf-call-iptables=1"))?;

    let manifest_path = node.layout.flannel_manifest();
    let manifest = fs::read(&manifest_path).with_path("read", &manifest_path)?;
    let cmd = kubectl(node).args(["apply", "-f", "-"]).stdin(manifest);
    info!("applying network backend manifest {}", manifest_path.display());
    node.runner.run(&cmd)?;
    Ok(())
}

/// JSON patch that makes kube-proxy register under the node name rather than the hostname it
/// discovers itself (kubeadm issue 857).
pub fn kube_proxy_patch() -> serde_json::Value {
    json!([
        {
            "op": "add",
            "path": "/spec/template/spec/containers/0/command/-",
            "value": "--hostname-override=$(NODE_NAME)"
        },
        {
            "op": "add",
            "path": "/spec/template/spec/containers/0/env",
            "value": [{
                "name": "NODE_NAME",
                "valueFrom": {
                    "fieldRef": { "apiVersion": "v1", "fieldPath": "spec.nodeName" }
                }
            }]
        }
    ])
}

pub fn ensure_kube_proxy_respects_hostname_override(node: &Node) -> Result<()> {
    info!("applying workaround for https://github.com/kubernetes/kubeadm/issues/857");
    let cmd = kubectl(node)
        .args(["-n", "kube-system", "patch", "daemonset", "kube-proxy", "--type=json", "-p"])
        .arg(kube_proxy_patch().to_string());
    node.runner.run(&cmd)?;
    Ok(())
}

fn remove_path(path: &Path) -> io::Result<()> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

/// Undo an install as far as possible. Every step is best-effort: failures are logged and the
/// rest of the cleanup still runs.
pub fn reset(node: &Node) {
    let kubeadm_bin = node.layout.kubeadm();
    if kubeadm_bin.exists() {
        let cmd = Cmd::new(&kubeadm_bin).arg("reset").passthrough();
        info!("running '{cmd}'");
        if let Err(e) = node.runner.run(&cmd) {
            warn!("{e}");
        }
    } else {
        info!("{} not installed; skipping kubeadm reset", kubeadm_bin.display());
    }

    for path in node.layout.reset_paths() {
        if let Err(e) = remove_path(&path) {
            warn!("failed to remove {}: {e}", path.display());
        }
    }
}
