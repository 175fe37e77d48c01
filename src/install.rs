// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! The installation pipeline: place binaries and the CNI plugins, write the kubelet's unit and
//! drop-ins, and bring services up.
//!
//! Every step is fatal on error. Nothing is retried or rolled back; a failed run leaves the node
//! as it was at the failing step so the operator can see what happened and re-run.

use std::{
    fs,
    os::unix::fs::{symlink, PermissionsExt},
    path::Path,
};

use log::{debug, info};
use serde::Serialize;

use crate::{
    config::{InitConfiguration, JoinConfiguration, KubeletConfiguration, Networking},
    constants::*,
    error::{Error, IoContext, Result},
    exec::Cmd,
    network,
    node::Node,
    vip,
};

const KUBELET_DROPIN_TEMPLATE: &str = r#"[Service]
Environment="KUBELET_EXTRA_ARGS=--fail-swap-on={{ fail_swap_on }} --max-pods={{ max_pods }} --cluster-dns={{ cluster_dns }} --cluster-domain={{ cluster_domain }} --hostname-override={{ hostname_override }} --kube-api-qps={{ kube_api_qps }} --kube-api-burst={{ kube_api_burst }} --eviction-hard={{ eviction_hard }} --feature-gates={{ feature_gates }} --cpu-manager-policy={{ cpu_manager_policy }}{% if kube_reserved_cpu %} --kube-reserved={{ kube_reserved_cpu }}{% endif %}"
"#;

/// Values substituted into the nodeadm kubelet drop-in.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct KubeletDropinData {
    pub fail_swap_on: bool,
    pub max_pods: i32,
    pub cluster_dns: String,
    pub cluster_domain: String,
    pub hostname_override: String,
    pub kube_api_qps: i32,
    pub kube_api_burst: i32,
    pub eviction_hard: String,
    pub feature_gates: String,
    pub cpu_manager_policy: String,
    pub kube_reserved_cpu: Option<String>,
}

impl KubeletDropinData {
    pub fn new(
        networking: &Networking,
        kubelet: &KubeletConfiguration,
        hostname_override: &str,
    ) -> Result<Self> {
        Ok(KubeletDropinData {
            fail_swap_on: kubelet.fail_swap_on,
            max_pods: kubelet.max_pods,
            cluster_dns: network::dns_ip(&networking.service_subnet)?.to_string(),
            cluster_domain: networking.dns_domain.clone(),
            hostname_override: hostname_override.to_string(),
            kube_api_qps: kubelet.kube_api_qps,
            kube_api_burst: kubelet.kube_api_burst,
            eviction_hard: KUBELET_EVICTION_HARD.to_string(),
            feature_gates: FEATURE_GATES.to_string(),
            cpu_manager_policy: kubelet.cpu_manager_policy.clone(),
            kube_reserved_cpu: kubelet
                .kube_reserved
                .get(KUBE_RESERVED_CPU_KEY)
                .map(|cpu| format!("{KUBE_RESERVED_CPU_KEY}={cpu}")),
        })
    }
}

pub fn install_control_plane_components(node: &Node, config: &mut InitConfiguration) -> Result<()> {
    let hostname = config.node_name().to_string();
    install_node_agent(node, config.networking(), &config.kubelet, &hostname)?;

    if let Some(vip_config) = config.vip_configuration.as_mut() {
        info!("installing {KEEPALIVED_SERVICE}");
        let api = &config.master_configuration.api;
        let params = &config.keep_alived;
        node.services().replace_with(KEEPALIVED_SERVICE, || {
            vip::write_failover_files(
                &node.layout,
                &node.renderer,
                node.probe.as_ref(),
                vip_config,
                api,
                params,
            )
        })?;
    }
    Ok(())
}

pub fn install_worker_components(node: &Node, config: &JoinConfiguration) -> Result<()> {
    install_node_agent(node, &config.networking, &config.kubelet, config.node_name())
}

/// The steps shared by both roles, ending with a running kubelet.
fn install_node_agent(
    node: &Node,
    networking: &Networking,
    kubelet: &KubeletConfiguration,
    hostname: &str,
) -> Result<()> {
    info!("populating artifact cache");
    node.cache.populate(&node.layout)?;

    info!("placing kubernetes binaries");
    place_kube_components(node)?;

    info!("placing CNI plugins");
    place_cni_plugins(node)?;

    info!("installing {KUBELET_SERVICE}");
    node.services().replace_with(KUBELET_SERVICE, || {
        place_kubelet_files(node, networking, kubelet, hostname)
    })
}

fn copy_file(from: &Path, to: &Path) -> Result<()> {
    debug!("copying {} to {}", from.display(), to.display());
    fs::copy(from, to).map_err(|source| Error::Copy {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    })?;
    Ok(())
}

fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).with_path("create directory", dir)
}

pub fn place_kube_components(node: &Node) -> Result<()> {
    let install_dir = node.layout.install_dir();
    ensure_dir(&install_dir)?;
    for bin in KUBE_BINARIES {
        let dest = install_dir.join(bin);
        copy_file(&node.layout.kube_cache_dir().join(bin), &dest)?;
        fs::set_permissions(&dest, fs::Permissions::from_mode(0o755))
            .with_path("set permissions on", &dest)?;
    }
    Ok(())
}

/// Extract the CNI plugin tarball into its versioned directory and link each plugin into the CNI
/// bin directory. Skipped entirely if the versioned directory already exists.
///
/// Extraction happens in a `.partial` sibling that is renamed into place only once the plugins are
/// extracted and linked, so a failed run never leaves a versioned directory behind.
pub fn place_cni_plugins(node: &Node) -> Result<()> {
    let layout = &node.layout;
    let version_dir = layout.cni_version_dir();
    if version_dir.exists() {
        debug!("{} exists; not extracting CNI plugins", version_dir.display());
        return Ok(());
    }

    let staging_dir = version_dir.with_file_name(format!("{CNI_VERSION}.partial"));
    if staging_dir.exists() {
        debug!("removing stale {}", staging_dir.display());
        fs::remove_dir_all(&staging_dir).with_path("remove", &staging_dir)?;
    }
    ensure_dir(&staging_dir)?;

    let archive = layout.cni_archive();
    node.runner.run(
        &Cmd::new("tar")
            .arg("-xzf")
            .arg(archive.display().to_string())
            .arg("-C")
            .arg(staging_dir.display().to_string()),
    )?;

    create_symlinks(
        &staging_dir,
        &layout.host_path(&version_dir),
        &layout.cni_bin_dir(),
    )?;
    fs::rename(&staging_dir, &version_dir).with_path("rename", &staging_dir)
}

/// For every entry of `src_dir`, link `dest_dir/<name>` to `target_dir/<name>`, replacing
/// existing entries. The targets need not exist yet.
fn create_symlinks(src_dir: &Path, target_dir: &Path, dest_dir: &Path) -> Result<()> {
    ensure_dir(dest_dir)?;
    let entries = fs::read_dir(src_dir).with_path("read directory", src_dir)?;
    for entry in entries {
        let entry = entry.with_path("read directory", src_dir)?;
        let link = dest_dir.join(entry.file_name());
        match fs::remove_file(&link) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e).with_path("remove", &link),
        }
        symlink(target_dir.join(entry.file_name()), &link).with_path("symlink", &link)?;
    }
    Ok(())
}

/// Copy `from` to `to`, pointing every reference to the upstream binary directory at `bin_dir`.
fn place_with_bin_dir(from: &Path, to: &Path, bin_dir: &Path) -> Result<()> {
    let contents = fs::read_to_string(from).with_path("read", from)?;
    if let Some(parent) = to.parent() {
        ensure_dir(parent)?;
    }
    let contents = contents.replace(UPSTREAM_BIN_DIR, &bin_dir.display().to_string());
    fs::write(to, contents).with_path("write", to)
}

fn place_kubelet_files(
    node: &Node,
    networking: &Networking,
    kubelet: &KubeletConfiguration,
    hostname: &str,
) -> Result<()> {
    let layout = &node.layout;
    let cache = layout.kube_cache_dir();
    let bin_dir = layout.host_path(&layout.install_dir());

    place_with_bin_dir(
        &cache.join(KUBELET_SERVICE),
        &layout.kubelet_unit(),
        &bin_dir,
    )?;
    place_with_bin_dir(
        &cache.join(KUBEADM_KUBELET_DROPIN),
        &layout.kubelet_dropin_dir().join(KUBEADM_KUBELET_DROPIN),
        &bin_dir,
    )?;

    let data = KubeletDropinData::new(networking, kubelet, hostname)?;
    node.renderer.render(
        KUBELET_DROPIN_TEMPLATE,
        "nodeadm-kubelet-systemd-dropin",
        &layout.kubelet_dropin_dir().join(NODEADM_KUBELET_DROPIN),
        &data,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_env::TestEnvironment;

    #[test]
    fn dropin_data_from_defaults() {
        let data = KubeletDropinData::new(
            &Networking::default(),
            &KubeletConfiguration::default(),
            "node-1",
        )
        .unwrap();
        assert_eq!(data.cluster_dns, "10.96.0.10");
        assert_eq!(data.cluster_domain, DEFAULT_DNS_DOMAIN);
        assert_eq!(data.kube_reserved_cpu, None);
        assert_eq!(data.feature_gates, FEATURE_GATES);
    }

    #[test]
    fn dropin_data_with_reserved_cpu() {
        let mut kubelet = KubeletConfiguration::default();
        kubelet
            .kube_reserved
            .insert("cpu".to_string(), "500m".to_string());
        let data = KubeletDropinData::new(&Networking::default(), &kubelet, "n").unwrap();
        assert_eq!(data.kube_reserved_cpu.as_deref(), Some("cpu=500m"));
    }

    #[test]
    fn bad_subnet_fails_before_writing() {
        let networking = Networking {
            service_subnet: "bogus".to_string(),
            ..Networking::default()
        };
        assert!(matches!(
            KubeletDropinData::new(&networking, &KubeletConfiguration::default(), "n"),
            Err(Error::DnsIp { .. })
        ));
    }

    #[test]
    fn symlinks_replace_stale_links() {
        let env = TestEnvironment::new("install_symlinks");
        let src = env.path("src");
        let dest = env.path("dest");
        fs::create_dir_all(&src).unwrap();
        fs::create_dir_all(&dest).unwrap();
        fs::write(src.join("bridge"), "bin").unwrap();
        symlink("/nonexistent", dest.join("bridge")).unwrap();

        create_symlinks(&src, Path::new("/opt/cni/v0"), &dest).unwrap();
        assert_eq!(
            fs::read_link(dest.join("bridge")).unwrap(),
            Path::new("/opt/cni/v0/bridge")
        );
    }

    #[test]
    fn bin_dir_is_rewritten() {
        let env = TestEnvironment::new("install_rewrite");
        let from = env.path("kubelet.service");
        fs::write(&from, "ExecStart=/usr/bin/kubelet\n").unwrap();
        let to = env.path("out/kubelet.service");
        place_with_bin_dir(&from, &to, Path::new("/opt/bin/v1")).unwrap();
        assert_eq!(fs::read_to_string(&to).unwrap(), "ExecStart=/opt/bin/v1/kubelet\n");
    }
}
