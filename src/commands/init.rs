// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use std::path::{Path, PathBuf};

use clap::Args;
use log::info;

use crate::{
    commands::{report, Cli, Handle, HandledResult},
    config::InitConfiguration,
    defaults,
    error::{Error, Result},
    install, kubeadm,
    node::Node,
    validate,
};

#[derive(Args, Debug, Clone)]
pub struct InitArgs {
    /// Init configuration file. Without it, every setting takes its default.
    #[arg(long)]
    pub cfg: Option<PathBuf>,
}

pub fn init(cli: &Cli, args: &InitArgs) -> HandledResult<()> {
    let node = Node::system(cli.layout());
    run(&node, args.cfg.as_deref()).handle_err(|e| report("init", &e))
}

/// Resolve, validate and persist the control-plane configuration, install this node's
/// components, then hand off to `kubeadm init` and set up cluster networking.
pub fn run(node: &Node, cfg: Option<&Path>) -> Result<()> {
    let mut config = match cfg {
        Some(path) => {
            info!("loading configuration from {}", path.display());
            InitConfiguration::from_file(path)?
        }
        None => InitConfiguration::default(),
    };

    defaults::set_init_defaults(&mut config);
    defaults::set_init_dynamic_defaults(&mut config, node.probe.as_ref())?;

    let errors = validate::validate_init(&config);
    if !errors.is_empty() {
        return Err(Error::Invalid(errors));
    }

    kubeadm::persist_config(
        &node.layout,
        "master configuration",
        &config.master_configuration,
    )?;

    install::install_control_plane_components(node, &mut config)?;

    kubeadm::init(node)?;
    kubeadm::ensure_kube_proxy_respects_hostname_override(node)?;
    kubeadm::network_init(node)?;

    info!("node {} initialized", config.node_name());
    Ok(())
}
