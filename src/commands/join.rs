// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use std::path::{Path, PathBuf};

use clap::Args;
use log::info;

use crate::{
    commands::{report, Cli, Handle, HandledResult},
    config::JoinConfiguration,
    defaults,
    error::{Error, Result},
    install, kubeadm,
    node::Node,
    validate,
};

#[derive(Args, Debug, Clone)]
pub struct JoinArgs {
    /// Join configuration file.
    #[arg(long)]
    pub cfg: Option<PathBuf>,
}

pub fn join(cli: &Cli, args: &JoinArgs) -> HandledResult<()> {
    let node = Node::system(cli.layout());
    run(&node, args.cfg.as_deref()).handle_err(|e| report("join", &e))
}

pub fn run(node: &Node, cfg: Option<&Path>) -> Result<()> {
    let mut config = match cfg {
        Some(path) => {
            info!("loading configuration from {}", path.display());
            JoinConfiguration::from_file(path)?
        }
        None => JoinConfiguration::default(),
    };

    defaults::set_join_defaults(&mut config);
    defaults::set_join_dynamic_defaults(&mut config, node.probe.as_ref())?;

    let errors = validate::validate_join(&config);
    if !errors.is_empty() {
        return Err(Error::Invalid(errors));
    }

    kubeadm::persist_config(
        &node.layout,
        "node configuration",
        &config.node_configuration,
    )?;

    install::install_worker_components(node, &config)?;

    kubeadm::join(node)?;

    info!("node {} joined", config.node_name());
    Ok(())
}
