// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use log::info;

use crate::{
    commands::{Cli, HandledResult},
    kubeadm,
    node::Node,
};

/// Reset never fails: cleanup problems are logged as warnings and the rest of the cleanup still
/// runs.
pub fn reset(cli: &Cli) -> HandledResult<()> {
    let node = Node::system(cli.layout());
    run(&node);
    Ok(())
}

pub fn run(node: &Node) {
    info!("resetting node at {}", node.layout.root().display());
    kubeadm::reset(node);
}
