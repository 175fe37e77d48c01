// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

pub mod cache;
pub mod commands;
pub mod config;
pub mod constants;
pub mod defaults;
pub mod error;
pub mod exec;
pub mod host;
pub mod install;
pub mod kubeadm;
pub mod layout;
pub mod network;
pub mod node;
pub mod systemd;
pub mod template;
pub mod test_env;
pub mod validate;
pub mod vip;

/// Gets the directory that every nodeadm path is resolved against.
pub fn default_root() -> String {
    match std::env::var("NODEADM_ROOT") {
        Ok(root) => root,
        Err(_) => "/".to_string(),
    }
}
