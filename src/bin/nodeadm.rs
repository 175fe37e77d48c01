// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use clap::Parser;

use nodeadm_lib::commands::{self, Cli};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("NODEADM_LOG", "info"))
        .init();

    let args = Cli::parse();

    if commands::main(&args).is_err() {
        std::process::exit(1);
    }
}
