// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

pub mod init;
pub mod join;
pub mod reset;

use {init::InitArgs, join::JoinArgs};

use clap::{Parser, Subcommand};
use log::error;

use crate::{error::Error, layout::HostLayout};

/// A `HandledError` represents an error that has already been handled. When you call a function
/// that returns a `HandledError` or `HandledResult`, you don't need to do anything with that error,
/// other than just be aware that it happened, and return it on to your caller.
///
/// `main()` has a special responsibility: since its "caller" is, in a certain sense, the operating
/// system, `main()` must return a nonzero exit status when it gets a `HandledError`.
///
/// The primary way to construct a `HandledError` is with the `handle_err()` function, which turns a
/// generic error into a `HandledError`, and also runs some caller-provided code to handle the
/// error. That provided code would normally do something like report the error to the log.
#[derive(Debug, PartialEq)]
pub struct HandledError {}

pub type HandledResult<T> = std::result::Result<T, HandledError>;

pub trait Handle<T, F> {
    fn handle_err(self, handler: F) -> HandledResult<T>;
}

impl<T, E, F: FnOnce(E)> Handle<T, F> for std::result::Result<T, E> {
    /// Handle an error by running the provided `handler` code, giving it the error.
    ///
    /// Then, return a `HandledResult`, so that transitive callers of this function know that they
    /// do not need to do anything further to handle the error.
    fn handle_err(self, handler: F) -> HandledResult<T> {
        self.map_err(|e| {
            handler(e);
            HandledError {}
        })
    }
}

#[derive(Parser, Debug)]
#[command(version, about = "Bootstrap this machine into a cluster node", long_about = None)]
pub struct Cli {
    /// Resolve every path nodeadm touches against this directory instead of `/`.
    #[arg(long, global = true)]
    pub root: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn layout(&self) -> HostLayout {
        match &self.root {
            Some(root) => HostLayout::new(root),
            None => HostLayout::from_env(),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Bootstrap a control-plane node.
    Init(InitArgs),
    /// Bootstrap a worker node and join it to an existing cluster.
    Join(JoinArgs),
    /// Undo init or join.
    Reset,
}

/// Log `err`. Validation failures are listed one per line so that all of them can be fixed at
/// once.
fn report(command: &str, err: &Error) {
    match err {
        Error::Invalid(errors) => {
            error!("{command} failed: {err}");
            for (i, e) in errors.iter().enumerate() {
                error!("  {}: {e}", i + 1);
            }
        }
        _ => error!("{command} failed: {err}"),
    }
}

pub fn main(cli: &Cli) -> HandledResult<()> {
    match &cli.command {
        Commands::Init(args) => init::init(cli, args),
        Commands::Join(args) => join::join(cli, args),
        Commands::Reset => reset::reset(cli),
    }
}
