// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use std::{io, path::PathBuf};

use thiserror::Error;

use crate::validate::ValidationError;

/// Everything that can stop a bootstrap. The engine never exits the process itself; errors are
/// returned up to the command layer, which reports them and chooses the exit status.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read configuration from file {path:?}: {source}")]
    ConfigRead { path: PathBuf, source: io::Error },

    #[error("failed to parse configuration from file {path:?}: {source}")]
    ConfigParse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("failed to marshal {what}: {source}")]
    Marshal {
        what: &'static str,
        source: serde_yaml::Error,
    },

    #[error("configuration is invalid ({} error(s))", .0.len())]
    Invalid(Vec<ValidationError>),

    #[error("failed to derive hostname override: {0}")]
    Hostname(String),

    #[error("failed to derive DNS IP from service subnet {subnet:?}: {reason}")]
    DnsIp { subnet: String, reason: String },

    #[error("failed to determine default route: {0}")]
    DefaultRoute(String),

    #[error("failed to determine address of interface {interface:?}: {reason}")]
    InterfaceAddress { interface: String, reason: String },

    #[error("failed to {op} {path:?}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        source: io::Error,
    },

    #[error("failed to copy {from:?} to {to:?}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },

    #[error("failed to run {command:?}: {source}")]
    Spawn { command: String, source: io::Error },

    #[error("{command:?} exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("failed to render template {name:?}: {source}")]
    Template {
        name: String,
        source: minijinja::Error,
    },

    #[error("artifact cache is missing {}", display_paths(.0))]
    MissingArtifacts(Vec<PathBuf>),
}

pub type Result<T> = std::result::Result<T, Error>;

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Attach the attempted operation and path to a bare `io::Error`.
pub trait IoContext<T> {
    fn with_path(self, op: &'static str, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoContext<T> for io::Result<T> {
    fn with_path(self, op: &'static str, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|source| Error::Io {
            op,
            path: path.into(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_name_the_path() {
        let res: io::Result<()> = Err(io::Error::from(io::ErrorKind::PermissionDenied));
        let err = res.with_path("create", "/etc/keepalived/keepalived.conf").unwrap_err();
        let msg = err.to_string();
        assert!(msg.starts_with("failed to create \"/etc/keepalived/keepalived.conf\""));
    }

    #[test]
    fn missing_artifacts_are_listed() {
        let err = Error::MissingArtifacts(vec![PathBuf::from("/a"), PathBuf::from("/b")]);
        assert_eq!(err.to_string(), "artifact cache is missing /a, /b");
    }
}
