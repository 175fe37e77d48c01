// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! Subprocess invocation.
//!
//! All external tools (systemctl, kubeadm, kubectl, tar, ...) go through a `CommandRunner`, so
//! the engine can be driven against a simulated host in tests.

use std::{
    fmt,
    io::{self, Write},
    path::{Path, PathBuf},
    process::{Command, Stdio},
    thread,
};

use log::debug;

use crate::error::{Error, Result};

/// A command line to run, with optional data for its standard input.
#[derive(Debug, Clone, PartialEq)]
pub struct Cmd {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub stdin: Option<Vec<u8>>,
    /// Let the child write straight to our stdout/stderr instead of capturing its output. Used
    /// for long-running tools like kubeadm whose progress the operator wants to see.
    pub passthrough: bool,
}

impl Cmd {
    pub fn new(program: impl AsRef<Path>) -> Self {
        Cmd {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            stdin: None,
            passthrough: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn stdin(mut self, data: Vec<u8>) -> Self {
        self.stdin = Some(data);
        self
    }

    pub fn passthrough(mut self) -> Self {
        self.passthrough = true;
        self
    }

    /// The name of the program without its directory, e.g. "kubeadm".
    pub fn program_name(&self) -> &str {
        self.program
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }
}

impl fmt::Display for Cmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in self.args.iter() {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// The result of a command that was started successfully.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CmdOutput {
    /// `None` if the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CmdOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    pub fn with_code(code: i32) -> Self {
        CmdOutput {
            code: Some(code),
            ..Default::default()
        }
    }

    pub fn with_stdout(stdout: &str) -> Self {
        CmdOutput {
            code: Some(0),
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }
}

pub trait CommandRunner {
    /// Run `cmd` to completion. Only a failure to start the process is an error here; a non-zero
    /// exit is reported through `CmdOutput::code`.
    fn output(&self, cmd: &Cmd) -> Result<CmdOutput>;

    /// Run `cmd` and treat a non-zero exit as an error carrying the command line.
    fn run(&self, cmd: &Cmd) -> Result<CmdOutput> {
        let output = self.output(cmd)?;
        if output.success() {
            Ok(output)
        } else {
            Err(Error::CommandFailed {
                command: cmd.to_string(),
                status: match output.code {
                    Some(code) => format!("exit status {code}"),
                    None => "a signal".to_string(),
                },
                stderr: output.stderr.trim().to_string(),
            })
        }
    }
}

/// Runs commands on the local machine.
#[derive(Debug, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn output(&self, cmd: &Cmd) -> Result<CmdOutput> {
        debug!("running '{cmd}'");
        let spawn_err = |source| Error::Spawn {
            command: cmd.to_string(),
            source,
        };

        let (out, err) = if cmd.passthrough {
            (Stdio::inherit(), Stdio::inherit())
        } else {
            (Stdio::piped(), Stdio::piped())
        };
        let mut child = Command::new(&cmd.program)
            .args(&cmd.args)
            .stdin(if cmd.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(out)
            .stderr(err)
            .spawn()
            .map_err(spawn_err)?;

        // stdin is fed from its own thread while stdout and stderr are drained, so a child that
        // writes a lot before reading all of its input cannot block on a full pipe.
        let stdin = child.stdin.take();
        let (output, written) = thread::scope(|s| {
            let writer = match (stdin, cmd.stdin.as_deref()) {
                // The pipe closes when the thread drops it, so the child sees EOF.
                (Some(mut pipe), Some(data)) => Some(s.spawn(move || pipe.write_all(data))),
                _ => None,
            };
            let output = child.wait_with_output();
            let written = match writer {
                Some(handle) => handle
                    .join()
                    .unwrap_or_else(|_| Err(io::Error::other("stdin writer panicked"))),
                None => Ok(()),
            };
            (output, written)
        });

        let output = output.map_err(spawn_err)?;
        match written {
            // A child that exits without reading its input reports through its exit status.
            Err(e) if e.kind() != io::ErrorKind::BrokenPipe => return Err(spawn_err(e)),
            _ => {}
        }

        Ok(CmdOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
