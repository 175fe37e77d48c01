// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! Query-then-act control of systemd units.
//!
//! Unit state is never cached: each operation asks systemctl first and only issues a state
//! change if the unit is not already where it should be.

use log::debug;

use crate::{
    error::Result,
    exec::{Cmd, CommandRunner},
};

const SYSTEMCTL: &str = "systemctl";

/// systemctl operations used to change unit state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operation {
    Start,
    Stop,
    Enable,
    Disable,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Operation::Start => "start",
                Operation::Stop => "stop",
                Operation::Enable => "enable",
                Operation::Disable => "disable",
            }
        )
    }
}

pub struct ServiceManager<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> ServiceManager<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }

    /// `systemctl is-active` exits 0 only for an active unit. Any other exit status, including
    /// the one for an unknown unit, means "not active".
    pub fn is_active(&self, service: &str) -> Result<bool> {
        let cmd = Cmd::new(SYSTEMCTL).args(["is-active", "--quiet", service]);
        Ok(self.runner.output(&cmd)?.success())
    }

    pub fn is_enabled(&self, service: &str) -> Result<bool> {
        let cmd = Cmd::new(SYSTEMCTL).args(["is-enabled", "--quiet", service]);
        Ok(self.runner.output(&cmd)?.success())
    }

    fn change(&self, op: Operation, service: &str) -> Result<()> {
        let cmd = Cmd::new(SYSTEMCTL).args([op.to_string().as_str(), service]);
        self.runner.run(&cmd)?;
        Ok(())
    }

    pub fn stop_if_active(&self, service: &str) -> Result<()> {
        if self.is_active(service)? {
            self.change(Operation::Stop, service)
        } else {
            debug!("{service} is not active; not stopping");
            Ok(())
        }
    }

    pub fn disable_if_enabled(&self, service: &str) -> Result<()> {
        if self.is_enabled(service)? {
            self.change(Operation::Disable, service)
        } else {
            debug!("{service} is not enabled; not disabling");
            Ok(())
        }
    }

    pub fn enable(&self, service: &str) -> Result<()> {
        if self.is_enabled(service)? {
            debug!("{service} is already enabled");
            Ok(())
        } else {
            self.change(Operation::Enable, service)
        }
    }

    pub fn start(&self, service: &str) -> Result<()> {
        if self.is_active(service)? {
            debug!("{service} is already active");
            Ok(())
        } else {
            self.change(Operation::Start, service)
        }
    }

    /// Make systemd pick up unit files that were just written.
    pub fn daemon_reload(&self) -> Result<()> {
        self.runner.run(&Cmd::new(SYSTEMCTL).arg("daemon-reload"))?;
        Ok(())
    }

    /// Bring `service` down so its files can be replaced.
    pub fn take_down(&self, service: &str) -> Result<()> {
        self.stop_if_active(service)?;
        self.disable_if_enabled(service)
    }

    /// Bring `service` back up with whatever files are now in place.
    pub fn bring_up(&self, service: &str) -> Result<()> {
        self.daemon_reload()?;
        self.enable(service)?;
        self.start(service)
    }

    /// Run the full replace protocol: stop, disable, `place`, reload, enable, start.
    ///
    /// Files are placed only while the unit is down. The first failure aborts the sequence and
    /// nothing already done is undone.
    pub fn replace_with<F>(&self, service: &str, place: F) -> Result<()>
    where
        F: FnOnce() -> Result<()>,
    {
        self.take_down(service)?;
        place()?;
        self.bring_up(service)
    }
}
